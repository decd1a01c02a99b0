//! Input format of the `mysql-indexer` binary.
//!
//! One statement per line. A line is either raw SQL, or a JSON object with the fields of
//! [`QueryEvent`] (`sql`, `bindings`, `elapsed_ms`, `source`). Blank lines and lines
//! starting with `--` or `#` are skipped.

use anyhow::{Context, Result};

use crate::inspect::{QueryEvent, SourceLocation};

/// Parse one input line. `origin` and `line_no` become the event's source location unless
/// the JSON form carries its own.
pub fn parse_line(line: &str, origin: &str, line_no: usize) -> Result<Option<QueryEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("--") || trimmed.starts_with('#') {
        return Ok(None);
    }
    let location = SourceLocation::new(origin, u32::try_from(line_no).unwrap_or(u32::MAX));
    if trimmed.starts_with('{') {
        let mut event: QueryEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("{}:{}: invalid JSON query event", origin, line_no))?;
        if event.source.is_none() {
            event.source = Some(location);
        }
        return Ok(Some(event));
    }
    let sql = trimmed.trim_end_matches(';').trim_end();
    Ok(Some(QueryEvent::new(sql).with_source(location)))
}
