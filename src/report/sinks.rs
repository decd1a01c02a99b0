use anyhow::{bail, Result};
use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use super::{write_side_channel, Report};
use crate::config::IndexerConfig;
use crate::index::RequestContext;

/// A named output for reports.
pub trait ReportSink: Send + Sync {
    fn name(&self) -> &str;

    /// One-time setup before the first `send`.
    fn boot(&mut self) -> Result<()> {
        Ok(())
    }

    fn send(&self, report: &Report, request: &RequestContext) -> Result<()>;
}

/// Build and boot the sinks named in `config.output_to`, in order. A sink that fails to
/// boot is logged and left out.
pub fn build_sinks(config: &IndexerConfig) -> Result<Vec<Box<dyn ReportSink>>> {
    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::with_capacity(config.output_to.len());
    for name in &config.output_to {
        let mut sink: Box<dyn ReportSink> = match name.as_str() {
            "log" => Box::new(LogSink),
            "console" => Box::new(ConsoleSink::stderr()),
            "json" => Box::new(JsonSink::new(&config.json_path)),
            other => bail!("unknown indexer output: {}", other),
        };
        match sink.boot() {
            Ok(()) => sinks.push(sink),
            Err(e) => tracing::warn!(sink = %name, error = %e, "report sink failed to boot; disabled"),
        }
    }
    Ok(sinks)
}

/// Send `report` to every sink in order. One sink failing does not stop the others;
/// the names of failed sinks are returned.
pub fn dispatch(sinks: &[Box<dyn ReportSink>], report: &Report, request: &RequestContext) -> Vec<String> {
    let mut failed = Vec::new();
    for sink in sinks {
        if let Err(e) = sink.send(report, request) {
            tracing::warn!(sink = sink.name(), error = %e, "report sink failed");
            failed.push(sink.name().to_string());
        }
    }
    failed
}

/// Writes the report through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn send(&self, report: &Report, request: &RequestContext) -> Result<()> {
        for unremoved in &report.unremoved_indexes {
            tracing::error!(
                table = %unremoved.table,
                index = %unremoved.index,
                "index left behind by the indexer; drop it manually"
            );
        }
        if report.records.is_empty() {
            return Ok(());
        }
        tracing::info!(
            path = ?request.path,
            total = report.counts.total,
            optimized = report.counts.optimized,
            slow = report.counts.slow,
            "indexer report"
        );
        for record in &report.records {
            tracing::info!(
                table = %record.table,
                index = %record.title(),
                key = record.optimized_key.as_deref().unwrap_or(""),
                rows = record.explain_plan.get("rows").unwrap_or(""),
                time = %record.time_ms,
                slow = record.is_slow,
                sql = %record.sql,
                "index trial"
            );
            for hint in &record.hints {
                tracing::info!(table = %record.table, "hint: {}", hint);
            }
        }
        Ok(())
    }
}

/// Plain-text block for a terminal. The unremoved-index warning always comes first.
pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }
}

impl ReportSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn send(&self, report: &Report, _request: &RequestContext) -> Result<()> {
        if report.is_empty() {
            return Ok(());
        }
        let text = render_text(report);
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

pub fn render_text(report: &Report) -> String {
    let mut s = String::new();
    if !report.unremoved_indexes.is_empty() {
        let names: Vec<String> = report.unremoved_indexes.iter().map(|u| u.to_string()).collect();
        let _ = writeln!(
            s,
            "!! UNREMOVED INDEXES: {} (added by the indexer and still present; drop them manually)",
            names.join(", ")
        );
    }
    let _ = writeln!(
        s,
        "Indexer: {} trials, {} optimized, {} slow",
        report.counts.total, report.counts.optimized, report.counts.slow
    );
    for record in &report.records {
        let _ = write!(
            s,
            "  [{}] {} key={} rows={} {}",
            record.table,
            record.title(),
            record.optimized_key.as_deref().unwrap_or("-"),
            record.explain_plan.get("rows").unwrap_or("-"),
            record.time_ms
        );
        if record.is_slow {
            s.push_str(" SLOW");
        }
        if let Some(source) = &record.source {
            let _ = write!(s, " at {}", source);
        }
        s.push('\n');
        let _ = writeln!(s, "      {}", record.sql);
        for hint in &record.hints {
            let _ = writeln!(s, "      hint: {}", hint);
        }
    }
    if !report.skipped_tables.is_empty() {
        let _ = writeln!(s, "Skipped tables: {}", report.skipped_tables.join(", "));
    }
    s
}

/// Writes the side-channel file on every send.
#[derive(Debug, Clone)]
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for JsonSink {
    fn name(&self) -> &str {
        "json"
    }

    fn boot(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn send(&self, report: &Report, _request: &RequestContext) -> Result<()> {
        write_side_channel(&self.path, report)?;
        Ok(())
    }
}
