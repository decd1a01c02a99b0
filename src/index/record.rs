use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::inspect::{hints, SourceLocation};
use crate::query::explain::ExplainRow;

use super::candidate::{CandidateBatch, IndexCandidate};

/// Decides which index (if any) the plan shows as used. A non-`None` result marks the
/// record as optimized.
pub type OptimizedKeyRule = Arc<dyn Fn(&ExplainRow) -> Option<String> + Send + Sync>;

/// Built-in rule: the plan's `key` field, trimmed, when non-empty.
pub fn plan_key(plan: &ExplainRow) -> Option<String> {
    plan.get("key")
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

/// Outcome of one (query, candidate) trial. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub table: String,
    pub index_name: String,
    pub columns: Vec<String>,
    pub batch: CandidateBatch,
    pub was_preexisting: bool,
    pub explain_plan: ExplainRow,
    pub sql: String,
    /// Elapsed time formatted for display, e.g. `"12.50ms"`.
    pub time_ms: String,
    pub elapsed_ms: f64,
    pub source: Option<SourceLocation>,
    pub hints: Vec<String>,
    pub is_slow: bool,
    pub optimized_key: Option<String>,
    /// Tables seen in this window that were not watched, as of this record.
    pub skipped_tables: Vec<String>,
}

impl DiagnosticRecord {
    pub fn is_optimized(&self) -> bool {
        self.optimized_key.is_some()
    }

    /// Label in the form `name (Added By Indexer)` / `name (Already Present On Table)`.
    pub fn title(&self) -> String {
        let origin = if self.was_preexisting {
            "Already Present On Table"
        } else {
            "Added By Indexer"
        };
        format!("{} ({})", self.index_name, origin)
    }
}

/// Everything the engine knows at the end of one successful `EXPLAIN`.
pub struct RecordInput<'a> {
    pub table: &'a str,
    pub candidate: &'a IndexCandidate,
    pub batch: CandidateBatch,
    pub was_preexisting: bool,
    pub plan: ExplainRow,
    pub sql: &'a str,
    pub elapsed_ms: f64,
    pub source: Option<&'a SourceLocation>,
    pub skipped_tables: &'a [String],
}

#[derive(Clone)]
pub struct RecordBuilder {
    slow_threshold_ms: u64,
    optimized_key: OptimizedKeyRule,
}

impl std::fmt::Debug for RecordBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordBuilder")
            .field("slow_threshold_ms", &self.slow_threshold_ms)
            .finish_non_exhaustive()
    }
}

impl RecordBuilder {
    /// `slow_threshold_ms == 0` disables the slow flag.
    pub fn new(slow_threshold_ms: u64) -> Self {
        Self {
            slow_threshold_ms,
            optimized_key: Arc::new(plan_key),
        }
    }

    pub fn with_optimized_key_rule(mut self, rule: OptimizedKeyRule) -> Self {
        self.optimized_key = rule;
        self
    }

    pub fn is_slow(&self, elapsed_ms: f64) -> bool {
        self.slow_threshold_ms > 0 && elapsed_ms >= self.slow_threshold_ms as f64
    }

    pub fn build(&self, input: RecordInput<'_>) -> DiagnosticRecord {
        let plan = input.plan.map_values(normalize_value);
        let optimized_key = (self.optimized_key)(&plan);
        DiagnosticRecord {
            table: input.table.to_string(),
            index_name: input.candidate.display_name(input.table),
            columns: input.candidate.columns(),
            batch: input.batch,
            was_preexisting: input.was_preexisting,
            optimized_key,
            explain_plan: plan,
            sql: input.sql.to_string(),
            time_ms: format!("{:.2}ms", input.elapsed_ms),
            elapsed_ms: input.elapsed_ms,
            source: input.source.cloned(),
            hints: hints::analyze(input.sql),
            is_slow: self.is_slow(input.elapsed_ms),
            skipped_tables: input.skipped_tables.to_vec(),
        }
    }
}

/// Strip characters that break JSON/HTML rendering downstream: ASCII control
/// characters, `<`, `>` and `"`.
fn normalize_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_ascii_control() && !matches!(c, '<' | '>' | '"'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(key: &str) -> ExplainRow {
        [("table", "users"), ("type", "ref"), ("key", key), ("rows", "1")]
            .into_iter()
            .collect()
    }

    fn input<'a>(candidate: &'a IndexCandidate, plan: ExplainRow, elapsed_ms: f64) -> RecordInput<'a> {
        RecordInput {
            table: "users",
            candidate,
            batch: CandidateBatch::NewIndexes,
            was_preexisting: false,
            plan,
            sql: "SELECT * FROM users WHERE email = 'a'",
            elapsed_ms,
            source: None,
            skipped_tables: &[],
        }
    }

    #[test]
    fn test_build_default_rule_uses_key() {
        let c = IndexCandidate::single("email");
        let r = RecordBuilder::new(0).build(input(&c, plan("users_email_index"), 1.0));
        assert_eq!(r.optimized_key.as_deref(), Some("users_email_index"));
        assert_eq!(r.index_name, "email");
        assert_eq!(r.title(), "email (Added By Indexer)");
        assert!(!r.is_slow);
        assert_eq!(r.time_ms, "1.00ms");
        assert!(r.hints.iter().any(|h| h.contains("SELECT *")));
    }

    #[test]
    fn test_blank_key_is_not_optimized() {
        let c = IndexCandidate::single("email");
        let r = RecordBuilder::new(0).build(input(&c, plan("  "), 1.0));
        assert!(!r.is_optimized());
    }

    #[test]
    fn test_slow_threshold() {
        let b = RecordBuilder::new(100);
        assert!(!b.is_slow(99.9));
        assert!(b.is_slow(100.0));
        assert!(!RecordBuilder::new(0).is_slow(10_000.0));
    }

    #[test]
    fn test_custom_optimized_key_rule() {
        let c = IndexCandidate::single("email");
        let rule: OptimizedKeyRule = Arc::new(|p: &ExplainRow| {
            (p.get("type") == Some("ref")).then(|| "by-type".to_string())
        });
        let r = RecordBuilder::new(0)
            .with_optimized_key_rule(rule)
            .build(input(&c, plan(""), 1.0));
        assert_eq!(r.optimized_key.as_deref(), Some("by-type"));
    }

    #[test]
    fn test_values_are_normalized() {
        let c = IndexCandidate::single("email");
        let p: ExplainRow = [("Extra", "Using where\n<b>\"x\"</b>\t")].into_iter().collect();
        let r = RecordBuilder::new(0).build(input(&c, p, 0.0));
        assert_eq!(r.explain_plan.get("Extra"), Some("Using wherebx/b"));
    }
}
