//! Lexical SQL inspection for intercepted queries.
//!
//! # Submodules
//! - `bind`:  placeholder substitution (`?` / `:name`) with driver quoting
//! - `hints`: static regex style hints over the bound SQL
//! - `tests`: unit tests for classification and table extraction (cfg(test) only)
//!
//! Classification and table extraction are deliberately heuristic: they scan tokens
//! rather than parse SQL. `extract_table` only ever returns the first token after the
//! first `FROM` keyword, so multi-table `FROM a, b` lists yield `a`, joins yield the
//! left-most table, and a `FROM` inside a string literal or comment can mislead it.
//! Callers that need correctness on complex queries must use a real SQL parser.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub mod bind;
pub mod hints;

pub use bind::{bind_parameters, BindValue, Bindings, MySqlQuoter, Quoter};

static FROM_KEYWORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfrom\b").unwrap());

/// The only distinction the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Other,
}

impl StatementKind {
    pub fn is_select(self) -> bool {
        self == StatementKind::Select
    }
}

/// Where in the host application a query was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self { file: file.into(), line }
    }

    /// Location of the caller, for hosts that wrap their query calls in `#[track_caller]` helpers.
    #[track_caller]
    pub fn caller() -> Self {
        let loc = std::panic::Location::caller();
        Self::new(loc.file(), loc.line())
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One executed statement as reported by the host's query-execution hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvent {
    /// Raw SQL with placeholders.
    pub sql: String,
    #[serde(default)]
    pub bindings: Bindings,
    #[serde(default)]
    pub elapsed_ms: f64,
    #[serde(default)]
    pub source: Option<SourceLocation>,
}

impl QueryEvent {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Bindings::None,
            elapsed_ms: 0.0,
            source: None,
        }
    }

    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: f64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source = Some(source);
        self
    }
}

/// Result of inspecting one event: the bound SQL plus what the heuristics found in it.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlInspection {
    pub sql: String,
    pub kind: StatementKind,
    pub table: Option<String>,
}

impl SqlInspection {
    pub fn from_event(event: &QueryEvent, quoter: &impl Quoter) -> Self {
        let sql = bind_parameters(&event.sql, &event.bindings, quoter);
        let kind = classify(&sql);
        let table = extract_table(&sql);
        Self { sql, kind, table }
    }
}

/// Classify by the first whitespace-delimited word; only an exact `select` counts.
pub fn classify(sql: &str) -> StatementKind {
    match sql.split_whitespace().next() {
        Some(word) if word.eq_ignore_ascii_case("select") => StatementKind::Select,
        _ => StatementKind::Other,
    }
}

/// First token after the first `FROM` keyword, with quoting and separators stripped.
pub fn extract_table(sql: &str) -> Option<String> {
    let m = FROM_KEYWORD_REGEX.find(sql)?;
    let rest: String = sql[m.end()..]
        .chars()
        .filter(|c| !matches!(c, '`' | '"'))
        .collect();
    let token = rest.split_whitespace().next()?;
    let table = token.trim_end_matches([';', ',', ')']);
    if table.is_empty() {
        None
    } else {
        Some(table.to_string())
    }
}
