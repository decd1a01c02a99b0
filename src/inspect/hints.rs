//! Static style hints over bound SQL text.
//!
//! Each check is a plain regex/substring test; nothing here touches the database.

use regex::Regex;
use std::sync::LazyLock;

static WILDCARD_SELECT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*SELECT\s*`?[a-zA-Z0-9_]*`?\.?\*").unwrap());

static ORDER_BY_RAND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ORDER\s+BY\s+RAND\s*\(\s*\)").unwrap());

static SELECT_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^SELECT\s").unwrap());

static LIMIT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)LIMIT\s").unwrap());

static ORDER_BY_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)ORDER\s+BY").unwrap());

static LEADING_WILDCARD_LIKE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)LIKE\s['"](%.*?)['"]"#).unwrap());

/// Return the hints that fire for `sql`, in a fixed order:
/// wildcard select, `ORDER BY RAND()`, `!=`, missing `WHERE`, `LIMIT` without
/// `ORDER BY`, leading-wildcard `LIKE`.
pub fn analyze(sql: &str) -> Vec<String> {
    let mut hints = Vec::new();

    if WILDCARD_SELECT_REGEX.is_match(sql) {
        hints.push("Use SELECT * only if you need all columns from the table".to_string());
    }

    if ORDER_BY_RAND_REGEX.is_match(sql) {
        hints.push(
            "ORDER BY RAND() is slow: it sorts every candidate row by a random value".to_string(),
        );
    }

    if sql.contains("!=") {
        hints.push(
            "The != operator is not standard. Use the <> operator to test for inequality instead"
                .to_string(),
        );
    }

    if !sql.to_ascii_uppercase().contains("WHERE") && SELECT_PREFIX_REGEX.is_match(sql) {
        hints.push(
            "The SELECT statement has no WHERE clause and could examine many more rows than intended"
                .to_string(),
        );
    }

    if LIMIT_REGEX.is_match(sql) && !ORDER_BY_REGEX.is_match(sql) {
        hints.push(
            "LIMIT without ORDER BY causes non-deterministic results, depending on the query execution plan"
                .to_string(),
        );
    }

    if let Some(caps) = LEADING_WILDCARD_LIKE_REGEX.captures(sql) {
        hints.push(format!(
            "An argument has a leading wildcard character: {}. The predicate with this argument \
             is not sargable and cannot use an index if one exists",
            &caps[1]
        ));
    }

    hints
}
