use anyhow::{bail, Result};
use sqlx::MySqlPool;

use crate::query::explain::{row_to_explain, ExplainRow};

// MySQL SHOW/information_schema columns (Key_name, Column_name, etc.) are
// sometimes returned as binary blobs by sqlx. Try String first, then fall back
// to Vec<u8> -> UTF-8 so callers always get a usable value.
pub(crate) fn is_col_str(row: &sqlx::mysql::MySqlRow, col: &str) -> String {
    use sqlx::Row;
    row.try_get::<String, _>(col)
        .or_else(|_| {
            row.try_get::<Vec<u8>, _>(col)
                .map(|b| String::from_utf8_lossy(&b).into_owned())
        })
        .unwrap_or_default()
}

/// Escape a MySQL identifier for use in backtick-quoted contexts.
/// Doubles any backtick characters within the name.
pub(crate) fn escape_mysql_identifier(name: &str) -> String {
    name.replace('`', "``")
}

/// Backtick-quote a possibly schema-qualified table name (`shop.orders` -> `` `shop`.`orders` ``).
pub(crate) fn qualify_table(table: &str) -> Result<String> {
    let parts: Vec<&str> = table.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) || parts.len() > 2 {
        bail!("invalid table name: {:?}", table);
    }
    Ok(parts
        .iter()
        .map(|p| format!("`{}`", escape_mysql_identifier(p)))
        .collect::<Vec<_>>()
        .join("."))
}

/// Distinct index names on `table`, in the order `SHOW INDEXES` lists them.
pub(crate) async fn fetch_index_names(pool: &MySqlPool, table: &str) -> Result<Vec<String>> {
    let sql = format!("SHOW INDEXES FROM {}", qualify_table(table)?);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    let mut names: Vec<String> = Vec::new();
    for row in &rows {
        let name = is_col_str(row, "Key_name");
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}

pub(crate) async fn add_index(pool: &MySqlPool, table: &str, name: &str, columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        bail!("index {} on {} has no columns", name, table);
    }
    let cols = columns
        .iter()
        .map(|c| format!("`{}`", escape_mysql_identifier(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "ALTER TABLE {} ADD INDEX `{}` ({})",
        qualify_table(table)?,
        escape_mysql_identifier(name),
        cols
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

pub(crate) async fn drop_index(pool: &MySqlPool, table: &str, name: &str) -> Result<()> {
    let sql = format!(
        "ALTER TABLE {} DROP INDEX `{}`",
        qualify_table(table)?,
        escape_mysql_identifier(name)
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

/// Run classic tabular `EXPLAIN` and return its first row, if any.
pub(crate) async fn fetch_explain(pool: &MySqlPool, sql: &str) -> Result<Option<ExplainRow>> {
    let explain_sql = format!("EXPLAIN {}", sql);
    let row = sqlx::query(&explain_sql).fetch_optional(pool).await?;
    Ok(row.as_ref().map(row_to_explain))
}
