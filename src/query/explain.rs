use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::{Column, Row, TypeInfo};

/// First row of a classic tabular `EXPLAIN`, as ordered `(field, value)` pairs.
///
/// Field names are engine-specific (`id`, `select_type`, `table`, `possible_keys`,
/// `key`, `rows`, `Extra`, ...). SQL NULL is stored as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplainRow {
    fields: Vec<(String, String)>,
}

impl ExplainRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field, keeping first-insertion order.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Apply `f` to every value.
    pub fn map_values(self, f: impl Fn(&str) -> String) -> Self {
        Self {
            fields: self.fields.into_iter().map(|(k, v)| (k, f(&v))).collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExplainRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = ExplainRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl Serialize for ExplainRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExplainRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json::Map keeps keys sorted, which is an acceptable order after a round trip.
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect())
    }
}

/// Convert a `MySqlRow` returned by `EXPLAIN` into an [`ExplainRow`].
pub fn row_to_explain(row: &sqlx::mysql::MySqlRow) -> ExplainRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| (col.name().to_string(), column_to_string(row, i, col)))
        .collect()
}

fn column_to_string(row: &sqlx::mysql::MySqlRow, idx: usize, col: &sqlx::mysql::MySqlColumn) -> String {
    let type_name = col.type_info().name();
    match type_name {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
                return v.map(|n| n.to_string()).unwrap_or_default();
            }
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED" | "BIGINT UNSIGNED" => {
            if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
                return v.map(|n| n.to_string()).unwrap_or_default();
            }
        }
        "FLOAT" | "DOUBLE" | "DECIMAL" | "NUMERIC" => {
            if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
                return v.map(|n| n.to_string()).unwrap_or_default();
            }
        }
        _ => {}
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.unwrap_or_default();
    }
    // EXPLAIN columns such as `possible_keys` can arrive as binary blobs.
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut row = ExplainRow::new();
        row.insert("id", "1");
        row.insert("key", "");
        row.insert("rows", "10");
        row.insert("key", "users_email_index");
        let fields: Vec<&str> = row.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["id", "key", "rows"]);
        assert_eq!(row.get("key"), Some("users_email_index"));
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let row: ExplainRow = [("Extra", "Using where")].into_iter().collect();
        assert_eq!(row.get("extra"), Some("Using where"));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let row: ExplainRow = [("table", "users"), ("key", "PRIMARY")].into_iter().collect();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"table":"users","key":"PRIMARY"}"#);
    }

    #[test]
    fn test_deserialize_null_becomes_empty() {
        let row: ExplainRow = serde_json::from_str(r#"{"key":null,"rows":5}"#).unwrap();
        assert_eq!(row.get("key"), Some(""));
        assert_eq!(row.get("rows"), Some("5"));
    }
}
