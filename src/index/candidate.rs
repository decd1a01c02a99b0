use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A candidate index: one column (or an exact index name), or an ordered column list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexCandidate {
    Single(String),
    Composite(Vec<String>),
}

/// Which configured list a candidate came from. Batches run in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateBatch {
    /// Indexes expected to already exist on the table.
    TableIndexes,
    /// New single-column indexes to try.
    NewIndexes,
    Composite,
}

impl IndexCandidate {
    pub fn single(column: impl Into<String>) -> Self {
        IndexCandidate::Single(column.into())
    }

    pub fn composite<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IndexCandidate::Composite(columns.into_iter().map(Into::into).collect())
    }

    pub fn columns(&self) -> Vec<String> {
        match self {
            IndexCandidate::Single(c) => vec![c.clone()],
            IndexCandidate::Composite(cols) => cols.clone(),
        }
    }

    /// The name exactly as configured, for single candidates.
    pub fn literal_name(&self) -> Option<&str> {
        match self {
            IndexCandidate::Single(c) => Some(c),
            IndexCandidate::Composite(_) => None,
        }
    }

    /// `{table}_{col1}_..._{colN}_index`, lower-cased, with `.` and `-` turned into `_`.
    ///
    /// This is the name a schema-migration tool would generate by default; indexes the
    /// engine creates are given this name.
    pub fn conventional_name(&self, table: &str) -> String {
        let mut parts = Vec::with_capacity(2 + self.columns().len());
        parts.push(table.to_string());
        parts.extend(self.columns());
        parts.push("index".to_string());
        parts
            .join("_")
            .to_lowercase()
            .replace(['.', '-'], "_")
    }

    /// Name shown in reports: the literal name for single candidates, the conventional
    /// name for composites.
    pub fn display_name(&self, table: &str) -> String {
        match self.literal_name() {
            Some(name) => name.to_string(),
            None => self.conventional_name(table),
        }
    }

    /// True if `snapshot` already holds this candidate, by literal or conventional name.
    pub fn is_present_in(&self, table: &str, snapshot: &[String]) -> bool {
        if let Some(literal) = self.literal_name() {
            if snapshot.iter().any(|n| n == literal) {
                return true;
            }
        }
        let conventional = self.conventional_name(table);
        snapshot.iter().any(|n| *n == conventional)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, IndexCandidate::Composite(_))
    }
}

impl std::fmt::Display for IndexCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexCandidate::Single(c) => write!(f, "{}", c),
            IndexCandidate::Composite(cols) => write!(f, "({})", cols.join(", ")),
        }
    }
}

/// Identity of one (index, bound SQL) trial inside an observation window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(conventional_name: &str, sql: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(conventional_name.as_bytes());
        hasher.update(sql.as_bytes());
        DedupKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conventional_name_single() {
        let c = IndexCandidate::single("email");
        assert_eq!(c.conventional_name("users"), "users_email_index");
    }

    #[test]
    fn test_conventional_name_composite_lowercased() {
        let c = IndexCandidate::composite(["Name", "Email"]);
        assert_eq!(c.conventional_name("Users"), "users_name_email_index");
    }

    #[test]
    fn test_conventional_name_schema_qualified() {
        let c = IndexCandidate::single("total");
        assert_eq!(c.conventional_name("shop.orders"), "shop_orders_total_index");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(IndexCandidate::single("email").display_name("users"), "email");
        assert_eq!(
            IndexCandidate::composite(["a", "b"]).display_name("t"),
            "t_a_b_index"
        );
    }

    #[test]
    fn test_is_present_by_literal_or_conventional() {
        let snapshot = vec!["PRIMARY".to_string(), "users_email_index".to_string(), "idx_name".to_string()];
        assert!(IndexCandidate::single("email").is_present_in("users", &snapshot));
        assert!(IndexCandidate::single("idx_name").is_present_in("users", &snapshot));
        assert!(!IndexCandidate::single("name").is_present_in("users", &snapshot));
        assert!(!IndexCandidate::composite(["name", "email"]).is_present_in("users", &snapshot));
    }

    #[test]
    fn test_deserialize_untagged() {
        let cs: Vec<IndexCandidate> = serde_json::from_str(r#"["email", ["name", "email"]]"#).unwrap();
        assert_eq!(cs[0], IndexCandidate::single("email"));
        assert_eq!(cs[1], IndexCandidate::composite(["name", "email"]));
    }

    #[test]
    fn test_dedup_key_depends_on_index_and_sql() {
        let a = DedupKey::new("users_email_index", "SELECT 1");
        let b = DedupKey::new("users_email_index", "SELECT 1");
        let c = DedupKey::new("users_name_index", "SELECT 1");
        let d = DedupKey::new("users_email_index", "SELECT 2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.as_str().len(), 64);
    }
}
