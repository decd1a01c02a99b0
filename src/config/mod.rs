use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::index::candidate::{CandidateBatch, IndexCandidate};

pub mod toml_config;
pub mod env_config;
pub mod merge;

/// Sink names accepted by `indexer.output_to`.
pub const KNOWN_SINKS: &[&str] = &["log", "console", "json"];

/// Request paths never observed, whatever the configuration says: the indexer's own
/// side-channel route and the usual debugging/admin tool routes.
pub const BUILTIN_IGNORE_PATHS: &[&str] = &[
    "*indexer*",
    "*debugbar*",
    "*clockwork*",
    "*telescope*",
    "*horizon*",
    "*nova-api*",
    "*_ignition*",
    "*livewire*",
];

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub pool: PoolConfig,
    pub security: SecurityConfig,
    pub monitoring: MonitoringConfig,
    pub indexer: IndexerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub socket: Option<String>,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    /// Full connection URL (overrides individual fields when set)
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    pub size: u32,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub ssl: bool,
    pub ssl_accept_invalid_certs: bool,
    /// Path to a PEM CA bundle for SSL verification (optional).
    /// When set and ssl=true, this CA is used instead of the system trust store.
    pub ssl_ca: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
}

/// The `[indexer]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// `None` inherits `debug`.
    pub enabled: Option<bool>,
    /// Host debug flag, consulted when `enabled` is unset.
    pub debug: bool,
    /// `0` disables the slow flag.
    pub slow_threshold_ms: u64,
    /// Observe every table except `ignored_tables`.
    pub watch_all: bool,
    pub ignored_tables: Vec<String>,
    /// Glob patterns (`*` wildcard) matched against the request path. Added to
    /// [`BUILTIN_IGNORE_PATHS`].
    pub ignore_paths: Vec<String>,
    pub output_to: Vec<String>,
    pub json_path: String,
    pub watched_tables: BTreeMap<String, WatchedTable>,
}

/// Candidates for one table. In TOML either a bare list (`users = ["email"]`, shorthand
/// for `try_indexes`) or a table with the three lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "WatchedTableSpec")]
pub struct WatchedTable {
    /// Indexes expected to already exist.
    pub try_table_indexes: Vec<IndexCandidate>,
    pub try_indexes: Vec<IndexCandidate>,
    pub try_composite_indexes: Vec<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WatchedTableSpec {
    Columns(Vec<IndexCandidate>),
    Detailed(DetailedWatchedTable),
}

/// Misspelled keys are rejected rather than read as an empty table.
#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DetailedWatchedTable {
    try_table_indexes: Vec<IndexCandidate>,
    try_indexes: Vec<IndexCandidate>,
    try_composite_indexes: Vec<Vec<String>>,
}

impl From<WatchedTableSpec> for WatchedTable {
    fn from(spec: WatchedTableSpec) -> Self {
        match spec {
            WatchedTableSpec::Columns(try_indexes) => WatchedTable {
                try_indexes,
                ..Default::default()
            },
            WatchedTableSpec::Detailed(detailed) => WatchedTable {
                try_table_indexes: detailed.try_table_indexes,
                try_indexes: detailed.try_indexes,
                try_composite_indexes: detailed.try_composite_indexes,
            },
        }
    }
}

impl WatchedTable {
    /// Candidate batches in trial order. Empty batches are included.
    pub fn batches(&self) -> [(CandidateBatch, Vec<IndexCandidate>); 3] {
        [
            (CandidateBatch::TableIndexes, self.try_table_indexes.clone()),
            (CandidateBatch::NewIndexes, self.try_indexes.clone()),
            (
                CandidateBatch::Composite,
                self.try_composite_indexes
                    .iter()
                    .map(|cols| IndexCandidate::Composite(cols.clone()))
                    .collect(),
            ),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.try_table_indexes.is_empty()
            && self.try_indexes.is_empty()
            && self.try_composite_indexes.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            pool: PoolConfig::default(),
            security: SecurityConfig::default(),
            monitoring: MonitoringConfig::default(),
            indexer: IndexerConfig::default(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            socket: None,
            user: "root".to_string(),
            password: String::new(),
            database: None,
            connection_string: None,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            // Trials are strictly sequential; a second connection only serves the harness.
            size: 2,
            connect_timeout_ms: 10_000,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            debug: false,
            slow_threshold_ms: 0,
            watch_all: false,
            ignored_tables: Vec::new(),
            ignore_paths: Vec::new(),
            output_to: vec!["log".to_string()],
            json_path: "indexer.json".to_string(),
            watched_tables: BTreeMap::new(),
        }
    }
}

impl IndexerConfig {
    /// Tri-state enable: explicit value wins, otherwise follow the debug flag.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(self.debug)
    }

    /// Configured patterns followed by the built-in ones, without duplicates.
    pub fn effective_ignore_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for p in self
            .ignore_paths
            .iter()
            .map(String::as_str)
            .chain(BUILTIN_IGNORE_PATHS.iter().copied())
        {
            if !paths.iter().any(|existing| existing == p) {
                paths.push(p.to_string());
            }
        }
        paths
    }

    /// Candidates for `table`. A schema-qualified name falls back to its bare table part.
    pub fn watched_table(&self, table: &str) -> Option<&WatchedTable> {
        self.watched_tables.get(table).or_else(|| {
            table
                .rsplit_once('.')
                .and_then(|(_, bare)| self.watched_tables.get(bare))
        })
    }

    pub fn is_ignored_table(&self, table: &str) -> bool {
        let bare = table.rsplit_once('.').map(|(_, b)| b).unwrap_or(table);
        self.ignored_tables.iter().any(|t| t == table || t == bare)
    }
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        // Pool size must be 1..=1000
        if self.pool.size == 0 {
            anyhow::bail!("Config error: MYSQL_POOL_SIZE cannot be 0 (got 0)");
        }
        if self.pool.size > 1000 {
            anyhow::bail!(
                "Config error: MYSQL_POOL_SIZE unreasonably large: {} (max 1000)",
                self.pool.size
            );
        }

        if self.pool.connect_timeout_ms < 100 {
            anyhow::bail!(
                "Config error: MYSQL_CONNECT_TIMEOUT must be at least 100ms (got {}ms)",
                self.pool.connect_timeout_ms
            );
        }

        for name in &self.indexer.output_to {
            if !KNOWN_SINKS.contains(&name.as_str()) {
                anyhow::bail!(
                    "Config error: unknown indexer output {:?} (valid: {})",
                    name,
                    KNOWN_SINKS.join(", ")
                );
            }
        }

        if self.indexer.output_to.iter().any(|o| o == "json") && self.indexer.json_path.trim().is_empty() {
            anyhow::bail!("Config error: indexer.json_path must be set when the json output is enabled");
        }

        for (table, watched) in &self.indexer.watched_tables {
            if table.trim().is_empty() {
                anyhow::bail!("Config error: indexer.watched_tables has an empty table name");
            }
            for (batch, candidates) in watched.batches() {
                for candidate in &candidates {
                    let columns = candidate.columns();
                    if columns.is_empty() {
                        anyhow::bail!(
                            "Config error: {:?} candidate on table {} has no columns",
                            batch,
                            table
                        );
                    }
                    if columns.iter().any(|c| c.trim().is_empty()) {
                        anyhow::bail!(
                            "Config error: {:?} candidate {} on table {} has an empty column name",
                            batch,
                            candidate,
                            table
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
