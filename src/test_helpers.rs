use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use crate::config::Config;
use crate::db::DbPool;
use crate::index::engine::DetectionState;
use crate::inspect::extract_table;
use crate::query::explain::ExplainRow;
use crate::schema::SchemaBackend;
use testcontainers_modules::{
    mysql::Mysql,
    testcontainers::{runners::AsyncRunner, ContainerAsync},
};

/// A statement the engine sent to [`FakeSchema`], with the detection flag at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedStatement {
    pub sql: String,
    pub detecting: Option<bool>,
}

#[derive(Default)]
struct FakeState {
    tables: HashMap<String, Vec<String>>,
    statements: Vec<IssuedStatement>,
    fail_add: HashSet<String>,
    fail_drop: HashSet<String>,
    fail_explain: bool,
    empty_explain: bool,
    hang_explain: bool,
}

/// In-memory [`SchemaBackend`]: tables are lists of index names. Every call is logged
/// and individual operations can be made to fail.
#[derive(Default)]
pub struct FakeSchema {
    state: Mutex<FakeState>,
    detection: Option<Arc<DetectionState>>,
}

impl FakeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record, for every issued statement, whether `detection` was on.
    pub fn watching(mut self, detection: Arc<DetectionState>) -> Self {
        self.detection = Some(detection);
        self
    }

    pub fn with_table(self, table: &str, indexes: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(table.to_string(), indexes.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn fail_add(self, index: &str) -> Self {
        self.state.lock().unwrap().fail_add.insert(index.to_string());
        self
    }

    /// Every drop of `index` fails, under any name.
    pub fn fail_drop(self, index: &str) -> Self {
        self.state.lock().unwrap().fail_drop.insert(index.to_string());
        self
    }

    pub fn fail_explain(self) -> Self {
        self.state.lock().unwrap().fail_explain = true;
        self
    }

    pub fn empty_explain(self) -> Self {
        self.state.lock().unwrap().empty_explain = true;
        self
    }

    /// `explain` never completes until [`FakeSchema::resume_explain`] is called.
    pub fn hang_explain(self) -> Self {
        self.state.lock().unwrap().hang_explain = true;
        self
    }

    pub fn resume_explain(&self) {
        self.state.lock().unwrap().hang_explain = false;
    }

    pub fn indexes(&self, table: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn statements(&self) -> Vec<IssuedStatement> {
        self.state.lock().unwrap().statements.clone()
    }

    /// Statements whose text starts with `prefix`.
    pub fn statements_starting_with(&self, prefix: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .map(|s| s.sql)
            .filter(|s| s.starts_with(prefix))
            .collect()
    }

    fn log(&self, state: &mut FakeState, sql: String) {
        let detecting = self.detection.as_ref().map(|d| d.is_detecting());
        state.statements.push(IssuedStatement { sql, detecting });
    }
}

impl SchemaBackend for FakeSchema {
    async fn index_names(&self, table: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        self.log(&mut state, format!("SHOW INDEXES FROM {}", table));
        match state.tables.get(table) {
            Some(indexes) => Ok(indexes.clone()),
            None => bail!("Table '{}' doesn't exist", table),
        }
    }

    async fn add_index(&self, table: &str, name: &str, columns: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.log(
            &mut state,
            format!("ALTER TABLE {} ADD INDEX {} ({})", table, name, columns.join(", ")),
        );
        if state.fail_add.contains(name) {
            bail!("Key column doesn't exist in table");
        }
        let Some(indexes) = state.tables.get_mut(table) else {
            bail!("Table '{}' doesn't exist", table);
        };
        if indexes.iter().any(|i| i == name) {
            bail!("Duplicate key name '{}'", name);
        }
        indexes.push(name.to_string());
        Ok(())
    }

    async fn drop_index(&self, table: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.log(&mut state, format!("ALTER TABLE {} DROP INDEX {}", table, name));
        if state.fail_drop.contains(name) {
            bail!("Lock wait timeout exceeded");
        }
        let Some(indexes) = state.tables.get_mut(table) else {
            bail!("Table '{}' doesn't exist", table);
        };
        let Some(pos) = indexes.iter().position(|i| i == name) else {
            bail!("Can't DROP '{}'; check that column/key exists", name);
        };
        indexes.remove(pos);
        Ok(())
    }

    /// The plan's `key` is the last index on the queried table (empty if none).
    async fn explain(&self, sql: &str) -> Result<Option<ExplainRow>> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            self.log(&mut state, format!("EXPLAIN {}", sql));
            state.hang_explain
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let state = self.state.lock().unwrap();
        if state.fail_explain {
            bail!("You have an error in your SQL syntax");
        }
        if state.empty_explain {
            return Ok(None);
        }
        let table = extract_table(sql).unwrap_or_default();
        let key = state
            .tables
            .get(&table)
            .and_then(|i| i.iter().filter(|n| *n != "PRIMARY").last().cloned())
            .unwrap_or_default();
        let row: ExplainRow = [
            ("id", "1".to_string()),
            ("select_type", "SIMPLE".to_string()),
            ("table", table),
            ("type", if key.is_empty() { "ALL" } else { "ref" }.to_string()),
            ("key", key),
            ("rows", "1".to_string()),
        ]
        .into_iter()
        .collect();
        Ok(Some(row))
    }
}

/// Holds a test MySQL pool and optionally the container keeping it alive.
/// Dropping this value tears down the container.
pub struct TestDb {
    pub pool: sqlx::MySqlPool,
    pub config: Arc<Config>,
    _container: Option<ContainerAsync<Mysql>>,
}

/// Build a MySQL pool for integration tests.
///
/// - If `MYSQL_HOST` is set, uses env-var config (same production code path as `db.rs`).
/// - Otherwise, starts a throwaway MySQL container via testcontainers (requires Docker).
///
/// Returns `None` when neither is available so callers can skip.
pub async fn setup_test_db() -> Option<TestDb> {
    if std::env::var("MYSQL_HOST").is_ok() {
        let config = match crate::config::merge::load_config() {
            Ok(c) => Arc::new(c),
            Err(e) => {
                eprintln!("skipping: invalid env config: {:#}", e);
                return None;
            }
        };
        let db = match DbPool::new(config.clone()).await {
            Ok(db) => db,
            Err(e) => {
                eprintln!("skipping: cannot connect to env-var MySQL: {:#}", e);
                return None;
            }
        };
        return Some(TestDb {
            pool: db.pool().clone(),
            config,
            _container: None,
        });
    }

    let container = match Mysql::default().start().await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("skipping: cannot start MySQL container (is Docker running?): {}", e);
            return None;
        }
    };

    let host = container.get_host().await.ok()?.to_string();
    let port = container.get_host_port_ipv4(3306).await.ok()?;

    // caching_sha2_password (MySQL 8 default) requires SSL for its full-auth
    // handshake; Preferred enables SSL without verifying the server certificate.
    use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};
    let opts = MySqlConnectOptions::new()
        .host(&host)
        .port(port)
        .username("root")
        .password("") // MYSQL_ALLOW_EMPTY_PASSWORD=yes
        .database("test") // MYSQL_DATABASE=test
        .ssl_mode(MySqlSslMode::Preferred);

    let pool = match MySqlPoolOptions::new()
        .max_connections(4)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect_with(opts)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            eprintln!("skipping: cannot connect to MySQL container: {}", e);
            return None;
        }
    };

    let mut config = Config::default();
    config.connection.host = host;
    config.connection.port = port;
    config.connection.database = Some("test".to_string());

    Some(TestDb {
        pool,
        config: Arc::new(config),
        _container: Some(container),
    })
}
