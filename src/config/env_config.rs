use crate::config::Config;
use crate::index::RequestContext;

// ---------------------------------------------------------------------------
// Helpers use eprintln! because this runs before the logging system starts.
// ---------------------------------------------------------------------------

fn parse_env_num<T: std::str::FromStr>(key: &str) -> Option<T> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => match v.parse::<T>() {
            Ok(n) => Some(n),
            Err(_) => {
                eprintln!(
                    "Warning: {} is set to {:?} but could not be parsed as a number; using default",
                    key, v
                );
                None
            }
        },
        _ => None,
    }
}

fn parse_bool_env(key: &str) -> Option<bool> {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => match v.to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => {
                eprintln!(
                    "Warning: {} is set to {:?} but is not a recognized boolean \
                     (true/false/1/0/yes/no); using default",
                    key, v
                );
                None
            }
        },
        _ => None,
    }
}

/// Comma-separated list; blank entries dropped. An empty variable yields an empty list.
fn parse_list_env(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|v| split_list(&v))
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The request the harness replays under: `INDEXER_REQUEST_PATH` and
/// `INDEXER_REQUEST_JSON`. Unset variables give the default context.
pub fn load_request_context() -> RequestContext {
    RequestContext {
        path: std::env::var("INDEXER_REQUEST_PATH").ok().filter(|p| !p.is_empty()),
        expects_json: parse_bool_env("INDEXER_REQUEST_JSON").unwrap_or(false),
    }
}

/// Parse all environment variables and return a partial Config to merge over TOML base.
/// Only sets fields where the env var is actually present.
pub fn load_env_config() -> EnvConfig {
    EnvConfig {
        host: std::env::var("MYSQL_HOST").ok(),
        port: parse_env_num::<u16>("MYSQL_PORT"),
        socket: std::env::var("MYSQL_SOCKET_PATH").ok(),
        user: std::env::var("MYSQL_USER").ok(),
        password: std::env::var("MYSQL_PASS").ok(),
        database: std::env::var("MYSQL_DB").ok().filter(|s| !s.is_empty()),
        connection_string: std::env::var("MYSQL_CONNECTION_STRING")
            .ok()
            .filter(|s| !s.is_empty()),
        pool_size: parse_env_num::<u32>("MYSQL_POOL_SIZE"),
        connect_timeout_ms: parse_env_num::<u64>("MYSQL_CONNECT_TIMEOUT"),
        ssl: parse_bool_env("MYSQL_SSL"),
        ssl_accept_invalid_certs: parse_bool_env("MYSQL_SSL_ACCEPT_INVALID_CERTS"),
        ssl_ca: std::env::var("MYSQL_SSL_CA").ok().filter(|s| !s.is_empty()),
        log_level: std::env::var("INDEXER_LOG_LEVEL").ok().filter(|s| !s.is_empty()),
        enabled: parse_bool_env("INDEXER_ENABLED"),
        debug: parse_bool_env("APP_DEBUG"),
        slow_threshold_ms: parse_env_num::<u64>("INDEXER_SLOW_THRESHOLD_MS"),
        watch_all: parse_bool_env("INDEXER_WATCH_ALL"),
        output_to: parse_list_env("INDEXER_OUTPUT"),
        json_path: std::env::var("INDEXER_JSON_PATH").ok().filter(|s| !s.is_empty()),
        ignored_tables: parse_list_env("INDEXER_IGNORED_TABLES"),
        ignore_paths: parse_list_env("INDEXER_IGNORE_PATHS"),
    }
}

/// All env var overrides (None = not set, don't override).
#[derive(Debug, Default)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub socket: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub connection_string: Option<String>,
    pub pool_size: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub ssl: Option<bool>,
    pub ssl_accept_invalid_certs: Option<bool>,
    pub ssl_ca: Option<String>,
    pub log_level: Option<String>,
    pub enabled: Option<bool>,
    pub debug: Option<bool>,
    pub slow_threshold_ms: Option<u64>,
    pub watch_all: Option<bool>,
    pub output_to: Option<Vec<String>>,
    pub json_path: Option<String>,
    pub ignored_tables: Option<Vec<String>>,
    pub ignore_paths: Option<Vec<String>>,
}

impl EnvConfig {
    /// Apply env var overrides onto a base Config, returning the merged result.
    pub fn apply_to(self, mut base: Config) -> Config {
        if let Some(v) = self.host {
            base.connection.host = v;
        }
        if let Some(v) = self.port {
            base.connection.port = v;
        }
        if let Some(v) = self.socket {
            base.connection.socket = Some(v);
        }
        if let Some(v) = self.user {
            base.connection.user = v;
        }
        if let Some(v) = self.password {
            base.connection.password = v;
        }
        if let Some(v) = self.database {
            base.connection.database = Some(v);
        }
        if let Some(v) = self.connection_string {
            base.connection.connection_string = Some(v);
        }
        if let Some(v) = self.pool_size {
            base.pool.size = v;
        }
        if let Some(v) = self.connect_timeout_ms {
            base.pool.connect_timeout_ms = v;
        }
        if let Some(v) = self.ssl {
            base.security.ssl = v;
        }
        if let Some(v) = self.ssl_accept_invalid_certs {
            base.security.ssl_accept_invalid_certs = v;
        }
        if let Some(v) = self.ssl_ca {
            base.security.ssl_ca = Some(v);
        }
        if let Some(v) = self.log_level {
            base.monitoring.log_level = v;
        }
        if let Some(v) = self.enabled {
            base.indexer.enabled = Some(v);
        }
        if let Some(v) = self.debug {
            base.indexer.debug = v;
        }
        if let Some(v) = self.slow_threshold_ms {
            base.indexer.slow_threshold_ms = v;
        }
        if let Some(v) = self.watch_all {
            base.indexer.watch_all = v;
        }
        if let Some(v) = self.output_to {
            base.indexer.output_to = v;
        }
        if let Some(v) = self.json_path {
            base.indexer.json_path = v;
        }
        if let Some(v) = self.ignored_tables {
            base.indexer.ignored_tables = v;
        }
        if let Some(v) = self.ignore_paths {
            // Env patterns are added to, not substituted for, the TOML ones.
            for p in v {
                if !base.indexer.ignore_paths.contains(&p) {
                    base.indexer.ignore_paths.push(p);
                }
            }
        }
        base
    }
}
