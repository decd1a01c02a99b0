use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlConnectOptions, MySqlSslMode};
use std::str::FromStr;
use crate::config::Config;

pub struct DbPool {
    pool: MySqlPool,
    pub config: Arc<Config>,
}

impl DbPool {
    pub async fn new(config: Arc<Config>) -> Result<Self> {
        let pool = build_pool(&config).await?;
        Ok(Self { pool, config })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

async fn build_pool(config: &Config) -> Result<MySqlPool> {
    let connect_options = build_connect_options_from_config(config)?;

    // Every statement the engine issues is dynamic SQL.
    let pool = MySqlPoolOptions::new()
        .max_connections(config.pool.size)
        .acquire_timeout(Duration::from_millis(config.pool.connect_timeout_ms))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(connect_options.statement_cache_capacity(16))
        .await
        .with_context(|| describe_target(config))?;

    Ok(pool)
}

/// `user@host:port/db` (or the socket path) for error messages; never includes the password.
fn describe_target(config: &Config) -> String {
    let conn = &config.connection;
    if conn.connection_string.is_some() {
        return "connecting with MYSQL_CONNECTION_STRING".to_string();
    }
    let db = conn.database.as_deref().unwrap_or("");
    match &conn.socket {
        Some(socket) => format!("connecting to {}@{}/{}", conn.user, socket, db),
        None => format!("connecting to {}@{}:{}/{}", conn.user, conn.host, conn.port, db),
    }
}

pub(crate) fn build_connect_options_from_config(config: &Config) -> Result<MySqlConnectOptions> {
    let conn = &config.connection;

    // If a full mysql:// URL is given, parse it directly
    if let Some(cs) = &conn.connection_string {
        if cs.starts_with("mysql://") || cs.starts_with("mysql+ssl://") {
            let opts = MySqlConnectOptions::from_str(cs)?;
            return Ok(opts);
        }
        anyhow::bail!("MYSQL_CONNECTION_STRING must be a mysql:// URL");
    }

    // Unix socket path
    if let Some(socket) = &conn.socket {
        let mut opts = MySqlConnectOptions::new()
            .socket(socket)
            .username(&conn.user)
            .password(&conn.password);
        if let Some(db) = &conn.database {
            opts = opts.database(db);
        }
        return Ok(opts);
    }

    // TCP connection
    // When ssl_ca is set without ssl_accept_invalid_certs, use VerifyCa:
    //   - validates the cert chain against the specified CA
    //   - does NOT check hostname/IP (servers often use CN=hostname without a SAN)
    let ssl_mode = match (config.security.ssl, config.security.ssl_accept_invalid_certs, config.security.ssl_ca.is_some()) {
        (false, _, _)      => MySqlSslMode::Disabled,
        (true, true, _)    => MySqlSslMode::Required,     // SSL on, skip cert verification
        (true, false, true) => MySqlSslMode::VerifyCa,    // SSL on, verify CA only (no hostname check)
        (true, false, false) => MySqlSslMode::VerifyIdentity, // SSL on, verify cert + hostname
    };
    let mut opts = MySqlConnectOptions::new()
        .host(&conn.host)
        .port(conn.port)
        .username(&conn.user)
        .password(&conn.password)
        .ssl_mode(ssl_mode);
    if let Some(db) = &conn.database {
        opts = opts.database(db);
    }
    if let Some(ca_path) = &config.security.ssl_ca {
        opts = opts.ssl_ca(ca_path);
    }
    Ok(opts)
}
