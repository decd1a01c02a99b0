use std::sync::Arc;
use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mysql_indexer::config;
use mysql_indexer::db::DbPool;
use mysql_indexer::index::{DetectionState, Indexer, ObservationWindow};
use mysql_indexer::replay::parse_line;
use mysql_indexer::report::{self, Report};
use mysql_indexer::schema::MySqlSchema;

/// Replays SQL statements (one per line, from FILE or stdin) through the index-trial
/// engine against the configured database, then reports to the configured outputs.
/// `INDEXER_REQUEST_PATH` and `INDEXER_REQUEST_JSON` set the request being replayed.
#[tokio::main]
async fn main() -> Result<()> {
    let config = config::merge::load_config()?;

    // Logs go to stderr; stdout is left to the caller.
    let filter = EnvFilter::try_new(&config.monitoring.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
    info!("mysql-indexer starting");

    if !config.indexer.is_enabled() {
        info!("indexer disabled (set INDEXER_ENABLED=true or APP_DEBUG=true)");
        return Ok(());
    }
    let config = Arc::new(config);

    let db = DbPool::new(config.clone()).await?;
    info!("Database pool created");

    let indexer = Indexer::new(MySqlSchema::new(db.pool().clone()), config.indexer.clone())?;
    let sinks = report::build_sinks(&config.indexer)?;

    let path = std::env::args().nth(1);
    let origin = path.clone().unwrap_or_else(|| "<stdin>".to_string());
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &path {
        Some(p) => Box::new(BufReader::new(
            tokio::fs::File::open(p)
                .await
                .with_context(|| format!("opening {}", p))?,
        )),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let detection = DetectionState::new();
    let request = config::env_config::load_request_context();
    if let Some(path) = &request.path {
        info!(path = %path, expects_json = request.expects_json, "replaying under request");
    }
    let mut window = ObservationWindow::new(request);
    let mut lines = reader.lines();
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let event = match parse_line(&line, &origin, line_no) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("skipping line: {:#}", e);
                continue;
            }
        };
        let outcome = indexer.observe(&detection, &mut window, event).await;
        tracing::debug!(line = line_no, outcome = ?outcome, "statement replayed");
    }

    let report = Report::from_window(&window);
    let failed = report::publish(
        &sinks,
        &report,
        window.request(),
        std::path::Path::new(&config.indexer.json_path),
    )?;
    if !failed.is_empty() {
        tracing::warn!("{} report output(s) failed: {}", failed.len(), failed.join(", "));
    }
    if !report.unremoved_indexes.is_empty() {
        anyhow::bail!(
            "{} index(es) left behind by the indexer",
            report.unremoved_indexes.len()
        );
    }

    Ok(())
}
