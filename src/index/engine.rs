use anyhow::Result;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::candidate::{CandidateBatch, DedupKey, IndexCandidate};
use super::record::{OptimizedKeyRule, RecordBuilder, RecordInput};
use super::window::{ObservationWindow, RequestContext, TrialStage};
use crate::config::IndexerConfig;
use crate::inspect::{MySqlQuoter, QueryEvent, Quoter, SourceLocation, SqlInspection};
use crate::schema::SchemaBackend;

/// Whether intercepted queries should currently be observed.
///
/// Owned by whoever owns the observation window and passed into [`Indexer::observe`].
/// The engine turns detection off while it talks to the database so that its own
/// `SHOW INDEXES`, `ALTER TABLE` and `EXPLAIN` statements are never observed.
#[derive(Debug)]
pub struct DetectionState {
    detecting: AtomicBool,
}

impl Default for DetectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionState {
    pub fn new() -> Self {
        Self {
            detecting: AtomicBool::new(true),
        }
    }

    pub fn is_detecting(&self) -> bool {
        self.detecting.load(Ordering::SeqCst)
    }

    pub fn enable(&self) {
        self.detecting.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.detecting.store(false, Ordering::SeqCst);
    }

    /// Turn detection off until the returned guard is dropped, then restore the
    /// previous value.
    pub fn suspend(&self) -> SuspendGuard<'_> {
        let previous = self.detecting.swap(false, Ordering::SeqCst);
        SuspendGuard {
            state: self,
            previous,
        }
    }
}

#[must_use = "detection resumes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuspendGuard<'a> {
    state: &'a DetectionState,
    previous: bool,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.state.detecting.store(self.previous, Ordering::SeqCst);
    }
}

/// What [`Indexer::observe`] did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Detection was off (the event came from the engine itself).
    Suspended,
    IgnoredPath,
    NotSelect,
    /// No table could be extracted from the statement.
    NoTable,
    Unwatched { table: String },
    Trialed { table: String, recorded: usize },
}

/// One SELECT the engine decided to trial.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryObservation {
    /// Bound SQL.
    pub sql: String,
    pub table: String,
    pub elapsed_ms: f64,
    pub source: Option<SourceLocation>,
}

/// Outcome of a single candidate trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CandidateTrial {
    /// This (index, SQL) pair was already tried in the window; no database work was done.
    Deduplicated,
    /// Snapshot or `ADD INDEX` failed; nothing was created.
    Failed,
    Completed { added: bool, recorded: bool },
}

/// An index created by the engine that has not been dropped yet.
#[must_use = "a provisional index must be released"]
struct ProvisionalIndex {
    name: String,
}

/// The index-trial engine.
pub struct Indexer<B, Q = MySqlQuoter> {
    backend: B,
    quoter: Q,
    config: IndexerConfig,
    builder: RecordBuilder,
    ignore_paths: Vec<Regex>,
}

impl<B: SchemaBackend> Indexer<B> {
    pub fn new(backend: B, config: IndexerConfig) -> Result<Self> {
        Self::with_quoter(backend, MySqlQuoter, config)
    }
}

impl<B: SchemaBackend, Q: Quoter + Send + Sync> Indexer<B, Q> {
    pub fn with_quoter(backend: B, quoter: Q, config: IndexerConfig) -> Result<Self> {
        let ignore_paths = config
            .effective_ignore_paths()
            .iter()
            .map(|p| path_pattern(p))
            .collect::<Result<Vec<_>>>()?;
        let builder = RecordBuilder::new(config.slow_threshold_ms);
        Ok(Self {
            backend,
            quoter,
            config,
            builder,
            ignore_paths,
        })
    }

    /// Replace the rule that decides whether a plan counts as optimized.
    pub fn with_optimized_key_rule(mut self, rule: OptimizedKeyRule) -> Self {
        self.builder = self.builder.with_optimized_key_rule(rule);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// False when the request path matches an ignore pattern.
    pub fn is_allowed_request(&self, request: &RequestContext) -> bool {
        let Some(path) = request.path.as_deref() else {
            return true;
        };
        let path = path.trim_start_matches('/');
        let path = if path.is_empty() { "/" } else { path };
        !self.ignore_paths.iter().any(|re| re.is_match(path))
    }

    /// Ignored tables are never watched. Otherwise a table is watched when it has an entry
    /// in `watched_tables`, or always in watch-all mode.
    pub fn is_table_watched(&self, table: &str) -> bool {
        if self.config.is_ignored_table(table) {
            return false;
        }
        self.config.watch_all || self.config.watched_table(table).is_some()
    }

    /// Index names currently on `table`.
    pub async fn snapshot_indexes(&self, table: &str) -> Result<Vec<String>> {
        self.backend.index_names(table).await
    }

    /// Feed one executed statement through the engine.
    ///
    /// Never fails: every database error is logged and recorded on `window`, and the
    /// worst outcome for the host is a missing record or an entry in the window's
    /// unremoved indexes.
    ///
    /// Not cancel-safe. If the future is dropped between `ADD INDEX` and the matching
    /// drop, the index stays on the table; it is left in the window's pending indexes and
    /// reported through [`ObservationWindow::residual_indexes`].
    pub async fn observe(
        &self,
        detection: &DetectionState,
        window: &mut ObservationWindow,
        event: QueryEvent,
    ) -> Observation {
        if !detection.is_detecting() {
            return Observation::Suspended;
        }
        if !self.is_allowed_request(window.request()) {
            tracing::debug!(path = ?window.request().path, "request path ignored");
            return Observation::IgnoredPath;
        }

        let inspection = SqlInspection::from_event(&event, &self.quoter);
        if !inspection.kind.is_select() {
            return Observation::NotSelect;
        }
        let Some(table) = inspection.table else {
            tracing::debug!(sql = %inspection.sql, "no table found in query");
            return Observation::NoTable;
        };
        if !self.is_table_watched(&table) {
            tracing::debug!(table = %table, "table not watched");
            window.note_skipped(&table);
            return Observation::Unwatched { table };
        }

        let query = QueryObservation {
            sql: inspection.sql,
            table: table.clone(),
            elapsed_ms: event.elapsed_ms,
            source: event.source,
        };

        let _suspended = detection.suspend();
        let recorded = self.trial_table(window, &query).await;
        Observation::Trialed { table, recorded }
    }

    async fn trial_table(&self, window: &mut ObservationWindow, query: &QueryObservation) -> usize {
        let table = query.table.as_str();
        let watched = self.config.watched_table(table).cloned().unwrap_or_default();
        if watched.is_empty() {
            tracing::debug!(table, "watched table has no candidates configured");
            return 0;
        }

        // Without a baseline, residue could not be detected; do not touch the table.
        let baseline = match self.snapshot_indexes(table).await {
            Ok(names) => names,
            Err(e) => {
                window.record_failure(table, None, TrialStage::Snapshot, &e);
                return 0;
            }
        };

        let mut recorded = 0;
        for (batch, candidates) in watched.batches() {
            if candidates.is_empty() {
                continue;
            }
            tracing::info!(
                table,
                batch = ?batch,
                candidates = candidates.len(),
                "trialing index batch"
            );
            let (added, batch_recorded) = self.apply_batch(window, batch, &candidates, query).await;
            recorded += batch_recorded;
            self.cleanup(window, table, &added).await;
        }

        self.reconcile(window, table, &baseline).await;
        recorded
    }

    /// Trial every candidate in order. Returns the candidates this engine created (not
    /// the pre-existing ones) and the number of new records.
    pub(crate) async fn apply_batch(
        &self,
        window: &mut ObservationWindow,
        batch: CandidateBatch,
        candidates: &[IndexCandidate],
        query: &QueryObservation,
    ) -> (Vec<IndexCandidate>, usize) {
        let mut added = Vec::new();
        let mut recorded = 0;
        for candidate in candidates {
            if let CandidateTrial::Completed {
                added: was_added,
                recorded: was_recorded,
            } = self.trial_candidate(window, batch, candidate, query).await
            {
                if was_added {
                    added.push(candidate.clone());
                }
                if was_recorded {
                    recorded += 1;
                }
            }
        }
        (added, recorded)
    }

    pub(crate) async fn trial_candidate(
        &self,
        window: &mut ObservationWindow,
        batch: CandidateBatch,
        candidate: &IndexCandidate,
        query: &QueryObservation,
    ) -> CandidateTrial {
        let table = query.table.as_str();
        let name = candidate.conventional_name(table);
        let key = DedupKey::new(&name, &query.sql);
        if !window.begin_attempt(&key) {
            tracing::debug!(table, index = %name, "candidate already tried for this query");
            return CandidateTrial::Deduplicated;
        }

        let snapshot = match self.snapshot_indexes(table).await {
            Ok(names) => names,
            Err(e) => {
                window.record_failure(table, Some(&name), TrialStage::Snapshot, &e);
                return CandidateTrial::Failed;
            }
        };
        let was_preexisting = candidate.is_present_in(table, &snapshot);

        let provisional = if was_preexisting {
            None
        } else {
            window.mark_pending(table, &name);
            match self.backend.add_index(table, &name, &candidate.columns()).await {
                Ok(()) => Some(ProvisionalIndex { name: name.clone() }),
                Err(e) => {
                    window.clear_pending(table, &name);
                    window.record_failure(table, Some(&name), TrialStage::Add, &e);
                    return CandidateTrial::Failed;
                }
            }
        };
        let added = provisional.is_some();

        let explained = self.backend.explain(&query.sql).await;

        if let Some(index) = provisional {
            self.release(window, table, index).await;
        }

        let recorded = match explained {
            Ok(Some(plan)) => {
                let record = self.builder.build(RecordInput {
                    table,
                    candidate,
                    batch,
                    was_preexisting,
                    plan,
                    sql: &query.sql,
                    elapsed_ms: query.elapsed_ms,
                    source: query.source.as_ref(),
                    skipped_tables: window.skipped_tables(),
                });
                window.store_mut().put(key, record)
            }
            Ok(None) => {
                tracing::debug!(table, index = %name, "EXPLAIN returned no rows");
                false
            }
            Err(e) => {
                window.record_failure(table, Some(&name), TrialStage::Explain, &e);
                false
            }
        };

        CandidateTrial::Completed { added, recorded }
    }

    /// Drop a provisional index by the name it was created under. A failure is recorded
    /// and left for the batch cleanup to retry.
    async fn release(&self, window: &mut ObservationWindow, table: &str, index: ProvisionalIndex) -> bool {
        match self.backend.drop_index(table, &index.name).await {
            Ok(()) => {
                window.clear_pending(table, &index.name);
                true
            }
            Err(e) => {
                window.record_failure(table, Some(&index.name), TrialStage::Drop, &e);
                false
            }
        }
    }

    /// Make sure every index in `added` is gone. Indexes already released are skipped;
    /// the rest are dropped by literal name first, then by conventional name.
    pub(crate) async fn cleanup(&self, window: &mut ObservationWindow, table: &str, added: &[IndexCandidate]) {
        if added.is_empty() {
            return;
        }
        let present = match self.snapshot_indexes(table).await {
            Ok(names) => Some(names),
            Err(e) => {
                window.record_failure(table, None, TrialStage::Snapshot, &e);
                None
            }
        };
        for candidate in added {
            let name = candidate.conventional_name(table);
            if let Some(present) = &present {
                if !present.contains(&name) {
                    window.clear_pending(table, &name);
                    continue;
                }
            }
            match self.drop_candidate(table, candidate).await {
                Ok(()) => window.clear_pending(table, &name),
                Err(e) => window.record_failure(table, Some(&name), TrialStage::Drop, &e),
            }
        }
    }

    async fn drop_candidate(&self, table: &str, candidate: &IndexCandidate) -> Result<()> {
        let conventional = candidate.conventional_name(table);
        if let Some(literal) = candidate.literal_name().filter(|l| *l != conventional) {
            match self.backend.drop_index(table, literal).await {
                Ok(()) => return Ok(()),
                Err(e) => tracing::debug!(table, index = literal, error = %e, "drop by literal name failed"),
            }
        }
        self.backend.drop_index(table, &conventional).await
    }

    /// Compare the table's indexes with `baseline` and report anything new as unremoved,
    /// along with pending indexes from interrupted trials that are still present.
    /// Returns the residual index names.
    pub(crate) async fn reconcile(
        &self,
        window: &mut ObservationWindow,
        table: &str,
        baseline: &[String],
    ) -> Vec<String> {
        let current = match self.snapshot_indexes(table).await {
            Ok(names) => names,
            Err(e) => {
                window.record_failure(table, None, TrialStage::Snapshot, &e);
                return Vec::new();
            }
        };
        let pending = window.take_pending(table);
        let residue: Vec<String> = current
            .into_iter()
            .filter(|name| !baseline.contains(name) || pending.contains(name))
            .collect();
        for name in &residue {
            window.note_unremoved(table, name);
        }
        residue
    }
}

/// Compile an ignore pattern where `*` matches anything, anchored at both ends.
fn path_pattern(pattern: &str) -> Result<Regex> {
    let pattern = pattern.trim_start_matches('/');
    let pattern = if pattern.is_empty() { "/" } else { pattern };
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Ok(Regex::new(&format!("^{}$", escaped))?)
}
