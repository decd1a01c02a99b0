use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::candidate::DedupKey;
use super::store::ResultStore;
use crate::index::record::DiagnosticRecord;

/// What the host knows about the request an observation window belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Request path, e.g. `/api/users`. `None` outside HTTP (jobs, CLI).
    pub path: Option<String>,
    /// The client asked for JSON; reports go to the side-channel instead of the sinks.
    pub expects_json: bool,
}

impl RequestContext {
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            expects_json: false,
        }
    }

    pub fn expecting_json(mut self) -> Self {
        self.expects_json = true;
        self
    }
}

/// Which schema operation a trial failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStage {
    Snapshot,
    Add,
    Explain,
    Drop,
}

impl std::fmt::Display for TrialStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrialStage::Snapshot => "snapshot",
            TrialStage::Add => "add",
            TrialStage::Explain => "explain",
            TrialStage::Drop => "drop",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialFailure {
    pub table: String,
    pub index: Option<String>,
    pub stage: TrialStage,
    pub message: String,
}

/// An index found on a table after cleanup that was not there before the trials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnremovedIndex {
    pub table: String,
    pub index: String,
}

impl std::fmt::Display for UnremovedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.index)
    }
}

/// Everything accumulated for one request (or one process session).
#[derive(Debug, Clone, Default)]
pub struct ObservationWindow {
    request: RequestContext,
    store: ResultStore,
    skipped_tables: Vec<String>,
    unremoved_indexes: Vec<UnremovedIndex>,
    /// Added by the engine and not yet confirmed dropped.
    pending: Vec<UnremovedIndex>,
    /// Every (index, SQL) pair tried in this window, whatever the outcome.
    attempted: HashSet<DedupKey>,
    failures: Vec<TrialFailure>,
}

impl ObservationWindow {
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            ..Default::default()
        }
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        self.store.records()
    }

    /// Tables seen by SELECTs in this window that were not watched, first-seen order.
    pub fn skipped_tables(&self) -> &[String] {
        &self.skipped_tables
    }

    pub fn unremoved_indexes(&self) -> &[UnremovedIndex] {
        &self.unremoved_indexes
    }

    /// Indexes whose trial was interrupted between `ADD INDEX` and a confirmed drop.
    pub fn pending_indexes(&self) -> &[UnremovedIndex] {
        &self.pending
    }

    /// Unremoved indexes followed by pending ones not already among them.
    pub fn residual_indexes(&self) -> Vec<UnremovedIndex> {
        let mut residual = self.unremoved_indexes.clone();
        for entry in &self.pending {
            if !residual.contains(entry) {
                residual.push(entry.clone());
            }
        }
        residual
    }

    pub fn failures(&self) -> &[TrialFailure] {
        &self.failures
    }

    pub(crate) fn store_mut(&mut self) -> &mut ResultStore {
        &mut self.store
    }

    /// Returns `false` if `key` was already tried in this window.
    pub(crate) fn begin_attempt(&mut self, key: &DedupKey) -> bool {
        self.attempted.insert(key.clone())
    }

    pub(crate) fn mark_pending(&mut self, table: &str, index: &str) {
        let entry = UnremovedIndex {
            table: table.to_string(),
            index: index.to_string(),
        };
        if !self.pending.contains(&entry) {
            self.pending.push(entry);
        }
    }

    pub(crate) fn clear_pending(&mut self, table: &str, index: &str) {
        self.pending.retain(|p| p.table != table || p.index != index);
    }

    /// Remove and return the pending index names for `table`.
    pub(crate) fn take_pending(&mut self, table: &str) -> Vec<String> {
        let (taken, kept): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|p| p.table == table);
        self.pending = kept;
        taken.into_iter().map(|p| p.index).collect()
    }

    pub(crate) fn note_skipped(&mut self, table: &str) {
        if !self.skipped_tables.iter().any(|t| t == table) {
            self.skipped_tables.push(table.to_string());
        }
    }

    pub(crate) fn note_unremoved(&mut self, table: &str, index: &str) {
        tracing::warn!(table, index, "index added during trials is still present on the table");
        let entry = UnremovedIndex {
            table: table.to_string(),
            index: index.to_string(),
        };
        if !self.unremoved_indexes.contains(&entry) {
            self.unremoved_indexes.push(entry);
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        table: &str,
        index: Option<&str>,
        stage: TrialStage,
        err: &anyhow::Error,
    ) {
        tracing::warn!(
            table,
            index = index.unwrap_or("-"),
            stage = %stage,
            error = %format!("{:#}", err),
            "index trial step failed"
        );
        self.failures.push(TrialFailure {
            table: table.to_string(),
            index: index.map(str::to_string),
            stage,
            message: format!("{:#}", err),
        });
    }
}
