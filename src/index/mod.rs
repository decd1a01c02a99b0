//! The index-trial engine and the data it produces.
//!
//! # Submodules
//! - `candidate`: index candidates, their conventional names and dedup keys
//! - `engine`:    [`Indexer`]: add / explain / drop trials with cleanup and reconciliation
//! - `record`:    diagnostic records and the record builder
//! - `store`:     per-window, first-write-wins record store
//! - `window`:    observation window, request context, failures and residue
//!
//! Trials mutate live schema, so they run strictly one at a time and every index the
//! engine creates is dropped again before [`Indexer::observe`] returns. A reconciliation
//! pass compares each table's indexes with the pre-trial snapshot and reports anything
//! left behind. Nothing guards against two windows trialing the same table concurrently.

pub mod candidate;
pub mod engine;
pub mod record;
pub mod store;
pub mod window;

pub use candidate::{CandidateBatch, DedupKey, IndexCandidate};
pub use engine::{DetectionState, Indexer, Observation, QueryObservation, SuspendGuard};
pub use record::{DiagnosticRecord, OptimizedKeyRule, RecordBuilder};
pub use store::ResultStore;
pub use window::{ObservationWindow, RequestContext, TrialFailure, TrialStage, UnremovedIndex};
