//! Output boundary: turns an observation window into a [`Report`] and hands it to the
//! configured sinks.
//!
//! # Submodules
//! - `sinks`:        [`ReportSink`] implementations (`log`, `console`, `json`) and the registry
//! - `side_channel`: JSON file read by out-of-band pollers, keyed by a content hash
//!
//! Sinks only ever see the report by shared reference.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::index::{DiagnosticRecord, ObservationWindow, RequestContext, TrialFailure, UnremovedIndex};

pub mod side_channel;
pub mod sinks;

pub use side_channel::{read_side_channel, write_side_channel, SideChannelPayload};
pub use sinks::{build_sinks, dispatch, render_text, ConsoleSink, JsonSink, LogSink, ReportSink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCounts {
    pub total: usize,
    /// Records whose plan used an index and that were not slow.
    pub optimized: usize,
    pub slow: usize,
}

/// Everything one observation window produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub records: Vec<DiagnosticRecord>,
    pub counts: ReportCounts,
    pub unremoved_indexes: Vec<UnremovedIndex>,
    pub skipped_tables: Vec<String>,
    pub failures: Vec<TrialFailure>,
}

impl Report {
    pub fn from_window(window: &ObservationWindow) -> Self {
        let store = window.store();
        Self {
            records: store.records().to_vec(),
            counts: ReportCounts {
                total: store.len(),
                optimized: store.optimized_count(),
                slow: store.slow_count(),
            },
            unremoved_indexes: window.residual_indexes(),
            skipped_tables: window.skipped_tables().to_vec(),
            failures: window.failures().to_vec(),
        }
    }

    /// Nothing worth showing: no records and no residue.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.unremoved_indexes.is_empty()
    }
}

/// Deliver `report`: requests that expect JSON get the side-channel file at
/// `side_channel_path`, everything else goes through `sinks`. Returns the names of
/// sinks that failed.
pub fn publish(
    sinks: &[Box<dyn ReportSink>],
    report: &Report,
    request: &RequestContext,
    side_channel_path: &Path,
) -> Result<Vec<String>> {
    if request.expects_json {
        write_side_channel(side_channel_path, report)?;
        return Ok(Vec::new());
    }
    Ok(dispatch(sinks, report, request))
}
