use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use super::{Report, ReportCounts};
use crate::index::{DiagnosticRecord, UnremovedIndex};

/// Contents of the side-channel file. `key` changes whenever the records, counts or
/// unremoved indexes do, so pollers can skip payloads they have already shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideChannelPayload {
    pub key: String,
    /// Not part of `key`.
    pub generated_at: DateTime<Utc>,
    pub counts: ReportCounts,
    pub records: Vec<DiagnosticRecord>,
    pub unremoved_indexes: Vec<UnremovedIndex>,
}

impl SideChannelPayload {
    pub fn from_report(report: &Report) -> Result<Self> {
        let content = serde_json::to_vec(&(&report.records, &report.counts, &report.unremoved_indexes))?;
        Ok(Self {
            key: hex::encode(Sha256::digest(&content)),
            generated_at: Utc::now(),
            counts: report.counts,
            records: report.records.clone(),
            unremoved_indexes: report.unremoved_indexes.clone(),
        })
    }
}

/// Write `report` to `path`, replacing any previous payload. The file is written next to
/// `path` and renamed into place so readers never see a partial document.
pub fn write_side_channel(path: &Path, report: &Report) -> Result<SideChannelPayload> {
    let payload = SideChannelPayload::from_report(report)?;
    let json = serde_json::to_string_pretty(&payload)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(payload)
}

/// Read the current payload; `Ok(None)` when nothing has been written yet.
pub fn read_side_channel(path: &Path) -> Result<Option<SideChannelPayload>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let payload = serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(payload))
}
