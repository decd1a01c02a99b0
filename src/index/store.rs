use std::collections::HashMap;

use super::candidate::DedupKey;
use super::record::DiagnosticRecord;

/// Per-window record store, keyed by [`DedupKey`]. The first record stored under a key
/// wins; iteration follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    records: Vec<DiagnosticRecord>,
    keys: HashMap<DedupKey, usize>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` under `key`. Returns `false` (and drops `record`) if the key is taken.
    pub fn put(&mut self, key: DedupKey, record: DiagnosticRecord) -> bool {
        if self.keys.contains_key(&key) {
            return false;
        }
        self.keys.insert(key, self.records.len());
        self.records.push(record);
        true
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains_key(key)
    }

    pub fn get(&self, key: &DedupKey) -> Option<&DiagnosticRecord> {
        self.keys.get(key).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose plan used an index and that were not slow.
    pub fn optimized_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.is_optimized() && !r.is_slow)
            .count()
    }

    pub fn slow_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_slow).count()
    }
}
