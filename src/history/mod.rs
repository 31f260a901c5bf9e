// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory prediction history
//!
//! Process-lifetime ring buffer of completed inference results. Capacity is
//! fixed at construction; inserting at capacity evicts the oldest record.
//! All access goes through a mutex so concurrent handlers cannot corrupt the
//! buffer. Nothing here is persisted - a restart starts empty.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// Default number of retained predictions
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// One completed inference result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Short hex identifier, unique within the buffer
    pub id: String,
    /// Wall-clock completion time, float seconds since epoch
    pub timestamp: f64,
    /// Class label -> occurrence count, only labels that were seen
    pub detections: BTreeMap<String, u64>,
    /// Raw number of detected regions
    pub total_objects: usize,
    /// Occupied-area percentage, present only when the model produced masks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density_percentage: Option<f64>,
    /// Annotated rendering of the input, base64-encoded JPEG
    pub annotated_image_base64: String,
}

/// Fixed-capacity, insertion-ordered store of prediction records
pub struct HistoryStore {
    capacity: usize,
    entries: Mutex<VecDeque<PredictionRecord>>,
}

impl HistoryStore {
    /// Create an empty store with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Create an empty store with the default capacity (20)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PredictionRecord>> {
        // The buffer holds plain data with no cross-entry invariants, so a
        // poisoned lock is still safe to reuse.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record, evicting the oldest entry when at capacity
    pub fn insert(&self, record: PredictionRecord) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    /// All retained records, most recent first
    pub fn list(&self) -> Vec<PredictionRecord> {
        let mut records: Vec<PredictionRecord> = self.lock().iter().cloned().collect();
        records.sort_by(|a, b| {
            b.timestamp
                .partial_cmp(&a.timestamp)
                .unwrap_or(Ordering::Equal)
        });
        records
    }

    /// Look up a record by id (linear scan - the buffer is tiny)
    pub fn get(&self, id: &str) -> Option<PredictionRecord> {
        self.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Discard all retained records. Idempotent.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
