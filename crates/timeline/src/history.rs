//! Snapshot-based linear undo/redo over the track list.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::Track;

pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Immutable copy of the full track list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    tracks: Arc<Vec<Track>>,
    captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn capture(tracks: &[Track]) -> Self {
        Self {
            tracks: Arc::new(tracks.to_vec()),
            captured_at: Utc::now(),
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// Equality ignores the capture time.
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.tracks == other.tracks
    }
}

#[derive(Debug, Clone)]
pub struct HistoryStack {
    snapshots: VecDeque<Snapshot>,
    index: usize,
    capacity: usize,
}

impl HistoryStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            index: 0,
            capacity: capacity.max(1),
        }
    }

    /// Records `snapshot` as the new current state.
    ///
    /// Everything after the current index is discarded first; if the stack
    /// then exceeds its capacity the oldest entry is evicted.
    pub fn commit(&mut self, snapshot: Snapshot) {
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.index + 1);
        }
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        self.index = self.snapshots.len() - 1;
    }

    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.index == 0 || self.snapshots.is_empty() {
            return None;
        }
        self.index -= 1;
        self.snapshots.get(self.index)
    }

    pub fn redo(&mut self) -> Option<&Snapshot> {
        if self.index + 1 >= self.snapshots.len() {
            return None;
        }
        self.index += 1;
        self.snapshots.get(self.index)
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn oldest(&self) -> Option<&Snapshot> {
        self.snapshots.front()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.index = 0;
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}
