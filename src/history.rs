use crate::model::chart::{Note, SongInfo, TimingPoint};
use log::debug;
use std::collections::VecDeque;

pub const MAX_HISTORY_SIZE: usize = 50;

/// An independent copy of the chart state at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub song_info: SongInfo,
    pub timing_points: Vec<TimingPoint>,
    pub notes: Vec<Note>,
}

impl HistoryEntry {
    pub fn capture(song_info: &SongInfo, timing_points: &[TimingPoint], notes: &[Note]) -> Self {
        Self {
            song_info: song_info.clone(),
            timing_points: timing_points.to_vec(),
            notes: notes.to_vec(),
        }
    }
}

/// Linear undo/redo history with a cursor pointing at the current entry.
///
/// Recording after an undo discards everything past the cursor, and the oldest
/// entries are evicted once more than `limit` entries are held.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_limit(MAX_HISTORY_SIZE)
    }

    /// A limit of zero is treated as one; the current entry is always retained.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.max(1)),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        if self.cursor + 1 < self.entries.len() {
            let discarded = self.entries.len() - (self.cursor + 1);
            self.entries.truncate(self.cursor + 1);
            debug!("Discarded {} redo entries..!", discarded);
        }

        self.entries.push_back(entry);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
            debug!("History limit of {} reached, evicted the oldest entry..!", self.limit);
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Moves the cursor back one entry and returns the entry now under it.
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_undo() {
            debug!("Nothing to undo..!");
            return None;
        }

        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Moves the cursor forward one entry and returns the entry now under it.
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if !self.can_redo() {
            debug!("Nothing to redo..!");
            return None;
        }

        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
