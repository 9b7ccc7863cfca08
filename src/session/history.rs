//! Bounded record of completed exchanges

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::language::LanguageTag;

/// Entries kept before the oldest is evicted
pub const HISTORY_CAPACITY: usize = 5;

/// One completed exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub original_text: String,
    pub translated_text: String,
    pub source_language: LanguageTag,
    pub target_language: LanguageTag,
    pub timestamp: DateTime<Utc>,
}

/// Newest-first history capped at [`HISTORY_CAPACITY`]
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    next_id: u64,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self {
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
            next_id: 1,
        }
    }
}

impl HistoryBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the front, dropping the oldest beyond capacity
    pub fn append(&mut self, entry: HistoryEntry) {
        self.next_id = self.next_id.max(entry.id.saturating_add(1));
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    /// Build an entry stamped now with the next id and append it
    pub fn record(
        &mut self,
        original_text: &str,
        translated_text: &str,
        source_language: &LanguageTag,
        target_language: &LanguageTag,
    ) -> u64 {
        let id = self.next_id;
        self.append(HistoryEntry {
            id,
            original_text: original_text.to_string(),
            translated_text: translated_text.to_string(),
            source_language: source_language.clone(),
            target_language: target_language.clone(),
            timestamp: Utc::now(),
        });
        id
    }

    /// Remove every entry; ids keep increasing
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, newest first
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}
