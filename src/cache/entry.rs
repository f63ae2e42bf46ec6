//! `CacheEntry` — the unit of storage shared by every backend.

use serde::{Deserialize, Serialize};

/// A single cached translation, identified by its composite hash.
///
/// Invariants:
/// - `id` is unique and stable for the lifetime of the entry in a given
///   backend; backends never reuse an id after a record is removed.
/// - `hash` is the SHA-256 composite key from [`crate::hash::composite_key`]
///   and is unique within a backend.
/// - `count` starts at 1 on creation and only ever increases via
///   [`CacheEntry::confirm`], or resets to 1 via
///   [`CacheEntry::replace_translation`].
/// - `last_used` is monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub id: u64,
    pub hash: String,
    pub from_lang: String,
    pub to_lang: String,
    pub source_text: String,
    pub translated_text: String,
    pub count: u32,
    pub created_at: i64,
    pub last_used: i64,
}

impl CacheEntry {
    /// Build a fresh entry with `count = 1` and `created_at == last_used == now`.
    pub fn new(
        id: u64,
        hash: String,
        from_lang: String,
        to_lang: String,
        source_text: String,
        translated_text: String,
        now: i64,
    ) -> Self {
        Self {
            id,
            hash,
            from_lang,
            to_lang,
            source_text,
            translated_text,
            count: 1,
            created_at: now,
            last_used: now,
        }
    }

    /// Record a lookup hit: bump `last_used` without touching `count`.
    pub fn touch(&mut self, now: i64) {
        self.last_used = now.max(self.last_used);
    }

    /// Record a repeated, matching translation: increment `count` and touch.
    pub fn confirm(&mut self, now: i64) {
        self.count = self.count.saturating_add(1);
        self.touch(now);
    }

    /// Replace the translation with a new candidate and reset the admission
    /// counter back to 1, per the confirm-by-repetition reconciliation rule.
    pub fn replace_translation(&mut self, translated_text: String, now: i64) {
        self.translated_text = translated_text;
        self.count = 1;
        self.touch(now);
    }

    /// Whether this entry is old enough to be pruned, given a cutoff in the
    /// same epoch as `created_at`/`last_used` (seconds since Unix epoch).
    pub fn is_expired(&self, cutoff: i64) -> bool {
        self.last_used < cutoff
    }
}
