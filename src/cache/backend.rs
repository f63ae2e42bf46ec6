//! The `Backend` trait: the operations every cache storage engine
//! implements, and the `BackendKind` that selects one.

use crate::cache::entry::CacheEntry;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Aggregate counts returned by [`Backend::stats`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
}

/// Which concrete storage engine backs a [`crate::cache::CacheFacade`].
///
/// `Mongodb` and `Redis` are reserved — networked backends are out of scope
/// for this implementation — but named here so configuration can reject them
/// with a clear "not supported" error rather than an unknown-variant one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Text,
    Sqlite,
    Mongodb,
    Redis,
}

impl BackendKind {
    /// Backends this build actually implements.
    pub fn is_supported(self) -> bool {
        matches!(self, BackendKind::Text | BackendKind::Sqlite)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BackendKind::Text => "text",
            BackendKind::Sqlite => "sqlite",
            BackendKind::Mongodb => "mongodb",
            BackendKind::Redis => "redis",
        };
        write!(f, "{s}")
    }
}

/// Storage engine for translation cache entries.
///
/// Implementations never panic on malformed on-disk data; they skip and log
/// the offending record instead. All methods take
/// `&mut self` even where a given implementation could get away with
/// interior mutability plus `&self`, because the [`crate::cache::CacheFacade`]
/// already serializes access through a single `RwLock` and backends should
/// not need their own locking.
pub trait Backend: Send {
    /// Look up an entry by its composite hash. Does not touch `last_used`;
    /// callers that want a hit recorded call [`CacheEntry::touch`] themselves
    /// and persist via [`Backend::update_count`]/[`Backend::add`]. Takes
    /// `&self` so the facade can serve lookups under its shared read lock.
    fn lookup(&self, hash: &str) -> Result<Option<CacheEntry>>;

    /// Insert a brand-new entry. Returns the assigned id.
    fn add(&mut self, entry: CacheEntry) -> Result<u64>;

    /// Increment `count` and bump `last_used` for the entry with this hash.
    /// Returns `false` if no such entry exists.
    fn update_count(&mut self, hash: &str, now: i64) -> Result<bool>;

    /// Replace the translation text for the entry with this hash, resetting
    /// its admission counter to 1. Returns `false` if no such entry exists.
    fn update_translation(&mut self, hash: &str, translated_text: &str, now: i64)
        -> Result<bool>;

    /// Flush any buffered state to durable storage.
    fn save(&mut self) -> Result<()>;

    /// Remove entries whose `last_used` is older than `cutoff` (seconds since
    /// Unix epoch). Returns the number of entries removed.
    fn cleanup(&mut self, cutoff: i64) -> Result<usize>;

    /// Report total/active/expired counts. `expired` is computed against
    /// `now` without mutating storage (a dry-run of `cleanup`). `active` is
    /// the number of entries whose `count` has reached `threshold`, not a
    /// function of age.
    fn stats(&self, now: i64, max_age_secs: i64, threshold: u32) -> Result<CacheStats>;

    /// Release any resources (file handles, connections) ahead of drop.
    /// Implementations that hold nothing beyond what `Drop` already handles
    /// may make this a no-op, but must still call `save` first if the caller
    /// expects durability — `free_backend` itself does not imply a flush.
    fn free_backend(&mut self) -> Result<()>;

    /// All entries in ascending id order, for the migration tool. Required
    /// to iterate a source backend without assuming its storage layout.
    fn iter_all(&mut self) -> Result<Vec<CacheEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_supported() {
        assert!(BackendKind::Text.is_supported());
        assert!(BackendKind::Sqlite.is_supported());
        assert!(!BackendKind::Mongodb.is_supported());
        assert!(!BackendKind::Redis.is_supported());
    }

    #[test]
    fn backend_kind_display() {
        assert_eq!(BackendKind::Text.to_string(), "text");
        assert_eq!(BackendKind::Sqlite.to_string(), "sqlite");
    }
}
