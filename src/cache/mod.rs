//! The translation cache façade: a single `RwLock<Box<dyn Backend>>` plus
//! the confirm-by-repetition admission controller.

pub mod backend;
pub mod entry;
#[cfg(feature = "sqlite")]
pub mod sqlite_backend;
pub mod text_backend;

use crate::cache::backend::{Backend, BackendKind, CacheStats};
use crate::cache::entry::CacheEntry;
use crate::config::CacheConfig;
use crate::error::{ProxyError, Result};
use crate::hash::composite_key;
use std::sync::RwLock;

/// What happened to a request after admission reconciliation.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Served straight from the cache without calling the external
    /// translator (entry already reached the confirmation threshold).
    CacheHit { translation: String },
    /// The external translator was called and the result matched an
    /// existing (unconfirmed) entry; its count was incremented.
    Confirmed { translation: String, count: u32 },
    /// The external translator was called and its result disagreed with an
    /// existing entry; the entry's translation was replaced and its count
    /// reset to 1.
    Replaced { translation: String },
    /// No prior entry existed; a new one was inserted with count 1.
    Inserted { translation: String },
}

impl Outcome {
    pub fn translation(&self) -> &str {
        match self {
            Outcome::CacheHit { translation }
            | Outcome::Confirmed { translation, .. }
            | Outcome::Replaced { translation }
            | Outcome::Inserted { translation } => translation,
        }
    }
}

/// Pure admission decision given the existing entry (if any) and a freshly
/// translated candidate. Kept free of I/O so it can be unit- and
/// property-tested in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Insert,
    Confirm,
    Replace,
}

pub fn reconcile(existing: Option<&CacheEntry>, candidate_translation: &str) -> ReconcileAction {
    match existing {
        None => ReconcileAction::Insert,
        Some(entry) if entry.translated_text == candidate_translation => ReconcileAction::Confirm,
        Some(_) => ReconcileAction::Replace,
    }
}

/// Thread-safe façade over a single storage backend.
///
/// `stats` takes the shared read lock; every mutation (`lookup_confirmed`,
/// `add`/`update_count`/`update_translation`/`save`/`cleanup`) takes the
/// exclusive write lock, since a confirmed lookup also re-confirms the entry
/// it serves. The external translator call always happens with no lock
/// held: callers look up, drop the lock, call out, then re-acquire to
/// reconcile.
pub struct CacheFacade {
    backend: RwLock<Box<dyn Backend>>,
    threshold: u32,
    max_age_secs: i64,
}

impl CacheFacade {
    pub fn new(backend: Box<dyn Backend>, threshold: u32, max_age_secs: i64) -> Self {
        Self {
            backend: RwLock::new(backend),
            threshold,
            max_age_secs,
        }
    }

    /// Open the configured backend and wrap it in a façade.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        let backend: Box<dyn Backend> = match config.backend {
            BackendKind::Text => Box::new(text_backend::TextBackend::open(&config.path)?),
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => Box::new(sqlite_backend::SqliteBackend::open(&config.path)?),
            #[cfg(not(feature = "sqlite"))]
            BackendKind::Sqlite => {
                return Err(ProxyError::Config(
                    "sqlite backend requested but this build was compiled without the `sqlite` feature".into(),
                ))
            }
            BackendKind::Mongodb | BackendKind::Redis => {
                return Err(ProxyError::Config(format!(
                    "backend kind {} is not supported",
                    config.backend
                )))
            }
        };
        Ok(Self::new(backend, config.confirm_threshold, config.max_age_secs))
    }

    /// Look up the composite hash, serving from cache only once the entry
    /// has crossed the confirmation threshold. A served hit also re-confirms
    /// itself: `count` is incremented and `last_used` touched under the
    /// write lock before the translation is returned, so a hot entry keeps
    /// re-confirming and never ages out while it's being served constantly.
    pub fn lookup_confirmed(
        &self,
        from_lang: &str,
        to_lang: &str,
        text: &str,
        now: i64,
    ) -> Result<Option<Outcome>> {
        let hash = composite_key(from_lang, to_lang, text);
        let mut backend = self
            .backend
            .write()
            .map_err(|_| ProxyError::Cache("cache lock poisoned".into()))?;
        let entry = backend.lookup(&hash)?;
        match entry {
            Some(e) if e.count >= self.threshold => {
                backend.update_count(&hash, now)?;
                Ok(Some(Outcome::CacheHit {
                    translation: e.translated_text,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Reconcile a freshly translated candidate against the existing entry
    /// for `(from_lang, to_lang, text)`. The caller is expected to have
    /// already called the external translator with no lock held; this only
    /// performs the write-lock-protected bookkeeping.
    pub fn reconcile_translation(
        &self,
        from_lang: &str,
        to_lang: &str,
        text: &str,
        candidate_translation: &str,
        now: i64,
    ) -> Result<Outcome> {
        let hash = composite_key(from_lang, to_lang, text);
        let mut backend = self
            .backend
            .write()
            .map_err(|_| ProxyError::Cache("cache lock poisoned".into()))?;

        let existing = backend.lookup(&hash)?;
        match reconcile(existing.as_ref(), candidate_translation) {
            ReconcileAction::Insert => {
                let entry = CacheEntry::new(
                    0,
                    hash,
                    from_lang.to_string(),
                    to_lang.to_string(),
                    text.to_string(),
                    candidate_translation.to_string(),
                    now,
                );
                backend.add(entry)?;
                Ok(Outcome::Inserted {
                    translation: candidate_translation.to_string(),
                })
            }
            ReconcileAction::Confirm => {
                backend.update_count(&hash, now)?;
                let count = existing.map(|e| e.count + 1).unwrap_or(1);
                Ok(Outcome::Confirmed {
                    translation: candidate_translation.to_string(),
                    count,
                })
            }
            ReconcileAction::Replace => {
                backend.update_translation(&hash, candidate_translation, now)?;
                Ok(Outcome::Replaced {
                    translation: candidate_translation.to_string(),
                })
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let mut backend = self
            .backend
            .write()
            .map_err(|_| ProxyError::Cache("cache lock poisoned".into()))?;
        backend.save()
    }

    pub fn cleanup(&self, now: i64) -> Result<usize> {
        let cutoff = now - self.max_age_secs;
        let mut backend = self
            .backend
            .write()
            .map_err(|_| ProxyError::Cache("cache lock poisoned".into()))?;
        backend.cleanup(cutoff)
    }

    pub fn stats(&self, now: i64) -> Result<CacheStats> {
        let backend = self
            .backend
            .read()
            .map_err(|_| ProxyError::Cache("cache lock poisoned".into()))?;
        backend.stats(now, self.max_age_secs, self.threshold)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn shutdown(&self) -> Result<()> {
        let mut backend = self
            .backend
            .write()
            .map_err(|_| ProxyError::Cache("cache lock poisoned".into()))?;
        backend.save()?;
        backend.free_backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::text_backend::TextBackend;
    use tempfile::tempdir;

    fn facade(threshold: u32) -> (CacheFacade, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let backend = TextBackend::open(dir.path().join("cache.jsonl")).unwrap();
        (CacheFacade::new(Box::new(backend), threshold, 3600), dir)
    }

    #[test]
    fn reconcile_inserts_when_absent() {
        assert_eq!(reconcile(None, "hello"), ReconcileAction::Insert);
    }

    #[test]
    fn reconcile_confirms_when_matching() {
        let e = CacheEntry::new(1, "h".into(), "a".into(), "b".into(), "x".into(), "hello".into(), 0);
        assert_eq!(reconcile(Some(&e), "hello"), ReconcileAction::Confirm);
    }

    #[test]
    fn reconcile_replaces_when_disagreeing() {
        let e = CacheEntry::new(1, "h".into(), "a".into(), "b".into(), "x".into(), "hello".into(), 0);
        assert_eq!(reconcile(Some(&e), "hi"), ReconcileAction::Replace);
    }

    #[test]
    fn first_request_is_inserted_not_served_from_cache() {
        let (cache, _dir) = facade(2);
        assert!(cache.lookup_confirmed("kor", "eng", "안녕", 1_000).unwrap().is_none());
        let outcome = cache
            .reconcile_translation("kor", "eng", "안녕", "hello", 1_000)
            .unwrap();
        assert!(matches!(outcome, Outcome::Inserted { .. }));
        // Below threshold: still not served from cache alone.
        assert!(cache.lookup_confirmed("kor", "eng", "안녕", 1_000).unwrap().is_none());
    }

    #[test]
    fn repeated_matching_translation_crosses_threshold() {
        let (cache, _dir) = facade(2);
        cache
            .reconcile_translation("kor", "eng", "안녕", "hello", 1_000)
            .unwrap();
        let outcome = cache
            .reconcile_translation("kor", "eng", "안녕", "hello", 1_100)
            .unwrap();
        assert!(matches!(outcome, Outcome::Confirmed { count: 2, .. }));
        let hit = cache.lookup_confirmed("kor", "eng", "안녕", 1_200).unwrap().unwrap();
        assert_eq!(hit.translation(), "hello");
    }

    #[test]
    fn cache_hit_re_confirms_and_touches_last_used() {
        let (cache, _dir) = facade(2);
        cache
            .reconcile_translation("kor", "eng", "안녕", "hello", 1_000)
            .unwrap();
        cache
            .reconcile_translation("kor", "eng", "안녕", "hello", 1_100)
            .unwrap();
        // Entry now has count 2, served straight from cache from here on.
        cache.lookup_confirmed("kor", "eng", "안녕", 1_200).unwrap();
        cache.lookup_confirmed("kor", "eng", "안녕", 1_300).unwrap();
        let hit = cache.lookup_confirmed("kor", "eng", "안녕", 1_400).unwrap().unwrap();
        assert_eq!(hit.translation(), "hello");

        // Each hit incremented count (2 -> 5) and advanced last_used, so a
        // constantly-served entry never falls out of the active window.
        let stats = cache.stats(1_400 + 3599).unwrap();
        assert_eq!(stats.expired, 0);
    }

    #[test]
    fn disagreeing_translation_resets_confirmation() {
        let (cache, _dir) = facade(2);
        cache
            .reconcile_translation("kor", "eng", "안녕", "hello", 1_000)
            .unwrap();
        cache
            .reconcile_translation("kor", "eng", "안녕", "hello", 1_100)
            .unwrap();
        assert!(cache.lookup_confirmed("kor", "eng", "안녕", 1_150).unwrap().is_some());

        // A disagreeing translation resets the counter below threshold.
        let outcome = cache
            .reconcile_translation("kor", "eng", "안녕", "hi", 1_200)
            .unwrap();
        assert!(matches!(outcome, Outcome::Replaced { .. }));
        assert!(cache.lookup_confirmed("kor", "eng", "안녕", 1_300).unwrap().is_none());
    }

    #[test]
    fn cleanup_and_stats_reflect_expiry() {
        let (cache, _dir) = facade(1);
        cache
            .reconcile_translation("kor", "eng", "안녕", "hello", 1_000)
            .unwrap();
        let stats = cache.stats(1_000 + 7200).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.expired, 1);

        let removed = cache.cleanup(1_000 + 7200).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.stats(1_000 + 7200).unwrap().total, 0);
    }
}
