//! SQLite cache backend: a `rusqlite::Connection` in WAL mode.

use crate::cache::backend::{Backend, CacheStats};
use crate::cache::entry::CacheEntry;
use crate::error::{ProxyError, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

const TABLE: &str = "trans_cache";

/// SQLite-backed cache backend.
///
/// Opened with `SQLITE_OPEN_FULL_MUTEX` so the connection is safe to share
/// across threads under the façade's own lock - rusqlite's default mode
/// assumes single-threaded access.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open (or create) the SQLite database at `path` and ensure the schema
    /// exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| ProxyError::Cache(format!("open sqlite db {}: {e}", path.display())))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA cache_size=2000;
             PRAGMA mmap_size=268435456;",
        )
        .map_err(|e| ProxyError::Cache(format!("set pragmas: {e}")))?;

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL CHECK(length(hash) = 64),
                from_lang TEXT NOT NULL CHECK(length(from_lang) = 3),
                to_lang TEXT NOT NULL CHECK(length(to_lang) = 3),
                source_text TEXT NOT NULL,
                translated_text TEXT NOT NULL,
                count INTEGER NOT NULL CHECK(count >= 1),
                created_at INTEGER NOT NULL,
                last_used INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_{TABLE}_hash
                ON {TABLE}(hash);
            CREATE INDEX IF NOT EXISTS idx_{TABLE}_from_to
                ON {TABLE}(from_lang, to_lang);
            CREATE INDEX IF NOT EXISTS idx_{TABLE}_last_used
                ON {TABLE}(last_used);
            CREATE INDEX IF NOT EXISTS idx_{TABLE}_count
                ON {TABLE}(count DESC);
            CREATE INDEX IF NOT EXISTS idx_{TABLE}_from_to_hash
                ON {TABLE}(from_lang, to_lang, hash);"
        ))
        .map_err(|e| ProxyError::Cache(format!("create schema: {e}")))?;

        tracing::info!(path = %path.display(), "sqlite backend opened");

        Ok(Self { conn })
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
        Ok(CacheEntry {
            id: row.get(0)?,
            hash: row.get(1)?,
            from_lang: row.get(2)?,
            to_lang: row.get(3)?,
            source_text: row.get(4)?,
            translated_text: row.get(5)?,
            count: row.get(6)?,
            created_at: row.get(7)?,
            last_used: row.get(8)?,
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, hash, from_lang, to_lang, source_text, translated_text, count, created_at, last_used";

impl Backend for SqliteBackend {
    fn lookup(&self, hash: &str) -> Result<Option<CacheEntry>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM {TABLE} WHERE hash = ?1");
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| ProxyError::Cache(format!("lookup prepare: {e}")))?;
        let result = stmt
            .query_row(params![hash], Self::row_to_entry)
            .optional()
            .map_err(|e| ProxyError::Cache(format!("lookup: {e}")))?;
        Ok(result)
    }

    fn add(&mut self, entry: CacheEntry) -> Result<u64> {
        let sql = format!(
            "INSERT INTO {TABLE}
             (hash, from_lang, to_lang, source_text, translated_text, count, created_at, last_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        );
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| ProxyError::Cache(format!("add prepare: {e}")))?;
        stmt.execute(params![
            entry.hash,
            entry.from_lang,
            entry.to_lang,
            entry.source_text,
            entry.translated_text,
            entry.count,
            entry.created_at,
            entry.last_used,
        ])
        .map_err(|e| ProxyError::Cache(format!("add: {e}")))?;
        Ok(self.conn.last_insert_rowid() as u64)
    }

    fn update_count(&mut self, hash: &str, now: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE {TABLE} SET count = count + 1, last_used = MAX(last_used, ?2)
             WHERE hash = ?1"
        );
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| ProxyError::Cache(format!("update_count prepare: {e}")))?;
        let changed = stmt
            .execute(params![hash, now])
            .map_err(|e| ProxyError::Cache(format!("update_count: {e}")))?;
        Ok(changed > 0)
    }

    fn update_translation(
        &mut self,
        hash: &str,
        translated_text: &str,
        now: i64,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE {TABLE}
             SET translated_text = ?2, count = 1, last_used = MAX(last_used, ?3)
             WHERE hash = ?1"
        );
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| ProxyError::Cache(format!("update_translation prepare: {e}")))?;
        let changed = stmt
            .execute(params![hash, translated_text, now])
            .map_err(|e| ProxyError::Cache(format!("update_translation: {e}")))?;
        Ok(changed > 0)
    }

    fn save(&mut self) -> Result<()> {
        // Every write above is already a committed autocommit statement;
        // nothing buffered in-process to flush. Kept as an explicit no-op so
        // callers don't need to special-case backend kind.
        Ok(())
    }

    fn cleanup(&mut self, cutoff: i64) -> Result<usize> {
        let sql = format!("DELETE FROM {TABLE} WHERE last_used < ?1");
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| ProxyError::Cache(format!("cleanup prepare: {e}")))?;
        let removed = stmt
            .execute(params![cutoff])
            .map_err(|e| ProxyError::Cache(format!("cleanup: {e}")))?;
        if removed > 0 {
            tracing::info!(removed, "sqlite backend cleanup removed expired entries");
        }
        Ok(removed)
    }

    fn stats(&self, now: i64, max_age_secs: i64, threshold: u32) -> Result<CacheStats> {
        let cutoff = now - max_age_secs;

        let mut total_stmt = self
            .conn
            .prepare_cached(&format!("SELECT COUNT(*) FROM {TABLE}"))
            .map_err(|e| ProxyError::Cache(format!("stats total prepare: {e}")))?;
        let total: usize = total_stmt
            .query_row([], |r| r.get(0))
            .map_err(|e| ProxyError::Cache(format!("stats total: {e}")))?;

        let mut expired_stmt = self
            .conn
            .prepare_cached(&format!("SELECT COUNT(*) FROM {TABLE} WHERE last_used < ?1"))
            .map_err(|e| ProxyError::Cache(format!("stats expired prepare: {e}")))?;
        let expired: usize = expired_stmt
            .query_row(params![cutoff], |r| r.get(0))
            .map_err(|e| ProxyError::Cache(format!("stats expired: {e}")))?;

        let mut active_stmt = self
            .conn
            .prepare_cached(&format!("SELECT COUNT(*) FROM {TABLE} WHERE count >= ?1"))
            .map_err(|e| ProxyError::Cache(format!("stats active prepare: {e}")))?;
        let active: usize = active_stmt
            .query_row(params![threshold], |r| r.get(0))
            .map_err(|e| ProxyError::Cache(format!("stats active: {e}")))?;

        Ok(CacheStats {
            total,
            active,
            expired,
        })
    }

    fn free_backend(&mut self) -> Result<()> {
        Ok(())
    }

    fn iter_all(&mut self) -> Result<Vec<CacheEntry>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM {TABLE} ORDER BY id ASC");
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| ProxyError::Cache(format!("iter_all prepare: {e}")))?;
        let rows = stmt
            .query_map([], Self::row_to_entry)
            .map_err(|e| ProxyError::Cache(format!("iter_all query: {e}")))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| ProxyError::Cache(format!("iter_all row: {e}")))?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Pads `label` out to the 64-character hex length `composite_key`
    /// produces, since the schema's `CHECK(length(hash) = 64)` rejects
    /// anything shorter.
    fn fixture_hash(label: &str) -> String {
        format!("{label:0<64}")
    }

    fn entry(hash: &str) -> CacheEntry {
        CacheEntry::new(
            0,
            fixture_hash(hash),
            "kor".into(),
            "eng".into(),
            "안녕".into(),
            "hello".into(),
            1_000,
        )
    }

    #[test]
    fn add_then_lookup_round_trips() {
        let dir = tempdir().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("cache.db")).unwrap();
        let id = backend.add(entry("h1")).unwrap();
        assert_eq!(id, 1);
        let found = backend.lookup(&fixture_hash("h1")).unwrap().unwrap();
        assert_eq!(found.translated_text, "hello");
        assert_eq!(found.count, 1);
    }

    #[test]
    fn lookup_missing_returns_none() {
        let dir = tempdir().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("cache.db")).unwrap();
        assert!(backend.lookup("nope").unwrap().is_none());
    }

    #[test]
    fn update_count_increments() {
        let dir = tempdir().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("cache.db")).unwrap();
        backend.add(entry("h1")).unwrap();
        assert!(backend.update_count(&fixture_hash("h1"), 2_000).unwrap());
        let found = backend.lookup(&fixture_hash("h1")).unwrap().unwrap();
        assert_eq!(found.count, 2);
        assert_eq!(found.last_used, 2_000);
    }

    #[test]
    fn update_translation_resets_count() {
        let dir = tempdir().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("cache.db")).unwrap();
        backend.add(entry("h1")).unwrap();
        backend.update_count(&fixture_hash("h1"), 1_100).unwrap();
        backend
            .update_translation(&fixture_hash("h1"), "hi", 1_200)
            .unwrap();
        let found = backend.lookup(&fixture_hash("h1")).unwrap().unwrap();
        assert_eq!(found.count, 1);
        assert_eq!(found.translated_text, "hi");
    }

    #[test]
    fn cleanup_removes_expired_only() {
        let dir = tempdir().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("cache.db")).unwrap();
        backend.add(entry("old")).unwrap();
        let mut fresh = entry("new");
        fresh.last_used = 5_000;
        backend.add(fresh).unwrap();

        let removed = backend.cleanup(2_000).unwrap();
        assert_eq!(removed, 1);
        assert!(backend.lookup(&fixture_hash("old")).unwrap().is_none());
        assert!(backend.lookup(&fixture_hash("new")).unwrap().is_some());
    }

    #[test]
    fn stats_reports_active_and_expired() {
        let dir = tempdir().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("cache.db")).unwrap();
        backend.add(entry("old")).unwrap();
        let stats = backend.stats(1_000 + 7200, 3600, 2).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.active, 0);
    }

    #[test]
    fn stats_active_counts_confirmed_entries_regardless_of_age() {
        let dir = tempdir().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("cache.db")).unwrap();
        backend.add(entry("confirmed")).unwrap();
        backend
            .update_count(&fixture_hash("confirmed"), 1_100)
            .unwrap();
        backend.add(entry("unconfirmed")).unwrap();

        let stats = backend.stats(1_200, 3600, 2).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.active, 1);
    }

    #[test]
    fn iter_all_is_sorted_by_id() {
        let dir = tempdir().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("cache.db")).unwrap();
        backend.add(entry("h1")).unwrap();
        backend.add(entry("h2")).unwrap();
        let all = backend.iter_all().unwrap();
        assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn reopen_persists_across_connections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let mut backend = SqliteBackend::open(&path).unwrap();
            backend.add(entry("h1")).unwrap();
        }
        let mut reopened = SqliteBackend::open(&path).unwrap();
        assert!(reopened.lookup(&fixture_hash("h1")).unwrap().is_some());
    }
}
