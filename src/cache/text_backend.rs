//! JSONL text backend: the whole cache lives in memory as a `Vec<CacheEntry>`
//! and is persisted as one JSON object per line.

use crate::cache::backend::{Backend, CacheStats};
use crate::cache::entry::CacheEntry;
use crate::error::{ProxyError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// In-memory, JSONL-persisted cache backend.
///
/// The entire file is read into memory on open and rewritten wholesale on
/// `save`. A malformed line is logged and skipped rather than aborting the
/// load — a single corrupt record must not take down the whole cache.
pub struct TextBackend {
    path: PathBuf,
    entries: Vec<CacheEntry>,
    next_id: u64,
    dirty: bool,
}

impl TextBackend {
    /// Open (or create) the JSONL cache file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            Self::load(&path)?
        } else {
            Vec::new()
        };

        let next_id = entries.iter().map(|e| e.id).max().map_or(1, |m| m + 1);

        Ok(Self {
            path,
            entries,
            next_id,
            dirty: false,
        })
    }

    fn load(path: &Path) -> Result<Vec<CacheEntry>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CacheEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = lineno + 1,
                        error = %e,
                        "skipping malformed cache record"
                    );
                }
            }
        }

        Ok(entries)
    }

    fn find_mut(&mut self, hash: &str) -> Option<&mut CacheEntry> {
        self.entries.iter_mut().find(|e| e.hash == hash)
    }

    /// Find an entry by hash among entries this backend holds in memory.
    ///
    /// Deliberately a pure read with no side effect on `last_used`. The
    /// facade decides whether a hit should be recorded (via `update_count`),
    /// which keeps `lookup` safe to serve under a shared read lock.
    fn find(&self, hash: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.hash == hash)
    }
}

impl Backend for TextBackend {
    fn lookup(&self, hash: &str) -> Result<Option<CacheEntry>> {
        Ok(self.find(hash).cloned())
    }

    fn add(&mut self, mut entry: CacheEntry) -> Result<u64> {
        entry.id = self.next_id;
        self.next_id += 1;
        let id = entry.id;
        self.entries.push(entry);
        self.dirty = true;
        Ok(id)
    }

    fn update_count(&mut self, hash: &str, now: i64) -> Result<bool> {
        match self.find_mut(hash) {
            Some(entry) => {
                entry.confirm(now);
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn update_translation(
        &mut self,
        hash: &str,
        translated_text: &str,
        now: i64,
    ) -> Result<bool> {
        match self.find_mut(hash) {
            Some(entry) => {
                entry.replace_translation(translated_text.to_string(), now);
                self.dirty = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        // Atomic temp-file + rename rather than truncate-and-rewrite.
        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for entry in &self.entries {
                let line = serde_json::to_string(entry)
                    .map_err(|e| ProxyError::Cache(format!("serialize entry: {e}")))?;
                tmp.write_all(line.as_bytes())?;
                tmp.write_all(b"\n")?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        self.dirty = false;
        tracing::debug!(path = %self.path.display(), count = self.entries.len(), "text backend saved");
        Ok(())
    }

    fn cleanup(&mut self, cutoff: i64) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|e| !e.is_expired(cutoff));
        let removed = before - self.entries.len();
        if removed > 0 {
            self.dirty = true;
            tracing::info!(removed, "text backend cleanup removed expired entries");
        }
        Ok(removed)
    }

    fn stats(&self, now: i64, max_age_secs: i64, threshold: u32) -> Result<CacheStats> {
        let cutoff = now - max_age_secs;
        let total = self.entries.len();
        let expired = self.entries.iter().filter(|e| e.is_expired(cutoff)).count();
        let active = self.entries.iter().filter(|e| e.count >= threshold).count();
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
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|e| e.id);
        Ok(sorted)
    }
}
