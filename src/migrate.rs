//! Offline backend-to-backend migration.
//!
//! Deliberately lossy: only the identity fields (`hash`, `from_lang`,
//! `to_lang`, `source_text`, `translated_text`) carry over. `count` resets to
//! 1 and `created_at`/`last_used` reset to the migration's own timestamp on
//! the destination; a migrated entry starts its confirmation count over
//! rather than importing a history the destination backend never observed.

use crate::cache::backend::Backend;
use crate::error::Result;

/// Outcome of a migration run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationReport {
    pub migrated: usize,
    pub failed: usize,
}

/// Copy every entry from `source` into `destination`, in ascending id order.
/// `now` is stamped as the fresh `created_at`/`last_used` on every migrated
/// entry. `on_progress` is called every 100 entries with the running total.
pub fn migrate(
    source: &mut dyn Backend,
    destination: &mut dyn Backend,
    now: i64,
    mut on_progress: impl FnMut(usize),
) -> Result<MigrationReport> {
    let entries = source.iter_all()?;
    let mut report = MigrationReport::default();

    for (i, entry) in entries.into_iter().enumerate() {
        let fresh = crate::cache::entry::CacheEntry::new(
            0,
            entry.hash,
            entry.from_lang,
            entry.to_lang,
            entry.source_text,
            entry.translated_text,
            now,
        );

        match destination.add(fresh) {
            Ok(_) => report.migrated += 1,
            Err(e) => {
                tracing::warn!(error = %e, "migrate: failed to add entry to destination");
                report.failed += 1;
            }
        }

        if (i + 1) % 100 == 0 {
            on_progress(i + 1);
        }
    }

    destination.save()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheEntry;
    use crate::cache::text_backend::TextBackend;
    use tempfile::tempdir;

    fn populated_backend(n: usize) -> (TextBackend, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mut backend = TextBackend::open(dir.path().join("src.jsonl")).unwrap();
        for i in 0..n {
            let entry = CacheEntry::new(
                0,
                format!("hash{i}"),
                "kor".into(),
                "eng".into(),
                format!("text{i}"),
                format!("translated{i}"),
                1_000,
            );
            backend.add(entry).unwrap();
        }
        (backend, dir)
    }

    #[test]
    fn migrates_all_entries_and_resets_count() {
        let (mut source, _src_dir) = populated_backend(3);
        let dest_dir = tempdir().unwrap();
        let mut destination = TextBackend::open(dest_dir.path().join("dst.jsonl")).unwrap();

        let report = migrate(&mut source, &mut destination, 5_000, |_| {}).unwrap();
        assert_eq!(report.migrated, 3);
        assert_eq!(report.failed, 0);

        let moved = destination.lookup("hash1").unwrap().unwrap();
        assert_eq!(moved.count, 1);
        assert_eq!(moved.created_at, 5_000);
        assert_eq!(moved.last_used, 5_000);
        assert_eq!(moved.translated_text, "translated1");
    }

    #[test]
    fn empty_source_migrates_nothing() {
        let dir = tempdir().unwrap();
        let mut source = TextBackend::open(dir.path().join("src.jsonl")).unwrap();
        let dest_dir = tempdir().unwrap();
        let mut destination = TextBackend::open(dest_dir.path().join("dst.jsonl")).unwrap();

        let report = migrate(&mut source, &mut destination, 1_000, |_| {}).unwrap();
        assert_eq!(report.migrated, 0);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn progress_callback_fires_every_hundred() {
        let (mut source, _src_dir) = populated_backend(250);
        let dest_dir = tempdir().unwrap();
        let mut destination = TextBackend::open(dest_dir.path().join("dst.jsonl")).unwrap();

        let mut ticks = Vec::new();
        migrate(&mut source, &mut destination, 1_000, |n| ticks.push(n)).unwrap();
        assert_eq!(ticks, vec![100, 200]);
    }
}
