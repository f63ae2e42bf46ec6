//! Background maintainer: periodically saves and cleans up the cache.
//!
//! Two independent cadences run from one thread: a short save interval and a
//! longer cleanup interval derived from the configured TTL. A named thread
//! sleeps in short polls and wakes the two cadences independently, with
//! cooperative shutdown via an `AtomicBool` instead of an unconditional
//! infinite loop.

use crate::cache::CacheFacade;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const SAVE_INTERVAL_SECS: u64 = 5;
const MIN_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Cleanup interval: at least an hour, or a tenth of the TTL window,
/// whichever is larger.
pub fn cleanup_interval_secs(ttl_days: u32) -> u64 {
    let tenth_of_ttl = (u64::from(ttl_days) * 86_400) / 10;
    MIN_CLEANUP_INTERVAL_SECS.max(tenth_of_ttl)
}

/// Handle to the running maintainer thread.
pub struct Maintainer {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Maintainer {
    /// Spawn the maintainer thread for `cache`, using `ttl_days` to derive
    /// the cleanup cadence.
    pub fn spawn(cache: Arc<CacheFacade>, ttl_days: u32, cleanup_enabled: bool) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);
        let cleanup_interval = cleanup_interval_secs(ttl_days);

        let handle = std::thread::Builder::new()
            .name("cache-maintainer".into())
            .spawn(move || {
                run_loop(cache, running_clone, cleanup_interval, cleanup_enabled);
            })
            .expect("failed to spawn cache maintainer thread");

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Signal the maintainer to stop after its current tick and join it.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// How often the loop wakes to check `running`, independent of the save and
/// cleanup cadences — keeps shutdown latency low without busy-waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn run_loop(cache: Arc<CacheFacade>, running: Arc<AtomicBool>, cleanup_interval: u64, cleanup_enabled: bool) {
    let mut elapsed_since_save = Duration::ZERO;
    let mut elapsed_since_cleanup = Duration::ZERO;
    let save_interval = Duration::from_secs(SAVE_INTERVAL_SECS);
    let cleanup_interval = Duration::from_secs(cleanup_interval);

    while running.load(Ordering::Acquire) {
        std::thread::sleep(POLL_INTERVAL);
        if !running.load(Ordering::Acquire) {
            break;
        }

        elapsed_since_save += POLL_INTERVAL;
        elapsed_since_cleanup += POLL_INTERVAL;

        if elapsed_since_save >= save_interval {
            elapsed_since_save = Duration::ZERO;
            if let Err(e) = cache.save() {
                tracing::warn!(error = %e, "maintainer: cache save failed");
            }
        }

        if cleanup_enabled && elapsed_since_cleanup >= cleanup_interval {
            elapsed_since_cleanup = Duration::ZERO;
            let now = chrono::Utc::now().timestamp();
            match cache.cleanup(now) {
                Ok(removed) => {
                    if removed > 0 {
                        tracing::info!(removed, "maintainer: cleanup cycle");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "maintainer: cleanup failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_interval_floors_at_one_hour() {
        assert_eq!(cleanup_interval_secs(1), 3600);
        assert_eq!(cleanup_interval_secs(0), 3600);
    }

    #[test]
    fn cleanup_interval_scales_with_ttl() {
        // 100 days -> tenth is 10 days = 864000s, well above the 1h floor.
        assert_eq!(cleanup_interval_secs(100), 100 * 86_400 / 10);
    }

    #[test]
    fn maintainer_spawns_and_shuts_down_cleanly() {
        use crate::cache::text_backend::TextBackend;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();
        let backend = TextBackend::open(dir.path().join("cache.jsonl")).unwrap();
        let cache = Arc::new(CacheFacade::new(Box::new(backend), 2, 3600));

        let maintainer = Maintainer::spawn(Arc::clone(&cache), 30, true);
        std::thread::sleep(Duration::from_millis(50));
        maintainer.shutdown();
    }
}
