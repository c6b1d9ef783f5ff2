//! Runtime control: the shared difficulty, the file poller that feeds it, the
//! interrupt-driven shutdown token, batch sizing and the benchmark loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::config::ShutdownPolicy;

pub(crate) mod bench_loop;
pub(crate) mod difficulty;
pub(crate) mod poller;
pub(crate) mod report;
pub(crate) mod shutdown;
pub(crate) mod sizing;
pub(crate) mod ui;

use difficulty::DifficultyStore;
use poller::DifficultyPoller;
use shutdown::ShutdownController;
use ui::info;

const SHUTDOWN_POLL_SLICE: Duration = Duration::from_millis(100);

/// Owns every piece of state shared between the foreground loop, the
/// difficulty poller thread and the interrupt handler.
pub(crate) struct RuntimeContext {
    difficulty: Arc<DifficultyStore>,
    shutdown: Arc<ShutdownController>,
    poller: Mutex<Option<DifficultyPoller>>,
}

impl RuntimeContext {
    pub(crate) fn new(initial_difficulty: u32, policy: ShutdownPolicy) -> Self {
        Self {
            difficulty: Arc::new(DifficultyStore::new(initial_difficulty)),
            shutdown: Arc::new(ShutdownController::new(policy)),
            poller: Mutex::new(None),
        }
    }

    pub(crate) fn difficulty(&self) -> &DifficultyStore {
        &self.difficulty
    }

    pub(crate) fn shutdown(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Routes SIGINT/SIGTERM to [`ShutdownController::request`]. The handler
    /// touches nothing else.
    pub(crate) fn install_signal_handler(&self) -> Result<()> {
        let shutdown = Arc::clone(&self.shutdown);
        ctrlc::set_handler(move || {
            shutdown.request();
        })
        .context("failed to install interrupt handler")
    }

    /// Reads the difficulty file once, then keeps polling it in the background
    /// until [`stop_poller`](Self::stop_poller).
    pub(crate) fn start_poller(&self, path: PathBuf, interval: Duration) -> Result<()> {
        let mut slot = self.poller.lock();
        if slot.is_some() {
            return Ok(());
        }
        *slot = Some(DifficultyPoller::spawn(
            Arc::clone(&self.difficulty),
            path,
            interval,
        )?);
        Ok(())
    }

    pub(crate) fn stop_poller(&self) {
        let poller = self.poller.lock().take();
        if let Some(mut poller) = poller {
            poller.stop();
        }
    }

    /// Applies the difficulty change owed to an observed interrupt, if any.
    /// Runs on the foreground thread only. The poller is stopped first so a
    /// late file read cannot overwrite the adjusted value.
    pub(crate) fn apply_shutdown_adjustment(&self) -> Option<u32> {
        let adjustment = self.shutdown.take_pending_adjustment()?;
        self.stop_poller();
        let updated = self.difficulty.adjust(|value| adjustment.apply(value));
        let current = updated.unwrap_or_else(|| self.difficulty.get());
        info(
            "SHUTDOWN",
            format!("change difficulty to {current}, waiting process end"),
        );
        updated
    }

    /// Sleeps for `duration` unless shutdown is requested first. Returns
    /// `false` if woken by shutdown.
    pub(crate) fn sleep_unless_shutdown(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while !self.shutdown.is_requested() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let sleep_for = deadline
                .saturating_duration_since(now)
                .min(SHUTDOWN_POLL_SLICE);
            std::thread::sleep(sleep_for);
        }
        false
    }
}

impl Drop for RuntimeContext {
    fn drop(&mut self) {
        self.stop_poller();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_adjustment_is_applied_once_and_clamped() {
        let ctx = RuntimeContext::new(2, ShutdownPolicy::Decrement);
        assert_eq!(ctx.apply_shutdown_adjustment(), None);

        ctx.shutdown().request();
        assert_eq!(ctx.apply_shutdown_adjustment(), Some(1));
        assert_eq!(ctx.apply_shutdown_adjustment(), None);
        assert_eq!(ctx.difficulty().get(), 1);

        let ctx = RuntimeContext::new(1, ShutdownPolicy::Decrement);
        ctx.shutdown().request();
        assert_eq!(ctx.apply_shutdown_adjustment(), None);
        assert_eq!(ctx.difficulty().get(), 1);
    }

    #[test]
    fn shutdown_adjustment_survives_later_file_reads() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("difficulty.txt");
        std::fs::write(&path, "1727").expect("write should succeed");

        let ctx = RuntimeContext::new(1000, ShutdownPolicy::Decrement);
        ctx.start_poller(path, Duration::from_millis(5))
            .expect("poller should start");
        assert_eq!(ctx.difficulty().get(), 1727);

        ctx.shutdown().request();
        assert_eq!(ctx.apply_shutdown_adjustment(), Some(1726));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(ctx.difficulty().get(), 1726);
    }

    #[test]
    fn keep_policy_leaves_difficulty_alone() {
        let ctx = RuntimeContext::new(1727, ShutdownPolicy::Keep);
        ctx.shutdown().request();
        assert_eq!(ctx.apply_shutdown_adjustment(), None);
        assert_eq!(ctx.difficulty().get(), 1727);
    }

    #[test]
    fn sleep_returns_early_on_shutdown() {
        let ctx = RuntimeContext::new(1727, ShutdownPolicy::Keep);
        assert!(ctx.sleep_unless_shutdown(Duration::from_millis(1)));

        ctx.shutdown().request();
        let started = Instant::now();
        assert!(!ctx.sleep_unless_shutdown(Duration::from_secs(60)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn poller_lifecycle_is_owned_by_context() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("difficulty.txt");
        std::fs::write(&path, "4096").expect("write should succeed");

        let ctx = RuntimeContext::new(1727, ShutdownPolicy::Keep);
        ctx.start_poller(path.clone(), Duration::from_secs(3600))
            .expect("poller should start");
        ctx.start_poller(path, Duration::from_secs(3600))
            .expect("second start is a no-op");
        assert_eq!(ctx.difficulty().get(), 4096);

        ctx.stop_poller();
        ctx.stop_poller();
    }
}
