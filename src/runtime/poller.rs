use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use super::difficulty::{read_difficulty_file, DifficultyStore};
use super::ui::{error, warn};

/// Background thread that re-reads the difficulty file on a fixed interval.
/// Stopped through a channel and joined by [`DifficultyPoller::stop`] or on drop.
pub(crate) struct DifficultyPoller {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DifficultyPoller {
    /// Performs one synchronous read, then keeps polling every `interval` on
    /// a named thread until stopped.
    pub(crate) fn spawn(
        store: Arc<DifficultyStore>,
        path: PathBuf,
        interval: Duration,
    ) -> Result<Self> {
        poll_once(&store, &path);

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("argonbench-difficulty".to_string())
            .spawn(move || poll_loop(&store, &path, interval, &stop_rx))
            .context("failed to spawn difficulty poller thread")?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn stop(&mut self) {
        // Dropping the sender disconnects the channel and wakes the thread.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error("DIFF", "difficulty poller thread panicked");
            }
        }
    }
}

impl Drop for DifficultyPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(store: &DifficultyStore, path: &Path, interval: Duration, stop_rx: &Receiver<()>) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                poll_once(store, path);
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// One tick: file I/O first, then a lock-scoped `set`. Failures keep the
/// previous value.
pub(crate) fn poll_once(store: &DifficultyStore, path: &Path) -> bool {
    match read_difficulty_file(path) {
        Ok(value) => store.set(value),
        Err(err) => {
            warn("DIFF", format!("{err}; keeping difficulty {}", store.get()));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn poll_once_tracks_last_parsed_value() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("difficulty.txt");
        let store = DifficultyStore::new(1727);

        std::fs::write(&path, "1500\n").expect("write should succeed");
        assert!(poll_once(&store, &path));
        assert_eq!(store.get(), 1500);

        std::fs::write(&path, "1500\n").expect("write should succeed");
        assert!(!poll_once(&store, &path), "unchanged value must not notify");

        std::fs::write(&path, "garbage").expect("write should succeed");
        assert!(!poll_once(&store, &path));
        assert_eq!(store.get(), 1500);

        std::fs::remove_file(&path).expect("remove should succeed");
        assert!(!poll_once(&store, &path));
        assert_eq!(store.get(), 1500);

        std::fs::write(&path, "3000").expect("write should succeed");
        assert!(poll_once(&store, &path));
        assert_eq!(store.get(), 3000);
    }

    #[test]
    fn spawn_reads_file_before_returning() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("difficulty.txt");
        std::fs::write(&path, "2222").expect("write should succeed");

        let store = Arc::new(DifficultyStore::new(1727));
        let mut poller =
            DifficultyPoller::spawn(Arc::clone(&store), path, Duration::from_secs(3600))
                .expect("poller should spawn");
        assert_eq!(store.get(), 2222);
        poller.stop();
    }

    #[test]
    fn poller_picks_up_changes_on_next_tick() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("difficulty.txt");
        std::fs::write(&path, "100").expect("write should succeed");

        let store = Arc::new(DifficultyStore::new(1727));
        let _poller =
            DifficultyPoller::spawn(Arc::clone(&store), path.clone(), Duration::from_millis(10))
                .expect("poller should spawn");
        assert_eq!(store.get(), 100);

        std::fs::write(&path, "200").expect("write should succeed");
        let deadline = Instant::now() + Duration::from_secs(5);
        while store.get() != 200 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(store.get(), 200);
    }

    #[test]
    fn stop_joins_promptly_despite_long_interval() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = Arc::new(DifficultyStore::new(1727));
        let mut poller = DifficultyPoller::spawn(
            store,
            dir.path().join("missing.txt"),
            Duration::from_secs(3600),
        )
        .expect("poller should spawn");

        let started = Instant::now();
        poller.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        poller.stop();
    }
}
