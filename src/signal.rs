//! Debounced watcher for the agent signal file.
//!
//! The signal file is a single-slot mailbox: any writer may truncate and
//! rewrite it with a bare `start` or `stop` token. A burst of OS
//! notifications for one logical write coalesces into a single read once
//! the quiescence window elapses, and only the last write's content is
//! observed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, new_debouncer};
use tokio::sync::{mpsc, oneshot};

use crate::messages::{AgentSignal, Event};

/// File name of the signal mailbox under the system temp directory.
pub const SIGNAL_FILE: &str = "muzak-signal";

/// Default quiescence window in milliseconds. A single logical write can
/// generate several notifications on some platforms.
pub const DEFAULT_DEBOUNCE_MS: u64 = 80;

/// The well-known signal file location agents write to.
pub fn default_signal_path() -> PathBuf {
    std::env::temp_dir().join(SIGNAL_FILE)
}

/// Watches the signal file and emits parsed signals on the app channel.
pub struct SignalWatcher {
    path: PathBuf,
    debounce: Duration,
    /// Handle to stop the watcher
    stop_tx: Option<oneshot::Sender<()>>,
}

impl SignalWatcher {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            stop_tx: None,
        }
    }

    /// Set the quiescence window in milliseconds
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce = Duration::from_millis(ms);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx.is_some()
    }

    /// Start watching for signal writes.
    ///
    /// Creates the signal file if absent so the watch target always exists.
    /// Emits `Event::Signal` to the channel whenever a write settles into a
    /// valid signal.
    pub fn start(&mut self, event_tx: mpsc::Sender<Event>) -> Result<()> {
        if self.is_running() {
            anyhow::bail!("signal watcher is already running");
        }

        if !self.path.exists() {
            fs::write(&self.path, "")
                .with_context(|| format!("Failed to create signal file {:?}", self.path))?;
        }

        let path = self.path.clone();
        let debounce = self.debounce;
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);

        // The notify backend runs on its own thread; park a blocking task
        // on the stop channel to keep the debouncer alive.
        tokio::task::spawn_blocking(move || {
            Self::run_watcher(path, debounce, event_tx, stop_rx);
        });

        Ok(())
    }

    /// Stop the watcher. The signal file is best-effort deleted.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Internal: run the blocking watcher
    fn run_watcher(
        path: PathBuf,
        debounce: Duration,
        event_tx: mpsc::Sender<Event>,
        stop_rx: oneshot::Receiver<()>,
    ) {
        let read_path = path.clone();

        let debouncer_result = new_debouncer(
            debounce,
            None, // No tick rate override
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    // Only writes count; reading the file below generates
                    // access events that must not re-trigger the cycle.
                    let relevant = events.iter().any(|event| {
                        matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                    });
                    if !relevant {
                        return;
                    }

                    if let Some(signal) = Self::read_signal(&read_path) {
                        tracing::debug!("Signal file settled: {:?}", signal);
                        let _ = event_tx.blocking_send(Event::Signal(signal));
                    }
                }
                Err(errors) => {
                    // The file may be mid-rewrite; the writer re-triggers on
                    // the next agent event.
                    for error in errors {
                        tracing::warn!("Signal watcher error: {}", error);
                    }
                }
            },
        );

        let mut debouncer = match debouncer_result {
            Ok(d) => d,
            Err(e) => {
                tracing::error!("Failed to create signal watcher: {}", e);
                return;
            }
        };

        if let Err(e) = debouncer.watch(&path, RecursiveMode::NonRecursive) {
            tracing::error!("Failed to watch {:?}: {}", path, e);
            return;
        }

        tracing::info!("Watching signal file: {:?}", path);

        // Park until stop() fires or the watcher handle is dropped
        let _ = stop_rx.blocking_recv();

        drop(debouncer);
        let _ = fs::remove_file(&path);
        tracing::info!("Signal watcher stopped");
    }

    /// Read and parse the signal file. Transient read failures are
    /// swallowed: the file may not exist momentarily during a writer's
    /// replace-write, and a missed signal is acceptable where a crashed
    /// watcher is not.
    fn read_signal(path: &Path) -> Option<AgentSignal> {
        fs::read_to_string(path)
            .ok()
            .and_then(|raw| AgentSignal::parse(&raw))
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
