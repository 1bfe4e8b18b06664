//! Playback controller for the looping background track.
//!
//! Playback itself lives in the `muzak-helper` subprocess; this module owns
//! its lifecycle and command channel. The helper is spawned lazily on the
//! first `activate()` and torn down on `dispose()` or when it exits on its
//! own. All operations are idempotent: re-applying the current intent
//! issues no duplicate command.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::messages::Event;

/// Helper binary name, expected next to the daemon executable.
pub const HELPER_BIN: &str = "muzak-helper";

/// Failures surfaced by the playback controller. None of these are fatal to
/// the daemon; the caller decides whether to log or warn.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("audio track not found: {0}")]
    TrackNotFound(PathBuf),

    #[error("failed to spawn audio helper {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audio helper is not accepting commands")]
    CommandChannel,
}

/// Commands understood by the audio helper, written one per line to its
/// stdin. Fire-and-forget; the helper never replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
}

impl PlayerCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
        }
    }
}

/// Default helper location: next to the current executable.
pub fn default_helper_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(HELPER_BIN)))
        .unwrap_or_else(|| PathBuf::from(HELPER_BIN))
}

/// A live `muzak-helper` process.
///
/// The `Child` handle is owned by a background wait task that captures the
/// real exit code and reports it as `Event::PlayerExited`. What is kept here
/// is the command channel plus an atomic exited flag for synchronous
/// liveness checks.
struct HelperProcess {
    /// Sender for stdin commands
    stdin_tx: mpsc::Sender<PlayerCommand>,
    /// Set by the wait task once the child has exited
    exited: Arc<AtomicBool>,
}

impl HelperProcess {
    fn spawn(
        helper_path: &Path,
        track_path: &Path,
        volume: f32,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<Self, PlayerError> {
        let mut child = Command::new(helper_path)
            .arg(track_path)
            .arg(volume.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlayerError::Spawn {
                path: helper_path.to_path_buf(),
                source,
            })?;

        tracing::info!("Audio helper started (pid {:?})", child.id());

        let stdin = child.stdin.take().expect("stdin was configured");
        let (stdin_tx, stdin_rx) = mpsc::channel(8);
        tokio::spawn(Self::stdin_writer(stdin, stdin_rx));

        let stderr = child.stderr.take().expect("stderr was configured");
        tokio::spawn(Self::stderr_reader(stderr));

        let exited = Arc::new(AtomicBool::new(false));
        tokio::spawn(Self::wait_for_exit(child, event_tx, Arc::clone(&exited)));

        Ok(Self { stdin_tx, exited })
    }

    async fn send(&self, command: PlayerCommand) -> Result<(), PlayerError> {
        self.stdin_tx
            .send(command)
            .await
            .map_err(|_| PlayerError::CommandChannel)
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Write commands to the helper's stdin.
    ///
    /// When the channel closes (handle dropped), stdin is dropped with it;
    /// the helper treats EOF as `stop`.
    async fn stdin_writer(
        mut stdin: tokio::process::ChildStdin,
        mut rx: mpsc::Receiver<PlayerCommand>,
    ) {
        while let Some(command) = rx.recv().await {
            tracing::debug!("Sending to helper: {}", command.as_str());

            if let Err(e) = stdin.write_all(command.as_str().as_bytes()).await {
                tracing::warn!("Failed to write to helper stdin: {}", e);
                break;
            }
            if let Err(e) = stdin.write_all(b"\n").await {
                tracing::warn!("Failed to write newline: {}", e);
                break;
            }
            if let Err(e) = stdin.flush().await {
                tracing::warn!("Failed to flush helper stdin: {}", e);
                break;
            }
        }

        tracing::debug!("Helper stdin writer finished");
    }

    /// Forward helper diagnostics (stderr only; stdout is unused).
    async fn stderr_reader(stderr: tokio::process::ChildStderr) {
        let mut reader = BufReader::new(stderr).lines();

        while let Ok(Some(line)) = reader.next_line().await {
            tracing::warn!("audio helper: {}", line);
        }
    }

    /// Background task: owns the child, waits for it to exit, reports the
    /// real exit code.
    async fn wait_for_exit(
        mut child: Child,
        event_tx: mpsc::Sender<Event>,
        exited: Arc<AtomicBool>,
    ) {
        let code = match child.wait().await {
            Ok(status) => {
                tracing::debug!("Audio helper exited with status: {:?}", status);
                status.code()
            }
            Err(e) => {
                tracing::error!("Error waiting for audio helper: {}", e);
                None
            }
        };

        // Flag first, so liveness checks are accurate by the time the
        // event is observed.
        exited.store(true, Ordering::Release);
        let _ = event_tx.send(Event::PlayerExited { code }).await;
    }
}

/// Maps playback intent onto the helper process.
pub struct Player {
    helper_path: PathBuf,
    track_path: PathBuf,
    volume: f32,
    event_tx: mpsc::Sender<Event>,
    proc: Option<HelperProcess>,
    active: bool,
}

impl Player {
    /// `volume` is the normalized 0.0-1.0 level, clamped here once more so
    /// the helper never sees an out-of-range value.
    pub fn new(
        helper_path: PathBuf,
        track_path: PathBuf,
        volume: f32,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            helper_path,
            track_path,
            volume: volume.clamp(0.0, 1.0),
            event_tx,
            proc: None,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start (or resume) playback. No-op when already active.
    ///
    /// A helper that exited since the last command is respawned
    /// transparently.
    pub async fn activate(&mut self) -> Result<(), PlayerError> {
        if self.active {
            return Ok(());
        }

        if self.proc.as_ref().is_some_and(HelperProcess::has_exited) {
            self.proc = None;
        }

        if self.proc.is_none() {
            if !self.track_path.exists() {
                return Err(PlayerError::TrackNotFound(self.track_path.clone()));
            }

            let proc = HelperProcess::spawn(
                &self.helper_path,
                &self.track_path,
                self.volume,
                self.event_tx.clone(),
            )?;
            self.proc = Some(proc);
        }

        self.send(PlayerCommand::Play).await?;
        self.active = true;
        Ok(())
    }

    /// Pause playback. No-op when inactive or when no helper exists.
    pub async fn deactivate(&mut self) -> Result<(), PlayerError> {
        if !self.active || self.proc.is_none() {
            return Ok(());
        }

        self.send(PlayerCommand::Pause).await?;
        self.active = false;
        Ok(())
    }

    /// Called when the helper exits on its own; the next `activate()`
    /// respawns from scratch.
    pub fn on_exit(&mut self) {
        self.proc = None;
        self.active = false;
    }

    /// Stop playback and release the helper without waiting for it to exit.
    pub async fn dispose(&mut self) {
        self.active = false;
        if let Some(proc) = self.proc.take() {
            let _ = proc.send(PlayerCommand::Stop).await;
        }
    }

    async fn send(&mut self, command: PlayerCommand) -> Result<(), PlayerError> {
        let Some(proc) = self.proc.as_ref() else {
            return Err(PlayerError::CommandChannel);
        };

        match proc.send(command).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Stdin gone means the helper is dead or dying; reset so
                // the next activate() respawns.
                self.proc = None;
                self.active = false;
                Err(e)
            }
        }
    }
}
