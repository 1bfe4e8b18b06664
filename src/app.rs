use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::hooks;
use crate::messages::{AgentSignal, Event, HostCommand, PlaybackState};
use crate::player::{self, Player};
use crate::signal::{self, SignalWatcher};
use crate::status::StatusLine;

pub struct App {
    config: Config,
    player: Player,
    status: StatusLine,
    watcher: SignalWatcher,
    event_rx: mpsc::Receiver<Event>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(32);

        let signal_path = config
            .signal_path
            .clone()
            .unwrap_or_else(signal::default_signal_path);
        let mut watcher =
            SignalWatcher::new(signal_path).with_debounce_ms(config.debounce_ms);
        watcher.start(event_tx.clone())?;

        let track_path = config.resolve_track().unwrap_or_else(|| {
            tracing::warn!(
                "Audio track {:?} not found; playback will fail until it exists",
                config.track_path
            );
            PathBuf::from(&config.track_path)
        });
        let helper_path = config
            .helper_path
            .clone()
            .unwrap_or_else(player::default_helper_path);
        let player = Player::new(
            helper_path,
            track_path,
            config.volume_level(),
            event_tx.clone(),
        );

        tokio::spawn(listen_host_commands(event_tx));

        Ok(Self {
            config,
            player,
            status: StatusLine::new(),
            watcher,
            event_rx,
        })
    }

    /// Snapshot channel for the status indicator.
    pub fn status_watch(&self) -> watch::Receiver<PlaybackState> {
        self.status.subscribe()
    }

    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                Some(event) = self.event_rx.recv() => {
                    self.handle_event(event).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.shutdown().await;
        tracing::info!("Muzak shutdown complete");
        Ok(())
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Signal(signal) => {
                if !self.config.enabled {
                    tracing::debug!("Ignoring signal {:?}: muzak is disabled", signal);
                    return;
                }
                tracing::info!("Signal received: {:?}", signal);
                match signal {
                    AgentSignal::Start => self.play().await,
                    AgentSignal::Stop => self.pause().await,
                }
            }

            Event::Command(command) => self.handle_command(command).await,

            Event::PlayerExited { code } => {
                // Expected after dispose; anything else is an implicit
                // deactivate and the next activate respawns.
                if self.player.is_active() {
                    tracing::warn!("Audio helper exited unexpectedly (code {:?})", code);
                } else {
                    tracing::debug!("Audio helper exited (code {:?})", code);
                }
                self.player.on_exit();
                self.status.update(PlaybackState::Idle);
            }
        }
    }

    async fn handle_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Play => self.play().await,
            HostCommand::Pause => self.pause().await,
            HostCommand::Toggle => {
                if self.player.is_active() {
                    self.pause().await
                } else {
                    self.play().await
                }
            }

            HostCommand::SetupHooks => {
                let hooks_file = hooks::default_hooks_path();
                if hooks::has_hooks(&hooks_file, self.watcher.path()) {
                    tracing::info!("Agent hooks already installed in {:?}", hooks_file);
                    return;
                }
                match hooks::install(&hooks_file, self.watcher.path()) {
                    Ok(()) => tracing::info!("Agent hooks installed in {:?}", hooks_file),
                    Err(e) => tracing::error!("Failed to install agent hooks: {:#}", e),
                }
            }

            HostCommand::RemoveHooks => {
                let hooks_file = hooks::default_hooks_path();
                match hooks::remove(&hooks_file, self.watcher.path()) {
                    Ok(()) => tracing::info!("Agent hooks removed from {:?}", hooks_file),
                    Err(e) => tracing::error!("Failed to remove agent hooks: {:#}", e),
                }
            }
        }
    }

    async fn play(&mut self) {
        match self.player.activate().await {
            Ok(()) => self.status.update(PlaybackState::Playing),
            // Non-fatal: the worst outcome is silence
            Err(e) => tracing::warn!("Player error: {}", e),
        }
    }

    async fn pause(&mut self) {
        match self.player.deactivate().await {
            Ok(()) => self.status.update(PlaybackState::Paused),
            Err(e) => tracing::warn!("Player error: {}", e),
        }
    }

    async fn shutdown(&mut self) {
        self.player.dispose().await;
        self.watcher.stop();
    }
}

/// Host command surface: read user commands from the daemon's stdin
/// (`play`, `pause`, `toggle`, `setup-hooks`, `remove-hooks`), one per line.
async fn listen_host_commands(event_tx: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        match HostCommand::parse(&line) {
            Some(command) => {
                if event_tx.send(Event::Command(command)).await.is_err() {
                    break;
                }
            }
            None => {
                if !line.trim().is_empty() {
                    tracing::debug!("Ignoring unknown command: {}", line.trim());
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tokio::time::timeout;

    fn write_fake_helper(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-helper");
        fs::write(&script, "#!/bin/sh\nwhile read line; do :; done\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    fn test_config(dir: &Path) -> Config {
        let track = dir.join("track.mp3");
        fs::write(&track, b"not really audio").unwrap();

        Config {
            enabled: true,
            volume: 50,
            track_path: track.display().to_string(),
            helper_path: Some(write_fake_helper(dir)),
            debounce_ms: 50,
            signal_path: Some(dir.join("muzak-signal")),
        }
    }

    /// Keep rewriting the signal until the state lands; a write that races
    /// the watcher's registration is simply retried, the way a real agent
    /// re-triggers on its next event.
    async fn drive_to_state(
        signal_path: &Path,
        token: &str,
        rx: &mut watch::Receiver<PlaybackState>,
        want: PlaybackState,
    ) {
        for _ in 0..40 {
            fs::write(signal_path, token).unwrap();
            if timeout(Duration::from_millis(250), rx.changed()).await.is_ok()
                && *rx.borrow_and_update() == want
            {
                return;
            }
            if *rx.borrow_and_update() == want {
                return;
            }
        }
        panic!("state never reached {:?}", want);
    }

    #[tokio::test]
    async fn signals_drive_playback_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let signal_path = config.signal_path.clone().unwrap();

        let app = App::new(config).unwrap();
        let mut state_rx = app.status_watch();
        assert_eq!(*state_rx.borrow(), PlaybackState::Idle);

        let handle = tokio::spawn(app.run());

        drive_to_state(&signal_path, "start", &mut state_rx, PlaybackState::Playing).await;
        drive_to_state(&signal_path, "stop", &mut state_rx, PlaybackState::Paused).await;

        handle.abort();
    }

    #[tokio::test]
    async fn disabled_config_ignores_signals() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.enabled = false;
        let signal_path = config.signal_path.clone().unwrap();

        let app = App::new(config).unwrap();
        let mut state_rx = app.status_watch();
        let handle = tokio::spawn(app.run());

        // Give the watcher time to register, then signal repeatedly
        for _ in 0..10 {
            fs::write(&signal_path, "start").unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(*state_rx.borrow_and_update(), PlaybackState::Idle);

        handle.abort();
    }
}
