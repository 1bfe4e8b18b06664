use tokio::sync::watch;

use crate::messages::PlaybackState;

/// Passive indicator of the controller's last confirmed state.
///
/// Holds no logic of its own: the app updates it only after a player
/// operation succeeds, and observers read snapshots via the watch channel.
pub struct StatusLine {
    state_tx: watch::Sender<PlaybackState>,
}

impl StatusLine {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self { state_tx }
    }

    pub fn state(&self) -> PlaybackState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn update(&self, state: PlaybackState) {
        if self.state() == state {
            return;
        }
        self.state_tx.send_replace(state);
        tracing::info!("{}", Self::label(state));
        tracing::debug!("{}", Self::detail(state));
    }

    pub fn label(state: PlaybackState) -> &'static str {
        match state {
            PlaybackState::Playing => "muzak: playing",
            PlaybackState::Paused => "muzak: paused",
            PlaybackState::Idle => "muzak: idle",
        }
    }

    pub fn detail(state: PlaybackState) -> &'static str {
        match state {
            PlaybackState::Playing => "Agent is working - music playing. Send `pause` to pause.",
            PlaybackState::Paused => "Music paused. Send `play` to resume.",
            PlaybackState::Idle => "Waiting for agent signals. Send `play` to start.",
        }
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let status = StatusLine::new();
        assert_eq!(status.state(), PlaybackState::Idle);
    }

    #[test]
    fn update_replaces_the_snapshot() {
        let status = StatusLine::new();
        status.update(PlaybackState::Playing);
        assert_eq!(status.state(), PlaybackState::Playing);

        status.update(PlaybackState::Paused);
        assert_eq!(status.state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let status = StatusLine::new();
        let mut rx = status.subscribe();

        status.update(PlaybackState::Playing);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), PlaybackState::Playing);
    }

    #[test]
    fn labels_are_distinct_per_state() {
        let states = [
            PlaybackState::Idle,
            PlaybackState::Playing,
            PlaybackState::Paused,
        ];
        for state in states {
            assert!(!StatusLine::label(state).is_empty());
            assert!(!StatusLine::detail(state).is_empty());
        }
        assert_ne!(
            StatusLine::label(PlaybackState::Playing),
            StatusLine::label(PlaybackState::Paused)
        );
    }
}
