/// Discrete signal written to the watched file by the coding agent's hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentSignal {
    Start,
    Stop,
}

impl AgentSignal {
    /// Parse raw signal file content. Only the exact tokens `start` and
    /// `stop` (after trimming) are signals; anything else is a non-match.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Playback intent as of the last successfully issued player command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// User-invocable actions accepted on the daemon's stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Play,
    Pause,
    Toggle,
    SetupHooks,
    RemoveHooks,
}

impl HostCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "play" => Some(Self::Play),
            "pause" => Some(Self::Pause),
            "toggle" => Some(Self::Toggle),
            "setup-hooks" => Some(Self::SetupHooks),
            "remove-hooks" => Some(Self::RemoveHooks),
            _ => None,
        }
    }
}

/// Events consumed by the main application loop.
#[derive(Debug)]
pub enum Event {
    /// The signal file settled with a valid signal.
    Signal(AgentSignal),
    /// A host command arrived on the daemon's stdin.
    Command(HostCommand),
    /// The audio helper process exited.
    PlayerExited { code: Option<i32> },
}
