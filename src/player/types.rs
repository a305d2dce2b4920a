//! Small types shared across the player subsystem: intents, engine states,
//! notifications and the messages processed by the player thread.

use std::fmt;

use crate::track::Track;

/// Desired transport state. May be set before any engine exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Intent {
    Playing,
    #[default]
    Paused,
}

impl Intent {
    pub fn toggled(self) -> Self {
        match self {
            Self::Playing => Self::Paused,
            Self::Paused => Self::Playing,
        }
    }
}

/// Lifecycle of the engine instance owned by the adapter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EnginePhase {
    /// No instance has been requested yet.
    #[default]
    Uninitialized,
    /// A track is bound but the engine's script dependency is still loading.
    LoadingScript,
    /// The instance exists and is waiting for its ready notification.
    Constructing,
    Ready,
    /// The last instance was torn down; a new one is needed to resume.
    Destroyed,
}

/// Transport state reported by the engine itself.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
}

/// Reason attached to an asynchronous engine error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorCode {
    Playback,
    /// The engine went away without being asked to.
    Disconnected,
    Other(String),
}

impl fmt::Display for EngineErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playback => write!(f, "playback error"),
            Self::Disconnected => write!(f, "player went away"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Identity of one engine instance; events carry it so that late callbacks
/// from a torn-down instance can be told apart from the live one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    Ready,
    StateChange(EngineState),
    Error(EngineErrorCode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub instance: InstanceId,
    pub notification: EngineNotification,
}

/// Control commands accepted from UI shells.
#[derive(Debug, Clone)]
pub enum PlayerCmd {
    /// Make `track` the active track (no-op if it already is).
    Bind(Track),
    SetIntent(Intent),
    /// Seek to an absolute position in seconds.
    Seek(f64),
    /// Seek relative to the current position, in seconds.
    SeekBy(f64),
    SetVolume(i32),
    AdjustVolume(i32),
    SetMuted(bool),
    ToggleMute,
    Stop,
    /// Tear everything down and exit the player thread.
    Quit,
}

/// Everything the player thread reacts to arrives as one of these.
#[derive(Debug)]
pub enum PlayerMsg {
    Command(PlayerCmd),
    Engine(EngineEvent),
    /// The process-wide script dependency finished loading.
    ScriptSettled(Result<(), String>),
}
