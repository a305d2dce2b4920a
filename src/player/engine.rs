//! The boundary to the external playback engine.
//!
//! An engine is a third-party, stateful player that initializes
//! asynchronously and reports back through callbacks. Implementations turn
//! those callbacks into [`EngineEvent`]s via the [`EngineEventSink`] they are
//! handed at construction time; the adapter consumes them on the player
//! thread, so no callback ever re-enters adapter code.

use std::sync::mpsc::Sender;

use super::container::HostContainer;
use super::script::ScriptCompletion;
use super::types::{
    EngineErrorCode, EngineEvent, EngineNotification, EngineState, InstanceId, PlayerMsg,
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to construct engine: {0}")]
    Construct(String),
    #[error("engine command `{command}` failed: {reason}")]
    Command {
        command: &'static str,
        reason: String,
    },
    #[error("engine instance is not connected")]
    NotConnected,
}

impl EngineError {
    pub fn command(command: &'static str, reason: impl ToString) -> Self {
        Self::Command {
            command,
            reason: reason.to_string(),
        }
    }
}

/// Initial settings handed to a new engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub autoplay: bool,
    pub volume: u8,
    pub muted: bool,
}

/// Control surface of one live engine instance.
pub trait Engine {
    fn play(&mut self) -> Result<(), EngineError>;
    fn pause(&mut self) -> Result<(), EngineError>;
    fn stop(&mut self) -> Result<(), EngineError>;
    fn seek_to(&mut self, seconds: f64) -> Result<(), EngineError>;
    fn set_volume(&mut self, volume: u8) -> Result<(), EngineError>;
    fn mute(&mut self) -> Result<(), EngineError>;
    fn unmute(&mut self) -> Result<(), EngineError>;
    fn current_time(&mut self) -> Result<f64, EngineError>;
    /// Total length in seconds; 0 while unknown.
    fn duration(&mut self) -> Result<f64, EngineError>;
    fn player_state(&mut self) -> Result<EngineState, EngineError>;
    fn destroy(&mut self) -> Result<(), EngineError>;
}

/// Creates engine instances and loads the engine's bootstrap dependency.
pub trait EngineFactory: Send {
    /// Start loading the script dependency. Must eventually call
    /// `completion.finish` exactly once, from any thread.
    fn load_script(&mut self, completion: ScriptCompletion);

    /// Build a new instance for `video_id` hosted in `container`. The
    /// instance reports readiness later through `events`.
    fn construct(
        &mut self,
        container: &HostContainer,
        video_id: &str,
        options: &EngineOptions,
        events: EngineEventSink,
    ) -> Result<Box<dyn Engine>, EngineError>;
}

/// Callback target handed to one engine instance.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    instance: InstanceId,
    tx: Sender<PlayerMsg>,
}

impl EngineEventSink {
    pub fn new(instance: InstanceId, tx: Sender<PlayerMsg>) -> Self {
        Self { instance, tx }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn ready(&self) {
        self.notify(EngineNotification::Ready);
    }

    pub fn state_changed(&self, state: EngineState) {
        self.notify(EngineNotification::StateChange(state));
    }

    pub fn error(&self, code: EngineErrorCode) {
        self.notify(EngineNotification::Error(code));
    }

    pub fn notify(&self, notification: EngineNotification) {
        // The player thread may already be gone during shutdown.
        let _ = self.tx.send(PlayerMsg::Engine(EngineEvent {
            instance: self.instance,
            notification,
        }));
    }
}
