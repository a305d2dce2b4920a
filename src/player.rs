//! Playback through an external, asynchronously-initializing engine.
//!
//! A [`PlayerHandle`] owns one player thread. The thread runs an adapter
//! that keeps at most one engine instance bound to the session's active
//! track, folds engine notifications and poll samples into the shared
//! [`PlaybackSession`], and never re-issues commands in response to the
//! engine's own notifications.

mod adapter;
mod container;
mod engine;
mod handle;
mod host;
mod poller;
mod script;
mod session;
mod thread;
mod types;

pub use adapter::{Adapter, Flow};
pub use container::{ContainerSlot, HostContainer};
pub use engine::{Engine, EngineError, EngineEventSink, EngineFactory, EngineOptions};
pub use handle::PlayerHandle;
pub use host::PlayerHost;
pub use poller::ProgressPoller;
pub use script::{ScriptCompletion, ScriptDependency, ScriptStatus};
pub use session::{PlaybackSession, SessionHandle, new_session_handle, snapshot, update};
pub use types::*;

#[cfg(test)]
mod tests;
