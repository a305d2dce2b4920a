//! The shared playback session: the single record UI shells read to learn
//! what is playing. Only the adapter (and the handle, for intent) writes it.

use std::sync::{Arc, Mutex, PoisonError};

use crate::track::Track;

use super::types::{EnginePhase, Intent};

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    /// The track bound to the engine. `None` means no engine instance exists.
    pub active_track: Option<Track>,
    pub intent: Intent,
    /// 0-100. Kept while muted so unmuting restores it.
    pub volume: u8,
    pub muted: bool,
    /// Seconds.
    pub position: f64,
    /// Seconds, 0 while unknown.
    pub duration: f64,
    pub phase: EnginePhase,
    /// Bumped on every change, so observers can skip redundant work.
    pub revision: u64,
}

impl PlaybackSession {
    pub fn new(volume: u8, muted: bool) -> Self {
        Self {
            active_track: None,
            intent: Intent::Paused,
            volume: volume.min(100),
            muted,
            position: 0.0,
            duration: 0.0,
            phase: EnginePhase::Uninitialized,
            revision: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.intent == Intent::Playing
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.active_track.as_ref()
    }

    /// True while a bound track is waiting for its engine.
    pub fn is_loading(&self) -> bool {
        self.active_track.is_some()
            && matches!(
                self.phase,
                EnginePhase::LoadingScript | EnginePhase::Constructing
            )
    }

    /// Playback progress in `0.0..=1.0`; 0 while the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self::new(70, false)
    }
}

pub type SessionHandle = Arc<Mutex<PlaybackSession>>;

pub fn new_session_handle(session: PlaybackSession) -> SessionHandle {
    Arc::new(Mutex::new(session))
}

/// A copy of the current session state.
pub fn snapshot(handle: &SessionHandle) -> PlaybackSession {
    handle
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Apply `f` and bump the revision if anything changed.
pub fn update(handle: &SessionHandle, f: impl FnOnce(&mut PlaybackSession)) {
    let mut s = handle.lock().unwrap_or_else(PoisonError::into_inner);
    let before = s.clone();
    f(&mut s);
    if *s != before {
        s.revision = before.revision.wrapping_add(1);
    }
}
