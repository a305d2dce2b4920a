use std::io;
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::warn;

use crate::config::PlayerSettings;
use crate::notify::Notices;
use crate::track::Track;

use super::engine::EngineFactory;
use super::host::PlayerHost;
use super::session::{self, PlaybackSession, SessionHandle, new_session_handle};
use super::thread::{ThreadParts, spawn_player_thread};
use super::types::{Intent, PlayerCmd, PlayerMsg};

/// The control surface UI shells talk to. Cheap to share behind an `Arc`;
/// every method only sends a message to the player thread.
pub struct PlayerHandle {
    tx: Sender<PlayerMsg>,
    session: SessionHandle,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl PlayerHandle {
    pub fn spawn(
        factory: Box<dyn EngineFactory>,
        host: PlayerHost,
        settings: &PlayerSettings,
        notices: Notices,
    ) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let session = new_session_handle(PlaybackSession::new(
            settings.default_volume,
            settings.start_muted,
        ));

        let join = spawn_player_thread(
            ThreadParts {
                factory,
                host,
                settings: settings.clone(),
                session: session.clone(),
                notices,
                tx: tx.clone(),
            },
            rx,
        )?;

        Ok(Self {
            tx,
            session,
            join: Mutex::new(Some(join)),
        })
    }

    pub fn snapshot(&self) -> PlaybackSession {
        session::snapshot(&self.session)
    }

    pub fn send(&self, cmd: PlayerCmd) {
        if let Err(e) = self.tx.send(PlayerMsg::Command(cmd)) {
            warn!(cmd = ?e.0, "player thread is gone; command dropped");
        }
    }

    /// Bind `track` and ask for playback.
    pub fn play_track(&self, track: Track) {
        self.bind_track(track);
        self.play();
    }

    pub fn bind_track(&self, track: Track) {
        self.send(PlayerCmd::Bind(track));
    }

    pub fn play(&self) {
        self.set_intent(Intent::Playing);
    }

    pub fn pause(&self) {
        self.set_intent(Intent::Paused);
    }

    pub fn toggle_playback(&self) {
        let next = self.snapshot().intent.toggled();
        self.set_intent(next);
    }

    // Recorded right away so the UI reflects it before the engine answers.
    fn set_intent(&self, intent: Intent) {
        session::update(&self.session, |s| s.intent = intent);
        self.send(PlayerCmd::SetIntent(intent));
    }

    pub fn seek(&self, seconds: f64) {
        self.send(PlayerCmd::Seek(seconds));
    }

    pub fn seek_by(&self, delta: f64) {
        self.send(PlayerCmd::SeekBy(delta));
    }

    pub fn set_volume(&self, volume: i32) {
        self.send(PlayerCmd::SetVolume(volume));
    }

    pub fn adjust_volume(&self, delta: i32) {
        self.send(PlayerCmd::AdjustVolume(delta));
    }

    pub fn set_muted(&self, muted: bool) {
        self.send(PlayerCmd::SetMuted(muted));
    }

    pub fn toggle_mute(&self) {
        self.send(PlayerCmd::ToggleMute);
    }

    pub fn stop(&self) {
        self.send(PlayerCmd::Stop);
    }

    /// Tear the engine down and wait for the player thread to exit.
    pub fn quit(&self) {
        let _ = self.tx.send(PlayerMsg::Command(PlayerCmd::Quit));

        let mut join = self.join.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(h) = join.take() {
            let _ = h.join();
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.quit();
    }
}
