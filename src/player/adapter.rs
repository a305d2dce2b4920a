//! The external player adapter.
//!
//! Turns "play this track with these settings" into imperative calls on an
//! asynchronously-initializing engine, and folds the engine's notifications
//! back into the shared [`PlaybackSession`]. All of it runs on the player
//! thread: commands, engine events and poll ticks are processed one at a
//! time, in arrival order.
//!
//! Failure policy: any engine failure (construction, command, asynchronous
//! error, missed ready deadline) destroys the instance and clears the
//! session. Callers of the triggering command never see the error.

use std::io;
use std::sync::mpsc::Sender;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::PlayerSettings;
use crate::notify::Notices;
use crate::track::Track;

use super::container::HostContainer;
use super::engine::{Engine, EngineError, EngineEventSink, EngineFactory, EngineOptions};
use super::host::PlayerHost;
use super::poller::ProgressPoller;
use super::script::ScriptStatus;
use super::session::{self, PlaybackSession, SessionHandle};
use super::types::{
    EngineErrorCode, EngineEvent, EngineNotification, EnginePhase, EngineState, InstanceId,
    Intent, PlayerCmd, PlayerMsg,
};

#[derive(Debug, thiserror::Error)]
enum Failure {
    #[error("player script failed to load: {0}")]
    Script(String),
    #[error("player container unavailable: {0}")]
    Container(io::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("player reported an error: {0}")]
    Async(EngineErrorCode),
    #[error("player did not become ready within {0:?}")]
    ReadyTimeout(Duration),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Stage {
    Constructing { deadline: Instant },
    Ready,
}

struct LiveEngine {
    id: InstanceId,
    engine: Box<dyn Engine>,
    stage: Stage,
    /// Transport state the engine last reported. New instances start paused.
    reported: Intent,
    /// Transport command issued to the engine whose confirming
    /// notification has not arrived yet.
    awaiting: Option<Intent>,
}

impl LiveEngine {
    fn is_ready(&self) -> bool {
        self.stage == Stage::Ready
    }

    /// The state the engine is in, or is about to be in.
    fn expected(&self) -> Intent {
        self.awaiting.unwrap_or(self.reported)
    }
}

/// Whether the player loop should keep running.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Adapter {
    factory: Box<dyn EngineFactory>,
    host: PlayerHost,
    session: SessionHandle,
    notices: Notices,
    tx: Sender<PlayerMsg>,
    ready_timeout: Duration,
    poller: ProgressPoller,
    live: Option<LiveEngine>,
    container: Option<Arc<HostContainer>>,
    awaiting_script: bool,
    next_instance: u64,
}

impl Adapter {
    /// `tx` must feed the same channel the caller passes to [`Adapter::handle`].
    pub fn new(
        factory: Box<dyn EngineFactory>,
        host: PlayerHost,
        settings: &PlayerSettings,
        session: SessionHandle,
        notices: Notices,
        tx: Sender<PlayerMsg>,
    ) -> Self {
        Self {
            factory,
            host,
            session,
            notices,
            tx,
            ready_timeout: Duration::from_millis(settings.ready_timeout_ms),
            poller: ProgressPoller::new(Duration::from_millis(settings.poll_interval_ms)),
            live: None,
            container: None,
            awaiting_script: false,
            next_instance: 0,
        }
    }

    pub fn handle(&mut self, msg: PlayerMsg, now: Instant) -> Flow {
        match msg {
            PlayerMsg::Command(cmd) => return self.command(cmd, now),
            PlayerMsg::Engine(event) => self.on_engine_event(event, now),
            PlayerMsg::ScriptSettled(result) => self.on_script_settled(result, now),
        }
        Flow::Continue
    }

    fn command(&mut self, cmd: PlayerCmd, now: Instant) -> Flow {
        match cmd {
            PlayerCmd::Bind(track) => self.bind_track(track, now),
            PlayerCmd::SetIntent(intent) => self.set_intent(intent, now),
            PlayerCmd::Seek(target) => self.seek(target),
            PlayerCmd::SeekBy(delta) => {
                let position = self.read(|s| s.position);
                self.seek(position + delta);
            }
            PlayerCmd::SetVolume(volume) => self.set_volume(volume),
            PlayerCmd::AdjustVolume(delta) => {
                let volume = self.read(|s| s.volume);
                self.set_volume(i32::from(volume) + delta);
            }
            PlayerCmd::SetMuted(muted) => self.set_muted(muted),
            PlayerCmd::ToggleMute => self.toggle_mute(),
            PlayerCmd::Stop => self.stop(),
            PlayerCmd::Quit => {
                self.shutdown();
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    /// Make `track` the active track, replacing any engine instance bound
    /// to a different track. Binding the active track again does nothing.
    pub fn bind_track(&mut self, track: Track, now: Instant) {
        let already_bound = self.read(|s| s.active_track.as_ref().is_some_and(|t| t.same_id(&track)));
        if already_bound {
            debug!(id = %track.id, "track already bound");
            return;
        }

        info!(id = %track.id, title = %track.title, "binding track");
        self.teardown_instance();
        session::update(&self.session, |s| {
            s.active_track = Some(track);
            s.position = 0.0;
            s.duration = 0.0;
        });
        self.construct_or_defer(now);
    }

    pub fn set_intent(&mut self, intent: Intent, now: Instant) {
        session::update(&self.session, |s| s.intent = intent);

        let outcome = match self.live.as_mut() {
            // An engine only confirms actual changes, so a redundant
            // command would never be cleared from `awaiting`.
            Some(live) if live.is_ready() && live.expected() == intent => {
                debug!(?intent, "engine already in requested state");
                None
            }
            Some(live) if live.is_ready() => {
                let result = match intent {
                    Intent::Playing => live.engine.play(),
                    Intent::Paused => live.engine.pause(),
                };
                if result.is_ok() {
                    live.awaiting = Some(intent);
                }
                Some(result)
            }
            Some(_) => {
                debug!(?intent, "engine not ready; intent deferred");
                None
            }
            None => {
                let resumable = intent == Intent::Playing
                    && !self.awaiting_script
                    && self.read(|s| s.active_track.is_some() && s.phase == EnginePhase::Destroyed);
                if resumable {
                    info!("restarting ended track");
                    self.construct_or_defer(now);
                }
                None
            }
        };

        if let Some(Err(e)) = outcome {
            self.fail(e.into());
        }
    }

    /// Seek to `target` seconds, clamped into the known duration. Ignored
    /// until the engine is ready and the duration is known.
    pub fn seek(&mut self, target: f64) {
        if !target.is_finite() {
            return;
        }
        let duration = self.read(|s| s.duration);
        let Some(live) = self.live.as_mut().filter(|l| l.is_ready()) else {
            debug!(target, "seek ignored; engine not ready");
            return;
        };
        if duration <= 0.0 {
            debug!(target, "seek ignored; duration unknown");
            return;
        }

        let target = target.clamp(0.0, duration);
        match live.engine.seek_to(target) {
            // Overwritten by the next poll sample.
            Ok(()) => session::update(&self.session, |s| s.position = target),
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn set_volume(&mut self, volume: i32) {
        let volume = volume.clamp(0, 100) as u8;
        session::update(&self.session, |s| s.volume = volume);

        let result = match self.live.as_mut().filter(|l| l.is_ready()) {
            Some(live) => live.engine.set_volume(volume),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.fail(e.into());
        }
    }

    /// Muting leaves the stored volume untouched.
    pub fn set_muted(&mut self, muted: bool) {
        session::update(&self.session, |s| s.muted = muted);

        let result = match self.live.as_mut().filter(|l| l.is_ready()) {
            Some(live) if muted => live.engine.mute(),
            Some(live) => live.engine.unmute(),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.fail(e.into());
        }
    }

    pub fn toggle_mute(&mut self) {
        let muted = self.read(|s| s.muted);
        self.set_muted(!muted);
    }

    /// Tear down the engine and clear the active track.
    pub fn stop(&mut self) {
        let active = self.read(|s| s.active_track.is_some());
        if !active && self.live.is_none() {
            debug!("stop with nothing active");
            return;
        }
        info!("stopping playback");
        self.teardown_instance();
        self.clear_session();
    }

    /// Release everything this adapter holds: engine, poller, container.
    pub fn shutdown(&mut self) {
        if self.live.is_some() || self.read(|s| s.active_track.is_some()) {
            self.teardown_instance();
            self.clear_session();
        }
        self.container = None;
    }

    /// Run timer work due at `now`: the ready deadline and the poller.
    pub fn tick(&mut self, now: Instant) {
        if let Some(Stage::Constructing { deadline }) = self.live.as_ref().map(|l| l.stage) {
            if now >= deadline {
                self.fail(Failure::ReadyTimeout(self.ready_timeout));
                return;
            }
        }

        if let Some(id) = self.poller.due(now) {
            self.sample(id);
        }
    }

    /// The earliest instant `tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let ready_deadline = match self.live.as_ref().map(|l| l.stage) {
            Some(Stage::Constructing { deadline }) => Some(deadline),
            _ => None,
        };
        match (ready_deadline, self.poller.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.read(|s| s.phase)
    }

    pub fn live_instance(&self) -> Option<InstanceId> {
        self.live.as_ref().map(|l| l.id)
    }

    pub fn poller_running(&self) -> bool {
        self.poller.is_running()
    }

    fn construct_or_defer(&mut self, now: Instant) {
        if self.awaiting_script {
            self.set_phase(EnginePhase::LoadingScript);
            return;
        }

        let factory = &mut self.factory;
        let status = self
            .host
            .script
            .ensure_loaded(self.tx.clone(), |completion| factory.load_script(completion));

        match status {
            ScriptStatus::Ready => self.construct_engine(now),
            ScriptStatus::Pending => {
                debug!("waiting for engine script dependency");
                self.awaiting_script = true;
                self.set_phase(EnginePhase::LoadingScript);
            }
        }
    }

    fn on_script_settled(&mut self, result: Result<(), String>, now: Instant) {
        self.awaiting_script = false;
        let has_track = self.read(|s| s.active_track.is_some());

        match result {
            // Only the latest bound track is constructed.
            Ok(()) if has_track && self.live.is_none() => self.construct_engine(now),
            Ok(()) => {}
            Err(e) if has_track => self.fail(Failure::Script(e)),
            Err(e) => debug!(error = %e, "script failed with nothing bound"),
        }
    }

    fn construct_engine(&mut self, now: Instant) {
        let Some(track) = self.read(|s| s.active_track.clone()) else {
            return;
        };
        let container = match self.container_lease() {
            Ok(c) => c,
            Err(e) => {
                self.fail(Failure::Container(e));
                return;
            }
        };

        self.next_instance += 1;
        let id = InstanceId(self.next_instance);
        let options = self.read(|s| EngineOptions {
            autoplay: false,
            volume: s.volume,
            muted: s.muted,
        });
        let events = EngineEventSink::new(id, self.tx.clone());

        match self.factory.construct(&container, &track.id, &options, events) {
            Ok(engine) => {
                debug!(instance = %id, id = %track.id, "engine constructing");
                self.live = Some(LiveEngine {
                    id,
                    engine,
                    stage: Stage::Constructing {
                        deadline: now + self.ready_timeout,
                    },
                    reported: Intent::Paused,
                    awaiting: None,
                });
                self.set_phase(EnginePhase::Constructing);
            }
            Err(e) => self.fail(e.into()),
        }
    }

    fn container_lease(&mut self) -> io::Result<Arc<HostContainer>> {
        if let Some(c) = &self.container {
            return Ok(Arc::clone(c));
        }
        let c = self.host.container.acquire()?;
        self.container = Some(Arc::clone(&c));
        Ok(c)
    }

    fn on_engine_event(&mut self, event: EngineEvent, now: Instant) {
        let live_id = self.live.as_ref().map(|l| l.id);
        if live_id != Some(event.instance) {
            debug!(instance = %event.instance, ?live_id, "ignoring event from stale engine instance");
            return;
        }

        match event.notification {
            EngineNotification::Ready => self.on_ready(now),
            EngineNotification::StateChange(state) => self.on_state_change(state),
            EngineNotification::Error(code) => self.fail(Failure::Async(code)),
        }
    }

    fn on_ready(&mut self, now: Instant) {
        let (volume, muted, intent) = self.read(|s| (s.volume, s.muted, s.intent));
        let Some(live) = self.live.as_mut() else {
            return;
        };
        if live.is_ready() {
            debug!(instance = %live.id, "duplicate ready notification");
            return;
        }

        live.stage = Stage::Ready;
        let id = live.id;
        match apply_pending(live, volume, muted, intent) {
            Ok(()) => {
                info!(instance = %id, "engine ready");
                self.poller.start(id, now);
                self.set_phase(EnginePhase::Ready);
            }
            Err(e) => self.fail(e.into()),
        }
    }

    fn on_state_change(&mut self, state: EngineState) {
        let Some(live) = self.live.as_mut() else {
            return;
        };
        if !live.is_ready() {
            debug!(?state, "state change before ready");
            return;
        }

        let reported = match state {
            EngineState::Playing => Intent::Playing,
            EngineState::Paused => Intent::Paused,
            EngineState::Ended => {
                self.on_track_ended();
                return;
            }
            EngineState::Buffering | EngineState::Unstarted => {
                debug!(?state, "transient engine state");
                return;
            }
        };

        live.reported = reported;
        match live.awaiting {
            Some(expected) if expected != reported => {
                // Describes the state before our own command.
                debug!(?reported, ?expected, "ignoring stale state notification");
            }
            Some(_) => live.awaiting = None,
            None => {
                debug!(?reported, "engine changed state on its own");
                session::update(&self.session, |s| s.intent = reported);
            }
        }
    }

    fn sample(&mut self, id: InstanceId) {
        let known_duration = self.read(|s| s.duration);
        let Some(live) = self.live.as_mut().filter(|l| l.id == id && l.is_ready()) else {
            self.poller.stop();
            return;
        };

        let sampled = sample_engine(live.engine.as_mut(), known_duration);
        let (position, duration) = match sampled {
            Ok(v) => v,
            Err(e) => {
                self.fail(e.into());
                return;
            }
        };

        if duration > 0.0 && position > duration {
            debug!(position, duration, "position past duration; treating as ended");
            self.on_track_ended();
            return;
        }

        session::update(&self.session, |s| {
            s.position = position;
            if s.duration <= 0.0 {
                s.duration = duration;
            }
        });
    }

    fn on_track_ended(&mut self) {
        info!("track ended");
        self.teardown_instance();
        session::update(&self.session, |s| {
            s.intent = Intent::Paused;
            s.position = 0.0;
            s.phase = EnginePhase::Destroyed;
        });
    }

    fn fail(&mut self, failure: Failure) {
        warn!(error = %failure, "playback failure; clearing session");
        self.teardown_instance();
        self.clear_session();
        self.notices.push_error(format!("Playback stopped: {failure}"));
    }

    /// Stop the poller and destroy the live instance, if any. A failing
    /// destroy is logged and otherwise ignored.
    fn teardown_instance(&mut self) {
        self.poller.stop();
        if let Some(mut live) = self.live.take() {
            debug!(instance = %live.id, "destroying engine instance");
            if let Err(e) = live.engine.destroy() {
                warn!(instance = %live.id, error = %e, "engine destroy failed; continuing");
            }
        }
    }

    fn clear_session(&self) {
        session::update(&self.session, |s| {
            s.active_track = None;
            s.intent = Intent::Paused;
            s.position = 0.0;
            s.duration = 0.0;
            s.phase = EnginePhase::Destroyed;
        });
    }

    fn set_phase(&self, phase: EnginePhase) {
        session::update(&self.session, |s| s.phase = phase);
    }

    fn read<T>(&self, f: impl FnOnce(&PlaybackSession) -> T) -> T {
        let s = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        f(&s)
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        self.teardown_instance();
    }
}

/// Push the settings chosen before the engine was ready.
fn apply_pending(
    live: &mut LiveEngine,
    volume: u8,
    muted: bool,
    intent: Intent,
) -> Result<(), EngineError> {
    live.engine.set_volume(volume)?;
    if muted {
        live.engine.mute()?;
    }
    if intent == Intent::Playing && live.expected() != Intent::Playing {
        live.engine.play()?;
        live.awaiting = Some(Intent::Playing);
    }
    Ok(())
}

fn sample_engine(engine: &mut dyn Engine, known_duration: f64) -> Result<(f64, f64), EngineError> {
    let position = engine.current_time()?;
    let duration = if known_duration > 0.0 {
        known_duration
    } else {
        engine.duration()?
    };

    let position = if position.is_finite() { position.max(0.0) } else { 0.0 };
    let duration = if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    };
    Ok((position, duration))
}
