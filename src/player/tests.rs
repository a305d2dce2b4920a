use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::*;
use crate::config::{PlayerSettings, SearchSettings};
use crate::notify::Notices;
use crate::search::{SearchBackend, SearchError, TrackSearch};
use crate::track::Track;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum ScriptMode {
    #[default]
    Immediate,
    Hold,
    Fail,
}

#[derive(Default)]
struct Fake {
    script_mode: ScriptMode,
    script_loads: usize,
    held: Vec<ScriptCompletion>,
    constructed: Vec<(InstanceId, String, EngineOptions)>,
    sinks: Vec<EngineEventSink>,
    calls: Vec<(InstanceId, String)>,
    destroyed: Vec<InstanceId>,
    fail_construct: bool,
    fail_destroy: bool,
    /// Every transport, volume and query call errors.
    fail_commands: bool,
    auto_ready: bool,
    current_time: f64,
    duration: f64,
}

type Shared = Arc<Mutex<Fake>>;

struct FakeFactory(Shared);

impl EngineFactory for FakeFactory {
    fn load_script(&mut self, completion: ScriptCompletion) {
        let mut f = self.0.lock().unwrap();
        f.script_loads += 1;
        match f.script_mode {
            ScriptMode::Immediate => {
                drop(f);
                completion.finish(Ok(()));
            }
            ScriptMode::Fail => {
                drop(f);
                completion.finish(Err("script blocked".into()));
            }
            ScriptMode::Hold => f.held.push(completion),
        }
    }

    fn construct(
        &mut self,
        container: &HostContainer,
        video_id: &str,
        options: &EngineOptions,
        events: EngineEventSink,
    ) -> Result<Box<dyn Engine>, EngineError> {
        assert!(container.path().is_dir());
        let mut f = self.0.lock().unwrap();
        if f.fail_construct {
            return Err(EngineError::Construct("no player available".into()));
        }
        let id = events.instance();
        f.constructed.push((id, video_id.to_string(), options.clone()));
        if f.auto_ready {
            events.ready();
        }
        f.sinks.push(events);
        Ok(Box::new(FakeEngine {
            id,
            fake: Arc::clone(&self.0),
        }))
    }
}

struct FakeEngine {
    id: InstanceId,
    fake: Shared,
}

impl FakeEngine {
    fn record(&self, call: impl Into<String>) -> Result<(), EngineError> {
        let mut f = self.fake.lock().unwrap();
        f.calls.push((self.id, call.into()));
        if f.fail_commands {
            return Err(EngineError::command("fake", "engine gone"));
        }
        Ok(())
    }
}

impl Engine for FakeEngine {
    fn play(&mut self) -> Result<(), EngineError> {
        self.record("play")
    }
    fn pause(&mut self) -> Result<(), EngineError> {
        self.record("pause")
    }
    fn stop(&mut self) -> Result<(), EngineError> {
        self.record("stop")
    }
    fn seek_to(&mut self, seconds: f64) -> Result<(), EngineError> {
        self.record(format!("seek {seconds}"))
    }
    fn set_volume(&mut self, volume: u8) -> Result<(), EngineError> {
        self.record(format!("volume {volume}"))
    }
    fn mute(&mut self) -> Result<(), EngineError> {
        self.record("mute")
    }
    fn unmute(&mut self) -> Result<(), EngineError> {
        self.record("unmute")
    }
    fn current_time(&mut self) -> Result<f64, EngineError> {
        let f = self.fake.lock().unwrap();
        if f.fail_commands {
            return Err(EngineError::command("current_time", "engine gone"));
        }
        Ok(f.current_time)
    }
    fn duration(&mut self) -> Result<f64, EngineError> {
        Ok(self.fake.lock().unwrap().duration)
    }
    fn player_state(&mut self) -> Result<EngineState, EngineError> {
        Ok(EngineState::Unstarted)
    }
    fn destroy(&mut self) -> Result<(), EngineError> {
        let mut f = self.fake.lock().unwrap();
        f.destroyed.push(self.id);
        if f.fail_destroy {
            return Err(EngineError::command("destroy", "already gone"));
        }
        Ok(())
    }
}

fn player_settings() -> PlayerSettings {
    PlayerSettings {
        poll_interval_ms: 500,
        ready_timeout_ms: 2_000,
        default_volume: 70,
        start_muted: false,
    }
}

fn track(id: &str) -> Track {
    Track {
        id: id.into(),
        title: format!("Title {id}"),
        artist: "Artist".into(),
        description: String::new(),
        thumbnail_url: String::new(),
    }
}

const POLL: Duration = Duration::from_millis(500);

struct Harness {
    adapter: Adapter,
    rx: Receiver<PlayerMsg>,
    fake: Shared,
    session: SessionHandle,
    notices: Notices,
    host: PlayerHost,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        Self::with(Fake::default())
    }

    fn with(fake: Fake) -> Self {
        let fake = Arc::new(Mutex::new(fake));
        let (tx, rx) = mpsc::channel();
        let session = new_session_handle(PlaybackSession::new(70, false));
        let notices = Notices::new();
        let host = PlayerHost::default();
        let adapter = Adapter::new(
            Box::new(FakeFactory(fake.clone())),
            host.clone(),
            &player_settings(),
            session.clone(),
            notices.clone(),
            tx,
        );
        Self {
            adapter,
            rx,
            fake,
            session,
            notices,
            host,
            now: Instant::now(),
        }
    }

    fn fake(&self) -> MutexGuard<'_, Fake> {
        self.fake.lock().unwrap()
    }

    /// Deliver every queued message.
    fn pump(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.adapter.handle(msg, self.now);
        }
    }

    fn cmd(&mut self, cmd: PlayerCmd) {
        self.adapter.handle(PlayerMsg::Command(cmd), self.now);
        self.pump();
    }

    fn bind(&mut self, id: &str) {
        self.cmd(PlayerCmd::Bind(track(id)));
    }

    fn sink(&self, id: InstanceId) -> EngineEventSink {
        self.fake()
            .sinks
            .iter()
            .find(|s| s.instance() == id)
            .cloned()
            .unwrap()
    }

    fn ready(&mut self, id: InstanceId) {
        self.sink(id).ready();
        self.pump();
    }

    fn notify(&mut self, id: InstanceId, state: EngineState) {
        self.sink(id).state_changed(state);
        self.pump();
    }

    fn advance(&mut self, by: Duration) {
        self.now += by;
        self.adapter.tick(self.now);
        self.pump();
    }

    fn session(&self) -> PlaybackSession {
        snapshot(&self.session)
    }

    fn live(&self) -> InstanceId {
        self.adapter.live_instance().unwrap()
    }

    fn calls(&self, id: InstanceId) -> Vec<String> {
        self.fake()
            .calls
            .iter()
            .filter(|(i, _)| *i == id)
            .map(|(_, c)| c.clone())
            .collect()
    }

    fn constructed_ids(&self) -> Vec<String> {
        self.fake()
            .constructed
            .iter()
            .map(|(_, v, _)| v.clone())
            .collect()
    }

    /// Bind `id` and bring its engine to ready.
    fn ready_track(&mut self, id: &str) -> InstanceId {
        self.bind(id);
        let instance = self.live();
        self.ready(instance);
        instance
    }
}

#[test]
fn binding_same_track_twice_constructs_once() {
    let mut h = Harness::new();
    h.bind("a");
    h.bind("a");

    assert_eq!(h.constructed_ids(), vec!["a"]);
    assert!(h.fake().destroyed.is_empty());
    assert_eq!(h.session().phase, EnginePhase::Constructing);
    assert!(h.session().is_loading());
}

#[test]
fn rebinding_while_constructing_leaves_only_the_new_instance() {
    let mut h = Harness::new();
    h.bind("a");
    let first = h.live();
    h.bind("b");
    let second = h.live();

    assert_ne!(first, second);
    assert_eq!(h.fake().destroyed, vec![first]);

    // The late ready from the first instance is dropped.
    h.ready(first);
    assert_eq!(h.session().phase, EnginePhase::Constructing);
    assert!(h.calls(first).is_empty());

    h.ready(second);
    assert_eq!(h.session().phase, EnginePhase::Ready);
    assert_eq!(h.session().current_track().map(|t| t.id.as_str()), Some("b"));
    assert_eq!(h.constructed_ids(), vec!["a", "b"]);
}

#[test]
fn binds_during_script_load_construct_only_the_last() {
    let mut h = Harness::with(Fake {
        script_mode: ScriptMode::Hold,
        ..Fake::default()
    });
    h.bind("a");
    h.bind("b");
    h.bind("c");

    assert_eq!(h.fake().script_loads, 1);
    assert!(h.constructed_ids().is_empty());
    assert_eq!(h.session().phase, EnginePhase::LoadingScript);

    let completion = h.fake().held.pop().unwrap();
    completion.finish(Ok(()));
    h.pump();

    assert_eq!(h.constructed_ids(), vec!["c"]);
    assert!(h.host.script.is_ready());
}

#[test]
fn abandoned_script_load_settles_as_failure() {
    let mut h = Harness::with(Fake {
        script_mode: ScriptMode::Hold,
        ..Fake::default()
    });
    h.bind("a");
    drop(h.fake().held.pop());
    h.pump();

    assert!(h.session().active_track.is_none());
    assert_eq!(h.notices.len(), 1);
    assert!(h.host.script.last_error().is_some());
}

#[test]
fn script_failure_clears_session_and_next_bind_retries() {
    let mut h = Harness::with(Fake {
        script_mode: ScriptMode::Fail,
        ..Fake::default()
    });
    h.bind("a");

    let s = h.session();
    assert!(s.active_track.is_none());
    assert_eq!(s.phase, EnginePhase::Destroyed);
    assert_eq!(h.notices.len(), 1);

    h.fake().script_mode = ScriptMode::Immediate;
    h.bind("b");
    assert_eq!(h.fake().script_loads, 2);
    assert_eq!(h.constructed_ids(), vec!["b"]);
}

#[test]
fn settings_chosen_before_ready_are_applied_on_ready() {
    let mut h = Harness::new();
    h.bind("a");
    let id = h.live();
    h.cmd(PlayerCmd::SetVolume(35));
    h.cmd(PlayerCmd::SetMuted(true));
    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    assert!(h.calls(id).is_empty());
    assert!(!h.adapter.poller_running());

    h.ready(id);
    assert_eq!(h.calls(id), vec!["volume 35", "mute", "play"]);
    assert!(h.adapter.poller_running());
    let s = h.session();
    assert_eq!(s.volume, 35);
    assert!(s.muted);
    assert!(s.is_playing());
}

#[test]
fn construction_uses_session_volume_and_never_autoplays() {
    let mut h = Harness::new();
    h.cmd(PlayerCmd::SetVolume(20));
    h.cmd(PlayerCmd::SetMuted(true));
    h.bind("a");

    let options = h.fake().constructed[0].2.clone();
    assert_eq!(
        options,
        EngineOptions {
            autoplay: false,
            volume: 20,
            muted: true,
        }
    );
}

#[test]
fn mute_round_trip_restores_volume() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.cmd(PlayerCmd::SetVolume(35));
    h.cmd(PlayerCmd::ToggleMute);
    assert_eq!(h.session().volume, 35);
    assert!(h.session().muted);
    h.cmd(PlayerCmd::ToggleMute);

    let s = h.session();
    assert_eq!(s.volume, 35);
    assert!(!s.muted);
    assert_eq!(h.calls(id), vec!["volume 70", "volume 35", "mute", "unmute"]);
}

#[test]
fn volume_is_clamped() {
    let mut h = Harness::new();
    h.cmd(PlayerCmd::SetVolume(150));
    assert_eq!(h.session().volume, 100);
    h.cmd(PlayerCmd::SetVolume(-5));
    assert_eq!(h.session().volume, 0);
    h.cmd(PlayerCmd::AdjustVolume(7));
    h.cmd(PlayerCmd::AdjustVolume(-3));
    assert_eq!(h.session().volume, 4);
}

#[test]
fn seek_clamps_into_duration() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    {
        let mut f = h.fake();
        f.current_time = 10.0;
        f.duration = 200.0;
    }
    h.advance(POLL);
    assert_eq!(h.session().duration, 200.0);

    h.cmd(PlayerCmd::Seek(500.0));
    assert_eq!(h.session().position, 200.0);
    h.cmd(PlayerCmd::Seek(-3.0));
    assert_eq!(h.session().position, 0.0);
    h.cmd(PlayerCmd::SeekBy(42.5));
    assert_eq!(h.session().position, 42.5);

    let calls = h.calls(id);
    assert_eq!(calls[calls.len() - 3..], ["seek 200", "seek 0", "seek 42.5"]);
}

#[test]
fn seek_is_ignored_until_duration_is_known() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.advance(POLL);
    h.cmd(PlayerCmd::Seek(30.0));
    h.cmd(PlayerCmd::Seek(f64::NAN));

    assert_eq!(h.session().position, 0.0);
    assert!(!h.calls(id).iter().any(|c| c.starts_with("seek")));
}

#[test]
fn stop_without_track_is_a_noop() {
    let mut h = Harness::new();
    let before = h.session();
    h.cmd(PlayerCmd::Stop);
    assert_eq!(h.session(), before);
    assert!(h.constructed_ids().is_empty());
}

#[test]
fn stop_tears_down_and_clears_track() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    h.cmd(PlayerCmd::Stop);

    let s = h.session();
    assert!(s.active_track.is_none());
    assert!(!s.is_playing());
    assert_eq!(s.phase, EnginePhase::Destroyed);
    assert!(!h.adapter.poller_running());
    assert_eq!(h.fake().destroyed, vec![id]);
    assert_eq!(h.notices.len(), 0);
}

#[test]
fn engine_error_while_playing_clears_session() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    h.notify(id, EngineState::Playing);

    h.sink(id).error(EngineErrorCode::Other("loading failed".into()));
    h.pump();

    let s = h.session();
    assert!(s.active_track.is_none());
    assert!(!s.is_playing());
    assert!(!h.adapter.poller_running());
    assert_eq!(h.fake().destroyed, vec![id]);
    let notice = h.notices.latest(Duration::from_secs(60)).unwrap();
    assert!(notice.message.contains("loading failed"));
}

#[test]
fn construct_failure_clears_session() {
    let mut h = Harness::with(Fake {
        fail_construct: true,
        ..Fake::default()
    });
    h.bind("a");

    let s = h.session();
    assert!(s.active_track.is_none());
    assert_eq!(s.phase, EnginePhase::Destroyed);
    assert!(h.adapter.live_instance().is_none());
    assert_eq!(h.notices.len(), 1);
}

#[test]
fn missing_ready_notification_times_out() {
    let mut h = Harness::new();
    h.bind("a");
    let id = h.live();
    assert_eq!(h.adapter.next_deadline(), Some(h.now + Duration::from_secs(2)));

    h.advance(Duration::from_millis(1_999));
    assert_eq!(h.adapter.live_instance(), Some(id));

    h.advance(Duration::from_millis(1));
    assert!(h.adapter.live_instance().is_none());
    assert!(h.session().active_track.is_none());
    assert_eq!(h.fake().destroyed, vec![id]);
    assert_eq!(h.notices.len(), 1);
}

#[test]
fn stale_notification_does_not_revert_local_intent() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.cmd(PlayerCmd::SetIntent(Intent::Playing));

    // Reflects the state before the play command.
    h.notify(id, EngineState::Paused);
    assert!(h.session().is_playing());

    h.notify(id, EngineState::Playing);
    assert!(h.session().is_playing());

    // Nothing is awaited now, so this is an engine-side pause.
    h.notify(id, EngineState::Paused);
    assert!(!h.session().is_playing());
    assert_eq!(h.calls(id), vec!["volume 70", "play"]);
}

#[test]
fn repeated_play_does_not_hide_a_later_engine_pause() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    h.notify(id, EngineState::Playing);

    // Already playing: the engine would stay silent, so nothing is sent.
    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    assert_eq!(h.calls(id), vec!["volume 70", "play"]);

    h.notify(id, EngineState::Paused);
    assert!(!h.session().is_playing());
}

#[test]
fn pausing_a_paused_engine_sends_nothing() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.cmd(PlayerCmd::SetIntent(Intent::Paused));
    h.cmd(PlayerCmd::SetIntent(Intent::Paused));
    assert_eq!(h.calls(id), vec!["volume 70"]);

    // Engine-side resume is still picked up.
    h.notify(id, EngineState::Playing);
    assert!(h.session().is_playing());
    h.cmd(PlayerCmd::SetIntent(Intent::Paused));
    assert_eq!(h.calls(id), vec!["volume 70", "pause"]);
}

fn assert_failed_and_cleared(h: &Harness, id: InstanceId) {
    let s = h.session();
    assert!(s.active_track.is_none());
    assert!(!s.is_playing());
    assert_eq!(s.phase, EnginePhase::Destroyed);
    assert!(h.adapter.live_instance().is_none());
    assert!(!h.adapter.poller_running());
    assert_eq!(h.fake().destroyed, vec![id]);
    let notice = h.notices.latest(Duration::from_secs(60)).unwrap();
    assert!(notice.message.starts_with("Playback stopped"));
    assert!(notice.message.contains("engine gone"));
}

#[test]
fn failing_play_command_clears_session() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.fake().fail_commands = true;

    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    assert_failed_and_cleared(&h, id);
}

#[test]
fn failing_seek_clears_session() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.fake().duration = 180.0;
    h.advance(POLL);
    assert_eq!(h.session().duration, 180.0);

    h.fake().fail_commands = true;
    h.cmd(PlayerCmd::Seek(30.0));
    assert_failed_and_cleared(&h, id);
}

#[test]
fn failing_volume_and_mute_clear_session() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.fake().fail_commands = true;
    h.cmd(PlayerCmd::SetVolume(20));
    assert_failed_and_cleared(&h, id);

    let mut h = Harness::new();
    let id = h.ready_track("b");
    h.fake().fail_commands = true;
    h.cmd(PlayerCmd::SetMuted(true));
    assert_failed_and_cleared(&h, id);
}

#[test]
fn failing_pending_settings_on_ready_clear_session() {
    let mut h = Harness::new();
    h.bind("a");
    let id = h.live();
    h.fake().fail_commands = true;

    h.ready(id);
    assert_failed_and_cleared(&h, id);
}

#[test]
fn failing_poll_sample_clears_session() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    assert!(h.adapter.poller_running());
    h.fake().fail_commands = true;

    h.advance(POLL);
    assert_failed_and_cleared(&h, id);
}

#[test]
fn autonomous_state_changes_update_intent_without_commands() {
    let mut h = Harness::new();
    let id = h.ready_track("a");

    h.notify(id, EngineState::Playing);
    assert!(h.session().is_playing());
    h.notify(id, EngineState::Buffering);
    assert!(h.session().is_playing());
    h.notify(id, EngineState::Unstarted);
    assert!(h.session().is_playing());

    assert_eq!(h.calls(id), vec!["volume 70"]);
}

#[test]
fn poller_samples_while_paused_and_follows_the_live_instance() {
    let mut h = Harness::new();
    let first = h.ready_track("a");
    {
        let mut f = h.fake();
        f.current_time = 12.0;
        f.duration = 180.0;
    }
    h.advance(POLL);
    let s = h.session();
    assert!(!s.is_playing());
    assert_eq!(s.position, 12.0);
    assert_eq!(s.duration, 180.0);

    h.bind("b");
    assert!(!h.adapter.poller_running());
    assert_eq!(h.session().position, 0.0);
    assert_eq!(h.session().duration, 0.0);

    let second = h.live();
    h.ready(second);
    assert!(h.adapter.poller_running());

    // The torn-down instance cannot end the new track.
    h.notify(first, EngineState::Ended);
    assert_eq!(h.session().current_track().map(|t| t.id.as_str()), Some("b"));
    assert_eq!(h.adapter.live_instance(), Some(second));
}

#[test]
fn position_past_duration_ends_the_track() {
    let mut h = Harness::new();
    let id = h.ready_track("a");
    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    {
        let mut f = h.fake();
        f.current_time = 50.0;
        f.duration = 100.0;
    }
    h.advance(POLL);
    h.fake().current_time = 101.0;
    h.advance(POLL);

    let s = h.session();
    assert_eq!(s.phase, EnginePhase::Destroyed);
    assert_eq!(s.current_track().map(|t| t.id.as_str()), Some("a"));
    assert!(!s.is_playing());
    assert_eq!(s.position, 0.0);
    assert_eq!(s.duration, 100.0);
    assert_eq!(h.fake().destroyed, vec![id]);
    assert_eq!(h.notices.len(), 0);
}

#[test]
fn ended_track_restarts_on_play() {
    let mut h = Harness::new();
    let first = h.ready_track("a");
    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    h.notify(first, EngineState::Playing);
    h.notify(first, EngineState::Ended);

    assert!(!h.session().is_playing());
    assert!(h.adapter.live_instance().is_none());

    h.bind("a");
    assert_eq!(h.constructed_ids(), vec!["a"]);

    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    assert_eq!(h.constructed_ids(), vec!["a", "a"]);
    let second = h.live();
    h.ready(second);
    assert_eq!(h.calls(second), vec!["volume 70", "play"]);
}

#[test]
fn failing_destroy_is_tolerated() {
    let mut h = Harness::with(Fake {
        fail_destroy: true,
        ..Fake::default()
    });
    h.bind("a");
    let first = h.live();
    h.bind("b");

    assert_eq!(h.fake().destroyed, vec![first]);
    assert_eq!(h.constructed_ids(), vec!["a", "b"]);
    assert_eq!(h.notices.len(), 0);
}

#[test]
fn shutdown_releases_the_host_container() {
    let mut h = Harness::new();
    h.ready_track("a");
    assert!(h.host.container.is_live());

    h.adapter.shutdown();
    assert!(!h.host.container.is_live());
    assert!(h.session().active_track.is_none());
}

#[test]
fn adapters_share_one_container_and_one_script_load() {
    let host = PlayerHost::default();
    let fake = Arc::new(Mutex::new(Fake {
        script_mode: ScriptMode::Hold,
        ..Fake::default()
    }));

    let mut adapters: Vec<(Adapter, Receiver<PlayerMsg>)> = (0..2)
        .map(|_| {
            let (tx, rx) = mpsc::channel();
            let adapter = Adapter::new(
                Box::new(FakeFactory(fake.clone())),
                host.clone(),
                &player_settings(),
                new_session_handle(PlaybackSession::default()),
                Notices::new(),
                tx,
            );
            (adapter, rx)
        })
        .collect();

    let now = Instant::now();
    for (adapter, _) in adapters.iter_mut() {
        adapter.handle(PlayerMsg::Command(PlayerCmd::Bind(track("a"))), now);
    }
    assert_eq!(fake.lock().unwrap().script_loads, 1);

    let completion = fake.lock().unwrap().held.pop().unwrap();
    completion.finish(Ok(()));
    for (adapter, rx) in adapters.iter_mut() {
        while let Ok(msg) = rx.try_recv() {
            adapter.handle(msg, now);
        }
        assert_eq!(adapter.phase(), EnginePhase::Constructing);
    }
    assert_eq!(fake.lock().unwrap().constructed.len(), 2);

    let (first, _) = adapters.remove(0);
    drop(first);
    assert!(host.container.is_live());
    drop(adapters);
    assert!(!host.container.is_live());
}

struct MoodBackend;

impl SearchBackend for MoodBackend {
    fn search(&self, query: &str, max_results: u32) -> Result<Vec<Track>, SearchError> {
        assert_eq!(query, "happy upbeat music");
        Ok((0..max_results).map(|i| track(&format!("happy-{i}"))).collect())
    }

    fn lookup(&self, _video_id: &str) -> Result<Option<Track>, SearchError> {
        Ok(None)
    }
}

#[test]
fn mood_to_playback_to_end() {
    let notices = Notices::new();
    let search = TrackSearch::new(Box::new(MoodBackend), &SearchSettings::default(), notices);
    let tracks = search.search_by_mood("Happy");
    assert_eq!(tracks.len(), 10);

    let mut h = Harness::new();
    assert_eq!(h.session().phase, EnginePhase::Uninitialized);
    h.fake().duration = 3.0;

    h.cmd(PlayerCmd::Bind(tracks[3].clone()));
    h.cmd(PlayerCmd::SetIntent(Intent::Playing));
    assert_eq!(h.session().phase, EnginePhase::Constructing);

    let id = h.live();
    h.ready(id);
    assert_eq!(h.session().phase, EnginePhase::Ready);
    h.notify(id, EngineState::Playing);
    assert!(h.session().is_playing());

    let mut last = 0.0;
    for step in 1..=6 {
        h.fake().current_time = step as f64 * 0.5;
        h.advance(POLL);
        let s = h.session();
        assert!(s.position >= last);
        last = s.position;
    }
    assert!((last - 3.0).abs() < 1e-9);

    h.notify(id, EngineState::Ended);
    let s = h.session();
    assert!(!s.is_playing());
    assert_eq!(s.position, 0.0);
}

#[test]
fn player_handle_drives_the_thread() {
    let fake = Arc::new(Mutex::new(Fake {
        auto_ready: true,
        ..Fake::default()
    }));
    let player = PlayerHandle::spawn(
        Box::new(FakeFactory(fake.clone())),
        PlayerHost::default(),
        &player_settings(),
        Notices::new(),
    )
    .unwrap();

    player.play_track(track("a"));
    assert!(player.snapshot().is_playing());

    let deadline = Instant::now() + Duration::from_secs(5);
    while player.snapshot().phase != EnginePhase::Ready {
        assert!(Instant::now() < deadline, "engine never became ready");
        std::thread::sleep(Duration::from_millis(5));
    }

    player.toggle_playback();
    assert!(!player.snapshot().is_playing());

    player.quit();
    assert!(player.snapshot().active_track.is_none());
    let f = fake.lock().unwrap();
    assert_eq!(f.destroyed.len(), 1);
    assert!(f.calls.iter().any(|(_, c)| c == "play"));
}

#[test]
fn script_dependency_loads_once_until_it_fails() {
    let script = ScriptDependency::default();
    let (tx, rx) = mpsc::channel();
    let mut held = Vec::new();

    assert_eq!(
        script.ensure_loaded(tx.clone(), |c| held.push(c)),
        ScriptStatus::Pending
    );
    assert_eq!(
        script.ensure_loaded(tx.clone(), |_| panic!("second load")),
        ScriptStatus::Pending
    );
    held.pop().unwrap().finish(Err("offline".into()));

    assert_eq!(rx.try_iter().count(), 2);
    assert_eq!(script.last_error().as_deref(), Some("offline"));

    let status = script.ensure_loaded(tx.clone(), |c| c.finish(Ok(())));
    assert_eq!(status, ScriptStatus::Pending);
    assert!(script.is_ready());
    assert_eq!(
        script.ensure_loaded(tx, |_| panic!("already loaded")),
        ScriptStatus::Ready
    );
}

#[test]
fn container_lives_while_any_holder_does() {
    let slot = ContainerSlot::default();
    assert!(!slot.is_live());

    let a = slot.acquire().unwrap();
    let b = slot.acquire().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    let path = a.path().to_path_buf();
    assert!(path.is_dir());
    assert_eq!(
        a.socket_path(InstanceId(3)).file_name().unwrap(),
        "engine-3.sock"
    );

    drop(a);
    assert!(path.is_dir());
    drop(b);
    assert!(!slot.is_live());
    assert!(!path.exists());

    let c = slot.acquire().unwrap();
    assert_ne!(c.path(), path.as_path());
}

#[test]
fn poller_is_armed_for_one_instance() {
    let now = Instant::now();
    let mut poller = ProgressPoller::new(POLL);
    assert!(poller.due(now + POLL).is_none());

    poller.start(InstanceId(1), now);
    poller.start(InstanceId(2), now);
    assert_eq!(poller.instance(), Some(InstanceId(2)));
    assert!(poller.due(now).is_none());
    assert_eq!(poller.due(now + POLL), Some(InstanceId(2)));
    assert_eq!(poller.next_deadline(), Some(now + POLL + POLL));

    // Missed ticks collapse into one.
    assert_eq!(poller.due(now + POLL * 5), Some(InstanceId(2)));
    assert!(poller.due(now + POLL * 5).is_none());

    poller.stop();
    assert!(!poller.is_running());
    assert!(ProgressPoller::new(Duration::ZERO).interval() > Duration::ZERO);
}

#[test]
fn session_revision_bumps_only_on_change() {
    let handle = new_session_handle(PlaybackSession::default());
    update(&handle, |s| s.volume = 70);
    assert_eq!(snapshot(&handle).revision, 0);
    update(&handle, |s| s.volume = 40);
    assert_eq!(snapshot(&handle).revision, 1);

    let mut s = snapshot(&handle);
    s.duration = 200.0;
    s.position = 50.0;
    assert_eq!(s.progress(), 0.25);
}
