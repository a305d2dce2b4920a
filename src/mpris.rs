//! MPRIS service (`org.mpris.MediaPlayer2.moodtune`) on the session bus.
//!
//! Incoming calls are forwarded to the runtime as `ControlCmd`s; the runtime
//! pushes the playback state back through `MprisHandle`.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_io::{Timer, block_on};
use tracing::{debug, warn};
use zbus::{Connection, ObjectServer, interface};
use zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use crate::app::PlaybackState;

const PATH: &str = "/org/mpris/MediaPlayer2";
const BUS_NAME: &str = "org.mpris.MediaPlayer2.moodtune";
const TRACK_PATH_PREFIX: &str = "/org/mpris/MediaPlayer2/track/";
const NOTIFY_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone, Debug, PartialEq)]
pub enum ControlCmd {
    Quit,
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Prev,
    /// Relative seek in microseconds.
    Seek(i64),
    /// Absolute seek, honoured only if `track_id` is the current track.
    SetPosition { track_id: String, position_us: i64 },
    /// 0.0-1.0.
    SetVolume(f64),
}

#[derive(Debug, Default)]
struct SharedState {
    playback: PlaybackState,
    track_id: Option<OwnedObjectPath>,
    title: Option<String>,
    artist: Vec<String>,
    art_url: Option<String>,
    url: Option<String>,
    length_micros: Option<i64>,
    volume: f64,
    position_micros: i64,
}

/// MPRIS track ids must be object paths; anything outside `[A-Za-z0-9]` is
/// hex-escaped behind an underscore.
pub fn track_object_path(id: &str) -> Option<OwnedObjectPath> {
    let mut element = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() {
            element.push(b as char);
        } else {
            element.push_str(&format!("_{:02x}", b));
        }
    }
    if element.is_empty() {
        element.push('_');
    }
    OwnedObjectPath::try_from(format!("{TRACK_PATH_PREFIX}{element}")).ok()
}

/// What the MPRIS metadata needs to know about the playing track.
pub struct TrackMeta<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub artist: &'a str,
    pub art_url: &'a str,
    pub url: String,
    pub length_micros: Option<i64>,
}

pub struct MprisHandle {
    state: Arc<Mutex<SharedState>>,
    notify: Sender<()>,
}

impl MprisHandle {
    fn update(&self, f: impl FnOnce(&mut SharedState) -> bool) {
        let changed = match self.state.lock() {
            Ok(mut s) => f(&mut s),
            Err(_) => false,
        };
        if changed {
            let _ = self.notify.send(());
        }
    }

    pub fn set_playback(&self, playback: PlaybackState) {
        self.update(|s| std::mem::replace(&mut s.playback, playback) != playback);
    }

    pub fn set_track_metadata(&self, meta: Option<TrackMeta<'_>>) {
        self.update(|s| {
            let before = (s.track_id.clone(), s.length_micros);
            match meta {
                Some(m) => {
                    s.track_id = track_object_path(m.id);
                    s.title = Some(m.title.to_string());
                    s.artist = if m.artist.trim().is_empty() {
                        Vec::new()
                    } else {
                        vec![m.artist.to_string()]
                    };
                    s.art_url = (!m.art_url.is_empty()).then(|| m.art_url.to_string());
                    s.url = Some(m.url);
                    s.length_micros = m.length_micros;
                }
                None => {
                    s.track_id = None;
                    s.title = None;
                    s.artist.clear();
                    s.art_url = None;
                    s.url = None;
                    s.length_micros = None;
                }
            }
            before != (s.track_id.clone(), s.length_micros)
        });
    }

    pub fn set_volume(&self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        self.update(|s| std::mem::replace(&mut s.volume, volume) != volume);
    }

    /// Position is polled by clients, so this never signals.
    pub fn set_position(&self, position_micros: i64) {
        if let Ok(mut s) = self.state.lock() {
            s.position_micros = position_micros;
        }
    }
}

struct RootIface {
    tx: Sender<ControlCmd>,
}

#[interface(name = "org.mpris.MediaPlayer2")]
impl RootIface {
    fn raise(&self) {
        // No-op for TUI.
    }

    fn quit(&self) {
        let _ = self.tx.send(ControlCmd::Quit);
    }

    #[zbus(property)]
    fn can_quit(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_raise(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn has_track_list(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn identity(&self) -> &str {
        "moodtune"
    }

    #[zbus(property)]
    fn supported_uri_schemes(&self) -> Vec<String> {
        vec![]
    }

    #[zbus(property)]
    fn supported_mime_types(&self) -> Vec<String> {
        vec![]
    }
}

struct PlayerIface {
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
}

fn put(map: &mut HashMap<String, OwnedValue>, key: &str, value: Option<Value<'_>>) {
    if let Some(v) = value.and_then(|v| OwnedValue::try_from(v).ok()) {
        map.insert(key.to_string(), v);
    }
}

#[interface(name = "org.mpris.MediaPlayer2.Player")]
impl PlayerIface {
    fn next(&self) {
        let _ = self.tx.send(ControlCmd::Next);
    }

    fn previous(&self) {
        let _ = self.tx.send(ControlCmd::Prev);
    }

    fn play(&self) {
        let _ = self.tx.send(ControlCmd::Play);
    }

    fn pause(&self) {
        let _ = self.tx.send(ControlCmd::Pause);
    }

    fn play_pause(&self) {
        let _ = self.tx.send(ControlCmd::PlayPause);
    }

    fn stop(&self) {
        let _ = self.tx.send(ControlCmd::Stop);
    }

    fn seek(&self, offset: i64) {
        let _ = self.tx.send(ControlCmd::Seek(offset));
    }

    fn set_position(&self, track_id: OwnedObjectPath, position: i64) {
        let _ = self.tx.send(ControlCmd::SetPosition {
            track_id: track_id.as_str().to_string(),
            position_us: position,
        });
    }

    #[zbus(property)]
    fn playback_status(&self) -> &str {
        let Ok(s) = self.state.lock() else {
            return "Stopped";
        };
        match s.playback {
            PlaybackState::Stopped => "Stopped",
            PlaybackState::Playing => "Playing",
            PlaybackState::Loading | PlaybackState::Paused => "Paused",
        }
    }

    #[zbus(property)]
    fn volume(&self) -> f64 {
        self.state.lock().map(|s| s.volume).unwrap_or(0.0)
    }

    #[zbus(property)]
    fn set_volume(&mut self, volume: f64) {
        let _ = self.tx.send(ControlCmd::SetVolume(volume));
    }

    #[zbus(property)]
    fn position(&self) -> i64 {
        self.state.lock().map(|s| s.position_micros).unwrap_or(0)
    }

    #[zbus(property)]
    fn can_control(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_play(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_pause(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_seek(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.length_micros.is_some())
            .unwrap_or(false)
    }

    #[zbus(property)]
    fn can_go_next(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn can_go_previous(&self) -> bool {
        true
    }

    #[zbus(property)]
    fn metadata(&self) -> HashMap<String, OwnedValue> {
        let mut map = HashMap::new();
        let Ok(s) = self.state.lock() else {
            return map;
        };

        let no_track = ObjectPath::from_static_str_unchecked("/org/mpris/MediaPlayer2/TrackList/NoTrack");
        let track_id = s
            .track_id
            .clone()
            .map(OwnedObjectPath::into_inner)
            .unwrap_or(no_track);
        put(&mut map, "mpris:trackid", Some(Value::from(track_id)));
        put(&mut map, "xesam:title", s.title.clone().map(Value::from));
        if !s.artist.is_empty() {
            put(&mut map, "xesam:artist", Some(Value::from(s.artist.clone())));
        }
        put(&mut map, "mpris:artUrl", s.art_url.clone().map(Value::from));
        put(&mut map, "xesam:url", s.url.clone().map(Value::from));
        put(&mut map, "mpris:length", s.length_micros.map(Value::from));
        map
    }
}

async fn emit_changes(object_server: &ObjectServer) -> zbus::Result<()> {
    let iface_ref = object_server.interface::<_, PlayerIface>(PATH).await?;
    let iface = iface_ref.get().await;
    let emitter = iface_ref.signal_emitter();
    iface.playback_status_changed(emitter).await?;
    iface.metadata_changed(emitter).await?;
    iface.volume_changed(emitter).await?;
    iface.can_seek_changed(emitter).await?;
    Ok(())
}

async fn serve(
    tx: Sender<ControlCmd>,
    state: Arc<Mutex<SharedState>>,
    notify_rx: Receiver<()>,
) -> zbus::Result<()> {
    let connection = Connection::session().await?;
    connection.request_name(BUS_NAME).await?;

    let object_server = connection.object_server();
    object_server.at(PATH, RootIface { tx: tx.clone() }).await?;
    object_server.at(PATH, PlayerIface { tx, state }).await?;
    debug!(bus = BUS_NAME, "MPRIS service registered");

    loop {
        Timer::after(NOTIFY_INTERVAL).await;
        let mut pending = false;
        loop {
            match notify_rx.try_recv() {
                Ok(()) => pending = true,
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => return Ok(()),
            }
        }
        if pending {
            if let Err(e) = emit_changes(&object_server).await {
                debug!(error = %e, "MPRIS: failed to emit property changes");
            }
        }
    }
}

/// Start the MPRIS service on its own thread. Failure to reach the session
/// bus is logged and leaves the returned handle inert.
pub fn spawn_mpris(tx: Sender<ControlCmd>) -> MprisHandle {
    let state = Arc::new(Mutex::new(SharedState {
        volume: 1.0,
        ..SharedState::default()
    }));
    let (notify_tx, notify_rx) = mpsc::channel();

    let state_for_thread = state.clone();
    let spawned = std::thread::Builder::new()
        .name("mpris".to_string())
        .spawn(move || {
            if let Err(e) = block_on(serve(tx, state_for_thread, notify_rx)) {
                warn!(error = %e, "MPRIS: service unavailable");
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "MPRIS: failed to start service thread");
    }

    MprisHandle {
        state,
        notify: notify_tx,
    }
}
