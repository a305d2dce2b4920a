use crate::app::PlaybackState;
use crate::config::EngineSettings;
use crate::mpris::{MprisHandle, TrackMeta};
use crate::player::PlaybackSession;

fn micros(seconds: f64) -> i64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1_000_000.0) as i64
    } else {
        0
    }
}

pub fn update_mpris(mpris: &MprisHandle, session: &PlaybackSession, engine: &EngineSettings) {
    let meta = session.current_track().map(|t| TrackMeta {
        id: &t.id,
        title: &t.title,
        artist: &t.artist,
        art_url: &t.thumbnail_url,
        url: engine.media_url(&t.id),
        length_micros: (session.duration > 0.0).then(|| micros(session.duration)),
    });
    mpris.set_track_metadata(meta);
    mpris.set_playback(PlaybackState::from_session(session));
    mpris.set_volume(if session.muted {
        0.0
    } else {
        f64::from(session.volume) / 100.0
    });
    mpris.set_position(micros(session.position));
}
