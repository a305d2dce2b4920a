use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/moodtune/config.toml` or `~/.config/moodtune/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `MOODTUNE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub player: PlayerSettings,
    pub engine: EngineSettings,
    pub search: SearchSettings,
    pub ui: UiSettings,
    pub controls: ControlsSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// How often the progress poller samples the engine (milliseconds).
    pub poll_interval_ms: u64,
    /// How long a freshly constructed engine may take to report ready
    /// before it is treated as a construction failure (milliseconds).
    pub ready_timeout_ms: u64,
    /// Initial volume, 0-100.
    pub default_volume: u8,
    pub start_muted: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            ready_timeout_ms: 15_000,
            default_volume: 70,
            start_muted: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// mpv executable, looked up on `PATH` when not absolute.
    pub mpv_path: String,
    /// Extra arguments appended to every mpv invocation.
    pub extra_args: Vec<String>,
    /// URL handed to mpv; `{id}` is replaced by the track id.
    pub url_template: String,
    /// How long to wait for the IPC socket of a new instance (milliseconds).
    pub connect_timeout_ms: u64,
    /// Pass `--no-video` to mpv.
    pub audio_only: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mpv_path: "mpv".to_string(),
            extra_args: Vec::new(),
            url_template: "https://www.youtube.com/watch?v={id}".to_string(),
            connect_timeout_ms: 10_000,
            audio_only: true,
        }
    }
}

impl EngineSettings {
    /// The URL mpv is pointed at for `video_id`.
    pub fn media_url(&self, video_id: &str) -> String {
        self.url_template.replace("{id}", video_id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchSettings {
    /// YouTube Data API key. Searches fail (softly) while this is empty.
    pub api_key: String,
    pub base_url: String,
    /// Number of results requested for a mood.
    pub mood_results: u32,
    /// Number of results requested for a free-text query.
    pub query_results: u32,
    /// Request timeout (milliseconds).
    pub timeout_ms: u64,
    /// `videoCategoryId` filter; "10" is Music.
    pub category_id: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            mood_results: 10,
            query_results: 20,
            timeout_ms: 10_000,
            category_id: "10".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UiSettings {
    /// The text rendered inside the top header box.
    pub header_text: String,

    /// Which track fields to show in the status "Song:" line, and in what order.
    ///
    /// Example: ["artist", "title"]
    pub now_playing_track_fields: Vec<TrackDisplayField>,

    /// Separator used to join `now_playing_track_fields`.
    pub now_playing_track_separator: String,

    /// Which time fields to show for the status line, and in what order.
    ///
    /// Example: ["elapsed", "total", "remaining"]
    pub now_playing_time_fields: Vec<TimeField>,

    /// Separator used to join `now_playing_time_fields`.
    pub now_playing_time_separator: String,

    /// How long a notice stays on screen (seconds).
    pub notice_seconds: u64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            header_text: " ~ Music for every mood ~ ".to_string(),
            now_playing_track_fields: vec![TrackDisplayField::Display],
            now_playing_track_separator: " - ".to_string(),
            now_playing_time_fields: vec![TimeField::Elapsed, TimeField::Total, TimeField::Remaining],
            now_playing_time_separator: " / ".to_string(),
            notice_seconds: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlsSettings {
    /// Number of seconds to seek when pressing `H` / `L`.
    pub seek_seconds: u64,
    /// Volume change per `+` / `-` press.
    pub volume_step: u8,
}

impl Default for ControlsSettings {
    fn default() -> Self {
        Self {
            seek_seconds: 5,
            volume_step: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// Log file; defaults to `$XDG_STATE_HOME/moodtune/moodtune.log`.
    pub path: Option<PathBuf>,
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            path: None,
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeField {
    Elapsed,
    Total,
    Remaining,
}

#[derive(Debug, Copy, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackDisplayField {
    /// `Artist - Title`.
    Display,
    Title,
    #[serde(alias = "channel")]
    Artist,
    Id,
}
