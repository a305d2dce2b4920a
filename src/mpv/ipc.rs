//! mpv's JSON IPC protocol: one JSON object per line in each direction.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::player::{EngineErrorCode, EngineNotification, EngineState};

/// Properties observed on every instance, with their observer ids.
pub(super) const OBSERVED: &[(u64, &str)] = &[
    (1, "pause"),
    (2, "time-pos"),
    (3, "duration"),
    (4, "paused-for-cache"),
];

/// Encode one command as a request line.
pub(super) fn command_line(args: &[Value]) -> String {
    let mut line = json!({ "command": args }).to_string();
    line.push('\n');
    line
}

pub(super) fn observe_lines() -> Vec<String> {
    OBSERVED
        .iter()
        .map(|(id, name)| command_line(&[json!("observe_property"), json!(id), json!(name)]))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum MpvEvent {
    FileLoaded,
    PropertyChange { name: String, data: Value },
    EndFile { reason: String, error: Option<String> },
    Shutdown,
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum IpcMessage {
    Event(MpvEvent),
    /// Answer to a command; `error` is `None` on success.
    Reply { error: Option<String> },
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    event: Option<String>,
    name: Option<String>,
    #[serde(default)]
    data: Value,
    reason: Option<String>,
    file_error: Option<String>,
    error: Option<String>,
}

pub(super) fn decode_line(line: &str) -> Result<IpcMessage, serde_json::Error> {
    let raw: RawMessage = serde_json::from_str(line)?;

    let Some(event) = raw.event else {
        return Ok(IpcMessage::Reply {
            error: raw.error.filter(|e| e != "success"),
        });
    };

    let event = match event.as_str() {
        "file-loaded" => MpvEvent::FileLoaded,
        "property-change" => MpvEvent::PropertyChange {
            name: raw.name.unwrap_or_default(),
            data: raw.data,
        },
        "end-file" => MpvEvent::EndFile {
            reason: raw.reason.unwrap_or_default(),
            error: raw.file_error,
        },
        "shutdown" => MpvEvent::Shutdown,
        _ => MpvEvent::Other(event),
    };
    Ok(IpcMessage::Event(event))
}

/// Last observed values of one instance.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Props {
    pub loaded: bool,
    pub paused: bool,
    pub buffering: bool,
    pub time_pos: f64,
    pub duration: f64,
}

impl Props {
    pub fn new(paused: bool) -> Self {
        Self {
            loaded: false,
            paused,
            buffering: false,
            time_pos: 0.0,
            duration: 0.0,
        }
    }

    pub fn state(&self) -> EngineState {
        if !self.loaded {
            EngineState::Unstarted
        } else if self.buffering {
            EngineState::Buffering
        } else if self.paused {
            EngineState::Paused
        } else {
            EngineState::Playing
        }
    }
}

/// Fold `event` into `props` and return the notification it amounts to.
pub(super) fn translate(event: &MpvEvent, props: &mut Props) -> Option<EngineNotification> {
    match event {
        MpvEvent::FileLoaded => {
            props.loaded = true;
            Some(EngineNotification::Ready)
        }
        MpvEvent::PropertyChange { name, data } => match name.as_str() {
            "pause" => {
                props.paused = data.as_bool()?;
                props.loaded.then(|| {
                    EngineNotification::StateChange(if props.paused {
                        EngineState::Paused
                    } else {
                        EngineState::Playing
                    })
                })
            }
            "time-pos" => {
                props.time_pos = data.as_f64().unwrap_or(0.0);
                None
            }
            "duration" => {
                props.duration = data.as_f64().unwrap_or(0.0);
                None
            }
            "paused-for-cache" => {
                props.buffering = data.as_bool().unwrap_or(false);
                (props.loaded && props.buffering)
                    .then_some(EngineNotification::StateChange(EngineState::Buffering))
            }
            _ => None,
        },
        MpvEvent::EndFile { reason, error } => match reason.as_str() {
            "eof" => Some(EngineNotification::StateChange(EngineState::Ended)),
            "error" => Some(EngineNotification::Error(match error {
                Some(e) => EngineErrorCode::Other(e.clone()),
                None => EngineErrorCode::Playback,
            })),
            _ => None,
        },
        MpvEvent::Shutdown | MpvEvent::Other(_) => None,
    }
}
