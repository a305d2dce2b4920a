use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use serde_json::json;

use super::engine::probe;
use super::ipc::{IpcMessage, MpvEvent, Props, command_line, decode_line, observe_lines, translate};
use super::*;
use crate::config::EngineSettings;
use crate::player::{
    ContainerSlot, EngineError, EngineErrorCode, EngineEventSink, EngineFactory,
    EngineNotification, EngineOptions, EngineState, InstanceId, PlayerMsg, ScriptDependency,
};

fn options(autoplay: bool, muted: bool) -> EngineOptions {
    EngineOptions {
        autoplay,
        volume: 40,
        muted,
    }
}

fn event(line: &str) -> MpvEvent {
    match decode_line(line).unwrap() {
        IpcMessage::Event(e) => e,
        other => panic!("expected an event, got {other:?}"),
    }
}

#[test]
fn command_lines_are_newline_terminated_json() {
    let line = command_line(&[json!("set_property"), json!("pause"), json!(false)]);
    assert_eq!(line, "{\"command\":[\"set_property\",\"pause\",false]}\n");

    let observe = observe_lines();
    assert_eq!(observe.len(), 4);
    assert_eq!(observe[0], "{\"command\":[\"observe_property\",1,\"pause\"]}\n");
}

#[test]
fn decode_distinguishes_events_and_replies() {
    assert_eq!(event(r#"{"event":"file-loaded"}"#), MpvEvent::FileLoaded);
    assert_eq!(
        event(r#"{"event":"property-change","id":2,"name":"time-pos","data":12.5}"#),
        MpvEvent::PropertyChange {
            name: "time-pos".into(),
            data: json!(12.5),
        }
    );
    assert_eq!(
        event(r#"{"event":"end-file","reason":"error","file_error":"loading failed"}"#),
        MpvEvent::EndFile {
            reason: "error".into(),
            error: Some("loading failed".into()),
        }
    );
    assert_eq!(event(r#"{"event":"idle"}"#), MpvEvent::Other("idle".into()));

    assert_eq!(
        decode_line(r#"{"request_id":0,"error":"success"}"#).unwrap(),
        IpcMessage::Reply { error: None }
    );
    assert_eq!(
        decode_line(r#"{"error":"property unavailable"}"#).unwrap(),
        IpcMessage::Reply {
            error: Some("property unavailable".into()),
        }
    );
    assert!(decode_line("garbage").is_err());
}

#[test]
fn pause_changes_are_silent_until_loaded() {
    let mut props = Props::new(true);
    let pause = event(r#"{"event":"property-change","name":"pause","data":true}"#);
    assert_eq!(translate(&pause, &mut props), None);
    assert_eq!(props.state(), EngineState::Unstarted);

    assert_eq!(
        translate(&MpvEvent::FileLoaded, &mut props),
        Some(EngineNotification::Ready)
    );
    assert_eq!(props.state(), EngineState::Paused);

    let resume = event(r#"{"event":"property-change","name":"pause","data":false}"#);
    assert_eq!(
        translate(&resume, &mut props),
        Some(EngineNotification::StateChange(EngineState::Playing))
    );
}

#[test]
fn time_and_duration_update_props_only() {
    let mut props = Props::new(false);
    translate(&MpvEvent::FileLoaded, &mut props);

    let time = event(r#"{"event":"property-change","name":"time-pos","data":33.0}"#);
    let duration = event(r#"{"event":"property-change","name":"duration","data":240.5}"#);
    assert_eq!(translate(&time, &mut props), None);
    assert_eq!(translate(&duration, &mut props), None);
    assert_eq!(props.time_pos, 33.0);
    assert_eq!(props.duration, 240.5);

    // Unavailable values arrive without data.
    let gone = event(r#"{"event":"property-change","name":"time-pos"}"#);
    translate(&gone, &mut props);
    assert_eq!(props.time_pos, 0.0);
}

#[test]
fn cache_stalls_report_buffering() {
    let mut props = Props::new(false);
    translate(&MpvEvent::FileLoaded, &mut props);

    let stall = event(r#"{"event":"property-change","name":"paused-for-cache","data":true}"#);
    assert_eq!(
        translate(&stall, &mut props),
        Some(EngineNotification::StateChange(EngineState::Buffering))
    );
    assert_eq!(props.state(), EngineState::Buffering);

    let resume = event(r#"{"event":"property-change","name":"paused-for-cache","data":false}"#);
    assert_eq!(translate(&resume, &mut props), None);
    assert_eq!(props.state(), EngineState::Playing);
}

#[test]
fn end_file_maps_by_reason() {
    let mut props = Props::new(false);
    assert_eq!(
        translate(&event(r#"{"event":"end-file","reason":"eof"}"#), &mut props),
        Some(EngineNotification::StateChange(EngineState::Ended))
    );
    assert_eq!(
        translate(&event(r#"{"event":"end-file","reason":"error"}"#), &mut props),
        Some(EngineNotification::Error(EngineErrorCode::Playback))
    );
    assert_eq!(
        translate(&event(r#"{"event":"end-file","reason":"quit"}"#), &mut props),
        None
    );
    assert_eq!(translate(&MpvEvent::Shutdown, &mut props), None);
}

#[test]
fn launch_args_follow_settings() {
    let factory = MpvFactory::new(EngineSettings {
        extra_args: vec!["--ytdl-format=bestaudio".into()],
        ..EngineSettings::default()
    });
    let args = factory.launch_args(Path::new("/run/x/engine-1.sock"), "abc123", &options(false, true));

    assert_eq!(
        args,
        vec![
            "--idle=no",
            "--no-terminal",
            "--input-ipc-server=/run/x/engine-1.sock",
            "--volume=40",
            "--mute=yes",
            "--pause",
            "--no-video",
            "--ytdl-format=bestaudio",
            "--",
            "https://www.youtube.com/watch?v=abc123",
        ]
    );

    let video = MpvFactory::new(EngineSettings {
        audio_only: false,
        url_template: "ytdl://{id}".into(),
        ..EngineSettings::default()
    });
    let args = video.launch_args(Path::new("s.sock"), "x", &options(true, false));
    assert!(!args.iter().any(|a| a == "--pause" || a == "--no-video"));
    assert_eq!(args.last().map(String::as_str), Some("ytdl://x"));
}

#[test]
fn probe_reports_missing_binary() {
    let err = probe("/nonexistent/moodtune-mpv").unwrap_err();
    assert!(err.contains("/nonexistent/moodtune-mpv"));
}

#[test]
fn script_load_settles_even_when_mpv_is_missing() {
    let mut factory = MpvFactory::new(EngineSettings {
        mpv_path: "/nonexistent/moodtune-mpv".into(),
        ..EngineSettings::default()
    });
    let script = ScriptDependency::default();
    let (tx, rx) = mpsc::channel();
    script.ensure_loaded(tx, |c| factory.load_script(c));

    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        PlayerMsg::ScriptSettled(Err(e)) => assert!(e.contains("cannot run")),
        other => panic!("unexpected message: {other:?}"),
    }
    assert!(!script.is_ready());
}

#[test]
fn construct_fails_when_mpv_cannot_start() {
    let mut factory = MpvFactory::new(EngineSettings {
        mpv_path: "/nonexistent/moodtune-mpv".into(),
        ..EngineSettings::default()
    });
    let container = ContainerSlot::default().acquire().unwrap();
    let (tx, _rx) = mpsc::channel();
    let sink = EngineEventSink::new(InstanceId(1), tx);

    let result = factory.construct(&container, "abc", &options(false, false), sink);
    assert!(matches!(result, Err(EngineError::Construct(_))));
}
