use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::EngineSettings;
use crate::player::{
    Engine, EngineError, EngineErrorCode, EngineEventSink, EngineFactory, EngineOptions,
    EngineState, HostContainer, InstanceId, ScriptCompletion,
};

use super::ipc::{self, IpcMessage, Props};

const CONNECT_RETRY: Duration = Duration::from_millis(50);
const QUIT_GRACE: Duration = Duration::from_millis(300);

/// Starts one mpv process per engine instance.
pub struct MpvFactory {
    settings: EngineSettings,
}

impl MpvFactory {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub(super) fn launch_args(
        &self,
        socket: &Path,
        video_id: &str,
        options: &EngineOptions,
    ) -> Vec<String> {
        let mut args = vec![
            "--idle=no".to_string(),
            "--no-terminal".to_string(),
            format!("--input-ipc-server={}", socket.display()),
            format!("--volume={}", options.volume.min(100)),
            format!("--mute={}", if options.muted { "yes" } else { "no" }),
        ];
        if !options.autoplay {
            args.push("--pause".to_string());
        }
        if self.settings.audio_only {
            args.push("--no-video".to_string());
        }
        args.extend(self.settings.extra_args.iter().cloned());
        args.push("--".to_string());
        args.push(self.settings.media_url(video_id));
        args
    }
}

/// Check that the configured mpv binary runs at all.
pub(super) fn probe(mpv_path: &str) -> Result<(), String> {
    let output = Command::new(mpv_path)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| format!("cannot run `{mpv_path}`: {e}"))?;

    if !output.status.success() {
        return Err(format!("`{mpv_path} --version` exited with {}", output.status));
    }
    let version = String::from_utf8_lossy(&output.stdout);
    debug!(version = %version.lines().next().unwrap_or_default(), "found mpv");
    Ok(())
}

impl EngineFactory for MpvFactory {
    fn load_script(&mut self, completion: ScriptCompletion) {
        let mpv_path = self.settings.mpv_path.clone();
        // On spawn failure the completion is dropped, which settles it as failed.
        if let Err(e) = thread::Builder::new()
            .name("mpv-probe".to_string())
            .spawn(move || completion.finish(probe(&mpv_path)))
        {
            warn!(error = %e, "failed to start mpv probe");
        }
    }

    fn construct(
        &mut self,
        container: &HostContainer,
        video_id: &str,
        options: &EngineOptions,
        events: EngineEventSink,
    ) -> Result<Box<dyn Engine>, EngineError> {
        let id = events.instance();
        let socket = container.socket_path(id);
        remove_socket(&socket);

        let args = self.launch_args(&socket, video_id, options);
        debug!(instance = %id, mpv = %self.settings.mpv_path, ?args, "starting mpv");
        let child = Command::new(&self.settings.mpv_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                EngineError::Construct(format!("cannot start `{}`: {e}", self.settings.mpv_path))
            })?;

        let shared = Arc::new(Shared {
            props: Mutex::new(Props::new(!options.autoplay)),
            writer: Mutex::new(None),
            closing: AtomicBool::new(false),
        });

        let mut engine = MpvEngine {
            id,
            child: Some(child),
            socket: socket.clone(),
            shared: Arc::clone(&shared),
        };

        let timeout = Duration::from_millis(self.settings.connect_timeout_ms);
        thread::Builder::new()
            .name(format!("mpv-ipc-{}", id.0))
            .spawn(move || run_reader(&socket, timeout, &shared, &events))
            .map_err(|e| {
                let _ = engine.destroy();
                EngineError::Construct(format!("cannot start IPC reader: {e}"))
            })?;

        Ok(Box::new(engine))
    }
}

struct Shared {
    props: Mutex<Props>,
    writer: Mutex<Option<UnixStream>>,
    closing: AtomicBool,
}

impl Shared {
    fn props(&self) -> MutexGuard<'_, Props> {
        self.props.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn writer(&self) -> MutexGuard<'_, Option<UnixStream>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

fn connect(socket: &Path, timeout: Duration, shared: &Shared) -> io::Result<UnixStream> {
    let deadline = Instant::now() + timeout;
    loop {
        match UnixStream::connect(socket) {
            Ok(stream) => return Ok(stream),
            Err(e) if Instant::now() >= deadline => return Err(e),
            Err(_) if shared.is_closing() => {
                return Err(io::Error::other("instance closed before connecting"));
            }
            Err(_) => thread::sleep(CONNECT_RETRY),
        }
    }
}

fn run_reader(socket: &Path, timeout: Duration, shared: &Shared, events: &EngineEventSink) {
    let stream = match connect(socket, timeout, shared).and_then(|s| register(s, shared)) {
        Ok(s) => s,
        Err(e) => {
            if !shared.is_closing() {
                warn!(instance = %events.instance(), error = %e, "mpv IPC connection failed");
                events.error(EngineErrorCode::Other(format!("IPC connection failed: {e}")));
            }
            return;
        }
    };
    debug!(instance = %events.instance(), "mpv IPC connected");

    for line in BufReader::new(stream).lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                debug!(error = %e, "mpv IPC read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match ipc::decode_line(&line) {
            Ok(IpcMessage::Event(event)) => {
                let notification = ipc::translate(&event, &mut shared.props());
                if let Some(n) = notification {
                    events.notify(n);
                }
            }
            Ok(IpcMessage::Reply { error: Some(e) }) => debug!(error = %e, "mpv rejected a command"),
            Ok(IpcMessage::Reply { error: None }) => {}
            Err(e) => debug!(error = %e, line = %line, "undecodable mpv IPC line"),
        }
    }

    if !shared.is_closing() {
        warn!(instance = %events.instance(), "mpv exited unexpectedly");
        events.error(EngineErrorCode::Disconnected);
    }
}

/// Subscribe to the observed properties and publish the write half.
fn register(stream: UnixStream, shared: &Shared) -> io::Result<UnixStream> {
    let mut writer = stream.try_clone()?;
    for line in ipc::observe_lines() {
        writer.write_all(line.as_bytes())?;
    }
    *shared.writer() = Some(writer);
    Ok(stream)
}

fn remove_socket(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "failed to remove stale socket"),
    }
}

pub struct MpvEngine {
    id: InstanceId,
    child: Option<Child>,
    socket: PathBuf,
    shared: Arc<Shared>,
}

impl MpvEngine {
    fn send(&self, command: &'static str, args: &[Value]) -> Result<(), EngineError> {
        let mut writer = self.shared.writer();
        let stream = writer.as_mut().ok_or(EngineError::NotConnected)?;
        stream
            .write_all(ipc::command_line(args).as_bytes())
            .map_err(|e| EngineError::command(command, e))
    }

    fn set_property(&self, command: &'static str, name: &str, value: Value) -> Result<(), EngineError> {
        self.send(command, &[json!("set_property"), json!(name), value])
    }

    fn reap(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        let deadline = Instant::now() + QUIT_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(instance = %self.id, %status, "mpv exited");
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                Ok(None) => break,
                Err(e) => {
                    debug!(instance = %self.id, error = %e, "failed to poll mpv");
                    break;
                }
            }
        }

        if let Err(e) = child.kill() {
            debug!(instance = %self.id, error = %e, "failed to kill mpv");
        }
        let _ = child.wait();
    }
}

impl Engine for MpvEngine {
    fn play(&mut self) -> Result<(), EngineError> {
        self.set_property("play", "pause", json!(false))
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.set_property("pause", "pause", json!(true))
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.send("stop", &[json!("stop")])
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), EngineError> {
        self.send("seek", &[json!("seek"), json!(seconds), json!("absolute")])
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), EngineError> {
        self.set_property("set_volume", "volume", json!(volume.min(100)))
    }

    fn mute(&mut self) -> Result<(), EngineError> {
        self.set_property("mute", "mute", json!(true))
    }

    fn unmute(&mut self) -> Result<(), EngineError> {
        self.set_property("unmute", "mute", json!(false))
    }

    fn current_time(&mut self) -> Result<f64, EngineError> {
        Ok(self.shared.props().time_pos)
    }

    fn duration(&mut self) -> Result<f64, EngineError> {
        Ok(self.shared.props().duration)
    }

    fn player_state(&mut self) -> Result<EngineState, EngineError> {
        Ok(self.shared.props().state())
    }

    fn destroy(&mut self) -> Result<(), EngineError> {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.send("quit", &[json!("quit")]) {
            debug!(instance = %self.id, error = %e, "quit not delivered");
        }
        // Unblocks the reader thread.
        if let Some(stream) = self.shared.writer().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        self.reap();
        remove_socket(&self.socket);
        Ok(())
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        let _ = self.destroy();
    }
}
