use std::io;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::PlayerSettings;
use crate::notify::Notices;

use super::adapter::{Adapter, Flow};
use super::engine::EngineFactory;
use super::host::PlayerHost;
use super::session::SessionHandle;
use super::types::PlayerMsg;

/// Upper bound on how long the loop sleeps with no timer armed.
const IDLE_WAIT: Duration = Duration::from_millis(500);

pub(super) struct ThreadParts {
    pub factory: Box<dyn EngineFactory>,
    pub host: PlayerHost,
    pub settings: PlayerSettings,
    pub session: SessionHandle,
    pub notices: Notices,
    pub tx: Sender<PlayerMsg>,
}

pub(super) fn spawn_player_thread(
    parts: ThreadParts,
    rx: Receiver<PlayerMsg>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("player".to_string())
        .spawn(move || {
            // Engine instances are not `Send`, so the adapter is built here.
            let ThreadParts {
                factory,
                host,
                settings,
                session,
                notices,
                tx,
            } = parts;
            let mut adapter = Adapter::new(factory, host, &settings, session, notices, tx);

            loop {
                let timeout = adapter
                    .next_deadline()
                    .map(|d| d.saturating_duration_since(Instant::now()))
                    .unwrap_or(IDLE_WAIT);

                match rx.recv_timeout(timeout) {
                    Ok(msg) => {
                        if adapter.handle(msg, Instant::now()) == Flow::Quit {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                adapter.tick(Instant::now());
            }

            adapter.shutdown();
            debug!("player thread exiting");
        })
}
