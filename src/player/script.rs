//! Init-once state for the engine's bootstrap dependency.
//!
//! The dependency is loaded at most once per process (once it succeeds).
//! Every adapter that needs it registers its message sender as a waiter; all
//! waiters are told when the single in-flight load settles.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::types::PlayerMsg;

#[derive(Debug)]
enum ScriptState {
    Idle,
    Loading(Vec<Sender<PlayerMsg>>),
    Ready,
    Failed(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScriptStatus {
    Ready,
    /// A load is in flight; the waiter will receive `PlayerMsg::ScriptSettled`.
    Pending,
}

#[derive(Debug, Clone)]
pub struct ScriptDependency {
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptDependency {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState::Idle)),
        }
    }
}

fn lock(state: &Mutex<ScriptState>) -> MutexGuard<'_, ScriptState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptDependency {
    /// Return `Ready` if the dependency is loaded. Otherwise register `waiter`
    /// and, if no load is in flight, start one through `load`.
    ///
    /// A previous failed load is retried.
    pub fn ensure_loaded(
        &self,
        waiter: Sender<PlayerMsg>,
        load: impl FnOnce(ScriptCompletion),
    ) -> ScriptStatus {
        let start = {
            let mut state = lock(&self.state);
            match &mut *state {
                ScriptState::Ready => return ScriptStatus::Ready,
                ScriptState::Loading(waiters) => {
                    waiters.push(waiter);
                    false
                }
                ScriptState::Idle | ScriptState::Failed(_) => {
                    *state = ScriptState::Loading(vec![waiter]);
                    true
                }
            }
        };

        // The loader may finish synchronously, so the lock must be released here.
        if start {
            debug!("loading engine script dependency");
            load(ScriptCompletion {
                state: Arc::clone(&self.state),
                finished: false,
            });
        }
        ScriptStatus::Pending
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        matches!(*lock(&self.state), ScriptState::Ready)
    }

    #[cfg(test)]
    pub fn last_error(&self) -> Option<String> {
        match &*lock(&self.state) {
            ScriptState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }
}

/// One-shot completion handle for an in-flight load.
///
/// Dropping it unfinished settles the load as failed, so waiters are never
/// left hanging.
#[derive(Debug)]
pub struct ScriptCompletion {
    state: Arc<Mutex<ScriptState>>,
    finished: bool,
}

impl ScriptCompletion {
    pub fn finish(mut self, result: Result<(), String>) {
        self.settle(result);
    }

    fn settle(&mut self, result: Result<(), String>) {
        if self.finished {
            return;
        }
        self.finished = true;

        let waiters = {
            let mut state = lock(&self.state);
            let next = match &result {
                Ok(()) => ScriptState::Ready,
                Err(e) => ScriptState::Failed(e.clone()),
            };
            match std::mem::replace(&mut *state, next) {
                ScriptState::Loading(waiters) => waiters,
                _ => Vec::new(),
            }
        };

        if let Err(e) = &result {
            warn!(error = %e, waiters = waiters.len(), "engine script dependency failed to load");
        } else {
            debug!(waiters = waiters.len(), "engine script dependency ready");
        }
        for w in waiters {
            let _ = w.send(PlayerMsg::ScriptSettled(result.clone()));
        }
    }
}

impl Drop for ScriptCompletion {
    fn drop(&mut self) {
        self.settle(Err("script loader gave up without reporting".to_string()));
    }
}
