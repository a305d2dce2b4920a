//! The concrete playback engine: one `mpv` child process per instance,
//! driven over its JSON IPC socket.
//!
//! The "script dependency" is the mpv binary itself, probed once with
//! `mpv --version`. Each instance puts its socket in the shared host
//! container and reports through a reader thread that turns IPC events into
//! engine notifications.

mod engine;
mod ipc;

pub use engine::{MpvEngine, MpvFactory};

#[cfg(test)]
mod tests;
