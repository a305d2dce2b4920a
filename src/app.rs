//! Application module: exposes the app model used by the TUI and runtime.
//!
//! The `App` model lives in `app::model` and holds the mood catalog
//! selection, the latest search results and a mirror of the playback state.

mod model;

pub use model::*;

#[cfg(test)]
mod tests;
