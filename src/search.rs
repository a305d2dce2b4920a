//! Track search.
//!
//! [`SearchBackend`] is the raw service (YouTube Data API in production).
//! [`TrackSearch`] wraps a backend with the fail-soft policy the UI relies on:
//! every failure becomes an empty result plus an error notice. The TUI talks
//! to it through a [`SearchWorker`] so it never blocks on the network.

mod worker;
mod youtube;

use tracing::{info, warn};

use crate::catalog;
use crate::config::SearchSettings;
use crate::notify::Notices;
use crate::track::Track;

pub use worker::{SearchReply, SearchRequest, SearchResults, SearchWorker};
pub use youtube::YoutubeClient;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("no YouTube API key configured (set search.api_key)")]
    MissingApiKey,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("search service answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed search response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub trait SearchBackend: Send {
    fn search(&self, query: &str, max_results: u32) -> Result<Vec<Track>, SearchError>;
    fn lookup(&self, video_id: &str) -> Result<Option<Track>, SearchError>;
}

pub struct TrackSearch {
    backend: Box<dyn SearchBackend>,
    notices: Notices,
    mood_results: u32,
    query_results: u32,
}

impl TrackSearch {
    pub fn new(backend: Box<dyn SearchBackend>, settings: &SearchSettings, notices: Notices) -> Self {
        Self {
            backend,
            notices,
            mood_results: settings.mood_results.max(1),
            query_results: settings.query_results.max(1),
        }
    }

    /// Tracks matching the search phrase of `mood`.
    pub fn search_by_mood(&self, mood: &str) -> Vec<Track> {
        let term = catalog::search_term_for(mood);
        match self.backend.search(&term, self.mood_results) {
            Ok(tracks) => {
                info!(mood, term = %term, results = tracks.len(), "mood search");
                tracks
            }
            Err(e) => {
                warn!(mood, error = %e, "mood search failed");
                self.notices
                    .push_error(format!("Failed to load music recommendations: {e}"));
                Vec::new()
            }
        }
    }

    /// Free-text search. A blank query returns nothing without a request.
    pub fn search_by_query(&self, query: &str) -> Vec<Track> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        match self.backend.search(query, self.query_results) {
            Ok(tracks) => {
                info!(query, results = tracks.len(), "query search");
                tracks
            }
            Err(e) => {
                warn!(query, error = %e, "query search failed");
                self.notices.push_error(format!("Failed to search: {e}"));
                Vec::new()
            }
        }
    }

    pub fn track_by_id(&self, video_id: &str) -> Option<Track> {
        match self.backend.lookup(video_id) {
            Ok(Some(track)) => Some(track),
            Ok(None) => {
                warn!(video_id, "track not found");
                self.notices.push_error("Failed to load song details: not found");
                None
            }
            Err(e) => {
                warn!(video_id, error = %e, "track lookup failed");
                self.notices
                    .push_error(format!("Failed to load song details: {e}"));
                None
            }
        }
    }
}
