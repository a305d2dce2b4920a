use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::debug;

use crate::catalog;
use crate::track::Track;

use super::TrackSearch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRequest {
    Mood(String),
    Query(String),
    Details(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    /// What the list is showing, e.g. the mood name.
    pub label: String,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchReply {
    Results(SearchResults),
    /// `None` when the lookup failed; the notice explains why.
    Details(Option<Track>),
}

/// Runs searches on a background thread. The thread exits once the worker
/// is dropped.
pub struct SearchWorker {
    tx: Sender<SearchRequest>,
    rx: Receiver<SearchReply>,
}

impl SearchWorker {
    pub fn spawn(search: TrackSearch) -> io::Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<SearchRequest>();
        let (reply_tx, reply_rx) = mpsc::channel::<SearchReply>();

        thread::Builder::new()
            .name("search".to_string())
            .spawn(move || {
                while let Ok(req) = req_rx.recv() {
                    let reply = run_request(&search, req);
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
                debug!("search worker exiting");
            })?;

        Ok(Self {
            tx: req_tx,
            rx: reply_rx,
        })
    }

    pub fn request(&self, req: SearchRequest) {
        if self.tx.send(req).is_err() {
            debug!("search worker is gone; request dropped");
        }
    }

    pub fn try_recv(&self) -> Option<SearchReply> {
        self.rx.try_recv().ok()
    }
}

pub(super) fn run_request(search: &TrackSearch, req: SearchRequest) -> SearchReply {
    match req {
        SearchRequest::Mood(mood) => {
            let label = catalog::find(&mood)
                .map(|m| m.name.to_string())
                .unwrap_or_else(|| mood.trim().to_string());
            SearchReply::Results(SearchResults {
                tracks: search.search_by_mood(&mood),
                label,
            })
        }
        SearchRequest::Query(query) => SearchReply::Results(SearchResults {
            label: format!("\"{}\"", query.trim()),
            tracks: search.search_by_query(&query),
        }),
        SearchRequest::Details(id) => SearchReply::Details(search.track_by_id(&id)),
    }
}
