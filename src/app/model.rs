//! Application model types: `App`, `Screen` and `PlaybackState`.
//!
//! The `App` struct holds what the TUI shows: the mood list, the latest
//! search results, the selection and a mirror of the playback session.

use crate::catalog::{self, Mood};
use crate::player::PlaybackSession;
use crate::search::SearchResults;
use crate::track::Track;

/// The playback state as shown to the user.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    /// A track is bound but its engine is not ready yet.
    Loading,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn from_session(session: &PlaybackSession) -> Self {
        match session.active_track {
            None => Self::Stopped,
            Some(_) if session.is_loading() => Self::Loading,
            Some(_) if session.is_playing() => Self::Playing,
            Some(_) => Self::Paused,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Loading => "Loading",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

/// Which list the main pane shows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Moods,
    Results,
}

/// The main application model.
pub struct App {
    pub screen: Screen,
    pub mood_selected: usize,

    pub results: Vec<Track>,
    pub results_label: String,
    pub selected: usize,

    pub search_mode: bool,
    pub search_query: String,
    /// A search request is in flight.
    pub searching: bool,

    pub details_window: bool,
    pub details: Option<Track>,

    pub playback: PlaybackState,
    pub now_playing: Option<Track>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            screen: Screen::Moods,
            mood_selected: 0,
            results: Vec::new(),
            results_label: String::new(),
            selected: 0,
            search_mode: false,
            search_query: String::new(),
            searching: false,
            details_window: false,
            details: None,
            playback: PlaybackState::Stopped,
            now_playing: None,
        }
    }

    pub fn moods(&self) -> &'static [Mood] {
        catalog::MOODS
    }

    pub fn selected_mood(&self) -> Option<&'static Mood> {
        catalog::MOODS.get(self.mood_selected)
    }

    /// The highlighted result, only while the results screen is shown.
    pub fn selected_track(&self) -> Option<&Track> {
        match self.screen {
            Screen::Results => self.results.get(self.selected),
            Screen::Moods => None,
        }
    }

    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }

    /// Move the selection down, wrapping to the top.
    pub fn next(&mut self) {
        match self.screen {
            Screen::Moods => self.mood_selected = wrap_next(self.mood_selected, catalog::MOODS.len()),
            Screen::Results => self.selected = wrap_next(self.selected, self.results.len()),
        }
    }

    /// Move the selection up, wrapping to the bottom.
    pub fn prev(&mut self) {
        match self.screen {
            Screen::Moods => self.mood_selected = wrap_prev(self.mood_selected, catalog::MOODS.len()),
            Screen::Results => self.selected = wrap_prev(self.selected, self.results.len()),
        }
    }

    pub fn show_moods(&mut self) {
        self.screen = Screen::Moods;
        self.details_window = false;
    }

    /// Go back to the results of the last search, if there were any.
    pub fn show_results(&mut self) {
        if self.has_results() {
            self.screen = Screen::Results;
        }
    }

    pub fn begin_search(&mut self) {
        self.searching = true;
    }

    /// Replace the result list and switch to it.
    pub fn set_results(&mut self, results: SearchResults) {
        self.results = results.tracks;
        self.results_label = results.label;
        self.selected = 0;
        self.searching = false;
        self.details_window = false;
        self.details = None;
        self.screen = Screen::Results;
    }

    pub fn enter_search_mode(&mut self) {
        self.search_mode = true;
        self.search_query.clear();
    }

    /// Leave search mode without submitting.
    pub fn exit_search_mode(&mut self) {
        self.search_mode = false;
        self.search_query.clear();
    }

    pub fn push_search_char(&mut self, c: char) {
        self.search_query.push(c);
    }

    pub fn pop_search_char(&mut self) {
        self.search_query.pop();
    }

    /// Leave search mode and return the query, unless it is blank.
    pub fn take_search_query(&mut self) -> Option<String> {
        self.search_mode = false;
        let query = std::mem::take(&mut self.search_query);
        let query = query.trim();
        (!query.is_empty()).then(|| query.to_string())
    }

    pub fn toggle_details_window(&mut self) {
        self.details_window = !self.details_window;
    }

    pub fn set_details(&mut self, details: Option<Track>) {
        self.details = details;
    }

    /// What the details popup should show: fetched details when they match
    /// the selection, otherwise the search snippet.
    pub fn details_track(&self) -> Option<&Track> {
        let selected = self.selected_track()?;
        match &self.details {
            Some(d) if d.same_id(selected) => Some(d),
            _ => Some(selected),
        }
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.results.iter().position(|t| t.id == id)
    }

    /// The result after `current` (by id), wrapping around. Falls back to
    /// the first result when `current` is not in the list.
    pub fn next_result_after(&self, current: Option<&str>) -> Option<&Track> {
        if self.results.is_empty() {
            return None;
        }
        let idx = match current.and_then(|id| self.position_of(id)) {
            Some(p) => (p + 1) % self.results.len(),
            None => 0,
        };
        self.results.get(idx)
    }

    /// The result before `current` (by id), wrapping around. Falls back to
    /// the last result when `current` is not in the list.
    pub fn prev_result_before(&self, current: Option<&str>) -> Option<&Track> {
        if self.results.is_empty() {
            return None;
        }
        let last = self.results.len() - 1;
        let idx = match current.and_then(|id| self.position_of(id)) {
            Some(0) | None => last,
            Some(p) => p - 1,
        };
        self.results.get(idx)
    }

    /// Mirror the shared session; the cursor follows the playing track.
    pub fn sync_playback(&mut self, session: &PlaybackSession) {
        self.playback = PlaybackState::from_session(session);

        let changed = match (&self.now_playing, &session.active_track) {
            (Some(a), Some(b)) => !a.same_id(b),
            (None, None) => false,
            _ => true,
        };
        if !changed {
            return;
        }
        self.now_playing = session.active_track.clone();
        if let Some(idx) = self.now_playing.as_ref().and_then(|t| self.position_of(&t.id)) {
            self.selected = idx;
        }
    }

    pub fn now_playing_id(&self) -> Option<&str> {
        self.now_playing.as_ref().map(|t| t.id.as_str())
    }
}

fn wrap_next(current: usize, len: usize) -> usize {
    if len == 0 { 0 } else { (current + 1) % len }
}

fn wrap_prev(current: usize, len: usize) -> usize {
    match (len, current) {
        (0, _) => 0,
        (_, 0) => len - 1,
        _ => current.min(len) - 1,
    }
}
