use super::*;
use crate::catalog::MOODS;
use crate::player::{EnginePhase, Intent, PlaybackSession};
use crate::search::SearchResults;
use crate::track::Track;

fn t(id: &str) -> Track {
    Track {
        id: id.into(),
        title: format!("Title {id}"),
        artist: "Artist".into(),
        description: String::new(),
        thumbnail_url: String::new(),
    }
}

fn with_results(ids: &[&str]) -> App {
    let mut app = App::new();
    app.set_results(SearchResults {
        label: "Calm".into(),
        tracks: ids.iter().map(|id| t(id)).collect(),
    });
    app
}

fn session(track: Option<Track>, intent: Intent, phase: EnginePhase) -> PlaybackSession {
    PlaybackSession {
        active_track: track,
        intent,
        phase,
        ..PlaybackSession::default()
    }
}

#[test]
fn starts_on_the_mood_screen() {
    let app = App::new();
    assert_eq!(app.screen, Screen::Moods);
    assert_eq!(app.selected_mood().map(|m| m.name), Some(MOODS[0].name));
    assert!(app.selected_track().is_none());
    assert_eq!(app.playback, PlaybackState::Stopped);
}

#[test]
fn mood_selection_wraps() {
    let mut app = App::new();
    app.prev();
    assert_eq!(app.mood_selected, MOODS.len() - 1);
    app.next();
    assert_eq!(app.mood_selected, 0);
}

#[test]
fn results_replace_the_list_and_reset_selection() {
    let mut app = with_results(&["a", "b", "c"]);
    assert_eq!(app.screen, Screen::Results);
    app.next();
    app.next();
    assert_eq!(app.selected_track().map(|t| t.id.as_str()), Some("c"));
    app.next();
    assert_eq!(app.selected, 0);

    app.begin_search();
    assert!(app.searching);
    app.set_results(SearchResults {
        label: "\"jazz\"".into(),
        tracks: vec![t("x")],
    });
    assert!(!app.searching);
    assert_eq!(app.selected, 0);
    assert_eq!(app.results_label, "\"jazz\"");
}

#[test]
fn empty_results_keep_navigation_safe() {
    let mut app = with_results(&[]);
    app.next();
    app.prev();
    assert_eq!(app.selected, 0);
    assert!(app.selected_track().is_none());
    assert!(app.next_result_after(None).is_none());
    assert!(app.prev_result_before(Some("a")).is_none());
}

#[test]
fn moods_screen_hides_result_selection() {
    let mut app = with_results(&["a"]);
    app.details_window = true;
    app.show_moods();
    assert!(app.selected_track().is_none());
    assert!(!app.details_window);

    app.show_results();
    assert_eq!(app.screen, Screen::Results);
}

#[test]
fn search_query_editing() {
    let mut app = App::new();
    app.enter_search_mode();
    for c in "  lofi x".chars() {
        app.push_search_char(c);
    }
    app.pop_search_char();
    app.pop_search_char();
    assert_eq!(app.take_search_query().as_deref(), Some("lofi"));
    assert!(!app.search_mode);
    assert!(app.search_query.is_empty());

    app.enter_search_mode();
    app.push_search_char(' ');
    assert_eq!(app.take_search_query(), None);

    app.enter_search_mode();
    app.push_search_char('q');
    app.exit_search_mode();
    assert!(!app.search_mode);
    assert!(app.search_query.is_empty());
}

#[test]
fn neighbours_wrap_and_fall_back() {
    let app = with_results(&["a", "b", "c"]);
    let id = |t: Option<&Track>| t.map(|t| t.id.clone());

    assert_eq!(id(app.next_result_after(Some("a"))).as_deref(), Some("b"));
    assert_eq!(id(app.next_result_after(Some("c"))).as_deref(), Some("a"));
    assert_eq!(id(app.next_result_after(Some("zzz"))).as_deref(), Some("a"));
    assert_eq!(id(app.next_result_after(None)).as_deref(), Some("a"));

    assert_eq!(id(app.prev_result_before(Some("b"))).as_deref(), Some("a"));
    assert_eq!(id(app.prev_result_before(Some("a"))).as_deref(), Some("c"));
    assert_eq!(id(app.prev_result_before(None)).as_deref(), Some("c"));
}

#[test]
fn playback_state_from_session() {
    let s = session(None, Intent::Playing, EnginePhase::Ready);
    assert_eq!(PlaybackState::from_session(&s), PlaybackState::Stopped);

    let s = session(Some(t("a")), Intent::Playing, EnginePhase::Constructing);
    assert_eq!(PlaybackState::from_session(&s), PlaybackState::Loading);

    let s = session(Some(t("a")), Intent::Playing, EnginePhase::Ready);
    assert_eq!(PlaybackState::from_session(&s), PlaybackState::Playing);

    let s = session(Some(t("a")), Intent::Paused, EnginePhase::Destroyed);
    assert_eq!(PlaybackState::from_session(&s), PlaybackState::Paused);
    assert_eq!(PlaybackState::Paused.label(), "Paused");
}

#[test]
fn cursor_follows_the_playing_track() {
    let mut app = with_results(&["a", "b", "c"]);
    app.sync_playback(&session(Some(t("c")), Intent::Playing, EnginePhase::Ready));
    assert_eq!(app.selected, 2);
    assert_eq!(app.now_playing_id(), Some("c"));

    // Moving the cursor is not undone while the same track keeps playing.
    app.prev();
    app.sync_playback(&session(Some(t("c")), Intent::Paused, EnginePhase::Ready));
    assert_eq!(app.selected, 1);
    assert_eq!(app.playback, PlaybackState::Paused);

    app.sync_playback(&session(None, Intent::Paused, EnginePhase::Destroyed));
    assert_eq!(app.now_playing_id(), None);
    assert_eq!(app.selected, 1);
}

#[test]
fn details_prefer_fetched_record_for_the_selection() {
    let mut app = with_results(&["a", "b"]);
    let mut full = t("a");
    full.description = "long description".into();

    app.set_details(Some(full));
    assert_eq!(app.details_track().map(|t| t.description.as_str()), Some("long description"));

    app.next();
    assert_eq!(app.details_track().map(|t| t.id.as_str()), Some("b"));
    assert_eq!(app.details_track().map(|t| t.description.as_str()), Some(""));

    app.toggle_details_window();
    assert!(app.details_window);
}
