use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::debug;

use crate::app::{App, Screen};
use crate::config;
use crate::mpris::{ControlCmd, MprisHandle, track_object_path};
use crate::notify::Notices;
use crate::player::PlayerHandle;
use crate::runtime::mpris_sync::update_mpris;
use crate::search::{SearchReply, SearchRequest, SearchWorker};
use crate::ui;

/// Long-lived collaborators the event loop drives.
pub struct Services<'a> {
    pub player: &'a PlayerHandle,
    pub search: &'a SearchWorker,
    pub mpris: &'a MprisHandle,
    pub notices: &'a Notices,
}

/// State tracked by the runtime event loop across iterations.
#[derive(Default)]
pub struct EventLoopState {
    /// Session revision last mirrored into the app and MPRIS.
    pub last_revision: Option<u64>,
}

impl EventLoopState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Main terminal event loop: handles input, UI drawing, sync with the player
/// thread, search replies and MPRIS. Returns `Ok(())` when shutdown is
/// requested.
pub fn run(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    settings: &config::Settings,
    app: &mut App,
    services: &Services<'_>,
    control_rx: &mpsc::Receiver<ControlCmd>,
    state: &mut EventLoopState,
) -> Result<(), Box<dyn std::error::Error>> {
    let notice_ttl = Duration::from_secs(settings.ui.notice_seconds);

    loop {
        let session = services.player.snapshot();
        if state.last_revision != Some(session.revision) {
            app.sync_playback(&session);
            update_mpris(services.mpris, &session, &settings.engine);
            state.last_revision = Some(session.revision);
        }

        while let Some(reply) = services.search.try_recv() {
            match reply {
                SearchReply::Results(results) => {
                    debug!(label = %results.label, count = results.tracks.len(), "search results");
                    app.set_results(results);
                    if let Some(idx) = app.now_playing_id().and_then(|id| app.position_of(id)) {
                        app.selected = idx;
                    }
                }
                SearchReply::Details(details) => app.set_details(details),
            }
        }

        let notice = services.notices.latest(notice_ttl);
        terminal.draw(|f| {
            ui::draw(f, app, &session, notice.as_ref(), &settings.ui, &settings.controls)
        })?;

        while let Ok(cmd) = control_rx.try_recv() {
            if handle_control_cmd(cmd, app, services) {
                return Ok(());
            }
        }

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key_event(key, settings, app, services) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Start the highlighted result, or the first one, when nothing is bound.
fn start_selection(app: &App, services: &Services<'_>) {
    let track = app
        .selected_track()
        .or_else(|| app.results.first())
        .cloned();
    if let Some(track) = track {
        services.player.play_track(track);
    }
}

/// React to a transport command from MPRIS or the keyboard. Returns `true`
/// when the app should quit.
fn handle_control_cmd(cmd: ControlCmd, app: &mut App, services: &Services<'_>) -> bool {
    let player = services.player;
    let session = player.snapshot();

    match cmd {
        ControlCmd::Quit => return true,
        ControlCmd::Play => {
            if session.active_track.is_some() {
                player.play();
            } else {
                start_selection(app, services);
            }
        }
        ControlCmd::Pause => player.pause(),
        ControlCmd::PlayPause => {
            if session.active_track.is_some() {
                player.toggle_playback();
            } else {
                start_selection(app, services);
            }
        }
        ControlCmd::Stop => player.stop(),
        ControlCmd::Next => {
            let current = session.current_track().map(|t| t.id.as_str());
            if let Some(track) = app.next_result_after(current).cloned() {
                player.play_track(track);
            }
        }
        ControlCmd::Prev => {
            let current = session.current_track().map(|t| t.id.as_str());
            if let Some(track) = app.prev_result_before(current).cloned() {
                player.play_track(track);
            }
        }
        ControlCmd::Seek(offset_us) => player.seek_by(offset_us as f64 / 1_000_000.0),
        ControlCmd::SetPosition {
            track_id,
            position_us,
        } => {
            let is_current = session
                .current_track()
                .and_then(|t| track_object_path(&t.id))
                .is_some_and(|p| p.as_str() == track_id);
            if is_current && position_us >= 0 {
                player.seek(position_us as f64 / 1_000_000.0);
            }
        }
        ControlCmd::SetVolume(volume) => {
            if volume.is_finite() {
                player.set_volume((volume.clamp(0.0, 1.0) * 100.0).round() as i32);
            }
        }
    }

    false
}

fn handle_key_event(
    key: KeyEvent,
    settings: &config::Settings,
    app: &mut App,
    services: &Services<'_>,
) -> bool {
    if app.search_mode {
        match key.code {
            KeyCode::Esc => app.exit_search_mode(),
            KeyCode::Backspace => app.pop_search_char(),
            KeyCode::Enter => {
                if let Some(query) = app.take_search_query() {
                    app.begin_search();
                    services.search.request(SearchRequest::Query(query));
                }
            }
            KeyCode::Char(c) if !c.is_control() => app.push_search_char(c),
            _ => {}
        }
        return false;
    }

    let player = services.player;
    let seek = settings.controls.seek_seconds as f64;
    let step = i32::from(settings.controls.volume_step);

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('j') | KeyCode::Down => app.next(),
        KeyCode::Char('k') | KeyCode::Up => app.prev(),
        KeyCode::Enter => match app.screen {
            Screen::Moods => {
                if let Some(mood) = app.selected_mood() {
                    app.begin_search();
                    services.search.request(SearchRequest::Mood(mood.name.to_string()));
                }
            }
            Screen::Results => {
                if let Some(track) = app.selected_track().cloned() {
                    player.play_track(track);
                }
            }
        },
        KeyCode::Char('/') => app.enter_search_mode(),
        KeyCode::Tab => match app.screen {
            Screen::Moods => app.show_results(),
            Screen::Results => app.show_moods(),
        },
        KeyCode::Esc => {
            if app.details_window {
                app.toggle_details_window();
            } else {
                app.show_moods();
            }
        }
        KeyCode::Char(' ') | KeyCode::Char('p') => {
            return handle_control_cmd(ControlCmd::PlayPause, app, services);
        }
        KeyCode::Char('l') => return handle_control_cmd(ControlCmd::Next, app, services),
        KeyCode::Char('h') => return handle_control_cmd(ControlCmd::Prev, app, services),
        KeyCode::Char('L') => player.seek_by(seek),
        KeyCode::Char('H') => player.seek_by(-seek),
        KeyCode::Char('+') | KeyCode::Char('=') => player.adjust_volume(step),
        KeyCode::Char('-') => player.adjust_volume(-step),
        KeyCode::Char('m') => player.toggle_mute(),
        KeyCode::Char('s') => player.stop(),
        KeyCode::Char('i') => {
            if let Some(id) = app.selected_track().map(|t| t.id.clone()) {
                app.toggle_details_window();
                let fetched = app.details.as_ref().is_some_and(|d| d.id == id);
                if app.details_window && !fetched {
                    services.search.request(SearchRequest::Details(id));
                }
            }
        }
        _ => {}
    }

    false
}
