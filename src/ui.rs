//! UI rendering helpers for the terminal user interface.
//!
//! This module contains functions to render the TUI using `ratatui`.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

use crate::app::{App, PlaybackState, Screen};
use crate::config::{ControlsSettings, TimeField, TrackDisplayField, UiSettings};
use crate::notify::{Notice, NoticeLevel};
use crate::player::PlaybackSession;
use crate::track::Track;

static CONTROLS_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = BTreeMap::new();
    map.insert("j/k", "up/down");
    map.insert("enter", "open mood / play song");
    map.insert("/", "search");
    map.insert("tab/esc", "results/moods");
    map.insert("space/p", "play/pause");
    map.insert("h/l", "prev/next song");
    // H/L and +/- are filled dynamically from config.
    map.insert("m", "mute");
    map.insert("s", "stop");
    map.insert("i", "details");
    map.insert("q", "quit");
    map
});

/// Render the controls help text, incorporating the configured steps.
fn controls_text(controls: &ControlsSettings) -> String {
    let order = [
        "j/k", "enter", "/", "tab/esc", "space/p", "h/l", "H/L", "+/-", "m", "s", "i", "q",
    ];
    order
        .iter()
        .filter_map(|k| match *k {
            "H/L" => Some(format!("[H/L] seek -/+{}s", controls.seek_seconds)),
            "+/-" => Some(format!("[+/-] volume ±{}", controls.volume_step)),
            _ => CONTROLS_MAP.get(*k).map(|v| format!("[{}] {}", k, v)),
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Format a `Duration` as `MM:SS`.
fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Seconds as reported by the engine; anything unusable reads as zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Build the "now playing" track text according to `ui` settings.
fn now_playing_track_text(track: &Track, ui: &UiSettings) -> String {
    let mut parts: Vec<String> = Vec::new();

    for f in &ui.now_playing_track_fields {
        let part = match f {
            TrackDisplayField::Display => track.display(),
            TrackDisplayField::Title => track.title.clone(),
            TrackDisplayField::Artist => track.artist.clone(),
            TrackDisplayField::Id => track.id.clone(),
        };
        let part = part.trim();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
    }

    if parts.is_empty() {
        track.display()
    } else {
        parts.join(&ui.now_playing_track_separator)
    }
}

/// Build the now-playing time text (elapsed/total/remaining) per `UiSettings`.
fn now_playing_time_text(
    elapsed: Duration,
    total: Option<Duration>,
    ui: &UiSettings,
) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for f in &ui.now_playing_time_fields {
        match f {
            TimeField::Elapsed => parts.push(format_mmss(elapsed)),
            TimeField::Total => {
                if let Some(t) = total {
                    parts.push(format_mmss(t));
                }
            }
            TimeField::Remaining => {
                if let Some(t) = total {
                    let rem = t.saturating_sub(elapsed);
                    parts.push(format!("-{}", format_mmss(rem)));
                }
            }
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(&ui.now_playing_time_separator))
    }
}

fn status_text(app: &App, session: &PlaybackSession, ui: &UiSettings) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!(" {}", app.playback.label()));
    if let Some(track) = session.current_track() {
        let song = now_playing_track_text(track, ui);
        let total = (session.duration > 0.0).then(|| seconds(session.duration));
        match now_playing_time_text(seconds(session.position), total, ui) {
            Some(time) if app.playback != PlaybackState::Loading => {
                parts.push(format!("Song: {} [{}]", song, time))
            }
            _ => parts.push(format!("Song: {}", song)),
        }
    }

    if session.muted {
        parts.push(format!("Volume: {} (muted)", session.volume));
    } else {
        parts.push(format!("Volume: {}", session.volume));
    }

    if !app.results_label.is_empty() {
        parts.push(format!("Results: {}", app.results_label));
    }
    if app.searching {
        parts.push("Searching...".to_string());
    }
    if app.search_mode {
        parts.push(format!("SEARCH: {}_", app.search_query));
    }

    parts.join(" • ")
}

/// Compute the visible window so the selected row stays roughly centered.
fn visible_window(total: usize, selected: usize, height: usize) -> (usize, usize, usize) {
    if total <= height || height == 0 {
        return (0, total, selected.min(total.saturating_sub(1)));
    }
    let half = height / 2;
    let mut start = selected.saturating_sub(half);
    if start + height > total {
        start = total - height;
    }
    (start, start + height, selected - start)
}

/// Compute a centered rectangle with given size constrained to `r`.
fn centered_rect_sized(mut width: u16, mut height: u16, r: Rect) -> Rect {
    width = width.min(r.width.saturating_sub(2)).max(10);
    height = height.min(r.height.saturating_sub(2)).max(5);

    let x = r.x + (r.width.saturating_sub(width) / 2);
    let y = r.y + (r.height.saturating_sub(height) / 2);
    Rect {
        x,
        y,
        width,
        height,
    }
}

fn left_padded(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .padding(Padding {
            left: 1,
            right: 0,
            top: 0,
            bottom: 0,
        })
}

fn details_text(track: Option<&Track>) -> String {
    let Some(track) = track else {
        return "No song selected".to_string();
    };
    let or_dash = |s: &str| if s.trim().is_empty() { "-".to_string() } else { s.to_string() };
    format!(
        "Title: {}\nChannel: {}\nId: {}\nThumbnail: {}\n\n{}",
        track.title,
        or_dash(&track.artist),
        track.id,
        or_dash(&track.thumbnail_url),
        or_dash(&track.description),
    )
}

/// Render the entire UI into the provided `frame`.
pub fn draw(
    frame: &mut Frame,
    app: &App,
    session: &PlaybackSession,
    notice: Option<&Notice>,
    ui_settings: &UiSettings,
    controls_settings: &ControlsSettings,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" moodtune ")
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    let status = Paragraph::new(status_text(app, session, ui_settings))
        .block(left_padded(" status "))
        .wrap(Wrap { trim: true });
    frame.render_widget(status, chunks[1]);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(session.progress())
        .label(format!("{:.0}%", session.progress() * 100.0));
    frame.render_widget(gauge, chunks[2]);

    // Main list
    {
        let list_area = chunks[3];
        let height = list_area.height.saturating_sub(2) as usize;

        let (title, rows, selected): (String, Vec<String>, usize) = match app.screen {
            Screen::Moods => (
                " how are you feeling? ".to_string(),
                app.moods()
                    .iter()
                    .map(|m| format!("{:<12} {}", m.name, m.description))
                    .collect(),
                app.mood_selected,
            ),
            Screen::Results => (
                format!(" {} ", app.results_label),
                app.results
                    .iter()
                    .map(|t| {
                        let marker = if app.now_playing_id() == Some(t.id.as_str()) {
                            "♪ "
                        } else {
                            "  "
                        };
                        format!("{}{}", marker, t.display())
                    })
                    .collect(),
                app.selected,
            ),
        };

        let total = rows.len();
        let (start, end, selected_in_window) = visible_window(total, selected, height);
        let items: Vec<ListItem> = rows[start..end]
            .iter()
            .map(|r| ListItem::new(r.as_str()))
            .collect();

        let empty = app.screen == Screen::Results && total == 0;
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        if total > 0 {
            state.select(Some(selected_in_window));
        }
        frame.render_stateful_widget(list, list_area, &mut state);

        if empty {
            let msg = if app.searching { "Searching..." } else { "No results" };
            let inner = centered_rect_sized(24, 5, list_area);
            frame.render_widget(
                Paragraph::new(msg).alignment(Alignment::Center),
                Rect { height: 1, y: inner.y + inner.height / 2, ..inner },
            );
        }

        if app.details_window && app.screen == Screen::Results {
            let popup_area = centered_rect_sized(72, 12, list_area);
            frame.render_widget(Clear, popup_area);
            let details = Paragraph::new(details_text(app.details_track()))
                .block(left_padded(" details (i closes) "))
                .wrap(Wrap { trim: true });
            frame.render_widget(details, popup_area);
        }
    }

    if let Some(notice) = notice {
        let style = match notice.level {
            NoticeLevel::Error => Style::default().fg(Color::Red),
            NoticeLevel::Info => Style::default().fg(Color::Yellow),
        };
        frame.render_widget(
            Paragraph::new(format!(" {}", notice.message)).style(style),
            chunks[4],
        );
    }

    let footer = Paragraph::new(controls_text(controls_settings))
        .block(left_padded(" controls "))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[5]);
}
