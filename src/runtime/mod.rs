use std::env;
use std::sync::mpsc;

use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::App;
use crate::mpris::ControlCmd;
use crate::mpv::MpvFactory;
use crate::notify::Notices;
use crate::player::{PlayerHandle, PlayerHost};
use crate::search::{SearchWorker, TrackSearch, YoutubeClient};

mod event_loop;
mod logging;
mod mpris_sync;
mod settings;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (settings, config_warning) = settings::load_settings();

    if env::args().skip(1).any(|a| a == "--print-config") {
        if let Some(w) = &config_warning {
            eprintln!("moodtune: {w}");
        }
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    match logging::init(&settings.log) {
        Ok(Some(path)) => info!(path = %path.display(), "moodtune starting"),
        Ok(None) => {}
        Err(e) => eprintln!("moodtune: cannot open log file, logging disabled: {e}"),
    }
    if let Some(w) = config_warning {
        warn!("{w}");
    }

    let notices = Notices::new();
    let player = PlayerHandle::spawn(
        Box::new(MpvFactory::new(settings.engine.clone())),
        PlayerHost::global(),
        &settings.player,
        notices.clone(),
    )?;

    let client = YoutubeClient::new(&settings.search)?;
    let search = SearchWorker::spawn(TrackSearch::new(
        Box::new(client),
        &settings.search,
        notices.clone(),
    ))?;
    if settings.search.api_key.trim().is_empty() {
        notices.push_info("No YouTube API key configured (search.api_key); searches will fail");
    }

    let (control_tx, control_rx) = mpsc::channel::<ControlCmd>();
    let mpris = crate::mpris::spawn_mpris(control_tx);

    let mut app = App::new();

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let services = event_loop::Services {
        player: &player,
        search: &search,
        mpris: &mpris,
        notices: &notices,
    };
    let mut state = event_loop::EventLoopState::new();
    let run_result = event_loop::run(
        &mut terminal,
        &settings,
        &mut app,
        &services,
        &control_rx,
        &mut state,
    );

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    player.quit();
    info!("moodtune stopped");
    run_result
}
