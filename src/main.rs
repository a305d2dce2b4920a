mod app;
mod catalog;
mod config;
mod mpris;
mod mpv;
mod notify;
mod player;
mod runtime;
mod search;
mod track;
mod ui;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
