use anyhow::Result;

mod app;
mod config;
mod gemini;
mod handler;
mod logging;
mod search;
mod tui;
mod ui;

use app::App;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is best-effort; the app still works without a log file
    if let Err(err) = logging::init() {
        eprintln!("warning: logging disabled: {}", err);
    }

    let config = Config::load().unwrap_or_else(|err| {
        tracing::warn!(%err, "failed to load config, using defaults");
        Config::new()
    });
    if let Err(err) = config.save_if_missing() {
        tracing::debug!(%err, "could not write template config");
    }

    let mut app = App::new(config);
    if !app.has_api_key() {
        tracing::warn!("no Gemini API key found in GEMINI_API_KEY or the config file");
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}
