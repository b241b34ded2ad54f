mod app;
mod audio;
mod handler;
mod logging;
mod tui;
mod ui;

use anyhow::Result;
use saheli_core::{Config, FileStore, Persistence};

use crate::app::App;
use crate::tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::new(), Some(e)),
    };

    let data_dir = config.resolved_data_dir()?;
    let log_path = logging::init(&data_dir, config.log_level.as_deref())?;

    tracing::info!("Starting saheli v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %log_path.display(), "Logging initialised");
    if let Some(e) = config_error {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }

    let persistence = Persistence::new(FileStore::new(data_dir.clone()));
    tracing::info!(dir = %data_dir.display(), "Using data directory");

    tui::install_panic_hook();
    let mut events = EventHandler::new();
    let mut app = App::new(&config, persistence, events.sender());

    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, &mut events).await;

    app.shutdown().await;
    tui::restore()?;

    if let Err(e) = &result {
        tracing::error!("Exited with error: {}", e);
    }
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
