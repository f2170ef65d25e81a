mod app;
mod clipboard;
mod handler;
mod logging;
mod tui;
mod ui;

use anyhow::Result;
use matadorbets_core::{
    BlobStore, ChatController, Config, FileBlobStore, GeminiSession, HistoryStore, MemoryBlobStore,
};
use tracing::{info, warn};

use crate::app::App;

#[tokio::main]
async fn main() -> Result<()> {
    let data_dir = Config::get_data_dir();

    // Logging is best effort; the app runs without it
    let _log_guard = match &data_dir {
        Ok(dir) => logging::init(dir)
            .inspect_err(|e| eprintln!("matadorbets: logging disabled: {e:#}"))
            .ok(),
        Err(_) => None,
    };
    info!(version = env!("CARGO_PKG_VERSION"), "starting matadorbets");

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        Config::new()
    });

    let session = match GeminiSession::connect(&config) {
        Ok(session) => {
            info!(model = session.model(), "model session ready");
            Some(session)
        }
        Err(e) => {
            warn!(error = %e, "no model session");
            None
        }
    };

    let store: Box<dyn BlobStore + Send> = match &data_dir {
        Ok(dir) => Box::new(FileBlobStore::new(dir.clone())),
        Err(e) => {
            warn!(error = %e, "no data directory, history will not survive a restart");
            Box::new(MemoryBlobStore::new())
        }
    };
    let history = HistoryStore::load(store);

    let mut chat = ChatController::new();
    chat.ensure_setup_notice(session.is_some());

    let mut app = App::new(chat, history, session, config.share_url.clone());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    info!("bye");
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
