use std::{io, sync::Arc};

use attendance::{
    api::HttpApi,
    config::Config,
    logging,
    session::{AttendanceSession, Notifier},
    ui::{run_app, App},
};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    let _guard = logging::init(&config.log_file);
    info!("Using attendance service at {}", config.api_url);

    let api = Arc::new(HttpApi::new(&config.api_url));
    let mut session = AttendanceSession::new();
    // A failed load is logged; the table starts empty until `r`.
    let _ = session.load(api.as_ref()).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (notifier, outcomes) = Notifier::channel();
    let (loads_tx, loads) = mpsc::unbounded_channel();
    let mut app = App::new(session, api, config.date, notifier, loads_tx);

    let result = run_app(&mut terminal, &mut app, outcomes, loads).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        error!("{err}");
        eprintln!("{err}");
    }
    Ok(())
}
