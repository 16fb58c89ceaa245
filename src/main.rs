use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod chat;
mod client;
mod config;
mod handler;
mod state;
mod tui;
mod ui;

use app::App;
use client::QueryClient;
use config::{Config, SERVER_URL_ENV};
use tui::{EventHandler, Tui, TICK_RATE};

#[derive(Parser)]
#[command(name = "answer-agent", version)]
#[command(about = "Chat with an Answer Agent backend from the terminal")]
struct Cli {
    /// Backend base URL [default: http://localhost:8000]
    #[arg(short, long)]
    url: Option<String>,

    /// Request timeout in seconds (no timeout by default)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Where to write logs
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Store --url and --timeout in the config file before starting
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (file_config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(err) => (Config::new(), Some(err)),
    };

    if cli.save_config {
        let mut saved = file_config.clone();
        if cli.url.is_some() {
            saved.server_url = cli.url.clone();
        }
        if cli.timeout.is_some() {
            saved.request_timeout_secs = cli.timeout;
        }
        saved.save()?;
    }

    let config = file_config.with_overrides(
        std::env::var(SERVER_URL_ENV).ok(),
        cli.url,
        cli.timeout,
        cli.log_file,
    );

    init_logging(&config.log_file()?)?;
    if let Some(err) = load_error {
        warn!(error = %err, "ignoring unreadable config file");
    }

    let client = QueryClient::new(config.server_url(), config.request_timeout())?;
    info!(endpoint = %config.server_url(), timeout = ?config.request_timeout(), "starting");
    let mut app = App::new(Arc::new(client));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    info!(turns = app.session.conversation().len(), "exiting");
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(app, event),
                None => break,
            },
            outcome = app.session.wait_outcome() => app.finish_query(outcome),
        }
    }

    Ok(())
}

/// Log to a file; stderr belongs to the terminal UI
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "answer_agent=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .try_init()?;

    Ok(())
}
