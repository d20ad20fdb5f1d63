mod app;
mod charts;
mod client;
mod config;
mod render;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use client::{StockClient, StockForm};
use config::AppConfig;
use render::Region;

#[derive(Parser, Debug)]
#[command(name = "tickerpane")]
#[command(author = "Sean Fournier")]
#[command(version = "0.1.0")]
#[command(about = "A terminal client for stock statistics and chart endpoints")]
struct Args {
    /// Fetch one symbol, print the result and exit
    #[arg(short, long)]
    symbol: Option<String>,

    /// Render a saved JSON response instead of contacting the server
    #[arg(long, value_name = "FILE", conflicts_with = "symbol")]
    payload: Option<PathBuf>,

    /// Print the result as an HTML fragment (with --symbol or --payload)
    #[arg(long)]
    html: bool,

    /// Save embedded charts to this directory (with --symbol)
    #[arg(long, value_name = "DIR", requires = "symbol")]
    save_charts: Option<PathBuf>,

    /// Base URL of the stock data server, overriding the config file
    #[arg(short, long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = AppConfig::load().unwrap_or_default();
    if let Some(endpoint) = args.endpoint.clone() {
        config.endpoint = endpoint;
    }

    // Handle CLI-only commands
    if let Some(symbol) = args.symbol.as_deref() {
        init_logging(None);
        return run_once(&config, symbol, args.html, args.save_charts.as_deref()).await;
    }

    if let Some(path) = args.payload.as_deref() {
        init_logging(None);
        return run_payload(path, args.html);
    }

    let log_path = AppConfig::config_dir()?.join("tickerpane.log");
    init_logging(Some(log_path.as_path()));
    run_tui(config).await?;
    Ok(ExitCode::SUCCESS)
}

/// Where log lines go
#[derive(Debug)]
enum LogTarget {
    Stderr,
    File(std::fs::File),
    Discard,
}

/// Log to stderr, or to `log_file` when the terminal belongs to the TUI.
/// A TUI log file that cannot be opened discards logs rather than drawing
/// them over the alternate screen.
fn log_target(log_file: Option<&Path>) -> LogTarget {
    let Some(path) = log_file else {
        return LogTarget::Stderr;
    };
    match std::fs::File::create(path) {
        Ok(file) => LogTarget::File(file),
        Err(e) => {
            eprintln!("Could not open log file {}: {}", path.display(), e);
            LogTarget::Discard
        }
    }
}

fn init_logging(log_file: Option<&Path>) {
    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::from_default_env());
    match log_target(log_file) {
        LogTarget::Stderr => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init(),
        LogTarget::File(file) => registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .init(),
        LogTarget::Discard => registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::sink))
            .init(),
    }
}

async fn run_once(
    config: &AppConfig,
    symbol: &str,
    html: bool,
    save_dir: Option<&Path>,
) -> Result<ExitCode> {
    let client = StockClient::new(&config.endpoint, config.timeout())
        .context("Failed to build HTTP client")?;
    let form = StockForm::new(symbol);

    let outcome = client.submit(&form).await;
    let mut region = Region::new();
    render::render_outcome(&mut region, &outcome);

    print_region(&region, html);

    let succeeded = matches!(&outcome, Ok(result) if result.is_success());

    if let (true, Some(dir)) = (succeeded, save_dir) {
        let written = charts::save_charts(&region, dir, &form.symbol)
            .with_context(|| format!("Failed to save charts to {}", dir.display()))?;
        for path in written {
            eprintln!("Saved {}", path.display());
        }
    }

    Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Render a response body saved to disk
fn run_payload(path: &Path, html: bool) -> Result<ExitCode> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut region = Region::new();
    let rendered = match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(payload) => render::render_payload(&mut region, &payload),
        Err(e) => {
            tracing::warn!("{} is not JSON: {}", path.display(), e);
            render::render_outcome(
                &mut region,
                &Err(client::ClientError::InvalidResponse(e.to_string())),
            );
            print_region(&region, html);
            return Ok(ExitCode::FAILURE);
        }
    };

    print_region(&region, html);

    match rendered {
        Ok(()) if region.error().is_none() => Ok(ExitCode::SUCCESS),
        Ok(()) => Ok(ExitCode::FAILURE),
        Err(e) => {
            tracing::warn!("{}: {}", path.display(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_region(region: &Region, html: bool) {
    if html {
        print!("{}", region.to_html());
    } else {
        for line in region.to_text() {
            println!("{}", line);
        }
    }
}

async fn run_tui(config: AppConfig) -> Result<()> {
    ui::init_theme(&config.theme);

    // Create app state before touching the terminal so errors print normally
    let mut app = App::new(config)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if app::is_quit_key(&key) {
                        return Ok(());
                    }
                    // Handle key and catch any errors to prevent crashes
                    if let Err(e) = app.handle_key(key).await {
                        app.status_message = Some(format!("Error: {}", e));
                        app.status_message_time = Some(std::time::Instant::now());
                    }
                }
            }
        }

        // Drain finished submissions
        app.tick().await?;
    }
}

fn notify(summary: &str, body: &str) -> Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .icon("office-chart-line")
        .show()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_target_without_file_is_stderr() {
        assert!(matches!(log_target(None), LogTarget::Stderr));
    }

    #[test]
    fn test_log_target_opens_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickerpane.log");
        assert!(matches!(log_target(Some(path.as_path())), LogTarget::File(_)));
        assert!(path.exists());
    }

    #[test]
    fn test_unopenable_log_file_discards_instead_of_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("tickerpane.log");
        assert!(matches!(log_target(Some(path.as_path())), LogTarget::Discard));
    }
}
