use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod app;
mod azure;
mod handler;
mod provider;
mod session;
mod settings;
mod transcript;
mod tui;
mod ui;

use app::App;
use azure::AzureClient;
use provider::{CompletionProvider, MockProvider};
use session::SendOutcome;
use settings::Settings;
use tui::{EventHandler, Tui};

#[derive(Parser, Debug)]
#[command(name = "azchat")]
#[command(version, about = "Terminal chat for Azure OpenAI deployments")]
struct Cli {
    /// Azure OpenAI endpoint URL (falls back to AZURE_OPENAI_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// API key for the endpoint (falls back to AZURE_OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Deployment name to chat with
    #[arg(long, default_value = "gpt-35-turbo")]
    deployment: String,

    /// Azure OpenAI REST API version
    #[arg(long, default_value = "2024-04-01-preview")]
    api_version: String,

    /// Reply with a canned message instead of calling Azure OpenAI
    #[arg(long)]
    mock: bool,

    /// Log at debug level instead of info
    #[arg(short, long)]
    verbose: bool,

    /// Log file location (defaults to the local data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Settings at startup: command line flags win, then environment
/// variables, then the built-in placeholders.
fn initial_settings(cli: &Cli) -> Settings {
    let defaults = Settings::default();

    let api_url = cli
        .endpoint
        .clone()
        .or_else(|| std::env::var("AZURE_OPENAI_ENDPOINT").ok())
        .unwrap_or(defaults.api_url);
    let api_key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var("AZURE_OPENAI_API_KEY").ok())
        .unwrap_or(defaults.api_key);

    Settings {
        api_url,
        api_key,
        deployment: cli.deployment.clone(),
        api_version: cli.api_version.clone(),
    }
}

fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("azchat")
        .join("azchat.log")
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("failed to create log file {}", path.display()))
}

/// Logs go to a file because the terminal belongs to the UI.
fn init_tracing(verbose: bool, log_file: Option<PathBuf>) -> Result<PathBuf> {
    let path = log_file.unwrap_or_else(default_log_path);
    let file = open_log_file(&path)?;

    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = init_tracing(cli.verbose, cli.log_file.clone())?;
    let settings = initial_settings(&cli);

    let provider: Arc<dyn CompletionProvider> = if cli.mock {
        Arc::new(MockProvider::new())
    } else {
        Arc::new(AzureClient::new())
    };

    tracing::info!(
        "azchat v{} starting (deployment {}, log {})",
        env!("CARGO_PKG_VERSION"),
        settings.deployment,
        log_path.display()
    );

    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
    let mut app = App::new(settings, provider, outcome_tx);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let result = run(&mut terminal, &mut app, &mut events, &mut outcome_rx).await;

    tui::restore()?;
    tracing::info!("azchat exiting");
    result
}

async fn run(
    terminal: &mut Tui,
    app: &mut App,
    events: &mut EventHandler,
    outcomes: &mut mpsc::UnboundedReceiver<SendOutcome>,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event)?,
            Some(outcome) = outcomes.recv() => app.apply_send_outcome(outcome),
            else => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_connection_flags() {
        let cli = Cli::try_parse_from([
            "azchat",
            "--endpoint",
            "https://example.openai.azure.com",
            "--api-key",
            "secret",
            "--deployment",
            "gpt-4o",
            "--api-version",
            "2024-06-01",
            "--mock",
            "--verbose",
        ])
        .unwrap();

        assert_eq!(
            cli.endpoint.as_deref(),
            Some("https://example.openai.azure.com")
        );
        assert_eq!(cli.api_key.as_deref(), Some("secret"));
        assert_eq!(cli.deployment, "gpt-4o");
        assert_eq!(cli.api_version, "2024-06-01");
        assert!(cli.mock);
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["azchat"]).unwrap();

        assert!(cli.endpoint.is_none());
        assert!(cli.api_key.is_none());
        assert_eq!(cli.deployment, "gpt-35-turbo");
        assert_eq!(cli.api_version, "2024-04-01-preview");
        assert!(!cli.mock);
        assert!(!cli.verbose);
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn test_initial_settings_precedence() {
        let cli = Cli::try_parse_from(["azchat", "--endpoint", "https://flag.example"]).unwrap();
        std::env::set_var("AZURE_OPENAI_ENDPOINT", "https://env.example");
        std::env::set_var("AZURE_OPENAI_API_KEY", "env-key");

        let settings = initial_settings(&cli);
        assert_eq!(settings.api_url, "https://flag.example");
        assert_eq!(settings.api_key, "env-key");

        std::env::remove_var("AZURE_OPENAI_ENDPOINT");
        std::env::remove_var("AZURE_OPENAI_API_KEY");

        let bare = Cli::try_parse_from(["azchat"]).unwrap();
        let settings = initial_settings(&bare);
        assert_eq!(settings.api_url, "Azure OpenAI Endpoint");
        assert_eq!(settings.api_key, "Azure OpenAI Key");
    }

    #[test]
    fn test_open_log_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("azchat.log");

        assert!(open_log_file(&path).is_ok());
        assert!(path.exists());
    }
}
