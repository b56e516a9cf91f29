//! Behavior Tracker CLI
//!
//! Feeds JSON-lines input events through an event batcher and delivers them
//! to an activity API.

use anyhow::Context;
use behavior_tracker::{
    auth::{SessionAuth, UserIdentity},
    client::{ActivityClient, ClientConfig, LogActivityClient},
    config::{Config, TrackingToggles},
    core::{BatcherDeps, EventBatcher, TokioScheduler},
    event::InputEvent,
    source::{ManualSource, StaticLocation},
    PRIVACY_DECLARATION, VERSION,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "behavior-tracker")]
#[command(version = VERSION)]
#[command(about = "Privacy-aware behavior event batcher", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track JSON-lines input events read from stdin
    Run(RunArgs),

    /// Run the local activity sink
    #[cfg(feature = "server")]
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Bearer token clients must present
        #[arg(long)]
        token: String,
    },

    /// Show configuration
    Config {
        /// Write the default configuration if no file exists
        #[arg(long)]
        init: bool,
    },

    /// Display privacy declaration
    Privacy,
}

#[derive(Args)]
struct RunArgs {
    /// Activity API base URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Bearer token for the activity API
    #[arg(long)]
    token: Option<String>,

    /// User to attribute activity to
    #[arg(long)]
    user: Option<String>,

    /// Signals to track (page_views, clicks, mouse, scroll, keyboard, all, none)
    #[arg(long)]
    track: Option<String>,

    /// Queue length that triggers a flush
    #[arg(long)]
    batch_size: Option<usize>,

    /// Flush timer period in milliseconds (0 disables it)
    #[arg(long)]
    flush_interval_ms: Option<u64>,

    /// Throttle window for mouse movement and scrolling in milliseconds
    #[arg(long)]
    throttle_ms: Option<u64>,

    /// Page reported until the first navigation event
    #[arg(long, default_value = "/")]
    start_page: String,

    /// Log activities instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("behavior_tracker=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::config_path);

    match cli.command {
        Commands::Run(args) => cmd_run(&config_path, args).await,
        #[cfg(feature = "server")]
        Commands::Serve { port, token } => cmd_serve(port, token).await,
        Commands::Config { init } => cmd_config(&config_path, init),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
    }
}

async fn cmd_run(config_path: &std::path::Path, args: RunArgs) -> anyhow::Result<()> {
    let mut config = Config::load_from(config_path)
        .with_context(|| format!("Failed to load config from {config_path:?}"))?;

    // Command-line flags override the config file.
    if let Some(endpoint) = args.endpoint {
        config.endpoint.base_url = endpoint;
    }
    if args.token.is_some() {
        config.endpoint.token = args.token;
    }
    if args.user.is_some() {
        config.user_id = args.user;
    }
    if let Some(track) = args.track {
        config.tracker.toggles = TrackingToggles::from_csv(&track);
    }
    if let Some(batch_size) = args.batch_size {
        config.tracker.batch_size = batch_size;
    }
    if let Some(ms) = args.flush_interval_ms {
        config.tracker.flush_interval = std::time::Duration::from_millis(ms);
    }
    if let Some(ms) = args.throttle_ms {
        config.tracker.throttle = std::time::Duration::from_millis(ms);
    }

    let auth = Arc::new(SessionAuth::new());
    match config.user_id {
        Some(ref user_id) => auth.sign_in(UserIdentity::new(user_id.clone())),
        None => tracing::warn!("No user configured; events will be queued but not sent"),
    }

    let client: Arc<dyn ActivityClient> = if args.dry_run {
        Arc::new(LogActivityClient::new())
    } else {
        http_client(&config.endpoint).await?
    };

    let source = Arc::new(ManualSource::new());
    let location = Arc::new(StaticLocation::new(args.start_page));
    let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));

    let toggles = config.tracker.toggles;
    let batcher = EventBatcher::new(
        config.tracker,
        BatcherDeps {
            client,
            auth,
            source: source.clone(),
            location: location.clone(),
            scheduler,
        },
    )?;

    tracing::info!(
        page_views = toggles.page_views,
        clicks = toggles.clicks,
        mouse = toggles.mouse_movement,
        scroll = toggles.scrolling,
        keyboard = toggles.keyboard,
        "Tracking started; reading events from stdin (Ctrl+C to stop)"
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => handle_line(&line, &batcher, &source, &location).await,
                    None => break,
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    println!("Flushing {} pending events...", batcher.queue_len());
    batcher.flush_events().await;
    batcher.shutdown();

    println!();
    println!("{}", batcher.stats_handle().summary());
    Ok(())
}

/// Handle one stdin line: an `InputEvent` as JSON, or the word `flush`.
async fn handle_line(
    line: &str,
    batcher: &EventBatcher,
    source: &ManualSource,
    location: &StaticLocation,
) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }
    if line == "flush" {
        batcher.flush_events().await;
        return;
    }

    match serde_json::from_str::<InputEvent>(line) {
        Ok(event) => {
            if let InputEvent::Navigation { ref path } = event {
                location.set(path.clone());
            }
            source.dispatch(&event);
        }
        Err(e) => tracing::warn!(error = %e, "Ignoring malformed input event"),
    }
}

#[cfg(feature = "http")]
async fn http_client(config: &ClientConfig) -> anyhow::Result<Arc<dyn ActivityClient>> {
    let client = behavior_tracker::HttpActivityClient::new(config.clone())?;
    tracing::info!(
        endpoint = %config.base_url,
        client_id = client.client_id(),
        "Delivering to activity API"
    );

    match client.test_connection().await {
        Ok(true) => tracing::info!("Activity API connection: OK"),
        Ok(false) => tracing::warn!("Activity API health check failed"),
        Err(e) => tracing::warn!(error = %e, "Could not reach activity API"),
    }
    if config.token.is_none() {
        tracing::warn!("No API token configured; deliveries will fail");
    }

    Ok(Arc::new(client))
}

#[cfg(not(feature = "http"))]
async fn http_client(_config: &ClientConfig) -> anyhow::Result<Arc<dyn ActivityClient>> {
    anyhow::bail!("built without the `http` feature; use --dry-run")
}

#[cfg(feature = "server")]
async fn cmd_serve(port: u16, token: String) -> anyhow::Result<()> {
    use behavior_tracker::server::{run, ServerConfig};

    let (addr, shutdown_tx) = run(ServerConfig::new(port, token)).await?;
    println!("Activity sink listening on http://{addr}");
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    let _ = shutdown_tx.send(());
    Ok(())
}

fn cmd_config(config_path: &std::path::Path, init: bool) -> anyhow::Result<()> {
    if init && !config_path.exists() {
        Config::default().save_to(config_path)?;
        println!("Wrote default configuration.");
    }

    let config = Config::load_from(config_path)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
