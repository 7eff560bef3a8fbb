mod app;
mod chart;
mod config;
mod data;
mod tui;
mod ui;
mod view;
mod webui;

use anyhow::Context;
use app::{App, DashboardSettings};
use clap::Parser;
use config::StalePolicy;
use data::{StockApi, TimeRange};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn parse_range(value: &str) -> Result<TimeRange, String> {
    TimeRange::from_code(value)
        .or_else(|| TimeRange::from_label(value))
        .ok_or_else(|| format!("unknown range {:?} (use 1mo, 3mo, 1y, 5y)", value))
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stockboard-TUI: terminal dashboard for stock profiles, stats and price history",
    after_help = "EXAMPLES:
    # Browse the default symbols
    cargo run --release

    # Start on NVDA with a one year chart
    cargo run --release -- --symbol NVDA --range 1y

    # Point at a local API and serve the dashboard over HTTP
    cargo run --release -- --api-base http://localhost:3000 --webui"
)]
struct Args {
    /// Base URL of the stock API (overrides STOCKBOARD_API_BASE)
    #[arg(long)]
    api_base: Option<String>,

    /// Symbol selected on startup (default: first symbol in the list)
    #[arg(long)]
    symbol: Option<String>,

    /// Initial chart range: 1mo, 3mo, 1y or 5y
    #[arg(long, default_value = "1mo", value_parser = parse_range)]
    range: TimeRange,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// How to treat fetches that complete after a newer request of the same kind
    #[arg(long, value_enum, default_value_t = StalePolicy::DiscardStale)]
    stale_policy: StalePolicy,

    /// Serve the dashboard state over HTTP instead of drawing it in the terminal
    #[arg(long)]
    webui: bool,

    /// WebUI server port
    #[arg(long, default_value_t = 8080)]
    webui_port: u16,

    /// Log file used in terminal mode
    #[arg(long, default_value = config::DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stockboard_tui=info"));

    if args.webui {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    } else {
        // Stdout belongs to the terminal UI.
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&args.log_file)
            .with_context(|| format!("cannot open log file {}", args.log_file.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args)?;

    let api_base = config::configured_api_base(args.api_base.as_deref());
    let api = StockApi::new(api_base, Duration::from_secs(args.timeout_secs))?;
    info!("Using stock API at {}", api.base_url());

    let settings = DashboardSettings {
        initial_symbol: args
            .symbol
            .as_deref()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| config::default_symbol().to_string()),
        initial_range: args.range,
        stale_policy: args.stale_policy,
        ..DashboardSettings::default()
    };

    if args.webui {
        match webui::run_webui_server(args.webui_port, api, settings).await {
            Ok(_) => info!("WebUI exited."),
            Err(e) => error!("WebUI failed: {}", e),
        }
        return Ok(());
    }

    let (dashboard, outcomes) = app::connect(api, settings);
    let mut terminal = tui::init()?;
    let mut app = App::new(dashboard, outcomes);
    let res = app.run(&mut terminal).await;

    tui::restore()?;

    if let Err(e) = res {
        error!("Error: {:?}", e);
    }

    Ok(())
}
