use clap::ValueEnum;
use std::sync::OnceLock;
use tracing::warn;

static API_BASE: OnceLock<String> = OnceLock::new();

/// Symbols shown in the list panel, in display order. The first one is
/// selected on startup.
pub const SYMBOLS: &[&str] = &[
    "AAPL", "GOOGL", "MSFT", "AMZN", "PYPL", "TSLA", "JPM", "NVDA", "NFLX", "DIS",
];

pub const DEFAULT_API_BASE: &str = "https://stocks3.onrender.com";

pub const PROFILE_PATH: &str = "/api/stocks/getstocksprofiledata";
pub const STATS_PATH: &str = "/api/stocks/getstockstatsdata";
pub const CHART_PATH: &str = "/api/stocks/getstocksdata";

/// Upper bound on a single request, including body download.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Number of fetch failures kept for display; older ones are dropped.
pub const MAX_DIAGNOSTICS: usize = 50;

pub const DEFAULT_LOG_FILE: &str = "stockboard.log";

/// What to do with a fetch that completes after a newer request of the same
/// kind was already issued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StalePolicy {
    /// Drop completions older than the latest issued request.
    #[default]
    DiscardStale,
    /// Apply every completion in arrival order.
    LastCompletedWins,
}

pub fn default_symbol() -> &'static str {
    SYMBOLS[0]
}

/// Resolves the API base URL: explicit flag, then `STOCKBOARD_API_BASE`,
/// then the public default. Resolved once per process.
pub fn configured_api_base(flag: Option<&str>) -> &'static str {
    API_BASE.get_or_init(|| resolve_api_base(flag, std::env::var("STOCKBOARD_API_BASE").ok()))
}

fn normalize_base(value: &str) -> Option<String> {
    let value = value.trim().trim_end_matches('/');
    (!value.is_empty()).then(|| value.to_string())
}

fn resolve_api_base(flag: Option<&str>, env_value: Option<String>) -> String {
    // A blank flag counts as unset so the environment still applies.
    let candidate = flag
        .and_then(normalize_base)
        .or_else(|| env_value.as_deref().and_then(normalize_base));

    match candidate {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => url,
        Some(other) => {
            warn!(
                "Ignoring API base {:?}: expected an http(s) URL. Falling back to {}",
                other,
                DEFAULT_API_BASE
            );
            DEFAULT_API_BASE.to_string()
        }
        None => DEFAULT_API_BASE.to_string(),
    }
}
