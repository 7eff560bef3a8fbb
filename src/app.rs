use crate::config::{self, StalePolicy, MAX_DIAGNOSTICS};
use crate::data::{ChartSeries, FetchError, StatsTable, StockApi, StockProfile, TimeRange};
use crate::view::{self, ChartSubject, ViewState};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use serde::Serialize;
use std::collections::VecDeque;
use std::io;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Process-wide selection state.
#[derive(Clone, Debug)]
pub struct AppState {
    selected_symbol: String,
    time_range: TimeRange,
    stats: StatsTable,
}

impl AppState {
    pub fn new(selected_symbol: impl Into<String>, time_range: TimeRange) -> Self {
        Self {
            selected_symbol: selected_symbol.into(),
            time_range,
            stats: StatsTable::new(),
        }
    }

    pub fn selected_symbol(&self) -> &str {
        &self.selected_symbol
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn stats(&self) -> &StatsTable {
        &self.stats
    }

    fn set_selected_symbol(&mut self, symbol: &str) {
        self.selected_symbol = symbol.to_string();
    }

    fn set_time_range(&mut self, range: TimeRange) {
        self.time_range = range;
    }

    fn replace_stats(&mut self, stats: StatsTable) {
        self.stats = stats;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchKind {
    Stats,
    Profile,
    Chart,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchRequest {
    Stats {
        generation: u64,
    },
    Profile {
        symbol: String,
        generation: u64,
    },
    Chart {
        symbol: String,
        range: TimeRange,
        generation: u64,
    },
}

#[derive(Debug)]
pub enum FetchOutcome {
    Stats {
        generation: u64,
        result: Result<StatsTable, FetchError>,
    },
    Profile {
        symbol: String,
        generation: u64,
        result: Result<Option<StockProfile>, FetchError>,
    },
    Chart {
        symbol: String,
        range: TimeRange,
        generation: u64,
        result: Result<ChartSeries, FetchError>,
    },
}

impl FetchOutcome {
    fn kind(&self) -> FetchKind {
        match self {
            FetchOutcome::Stats { .. } => FetchKind::Stats,
            FetchOutcome::Profile { .. } => FetchKind::Profile,
            FetchOutcome::Chart { .. } => FetchKind::Chart,
        }
    }

    fn generation(&self) -> u64 {
        match self {
            FetchOutcome::Stats { generation, .. }
            | FetchOutcome::Profile { generation, .. }
            | FetchOutcome::Chart { generation, .. } => *generation,
        }
    }

    /// Log line for a failed fetch, `None` on success.
    fn failure_message(&self) -> Option<String> {
        match self {
            FetchOutcome::Stats { result: Err(e), .. } => {
                Some(format!("Error fetching stats data: {}", e))
            }
            FetchOutcome::Profile {
                symbol,
                result: Err(e),
                ..
            } => Some(format!("Error fetching profile data for {}: {}", symbol, e)),
            FetchOutcome::Chart {
                symbol,
                range,
                result: Err(e),
                ..
            } => Some(format!(
                "Error fetching chart data for {} ({}): {}",
                symbol, range, e
            )),
            _ => None,
        }
    }
}

/// Latest generation issued per fetch kind.
#[derive(Clone, Copy, Debug, Default)]
struct Generations {
    stats: u64,
    profile: u64,
    chart: u64,
}

impl Generations {
    fn slot(&mut self, kind: FetchKind) -> &mut u64 {
        match kind {
            FetchKind::Stats => &mut self.stats,
            FetchKind::Profile => &mut self.profile,
            FetchKind::Chart => &mut self.chart,
        }
    }

    fn next(&mut self, kind: FetchKind) -> u64 {
        let slot = self.slot(kind);
        *slot += 1;
        *slot
    }

    fn latest(&mut self, kind: FetchKind) -> u64 {
        *self.slot(kind)
    }
}

#[derive(Clone, Debug)]
pub struct DashboardSettings {
    pub symbols: &'static [&'static str],
    pub initial_symbol: String,
    pub initial_range: TimeRange,
    pub stale_policy: StalePolicy,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            symbols: config::SYMBOLS,
            initial_symbol: config::default_symbol().to_string(),
            initial_range: TimeRange::default(),
            stale_policy: StalePolicy::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DashboardSnapshot {
    pub selected_symbol: String,
    pub time_range: TimeRange,
    pub view: ViewState,
    pub diagnostics: Vec<String>,
}

/// Owns application state and the view model. Issues fetch requests over a
/// channel and applies their outcomes; it never performs I/O itself.
pub struct Dashboard {
    symbols: &'static [&'static str],
    state: AppState,
    view: ViewState,
    policy: StalePolicy,
    generations: Generations,
    requests: mpsc::UnboundedSender<FetchRequest>,
    diagnostics: VecDeque<String>,
}

impl Dashboard {
    pub fn new(settings: DashboardSettings, requests: mpsc::UnboundedSender<FetchRequest>) -> Self {
        Self {
            symbols: settings.symbols,
            state: AppState::new(settings.initial_symbol, settings.initial_range),
            view: ViewState::default(),
            policy: settings.stale_policy,
            generations: Generations::default(),
            requests,
            diagnostics: VecDeque::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn symbols(&self) -> &'static [&'static str] {
        self.symbols
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &str> {
        self.diagnostics.iter().map(String::as_str)
    }

    pub fn latest_diagnostic(&self) -> Option<&str> {
        self.diagnostics.back().map(String::as_str)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            selected_symbol: self.state.selected_symbol.clone(),
            time_range: self.state.time_range,
            view: self.view.clone(),
            diagnostics: self.diagnostics().map(str::to_string).collect(),
        }
    }

    /// Initial load: stats, bare list, empty chart, then the default symbol.
    pub fn start(&mut self) {
        info!(
            "Starting dashboard with {} symbols, selected={}, range={}",
            self.symbols.len(),
            self.state.selected_symbol,
            self.state.time_range
        );
        self.refresh_stats();
        self.populate_list();
        self.view.chart = Default::default();
        self.view.chart_subject = None;
        let symbol = self.state.selected_symbol.clone();
        self.request_profile(&symbol);
        self.request_chart(&symbol, self.state.time_range);
    }

    pub fn populate_list(&mut self) {
        self.view.list = view::populate_list(self.symbols);
    }

    pub fn refresh_stats(&mut self) {
        let generation = self.generations.next(FetchKind::Stats);
        self.send(FetchRequest::Stats { generation });
    }

    pub fn select_symbol(&mut self, symbol: &str) {
        debug!("Selected {}", symbol);
        self.state.set_selected_symbol(symbol);
        self.request_profile(symbol);
        self.request_chart(symbol, self.state.time_range);
    }

    /// Switches the chart range by button label (`1month`, `3months`,
    /// `1year`, `5years`). Unknown labels are reported and change nothing.
    pub fn change_range(&mut self, label: &str) -> Option<TimeRange> {
        let Some(range) = TimeRange::from_label(label) else {
            self.record_diagnostic(format!("Unknown time range label: {:?}", label));
            return None;
        };
        self.state.set_time_range(range);
        let symbol = self.state.selected_symbol.clone();
        self.request_chart(&symbol, range);
        Some(range)
    }

    fn request_profile(&mut self, symbol: &str) {
        let generation = self.generations.next(FetchKind::Profile);
        self.send(FetchRequest::Profile {
            symbol: symbol.to_string(),
            generation,
        });
    }

    fn request_chart(&mut self, symbol: &str, range: TimeRange) {
        let generation = self.generations.next(FetchKind::Chart);
        self.send(FetchRequest::Chart {
            symbol: symbol.to_string(),
            range,
            generation,
        });
    }

    fn send(&mut self, request: FetchRequest) {
        if let Err(e) = self.requests.send(request) {
            self.record_diagnostic(format!("Fetcher is gone, dropping {:?}", e.0));
        }
    }

    fn record_diagnostic(&mut self, message: String) {
        error!("{}", message);
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(message);
    }

    fn is_stale(&mut self, outcome: &FetchOutcome) -> bool {
        self.policy == StalePolicy::DiscardStale
            && outcome.generation() < self.generations.latest(outcome.kind())
    }

    /// Renders a completed fetch, or records its failure. Failures leave the
    /// view exactly as it was.
    pub fn apply(&mut self, outcome: FetchOutcome) {
        if self.is_stale(&outcome) {
            // Superseded failures are still logged, just not shown.
            match outcome.failure_message() {
                Some(message) => warn!(
                    "Discarding stale {:?} completion (generation {}): {}",
                    outcome.kind(),
                    outcome.generation(),
                    message
                ),
                None => debug!(
                    "Discarding stale {:?} completion (generation {})",
                    outcome.kind(),
                    outcome.generation()
                ),
            }
            return;
        }

        if let Some(message) = outcome.failure_message() {
            self.record_diagnostic(message);
            return;
        }

        match outcome {
            FetchOutcome::Stats { result: Ok(stats), .. } => {
                info!("Loaded stats for {} symbols", stats.len());
                self.state.replace_stats(stats);
                view::update_list_with_stats(&mut self.view.list, &self.state.stats);
            }
            FetchOutcome::Profile {
                symbol,
                result: Ok(profile),
                ..
            } => {
                if profile.is_none() {
                    warn!("No profile entry for {}", symbol);
                }
                self.view.detail = Some(view::update_details(
                    &symbol,
                    profile.as_ref(),
                    self.state.stats.get(&symbol),
                ));
            }
            FetchOutcome::Chart {
                symbol,
                range,
                result: Ok(series),
                ..
            } => {
                let points = series.prices.len();
                view::update_chart(&mut self.view.chart, series.labels, series.prices);
                debug!(
                    "Chart {} {}: {} points (revision {})",
                    symbol,
                    range,
                    points,
                    self.view.chart.revision()
                );
                self.view.chart_subject = Some(ChartSubject { symbol, range });
            }
            _ => {}
        }
    }
}

/// Runs every request as its own task and reports back on `outcomes`.
/// Nothing is queued, de-duplicated or cancelled.
pub fn spawn_fetcher(
    api: StockApi,
    mut requests: mpsc::UnboundedReceiver<FetchRequest>,
    outcomes: mpsc::UnboundedSender<FetchOutcome>,
) {
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let api = api.clone();
            let outcomes = outcomes.clone();
            tokio::spawn(async move {
                let outcome = run_request(&api, request).await;
                if outcomes.send(outcome).is_err() {
                    debug!("Dashboard closed before fetch completed");
                }
            });
        }
        debug!("Fetcher request channel closed");
    });
}

async fn run_request(api: &StockApi, request: FetchRequest) -> FetchOutcome {
    match request {
        FetchRequest::Stats { generation } => FetchOutcome::Stats {
            generation,
            result: api.fetch_stats().await,
        },
        FetchRequest::Profile { symbol, generation } => {
            let result = api.fetch_profile(&symbol).await;
            FetchOutcome::Profile {
                symbol,
                generation,
                result,
            }
        }
        FetchRequest::Chart {
            symbol,
            range,
            generation,
        } => {
            let result = api.fetch_chart(&symbol, range).await;
            FetchOutcome::Chart {
                symbol,
                range,
                generation,
                result,
            }
        }
    }
}

/// Wires a dashboard to a live fetcher. Must be called inside a tokio runtime.
pub fn connect(
    api: StockApi,
    settings: DashboardSettings,
) -> (Dashboard, mpsc::UnboundedReceiver<FetchOutcome>) {
    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    spawn_fetcher(api, request_rx, outcome_tx);
    (Dashboard::new(settings, request_tx), outcome_rx)
}

/// Keyboard labels for the range buttons, in key order `1`..`4`.
const RANGE_KEYS: [(char, &str); 4] = [
    ('1', "1month"),
    ('2', "3months"),
    ('3', "1year"),
    ('4', "5years"),
];

pub struct App {
    pub should_quit: bool,
    pub cursor: usize,
    pub dashboard: Dashboard,
    outcomes: mpsc::UnboundedReceiver<FetchOutcome>,
}

impl App {
    pub fn new(dashboard: Dashboard, outcomes: mpsc::UnboundedReceiver<FetchOutcome>) -> Self {
        let cursor = dashboard
            .symbols()
            .iter()
            .position(|s| *s == dashboard.state().selected_symbol())
            .unwrap_or(0);
        Self {
            should_quit: false,
            cursor,
            dashboard,
            outcomes,
        }
    }

    /// Applies every completion that has arrived so far.
    pub fn drain_outcomes(&mut self) {
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.dashboard.apply(outcome);
        }
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        let len = self.dashboard.symbols().len();
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if len > 0 {
                    self.cursor = (self.cursor + 1).min(len - 1);
                }
            }
            KeyCode::Enter => {
                if let Some(symbol) = self.dashboard.symbols().get(self.cursor) {
                    self.dashboard.select_symbol(symbol);
                }
            }
            KeyCode::Char('r') => self.dashboard.refresh_stats(),
            KeyCode::Char(c) => {
                if let Some((_, label)) = RANGE_KEYS.iter().find(|(key, _)| *key == c) {
                    self.dashboard.change_range(label);
                }
            }
            _ => {}
        }
    }

    pub async fn run(&mut self, terminal: &mut crate::tui::Tui) -> io::Result<()> {
        self.dashboard.start();

        while !self.should_quit {
            self.drain_outcomes();
            terminal.draw(|f| crate::ui::render(f, self))?;

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        Ok(())
    }
}
