use crate::chart::PriceChart;
use crate::data::{StatsTable, StockProfile, StockStats, TimeRange};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    /// Symbol this row stands for; never parsed back out of `text`.
    pub symbol: String,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProfitClass {
    #[serde(rename = "profit-positive")]
    Positive,
    /// Zero, negative and unknown profit all land here.
    #[serde(rename = "profit-negative")]
    NonPositive,
}

impl ProfitClass {
    pub fn from_profit(profit: Option<f64>) -> Self {
        match profit {
            Some(p) if p > 0.0 => ProfitClass::Positive,
            _ => ProfitClass::NonPositive,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailPanel {
    pub symbol: String,
    pub summary: String,
    pub book_value: String,
    pub profit: String,
    pub profit_class: ProfitClass,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChartSubject {
    pub symbol: String,
    pub range: TimeRange,
}

/// Everything the front ends draw. Each part is replaced wholesale by the
/// functions below.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ViewState {
    pub list: Vec<ListEntry>,
    pub detail: Option<DetailPanel>,
    pub chart: PriceChart,
    pub chart_subject: Option<ChartSubject>,
}

pub fn format_profit(profit: Option<f64>) -> String {
    match profit {
        Some(p) => format!("{:.2}%", p * 100.0),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_book_value(book_value: Option<f64>) -> String {
    match book_value {
        Some(v) => v.to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// One bare entry per symbol, in registry order.
pub fn populate_list(symbols: &[&str]) -> Vec<ListEntry> {
    symbols
        .iter()
        .map(|symbol| ListEntry {
            symbol: symbol.to_string(),
            text: symbol.to_string(),
        })
        .collect()
}

pub fn update_list_with_stats(list: &mut [ListEntry], stats: &StatsTable) {
    for entry in list.iter_mut() {
        let stats = stats.get(&entry.symbol).cloned().unwrap_or_default();
        entry.text = format!(
            "{} - Book Value: {}, Profit: {}",
            entry.symbol,
            format_book_value(stats.book_value),
            format_profit(stats.profit)
        );
    }
}

pub fn update_details(
    symbol: &str,
    profile: Option<&StockProfile>,
    stats: Option<&StockStats>,
) -> DetailPanel {
    let summary = profile
        .and_then(|p| p.summary.clone())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let stats = stats.cloned().unwrap_or_default();

    DetailPanel {
        symbol: symbol.to_string(),
        summary,
        book_value: format_book_value(stats.book_value),
        profit: format_profit(stats.profit),
        profit_class: ProfitClass::from_profit(stats.profit),
    }
}

pub fn update_chart(chart: &mut PriceChart, labels: Vec<DateTime<Utc>>, prices: Vec<f64>) {
    chart.replace_data(labels, prices);
}
