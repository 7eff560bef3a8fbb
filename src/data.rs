use crate::config::{CHART_PATH, PROFILE_PATH, STATS_PATH};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a single fetch. Every variant is handled the same way by the
/// dashboard: logged once, nothing rendered.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected data format: missing or invalid `{field}`")]
    MalformedEnvelope { field: String },
    #[error("stock data not found for the specified range and symbol: {symbol}, range: {range}")]
    MissingEntry { symbol: String, range: String },
}

/// Chart history window. `from_label` accepts the names used by the range
/// buttons, `from_code` the codes the API understands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "5y")]
    FiveYears,
}

impl TimeRange {
    pub const ALL: [TimeRange; 4] = [
        TimeRange::OneMonth,
        TimeRange::ThreeMonths,
        TimeRange::OneYear,
        TimeRange::FiveYears,
    ];

    pub fn as_code(self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::OneYear => "1y",
            Self::FiveYears => "5y",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OneMonth => "1month",
            Self::ThreeMonths => "3months",
            Self::OneYear => "1year",
            Self::FiveYears => "5years",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.label() == label)
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_code() == code)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct StockStats {
    #[serde(rename = "bookValue", default)]
    pub book_value: Option<f64>,
    /// Fraction, not percent: `0.25` means 25%.
    #[serde(default)]
    pub profit: Option<f64>,
}

pub type StatsTable = HashMap<String, StockStats>;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct StockProfile {
    #[serde(default)]
    pub summary: Option<String>,
}

/// Price history for one (symbol, range), as parallel label/price sequences.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChartSeries {
    pub labels: Vec<DateTime<Utc>>,
    pub prices: Vec<f64>,
}

/// Both arrays are required; a range entry without them is malformed.
#[derive(Deserialize)]
struct RawRangeSeries {
    value: Vec<Option<f64>>,
    /// Epoch seconds. Any JSON number is accepted; fractions are truncated.
    #[serde(rename = "timeStamp")]
    time_stamp: Vec<f64>,
}

/// Thin client over the three stock endpoints.
#[derive(Clone, Debug)]
pub struct StockApi {
    client: reqwest::Client,
    base_url: String,
}

impl StockApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stockboard-tui/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                FetchError::MalformedEnvelope { field: "body".to_string() }
            } else {
                FetchError::Transport(e)
            }
        })
    }

    /// `Ok(None)` means the envelope was fine but held no entry for `symbol`.
    pub async fn fetch_profile(&self, symbol: &str) -> Result<Option<StockProfile>, FetchError> {
        let body = self.get_json(PROFILE_PATH, &[("symbol", symbol)]).await?;
        extract_profile(&body, symbol)
    }

    pub async fn fetch_stats(&self) -> Result<StatsTable, FetchError> {
        let body = self.get_json(STATS_PATH, &[]).await?;
        extract_stats(&body)
    }

    pub async fn fetch_chart(
        &self,
        symbol: &str,
        range: TimeRange,
    ) -> Result<ChartSeries, FetchError> {
        let body = self
            .get_json(CHART_PATH, &[("symbol", symbol), ("range", range.as_code())])
            .await?;
        extract_chart(&body, symbol, range.as_code())
    }
}

fn envelope_array<'a>(body: &'a Value, field: &str) -> Result<&'a [Value], FetchError> {
    body.get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| FetchError::MalformedEnvelope { field: field.to_string() })
}

/// First entry in the array that carries a non-null value under `symbol`.
fn find_keyed<'a>(entries: &'a [Value], symbol: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find_map(|item| item.get(symbol).filter(|v| !v.is_null()))
}

pub fn extract_profile(body: &Value, symbol: &str) -> Result<Option<StockProfile>, FetchError> {
    let entries = envelope_array(body, "stocksProfileData")?;
    let Some(raw) = find_keyed(entries, symbol) else {
        return Ok(None);
    };

    let mut profile = match serde_json::from_value::<StockProfile>(raw.clone()) {
        Ok(profile) => profile,
        Err(e) => {
            warn!("Unreadable profile for {}: {}", symbol, e);
            StockProfile::default()
        }
    };
    profile.summary = profile.summary.filter(|s| !s.trim().is_empty());
    Ok(Some(profile))
}

pub fn extract_stats(body: &Value) -> Result<StatsTable, FetchError> {
    let entries = envelope_array(body, "stocksStatsData")?;
    let Some(first) = entries.first() else {
        return Ok(StatsTable::new());
    };
    let map = first.as_object().ok_or_else(|| FetchError::MalformedEnvelope {
        field: "stocksStatsData[0]".to_string(),
    })?;

    let mut table = StatsTable::with_capacity(map.len());
    for (symbol, raw) in map {
        match serde_json::from_value::<StockStats>(raw.clone()) {
            Ok(stats) => {
                table.insert(symbol.clone(), stats);
            }
            Err(e) => warn!("Skipping unreadable stats for {}: {}", symbol, e),
        }
    }
    Ok(table)
}

fn epoch_to_utc(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    Utc.timestamp_opt(seconds.trunc() as i64, 0).single()
}

pub fn extract_chart(body: &Value, symbol: &str, range: &str) -> Result<ChartSeries, FetchError> {
    let entries = envelope_array(body, "stocksData")?;
    let raw = find_keyed(entries, symbol)
        .and_then(|ranges| ranges.get(range))
        .filter(|v| !v.is_null())
        .ok_or_else(|| FetchError::MissingEntry {
            symbol: symbol.to_string(),
            range: range.to_string(),
        })?;

    let series: RawRangeSeries =
        serde_json::from_value(raw.clone()).map_err(|_| FetchError::MalformedEnvelope {
            field: format!("stocksData[].{}.{}", symbol, range),
        })?;

    if series.value.len() != series.time_stamp.len() {
        warn!(
            "Chart series for {} {} has {} prices but {} timestamps; truncating",
            symbol,
            range,
            series.value.len(),
            series.time_stamp.len()
        );
    }

    let mut labels = Vec::with_capacity(series.time_stamp.len());
    let mut prices = Vec::with_capacity(series.value.len());
    for (ts, price) in series.time_stamp.iter().zip(series.value.iter()) {
        if let (Some(date), Some(price)) = (epoch_to_utc(*ts), price) {
            labels.push(date);
            prices.push(*price);
        }
    }

    Ok(ChartSeries { labels, prices })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    pub(crate) async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    pub(crate) fn mock_upstream() -> Router {
        Router::new()
            .route(
                PROFILE_PATH,
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let symbol = q.get("symbol").cloned().unwrap_or_default();
                    let summary = format!("{} makes things.", symbol);
                    Json(json!({
                        "stocksProfileData": [
                            { "OTHER": { "summary": "not this one" } },
                            { symbol: { "summary": summary } }
                        ]
                    }))
                }),
            )
            .route(
                STATS_PATH,
                get(|| async {
                    Json(json!({
                        "stocksStatsData": [{
                            "AAPL": { "bookValue": 4.38, "profit": 0.2531 },
                            "TSLA": { "bookValue": 20.81 }
                        }]
                    }))
                }),
            )
            .route(
                CHART_PATH,
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    let symbol = q.get("symbol").cloned().unwrap_or_default();
                    let range = q.get("range").cloned().unwrap_or_default();
                    Json(json!({
                        "stocksData": [{
                            symbol: {
                                range: {
                                    "value": [187.5, 189.25],
                                    "timeStamp": [1_700_000_000, 1_700_086_400]
                                }
                            }
                        }]
                    }))
                }),
            )
            .route("/broken", get(|| async { "<html>not json</html>" }))
    }

    pub(crate) fn test_api(base: &str) -> StockApi {
        StockApi::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_time_range_mapping() {
        assert_eq!(TimeRange::from_label("1month"), Some(TimeRange::OneMonth));
        assert_eq!(TimeRange::from_label("3months").map(TimeRange::as_code), Some("3mo"));
        assert_eq!(TimeRange::from_label("1year").map(TimeRange::as_code), Some("1y"));
        assert_eq!(TimeRange::from_label("5years").map(TimeRange::as_code), Some("5y"));
        assert_eq!(TimeRange::from_label("10years"), None);
        assert_eq!(TimeRange::from_code("3mo"), Some(TimeRange::ThreeMonths));
        assert_eq!(TimeRange::default().as_code(), "1mo");
    }

    #[test]
    fn test_extract_profile_finds_keyed_entry() {
        let body = json!({
            "stocksProfileData": [
                { "MSFT": { "summary": "Software" } },
                { "AAPL": { "summary": "Phones" } }
            ]
        });
        let profile = extract_profile(&body, "AAPL").unwrap().unwrap();
        assert_eq!(profile.summary.as_deref(), Some("Phones"));
        assert!(extract_profile(&body, "NFLX").unwrap().is_none());
    }

    #[test]
    fn test_extract_profile_blank_summary_is_absent() {
        let body = json!({ "stocksProfileData": [ { "DIS": { "summary": "  " } } ] });
        let profile = extract_profile(&body, "DIS").unwrap().unwrap();
        assert!(profile.summary.is_none());
    }

    #[test]
    fn test_extract_profile_rejects_bad_envelope() {
        let err = extract_profile(&json!({ "stocksProfileData": {} }), "AAPL").unwrap_err();
        assert!(matches!(err, FetchError::MalformedEnvelope { .. }));
        let err = extract_profile(&json!({}), "AAPL").unwrap_err();
        assert!(matches!(err, FetchError::MalformedEnvelope { .. }));
    }

    #[test]
    fn test_extract_stats_keeps_partial_records() {
        let body = json!({
            "stocksStatsData": [{
                "AAPL": { "bookValue": 0.0, "profit": 0.0 },
                "JPM": { "profit": -0.05 },
                "NVDA": { "bookValue": "not a number" }
            }]
        });
        let table = extract_stats(&body).unwrap();
        assert_eq!(table["AAPL"].book_value, Some(0.0));
        assert_eq!(table["AAPL"].profit, Some(0.0));
        assert_eq!(table["JPM"].book_value, None);
        assert_eq!(table["JPM"].profit, Some(-0.05));
        assert!(!table.contains_key("NVDA"));
    }

    #[test]
    fn test_extract_stats_empty_array_is_empty_table() {
        let table = extract_stats(&json!({ "stocksStatsData": [] })).unwrap();
        assert!(table.is_empty());
        assert!(extract_stats(&json!({ "stocksStatsData": null })).is_err());
    }

    #[test]
    fn test_extract_chart_converts_timestamps() {
        let body = json!({
            "stocksData": [{
                "AAPL": {
                    "1mo": { "value": [10.0, null, 12.5], "timeStamp": [86_400, 172_800, 259_200] }
                }
            }]
        });
        let series = extract_chart(&body, "AAPL", "1mo").unwrap();
        assert_eq!(series.prices, vec![10.0, 12.5]);
        assert_eq!(series.labels.len(), 2);
        assert_eq!(series.labels[0].timestamp(), 86_400);
        assert_eq!(series.labels[1].timestamp(), 259_200);
    }

    #[test]
    fn test_extract_chart_missing_range() {
        let body = json!({
            "stocksData": [{ "AAPL": { "1mo": { "value": [1.0], "timeStamp": [0] } } }]
        });
        match extract_chart(&body, "AAPL", "5y") {
            Err(FetchError::MissingEntry { symbol, range }) => {
                assert_eq!(symbol, "AAPL");
                assert_eq!(range, "5y");
            }
            other => panic!("expected MissingEntry, got {:?}", other),
        }
        assert!(matches!(
            extract_chart(&body, "TSLA", "1mo"),
            Err(FetchError::MissingEntry { .. })
        ));
    }

    #[test]
    fn test_extract_chart_truncates_mismatched_lengths() {
        let body = json!({
            "stocksData": [{
                "JPM": { "1y": { "value": [1.0, 2.0, 3.0], "timeStamp": [0, 86_400] } }
            }]
        });
        let series = extract_chart(&body, "JPM", "1y").unwrap();
        assert_eq!(series.labels.len(), 2);
        assert_eq!(series.prices, vec![1.0, 2.0]);
    }

    #[test]
    fn test_extract_chart_requires_both_arrays() {
        for entry in [
            json!({}),
            json!({ "value": [1.0, 2.0] }),
            json!({ "timeStamp": [0, 86_400] }),
            json!({ "value": null, "timeStamp": [0] }),
        ] {
            let body = json!({ "stocksData": [{ "AAPL": { "1mo": entry.clone() } }] });
            match extract_chart(&body, "AAPL", "1mo") {
                Err(FetchError::MalformedEnvelope { field }) => {
                    assert_eq!(field, "stocksData[].AAPL.1mo");
                }
                other => panic!("expected MalformedEnvelope for {}, got {:?}", entry, other),
            }
        }
    }

    #[test]
    fn test_extract_chart_accepts_fractional_timestamps() {
        let body = json!({
            "stocksData": [{
                "AAPL": {
                    "1mo": { "value": [1.0, 2.0], "timeStamp": [1_700_000_000.0, 1_700_086_400.75] }
                }
            }]
        });
        let series = extract_chart(&body, "AAPL", "1mo").unwrap();
        assert_eq!(series.prices, vec![1.0, 2.0]);
        assert_eq!(series.labels[0].timestamp(), 1_700_000_000);
        assert_eq!(series.labels[1].timestamp(), 1_700_086_400);
    }

    #[tokio::test]
    async fn test_fetchers_against_mock_upstream() {
        let base = spawn_upstream(mock_upstream()).await;
        let api = test_api(&base);

        let profile = api.fetch_profile("NFLX").await.unwrap().unwrap();
        assert_eq!(profile.summary.as_deref(), Some("NFLX makes things."));

        let stats = api.fetch_stats().await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["AAPL"].profit, Some(0.2531));
        assert_eq!(stats["TSLA"].profit, None);

        // The mock echoes the query back as keys, so success proves `range=1y` was sent.
        let series = api.fetch_chart("MSFT", TimeRange::OneYear).await.unwrap();
        assert_eq!(series.prices, vec![187.5, 189.25]);
        assert_eq!(series.labels[0].timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_transport_and_body_failures() {
        let base = spawn_upstream(mock_upstream()).await;

        let err = test_api(&base).get_json("/broken", &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedEnvelope { .. }));

        let err = test_api(&base).get_json("/does-not-exist", &[]).await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));

        let err = test_api("http://127.0.0.1:1").fetch_stats().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }
}
