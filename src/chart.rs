use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Day,
}

impl TimeUnit {
    fn tick_format(self) -> &'static str {
        match self {
            TimeUnit::Day => "%b %-d",
        }
    }
}

/// Static presentation settings, fixed when the chart is created.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartConfig {
    pub series_label: &'static str,
    pub line_color: &'static str,
    pub time_unit: TimeUnit,
    pub tooltip_format: &'static str,
    pub begin_at_zero: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            series_label: "Stock Price",
            line_color: "green",
            time_unit: TimeUnit::Day,
            tooltip_format: "%b %-d, %Y",
            begin_at_zero: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PricePoint {
    pub time: DateTime<Utc>,
    pub price: f64,
}

/// Single line chart that lives for the whole session. Data is only ever
/// swapped wholesale through [`PriceChart::replace_data`].
#[derive(Clone, Debug, Serialize)]
pub struct PriceChart {
    pub config: ChartConfig,
    series: Vec<PricePoint>,
    /// Bumped on every redraw request.
    revision: u64,
}

impl PriceChart {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            config,
            series: Vec::new(),
            revision: 0,
        }
    }

    /// Replaces labels and prices, then requests a redraw. Unpaired trailing
    /// entries are dropped.
    pub fn replace_data(&mut self, labels: Vec<DateTime<Utc>>, prices: Vec<f64>) {
        self.series = labels
            .into_iter()
            .zip(prices)
            .map(|(time, price)| PricePoint { time, price })
            .collect();
        self.redraw();
    }

    fn redraw(&mut self) {
        self.revision += 1;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn series(&self) -> &[PricePoint] {
        &self.series
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// `(unix seconds, price)` pairs for a time-scaled x axis.
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.series
            .iter()
            .map(|p| (p.time.timestamp() as f64, p.price))
            .collect()
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        match (self.series.first(), self.series.last()) {
            (Some(first), Some(last)) if first.time < last.time => {
                [first.time.timestamp() as f64, last.time.timestamp() as f64]
            }
            (Some(only), _) => {
                let t = only.time.timestamp() as f64;
                [t - 43_200.0, t + 43_200.0]
            }
            _ => [0.0, 1.0],
        }
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        if self.series.is_empty() {
            return [0.0, 1.0];
        }
        let min = self.series.iter().map(|p| p.price).fold(f64::INFINITY, f64::min);
        let max = self.series.iter().map(|p| p.price).fold(f64::NEG_INFINITY, f64::max);
        let pad = ((max - min) * 0.05).max(max.abs() * 0.01).max(f64::EPSILON);

        if self.config.begin_at_zero {
            [min.min(0.0), max + pad]
        } else {
            [min - pad, max + pad]
        }
    }

    /// First, middle and last dates, formatted at the configured unit.
    pub fn x_labels(&self) -> Vec<String> {
        let fmt = self.config.time_unit.tick_format();
        match self.series.len() {
            0 => Vec::new(),
            1 => vec![self.series[0].time.format(fmt).to_string()],
            n => [0, n / 2, n - 1]
                .iter()
                .map(|&i| self.series[i].time.format(fmt).to_string())
                .collect(),
        }
    }

    pub fn tooltip(&self, point: &PricePoint) -> String {
        format!(
            "{}: {:.2}",
            point.time.format(self.config.tooltip_format),
            point.price
        )
    }
}

impl Default for PriceChart {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}
