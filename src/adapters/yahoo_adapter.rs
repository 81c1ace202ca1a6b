//! Yahoo Finance chart endpoint as a remote bar source.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::error::TurtleError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    /// Seconds east of UTC for the exchange.
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

pub struct YahooAdapter {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooAdapter {
    pub fn new() -> Result<Self, TurtleError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, TurtleError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TurtleError::Fetch {
                ticker: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Url, TurtleError> {
        let fail = |reason: String| TurtleError::Fetch {
            ticker: ticker.to_string(),
            reason,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| fail(format!("bad base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| fail("base url cannot take a path".into()))?
            .push(ticker);
        url.query_pairs_mut()
            .append_pair("period1", &epoch_seconds(start).to_string())
            .append_pair("period2", &epoch_seconds(end).to_string())
            .append_pair("interval", "1d");
        Ok(url)
    }
}

impl DataPort for YahooAdapter {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TurtleError> {
        let url = self.chart_url(ticker, start_date, end_date)?;
        info!(ticker, %start_date, %end_date, "fetching from remote provider");
        let fail = |reason: String| TurtleError::Fetch {
            ticker: ticker.to_string(),
            reason,
        };

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(|e| fail(e.to_string()))?;

        let bars: Vec<OhlcvBar> = parse_chart(ticker, &body)?
            .into_iter()
            .filter(|b| b.date >= start_date && b.date < end_date)
            .collect();
        debug!(ticker, bars = bars.len(), "remote bars received");
        Ok(bars)
    }

    fn get_data_range(
        &self,
        _ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TurtleError> {
        // The chart endpoint has no cheap range query.
        Ok(None)
    }
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Decode a chart response body into bars. Sessions with a missing price are
/// dropped; timestamps are converted to exchange-local dates.
fn parse_chart(ticker: &str, body: &str) -> Result<Vec<OhlcvBar>, TurtleError> {
    let fail = |reason: String| TurtleError::Fetch {
        ticker: ticker.to_string(),
        reason,
    };
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| fail(format!("invalid response: {e}")))?;

    if let Some(error) = response.chart.error {
        return Err(fail(format!("{}: {}", error.code, error.description)));
    }
    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let timestamps = result.timestamp.unwrap_or_default();
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };
    let offset = FixedOffset::east_opt(result.meta.gmtoffset)
        .ok_or_else(|| fail(format!("bad gmtoffset {}", result.meta.gmtoffset)))?;

    let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();
    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
        ) else {
            continue;
        };
        let Some(utc) = DateTime::from_timestamp(ts, 0) else {
            continue;
        };
        bars.push(OhlcvBar {
            ticker: ticker.to_string(),
            date: utc.with_timezone(&offset).date_naive(),
            open,
            high,
            low,
            close,
            volume: at(&quote.volume, i).unwrap_or(0.0) as i64,
        });
    }
    Ok(bars)
}
