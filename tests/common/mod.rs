#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::Cell;
use std::collections::HashMap;
use turtletrader::domain::calendar::next_trading_day;
use turtletrader::domain::error::TurtleError;
pub use turtletrader::domain::ohlcv::OhlcvBar;
use turtletrader::domain::orchestrator::BackTestConfig;
use turtletrader::domain::strategy::TurtleParams;
use turtletrader::ports::data_port::DataPort;

pub const BENCHMARK: &str = "^GSPC";

/// In-memory bar source that counts how often it is queried.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TurtleError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = self.errors.get(ticker) {
            return Err(TurtleError::Fetch {
                ticker: ticker.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date < end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TurtleError> {
        Ok(self.data.get(ticker).and_then(|bars| {
            let first = bars.first()?;
            let last = bars.last()?;
            Some((first.date, last.date, bars.len()))
        }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn first_session() -> NaiveDate {
    date(2021, 3, 1)
}

/// Consecutive trading days starting at `first_session()`.
pub fn sessions(n: usize) -> Vec<NaiveDate> {
    let mut day = first_session();
    (0..n)
        .map(|_| {
            let current = day;
            day = next_trading_day(day);
            current
        })
        .collect()
}

/// One bar per close on consecutive trading days. Open equals close and the
/// high/low sit `spread` either side, so a quiet bar has a true range of
/// `2 * spread`.
pub fn make_bars(ticker: &str, closes: &[f64], spread: f64) -> Vec<OhlcvBar> {
    sessions(closes.len())
        .into_iter()
        .zip(closes)
        .map(|(date, &close)| OhlcvBar {
            ticker: ticker.to_string(),
            date,
            open: close,
            high: close + spread,
            low: close - spread,
            close,
            volume: 1_000_000,
        })
        .collect()
}

pub fn flat_closes(n: usize, price: f64) -> Vec<f64> {
    vec![price; n]
}

/// 30 quiet sessions at 20, a gap to 25, then +1 per session up to 45.
pub fn breakout_closes() -> Vec<f64> {
    let mut closes = flat_closes(30, 20.0);
    closes.extend((25..=45).map(f64::from));
    closes
}

/// Breakout, one pyramid add, a drop through the stop that stays inside the
/// channel, four quiet sessions and a second breakout.
pub fn stop_loss_closes() -> Vec<f64> {
    let mut closes = flat_closes(30, 20.0);
    closes.extend([25.0, 26.0, 27.0, 28.0, 29.0, 30.0]);
    closes.push(20.0);
    closes.extend(flat_closes(4, 20.0));
    closes.extend([40.0, 41.0]);
    closes
}

pub fn sample_config(tickers: &[&str]) -> BackTestConfig {
    BackTestConfig {
        start_date: date(2021, 1, 1),
        end_date: date(2022, 1, 1),
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        initial_cash: 30_000.0,
        commission: 0.0,
        benchmark: BENCHMARK.to_string(),
        ..BackTestConfig::default()
    }
}

pub fn turtle(period: usize, atr: usize) -> TurtleParams {
    TurtleParams {
        period,
        atr,
        printlog: false,
    }
}
