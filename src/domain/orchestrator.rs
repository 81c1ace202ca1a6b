//! Backtest orchestration: data loading, single runs, parameter sweeps and
//! result post-processing.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::domain::backtest::{BacktestConfig, run_backtest};
use crate::domain::error::TurtleError;
use crate::domain::instrument::{InstrumentData, build_unified_timeline};
use crate::domain::metrics::{Metrics, ReturnSeries};
use crate::domain::optimize::ParamGrid;
use crate::domain::portfolio::EquityPoint;
use crate::domain::risk::{DEFAULT_RISK_FREE, RiskAnalyzer, RiskReport};
use crate::domain::run_result::{self as keys, OptRow, RunResult};
use crate::domain::strategy::StrategyFactory;
use crate::ports::chart_port::{ChartData, ChartPort};
use crate::ports::data_port::DataPort;

pub const DEFAULT_BENCHMARK: &str = "^GSPC";

#[derive(Debug, Clone, PartialEq)]
pub struct BackTestConfig {
    pub start_date: NaiveDate,
    /// Exclusive.
    pub end_date: NaiveDate,
    pub data_dir: PathBuf,
    pub tickers: Vec<String>,
    pub initial_cash: f64,
    pub commission: f64,
    pub benchmark: String,
    pub draw_result: bool,
}

impl Default for BackTestConfig {
    fn default() -> Self {
        BackTestConfig {
            start_date: NaiveDate::from_ymd_opt(2020, 10, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2021, 10, 21).unwrap_or_default(),
            data_dir: PathBuf::from("./data/"),
            tickers: vec!["AAPL".to_string()],
            initial_cash: 30000.0,
            commission: 0.01,
            benchmark: DEFAULT_BENCHMARK.to_string(),
            draw_result: false,
        }
    }
}

/// Everything kept from the most recent `run`.
#[derive(Debug, Clone)]
struct CompletedRun {
    result: RunResult,
    metrics: Metrics,
}

pub struct BackTest<F: StrategyFactory> {
    name: String,
    factory: F,
    config: BackTestConfig,
    instruments: Vec<InstrumentData>,
    benchmark: InstrumentData,
    timeline: Vec<NaiveDate>,
    chart: Option<Box<dyn ChartPort>>,
    last: Option<CompletedRun>,
}

impl<F: StrategyFactory> BackTest<F> {
    /// Load every ticker and the benchmark through `data`.
    ///
    /// Fails if the configuration is unusable, if any series cannot be
    /// loaded or is empty, or if a traded series is shorter than the
    /// strategy's warm-up.
    pub fn new(factory: F, config: BackTestConfig, data: &dyn DataPort) -> Result<Self, TurtleError> {
        if config.tickers.is_empty() {
            return Err(TurtleError::ConfigInvalid {
                section: "backtest".into(),
                key: "tickers".into(),
                reason: "no tickers given".into(),
            });
        }
        if config.start_date >= config.end_date {
            return Err(TurtleError::ConfigInvalid {
                section: "backtest".into(),
                key: "end_date".into(),
                reason: format!(
                    "end date {} is not after start date {}",
                    config.end_date, config.start_date
                ),
            });
        }

        let minimum = factory.min_bars();
        let mut instruments = Vec::with_capacity(config.tickers.len());
        for ticker in &config.tickers {
            let series = load_series(data, ticker, &config)?;
            if series.bar_count() < minimum {
                return Err(TurtleError::InsufficientData {
                    ticker: ticker.clone(),
                    bars: series.bar_count(),
                    minimum,
                });
            }
            instruments.push(series);
        }
        let benchmark = load_series(data, &config.benchmark, &config)?;
        let timeline = build_unified_timeline(instruments.iter().chain([&benchmark]));

        info!(
            strategy = factory.name(),
            tickers = ?config.tickers,
            benchmark = %config.benchmark,
            dates = timeline.len(),
            "backtest ready"
        );

        Ok(BackTest {
            name: "BackTest".to_string(),
            factory,
            config,
            instruments,
            benchmark,
            timeline,
            chart: None,
            last: None,
        })
    }

    pub fn with_chart(mut self, chart: Box<dyn ChartPort>) -> Self {
        self.chart = Some(chart);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the configured strategy once and keep the result.
    pub fn run(&mut self) -> Result<RunResult, TurtleError> {
        info!(strategy = self.factory.name(), "starting run");
        let (result, metrics, equity_curve) = self.evaluate(&self.factory);
        info!(
            end_cash = metrics.end_value,
            trades = metrics.trades.total,
            "run finished"
        );

        if self.config.draw_result {
            match &self.chart {
                Some(chart) => {
                    let data = self.chart_data(&equity_curve);
                    let path = chart.draw(&data)?;
                    info!(path = %path.display(), "chart written");
                }
                None => warn!("draw_result is set but no chart output is configured"),
            }
        }

        self.last = Some(CompletedRun {
            result: result.clone(),
            metrics,
        });
        Ok(result)
    }

    /// Run every combination of `grid` on a fresh engine, in order.
    pub fn opt_run(&self, grid: &ParamGrid) -> Result<Vec<OptRow>, TurtleError> {
        if grid.is_empty() {
            return Err(TurtleError::InvalidGrid {
                reason: "no parameters to sweep".into(),
            });
        }

        let combinations = grid.combinations();
        let mut factories = Vec::with_capacity(combinations.len());
        for params in combinations {
            let mut factory = self.factory.clone();
            for (name, value) in &params {
                factory.set_param(name, *value)?;
            }
            factories.push((params, factory));
        }

        info!(combinations = factories.len(), "starting optimization");
        let rows = factories
            .into_iter()
            .map(|(params, factory)| {
                debug!(?params, "evaluating combination");
                let (result, _, _) = self.evaluate(&factory);
                OptRow { params, result }
            })
            .collect();
        Ok(rows)
    }

    /// Initial cash before any run, ending account value afterwards.
    pub fn get_value(&self) -> f64 {
        self.last
            .as_ref()
            .map(|run| run.metrics.end_value)
            .unwrap_or(self.config.initial_cash)
    }

    pub fn get_result(&self) -> Option<&RunResult> {
        self.last.as_ref().map(|run| &run.result)
    }

    /// Per-date strategy and benchmark returns of the last run.
    pub fn get_returns(&self) -> Option<(&ReturnSeries, &ReturnSeries)> {
        self.last
            .as_ref()
            .map(|run| (&run.metrics.time_returns, &run.metrics.benchmark_returns))
    }

    pub fn annual_returns(&self) -> Option<&BTreeMap<i32, f64>> {
        self.last.as_ref().map(|run| &run.metrics.annual_returns)
    }

    /// Human-readable report of the last run.
    pub fn summary(&self) -> Result<String, TurtleError> {
        let run = self.last.as_ref().ok_or(TurtleError::NotRun)?;
        let annual = self.annual_returns().ok_or(TurtleError::NotRun)?;
        let m = &run.metrics;
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "Sharpe Ratio: {:.4}", m.sharpe_ratio);
        let _ = writeln!(out, "Annual Returns:");
        for (year, ret) in annual {
            let _ = writeln!(out, "  {year}: {:.2}%", ret * 100.0);
        }
        let _ = writeln!(
            out,
            "Max Drawdown: {:.2}% over {} bars",
            m.max_drawdown, m.max_drawdown_len
        );
        let _ = writeln!(out, "Total Return: {:.4}", m.total_return);
        Ok(out)
    }

    pub fn output(&self) -> Result<(), TurtleError> {
        print!("{}", self.summary()?);
        Ok(())
    }

    fn evaluate(&self, factory: &F) -> (RunResult, Metrics, Vec<EquityPoint>) {
        let config = BacktestConfig {
            start_date: self.config.start_date,
            end_date: self.config.end_date,
            initial_capital: self.config.initial_cash,
            commission_rate: self.config.commission,
        };
        let outcome = run_backtest(&self.instruments, &self.timeline, factory, &config);
        let metrics = Metrics::compute(&outcome.portfolio, &self.benchmark.bars, DEFAULT_RISK_FREE);
        let risk = RiskAnalyzer::new(
            &metrics.time_returns,
            &metrics.benchmark_returns,
            DEFAULT_RISK_FREE,
        )
        .run();
        let result = collect_result(self.config.initial_cash, &metrics, &risk);
        (result, metrics, outcome.portfolio.equity_curve)
    }

    fn chart_data(&self, equity_curve: &[EquityPoint]) -> ChartData {
        let base = self.benchmark.bars.first().map(|bar| bar.close);
        let mut peak = f64::NEG_INFINITY;
        let mut chart = ChartData {
            title: self.name.clone(),
            dates: Vec::with_capacity(equity_curve.len()),
            value: Vec::with_capacity(equity_curve.len()),
            benchmark: Vec::with_capacity(equity_curve.len()),
            drawdown: Vec::with_capacity(equity_curve.len()),
        };
        for point in equity_curve {
            peak = peak.max(point.equity);
            chart.dates.push(point.date);
            chart.value.push(point.equity);
            chart.benchmark.push(match (self.benchmark.get_bar(point.date), base) {
                (Some(bar), Some(base)) if base > 0.0 => {
                    Some(self.config.initial_cash * bar.close / base)
                }
                _ => None,
            });
            chart.drawdown.push(if peak > 0.0 {
                100.0 * (peak - point.equity) / peak
            } else {
                0.0
            });
        }
        chart
    }
}

fn load_series(
    data: &dyn DataPort,
    ticker: &str,
    config: &BackTestConfig,
) -> Result<InstrumentData, TurtleError> {
    let bars = data.fetch_ohlcv(ticker, config.start_date, config.end_date)?;
    if bars.is_empty() {
        return Err(TurtleError::NoData {
            ticker: ticker.to_string(),
        });
    }
    debug!(ticker, bars = bars.len(), "series loaded");
    Ok(InstrumentData::new(ticker, bars))
}

fn collect_result(initial_cash: f64, metrics: &Metrics, risk: &RiskReport) -> RunResult {
    let mut result = RunResult::new();
    result.insert(keys::INITIAL_CASH, initial_cash);
    result.insert(keys::END_CASH, metrics.end_value);
    result.insert(keys::TOTAL_RETURN, metrics.total_return);
    result.insert(keys::ANNUAL_RETURN, metrics.annual_return);
    result.insert(keys::SHARPE_RATIO, metrics.sharpe_ratio);
    result.insert(keys::MAX_DRAWDOWN, metrics.max_drawdown);
    result.insert(keys::MAX_DRAWDOWN_LEN, metrics.max_drawdown_len as f64);
    result.insert(keys::SQN, metrics.sqn);
    if metrics.trades.total > 1 {
        result.insert(keys::TRANSACTIONS, metrics.trades.total as f64);
        result.insert(keys::WIN_RATE, metrics.trades.win_rate());
        result.insert(keys::LOSS_RATE, metrics.trades.loss_rate());
    }
    result.insert(keys::ALPHA, risk.alpha);
    result.insert(keys::BETA, risk.beta);
    result.insert(keys::INFORMATION_RATIO, risk.information_ratio);
    result.insert(keys::VOLATILITY, risk.volatility);
    result.insert(keys::OMEGA, risk.omega);
    result.insert(keys::SORTINO, risk.sortino);
    result.insert(keys::CALMAR, risk.calmar);
    result
}
