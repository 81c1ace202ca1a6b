//! Post-run analyzers over the equity curve and the closed trades.

use super::ohlcv::OhlcvBar;
use super::portfolio::{EquityPoint, Portfolio};
use chrono::{Datelike, NaiveDate};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Per-date simple returns.
pub type ReturnSeries = BTreeMap<NaiveDate, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeAnalysis {
    /// Closed trades plus lineages still open at the end of the run.
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    pub won: usize,
    pub lost: usize,
}

impl TradeAnalysis {
    pub fn win_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.won as f64 / self.total as f64
        }
    }

    pub fn loss_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.lost as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub start_value: f64,
    pub end_value: f64,
    /// Log return over the whole run.
    pub total_return: f64,
    /// `total_return` compounded to a 252-day year.
    pub annual_return: f64,
    pub sharpe_ratio: f64,
    /// Percent of the running peak.
    pub max_drawdown: f64,
    /// Bars.
    pub max_drawdown_len: usize,
    pub sqn: f64,
    pub trades: TradeAnalysis,
    pub time_returns: ReturnSeries,
    pub benchmark_returns: ReturnSeries,
    pub annual_returns: BTreeMap<i32, f64>,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, benchmark: &[OhlcvBar], risk_free_rate: f64) -> Self {
        let equity_curve = &portfolio.equity_curve;
        let start_value = portfolio.initial_capital;
        let end_value = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(start_value);

        let (total_return, annual_return) =
            compute_returns(start_value, end_value, equity_curve.len());
        let (max_drawdown, max_drawdown_len) = compute_drawdown(equity_curve);

        let time_returns = compute_time_returns(start_value, equity_curve);
        let daily_values: Vec<f64> = time_returns.values().copied().collect();
        let sharpe_ratio = compute_sharpe(&daily_values, risk_free_rate);

        let pnl_net: Vec<f64> = portfolio.closed_trades.iter().map(|t| t.pnl_net).collect();
        let sqn = compute_sqn(&pnl_net);

        let won = portfolio
            .closed_trades
            .iter()
            .filter(|t| t.is_winner())
            .count();
        let closed = portfolio.closed_trades.len();
        let open = portfolio.positions.len();
        let trades = TradeAnalysis {
            total: closed + open,
            open,
            closed,
            won,
            lost: closed - won,
        };

        Metrics {
            start_value,
            end_value,
            total_return,
            annual_return,
            sharpe_ratio,
            max_drawdown,
            max_drawdown_len,
            sqn,
            trades,
            time_returns,
            benchmark_returns: compute_benchmark_returns(benchmark),
            annual_returns: compute_annual_returns(start_value, equity_curve),
        }
    }
}

fn compute_returns(start_value: f64, end_value: f64, bars: usize) -> (f64, f64) {
    if start_value <= 0.0 || end_value <= 0.0 || bars == 0 {
        return (0.0, 0.0);
    }
    let total = (end_value / start_value).ln();
    let annual = (total / bars as f64 * TRADING_DAYS_PER_YEAR).exp_m1();
    (total, annual)
}

/// Max drawdown in percent and its longest run in bars.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_len = 0usize;
    let mut len = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            len = 0;
        } else if peak > 0.0 {
            let dd = 100.0 * (peak - point.equity) / peak;
            max_dd = max_dd.max(dd);
            len += 1;
            max_len = max_len.max(len);
        }
    }

    (max_dd, max_len)
}

fn compute_time_returns(start_value: f64, equity_curve: &[EquityPoint]) -> ReturnSeries {
    let mut prev = start_value;
    equity_curve
        .iter()
        .map(|point| {
            let ret = if prev > 0.0 {
                point.equity / prev - 1.0
            } else {
                0.0
            };
            prev = point.equity;
            (point.date, ret)
        })
        .collect()
}

/// Close-to-close returns; the first bar has no prior close and returns 0.
fn compute_benchmark_returns(bars: &[OhlcvBar]) -> ReturnSeries {
    let mut prev: Option<f64> = None;
    bars.iter()
        .map(|bar| {
            let ret = match prev {
                Some(p) if p > 0.0 => bar.close / p - 1.0,
                _ => 0.0,
            };
            prev = Some(bar.close);
            (bar.date, ret)
        })
        .collect()
}

fn compute_annual_returns(start_value: f64, equity_curve: &[EquityPoint]) -> BTreeMap<i32, f64> {
    let mut year_end: BTreeMap<i32, f64> = BTreeMap::new();
    for point in equity_curve {
        year_end.insert(point.date.year(), point.equity);
    }

    let mut prev = start_value;
    year_end
        .into_iter()
        .map(|(year, value)| {
            let ret = if prev > 0.0 { value / prev - 1.0 } else { 0.0 };
            prev = value;
            (year, ret)
        })
        .collect()
}

/// Annualised Sharpe ratio of daily returns against an annual risk-free rate.
pub fn compute_sharpe(returns: &[f64], annual_risk_free: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = (1.0 + annual_risk_free).powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let std = excess.iter().std_dev();
    if !(std > 0.0) {
        return 0.0;
    }
    excess.iter().mean() / std * TRADING_DAYS_PER_YEAR.sqrt()
}

/// System Quality Number over net trade PnL.
pub fn compute_sqn(pnl_net: &[f64]) -> f64 {
    if pnl_net.len() < 2 {
        return 0.0;
    }
    let std = pnl_net.iter().population_std_dev();
    if !(std > 0.0) {
        return 0.0;
    }
    (pnl_net.len() as f64).sqrt() * pnl_net.iter().mean() / std
}
