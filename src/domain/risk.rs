//! Benchmark-relative risk statistics.
//!
//! Everything here works on per-period simple returns. The risk-free rate is
//! applied per period, unannualised, and alpha uses an annualisation
//! factor of 1. Statistics that are undefined for the given inputs (too few
//! observations, zero variance, no losing periods) come back as NaN.

use super::metrics::{ReturnSeries, TRADING_DAYS_PER_YEAR};
use statrs::statistics::Statistics;

pub const DEFAULT_RISK_FREE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskReport {
    pub alpha: f64,
    pub beta: f64,
    pub information_ratio: f64,
    pub volatility: f64,
    pub omega: f64,
    pub sortino: f64,
    pub calmar: f64,
}

#[derive(Debug, Clone)]
pub struct RiskAnalyzer<'a> {
    returns: &'a ReturnSeries,
    benchmark: &'a ReturnSeries,
    risk_free: f64,
}

impl<'a> RiskAnalyzer<'a> {
    /// `risk_free` is a per-period rate, see [`DEFAULT_RISK_FREE`].
    pub fn new(returns: &'a ReturnSeries, benchmark: &'a ReturnSeries, risk_free: f64) -> Self {
        RiskAnalyzer {
            returns,
            benchmark,
            risk_free,
        }
    }

    pub fn run(&self) -> RiskReport {
        let r: Vec<f64> = self.returns.values().copied().collect();
        let (aligned_r, aligned_b) = self.aligned();
        let (alpha, beta) = alpha_beta(&aligned_r, &aligned_b, self.risk_free);

        RiskReport {
            alpha,
            beta,
            information_ratio: information_ratio(&aligned_r, &aligned_b),
            volatility: annual_volatility(&r),
            omega: omega_ratio(&r, self.risk_free),
            sortino: sortino_ratio(&r),
            calmar: calmar_ratio(&r),
        }
    }

    /// Inner join of the two series on date.
    fn aligned(&self) -> (Vec<f64>, Vec<f64>) {
        self.returns
            .iter()
            .filter_map(|(date, &r)| self.benchmark.get(date).map(|&b| (r, b)))
            .unzip()
    }
}

pub fn alpha_beta(returns: &[f64], benchmark: &[f64], risk_free: f64) -> (f64, f64) {
    if returns.len() < 2 || returns.len() != benchmark.len() {
        return (f64::NAN, f64::NAN);
    }
    let adj_r: Vec<f64> = returns.iter().map(|r| r - risk_free).collect();
    let adj_b: Vec<f64> = benchmark.iter().map(|b| b - risk_free).collect();

    let var_b = adj_b.iter().population_variance();
    if !(var_b > 0.0) {
        return (f64::NAN, f64::NAN);
    }
    let beta = adj_b.iter().population_covariance(adj_r.iter()) / var_b;
    let alpha = adj_r
        .iter()
        .zip(&adj_b)
        .map(|(r, b)| r - beta * b)
        .collect::<Vec<f64>>()
        .iter()
        .mean();
    (alpha, beta)
}

pub fn information_ratio(returns: &[f64], benchmark: &[f64]) -> f64 {
    let active: Vec<f64> = returns.iter().zip(benchmark).map(|(r, b)| r - b).collect();
    if active.len() < 2 {
        return f64::NAN;
    }
    let tracking_error = active.iter().std_dev();
    if !(tracking_error > 0.0) {
        return f64::NAN;
    }
    active.iter().mean() / tracking_error
}

pub fn annual_volatility(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }
    returns.iter().std_dev() * TRADING_DAYS_PER_YEAR.sqrt()
}

pub fn omega_ratio(returns: &[f64], risk_free: f64) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let (gains, losses) = returns
        .iter()
        .map(|r| r - risk_free)
        .fold((0.0, 0.0), |(gains, losses), d| {
            if d > 0.0 {
                (gains + d, losses)
            } else {
                (gains, losses - d)
            }
        });
    if losses > 0.0 { gains / losses } else { f64::NAN }
}

pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }
    let annual_mean = returns.iter().mean() * TRADING_DAYS_PER_YEAR;
    let downside = returns
        .iter()
        .map(|r| r.min(0.0).powi(2))
        .collect::<Vec<f64>>()
        .iter()
        .mean()
        .sqrt()
        * TRADING_DAYS_PER_YEAR.sqrt();
    annual_mean / downside
}

/// Compound annual growth over the series divided by its worst drawdown.
pub fn calmar_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let drawdown = max_drawdown(returns);
    if !(drawdown < 0.0) {
        return f64::NAN;
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    let years = returns.len() as f64 / TRADING_DAYS_PER_YEAR;
    let cagr = growth.powf(1.0 / years) - 1.0;
    cagr / drawdown.abs()
}

/// Worst peak-to-trough decline of cumulative wealth, as a negative fraction.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0_f64;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for r in returns {
        wealth *= 1.0 + r;
        peak = peak.max(wealth);
        if peak > 0.0 {
            worst = worst.min((wealth - peak) / peak);
        }
    }
    worst
}
