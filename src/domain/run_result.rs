//! Flat, ordered metric record produced by one run.

use std::fmt;

pub const INITIAL_CASH: &str = "initial_cash";
pub const END_CASH: &str = "end_cash";
pub const TOTAL_RETURN: &str = "total_return";
pub const ANNUAL_RETURN: &str = "annual_return";
pub const SHARPE_RATIO: &str = "sharpe_ratio";
pub const MAX_DRAWDOWN: &str = "max_drawdown";
pub const MAX_DRAWDOWN_LEN: &str = "max_drawdown_len";
pub const SQN: &str = "sqn";
pub const TRANSACTIONS: &str = "transactions";
pub const WIN_RATE: &str = "win_rate";
pub const LOSS_RATE: &str = "loss_rate";
pub const ALPHA: &str = "alpha";
pub const BETA: &str = "beta";
pub const INFORMATION_RATIO: &str = "information_ratio";
pub const VOLATILITY: &str = "volatility";
pub const OMEGA: &str = "omega";
pub const SORTINO: &str = "sortino";
pub const CALMAR: &str = "calmar";

/// Position of every metric in a result. The trade keys are only present
/// when a run made more than one trade.
pub const KEY_ORDER: [&str; 18] = [
    INITIAL_CASH,
    END_CASH,
    TOTAL_RETURN,
    ANNUAL_RETURN,
    SHARPE_RATIO,
    MAX_DRAWDOWN,
    MAX_DRAWDOWN_LEN,
    SQN,
    TRANSACTIONS,
    WIN_RATE,
    LOSS_RATE,
    ALPHA,
    BETA,
    INFORMATION_RATIO,
    VOLATILITY,
    OMEGA,
    SORTINO,
    CALMAR,
];

/// Metric name to scalar, in insertion order.
///
/// Equality is bitwise on the values, so a NaN statistic compares equal to
/// itself and two identical runs compare equal.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    entries: Vec<(String, f64)>,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`. Overwriting keeps the original position.
    pub fn insert(&mut self, key: &str, value: f64) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl PartialEq for RunResult {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((ka, va), (kb, vb))| ka == kb && va.to_bits() == vb.to_bits())
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.keys().map(str::len).max().unwrap_or(0);
        for (key, value) in self.iter() {
            writeln!(f, "{key:<width$}  {value:>16.6}")?;
        }
        Ok(())
    }
}

/// One optimization combination and its result.
#[derive(Debug, Clone, PartialEq)]
pub struct OptRow {
    pub params: Vec<(String, i64)>,
    pub result: RunResult,
}

impl OptRow {
    pub fn param(&self, name: &str) -> Option<i64> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}
