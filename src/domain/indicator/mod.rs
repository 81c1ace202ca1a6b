//! Technical indicators used by the turtle rules.
//!
//! - `IndicatorPoint`: a single point in an indicator time series
//! - `IndicatorType`: indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: a time series aligned bar-for-bar with its input
//!
//! Crossovers compare two consecutive bars only. A bar where the two lines
//! touch counts as the "before" side, so touch-then-break fires on the
//! breaking bar whichever side the lines were on before the touch.

pub mod atr;
pub mod channel;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    /// Highest high of the previous n bars, today excluded.
    Highest(usize),
    /// Lowest low of the previous n bars, today excluded.
    Lowest(usize),
    /// Simple average of the last n true ranges.
    Atr(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        Self {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Value at bar `index`, or `None` while the indicator is warming up.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Highest(period) => write!(f, "HIGHEST({})", period),
            IndicatorType::Lowest(period) => write!(f, "LOWEST({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}

/// `a` crosses above `b` between the previous and current bar.
pub fn crossed_above(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a <= prev_b && a > b
}

/// `a` crosses below `b` between the previous and current bar.
pub fn crossed_below(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    prev_a >= prev_b && a < b
}
