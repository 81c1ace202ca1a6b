//! Result plotting port.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::domain::error::TurtleError;

/// Series plotted for one run, all indexed by `dates`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub title: String,
    pub dates: Vec<NaiveDate>,
    pub value: Vec<f64>,
    /// Benchmark close rebased to the initial account value. `None` on dates
    /// the benchmark has no bar.
    pub benchmark: Vec<Option<f64>>,
    /// Percent below the running peak of `value`.
    pub drawdown: Vec<f64>,
}

pub trait ChartPort {
    /// Render `chart`, returning the path written.
    fn draw(&self, chart: &ChartData) -> Result<PathBuf, TurtleError>;
}
