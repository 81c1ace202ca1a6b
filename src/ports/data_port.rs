//! Price data access port.

use crate::domain::error::TurtleError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily bars for `ticker` with `start_date <= date < end_date`, sorted by
    /// date. An empty vector means the source knows the ticker but has no
    /// bars in the range.
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TurtleError>;

    /// First date, last date and bar count of what the source holds for
    /// `ticker`, or `None` if it holds nothing.
    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TurtleError>;
}
