//! Local cache in front of a remote bar source.
//!
//! A ticker with a cache file is always served from it. Otherwise the remote
//! source is queried once, the bars are written to the cache and the answer
//! is reloaded from the file so both paths parse the same way.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::domain::error::TurtleError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;

pub struct CachedDataAdapter {
    cache: CsvAdapter,
    remote: Option<Box<dyn DataPort>>,
}

impl CachedDataAdapter {
    pub fn new(cache: CsvAdapter, remote: Option<Box<dyn DataPort>>) -> Self {
        Self { cache, remote }
    }

    pub fn cache(&self) -> &CsvAdapter {
        &self.cache
    }

    /// Fetch `ticker` from the remote source and overwrite its cache file,
    /// returning the number of bars stored.
    pub fn refresh(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<usize, TurtleError> {
        let remote = self.remote.as_ref().ok_or_else(|| TurtleError::Fetch {
            ticker: ticker.to_string(),
            reason: "no remote data source configured".into(),
        })?;
        let bars = remote.fetch_ohlcv(ticker, start_date, end_date)?;
        if bars.is_empty() {
            return Err(TurtleError::NoData {
                ticker: ticker.to_string(),
            });
        }
        let path = self.cache.write(ticker, &bars)?;
        info!(ticker, bars = bars.len(), path = %path.display(), "cache populated");
        Ok(bars.len())
    }
}

impl DataPort for CachedDataAdapter {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TurtleError> {
        if !self.cache.exists(ticker) {
            if self.remote.is_none() {
                warn!(ticker, "no cache file and no remote source");
                return Err(TurtleError::NoData {
                    ticker: ticker.to_string(),
                });
            }
            self.refresh(ticker, start_date, end_date)?;
        }
        self.cache.fetch_ohlcv(ticker, start_date, end_date)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TurtleError> {
        self.cache.get_data_range(ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Remote stand-in that counts calls.
    struct CountingRemote {
        calls: Rc<Cell<usize>>,
        bars: Vec<OhlcvBar>,
    }

    impl DataPort for CountingRemote {
        fn fetch_ohlcv(
            &self,
            _ticker: &str,
            _start_date: NaiveDate,
            _end_date: NaiveDate,
        ) -> Result<Vec<OhlcvBar>, TurtleError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.bars.clone())
        }

        fn get_data_range(
            &self,
            _ticker: &str,
        ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TurtleError> {
            Ok(None)
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(date: NaiveDate, close: f64) -> OhlcvBar {
        OhlcvBar {
            ticker: "AAPL".into(),
            date,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 100,
        }
    }

    fn adapter(dir: &TempDir, bars: Vec<OhlcvBar>) -> (CachedDataAdapter, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let remote = CountingRemote {
            calls: Rc::clone(&calls),
            bars,
        };
        let cache = CsvAdapter::new(dir.path().join("data"));
        (CachedDataAdapter::new(cache, Some(Box::new(remote))), calls)
    }

    #[test]
    fn fetches_once_then_serves_from_cache() {
        let dir = TempDir::new().unwrap();
        let (source, calls) = adapter(
            &dir,
            vec![bar(d(2021, 1, 4), 100.0), bar(d(2021, 1, 5), 101.0)],
        );

        let first = source.fetch_ohlcv("AAPL", d(2021, 1, 1), d(2021, 2, 1)).unwrap();
        let second = source.fetch_ohlcv("AAPL", d(2021, 1, 1), d(2021, 2, 1)).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(dir.path().join("data").join("AAPL.csv").is_file());
    }

    #[test]
    fn remote_answer_is_trimmed_to_range() {
        let dir = TempDir::new().unwrap();
        let (source, _) = adapter(
            &dir,
            vec![
                bar(d(2020, 12, 31), 99.0),
                bar(d(2021, 1, 4), 100.0),
                bar(d(2021, 2, 1), 101.0),
            ],
        );
        let bars = source.fetch_ohlcv("AAPL", d(2021, 1, 1), d(2021, 2, 1)).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, d(2021, 1, 4));
    }

    #[test]
    fn empty_remote_answer_is_no_data() {
        let dir = TempDir::new().unwrap();
        let (source, _) = adapter(&dir, Vec::new());
        let result = source.fetch_ohlcv("AAPL", d(2021, 1, 1), d(2021, 2, 1));
        assert!(matches!(result, Err(TurtleError::NoData { .. })));
        assert!(!source.cache().exists("AAPL"));
    }

    #[test]
    fn without_remote_missing_cache_is_no_data() {
        let dir = TempDir::new().unwrap();
        let source = CachedDataAdapter::new(CsvAdapter::new(dir.path().to_path_buf()), None);
        let result = source.fetch_ohlcv("AAPL", d(2021, 1, 1), d(2021, 2, 1));
        assert!(matches!(result, Err(TurtleError::NoData { .. })));
        assert!(source.refresh("AAPL", d(2021, 1, 1), d(2021, 2, 1)).is_err());
    }
}
