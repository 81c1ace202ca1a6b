//! CSV cache files and optimization output.
//!
//! Cache layout is one file per ticker, `<dir>/<TICKER>.csv`, with a
//! `Date,Open,High,Low,Close,Volume` header. Header names are matched
//! case-insensitively and extra columns are ignored, so files saved by other
//! tools (with an `Adj Close` column, say) load as well.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::error::TurtleError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::run_result::{KEY_ORDER, OptRow};
use crate::ports::data_port::DataPort;

const HEADER: [&str; 6] = ["Date", "Open", "High", "Low", "Close", "Volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    pub fn exists(&self, ticker: &str) -> bool {
        self.csv_path(ticker).is_file()
    }

    /// Every bar in the cache file, sorted by date.
    pub fn read_all(&self, ticker: &str) -> Result<Vec<OhlcvBar>, TurtleError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| TurtleError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut bars = parse_bars(ticker, &content).map_err(|reason| TurtleError::Data {
            reason: format!("{}: {}", path.display(), reason),
        })?;
        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    /// Replace the cache file for `ticker`, creating the directory if needed.
    pub fn write(&self, ticker: &str, bars: &[OhlcvBar]) -> Result<PathBuf, TurtleError> {
        fs::create_dir_all(&self.base_path)?;
        let path = self.csv_path(ticker);
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| TurtleError::Data {
            reason: format!("failed to create {}: {}", path.display(), e),
        })?;
        let to_err = |e: csv::Error| TurtleError::Data {
            reason: format!("failed to write {}: {}", path.display(), e),
        };

        wtr.write_record(HEADER).map_err(to_err)?;
        for bar in bars {
            wtr.write_record([
                bar.date.format("%Y-%m-%d").to_string(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ])
            .map_err(to_err)?;
        }
        wtr.flush()?;
        debug!(ticker, bars = bars.len(), path = %path.display(), "cache written");
        Ok(path)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, TurtleError> {
        if !self.exists(ticker) {
            return Err(TurtleError::NoData {
                ticker: ticker.to_string(),
            });
        }
        let bars = self
            .read_all(ticker)?
            .into_iter()
            .filter(|b| b.date >= start_date && b.date < end_date)
            .collect();
        Ok(bars)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TurtleError> {
        if !self.exists(ticker) {
            return Ok(None);
        }
        let bars = self.read_all(ticker)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Result<Self, String> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| find(name).ok_or_else(|| format!("missing {name} column"));
        Ok(Columns {
            date: require("date")?,
            open: require("open")?,
            high: require("high")?,
            low: require("low")?,
            close: require("close")?,
            volume: find("volume"),
        })
    }
}

fn parse_bars(ticker: &str, content: &str) -> Result<Vec<OhlcvBar>, String> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let header = rdr
        .headers()
        .map_err(|e| format!("CSV header error: {e}"))?
        .clone();
    let cols = Columns::from_header(&header)?;

    let mut bars = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| format!("CSV parse error: {e}"))?;
        let field = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

        // Providers write "null" rows for sessions without prices.
        let prices = [cols.open, cols.high, cols.low, cols.close].map(field);
        if prices.iter().any(|p| p.is_empty() || p.eq_ignore_ascii_case("null")) {
            continue;
        }

        let date = parse_date(field(cols.date))
            .ok_or_else(|| format!("row {}: invalid date '{}'", line + 1, field(cols.date)))?;
        let number = |name: &str, text: &str| {
            text.parse::<f64>()
                .map_err(|e| format!("row {}: invalid {name} '{text}': {e}", line + 1))
        };
        let volume = match cols.volume.map(field) {
            Some(v) if !v.is_empty() && !v.eq_ignore_ascii_case("null") => {
                number("volume", v)? as i64
            }
            _ => 0,
        };

        bars.push(OhlcvBar {
            ticker: ticker.to_string(),
            date,
            open: number("open", prices[0])?,
            high: number("high", prices[1])?,
            low: number("low", prices[2])?,
            close: number("close", prices[3])?,
            volume,
        });
    }
    Ok(bars)
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Write sweep rows as CSV: one column per swept parameter, then every metric
/// any row has, in result key order. Metrics a row lacks are left empty.
pub fn write_opt_rows<W: Write>(rows: &[OptRow], out: W) -> Result<(), TurtleError> {
    let mut columns: Vec<String> = Vec::new();
    if let Some(first) = rows.first() {
        columns.extend(first.params.iter().map(|(name, _)| name.clone()));
    }
    let param_count = columns.len();
    for key in KEY_ORDER {
        if rows.iter().any(|row| row.result.get(key).is_some()) {
            columns.push(key.to_string());
        }
    }
    // anything outside the known keys goes last, first-seen
    for row in rows {
        for key in row.result.keys() {
            if !columns[param_count..].iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }

    let to_err = |e: csv::Error| TurtleError::Data {
        reason: format!("failed to write optimization rows: {e}"),
    };
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(&columns).map_err(to_err)?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                if i < param_count {
                    row.param(column).map(|v| v.to_string()).unwrap_or_default()
                } else {
                    row.result
                        .get(column)
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                }
            })
            .collect();
        wtr.write_record(&record).map_err(to_err)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run_result::RunResult;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "Date,Open,High,Low,Close,Adj Close,Volume\n\
            2021-01-04,100.0,110.0,90.0,105.0,104.0,50000\n\
            2021-01-05,105.0,115.0,100.0,110.0,109.0,60000\n\
            2021-01-06,110.0,120.0,105.0,115.0,114.0,55000\n";

        fs::write(path.join("AAPL.csv"), csv_content).unwrap();
        fs::write(
            path.join("MSFT.csv"),
            "date,open,high,low,close,volume\n2021-01-04,1,2,0.5,1.5,10\n",
        )
        .unwrap();

        (dir, path)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn fetch_ohlcv_returns_correct_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_ohlcv("AAPL", d(2021, 1, 1), d(2021, 2, 1))
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].ticker, "AAPL");
        assert_eq!(bars[0].date, d(2021, 1, 4));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000);
    }

    #[test]
    fn fetch_ohlcv_end_is_exclusive() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_ohlcv("AAPL", d(2021, 1, 5), d(2021, 1, 6))
            .unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, d(2021, 1, 5));
    }

    #[test]
    fn header_is_case_insensitive() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let bars = adapter.read_all("MSFT").unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 1.5);
    }

    #[test]
    fn missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_ohlcv("XYZ", d(2021, 1, 1), d(2021, 2, 1));
        assert!(matches!(result, Err(TurtleError::NoData { .. })));
        assert!(adapter.get_data_range("XYZ").unwrap().is_none());
    }

    #[test]
    fn missing_column_is_data_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("BAD.csv"), "Date,Open,High,Low\n").unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let err = adapter.read_all("BAD").unwrap_err();
        assert!(err.to_string().contains("missing close column"));
    }

    #[test]
    fn null_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("SPY.csv"),
            "Date,Open,High,Low,Close,Volume\n\
             2021-01-04,null,null,null,null,null\n\
             2021-01-05,1,2,0.5,1.5,100\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let bars = adapter.read_all("SPY").unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, d(2021, 1, 5));
    }

    #[test]
    fn write_then_read_creates_directory() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvAdapter::new(dir.path().join("nested").join("data"));
        let bars = vec![OhlcvBar {
            ticker: "^GSPC".into(),
            date: d(2021, 3, 1),
            open: 3800.5,
            high: 3850.0,
            low: 3790.25,
            close: 3840.0,
            volume: 123,
        }];

        let path = adapter.write("^GSPC", &bars).unwrap();
        assert!(path.ends_with("^GSPC.csv"));
        assert_eq!(adapter.read_all("^GSPC").unwrap(), bars);

        let range = adapter.get_data_range("^GSPC").unwrap();
        assert_eq!(range, Some((d(2021, 3, 1), d(2021, 3, 1), 1)));
    }

    #[test]
    fn opt_rows_as_csv() {
        let mut full = RunResult::new();
        full.insert("end_cash", 31000.0);
        full.insert("win_rate", 0.5);
        let mut partial = RunResult::new();
        partial.insert("end_cash", 30000.0);

        let rows = vec![
            OptRow {
                params: vec![("period".into(), 10), ("atr".into(), 14)],
                result: full,
            },
            OptRow {
                params: vec![("period".into(), 20), ("atr".into(), 14)],
                result: partial,
            },
        ];

        let mut out = Vec::new();
        write_opt_rows(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "period,atr,end_cash,win_rate");
        assert_eq!(lines[1], "10,14,31000,0.5");
        assert_eq!(lines[2], "20,14,30000,");
    }

    #[test]
    fn opt_columns_follow_result_order_when_first_row_has_no_trades() {
        let mut quiet = RunResult::new();
        quiet.insert("end_cash", 30000.0);
        quiet.insert("sqn", 0.0);
        quiet.insert("alpha", 0.1);
        quiet.insert("calmar", 1.0);
        let mut busy = RunResult::new();
        busy.insert("end_cash", 32000.0);
        busy.insert("sqn", 1.2);
        busy.insert("transactions", 3.0);
        busy.insert("win_rate", 2.0 / 3.0);
        busy.insert("loss_rate", 1.0 / 3.0);
        busy.insert("alpha", 0.2);
        busy.insert("calmar", 2.0);
        busy.insert("custom", 7.0);

        let rows = vec![
            OptRow {
                params: vec![("period".into(), 10)],
                result: quiet,
            },
            OptRow {
                params: vec![("period".into(), 20)],
                result: busy,
            },
        ];

        let mut out = Vec::new();
        write_opt_rows(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "period,end_cash,sqn,transactions,win_rate,loss_rate,alpha,calmar,custom"
        );
        assert_eq!(lines[1], "10,30000,0,,,,0.1,1,");
    }
}
