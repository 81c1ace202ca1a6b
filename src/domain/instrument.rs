//! Per-ticker bar series and the unified date timeline.

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub ticker: String,
    pub bars: Vec<OhlcvBar>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl InstrumentData {
    /// Bars are sorted by date on construction; duplicate dates keep the
    /// last occurrence.
    pub fn new(ticker: &str, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by(|later, earlier| {
            if later.date == earlier.date {
                *earlier = later.clone();
                true
            } else {
                false
            }
        });
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            ticker: ticker.to_string(),
            bars,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }
}

/// Sorted union of every date any series has a bar for.
pub fn build_unified_timeline<'a, I>(series: I) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = &'a InstrumentData>,
{
    let unique_dates: BTreeSet<NaiveDate> = series
        .into_iter()
        .flat_map(|data| data.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
