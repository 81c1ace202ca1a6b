//! Breakout channel: rolling highest high / lowest low.
//!
//! Both lines look at the previous `n` bars only, so today's bar can break
//! out of the channel. Warmup: first `n` bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_highest(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    rolling_extreme(bars, period, IndicatorType::Highest(period), |b| b.high, f64::max)
}

pub fn calculate_lowest(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    rolling_extreme(bars, period, IndicatorType::Lowest(period), |b| b.low, f64::min)
}

fn rolling_extreme(
    bars: &[OhlcvBar],
    period: usize,
    indicator_type: IndicatorType,
    field: impl Fn(&OhlcvBar) -> f64,
    pick: fn(f64, f64) -> f64,
) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(indicator_type);
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < period {
                IndicatorPoint {
                    date: bar.date,
                    valid: false,
                    value: 0.0,
                }
            } else {
                let value = bars[i - period..i]
                    .iter()
                    .map(&field)
                    .reduce(pick)
                    .unwrap_or(0.0);
                IndicatorPoint {
                    date: bar.date,
                    valid: true,
                    value,
                }
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
