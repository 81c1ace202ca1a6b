//! Average True Range.
//!
//! TR[i] = max(H[i]-L[i], |C[i-1]-H[i]|, |C[i-1]-L[i]|), defined from the
//! second bar on. ATR(n)[i] is the simple average of TR[i-n+1..=i].
//! Warmup: first `n` bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let tr_values: Vec<f64> = bars
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect();

    let mut values = Vec::with_capacity(bars.len());
    let mut window_sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        // tr_values[i - 1] is the true range of bar i
        if i >= 1 {
            window_sum += tr_values[i - 1];
            if i > period {
                window_sum -= tr_values[i - 1 - period];
            }
        }

        let valid = i >= period;
        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: if valid { window_sum / period as f64 } else { 0.0 },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}
