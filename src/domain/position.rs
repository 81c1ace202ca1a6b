//! Open positions and closed trades, as tracked by the broker.

use chrono::NaiveDate;

/// One open position lineage: from the first fill off flat until the
/// position returns to flat.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub ticker: String,
    pub size: i64,
    /// Size-weighted average fill price of the shares currently held.
    pub avg_price: f64,
    pub entry_date: NaiveDate,
    /// Commission paid on every fill of this lineage so far.
    pub commission: f64,
    /// Realised price PnL from partial reductions.
    pub realized_pnl: f64,
    /// Largest size held at any point.
    pub peak_size: i64,
    /// Number of buy fills (entry plus pyramid adds).
    pub units: u32,
}

impl Position {
    pub fn open(ticker: &str, size: i64, price: f64, date: NaiveDate, commission: f64) -> Self {
        Position {
            ticker: ticker.to_string(),
            size,
            avg_price: price,
            entry_date: date,
            commission,
            realized_pnl: 0.0,
            peak_size: size,
            units: 1,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.size as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.size as f64 * (price - self.avg_price)
    }

    /// Add shares at `price`, re-averaging the entry price.
    pub fn add(&mut self, size: i64, price: f64, commission: f64) {
        let total = self.size + size;
        self.avg_price =
            (self.avg_price * self.size as f64 + price * size as f64) / total as f64;
        self.size = total;
        self.commission += commission;
        self.peak_size = self.peak_size.max(total);
        self.units += 1;
    }

    /// Remove shares at `price`, returning the realised price PnL.
    pub fn reduce(&mut self, size: i64, price: f64, commission: f64) -> f64 {
        let pnl = size as f64 * (price - self.avg_price);
        self.size -= size;
        self.commission += commission;
        self.realized_pnl += pnl;
        pnl
    }

    pub fn is_flat(&self) -> bool {
        self.size == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub ticker: String,
    pub size: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    /// Price PnL before commission.
    pub pnl: f64,
    /// PnL net of every commission paid in the lineage.
    pub pnl_net: f64,
    pub commission: f64,
    pub units: u32,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl_net > 0.0
    }
}
