//! Turtle breakout strategy.
//!
//! Enter on a close above the previous `period`-bar high, add a unit each
//! time price advances half an ATR past the last fill (at most
//! [`MAX_UNITS`] units), exit everything on a close below the previous
//! `period`-bar low or two ATRs below the last fill. Units are sized so that
//! a one-ATR move equals [`RISK_PER_UNIT`] of account value, rounded up to
//! whole lots of [`LOT_SIZE`] shares.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::calendar;
use crate::domain::error::TurtleError;
use crate::domain::execution::{Order, OrderRequest, OrderStatus};
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::channel::{calculate_highest, calculate_lowest};
use crate::domain::indicator::{IndicatorSeries, IndicatorType, crossed_above, crossed_below};
use crate::domain::ohlcv::OhlcvBar;

pub const MAX_UNITS: u32 = 4;
pub const RISK_PER_UNIT: f64 = 0.01;
pub const LOT_SIZE: i64 = 100;
pub const PYRAMID_STEP_ATR: f64 = 0.5;
pub const STOP_LOSS_ATR: f64 = 2.0;

/// Per-bar view of one instrument handed to a strategy.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub ticker: &'a str,
    /// History up to and including the current bar.
    pub bars: &'a [OhlcvBar],
    /// Account value (cash plus marked positions).
    pub value: f64,
    pub cash: f64,
    /// Shares currently held in this instrument.
    pub position: i64,
}

impl<'a> BarContext<'a> {
    pub fn index(&self) -> usize {
        self.bars.len().saturating_sub(1)
    }

    pub fn bar(&self) -> Option<&'a OhlcvBar> {
        self.bars.last()
    }
}

/// A per-instrument decision procedure driven by the engine.
pub trait Strategy {
    /// Precompute indicators over the instrument's full bar series.
    fn prepare(&mut self, bars: &[OhlcvBar]);

    /// Decide on at most one order for the current bar.
    fn next(&mut self, ctx: &BarContext<'_>) -> Option<OrderRequest>;

    /// Called by the broker when an order reaches a terminal status.
    fn notify_order(&mut self, order: &Order);
}

/// Builds strategy instances and exposes their tunable parameters to the
/// optimizer.
pub trait StrategyFactory: Clone {
    type Strategy: Strategy;

    fn name(&self) -> &str;

    fn build(&self, ticker: &str) -> Self::Strategy;

    /// Override one named integer parameter.
    fn set_param(&mut self, name: &str, value: i64) -> Result<(), TurtleError>;

    /// Bars an instrument needs before the first evaluation can happen.
    fn min_bars(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurtleParams {
    /// Breakout channel lookback, in sessions.
    pub period: usize,
    /// ATR lookback, in sessions.
    pub atr: usize,
    /// Log every decision at info level instead of debug.
    pub printlog: bool,
}

impl Default for TurtleParams {
    fn default() -> Self {
        TurtleParams {
            period: 20,
            atr: 14,
            printlog: false,
        }
    }
}

impl StrategyFactory for TurtleParams {
    type Strategy = TurtleStrategy;

    fn name(&self) -> &str {
        "TurtleStrategy"
    }

    fn build(&self, ticker: &str) -> TurtleStrategy {
        TurtleStrategy::new(ticker, self.clone())
    }

    fn set_param(&mut self, name: &str, value: i64) -> Result<(), TurtleError> {
        let window = |value: i64| -> Result<usize, TurtleError> {
            if value <= 0 {
                return Err(TurtleError::InvalidGrid {
                    reason: format!("{name} must be positive, got {value}"),
                });
            }
            Ok(value as usize)
        };
        match name {
            "period" => self.period = window(value)?,
            "atr" => self.atr = window(value)?,
            "printlog" => self.printlog = value != 0,
            _ => {
                return Err(TurtleError::UnknownParameter {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn min_bars(&self) -> usize {
        // channel and ATR both need their full window plus one prior bar
        // for the crossover comparison
        self.period.max(self.atr) + 2
    }
}

/// Bookkeeping the strategy keeps between bars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionState {
    pub order_pending: bool,
    /// Fill price of the most recent buy.
    pub buy_price: f64,
    /// Commission paid across all fills.
    pub commission: f64,
    /// Size of the most recent unit.
    pub buy_size: i64,
    /// Units held since the last full exit.
    pub buy_count: u32,
}

pub struct TurtleStrategy {
    ticker: String,
    params: TurtleParams,
    state: PositionState,
    highest: IndicatorSeries,
    lowest: IndicatorSeries,
    atr: IndicatorSeries,
}

impl TurtleStrategy {
    pub fn new(ticker: &str, params: TurtleParams) -> Self {
        TurtleStrategy {
            ticker: ticker.to_string(),
            highest: IndicatorSeries::empty(IndicatorType::Highest(params.period)),
            lowest: IndicatorSeries::empty(IndicatorType::Lowest(params.period)),
            atr: IndicatorSeries::empty(IndicatorType::Atr(params.atr)),
            params,
            state: PositionState::default(),
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn params(&self) -> &TurtleParams {
        &self.params
    }

    fn log(&self, date: NaiveDate, txt: &str) {
        if self.params.printlog {
            info!(ticker = %self.ticker, "{}, {}", date, txt);
        } else {
            debug!(ticker = %self.ticker, "{}, {}", date, txt);
        }
    }

    fn submit(&mut self, request: OrderRequest) -> Option<OrderRequest> {
        self.state.order_pending = true;
        Some(request)
    }
}

/// ceil(value * 1% / ATR / lot) * lot
pub fn unit_size(value: f64, atr: f64) -> i64 {
    if !(atr.is_finite() && atr > 0.0) || value <= 0.0 {
        return 0;
    }
    let lots = (value * RISK_PER_UNIT / atr / LOT_SIZE as f64).ceil();
    lots as i64 * LOT_SIZE
}

impl Strategy for TurtleStrategy {
    fn prepare(&mut self, bars: &[OhlcvBar]) {
        self.highest = calculate_highest(bars, self.params.period);
        self.lowest = calculate_lowest(bars, self.params.period);
        self.atr = calculate_atr(bars, self.params.atr);
    }

    fn next(&mut self, ctx: &BarContext<'_>) -> Option<OrderRequest> {
        if self.state.order_pending {
            return None;
        }
        let bar = ctx.bar()?;
        if !calendar::is_trading_day(bar.date) {
            return None;
        }

        let i = ctx.index();
        let prev = i.checked_sub(1)?;
        let high_line = self.highest.value_at(i)?;
        let prev_high_line = self.highest.value_at(prev)?;
        let low_line = self.lowest.value_at(i)?;
        let prev_low_line = self.lowest.value_at(prev)?;
        let atr = self.atr.value_at(i)?;
        if !(atr.is_finite() && atr > 0.0) {
            return None;
        }

        let close = bar.close;
        let prev_close = ctx.bars[prev].close;
        let buy_signal = crossed_above(prev_close, prev_high_line, close, high_line);
        let sell_signal = crossed_below(prev_close, prev_low_line, close, low_line);
        let count = self.state.buy_count;

        if buy_signal && count == 0 {
            let size = unit_size(ctx.value, atr);
            if size == 0 {
                return None;
            }
            self.state.buy_size = size;
            self.state.buy_count = 1;
            self.log(bar.date, &format!("buy {size} (breakout above {high_line:.2})"));
            return self.submit(OrderRequest::buy(size));
        }

        if count > 0 && count < MAX_UNITS && close > self.state.buy_price + PYRAMID_STEP_ATR * atr
        {
            let size = unit_size(ctx.value, atr);
            if size == 0 {
                return None;
            }
            self.state.buy_size = size;
            self.state.buy_count += 1;
            self.log(bar.date, &format!("buy {size} (unit {})", self.state.buy_count));
            return self.submit(OrderRequest::buy(size));
        }

        let stopped = close < self.state.buy_price - STOP_LOSS_ATR * atr;
        if count > 0 && (sell_signal || stopped) {
            self.state.buy_count = 0;
            if ctx.position <= 0 {
                return None;
            }
            let reason = if sell_signal { "breakdown" } else { "stop loss" };
            self.log(bar.date, &format!("sell {} ({reason})", ctx.position));
            return self.submit(OrderRequest::sell(ctx.position));
        }

        None
    }

    fn notify_order(&mut self, order: &Order) {
        if order.status == OrderStatus::Submitted {
            return;
        }
        if order.status.is_failure() {
            self.log(order.created, &format!("transaction fail ({})", order.status));
            // the unit never landed
            if order.is_buy() {
                self.state.buy_count = self.state.buy_count.saturating_sub(1);
            }
        } else if let Some(exec) = &order.executed {
            let side = if order.is_buy() { "buy" } else { "sell" };
            self.log(
                exec.date,
                &format!(
                    "{side} with price: {:.2}, value: {:.2}, commission: {:.2}",
                    exec.price, exec.value, exec.commission
                ),
            );
            if order.is_buy() {
                self.state.buy_price = exec.price;
            }
            self.state.commission += exec.commission;
        }
        self.state.order_pending = false;
    }
}
