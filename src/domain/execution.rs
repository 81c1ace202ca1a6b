//! Order model and fill simulation.
//!
//! Market orders only. An order submitted on one bar is filled at the open of
//! the instrument's next bar; the caller supplies that price. Commission is a
//! flat percentage of traded notional.

use chrono::NaiveDate;
use std::fmt;

use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Fraction of notional charged per fill, e.g. 0.01 for 1%.
    pub commission_rate: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Submitted,
    Completed,
    Canceled,
    Margin,
    Rejected,
}

impl OrderStatus {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            OrderStatus::Canceled | OrderStatus::Margin | OrderStatus::Rejected
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Submitted => "Submitted",
            OrderStatus::Completed => "Completed",
            OrderStatus::Canceled => "Canceled",
            OrderStatus::Margin => "Margin",
            OrderStatus::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

/// What a strategy asks the broker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRequest {
    pub side: OrderSide,
    pub size: i64,
}

impl OrderRequest {
    pub fn buy(size: i64) -> Self {
        OrderRequest {
            side: OrderSide::Buy,
            size,
        }
    }

    pub fn sell(size: i64) -> Self {
        OrderRequest {
            side: OrderSide::Sell,
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub date: NaiveDate,
    pub price: f64,
    pub value: f64,
    pub commission: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: u64,
    pub ticker: String,
    pub side: OrderSide,
    pub size: i64,
    pub status: OrderStatus,
    pub created: NaiveDate,
    pub executed: Option<Execution>,
}

impl Order {
    pub fn new(id: u64, ticker: &str, request: OrderRequest, created: NaiveDate) -> Self {
        Order {
            id,
            ticker: ticker.to_string(),
            side: request.side,
            size: request.size,
            status: OrderStatus::Submitted,
            created,
            executed: None,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.side == OrderSide::Buy
    }
}

/// Commission: |notional| * rate.
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    trade_value.abs() * config.commission_rate
}

/// Fill `order` at `price` on `date`, updating the portfolio.
///
/// Sets the order's terminal status:
/// - `Rejected` for a non-positive size or a sell larger than the position
/// - `Margin` for a buy whose cost plus commission exceeds cash
/// - `Completed` otherwise, with `executed` filled in
///
/// A sell that brings the position back to flat records a `ClosedTrade`.
pub fn execute_order(
    portfolio: &mut Portfolio,
    order: &mut Order,
    price: f64,
    date: NaiveDate,
    config: &ExecutionConfig,
) {
    if order.size <= 0 || !price.is_finite() || price <= 0.0 {
        order.status = OrderStatus::Rejected;
        return;
    }

    let value = order.size as f64 * price;
    let commission = calculate_commission(value, config);

    match order.side {
        OrderSide::Buy => {
            if value + commission > portfolio.cash {
                order.status = OrderStatus::Margin;
                return;
            }
            portfolio.cash -= value + commission;
            match portfolio.get_position_mut(&order.ticker) {
                Some(pos) => pos.add(order.size, price, commission),
                None => portfolio.add_position(Position::open(
                    &order.ticker,
                    order.size,
                    price,
                    date,
                    commission,
                )),
            }
        }
        OrderSide::Sell => {
            let held = portfolio.position_size(&order.ticker);
            if order.size > held {
                order.status = OrderStatus::Rejected;
                return;
            }
            portfolio.cash += value - commission;
            let flat = match portfolio.get_position_mut(&order.ticker) {
                Some(pos) => {
                    pos.reduce(order.size, price, commission);
                    pos.is_flat()
                }
                None => false,
            };
            if flat {
                close_lineage(portfolio, &order.ticker, price, date);
            }
        }
    }

    order.status = OrderStatus::Completed;
    order.executed = Some(Execution {
        date,
        price,
        value,
        commission,
    });
}

fn close_lineage(portfolio: &mut Portfolio, ticker: &str, exit_price: f64, exit_date: NaiveDate) {
    if let Some(position) = portfolio.remove_position(ticker) {
        let trade = ClosedTrade {
            ticker: position.ticker,
            size: position.peak_size,
            entry_price: position.avg_price,
            exit_price,
            entry_date: position.entry_date,
            exit_date,
            pnl: position.realized_pnl,
            pnl_net: position.realized_pnl - position.commission,
            commission: position.commission,
            units: position.units,
        };
        portfolio.record_trade(trade);
    }
}
