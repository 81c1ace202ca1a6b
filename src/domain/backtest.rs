//! Backtest engine and event loop.
//!
//! Walks a unified date timeline, restricted to `[start_date, end_date)`.
//! On every date, for each instrument that has a bar:
//!
//! 1. the order pending from its previous bar is filled at today's open and
//!    the strategy is notified,
//! 2. the portfolio is marked to today's closes and the equity point recorded,
//! 3. the strategy sees the history up to today's close and may submit one
//!    new order.
//!
//! Orders still pending after the last date are canceled.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use super::execution::{ExecutionConfig, Order, OrderStatus, execute_order};
use super::instrument::InstrumentData;
use super::portfolio::Portfolio;
use super::strategy::{BarContext, Strategy, StrategyFactory};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub commission_rate: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    /// Every order in submission order, with its terminal status.
    pub orders: Vec<Order>,
}

impl BacktestResult {
    pub fn final_value(&self) -> f64 {
        self.portfolio
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.portfolio.initial_capital)
    }
}

pub fn run_backtest<F: StrategyFactory>(
    instruments: &[InstrumentData],
    timeline: &[NaiveDate],
    factory: &F,
    config: &BacktestConfig,
) -> BacktestResult {
    let exec_config = ExecutionConfig {
        commission_rate: config.commission_rate,
    };
    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut strategies: Vec<F::Strategy> = instruments
        .iter()
        .map(|data| {
            let mut strategy = factory.build(&data.ticker);
            strategy.prepare(&data.bars);
            strategy
        })
        .collect();
    let mut pending: Vec<Option<Order>> = vec![None; instruments.len()];
    let mut orders: Vec<Order> = Vec::new();
    let mut last_close: HashMap<String, f64> = HashMap::new();
    let mut next_id = 1u64;

    let in_range = |date: &&NaiveDate| **date >= config.start_date && **date < config.end_date;
    for &date in timeline.iter().filter(in_range) {
        for (k, data) in instruments.iter().enumerate() {
            let Some(idx) = data.get_bar_index(date) else {
                continue;
            };
            let bar = &data.bars[idx];
            if let Some(mut order) = pending[k].take() {
                execute_order(&mut portfolio, &mut order, bar.open, date, &exec_config);
                debug!(
                    ticker = %order.ticker,
                    id = order.id,
                    status = %order.status,
                    "order processed"
                );
                strategies[k].notify_order(&order);
                orders.push(order);
            }
            last_close.insert(data.ticker.clone(), bar.close);
        }

        let value = portfolio.total_equity(&last_close);
        portfolio.record_equity(date, value);

        for (k, data) in instruments.iter().enumerate() {
            let Some(idx) = data.get_bar_index(date) else {
                continue;
            };
            let ctx = BarContext {
                ticker: &data.ticker,
                bars: &data.bars[..=idx],
                value,
                cash: portfolio.cash,
                position: portfolio.position_size(&data.ticker),
            };
            if let Some(request) = strategies[k].next(&ctx) {
                pending[k] = Some(Order::new(next_id, &data.ticker, request, date));
                next_id += 1;
            }
        }
    }

    for (k, slot) in pending.iter_mut().enumerate() {
        if let Some(mut order) = slot.take() {
            order.status = OrderStatus::Canceled;
            strategies[k].notify_order(&order);
            orders.push(order);
        }
    }

    BacktestResult { portfolio, orders }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar::next_trading_day;
    use crate::domain::execution::{OrderRequest, OrderSide};
    use crate::domain::instrument::build_unified_timeline;
    use crate::domain::error::TurtleError;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::strategy::TurtleParams;

    fn trading_bars(ticker: &str, closes: &[f64]) -> Vec<OhlcvBar> {
        let mut date = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        closes
            .iter()
            .map(|&close| {
                let bar = OhlcvBar {
                    ticker: ticker.to_string(),
                    date,
                    open: close,
                    high: close + 0.5,
                    low: close - 0.5,
                    close,
                    volume: 1000,
                };
                date = next_trading_day(date);
                bar
            })
            .collect()
    }

    fn config(cash: f64) -> BacktestConfig {
        BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            initial_capital: cash,
            commission_rate: 0.0,
        }
    }

    /// Buys `size` on the bar at `at`, then sells everything on the bar at
    /// `exit`.
    #[derive(Clone)]
    struct Scripted {
        at: usize,
        exit: usize,
        size: i64,
    }

    struct ScriptedStrategy {
        script: Scripted,
    }

    impl Strategy for ScriptedStrategy {
        fn prepare(&mut self, _bars: &[OhlcvBar]) {}

        fn next(&mut self, ctx: &BarContext<'_>) -> Option<OrderRequest> {
            let i = ctx.index();
            if i == self.script.at {
                Some(OrderRequest::buy(self.script.size))
            } else if i == self.script.exit && ctx.position > 0 {
                Some(OrderRequest::sell(ctx.position))
            } else {
                None
            }
        }

        fn notify_order(&mut self, _order: &Order) {}
    }

    impl StrategyFactory for Scripted {
        type Strategy = ScriptedStrategy;

        fn name(&self) -> &str {
            "Scripted"
        }

        fn build(&self, _ticker: &str) -> ScriptedStrategy {
            ScriptedStrategy {
                script: self.clone(),
            }
        }

        fn set_param(&mut self, name: &str, _value: i64) -> Result<(), TurtleError> {
            Err(TurtleError::UnknownParameter {
                name: name.to_string(),
            })
        }

        fn min_bars(&self) -> usize {
            1
        }
    }

    fn run_single(closes: &[f64], script: Scripted, cash: f64) -> BacktestResult {
        let data = vec![InstrumentData::new("AAPL", trading_bars("AAPL", closes))];
        let timeline = build_unified_timeline(&data);
        run_backtest(&data, &timeline, &script, &config(cash))
    }

    #[test]
    fn fills_at_next_bar_open() {
        let result = run_single(
            &[100.0, 101.0, 102.0, 103.0],
            Scripted {
                at: 0,
                exit: 99,
                size: 10,
            },
            10_000.0,
        );

        assert_eq!(result.orders.len(), 1);
        let order = &result.orders[0];
        assert_eq!(order.status, OrderStatus::Completed);
        let exec = order.executed.as_ref().unwrap();
        assert!((exec.price - 101.0).abs() < f64::EPSILON);
        assert_eq!(result.portfolio.position_size("AAPL"), 10);
        // 10_000 - 1010 cash + 10 * 103 marked
        assert!((result.final_value() - 10_020.0).abs() < 1e-9);
    }

    #[test]
    fn equity_recorded_for_every_date() {
        let result = run_single(
            &[100.0; 6],
            Scripted {
                at: 99,
                exit: 99,
                size: 1,
            },
            5000.0,
        );
        assert_eq!(result.portfolio.equity_curve.len(), 6);
        assert!(
            result
                .portfolio
                .equity_curve
                .iter()
                .all(|p| (p.equity - 5000.0).abs() < f64::EPSILON)
        );
    }

    #[test]
    fn order_on_last_bar_is_canceled() {
        let result = run_single(
            &[100.0, 101.0, 102.0],
            Scripted {
                at: 2,
                exit: 99,
                size: 10,
            },
            10_000.0,
        );
        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.orders[0].status, OrderStatus::Canceled);
        assert!((result.portfolio.cash - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unaffordable_order_is_margin() {
        let result = run_single(
            &[100.0, 100.0, 100.0],
            Scripted {
                at: 0,
                exit: 99,
                size: 1000,
            },
            10_000.0,
        );
        assert_eq!(result.orders[0].status, OrderStatus::Margin);
        assert!(result.portfolio.positions.is_empty());
    }

    #[test]
    fn round_trip_closes_trade() {
        let result = run_single(
            &[100.0, 100.0, 110.0, 120.0, 120.0],
            Scripted {
                at: 0,
                exit: 2,
                size: 10,
            },
            10_000.0,
        );
        assert_eq!(result.orders.len(), 2);
        assert_eq!(result.orders[1].side, OrderSide::Sell);
        assert_eq!(result.portfolio.closed_trades.len(), 1);
        let trade = &result.portfolio.closed_trades[0];
        // bought at 100 (open of bar 1), sold at 120 (open of bar 3)
        assert!((trade.pnl - 200.0).abs() < 1e-9);
        assert!((result.final_value() - 10_200.0).abs() < 1e-9);
    }

    #[test]
    fn instruments_only_trade_on_their_own_dates() {
        let aapl = trading_bars("AAPL", &[100.0, 100.0, 100.0, 100.0]);
        // MSFT misses the second date
        let mut msft = trading_bars("MSFT", &[50.0, 50.0, 50.0, 50.0]);
        msft.remove(1);
        let data = vec![
            InstrumentData::new("AAPL", aapl),
            InstrumentData::new("MSFT", msft),
        ];
        let timeline = build_unified_timeline(&data);
        assert_eq!(timeline.len(), 4);

        let script = Scripted {
            at: 0,
            exit: 99,
            size: 10,
        };
        let result = run_backtest(&data, &timeline, &script, &config(10_000.0));

        let msft_order = result.orders.iter().find(|o| o.ticker == "MSFT").unwrap();
        // submitted on the first date, filled on MSFT's next bar, the third date
        assert_eq!(msft_order.executed.as_ref().unwrap().date, timeline[2]);
    }

    #[test]
    fn flat_market_turtle_run_never_trades() {
        let data = vec![InstrumentData::new("AAPL", trading_bars("AAPL", &[100.0; 80]))];
        let timeline = build_unified_timeline(&data);
        let result = run_backtest(&data, &timeline, &TurtleParams::default(), &config(30_000.0));
        assert!(result.orders.is_empty());
        assert!((result.final_value() - 30_000.0).abs() < f64::EPSILON);
    }
}
