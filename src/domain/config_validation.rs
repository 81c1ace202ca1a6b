//! Reading and validating the `[backtest]`, `[strategy]` and `[optimize]`
//! sections.
//!
//! Keys missing from the file keep the built-in defaults; keys present with
//! an unusable value are errors. Validation runs on the assembled values so
//! command-line overrides are checked the same way as file values.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::domain::error::TurtleError;
use crate::domain::optimize::{ParamGrid, ParamRange};
use crate::domain::orchestrator::BackTestConfig;
use crate::domain::strategy::TurtleParams;
use crate::ports::config_port::ConfigPort;

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BackTestConfig, TurtleError> {
    let defaults = BackTestConfig::default();
    let start_date = match config.get_string("backtest", "start_date") {
        Some(s) => parse_date(&s, "start_date")?,
        None => defaults.start_date,
    };
    let end_date = match config.get_string("backtest", "end_date") {
        Some(s) => parse_date(&s, "end_date")?,
        None => defaults.end_date,
    };
    let tickers = match config.get_string("backtest", "tickers") {
        Some(s) => parse_tickers(&s),
        None => defaults.tickers,
    };
    let data_dir = config
        .get_string("backtest", "data_dir")
        .map(PathBuf::from)
        .unwrap_or(defaults.data_dir);
    let benchmark = config
        .get_string("backtest", "benchmark")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(defaults.benchmark);

    Ok(BackTestConfig {
        start_date,
        end_date,
        data_dir,
        tickers,
        initial_cash: config.get_double("backtest", "initial_capital", defaults.initial_cash),
        commission: config.get_double("backtest", "commission", defaults.commission),
        benchmark,
        draw_result: config.get_bool("backtest", "draw_result", defaults.draw_result),
    })
}

pub fn load_strategy_params(config: &dyn ConfigPort) -> Result<TurtleParams, TurtleError> {
    let defaults = TurtleParams::default();
    let period = config.get_int("strategy", "period", defaults.period as i64);
    let atr = config.get_int("strategy", "atr", defaults.atr as i64);
    Ok(TurtleParams {
        period: window(period, "period")?,
        atr: window(atr, "atr")?,
        printlog: config.get_bool("strategy", "printlog", defaults.printlog),
    })
}

/// One range per key of `[optimize]`, e.g. `period = 10..50`.
pub fn load_param_grid(config: &dyn ConfigPort) -> Result<ParamGrid, TurtleError> {
    let mut grid = ParamGrid::new();
    for key in config.keys("optimize") {
        let text = config.get_string("optimize", &key).unwrap_or_default();
        let range = ParamRange::parse_values(&key, &text).map_err(|e| TurtleError::ConfigInvalid {
            section: "optimize".to_string(),
            key: key.clone(),
            reason: e.to_string(),
        })?;
        grid.add(range)?;
    }
    Ok(grid)
}

pub fn validate_backtest_config(config: &BackTestConfig) -> Result<(), TurtleError> {
    validate_initial_cash(config)?;
    validate_commission(config)?;
    validate_dates(config)?;
    validate_tickers(config)?;
    Ok(())
}

pub fn validate_strategy_params(params: &TurtleParams) -> Result<(), TurtleError> {
    window(params.period as i64, "period")?;
    window(params.atr as i64, "atr")?;
    Ok(())
}

pub fn parse_tickers(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, TurtleError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| TurtleError::ConfigInvalid {
        section: "backtest".to_string(),
        key: field.to_string(),
        reason: format!("invalid {} format, expected YYYY-MM-DD", field),
    })
}

fn window(value: i64, key: &str) -> Result<usize, TurtleError> {
    if value < 1 {
        return Err(TurtleError::ConfigInvalid {
            section: "strategy".to_string(),
            key: key.to_string(),
            reason: format!("{key} must be at least 1"),
        });
    }
    Ok(value as usize)
}

fn validate_initial_cash(config: &BackTestConfig) -> Result<(), TurtleError> {
    if config.initial_cash.is_nan() || config.initial_cash <= 0.0 {
        return Err(TurtleError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_capital".to_string(),
            reason: "initial_capital must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_commission(config: &BackTestConfig) -> Result<(), TurtleError> {
    if config.commission.is_nan() || config.commission < 0.0 {
        return Err(TurtleError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "commission".to_string(),
            reason: "commission must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_dates(config: &BackTestConfig) -> Result<(), TurtleError> {
    if config.start_date >= config.end_date {
        return Err(TurtleError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "start_date".to_string(),
            reason: "start_date must be before end_date".to_string(),
        });
    }
    Ok(())
}

fn validate_tickers(config: &BackTestConfig) -> Result<(), TurtleError> {
    if config.tickers.is_empty() {
        return Err(TurtleError::ConfigMissing {
            section: "backtest".to_string(),
            key: "tickers".to_string(),
        });
    }
    Ok(())
}
