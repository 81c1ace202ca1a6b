//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::cached_data_adapter::CachedDataAdapter;
use crate::adapters::csv_adapter::{CsvAdapter, write_opt_rows};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::svg_chart_adapter::SvgChartAdapter;
use crate::domain::config_validation::{
    load_backtest_config, load_param_grid, load_strategy_params, parse_tickers,
    validate_backtest_config, validate_strategy_params,
};
use crate::domain::error::TurtleError;
use crate::domain::optimize::{ParamGrid, ParamRange};
use crate::domain::orchestrator::{BackTest, BackTestConfig};
use crate::domain::strategy::TurtleParams;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "turtletrader", about = "Turtle trend-following backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single backtest and print its result
    Run {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Sweep strategy parameters and print one CSV row per combination
    Optimize {
        #[command(flatten)]
        common: CommonArgs,
        /// Swept parameter, e.g. `period=10..50`; repeatable. Replaces the
        /// `[optimize]` section of the config file.
        #[arg(long = "param", value_name = "NAME=RANGE")]
        params: Vec<ParamRange>,
    },
    /// Populate the local cache for the configured tickers and benchmark
    Fetch {
        #[command(flatten)]
        common: CommonArgs,
        /// Re-download tickers that are already cached
        #[arg(long)]
        force: bool,
    },
}

/// Options shared by every subcommand. Each one overrides the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,
    /// Exclusive
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<NaiveDate>,
    /// Comma-separated ticker list
    #[arg(long)]
    pub tickers: Option<String>,
    #[arg(long)]
    pub cash: Option<f64>,
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    #[arg(long)]
    pub commission: Option<f64>,
    #[arg(long)]
    pub benchmark: Option<String>,
    /// Write BackTest.svg to the working directory after the run
    #[arg(long)]
    pub draw_result: bool,
    #[arg(long)]
    pub period: Option<usize>,
    #[arg(long)]
    pub atr: Option<usize>,
    /// Log every strategy decision at info level
    #[arg(long)]
    pub printlog: bool,
    /// Never contact the remote provider; missing cache files are errors
    #[arg(long)]
    pub offline: bool,
}

/// Fully resolved settings for one command.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backtest: BackTestConfig,
    pub strategy: TurtleParams,
    pub grid: ParamGrid,
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Run { common } => run_single(&common),
        Command::Optimize { common, params } => run_optimize(&common, params),
        Command::Fetch { common, force } => run_fetch(&common, force),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Load the INI file, or an empty configuration when none is given.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, TurtleError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path).map_err(|e| TurtleError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })
        }
        None => FileConfigAdapter::from_string("").map_err(|reason| TurtleError::ConfigParse {
            file: "<defaults>".to_string(),
            reason,
        }),
    }
}

/// Config file values, then command-line overrides, then validation.
pub fn resolve_settings(
    common: &CommonArgs,
    params: Vec<ParamRange>,
) -> Result<Settings, TurtleError> {
    let file = load_config(common.config.as_deref())?;
    let mut backtest = load_backtest_config(&file)?;
    let mut strategy = load_strategy_params(&file)?;

    if let Some(start) = common.start {
        backtest.start_date = start;
    }
    if let Some(end) = common.end {
        backtest.end_date = end;
    }
    if let Some(tickers) = &common.tickers {
        backtest.tickers = parse_tickers(tickers);
    }
    if let Some(cash) = common.cash {
        backtest.initial_cash = cash;
    }
    if let Some(dir) = &common.data_dir {
        backtest.data_dir = dir.clone();
    }
    if let Some(commission) = common.commission {
        backtest.commission = commission;
    }
    if let Some(benchmark) = &common.benchmark {
        backtest.benchmark = benchmark.clone();
    }
    if common.draw_result {
        backtest.draw_result = true;
    }
    if let Some(period) = common.period {
        strategy.period = period;
    }
    if let Some(atr) = common.atr {
        strategy.atr = atr;
    }
    if common.printlog {
        strategy.printlog = true;
    }

    validate_backtest_config(&backtest)?;
    validate_strategy_params(&strategy)?;

    let grid = if params.is_empty() {
        load_param_grid(&file)?
    } else {
        let mut grid = ParamGrid::new();
        for range in params {
            grid.add(range)?;
        }
        grid
    };

    Ok(Settings {
        backtest,
        strategy,
        grid,
    })
}

/// Cache directory in front of the remote provider, unless `offline`.
pub fn build_data_source(
    config: &BackTestConfig,
    offline: bool,
) -> Result<CachedDataAdapter, TurtleError> {
    let cache = CsvAdapter::new(config.data_dir.clone());
    let remote: Option<Box<dyn DataPort>> = if offline {
        None
    } else {
        remote_source()?
    };
    Ok(CachedDataAdapter::new(cache, remote))
}

#[cfg(feature = "yahoo")]
fn remote_source() -> Result<Option<Box<dyn DataPort>>, TurtleError> {
    use crate::adapters::yahoo_adapter::YahooAdapter;
    Ok(Some(Box::new(YahooAdapter::new()?)))
}

#[cfg(not(feature = "yahoo"))]
fn remote_source() -> Result<Option<Box<dyn DataPort>>, TurtleError> {
    warn!("built without the yahoo feature, only cached data is available");
    Ok(None)
}

fn run_single(common: &CommonArgs) -> Result<(), TurtleError> {
    let settings = resolve_settings(common, Vec::new())?;
    let data = build_data_source(&settings.backtest, common.offline)?;
    let mut backtest = BackTest::new(settings.strategy, settings.backtest, &data)?
        .with_chart(Box::new(SvgChartAdapter::new(PathBuf::from("."))));

    let result = backtest.run()?;
    print!("{result}");
    println!();
    backtest.output()
}

fn run_optimize(common: &CommonArgs, params: Vec<ParamRange>) -> Result<(), TurtleError> {
    let settings = resolve_settings(common, params)?;
    if settings.grid.is_empty() {
        return Err(TurtleError::InvalidGrid {
            reason: "no parameters to sweep, use --param or an [optimize] section".into(),
        });
    }
    let data = build_data_source(&settings.backtest, common.offline)?;
    let backtest = BackTest::new(settings.strategy, settings.backtest, &data)?;

    let rows = backtest.opt_run(&settings.grid)?;
    write_opt_rows(&rows, io::stdout().lock())
}

fn run_fetch(common: &CommonArgs, force: bool) -> Result<(), TurtleError> {
    let settings = resolve_settings(common, Vec::new())?;
    let config = &settings.backtest;
    let data = build_data_source(config, common.offline)?;

    let mut tickers = config.tickers.clone();
    if !tickers.contains(&config.benchmark) {
        tickers.push(config.benchmark.clone());
    }

    for ticker in &tickers {
        if force || !data.cache().exists(ticker) {
            data.refresh(ticker, config.start_date, config.end_date)?;
        }
        match data.get_data_range(ticker)? {
            Some((first, last, count)) => {
                println!("{ticker}: {count} bars, {first} to {last}");
            }
            None => warn!(ticker = ticker.as_str(), "cache holds no bars"),
        }
    }
    Ok(())
}
