//! Domain error types.

/// Top-level error type for turtletrader.
#[derive(Debug, thiserror::Error)]
pub enum TurtleError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("fetch failed for {ticker}: {reason}")]
    Fetch { ticker: String, reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("insufficient data for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error("unknown strategy parameter: {name}")]
    UnknownParameter { name: String },

    #[error("invalid parameter grid: {reason}")]
    InvalidGrid { reason: String },

    #[error("no completed run")]
    NotRun,

    #[error("chart error: {reason}")]
    Chart { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TurtleError> for std::process::ExitCode {
    fn from(err: &TurtleError) -> Self {
        let code: u8 = match err {
            TurtleError::Io(_) | TurtleError::Chart { .. } => 1,
            TurtleError::ConfigParse { .. }
            | TurtleError::ConfigMissing { .. }
            | TurtleError::ConfigInvalid { .. } => 2,
            TurtleError::Data { .. } | TurtleError::Fetch { .. } => 3,
            TurtleError::UnknownParameter { .. }
            | TurtleError::InvalidGrid { .. }
            | TurtleError::NotRun => 4,
            TurtleError::NoData { .. } | TurtleError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
