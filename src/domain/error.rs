//! Domain error types.

/// Top-level error type for marketscan.
#[derive(Debug, thiserror::Error)]
pub enum MarketscanError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

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

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("insufficient data for {code}: have {bars} bars, need {minimum}")]
    InsufficientData {
        code: String,
        bars: usize,
        minimum: usize,
    },

    #[error("scan cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&MarketscanError> for std::process::ExitCode {
    fn from(err: &MarketscanError) -> Self {
        let code: u8 = match err {
            MarketscanError::Io(_) => 1,
            MarketscanError::ConfigParse { .. }
            | MarketscanError::ConfigMissing { .. }
            | MarketscanError::ConfigInvalid { .. } => 2,
            MarketscanError::Database { .. } | MarketscanError::DatabaseQuery { .. } => 3,
            MarketscanError::InvalidParameter { .. } => 4,
            MarketscanError::NoData { .. } | MarketscanError::InsufficientData { .. } => 5,
            MarketscanError::Cancelled => 6,
        };
        std::process::ExitCode::from(code)
    }
}
