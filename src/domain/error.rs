//! Domain error types.

/// Top-level error type for fundtrader.
#[derive(Debug, thiserror::Error)]
pub enum FundtraderError {
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

    #[error("unknown strategy: {name} (available: {available})")]
    UnknownStrategy { name: String, available: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FundtraderError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        FundtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        FundtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    /// True for errors that reject a run before any simulation happens.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FundtraderError::ConfigParse { .. }
                | FundtraderError::ConfigMissing { .. }
                | FundtraderError::ConfigInvalid { .. }
        )
    }
}

impl From<&FundtraderError> for std::process::ExitCode {
    fn from(err: &FundtraderError) -> Self {
        let code: u8 = match err {
            FundtraderError::Io(_) => 1,
            FundtraderError::ConfigParse { .. }
            | FundtraderError::ConfigMissing { .. }
            | FundtraderError::ConfigInvalid { .. } => 2,
            FundtraderError::Database { .. } | FundtraderError::DatabaseQuery { .. } => 3,
            FundtraderError::UnknownStrategy { .. } => 4,
            FundtraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
