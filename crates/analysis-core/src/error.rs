use thiserror::Error;

/// The disclosure registry could not provide usable data. Always surfaced to
/// the caller.
#[derive(Error, Debug)]
pub enum UpstreamDataError {
    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("No annual financial facts available for {0}")]
    NoFinancialData(String),

    #[error("No annual report filing found for {0}")]
    NoFiling(String),

    #[error("Registry unreachable: {0}")]
    Unreachable(String),

    #[error("Registry returned HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Invalid registry payload: {0}")]
    InvalidPayload(String),
}

impl UpstreamDataError {
    /// True when the registry answered but has nothing for the ticker.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            UpstreamDataError::UnknownTicker(_)
                | UpstreamDataError::NoFinancialData(_)
                | UpstreamDataError::NoFiling(_)
        )
    }
}

/// Malformed request parameters, rejected before reaching the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("years must be between 1 and {max}, got {got}")]
    YearsOutOfRange { got: u32, max: u32 },

    #[error("Unsupported output language: {0:?} (expected \"en\" or \"ja\")")]
    UnsupportedLanguage(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Upstream(#[from] UpstreamDataError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
