use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Provider quota exhausted (HTTP {status}): {body}")]
    QuotaExceeded { status: u16, body: String },

    #[error("Provider rejected the credential (HTTP {0})")]
    Unauthorized(u16),

    #[error("Timeout")]
    Timeout,

    #[error("Provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// Longest error body kept in messages and logs.
const MAX_ERROR_BODY: usize = 500;

impl LlmError {
    /// Classify a non-success provider response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        if status == 429 || status == 402 || body.contains("insufficient_quota") {
            LlmError::QuotaExceeded { status, body }
        } else if status == 401 || status == 403 {
            LlmError::Unauthorized(status)
        } else {
            LlmError::Http { status, body }
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else {
            LlmError::Transport(e.to_string())
        }
    }
}
