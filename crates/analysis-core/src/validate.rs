//! Request parameter validation. Runs before anything reaches the engine.

use crate::ValidationError;

pub const DEFAULT_YEARS: u32 = 4;
pub const MAX_YEARS: u32 = 20;
pub const MAX_QUESTION_CHARS: usize = 2000;
pub const MAX_HORIZON: u32 = 5;

/// Normalize a ticker to upper case; 1-10 chars of `[A-Za-z0-9.-]`.
pub fn ticker(raw: &str) -> Result<String, ValidationError> {
    let t = raw.trim();
    let valid = !t.is_empty()
        && t.len() <= 10
        && t.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid {
        return Err(ValidationError::InvalidTicker(raw.to_string()));
    }
    Ok(t.to_ascii_uppercase())
}

pub fn years(raw: Option<u32>) -> Result<usize, ValidationError> {
    let y = raw.unwrap_or(DEFAULT_YEARS);
    if y == 0 || y > MAX_YEARS {
        return Err(ValidationError::YearsOutOfRange { got: y, max: MAX_YEARS });
    }
    Ok(y as usize)
}

/// Forecast horizon in years, 1 to [`MAX_HORIZON`].
pub fn horizon(raw: Option<u32>, default: usize) -> Result<usize, ValidationError> {
    let Some(h) = raw else {
        return Ok(default);
    };
    if h == 0 || h > MAX_HORIZON {
        return Err(ValidationError::InvalidParameter {
            name: "horizon",
            reason: format!("must be between 1 and {}, got {}", MAX_HORIZON, h),
        });
    }
    Ok(h as usize)
}

pub fn question(raw: &str) -> Result<String, ValidationError> {
    let q = raw.trim();
    if q.is_empty() {
        return Err(ValidationError::InvalidParameter {
            name: "question",
            reason: "must not be empty".to_string(),
        });
    }
    if q.chars().count() > MAX_QUESTION_CHARS {
        return Err(ValidationError::InvalidParameter {
            name: "question",
            reason: format!("longer than {} characters", MAX_QUESTION_CHARS),
        });
    }
    Ok(q.to_string())
}
