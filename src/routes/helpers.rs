//! Shared helper functions for Rocket route handlers.

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::ApiError;

const DEMO_CODE_PREFIX: &str = "DEMO";
const DEMO_CODE_SUFFIX_LEN: usize = 4;

/// Turn a zero-row mutation into [`ApiError::NotFound`].
pub fn ensure_affected(rows_affected: u64, what: &str, id: impl std::fmt::Display) -> Result<(), ApiError> {
    if rows_affected == 0 {
        Err(ApiError::NotFound(format!("{what} {id} not found")))
    } else {
        Ok(())
    }
}

/// Reject blank required text fields.
pub fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::BadRequest(format!("{field} is required")))
    } else {
        Ok(trimmed)
    }
}

/// `DEMO` followed by four upper-case letters or digits.
pub fn generate_demo_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DEMO_CODE_SUFFIX_LEN)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect();
    format!("{DEMO_CODE_PREFIX}{suffix}")
}
