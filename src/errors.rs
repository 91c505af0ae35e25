use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any state mutation.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Internal fault inside an asynchronous operation; no partial state
    /// was committed.
    #[error("computation failed: {0}")]
    Computation(String),
    #[error("not found: {0}")]
    NotFound(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Empty or whitespace-only identifiers are rejected up front.
pub fn require_id(value: &str, field: &str) -> EngineResult<()> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
