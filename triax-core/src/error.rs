//! Error types for the planning core.
//!
//! No panics cross the library boundary; every fallible operation returns
//! [`Result`]. Numerical degeneracies inside the geometric kernel are not
//! errors: the offending primitive is skipped and a warning is logged.

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Caller passed NaN, infinite or empty input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A pipeline stage was queried before its prerequisites were computed,
    /// or after the instrument space changed underneath it.
    #[error("pipeline stage not available: {0}")]
    StageInvalid(&'static str),

    /// A computation was cancelled cooperatively.
    #[error("calculation cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed instrument definition or configuration file.
    #[error("format error: {0}")]
    Format(String),
}

impl From<serde_yaml::Error> for CoreError {
    fn from(e: serde_yaml::Error) -> Self {
        CoreError::Format(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
