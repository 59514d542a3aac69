//! Error types for window construction and resizing.

use std::time::Duration;

use thiserror::Error;

/// Errors raised when a window's geometry is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window span {0:?} must be positive")]
    InvalidSpan(Duration),

    #[error("granularity {0:?} must be a positive whole number of seconds")]
    InvalidGranularity(Duration),

    #[error("window span {span:?} must be a whole multiple of granularity {granularity:?}")]
    NotMultiple { span: Duration, granularity: Duration },
}
