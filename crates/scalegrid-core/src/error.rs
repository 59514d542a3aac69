//! Error types for configuration handling.

use thiserror::Error;

/// Aggregated configuration validation failures.
///
/// Every violated constraint is collected before the error is returned, so
/// a caller fixing a config sees the full list at once rather than one
/// field per attempt.
#[derive(Debug, Clone, Error)]
#[error("configuration errors: {}", .0.join("; "))]
pub struct ConfigError(pub(crate) Vec<String>);

impl ConfigError {
    /// The individual violations, one message per failing field.
    pub fn entries(&self) -> &[String] {
        &self.0
    }
}

/// Collects violations while a config is checked.
#[derive(Debug, Default)]
pub(crate) struct ErrorList(Vec<String>);

impl ErrorList {
    pub(crate) fn push(&mut self, msg: String) {
        self.0.push(msg);
    }

    pub(crate) fn into_result(self) -> Result<(), ConfigError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ConfigError(self.0))
        }
    }
}
