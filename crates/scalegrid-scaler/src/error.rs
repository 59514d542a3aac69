//! Error types for scaler construction and management.

use thiserror::Error;

use scalegrid_core::ConfigError;
use scalegrid_window::WindowError;

/// Errors surfaced by scaler and manager operations.
///
/// Decision paths (`record`, `scale`) never return these; only
/// constructors, config updates and name-addressed manager calls do.
#[derive(Debug, Error)]
pub enum ScalerError {
    #[error("scaler name cannot be empty")]
    EmptyName,

    #[error("scaler {0:?} not found")]
    UnknownScaler(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Window(#[from] WindowError),
}
