//! Shared types and configuration for the scalegrid autoscaling library.
//!
//! This crate holds everything the window and scaler crates agree on: the
//! [`ScalerConfig`] knobs with their validation and loading paths, the
//! [`MetricSnapshot`] handed to the decision algorithm, and the
//! [`ScaleRecommendation`] it produces.

pub mod config;
pub mod error;
pub mod types;

pub use config::ScalerConfig;
pub use error::ConfigError;
pub use types::{AggregationKind, MetricSnapshot, ParseAggregationKindError, ScaleRecommendation};
