//! Sliding-window autoscaling decisions.
//!
//! The decision pipeline, bottom up:
//!
//! ```text
//! record(value, t) ──► stable aggregator ─┐
//!                  ──► burst aggregator  ─┤
//!                                         ▼
//! scale(ready, now) ──► MetricSnapshot ──► SlidingWindowScaler
//!                                         │  rate limits, burst mode,
//!                                         │  activation floor,
//!                                         │  scale-down delay, bounds
//!                                         ▼
//!                              ScaleRecommendation
//! ```
//!
//! A [`Scaler`] binds one metric's aggregators to one algorithm instance;
//! a [`Manager`] folds any number of named scalers into a single replica
//! count under a global min/max envelope.

use std::time::Duration;

pub mod algorithm;
pub mod error;
pub mod manager;
pub mod scaler;

pub use algorithm::SlidingWindowScaler;
pub use error::ScalerError;
pub use manager::Manager;
pub use scaler::{Aggregator, Scaler};

/// Bucket granularity shared by all aggregators and delay windows.
pub(crate) const GRANULARITY: Duration = Duration::from_secs(1);
