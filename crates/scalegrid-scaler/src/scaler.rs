//! A named scaler: two metric aggregators plus one algorithm instance.

use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use tracing::debug;

use scalegrid_core::{AggregationKind, MetricSnapshot, ScaleRecommendation, ScalerConfig};
use scalegrid_window::{BucketWindow, WeightedBucketWindow, WindowError};

use crate::GRANULARITY;
use crate::algorithm::SlidingWindowScaler;
use crate::error::ScalerError;

/// The aggregation backing a scaler: one of the two window flavors behind
/// a common `record`/`window_average`/`is_empty`/`resize` surface.
#[derive(Debug)]
pub enum Aggregator {
    Linear(BucketWindow),
    Weighted(WeightedBucketWindow),
}

impl Aggregator {
    pub fn new(
        kind: AggregationKind,
        window: Duration,
        granularity: Duration,
    ) -> Result<Self, WindowError> {
        match kind {
            AggregationKind::Linear => Ok(Self::Linear(BucketWindow::new(window, granularity)?)),
            AggregationKind::Weighted => {
                Ok(Self::Weighted(WeightedBucketWindow::new(window, granularity)?))
            }
        }
    }

    pub fn kind(&self) -> AggregationKind {
        match self {
            Self::Linear(_) => AggregationKind::Linear,
            Self::Weighted(_) => AggregationKind::Weighted,
        }
    }

    pub fn record(&mut self, t: SystemTime, value: f64) {
        match self {
            Self::Linear(w) => w.record(t, value),
            Self::Weighted(w) => w.record(t, value),
        }
    }

    pub fn window_average(&self, now: SystemTime) -> f64 {
        match self {
            Self::Linear(w) => w.window_average(now),
            Self::Weighted(w) => w.window_average(now),
        }
    }

    pub fn is_empty(&self, now: SystemTime) -> bool {
        match self {
            Self::Linear(w) => w.is_empty(now),
            Self::Weighted(w) => w.is_empty(now),
        }
    }

    pub fn resize(&mut self, window: Duration) {
        match self {
            Self::Linear(w) => w.resize(window),
            Self::Weighted(w) => w.resize(window),
        }
    }
}

/// One metric's autoscaler: a stable and a burst aggregator feeding a
/// [`SlidingWindowScaler`].
///
/// Each member carries its own lock; operations acquire them in a fixed
/// order (stable aggregator, burst aggregator, algorithm) and never hold
/// more than one at a time.
#[derive(Debug)]
pub struct Scaler {
    name: String,
    stable: RwLock<Aggregator>,
    burst: RwLock<Aggregator>,
    algorithm: SlidingWindowScaler,
}

impl Scaler {
    /// Create a scaler. The stable aggregator covers
    /// `config.stable_window`; the burst aggregator covers the derived
    /// burst window. Both use the same aggregation kind.
    pub fn new(
        name: impl Into<String>,
        config: ScalerConfig,
        kind: AggregationKind,
        now: SystemTime,
    ) -> Result<Self, ScalerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ScalerError::EmptyName);
        }

        let algorithm = SlidingWindowScaler::new(config.clone(), 0, now)?;
        let stable = Aggregator::new(kind, config.stable_window, GRANULARITY)?;
        let burst = Aggregator::new(kind, config.burst_window(), GRANULARITY)?;

        Ok(Self {
            name,
            stable: RwLock::new(stable),
            burst: RwLock::new(burst),
            algorithm,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current configuration.
    pub fn config(&self) -> ScalerConfig {
        self.algorithm.config()
    }

    /// The aggregation kind currently in use.
    pub fn aggregation_kind(&self) -> AggregationKind {
        self.stable.read().unwrap().kind()
    }

    /// Record one metric observation into both aggregators.
    pub fn record(&self, value: f64, t: SystemTime) {
        self.stable.write().unwrap().record(t, value);
        self.burst.write().unwrap().record(t, value);
    }

    /// Compute the recommendation for this tick. When either aggregator
    /// has no data inside its window, both observed values are reported as
    /// the -1 sentinel and the algorithm abstains.
    pub fn scale(&self, ready_pods: u32, now: SystemTime) -> ScaleRecommendation {
        let (mut stable_value, stable_empty) = {
            let stable = self.stable.read().unwrap();
            (stable.window_average(now), stable.is_empty(now))
        };
        let (mut burst_value, burst_empty) = {
            let burst = self.burst.read().unwrap();
            (burst.window_average(now), burst.is_empty(now))
        };
        if stable_empty || burst_empty {
            stable_value = -1.0;
            burst_value = -1.0;
        }

        let snapshot = MetricSnapshot::new(stable_value, burst_value, ready_pods, now);
        self.algorithm.scale(&snapshot, now)
    }

    /// Replace the configuration: the algorithm is updated and both
    /// aggregators are resized to the new windows.
    pub fn update(&self, config: ScalerConfig) -> Result<(), ScalerError> {
        config.validate()?;
        self.stable.write().unwrap().resize(config.stable_window);
        self.burst.write().unwrap().resize(config.burst_window());
        self.algorithm.update(config)
    }

    /// Swap the aggregation kind. Both aggregators are reallocated from
    /// the current config and all recorded history is discarded; the next
    /// `scale` calls abstain until fresh data arrives.
    pub fn change_aggregation(&self, kind: AggregationKind) -> Result<(), ScalerError> {
        let config = self.algorithm.config();
        let new_stable = Aggregator::new(kind, config.stable_window, GRANULARITY)?;
        let new_burst = Aggregator::new(kind, config.burst_window(), GRANULARITY)?;

        *self.stable.write().unwrap() = new_stable;
        *self.burst.write().unwrap() = new_burst;
        debug!(scaler = %self.name, %kind, "aggregation algorithm changed");
        Ok(())
    }
}
