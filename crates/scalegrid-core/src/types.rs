//! Value types exchanged between the host loop, the aggregators and the
//! scaling algorithm.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point-in-time view of one metric, as consumed by the scaling
/// algorithm.
///
/// `stable_value` and `burst_value` are window averages. A negative value
/// is the "no data" sentinel: the algorithm abstains for that tick. Zero is
/// a real observation and can drive scale-to-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSnapshot {
    /// Metric value averaged over the stable window.
    pub stable_value: f64,
    /// Metric value averaged over the burst window.
    pub burst_value: f64,
    /// Number of ready replicas at snapshot time.
    pub ready_pods: u32,
    /// When this snapshot was taken.
    pub timestamp: SystemTime,
}

impl MetricSnapshot {
    pub fn new(stable_value: f64, burst_value: f64, ready_pods: u32, timestamp: SystemTime) -> Self {
        Self {
            stable_value,
            burst_value,
            ready_pods,
            timestamp,
        }
    }

    /// True when either window reported the "no data" sentinel.
    pub fn has_data(&self) -> bool {
        self.stable_value >= 0.0 && self.burst_value >= 0.0
    }
}

/// The outcome of one scaling decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleRecommendation {
    /// Recommended number of replicas.
    pub desired_pods: u32,
    /// False when there was not enough data to decide; the host should
    /// leave the replica count unchanged for this tick.
    pub scale_valid: bool,
    /// Whether the scaler is currently in burst mode.
    pub in_burst_mode: bool,
    /// The stable window average the decision was based on.
    pub observed_stable_value: f64,
    /// The burst window average the decision was based on.
    pub observed_burst_value: f64,
    /// The ready replica count the decision was based on.
    pub current_pods: u32,
}

impl ScaleRecommendation {
    /// An invalid recommendation echoing the observed inputs.
    pub fn invalid(snapshot: &MetricSnapshot, in_burst_mode: bool) -> Self {
        Self {
            desired_pods: 0,
            scale_valid: false,
            in_burst_mode,
            observed_stable_value: snapshot.stable_value,
            observed_burst_value: snapshot.burst_value,
            current_pods: snapshot.ready_pods,
        }
    }
}

/// How a scaler aggregates recorded metric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    /// Simple average over the window.
    Linear,
    /// Exponentially weighted average; recent buckets dominate.
    Weighted,
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationKind::Linear => f.write_str("linear"),
            AggregationKind::Weighted => f.write_str("weighted"),
        }
    }
}

/// Error returned when parsing an [`AggregationKind`] from a string.
#[derive(Debug, Clone, Error)]
#[error("unknown aggregation kind: {0:?} (expected \"linear\" or \"weighted\")")]
pub struct ParseAggregationKindError(String);

impl FromStr for AggregationKind {
    type Err = ParseAggregationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(AggregationKind::Linear),
            "weighted" => Ok(AggregationKind::Weighted),
            other => Err(ParseAggregationKindError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn snapshot_data_sentinel() {
        let t = UNIX_EPOCH;
        assert!(MetricSnapshot::new(0.0, 0.0, 1, t).has_data());
        assert!(MetricSnapshot::new(10.0, 5.0, 1, t).has_data());
        assert!(!MetricSnapshot::new(-1.0, 5.0, 1, t).has_data());
        assert!(!MetricSnapshot::new(10.0, -1.0, 1, t).has_data());
    }

    #[test]
    fn aggregation_kind_round_trip() {
        assert_eq!("linear".parse::<AggregationKind>().unwrap(), AggregationKind::Linear);
        assert_eq!("weighted".parse::<AggregationKind>().unwrap(), AggregationKind::Weighted);
        assert_eq!(AggregationKind::Linear.to_string(), "linear");
        assert_eq!(AggregationKind::Weighted.to_string(), "weighted");
        assert!("median".parse::<AggregationKind>().is_err());
    }
}
