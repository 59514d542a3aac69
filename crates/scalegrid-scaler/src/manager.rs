//! Coordination of multiple scalers under one replica envelope.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

use tracing::debug;

use scalegrid_core::{AggregationKind, ScalerConfig};

use crate::error::ScalerError;
use crate::scaler::Scaler;

struct ManagerInner {
    scalers: HashMap<String, Scaler>,
    min_replicas: u32,
    max_replicas: u32,
}

/// A set of named [`Scaler`]s reduced to a single replica count.
///
/// Each scaler reflects one resource dimension; the slowest-to-serve
/// dimension dictates capacity, so the fold takes the maximum valid
/// recommendation and clamps it to the `[min_replicas, max_replicas]`
/// envelope (`max_replicas == 0` meaning unbounded).
pub struct Manager {
    inner: RwLock<ManagerInner>,
}

impl Manager {
    /// Create a manager with the given envelope. A non-zero `max_replicas`
    /// below `min_replicas` is raised to match.
    pub fn new(min_replicas: u32, max_replicas: u32) -> Self {
        let max_replicas = if max_replicas > 0 && max_replicas < min_replicas {
            min_replicas
        } else {
            max_replicas
        };
        Self {
            inner: RwLock::new(ManagerInner {
                scalers: HashMap::new(),
                min_replicas,
                max_replicas,
            }),
        }
    }

    /// Create a manager and register an initial set of scalers.
    pub fn with_scalers(
        min_replicas: u32,
        max_replicas: u32,
        scalers: impl IntoIterator<Item = Scaler>,
    ) -> Self {
        let manager = Self::new(min_replicas, max_replicas);
        for scaler in scalers {
            manager.register(scaler);
        }
        manager
    }

    /// Add a scaler, replacing any existing scaler with the same name.
    pub fn register(&self, scaler: Scaler) {
        let mut inner = self.inner.write().unwrap();
        inner.scalers.insert(scaler.name().to_string(), scaler);
    }

    /// Remove a scaler by name; absent names are a no-op.
    pub fn unregister(&self, name: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.scalers.remove(name);
    }

    /// Names of all registered scalers.
    pub fn scaler_names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner.scalers.keys().cloned().collect()
    }

    pub fn min_scale(&self) -> u32 {
        self.inner.read().unwrap().min_replicas
    }

    pub fn max_scale(&self) -> u32 {
        self.inner.read().unwrap().max_replicas
    }

    /// Set the lower bound, raising a bounded `max_replicas` if it would
    /// fall below the new minimum.
    pub fn set_min_scale(&self, value: u32) {
        let mut inner = self.inner.write().unwrap();
        inner.min_replicas = value;
        if inner.max_replicas > 0 && inner.max_replicas < inner.min_replicas {
            inner.max_replicas = inner.min_replicas;
        }
    }

    /// Set the upper bound (0 = unbounded), lowering `min_replicas` if it
    /// would exceed the new maximum.
    pub fn set_max_scale(&self, value: u32) {
        let mut inner = self.inner.write().unwrap();
        inner.max_replicas = value;
        if inner.max_replicas > 0 && inner.min_replicas > inner.max_replicas {
            inner.min_replicas = inner.max_replicas;
        }
    }

    /// Record a metric observation for the named scaler.
    pub fn record(&self, name: &str, value: f64, t: SystemTime) -> Result<(), ScalerError> {
        let inner = self.inner.read().unwrap();
        let scaler = inner
            .scalers
            .get(name)
            .ok_or_else(|| ScalerError::UnknownScaler(name.to_string()))?;
        scaler.record(value, t);
        Ok(())
    }

    /// Swap the aggregation kind of the named scaler, discarding its
    /// recorded history.
    pub fn change_aggregation(&self, name: &str, kind: AggregationKind) -> Result<(), ScalerError> {
        let inner = self.inner.read().unwrap();
        let scaler = inner
            .scalers
            .get(name)
            .ok_or_else(|| ScalerError::UnknownScaler(name.to_string()))?;
        scaler.change_aggregation(kind)
    }

    /// Replace the named scaler's configuration.
    pub fn update(&self, name: &str, config: ScalerConfig) -> Result<(), ScalerError> {
        let inner = self.inner.read().unwrap();
        let scaler = inner
            .scalers
            .get(name)
            .ok_or_else(|| ScalerError::UnknownScaler(name.to_string()))?;
        scaler.update(config)
    }

    /// Fold all scaler recommendations into one replica count.
    ///
    /// With no scalers registered the envelope minimum is returned; with
    /// scalers but no valid recommendation, `ready_pods` (hold steady on
    /// insufficient data).
    pub fn scale(&self, ready_pods: u32, now: SystemTime) -> u32 {
        let inner = self.inner.read().unwrap();

        if inner.scalers.is_empty() {
            return inner.min_replicas;
        }

        let mut max_desired = 0u32;
        let mut valid = 0usize;
        for (name, scaler) in &inner.scalers {
            let recommendation = scaler.scale(ready_pods, now);
            if recommendation.scale_valid {
                valid += 1;
                max_desired = max_desired.max(recommendation.desired_pods);
            } else {
                debug!(scaler = %name, "invalid recommendation ignored");
            }
        }

        if valid == 0 {
            debug!(ready_pods, "no valid recommendation, holding steady");
            return ready_pods;
        }

        let desired = max_desired.max(inner.min_replicas);
        let desired = if inner.max_replicas > 0 {
            desired.min(inner.max_replicas)
        } else {
            desired
        };
        debug!(desired, valid, ready_pods, "manager scale decision");
        desired
    }
}
