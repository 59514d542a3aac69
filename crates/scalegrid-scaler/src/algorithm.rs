//! The sliding-window scaling algorithm.

use std::sync::Mutex;
use std::time::SystemTime;

use tracing::{debug, info};

use scalegrid_core::{MetricSnapshot, ScaleRecommendation, ScalerConfig};
use scalegrid_window::DelayMaxWindow;

use crate::GRANULARITY;
use crate::error::ScalerError;

#[derive(Debug)]
struct AlgorithmState {
    config: ScalerConfig,
    /// When burst mode was entered or last reinforced; `None` when out of
    /// burst mode.
    burst_time: Option<SystemTime>,
    /// High-water mark of desired replicas during the current burst.
    max_burst_pods: u32,
    /// Present only when `scale_down_delay` is non-zero.
    delay_window: Option<DelayMaxWindow>,
}

/// Converts one [`MetricSnapshot`] plus `now` into a
/// [`ScaleRecommendation`], maintaining burst-mode state and the optional
/// scale-down delay across calls.
///
/// All state sits behind a single mutex; `scale` never fails, `update`
/// validates before touching anything.
#[derive(Debug)]
pub struct SlidingWindowScaler {
    state: Mutex<AlgorithmState>,
}

impl SlidingWindowScaler {
    /// Create an algorithm instance.
    ///
    /// When `initial_replicas > 1` the scaler starts out in burst mode
    /// with `initial_replicas` as the high-water mark, so a restart does
    /// not momentarily scale the workload down before data accumulates.
    /// `now` is the caller's clock reading; the algorithm itself never
    /// reads one.
    pub fn new(
        config: ScalerConfig,
        initial_replicas: u32,
        now: SystemTime,
    ) -> Result<Self, ScalerError> {
        config.validate()?;
        let delay_window = build_delay_window(&config)?;

        let (burst_time, max_burst_pods) = if initial_replicas > 1 {
            (Some(now), initial_replicas)
        } else {
            (None, 0)
        };

        Ok(Self {
            state: Mutex::new(AlgorithmState {
                config,
                burst_time,
                max_burst_pods,
                delay_window,
            }),
        })
    }

    /// Compute the desired replica count for one tick.
    pub fn scale(&self, snapshot: &MetricSnapshot, now: SystemTime) -> ScaleRecommendation {
        let mut state = self.state.lock().unwrap();

        if !snapshot.has_data() {
            debug!(
                stable = snapshot.stable_value,
                burst = snapshot.burst_value,
                "no metric data, abstaining"
            );
            return ScaleRecommendation::invalid(snapshot, state.burst_time.is_some());
        }

        let config = state.config.clone();
        // Guard the threshold division against zero ready replicas.
        let ready = f64::from(snapshot.ready_pods.max(1));

        let max_scale_up = (config.max_scale_up_rate * ready).ceil();
        let max_scale_down = (ready / config.max_scale_down_rate).floor();

        let (raw_stable, raw_burst) = if config.per_replica_target() {
            (
                (snapshot.stable_value / config.target_value).ceil(),
                (snapshot.burst_value / config.target_value).ceil(),
            )
        } else {
            (
                (ready * snapshot.stable_value / config.total_target_value).ceil(),
                (ready * snapshot.burst_value / config.total_target_value).ceil(),
            )
        };

        let mut desired_stable = raw_stable.clamp(max_scale_down, max_scale_up);
        let mut desired_burst = raw_burst.clamp(max_scale_down, max_scale_up);

        // The activation floor only lifts non-zero demand; zero demand must
        // stay zero so the workload can scale down completely.
        if config.activation_scale > 1 {
            let activation = f64::from(config.activation_scale);
            if raw_stable > 0.0 && desired_stable < activation {
                desired_stable = activation;
            }
            if raw_burst > 0.0 && desired_burst < activation {
                desired_burst = activation;
            }
        }

        let over_threshold = raw_burst / ready >= config.burst_threshold;
        let mut in_burst_mode = state.burst_time.is_some();
        match (in_burst_mode, over_threshold) {
            (false, true) => {
                state.burst_time = Some(now);
                in_burst_mode = true;
                info!(
                    ratio = raw_burst / ready,
                    threshold = config.burst_threshold,
                    "entering burst mode"
                );
            }
            (true, true) => {
                state.burst_time = Some(now);
            }
            (true, false) => {
                let expired = state
                    .burst_time
                    .is_some_and(|t| elapsed(t, now) >= config.stable_window);
                if expired {
                    state.burst_time = None;
                    state.max_burst_pods = 0;
                    in_burst_mode = false;
                    info!("exiting burst mode");
                }
            }
            (false, false) => {}
        }

        let mut desired = if in_burst_mode {
            // Never scale down while bursting: hold the high-water mark.
            let candidate = desired_stable.max(desired_burst) as u32;
            if candidate > state.max_burst_pods {
                state.max_burst_pods = candidate;
            }
            state.max_burst_pods
        } else {
            desired_stable as u32
        };

        if let Some(delay_window) = state.delay_window.as_mut() {
            delay_window.record(now, desired);
            desired = delay_window.max(now);
        }

        if config.min_replicas > 0 && desired < config.min_replicas {
            desired = config.min_replicas;
        }
        if config.max_replicas > 0 && desired > config.max_replicas {
            desired = config.max_replicas;
        }

        debug!(
            desired,
            ready = snapshot.ready_pods,
            stable = snapshot.stable_value,
            burst = snapshot.burst_value,
            in_burst_mode,
            "scale decision"
        );

        ScaleRecommendation {
            desired_pods: desired,
            scale_valid: true,
            in_burst_mode,
            observed_stable_value: snapshot.stable_value,
            observed_burst_value: snapshot.burst_value,
            current_pods: snapshot.ready_pods,
        }
    }

    /// Replace the configuration. Fails without side effects when the new
    /// config is invalid; otherwise the delay window is created, resized or
    /// dropped to match.
    pub fn update(&self, config: ScalerConfig) -> Result<(), ScalerError> {
        config.validate()?;

        let mut state = self.state.lock().unwrap();
        if config.scale_down_delay != state.config.scale_down_delay {
            if config.scale_down_delay.is_zero() {
                state.delay_window = None;
            } else if let Some(delay_window) = state.delay_window.as_mut() {
                delay_window.resize(config.scale_down_delay)?;
            } else {
                state.delay_window = build_delay_window(&config)?;
            }
        }
        debug!("algorithm config updated");
        state.config = config;
        Ok(())
    }

    /// A copy of the current configuration.
    pub fn config(&self) -> ScalerConfig {
        self.state.lock().unwrap().config.clone()
    }

    /// Whether the algorithm is currently in burst mode.
    pub fn in_burst_mode(&self) -> bool {
        self.state.lock().unwrap().burst_time.is_some()
    }
}

fn build_delay_window(config: &ScalerConfig) -> Result<Option<DelayMaxWindow>, ScalerError> {
    if config.scale_down_delay.is_zero() {
        Ok(None)
    } else {
        Ok(Some(DelayMaxWindow::new(
            config.scale_down_delay,
            GRANULARITY,
        )?))
    }
}

fn elapsed(from: SystemTime, to: SystemTime) -> std::time::Duration {
    to.duration_since(from).unwrap_or_default()
}
