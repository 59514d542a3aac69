//! Autoscaler configuration: knobs, defaults, validation and loading.
//!
//! A [`ScalerConfig`] can be built four ways: [`ScalerConfig::default`],
//! [`ScalerConfig::from_map`] (kebab-case keys, e.g. from an orchestrator
//! config map), [`ScalerConfig::from_env`] (`AUTOSCALER_`-prefixed
//! variables) and [`ScalerConfig::from_file`] (a TOML document with an
//! `[autoscaler]` table). All loaders normalize the burst threshold and run
//! [`ScalerConfig::validate`], aggregating every violation into a single
//! [`ConfigError`].

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ErrorList};

const DEFAULT_MAX_SCALE_UP_RATE: f64 = 1000.0;
const DEFAULT_MAX_SCALE_DOWN_RATE: f64 = 2.0;
const DEFAULT_TARGET_VALUE: f64 = 100.0;
const DEFAULT_TOTAL_TARGET_VALUE: f64 = 0.0;
const DEFAULT_BURST_THRESHOLD: f64 = 200.0;
const DEFAULT_BURST_WINDOW_FRACTION: f64 = 0.10;
const DEFAULT_STABLE_WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_SCALE_DOWN_DELAY: Duration = Duration::ZERO;
const DEFAULT_MIN_REPLICAS: u32 = 0;
const DEFAULT_MAX_REPLICAS: u32 = 0;
const DEFAULT_ACTIVATION_SCALE: u32 = 1;

const MIN_STABLE_WINDOW: Duration = Duration::from_secs(5);
const MAX_STABLE_WINDOW: Duration = Duration::from_secs(600);
const MIN_BURST_WINDOW_FRACTION: f64 = 0.01;
const MAX_BURST_WINDOW_FRACTION: f64 = 1.0;

/// Environment variable prefix recognized by [`ScalerConfig::from_env`].
pub const ENV_PREFIX: &str = "AUTOSCALER_";

/// Parameters controlling one scaler's behavior.
///
/// Immutable once handed to a scaler; replaced atomically via `update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerConfig {
    /// Maximum multiplicative scale-up per tick. Must be > 1.0.
    pub max_scale_up_rate: f64,

    /// Maximum divisive scale-down per tick. Must be > 1.0. A value of 2.0
    /// allows at most halving the replica count in one decision.
    pub max_scale_down_rate: f64,

    /// Desired metric value per replica. Exactly one of `target_value` and
    /// `total_target_value` must be positive.
    pub target_value: f64,

    /// Desired metric value across the whole deployment.
    pub total_target_value: f64,

    /// Ratio of burst demand to ready replicas that triggers burst mode.
    /// Values above 10 are treated as a percentage and divided by 100 at
    /// load time.
    pub burst_threshold: f64,

    /// Burst window span as a fraction of the stable window, in
    /// [0.01, 1.0]. The derived window never drops below one second.
    pub burst_window_fraction: f64,

    /// Averaging span for ordinary decisions. Whole seconds in
    /// [5s, 600s].
    pub stable_window: Duration,

    /// Hold the recommendation at its maximum over this trailing window
    /// before allowing a scale-down. Zero disables the delay.
    pub scale_down_delay: Duration,

    /// Hard lower bound on the recommendation.
    pub min_replicas: u32,

    /// Hard upper bound on the recommendation. Zero means unbounded.
    pub max_replicas: u32,

    /// Floor applied when raw demand is strictly positive. Must be >= 1.
    pub activation_scale: u32,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            max_scale_up_rate: DEFAULT_MAX_SCALE_UP_RATE,
            max_scale_down_rate: DEFAULT_MAX_SCALE_DOWN_RATE,
            target_value: DEFAULT_TARGET_VALUE,
            total_target_value: DEFAULT_TOTAL_TARGET_VALUE,
            burst_threshold: DEFAULT_BURST_THRESHOLD,
            burst_window_fraction: DEFAULT_BURST_WINDOW_FRACTION,
            stable_window: DEFAULT_STABLE_WINDOW,
            scale_down_delay: DEFAULT_SCALE_DOWN_DELAY,
            min_replicas: DEFAULT_MIN_REPLICAS,
            max_replicas: DEFAULT_MAX_REPLICAS,
            activation_scale: DEFAULT_ACTIVATION_SCALE,
        }
        .normalized()
    }
}

impl ScalerConfig {
    /// Load from a string map with kebab-case keys. Missing keys fall back
    /// to defaults; all parse and validation failures are aggregated.
    pub fn from_map(data: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::load(|key| data.get(key).cloned())
    }

    /// Load from `AUTOSCALER_`-prefixed environment variables
    /// (`AUTOSCALER_MAX_SCALE_UP_RATE`, `AUTOSCALER_STABLE_WINDOW`, ...).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| {
            let name = format!("{ENV_PREFIX}{}", key.replace('-', "_").to_uppercase());
            std::env::var(name).ok()
        })
    }

    /// Load from a TOML document with an `[autoscaler]` table.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| ConfigError(vec![format!("invalid TOML: {e}")]))?;
        let raw = file.autoscaler;
        Self::load(|key| {
            raw.get(key).map(|v| match v {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
    }

    /// Load from a TOML file on disk.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(vec![format!("cannot read {}: {e}", path.display())]))?;
        Self::from_toml_str(&content)
    }

    fn load(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut errs = ErrorList::default();

        let cfg = Self {
            max_scale_up_rate: parse_f64(&mut errs, &get, "max-scale-up-rate", DEFAULT_MAX_SCALE_UP_RATE),
            max_scale_down_rate: parse_f64(&mut errs, &get, "max-scale-down-rate", DEFAULT_MAX_SCALE_DOWN_RATE),
            target_value: parse_f64(&mut errs, &get, "target-value", DEFAULT_TARGET_VALUE),
            total_target_value: parse_f64(&mut errs, &get, "total-target-value", DEFAULT_TOTAL_TARGET_VALUE),
            burst_threshold: parse_f64(&mut errs, &get, "burst-threshold", DEFAULT_BURST_THRESHOLD),
            burst_window_fraction: parse_f64(&mut errs, &get, "burst-window-fraction", DEFAULT_BURST_WINDOW_FRACTION),
            stable_window: parse_duration(&mut errs, &get, "stable-window", DEFAULT_STABLE_WINDOW),
            scale_down_delay: parse_duration(&mut errs, &get, "scale-down-delay", DEFAULT_SCALE_DOWN_DELAY),
            min_replicas: parse_u32(&mut errs, &get, "min-replicas", DEFAULT_MIN_REPLICAS),
            max_replicas: parse_u32(&mut errs, &get, "max-replicas", DEFAULT_MAX_REPLICAS),
            activation_scale: parse_u32(&mut errs, &get, "activation-scale", DEFAULT_ACTIVATION_SCALE),
        }
        .normalized();

        errs.into_result()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Fold a percentage-style burst threshold down to a ratio.
    pub fn normalized(mut self) -> Self {
        if self.burst_threshold > 10.0 {
            self.burst_threshold /= 100.0;
        }
        self
    }

    /// Check every constraint, aggregating all violations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errs = ErrorList::default();

        if self.max_scale_up_rate <= 1.0 {
            errs.push(format!(
                "max-scale-up-rate = {}, must be greater than 1.0",
                self.max_scale_up_rate
            ));
        }
        if self.max_scale_down_rate <= 1.0 {
            errs.push(format!(
                "max-scale-down-rate = {}, must be greater than 1.0",
                self.max_scale_down_rate
            ));
        }

        if self.target_value <= 0.0 && self.total_target_value <= 0.0 {
            errs.push("either target-value or total-target-value must be positive".to_string());
        }
        if self.target_value > 0.0 && self.total_target_value > 0.0 {
            errs.push(format!(
                "cannot set both target-value ({}) and total-target-value ({})",
                self.target_value, self.total_target_value
            ));
        }

        if self.burst_threshold <= 0.0 {
            errs.push(format!(
                "burst-threshold = {}, must be positive",
                self.burst_threshold
            ));
        }
        if !(MIN_BURST_WINDOW_FRACTION..=MAX_BURST_WINDOW_FRACTION).contains(&self.burst_window_fraction) {
            errs.push(format!(
                "burst-window-fraction = {}, must be in [{MIN_BURST_WINDOW_FRACTION}, {MAX_BURST_WINDOW_FRACTION}]",
                self.burst_window_fraction
            ));
        }

        if self.stable_window < MIN_STABLE_WINDOW || self.stable_window > MAX_STABLE_WINDOW {
            errs.push(format!(
                "stable-window = {:?}, must be in [{MIN_STABLE_WINDOW:?}; {MAX_STABLE_WINDOW:?}]",
                self.stable_window
            ));
        }
        if self.stable_window.subsec_nanos() != 0 {
            errs.push(format!(
                "stable-window = {:?}, must be whole seconds",
                self.stable_window
            ));
        }
        if self.scale_down_delay.subsec_nanos() != 0 {
            errs.push(format!(
                "scale-down-delay = {:?}, must be whole seconds",
                self.scale_down_delay
            ));
        }

        if self.max_replicas > 0 && self.min_replicas > self.max_replicas {
            errs.push(format!(
                "min-replicas ({}) must not exceed max-replicas ({})",
                self.min_replicas, self.max_replicas
            ));
        }
        if self.activation_scale < 1 {
            errs.push(format!(
                "activation-scale = {}, must be at least 1",
                self.activation_scale
            ));
        }

        errs.into_result()
    }

    /// The burst averaging span derived from the stable window. Never less
    /// than one second.
    pub fn burst_window(&self) -> Duration {
        Duration::from_secs_f64(
            (self.stable_window.as_secs_f64() * self.burst_window_fraction).max(1.0),
        )
    }

    /// Whether demand is measured against a per-replica target (as opposed
    /// to a whole-deployment target).
    pub fn per_replica_target(&self) -> bool {
        self.target_value > 0.0
    }
}

/// On-disk shape of a config file: an `[autoscaler]` table whose values may
/// be numbers or duration strings.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    autoscaler: HashMap<String, toml::Value>,
}

fn parse_f64(errs: &mut ErrorList, get: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    match get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                errs.push(format!("invalid value for {key}: {raw:?}"));
                default
            }
        },
    }
}

fn parse_u32(errs: &mut ErrorList, get: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> u32 {
    match get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                errs.push(format!("invalid value for {key}: {raw:?}"));
                default
            }
        },
    }
}

/// Durations accept a bare number of seconds, `"<n>s"` or `"<n>m"`.
fn parse_duration(
    errs: &mut ErrorList,
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    let Some(raw) = get(key) else { return default };
    let s = raw.trim();
    let parsed = if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().map(Duration::from_secs)
    };
    match parsed {
        Ok(d) => d,
        Err(_) => {
            errs.push(format!("invalid duration for {key}: {raw:?}"));
            default
        }
    }
}
