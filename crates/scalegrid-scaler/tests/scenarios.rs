//! End-to-end scenarios driving the full record/scale pipeline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use scalegrid_core::{AggregationKind, MetricSnapshot, ScalerConfig};
use scalegrid_scaler::{Manager, Scaler, SlidingWindowScaler};

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_800_000_000 + secs)
}

fn base_config() -> ScalerConfig {
    ScalerConfig {
        max_scale_up_rate: 10.0,
        max_scale_down_rate: 2.0,
        target_value: 100.0,
        total_target_value: 0.0,
        burst_threshold: 2.0,
        burst_window_fraction: 0.10,
        stable_window: Duration::from_secs(60),
        scale_down_delay: Duration::ZERO,
        min_replicas: 1,
        max_replicas: 10,
        activation_scale: 1,
    }
}

#[test]
fn steady_state_holds_three_replicas() {
    let scaler = Scaler::new("concurrency", base_config(), AggregationKind::Linear, at(0)).unwrap();

    // 300 units of load per second against three replicas for a minute.
    for i in 0..60u64 {
        scaler.record(300.0, at(i));
    }

    let rec = scaler.scale(3, at(60));
    assert!(rec.scale_valid);
    assert_eq!(rec.desired_pods, 3);
    assert!(!rec.in_burst_mode);
}

#[test]
fn burst_cycle_enter_hold_exit() {
    let config = ScalerConfig {
        max_replicas: 20,
        ..base_config()
    };
    let alg = SlidingWindowScaler::new(config, 0, at(0)).unwrap();

    // Burst demand of 5 pods against 2 ready enters burst mode.
    let rec = alg.scale(&MetricSnapshot::new(100.0, 500.0, 2, at(0)), at(0));
    assert!(rec.in_burst_mode);
    assert_eq!(rec.desired_pods, 5);

    // Half a minute later demand is back to normal, but the burst
    // high-water mark still holds.
    let rec = alg.scale(&MetricSnapshot::new(100.0, 100.0, 5, at(30)), at(30));
    assert!(rec.in_burst_mode);
    assert_eq!(rec.desired_pods, 5);

    // A full stable window under the threshold exits burst mode; the
    // scale-down rate limit caps the descent at floor(5 / 2) = 2.
    let rec = alg.scale(&MetricSnapshot::new(100.0, 100.0, 5, at(91)), at(91));
    assert!(!rec.in_burst_mode);
    assert_eq!(rec.desired_pods, 2);
}

#[test]
fn scale_up_is_rate_limited() {
    let config = ScalerConfig {
        max_scale_up_rate: 1.5,
        max_replicas: 0,
        ..base_config()
    };
    let alg = SlidingWindowScaler::new(config, 0, at(0)).unwrap();

    // Raw demand of 10 pods from 4 ready: capped at ceil(4 * 1.5) = 6.
    let rec = alg.scale(&MetricSnapshot::new(1000.0, 1000.0, 4, at(0)), at(0));
    assert_eq!(rec.desired_pods, 6);
}

#[test]
fn zero_load_scales_to_zero_despite_activation_scale() {
    let config = ScalerConfig {
        min_replicas: 0,
        activation_scale: 3,
        ..base_config()
    };
    let alg = SlidingWindowScaler::new(config, 0, at(0)).unwrap();

    let rec = alg.scale(&MetricSnapshot::new(0.0, 0.0, 1, at(0)), at(0));
    assert!(rec.scale_valid);
    assert_eq!(rec.desired_pods, 0);
}

#[test]
fn scale_down_delay_defers_the_drop() {
    let config = ScalerConfig {
        scale_down_delay: Duration::from_secs(30),
        ..base_config()
    };
    let alg = SlidingWindowScaler::new(config, 0, at(0)).unwrap();

    let rec = alg.scale(&MetricSnapshot::new(500.0, 500.0, 5, at(0)), at(0));
    assert_eq!(rec.desired_pods, 5);

    // Ten seconds in, demand calls for 2 pods, but the 30s window still
    // remembers 5.
    let rec = alg.scale(&MetricSnapshot::new(200.0, 200.0, 5, at(10)), at(10));
    assert_eq!(rec.desired_pods, 5);

    // Once the old peak ages out, the drop goes through.
    let rec = alg.scale(&MetricSnapshot::new(200.0, 200.0, 5, at(35)), at(35));
    assert_eq!(rec.desired_pods, 2);
}

#[test]
fn total_target_divides_across_replicas() {
    let config = ScalerConfig {
        target_value: 0.0,
        total_target_value: 1000.0,
        ..base_config()
    };
    let alg = SlidingWindowScaler::new(config, 0, at(0)).unwrap();

    // ceil(2 * 2500 / 1000) = 5.
    let rec = alg.scale(&MetricSnapshot::new(2500.0, 2500.0, 2, at(0)), at(0));
    assert_eq!(rec.desired_pods, 5);
}

#[test]
fn multi_metric_spike_and_recovery() {
    let manager = Manager::new(1, 20);
    let mk = |name: &str, target: f64, kind| {
        Scaler::new(
            name,
            ScalerConfig {
                target_value: target,
                stable_window: Duration::from_secs(10),
                min_replicas: 0,
                max_replicas: 0,
                ..base_config()
            },
            kind,
            at(0),
        )
        .unwrap()
    };
    manager.register(mk("cpu", 100.0, AggregationKind::Linear));
    manager.register(mk("requests", 1000.0, AggregationKind::Weighted));

    let mut pods = 2u32;

    // Calm phase: both metrics sit at their targets.
    for i in 0..10u64 {
        let t = at(i);
        manager.record("cpu", 100.0 * f64::from(pods), t).unwrap();
        manager.record("requests", 1000.0 * f64::from(pods), t).unwrap();
        pods = manager.scale(pods, t);
    }
    assert_eq!(pods, 2);

    // Spike phase: request load goes 8x.
    for i in 10..25u64 {
        let t = at(i);
        manager.record("cpu", 100.0 * f64::from(pods), t).unwrap();
        manager.record("requests", 16_000.0, t).unwrap();
        pods = manager.scale(pods, t);
    }
    assert!(pods > 2, "spike did not scale up, pods = {pods}");
    let peak = pods;

    // Recovery: total load falls back to the calm level; once the burst
    // window expires the count drifts down under the scale-down rate
    // limit.
    for i in 25..80u64 {
        let t = at(i);
        manager.record("cpu", 200.0, t).unwrap();
        manager.record("requests", 2000.0, t).unwrap();
        pods = manager.scale(pods, t);
    }
    assert!(pods < peak, "recovery did not scale down, pods = {pods}");
    assert!(pods >= 1);
}

#[test]
fn identical_inputs_produce_identical_outputs() {
    let run = || {
        let manager = Manager::new(1, 50);
        manager.register(
            Scaler::new(
                "rps",
                ScalerConfig {
                    stable_window: Duration::from_secs(20),
                    scale_down_delay: Duration::from_secs(10),
                    min_replicas: 0,
                    max_replicas: 0,
                    ..base_config()
                },
                AggregationKind::Weighted,
                at(0),
            )
            .unwrap(),
        );

        let mut pods = 3u32;
        let mut decisions = Vec::new();
        for i in 0..120u64 {
            let t = at(i);
            // A deterministic sawtooth with a mid-run spike.
            let load = 250.0 + ((i * 83) % 200) as f64 + if (40..55).contains(&i) { 2000.0 } else { 0.0 };
            manager.record("rps", load, t).unwrap();
            pods = manager.scale(pods, t);
            decisions.push(pods);
        }
        decisions
    };

    assert_eq!(run(), run());
}

#[test]
fn concurrent_records_and_scales_stay_bounded() {
    let manager = std::sync::Arc::new(Manager::new(1, 8));
    manager.register(
        Scaler::new(
            "cpu",
            ScalerConfig {
                stable_window: Duration::from_secs(10),
                min_replicas: 0,
                max_replicas: 0,
                ..base_config()
            },
            AggregationKind::Linear,
            at(0),
        )
        .unwrap(),
    );

    std::thread::scope(|scope| {
        for worker in 0..4u64 {
            let manager = std::sync::Arc::clone(&manager);
            scope.spawn(move || {
                for i in 0..200u64 {
                    manager
                        .record("cpu", (worker * 50 + i % 100) as f64, at(i % 30))
                        .unwrap();
                }
            });
        }
        for _ in 0..2 {
            let manager = std::sync::Arc::clone(&manager);
            scope.spawn(move || {
                for i in 0..100u64 {
                    let desired = manager.scale(3, at(i % 30));
                    assert!((1..=8).contains(&desired));
                }
            });
        }
    });
}
