//! loadsim — drive the autoscaling manager through a synthetic load curve.
//!
//! Simulates the host control loop the library is designed to embed in:
//! each simulated second it records cpu, memory and request-rate metrics,
//! asks the manager for a replica count, and "applies" it. Time is purely
//! synthetic, so a full run finishes instantly and the same flags always
//! produce the same output.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::Parser;
use tracing::info;

use scalegrid_core::{AggregationKind, ScalerConfig};
use scalegrid_scaler::{Manager, Scaler};

#[derive(Parser)]
#[command(
    name = "loadsim",
    about = "scalegrid — autoscaling decision loop simulation",
    version
)]
struct Cli {
    /// Number of simulated seconds.
    #[arg(long, default_value_t = 120)]
    ticks: u64,

    /// Replica count at simulation start.
    #[arg(long, default_value_t = 5)]
    initial_pods: u32,

    /// Manager-level minimum replicas.
    #[arg(long, default_value_t = 2)]
    min_pods: u32,

    /// Manager-level maximum replicas.
    #[arg(long, default_value_t = 20)]
    max_pods: u32,
}

/// Per-pod load for one phase of the simulation.
struct Phase {
    name: &'static str,
    until_tick: u64,
    cpu_millicores: f64,
    memory_mb: f64,
    total_rps: f64,
}

const PHASES: &[Phase] = &[
    Phase {
        name: "normal",
        until_tick: 30,
        cpu_millicores: 50.0,
        memory_mb: 55.0,
        total_rps: 600.0,
    },
    Phase {
        name: "spike",
        until_tick: 60,
        cpu_millicores: 190.0,
        memory_mb: 180.0,
        total_rps: 25_000.0,
    },
    Phase {
        name: "cooldown",
        until_tick: 90,
        cpu_millicores: 70.0,
        memory_mb: 60.0,
        total_rps: 900.0,
    },
    Phase {
        name: "normal",
        until_tick: u64::MAX,
        cpu_millicores: 50.0,
        memory_mb: 55.0,
        total_rps: 600.0,
    },
];

fn phase_at(tick: u64) -> &'static Phase {
    PHASES
        .iter()
        .find(|p| tick < p.until_tick)
        .unwrap_or(&PHASES[PHASES.len() - 1])
}

fn build_manager(min_pods: u32, max_pods: u32, now: SystemTime) -> anyhow::Result<Manager> {
    let base = ScalerConfig {
        stable_window: Duration::from_secs(30),
        burst_window_fraction: 0.2,
        scale_down_delay: Duration::from_secs(15),
        min_replicas: 0,
        max_replicas: 0,
        ..ScalerConfig::default()
    };

    // CPU target: 100 millicores per pod, plain averaging.
    let cpu = Scaler::new(
        "cpu",
        ScalerConfig {
            target_value: 100.0,
            ..base.clone()
        },
        AggregationKind::Linear,
        now,
    )?;

    // Memory target: 150 MB per pod, weighted for faster reaction.
    let memory = Scaler::new(
        "memory",
        ScalerConfig {
            target_value: 150.0,
            ..base.clone()
        },
        AggregationKind::Weighted,
        now,
    )?;

    // Request rate: a whole-deployment target of 1000 req/s.
    let requests = Scaler::new(
        "requests",
        ScalerConfig {
            target_value: 0.0,
            total_target_value: 1000.0,
            ..base
        },
        AggregationKind::Weighted,
        now,
    )?;

    let manager = Manager::new(min_pods, max_pods);
    manager.register(cpu);
    manager.register(memory);
    manager.register(requests);
    Ok(manager)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("loadsim=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Synthetic clock: anchored once, advanced one second per tick. The
    // library itself never reads a clock.
    let start = UNIX_EPOCH + Duration::from_secs(1_800_000_000);
    let manager = build_manager(cli.min_pods, cli.max_pods, start)?;

    let mut pods = cli.initial_pods;
    info!(
        ticks = cli.ticks,
        initial_pods = pods,
        "starting autoscaler simulation"
    );

    println!("{:>5}  {:>9}  {:>8}  {:>8}  {:>9}  {:>5}", "tick", "phase", "cpu/pod", "mem/pod", "rps", "pods");
    for tick in 0..cli.ticks {
        let now = start + Duration::from_secs(tick);
        let phase = phase_at(tick);

        // Totals across all pods, as a metrics pipeline would report them.
        manager.record("cpu", phase.cpu_millicores * f64::from(pods), now)?;
        manager.record("memory", phase.memory_mb * f64::from(pods), now)?;
        manager.record("requests", phase.total_rps, now)?;

        let desired = manager.scale(pods, now);
        if desired != pods {
            info!(tick, from = pods, to = desired, phase = phase.name, "applying scale decision");
        }
        pods = desired;

        if tick % 5 == 0 {
            println!(
                "{:>5}  {:>9}  {:>8.1}  {:>8.1}  {:>9.1}  {:>5}",
                tick, phase.name, phase.cpu_millicores, phase.memory_mb, phase.total_rps, pods
            );
        }
    }

    info!(final_pods = pods, "simulation finished");
    Ok(())
}
