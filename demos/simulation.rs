//! # Simulated intersection demo
//!
//! Drives two intersections from a deterministic traffic wave:
//! - Demand-proportional plans per tick
//! - Emergency priority on one wave peak
//! - Scenario statistics printed at shutdown
//!
//! Run with: `cargo run --example simulation --features logging`

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use greenwave::{
    ApproachCount, CollaboratorError, Config, IntersectionSpec, LightControlSink, LogWriter,
    PhasePlan, SignalRuntime, VehicleCountProvider, VehicleCounts,
};

/// Deterministic traffic wave: demand swells and ebbs per tick.
struct WaveProvider {
    tick: AtomicU32,
}

#[async_trait]
impl VehicleCountProvider for WaveProvider {
    async fn fetch_counts(&self, _id: &str) -> Result<VehicleCounts, CollaboratorError> {
        let t = self.tick.fetch_add(1, Ordering::Relaxed);
        let swell = (t % 10) + 1;

        let mut counts = VehicleCounts {
            north: ApproachCount::plain(swell * 2),
            south: ApproachCount::plain(swell),
            east: ApproachCount::plain(11 - swell),
            west: ApproachCount::plain((11 - swell) / 2),
        };
        // An ambulance rides the wave peak.
        if swell == 9 {
            counts.north = counts.north.with_emergency();
        }
        Ok(counts)
    }
}

/// Prints each applied plan instead of driving hardware.
struct ConsoleLights;

#[async_trait]
impl LightControlSink for ConsoleLights {
    async fn apply(&self, id: &str, plan: &PhasePlan) -> Result<(), CollaboratorError> {
        println!(
            "🚦 {id}: NS {}s / EW {}s green (cycle {}s)",
            plan.ns.green_secs,
            plan.ew.green_secs,
            plan.cycle_secs()
        );
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config {
        tick_interval: Duration::from_millis(500),
        ..Config::default()
    };

    let runtime = SignalRuntime::builder(cfg)
        .with_subscriber(Arc::new(LogWriter::new()))
        .build()?;

    let specs = vec![
        IntersectionSpec::new(
            "main-and-5th",
            Arc::new(WaveProvider {
                tick: AtomicU32::new(0),
            }),
            Arc::new(ConsoleLights),
        ),
        IntersectionSpec::new(
            "elm-and-2nd",
            Arc::new(WaveProvider {
                tick: AtomicU32::new(5),
            }),
            Arc::new(ConsoleLights),
        ),
    ];

    println!("🚀 Running two simulated intersections for 10s (Ctrl-C to stop early)");

    let token = CancellationToken::new();
    let stop = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        stop.cancel();
    });

    let manager = runtime.manager();
    runtime.run_with_token(specs, token).await?;

    let stats = manager.stats().await;
    println!(
        "📊 cycles: {} completed, {} failed, {} closed | vehicles processed: {}",
        stats.total_completed,
        stats.total_failed,
        stats.total_closed,
        stats.aggregate.vehicles_processed
    );
    Ok(())
}
