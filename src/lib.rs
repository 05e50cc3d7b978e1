//! # greenwave
//!
//! **Greenwave** is an adaptive traffic-signal timing runtime for Rust.
//!
//! It pairs a pure multi-factor timing optimizer with a supervised,
//! resource-tracked scenario lifecycle: every optimization cycle of every
//! intersection runs as a bounded unit of work that is guaranteed to release
//! its resources and to terminate, even when a collaborator hangs or a
//! worker misbehaves.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌────────────────┐   ┌────────────────┐   ┌────────────────┐
//!  │IntersectionSpec│   │IntersectionSpec│   │IntersectionSpec│
//!  │ (elm + feeds)  │   │ (oak + feeds)  │   │ (5th + feeds)  │
//!  └───────┬────────┘   └───────┬────────┘   └───────┬────────┘
//!          ▼                    ▼                    ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  SignalRuntime                                                   │
//! │  - Bus (broadcast events)                                        │
//! │  - SubscriberSet (fans out to user subscribers + telemetry)      │
//! │  - ScenarioManager (active map, counters, capacity, timeouts)    │
//! │  - Reaper (periodic expiry sweeps)                               │
//! └───────┬──────────────────┬──────────────────┬────────────┬──────┘
//!         ▼                  ▼                  ▼            │
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐    │
//!  │    Worker    │   │    Worker    │   │    Worker    │    │
//!  │ (tick loop)  │   │ (tick loop)  │   │ (tick loop)  │    │
//!  └┬─────────────┘   └┬─────────────┘   └┬─────────────┘    │
//!   │ each tick:       │                  │                  │
//!   │ create scenario  │                  │                  │
//!   │ fetch counts ────┼── bounded ───────┼── collaborator   │
//!   │ TimingOptimizer  │                  │   calls          │
//!   │ apply plan ──────┼── bounded ───────┤                  │
//!   │ complete + close │                  │                  │
//!   ▼                  ▼                  ▼                  ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                      │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 ▼
//!                     SubscriberSet (per-sub queues)
//!                     ┌───────────┼───────────┐
//!                     ▼           ▼           ▼
//!                 LogWriter  TelemetryRelay  custom
//! ```
//!
//! ### Scenario lifecycle
//! ```text
//! create ──► Created ──► Running ──► Completed ─┐
//!               │           │                   ├─► Cleanup ─► Closed
//!               │           └────► Failed ──────┘
//!               │                    ▲
//!               └─── forced close ───┘
//!
//! - capacity check at create (CapacityExceeded → the caller skips its tick)
//! - any error in fetch/optimize/apply → complete(failure) → close(force)
//! - the reaper force-closes anything older than Config::scenario_timeout
//! - close releases every attached resource best-effort, exactly once
//! ```
//!
//! ## Features
//! | Area              | Description                                                         | Key types / traits                           |
//! |-------------------|---------------------------------------------------------------------|----------------------------------------------|
//! | **Optimization**  | Pure demand-proportional timing with bounded efficiency scores.     | [`TimingOptimizer`], [`OptimizationResult`]  |
//! | **Scenarios**     | Bounded, resource-tracked units of work with a strict state machine.| [`ScenarioManager`], [`ScenarioResource`]    |
//! | **Orchestration** | Per-intersection workers over shared supervision.                   | [`SignalRuntime`], [`IntersectionSpec`]      |
//! | **Collaborators** | Narrow seams to detection, lights, and telemetry.                   | [`VehicleCountProvider`], [`LightControlSink`], [`TelemetrySink`] |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom subscribers).  | [`Subscribe`]                                |
//! | **Errors**        | Typed errors per layer with stable labels.                          | [`ScenarioError`], [`CollaboratorError`]     |
//! | **Configuration** | Centralized, injected runtime settings.                             | [`Config`]                                   |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//! use greenwave::{
//!     CollaboratorError, Config, IntersectionSpec, LightControlSink, PhasePlan,
//!     SignalRuntime, VehicleCountProvider, VehicleCounts,
//! };
//!
//! struct Simulator;
//!
//! #[async_trait]
//! impl VehicleCountProvider for Simulator {
//!     async fn fetch_counts(&self, _id: &str) -> Result<VehicleCounts, CollaboratorError> {
//!         Ok(VehicleCounts::from_totals(4, 3, 5, 4))
//!     }
//! }
//!
//! struct NullLights;
//!
//! #[async_trait]
//! impl LightControlSink for NullLights {
//!     async fn apply(&self, _id: &str, _plan: &PhasePlan) -> Result<(), CollaboratorError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = SignalRuntime::builder(Config::default()).build()?;
//!
//!     let specs = vec![IntersectionSpec::new(
//!         "main-and-5th",
//!         Arc::new(Simulator),
//!         Arc::new(NullLights),
//!     )];
//!
//!     // Drive a few cycles, then stop.
//!     let token = CancellationToken::new();
//!     let stop = token.clone();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//!         stop.cancel();
//!     });
//!
//!     runtime.run_with_token(specs, token).await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod events;
mod optimizer;
mod orchestrator;
mod scenario;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use error::{CollaboratorError, CycleError, OptimizeError, RuntimeError, ScenarioError};
pub use events::{Bus, Event, EventKind};
pub use optimizer::{
    ApproachCount, DayPattern, Direction, OptimizationResult, PhaseGroup, PhasePlan, PhaseTiming,
    TimingContext, TimingOptimizer, TimingParams, VehicleClass, VehicleCounts, Weather,
};
pub use orchestrator::{
    CycleRecord, IntersectionSpec, LightControlSink, RuntimeBuilder, SignalRuntime, TelemetrySink,
    VehicleCountProvider,
};
pub use scenario::{
    ManagerStats, ReleaseError, ResourceFn, ScenarioId, ScenarioManager, ScenarioMetrics,
    ScenarioResource, ScenarioSnapshot, ScenarioState,
};
pub use subscribers::{Subscribe, SubscriberSet, TelemetryRelay};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
