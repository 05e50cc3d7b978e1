//! Orchestration: collaborator seams, per-intersection workers, and the
//! runtime that ties them to the scenario manager.
//!
//! Internal modules:
//! - [`collaborators`]: the typed boundaries to detection, lights, telemetry;
//! - [`worker`]: the per-intersection tick loop;
//! - [`runtime`]: builder, worker fleet, reaper wiring, graceful shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

pub(crate) mod collaborators;
mod runtime;
mod shutdown;
pub(crate) mod worker;

pub use collaborators::{CycleRecord, LightControlSink, TelemetrySink, VehicleCountProvider};
pub use runtime::{RuntimeBuilder, SignalRuntime};
pub use worker::IntersectionSpec;
