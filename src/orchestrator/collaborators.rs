//! # Collaborator seams.
//!
//! The core never talks to cameras, ML models, light hardware, or databases
//! directly; it consumes two narrow async traits and exposes one. Whether a
//! [`VehicleCountProvider`] is a live detector or a simulator is invisible
//! here.
//!
//! Every consumed call runs under the worker's bounded timeout; a slow or
//! failing collaborator costs that intersection one cycle, nothing more.

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::optimizer::{OptimizationResult, PhasePlan, VehicleCounts};
use crate::scenario::ScenarioMetrics;

/// Source of per-approach vehicle counts (consumed).
#[async_trait]
pub trait VehicleCountProvider: Send + Sync {
    /// Fetches the current counts for one intersection.
    async fn fetch_counts(&self, intersection_id: &str)
        -> Result<VehicleCounts, CollaboratorError>;
}

/// Signal hardware interface (consumed).
#[async_trait]
pub trait LightControlSink: Send + Sync {
    /// Applies a timing plan to one intersection's lights.
    async fn apply(
        &self,
        intersection_id: &str,
        plan: &PhasePlan,
    ) -> Result<(), CollaboratorError>;
}

/// Persistence/telemetry interface (exposed, fire-and-forget).
///
/// Invoked with the record of each finished cycle from a dedicated relay
/// worker; the cycle itself never waits on, nor retries, this call.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Records one finished cycle.
    async fn record(&self, record: CycleRecord);
}

/// Everything a telemetry sink gets about one finished cycle.
#[derive(Debug, Clone)]
pub struct CycleRecord {
    /// Scenario id of the cycle.
    pub scenario: String,
    /// Intersection the cycle ran for.
    pub intersection: String,
    /// The optimization outcome, including plan and reasoning.
    pub result: OptimizationResult,
    /// Metrics the cycle accumulated.
    pub metrics: ScenarioMetrics,
}

impl CycleRecord {
    /// The produced plan.
    pub fn plan(&self) -> PhasePlan {
        self.result.plan
    }
}
