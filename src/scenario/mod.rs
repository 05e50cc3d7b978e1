//! Scenario lifecycle: the value object, its resources, and the manager.
//!
//! Internal modules:
//! - [`state`]: the lifecycle state machine;
//! - [`scenario`]: ids, metrics, the scenario value object, snapshots;
//! - [`resource`]: owned resources released at cleanup;
//! - [`manager`]: the process-wide coordinator;
//! - [`reaper`]: periodic expiry sweeps.

mod manager;
mod reaper;
mod resource;
mod scenario;
mod state;

pub use manager::ScenarioManager;
pub use resource::{ReleaseError, ResourceFn, ScenarioResource};
pub use scenario::{ManagerStats, ScenarioId, ScenarioMetrics, ScenarioSnapshot};
pub use state::ScenarioState;

pub(crate) use reaper::spawn_reaper;
pub(crate) use scenario::Scenario;
