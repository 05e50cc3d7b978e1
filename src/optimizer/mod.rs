//! Pure timing optimization: validated counts in, bounded plans out.
//!
//! Internal modules:
//! - [`counts`]: directions, phase groups, validated vehicle counts;
//! - [`context`]: weather, day patterns, the per-call timing context;
//! - [`plan`]: phase timings and the optimization result;
//! - [`engine`]: the allocation algorithm and its tunable parameters.

mod context;
mod counts;
mod engine;
mod plan;

pub use context::{DayPattern, TimingContext, Weather};
pub use counts::{ApproachCount, Direction, PhaseGroup, VehicleClass, VehicleCounts};
pub use engine::{TimingOptimizer, TimingParams};
pub use plan::{OptimizationResult, PhasePlan, PhaseTiming};
