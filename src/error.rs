//! Error types used by the greenwave runtime and the timing optimizer.
//!
//! This module defines the error enums for each layer of the system:
//!
//! - [`OptimizeError`] — malformed optimizer input, rejected at the boundary.
//! - [`ScenarioError`] — scenario lifecycle violations raised by the manager.
//! - [`CollaboratorError`] — failures of external collaborators (detection
//!   feed, light hardware).
//! - [`CycleError`] — everything that can abort one optimization cycle,
//!   recorded on the failed scenario.
//! - [`RuntimeError`] — errors raised by the runtime itself during shutdown.
//!
//! All types provide helper methods (`as_label`, `as_message`) for
//! logging/metrics, and recoverability predicates where the distinction
//! matters ([`ScenarioError::is_recoverable`]).

use std::time::Duration;
use thiserror::Error;

use crate::optimizer::Direction;
use crate::scenario::{ScenarioId, ScenarioState};

/// # Errors produced by optimizer input validation.
///
/// Counts are validated at the boundary before any timing math runs;
/// a rejected input never produces a plan.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    /// A per-class breakdown does not sum to its direction total.
    #[error("{direction:?}: class breakdown sums to {class_sum}, direction total is {total}")]
    ClassBreakdownMismatch {
        /// Direction whose breakdown is inconsistent.
        direction: Direction,
        /// Reported direction total.
        total: u32,
        /// Sum of the per-class counts.
        class_sum: u32,
    },

    /// The historical demand ratio is outside `[0, 1]` (or not finite).
    #[error("historical ratio {value} outside [0, 1]")]
    RatioOutOfRange {
        /// The offending value.
        value: f64,
    },
}

impl OptimizeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OptimizeError::ClassBreakdownMismatch { .. } => "invalid_input_class_breakdown",
            OptimizeError::RatioOutOfRange { .. } => "invalid_input_ratio",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced by scenario lifecycle operations.
///
/// [`ScenarioError::CapacityExceeded`] is recoverable (the caller skips the
/// current tick); the remaining variants signal caller bugs or asynchronous
/// expiry and additionally force the scenario closed.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    /// The manager is at its concurrency limit; no scenario was created.
    #[error("scenario capacity exceeded: {active} active, limit {limit}")]
    CapacityExceeded {
        /// Number of currently active scenarios.
        active: usize,
        /// Configured `max_concurrent_scenarios`.
        limit: usize,
    },

    /// An operation was attempted in a state that does not permit it.
    #[error("scenario {id} cannot {op} from state {from:?}")]
    InvalidState {
        /// Scenario the operation targeted.
        id: ScenarioId,
        /// State the scenario was in.
        from: ScenarioState,
        /// Name of the rejected operation.
        op: &'static str,
    },

    /// The scenario id is not registered (and not in recent history).
    #[error("unknown scenario {id}")]
    UnknownScenario {
        /// The unresolved id.
        id: ScenarioId,
    },

    /// The scenario exceeded its timeout and was force-closed by the reaper.
    #[error("scenario {id} expired after {age:?} (timeout {timeout:?})")]
    Expired {
        /// Scenario that expired.
        id: ScenarioId,
        /// Age at the time of the sweep.
        age: Duration,
        /// Configured `scenario_timeout`.
        timeout: Duration,
    },
}

impl ScenarioError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use greenwave::ScenarioError;
    ///
    /// let err = ScenarioError::CapacityExceeded { active: 10, limit: 10 };
    /// assert_eq!(err.as_label(), "scenario_capacity_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ScenarioError::CapacityExceeded { .. } => "scenario_capacity_exceeded",
            ScenarioError::InvalidState { .. } => "scenario_invalid_state",
            ScenarioError::UnknownScenario { .. } => "scenario_unknown",
            ScenarioError::Expired { .. } => "scenario_expired",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// Indicates whether the caller can simply try again on a later tick.
    ///
    /// Only [`ScenarioError::CapacityExceeded`] is recoverable; every other
    /// variant is a caller bug or an asynchronous expiry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScenarioError::CapacityExceeded { .. })
    }
}

/// # Errors produced by external collaborators.
///
/// Raised by the vehicle-count fetch and the light-control apply. Both are
/// caught at the worker: the scenario is marked failed and the cycle is
/// skipped; the failure never crosses to another intersection.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    /// The collaborator call exceeded its bounded timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Which call timed out (`"fetch_counts"`, `"apply_plan"`).
        operation: &'static str,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// The collaborator returned an error.
    #[error("{operation} failed: {message}")]
    Failed {
        /// Which call failed.
        operation: &'static str,
        /// Collaborator-supplied error text.
        message: String,
    },
}

impl CollaboratorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CollaboratorError::Timeout { .. } => "collaborator_timeout",
            CollaboratorError::Failed { .. } => "collaborator_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }

    /// Convenience constructor for a failed call.
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        CollaboratorError::Failed {
            operation,
            message: message.into(),
        }
    }
}

/// # Everything that can abort one optimization cycle.
///
/// The worker folds lower-level failures into this type; its message is what
/// gets recorded on the failed scenario.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    /// The detection feed produced input the optimizer rejected.
    #[error(transparent)]
    Input(#[from] OptimizeError),

    /// A lifecycle operation failed mid-cycle.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// A collaborator call failed or timed out.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl CycleError {
    /// Returns the label of the underlying error.
    pub fn as_label(&self) -> &'static str {
        match self {
            CycleError::Input(e) => e.as_label(),
            CycleError::Scenario(e) => e.as_label(),
            CycleError::Collaborator(e) => e.as_label(),
        }
    }

    /// True when the cycle may simply be retried on the next tick without
    /// marking anything failed (capacity pushback).
    pub fn is_skippable(&self) -> bool {
        matches!(self, CycleError::Scenario(e) if e.is_recoverable())
    }
}

/// # Errors produced by the runtime itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some scenarios remained open and
    /// had to be abandoned to forced termination.
    #[error("shutdown grace {grace:?} exceeded; stuck scenarios: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of scenarios that were still open when the grace expired.
        stuck: Vec<ScenarioId>,
    },

    /// The injected configuration violates a runtime invariant.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// The first violated rule.
        reason: &'static str,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use greenwave::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::InvalidConfig { .. } => "runtime_invalid_config",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}
