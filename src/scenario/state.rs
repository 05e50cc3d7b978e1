//! # Scenario lifecycle states.
//!
//! ```text
//! Created ──► Running ──► Completed ─┐
//!     │          │                   ├──► Cleanup ──► Closed
//!     │          └─────► Failed ─────┘
//!     │                    ▲
//!     └── (forced close) ──┘
//! ```
//!
//! `Closed` is the only terminal state; there are no exits from it. A forced
//! close may take a scenario out of any non-terminal state, marking a still
//! Created/Running one as Failed on the way.

/// Lifecycle state of one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    /// Registered, not yet started.
    Created,
    /// Owned by a worker, cycle in flight.
    Running,
    /// Finished successfully, awaiting cleanup.
    Completed,
    /// Finished with an error, awaiting cleanup.
    Failed,
    /// Resources being released.
    Cleanup,
    /// Terminal: resources released, removed from the active set.
    Closed,
}

impl ScenarioState {
    /// True only for [`ScenarioState::Closed`].
    pub fn is_terminal(self) -> bool {
        matches!(self, ScenarioState::Closed)
    }

    /// True while the outcome is still undecided.
    pub fn is_open(self) -> bool {
        matches!(self, ScenarioState::Created | ScenarioState::Running)
    }

    /// Short stable label (snake_case) for logs/metrics.
    pub fn as_label(self) -> &'static str {
        match self {
            ScenarioState::Created => "created",
            ScenarioState::Running => "running",
            ScenarioState::Completed => "completed",
            ScenarioState::Failed => "failed",
            ScenarioState::Cleanup => "cleanup",
            ScenarioState::Closed => "closed",
        }
    }
}
