//! # Runtime events emitted by the manager, reaper, and workers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Scenario lifecycle**: created, started, completed, failed, closed
//! - **Supervision**: expiry by the reaper, resource-release failures,
//!   skipped cycles under capacity pushback
//! - **Cycle outcomes**: plan applied, cycle record for telemetry
//! - **Shutdown**: requested, drained within grace, grace exceeded
//!
//! The [`Event`] struct carries optional metadata such as the scenario id,
//! intersection, error text, and the cycle record.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::orchestrator::CycleRecord;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Scenario lifecycle ===
    /// A scenario was registered with the manager.
    ///
    /// Sets: `scenario`, `intersection`.
    ScenarioCreated,

    /// A scenario moved to the running state.
    ///
    /// Sets: `scenario`.
    ScenarioStarted,

    /// A scenario completed successfully.
    ///
    /// Sets: `scenario`, `elapsed` (time since start).
    ScenarioCompleted,

    /// A scenario was marked failed.
    ///
    /// Sets: `scenario`, `error`.
    ScenarioFailed,

    /// A scenario finished cleanup and left the active set.
    ///
    /// Sets: `scenario`.
    ScenarioClosed,

    // === Supervision ===
    /// The reaper force-closed a scenario that exceeded its timeout.
    ///
    /// Sets: `scenario`, `elapsed` (age at the sweep), `error`.
    ScenarioExpired,

    /// Releasing an attached resource failed; the remaining resources are
    /// still released.
    ///
    /// Sets: `scenario`, `resource`, `error`.
    ResourceReleaseFailed,

    /// A worker skipped its tick because the manager was at capacity.
    ///
    /// Sets: `intersection`, `error`.
    CycleSkipped,

    // === Cycle outcomes ===
    /// A timing plan was handed to the light-control sink.
    ///
    /// Sets: `scenario`, `intersection`.
    PlanApplied,

    /// One full cycle finished; carries the record for telemetry sinks.
    ///
    /// Sets: `scenario`, `intersection`, `record`.
    CycleCompleted,

    // === Shutdown ===
    /// Shutdown requested (OS signal observed or `run` ending).
    ShutdownRequested,

    /// All workers drained within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some scenarios were still open.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Scenario id, if applicable.
    pub scenario: Option<Arc<str>>,
    /// Intersection id, if applicable.
    pub intersection: Option<Arc<str>>,
    /// Resource name (release failures).
    pub resource: Option<Arc<str>>,
    /// Human-readable error text.
    pub error: Option<Arc<str>>,
    /// Elapsed time relevant to the event (cycle duration, scenario age).
    pub elapsed: Option<Duration>,
    /// Full cycle record (only on [`EventKind::CycleCompleted`]).
    pub record: Option<Arc<CycleRecord>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            scenario: None,
            intersection: None,
            resource: None,
            error: None,
            elapsed: None,
            record: None,
        }
    }

    /// Attaches a scenario id.
    #[inline]
    pub fn with_scenario(mut self, id: impl Into<Arc<str>>) -> Self {
        self.scenario = Some(id.into());
        self
    }

    /// Attaches an intersection id.
    #[inline]
    pub fn with_intersection(mut self, id: impl Into<Arc<str>>) -> Self {
        self.intersection = Some(id.into());
        self
    }

    /// Attaches a resource name.
    #[inline]
    pub fn with_resource(mut self, name: impl Into<Arc<str>>) -> Self {
        self.resource = Some(name.into());
        self
    }

    /// Attaches a human-readable error.
    #[inline]
    pub fn with_error(mut self, error: impl Into<Arc<str>>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attaches an elapsed duration.
    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed = Some(d);
        self
    }

    /// Attaches a cycle record.
    #[inline]
    pub fn with_record(mut self, record: CycleRecord) -> Self {
        self.record = Some(Arc::new(record));
        self
    }
}
