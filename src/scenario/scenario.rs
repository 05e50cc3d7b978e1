//! # The scenario value object.
//!
//! A scenario is one execution of one intersection's optimization cycle:
//! created at the start of a tick, owned exclusively by that intersection's
//! worker until closed, destroyed on closure after folding its metrics into
//! the manager's aggregates. Resources attached to it are owned by the
//! scenario alone until cleanup releases them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::scenario::{ScenarioResource, ScenarioState};

/// Globally unique scenario identifier.
///
/// Shaped as `scn-<intersection>-<8 hex>`; the suffix comes from a v4 uuid,
/// so ids never collide across ticks or intersections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioId(Arc<str>);

impl ScenarioId {
    /// Generates a fresh id for one intersection's cycle.
    pub(crate) fn generate(intersection: &str) -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!("scn-{intersection}-{}", &uuid[..8]).into())
    }

    /// Wraps a raw id (tests, deserialized references).
    pub fn from_raw(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Counters a cycle accumulates while running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScenarioMetrics {
    /// Vehicles observed and fed into the optimizer.
    pub vehicles_processed: u64,
    /// Optimization results produced.
    pub predictions_made: u64,
    /// Plans handed to the light-control sink.
    pub light_changes: u64,
}

impl ScenarioMetrics {
    /// Folds another delta into this one (saturating).
    pub fn merge(&mut self, delta: ScenarioMetrics) {
        self.vehicles_processed = self.vehicles_processed.saturating_add(delta.vehicles_processed);
        self.predictions_made = self.predictions_made.saturating_add(delta.predictions_made);
        self.light_changes = self.light_changes.saturating_add(delta.light_changes);
    }
}

/// One bounded, resource-tracked unit of work.
///
/// Lives inside the manager's active map; the public view is
/// [`ScenarioSnapshot`].
pub(crate) struct Scenario {
    pub(crate) id: ScenarioId,
    pub(crate) intersection_id: Arc<str>,
    pub(crate) state: ScenarioState,
    pub(crate) created_at: Instant,
    pub(crate) started_at: Option<Instant>,
    pub(crate) completed_at: Option<Instant>,
    pub(crate) resources: HashMap<String, Box<dyn ScenarioResource>>,
    pub(crate) metrics: ScenarioMetrics,
    pub(crate) error: Option<String>,
}

impl Scenario {
    pub(crate) fn new(intersection_id: &str) -> Self {
        Self {
            id: ScenarioId::generate(intersection_id),
            intersection_id: intersection_id.into(),
            state: ScenarioState::Created,
            created_at: Instant::now(),
            started_at: None,
            completed_at: None,
            resources: HashMap::new(),
            metrics: ScenarioMetrics::default(),
            error: None,
        }
    }

    /// Time since creation.
    pub(crate) fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Running time, once started (until completion if completed).
    pub(crate) fn run_time(&self) -> Option<Duration> {
        let started = self.started_at?;
        Some(match self.completed_at {
            Some(done) => done.duration_since(started),
            None => started.elapsed(),
        })
    }

    pub(crate) fn snapshot(&self) -> ScenarioSnapshot {
        let mut resources: Vec<String> = self.resources.keys().cloned().collect();
        resources.sort_unstable();
        ScenarioSnapshot {
            id: self.id.clone(),
            intersection_id: self.intersection_id.clone(),
            state: self.state,
            age: self.age(),
            run_time: self.run_time(),
            resources,
            metrics: self.metrics,
            error: self.error.clone(),
        }
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("id", &self.id)
            .field("intersection_id", &self.intersection_id)
            .field("state", &self.state)
            .field("resources", &self.resources.len())
            .field("metrics", &self.metrics)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a scenario for status queries and history.
#[derive(Debug, Clone)]
pub struct ScenarioSnapshot {
    /// Scenario id.
    pub id: ScenarioId,
    /// Intersection the cycle belonged to.
    pub intersection_id: Arc<str>,
    /// State at snapshot time.
    pub state: ScenarioState,
    /// Time since creation at snapshot time.
    pub age: Duration,
    /// Running time, if the scenario ever started.
    pub run_time: Option<Duration>,
    /// Names of currently attached resources (empty once closed).
    pub resources: Vec<String>,
    /// Accumulated metrics.
    pub metrics: ScenarioMetrics,
    /// Recorded failure, if any.
    pub error: Option<String>,
}

/// Aggregate counters kept for the manager's whole lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Scenarios ever created.
    pub total_created: u64,
    /// Scenarios completed successfully.
    pub total_completed: u64,
    /// Scenarios that ended failed (including forced closes).
    pub total_failed: u64,
    /// Scenarios fully closed.
    pub total_closed: u64,
    /// Scenarios force-closed by the reaper.
    pub total_expired: u64,
    /// Currently active scenarios.
    pub active: usize,
    /// Metrics folded in from every closed scenario.
    pub aggregate: ScenarioMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_carry_the_intersection() {
        let a = ScenarioId::generate("main-and-5th");
        let b = ScenarioId::generate("main-and-5th");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("scn-main-and-5th-"));
    }

    #[test]
    fn metrics_merge_accumulates() {
        let mut metrics = ScenarioMetrics::default();
        metrics.merge(ScenarioMetrics {
            vehicles_processed: 12,
            predictions_made: 1,
            light_changes: 0,
        });
        metrics.merge(ScenarioMetrics {
            vehicles_processed: 3,
            predictions_made: 0,
            light_changes: 1,
        });
        assert_eq!(metrics.vehicles_processed, 15);
        assert_eq!(metrics.predictions_made, 1);
        assert_eq!(metrics.light_changes, 1);
    }

    #[tokio::test]
    async fn snapshot_reflects_resources_sorted() {
        let mut scenario = Scenario::new("elm");
        scenario.resources.insert(
            "phase_plan".to_string(),
            crate::scenario::ResourceFn::boxed(|| Ok(())),
        );
        scenario.resources.insert(
            "detection_frame".to_string(),
            crate::scenario::ResourceFn::boxed(|| Ok(())),
        );
        let snap = scenario.snapshot();
        assert_eq!(snap.resources, vec!["detection_frame", "phase_plan"]);
        assert_eq!(snap.state, ScenarioState::Created);
        assert!(snap.run_time.is_none());
    }
}
