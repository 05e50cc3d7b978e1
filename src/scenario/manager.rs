//! # ScenarioManager — process-wide scenario lifecycle coordinator.
//!
//! One manager instance is shared by every intersection worker plus the
//! reaper. It owns the only shared mutable state in the system: the map of
//! active scenarios and the aggregate counters, both behind a single async
//! mutex, so every mutating call is serialized.
//!
//! ## Rules
//! - `active.len()` never exceeds the configured concurrency limit;
//!   `create` fails with `CapacityExceeded` at the limit instead of queueing.
//! - A scenario is removed from the active map exactly once (under the
//!   lock), which makes `close` idempotent and resource release
//!   exactly-once by construction.
//! - Resource release runs **after** the lock is dropped and is best-effort:
//!   a failing release is published as an event and never blocks the rest.
//! - An invalid transition is a caller bug: the operation fails with
//!   `InvalidState` *and* the scenario is force-closed.
//! - Closing an unknown id is a no-op (indistinguishable from a long-closed
//!   scenario once history is trimmed).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::Config;
use crate::error::ScenarioError;
use crate::events::{Bus, Event, EventKind};
use crate::scenario::{
    ManagerStats, Scenario, ScenarioId, ScenarioMetrics, ScenarioResource, ScenarioSnapshot,
    ScenarioState,
};

struct Inner {
    active: HashMap<ScenarioId, Scenario>,
    closed: VecDeque<ScenarioSnapshot>,
    stats: ManagerStats,
}

/// Process-wide coordinator for scenario lifecycles.
///
/// Created once, passed by handle (`Arc`) to all workers and the reaper;
/// never accessed through globals.
pub struct ScenarioManager {
    limit: usize,
    timeout: Duration,
    closed_history: usize,
    inner: Mutex<Inner>,
    bus: Bus,
}

impl ScenarioManager {
    /// Creates a manager with the given limits, publishing to `bus`.
    pub fn new(cfg: &Config, bus: Bus) -> Self {
        Self {
            limit: cfg.max_concurrent_scenarios,
            timeout: cfg.scenario_timeout,
            closed_history: cfg.closed_history,
            inner: Mutex::new(Inner {
                active: HashMap::new(),
                closed: VecDeque::new(),
                stats: ManagerStats::default(),
            }),
            bus,
        }
    }

    /// Registers a new scenario for one intersection's cycle.
    pub async fn create(&self, intersection_id: &str) -> Result<ScenarioId, ScenarioError> {
        let id = {
            let mut inner = self.inner.lock().await;
            if inner.active.len() >= self.limit {
                return Err(ScenarioError::CapacityExceeded {
                    active: inner.active.len(),
                    limit: self.limit,
                });
            }
            let scenario = Scenario::new(intersection_id);
            let id = scenario.id.clone();
            inner.active.insert(id.clone(), scenario);
            inner.stats.total_created += 1;
            id
        };
        self.bus.publish(
            Event::now(EventKind::ScenarioCreated)
                .with_scenario(id.as_str())
                .with_intersection(intersection_id),
        );
        Ok(id)
    }

    /// Moves a scenario from `Created` to `Running`.
    pub async fn start(&self, id: &ScenarioId) -> Result<(), ScenarioError> {
        {
            let mut inner = self.inner.lock().await;
            let scenario = inner
                .active
                .get_mut(id)
                .ok_or_else(|| ScenarioError::UnknownScenario { id: id.clone() })?;
            if scenario.state != ScenarioState::Created {
                let from = scenario.state;
                drop(inner);
                return self.fail_transition(id, from, "start").await;
            }
            scenario.state = ScenarioState::Running;
            scenario.started_at = Some(Instant::now());
        }
        self.bus
            .publish(Event::now(EventKind::ScenarioStarted).with_scenario(id.as_str()));
        Ok(())
    }

    /// Attaches an owned resource to a scenario.
    ///
    /// Reattaching an existing name releases the prior handle first
    /// (best-effort).
    pub async fn add_resource(
        &self,
        id: &ScenarioId,
        name: &str,
        handle: Box<dyn ScenarioResource>,
    ) -> Result<(), ScenarioError> {
        let prior = {
            let mut inner = self.inner.lock().await;
            let scenario = inner
                .active
                .get_mut(id)
                .ok_or_else(|| ScenarioError::UnknownScenario { id: id.clone() })?;
            if !scenario.state.is_open() {
                let from = scenario.state;
                drop(inner);
                return self.fail_transition(id, from, "add_resource").await;
            }
            scenario.resources.insert(name.to_string(), handle)
        };
        if let Some(mut old) = prior {
            self.release_one(id, name, old.as_mut());
        }
        Ok(())
    }

    /// Merges a metrics delta into a running scenario.
    pub async fn update_progress(
        &self,
        id: &ScenarioId,
        delta: ScenarioMetrics,
    ) -> Result<(), ScenarioError> {
        let mut inner = self.inner.lock().await;
        let scenario = inner
            .active
            .get_mut(id)
            .ok_or_else(|| ScenarioError::UnknownScenario { id: id.clone() })?;
        if scenario.state != ScenarioState::Running {
            let from = scenario.state;
            drop(inner);
            return self.fail_transition(id, from, "update_progress").await;
        }
        scenario.metrics.merge(delta);
        Ok(())
    }

    /// Settles a running scenario as `Completed` or `Failed`.
    pub async fn complete(
        &self,
        id: &ScenarioId,
        success: bool,
        error: Option<String>,
    ) -> Result<(), ScenarioError> {
        let (event, elapsed) = {
            let mut inner = self.inner.lock().await;
            let scenario = inner
                .active
                .get_mut(id)
                .ok_or_else(|| ScenarioError::UnknownScenario { id: id.clone() })?;
            if scenario.state != ScenarioState::Running {
                let from = scenario.state;
                drop(inner);
                return self.fail_transition(id, from, "complete").await;
            }
            scenario.completed_at = Some(Instant::now());
            let elapsed = scenario.run_time();
            let event = if success {
                scenario.state = ScenarioState::Completed;
                Event::now(EventKind::ScenarioCompleted).with_scenario(id.as_str())
            } else {
                scenario.state = ScenarioState::Failed;
                scenario.error = error;
                let mut ev = Event::now(EventKind::ScenarioFailed).with_scenario(id.as_str());
                if let Some(text) = &scenario.error {
                    ev = ev.with_error(text.as_str());
                }
                ev
            };
            if success {
                inner.stats.total_completed += 1;
            } else {
                inner.stats.total_failed += 1;
            }
            (event, elapsed)
        };
        let event = match elapsed {
            Some(d) => event.with_elapsed(d),
            None => event,
        };
        self.bus.publish(event);
        Ok(())
    }

    /// Closes a scenario: `Cleanup` → `Closed`, releasing every attached
    /// resource and folding metrics into the aggregates.
    ///
    /// `force = true` closes from any non-terminal state, marking a still
    /// open scenario `Failed` on the way. Closing an already closed (or
    /// unknown) scenario is a no-op.
    pub async fn close(&self, id: &ScenarioId, force: bool) -> Result<(), ScenarioError> {
        self.close_inner(id, force, None).await
    }

    /// Force-closes every active scenario (shutdown path).
    pub async fn close_all(&self) {
        for id in self.open_ids().await {
            let _ = self.close_inner(&id, true, None).await;
        }
    }

    /// Force-closes every scenario older than the configured timeout.
    ///
    /// Called by the reaper; returns how many scenarios were expired.
    pub async fn sweep_expired(&self) -> usize {
        let expired: Vec<(ScenarioId, Duration)> = {
            let inner = self.inner.lock().await;
            inner
                .active
                .values()
                .filter(|s| s.age() > self.timeout)
                .map(|s| (s.id.clone(), s.age()))
                .collect()
        };
        let mut swept = 0;
        for (id, age) in expired {
            let cause = ScenarioError::Expired {
                id: id.clone(),
                age,
                timeout: self.timeout,
            };
            if self.close_inner(&id, true, Some(cause)).await.is_ok() {
                swept += 1;
            }
        }
        swept
    }

    /// Snapshot of one scenario, active or recently closed.
    pub async fn status(&self, id: &ScenarioId) -> Option<ScenarioSnapshot> {
        let inner = self.inner.lock().await;
        if let Some(scenario) = inner.active.get(id) {
            return Some(scenario.snapshot());
        }
        inner.closed.iter().rev().find(|s| &s.id == id).cloned()
    }

    /// Snapshots of all active scenarios, ordered by id.
    pub async fn active_scenarios(&self) -> Vec<ScenarioSnapshot> {
        let inner = self.inner.lock().await;
        let mut all: Vec<ScenarioSnapshot> = inner.active.values().map(Scenario::snapshot).collect();
        all.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Aggregate counters plus the current active count.
    pub async fn stats(&self) -> ManagerStats {
        let inner = self.inner.lock().await;
        let mut stats = inner.stats.clone();
        stats.active = inner.active.len();
        stats
    }

    /// Ids of all active scenarios, ordered.
    pub async fn open_ids(&self) -> Vec<ScenarioId> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<ScenarioId> = inner.active.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    // ---------------------------
    // Internals
    // ---------------------------

    /// Reports an illegal transition: force-closes the scenario and returns
    /// the `InvalidState` error for the caller.
    async fn fail_transition(
        &self,
        id: &ScenarioId,
        from: ScenarioState,
        op: &'static str,
    ) -> Result<(), ScenarioError> {
        let _ = self.close_inner(id, true, None).await;
        Err(ScenarioError::InvalidState {
            id: id.clone(),
            from,
            op,
        })
    }

    async fn close_inner(
        &self,
        id: &ScenarioId,
        force: bool,
        cause: Option<ScenarioError>,
    ) -> Result<(), ScenarioError> {
        let mut pending_events: Vec<Event> = Vec::new();
        let mut invalid: Option<ScenarioError> = None;

        let resources = {
            let mut inner = self.inner.lock().await;
            let Some(mut scenario) = inner.active.remove(id) else {
                // Unknown or already closed: idempotent no-op.
                return Ok(());
            };

            if scenario.state.is_open() {
                if !force {
                    // Caller bug; the scenario is still torn down.
                    invalid = Some(ScenarioError::InvalidState {
                        id: id.clone(),
                        from: scenario.state,
                        op: "close",
                    });
                }
                scenario.state = ScenarioState::Failed;
                scenario.error = Some(match &cause {
                    Some(err) => err.to_string(),
                    None => "closed before completion".to_string(),
                });
                inner.stats.total_failed += 1;
                let mut failed =
                    Event::now(EventKind::ScenarioFailed).with_scenario(id.as_str());
                if let Some(text) = &scenario.error {
                    failed = failed.with_error(text.as_str());
                }
                pending_events.push(failed);
            }

            if let Some(err @ ScenarioError::Expired { .. }) = &cause {
                inner.stats.total_expired += 1;
                pending_events.push(
                    Event::now(EventKind::ScenarioExpired)
                        .with_scenario(id.as_str())
                        .with_elapsed(scenario.age())
                        .with_error(err.to_string()),
                );
            }

            scenario.state = ScenarioState::Cleanup;
            let resources = std::mem::take(&mut scenario.resources);
            scenario.state = ScenarioState::Closed;

            inner.stats.total_closed += 1;
            let metrics = scenario.metrics;
            inner.stats.aggregate.merge(metrics);

            if self.closed_history > 0 {
                let snapshot = scenario.snapshot();
                inner.closed.push_back(snapshot);
                if inner.closed.len() > self.closed_history {
                    let keep = self.closed_history / 2;
                    while inner.closed.len() > keep {
                        inner.closed.pop_front();
                    }
                }
            }

            resources
        };

        for event in pending_events {
            self.bus.publish(event);
        }

        for (name, mut handle) in resources {
            self.release_one(id, &name, handle.as_mut());
        }

        self.bus
            .publish(Event::now(EventKind::ScenarioClosed).with_scenario(id.as_str()));

        match invalid {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Releases one resource, swallowing (but publishing) any failure.
    fn release_one(&self, id: &ScenarioId, name: &str, handle: &mut dyn ScenarioResource) {
        if let Err(err) = handle.release() {
            self.bus.publish(
                Event::now(EventKind::ResourceReleaseFailed)
                    .with_scenario(id.as_str())
                    .with_resource(name)
                    .with_error(err.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{ReleaseError, ResourceFn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn manager_with(limit: usize, timeout: Duration) -> ScenarioManager {
        let cfg = Config {
            max_concurrent_scenarios: limit,
            scenario_timeout: timeout,
            ..Config::default()
        };
        ScenarioManager::new(&cfg, Bus::new(64))
    }

    fn counting_resource(counter: &Arc<AtomicUsize>) -> Box<dyn ScenarioResource> {
        let counter = counter.clone();
        ResourceFn::boxed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn create_fails_at_capacity() {
        let manager = manager_with(3, Duration::from_secs(300));
        for _ in 0..3 {
            manager.create("elm").await.expect("under limit");
        }
        let err = manager.create("elm").await.unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::CapacityExceeded { active: 3, limit: 3 }
        ));
        assert!(err.is_recoverable());

        // Closing one frees a slot.
        let id = manager.open_ids().await.remove(0);
        manager.close(&id, true).await.unwrap();
        assert!(manager.create("elm").await.is_ok());
    }

    #[tokio::test]
    async fn full_lifecycle_updates_stats() {
        let manager = manager_with(10, Duration::from_secs(300));
        let id = manager.create("main-and-5th").await.unwrap();
        manager.start(&id).await.unwrap();
        manager
            .update_progress(
                &id,
                ScenarioMetrics {
                    vehicles_processed: 12,
                    predictions_made: 1,
                    light_changes: 1,
                },
            )
            .await
            .unwrap();
        manager.complete(&id, true, None).await.unwrap();
        manager.close(&id, false).await.unwrap();

        let stats = manager.stats().await;
        assert_eq!(stats.total_created, 1);
        assert_eq!(stats.total_completed, 1);
        assert_eq!(stats.total_failed, 0);
        assert_eq!(stats.total_closed, 1);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.aggregate.vehicles_processed, 12);
        assert_eq!(stats.aggregate.light_changes, 1);

        let snap = manager.status(&id).await.expect("in history");
        assert_eq!(snap.state, ScenarioState::Closed);
        assert!(snap.resources.is_empty());
    }

    #[tokio::test]
    async fn double_start_is_a_bug_and_closes_the_scenario() {
        let manager = manager_with(10, Duration::from_secs(300));
        let id = manager.create("elm").await.unwrap();
        manager.start(&id).await.unwrap();

        let err = manager.start(&id).await.unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::InvalidState {
                from: ScenarioState::Running,
                op: "start",
                ..
            }
        ));

        // The force-close ran: the scenario left the active set as failed.
        assert!(manager.open_ids().await.is_empty());
        let snap = manager.status(&id).await.expect("history");
        assert_eq!(snap.state, ScenarioState::Closed);
        assert!(snap.error.is_some());
        assert_eq!(manager.stats().await.total_failed, 1);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_releases_once() {
        let manager = manager_with(10, Duration::from_secs(300));
        let released = Arc::new(AtomicUsize::new(0));

        let id = manager.create("elm").await.unwrap();
        manager.start(&id).await.unwrap();
        manager
            .add_resource(&id, "phase_plan", counting_resource(&released))
            .await
            .unwrap();
        manager.complete(&id, true, None).await.unwrap();

        manager.close(&id, false).await.unwrap();
        manager.close(&id, false).await.unwrap();
        manager.close(&id, true).await.unwrap();

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(manager.stats().await.total_closed, 1);
    }

    #[tokio::test]
    async fn reattaching_a_name_releases_the_prior_handle() {
        let manager = manager_with(10, Duration::from_secs(300));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let id = manager.create("elm").await.unwrap();
        manager.start(&id).await.unwrap();
        manager
            .add_resource(&id, "frame", counting_resource(&first))
            .await
            .unwrap();
        manager
            .add_resource(&id, "frame", counting_resource(&second))
            .await
            .unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        manager.complete(&id, true, None).await.unwrap();
        manager.close(&id, false).await.unwrap();
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_failure_never_blocks_the_rest() {
        let manager = manager_with(10, Duration::from_secs(300));
        let survivor = Arc::new(AtomicUsize::new(0));

        let id = manager.create("elm").await.unwrap();
        manager.start(&id).await.unwrap();
        manager
            .add_resource(
                &id,
                "broken",
                ResourceFn::boxed(|| Err(ReleaseError::new("device gone"))),
            )
            .await
            .unwrap();
        manager
            .add_resource(&id, "survivor", counting_resource(&survivor))
            .await
            .unwrap();
        manager.complete(&id, true, None).await.unwrap();

        // A failing release is swallowed; close still succeeds.
        manager.close(&id, false).await.unwrap();
        assert_eq!(survivor.load(Ordering::SeqCst), 1);
        assert_eq!(
            manager.status(&id).await.unwrap().state,
            ScenarioState::Closed
        );
    }

    #[tokio::test]
    async fn forced_close_of_running_marks_failed() {
        let manager = manager_with(10, Duration::from_secs(300));
        let id = manager.create("elm").await.unwrap();
        manager.start(&id).await.unwrap();

        manager.close(&id, true).await.unwrap();

        let snap = manager.status(&id).await.unwrap();
        assert_eq!(snap.state, ScenarioState::Closed);
        assert!(snap.error.is_some());
        let stats = manager.stats().await;
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.total_closed, 1);
    }

    #[tokio::test]
    async fn non_forced_close_of_running_errors_but_still_closes() {
        let manager = manager_with(10, Duration::from_secs(300));
        let id = manager.create("elm").await.unwrap();
        manager.start(&id).await.unwrap();

        let err = manager.close(&id, false).await.unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::InvalidState { op: "close", .. }
        ));
        assert!(manager.open_ids().await.is_empty());
    }

    #[tokio::test]
    async fn operations_on_unknown_ids_are_caller_bugs() {
        let manager = manager_with(10, Duration::from_secs(300));
        let ghost = ScenarioId::from_raw("scn-ghost-00000000");

        assert!(matches!(
            manager.start(&ghost).await.unwrap_err(),
            ScenarioError::UnknownScenario { .. }
        ));
        assert!(matches!(
            manager.complete(&ghost, true, None).await.unwrap_err(),
            ScenarioError::UnknownScenario { .. }
        ));
        // Close of an unknown id is the idempotent no-op path.
        assert!(manager.close(&ghost, true).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_expires_only_old_scenarios() {
        let manager = manager_with(10, Duration::from_secs(300));
        let old = manager.create("elm").await.unwrap();
        manager.start(&old).await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        let young = manager.create("oak").await.unwrap();

        let swept = manager.sweep_expired().await;
        assert_eq!(swept, 1);

        let snap = manager.status(&old).await.unwrap();
        assert_eq!(snap.state, ScenarioState::Closed);
        assert!(snap.error.as_deref().unwrap().contains("expired"));

        assert_eq!(manager.open_ids().await, vec![young.clone()]);
        let stats = manager.stats().await;
        assert_eq!(stats.total_expired, 1);
        assert_eq!(stats.total_failed, 1);
    }

    #[tokio::test]
    async fn close_all_drains_the_active_set() {
        let manager = manager_with(10, Duration::from_secs(300));
        for name in ["a", "b", "c"] {
            let id = manager.create(name).await.unwrap();
            manager.start(&id).await.unwrap();
        }
        manager.close_all().await;
        assert!(manager.open_ids().await.is_empty());
        assert_eq!(manager.stats().await.total_closed, 3);
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let cfg = Config {
            max_concurrent_scenarios: 10,
            closed_history: 4,
            ..Config::default()
        };
        let manager = ScenarioManager::new(&cfg, Bus::new(64));

        let mut last = None;
        for _ in 0..6 {
            let id = manager.create("elm").await.unwrap();
            manager.close(&id, true).await.unwrap();
            last = Some(id);
        }

        // Trimmed to half the bound once exceeded; the newest entry stays.
        let last = last.unwrap();
        assert!(manager.status(&last).await.is_some());
        let inner = manager.inner.lock().await;
        assert!(inner.closed.len() <= 4);
    }
}
