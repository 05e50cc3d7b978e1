//! # IntersectionWorker: the per-intersection cycle loop.
//!
//! One worker per intersection, all sharing a single [`ScenarioManager`].
//! Each tick drives one scenario through its whole lifecycle:
//!
//! ```text
//! tick ──► create ──► start ──► fetch counts (bounded)
//!                                    │
//!                                    ▼
//!                     build context ──► optimize
//!                                    │
//!                                    ▼
//!                 attach plan resource + update progress
//!                                    │
//!                                    ▼
//!                     apply plan (bounded) ──► complete(success) ──► close
//!
//! any failure ──► complete(failure) ──► close(force) ──► next tick
//! capacity pushback ──► CycleSkipped event ──► next tick
//! ```
//!
//! ## Rules
//! - Suspension points are the two collaborator calls, each under the
//!   configured bound; exceeding it fails that cycle only.
//! - One intersection's failure never blocks or corrupts another's: workers
//!   share nothing but the manager, whose calls are serialized internally.
//! - Cancellation is checked at the tick boundary; an in-flight cycle
//!   finishes (it is bounded by the collaborator timeouts).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{CollaboratorError, CycleError};
use crate::events::{Bus, Event, EventKind};
use crate::optimizer::{DayPattern, TimingContext, TimingOptimizer, Weather};
use crate::orchestrator::collaborators::{CycleRecord, LightControlSink, VehicleCountProvider};
use crate::scenario::{ResourceFn, ScenarioId, ScenarioManager, ScenarioMetrics};

/// The unit of work handed to [`SignalRuntime::run`](crate::SignalRuntime::run):
/// one intersection plus its collaborators.
pub struct IntersectionSpec {
    /// Stable intersection identifier (used in scenario ids and events).
    pub intersection_id: String,
    /// Source of vehicle counts for this intersection.
    pub provider: Arc<dyn VehicleCountProvider>,
    /// Light hardware for this intersection.
    pub lights: Arc<dyn LightControlSink>,
}

impl IntersectionSpec {
    /// Bundles an intersection with its collaborators.
    pub fn new(
        intersection_id: impl Into<String>,
        provider: Arc<dyn VehicleCountProvider>,
        lights: Arc<dyn LightControlSink>,
    ) -> Self {
        Self {
            intersection_id: intersection_id.into(),
            provider,
            lights,
        }
    }
}

/// Drives one intersection's optimization cycles.
pub(crate) struct IntersectionWorker {
    spec: IntersectionSpec,
    manager: Arc<ScenarioManager>,
    optimizer: TimingOptimizer,
    bus: Bus,
    tick: Duration,
    call_timeout: Duration,
    weather: watch::Receiver<Weather>,
}

impl IntersectionWorker {
    pub(crate) fn new(
        spec: IntersectionSpec,
        manager: Arc<ScenarioManager>,
        optimizer: TimingOptimizer,
        bus: Bus,
        tick: Duration,
        call_timeout: Duration,
        weather: watch::Receiver<Weather>,
    ) -> Self {
        Self {
            spec,
            manager,
            optimizer,
            bus,
            tick,
            call_timeout,
            weather,
        }
    }

    /// Runs the tick loop until cancellation.
    pub(crate) async fn run(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.run_cycle().await {
                Ok(()) => {}
                Err(err) if err.is_skippable() => {
                    self.bus.publish(
                        Event::now(EventKind::CycleSkipped)
                            .with_intersection(self.spec.intersection_id.as_str())
                            .with_error(err.to_string()),
                    );
                }
                // Already recorded on the failed scenario; the loop proceeds
                // to the next tick regardless.
                Err(_) => {}
            }
        }
    }

    /// One full scenario lifecycle.
    async fn run_cycle(&self) -> Result<(), CycleError> {
        let id = self.manager.create(&self.spec.intersection_id).await?;
        self.manager.start(&id).await?;

        match self.drive(&id).await {
            Ok(record) => {
                self.manager.complete(&id, true, None).await?;
                self.manager.close(&id, false).await?;
                self.bus.publish(
                    Event::now(EventKind::CycleCompleted)
                        .with_scenario(id.as_str())
                        .with_intersection(self.spec.intersection_id.as_str())
                        .with_record(record),
                );
                Ok(())
            }
            Err(err) => {
                let _ = self
                    .manager
                    .complete(&id, false, Some(err.to_string()))
                    .await;
                let _ = self.manager.close(&id, true).await;
                Err(err)
            }
        }
    }

    /// Fetch → optimize → attach → apply, all attributed to one scenario.
    async fn drive(&self, id: &ScenarioId) -> Result<CycleRecord, CycleError> {
        let counts = self
            .bounded(
                "fetch_counts",
                self.spec.provider.fetch_counts(&self.spec.intersection_id),
            )
            .await?;

        let ctx = TimingContext {
            emergency_present: counts.any_emergency(),
            weather: *self.weather.borrow(),
            historical_ratio_ns: DayPattern::current().ratio_ns(),
        };

        let result = self.optimizer.optimize(&counts, &ctx)?;

        // The plan is owned by the scenario until cleanup releases it.
        let owned = result.clone();
        self.manager
            .add_resource(
                id,
                "phase_plan",
                ResourceFn::boxed(move || {
                    drop(owned);
                    Ok(())
                }),
            )
            .await?;

        let mut metrics = ScenarioMetrics {
            vehicles_processed: u64::from(counts.total()),
            predictions_made: 1,
            light_changes: 0,
        };
        self.manager.update_progress(id, metrics).await?;

        self.bounded(
            "apply_plan",
            self.spec.lights.apply(&self.spec.intersection_id, &result.plan),
        )
        .await?;
        self.bus.publish(
            Event::now(EventKind::PlanApplied)
                .with_scenario(id.as_str())
                .with_intersection(self.spec.intersection_id.as_str()),
        );

        let applied = ScenarioMetrics {
            light_changes: 1,
            ..ScenarioMetrics::default()
        };
        self.manager.update_progress(id, applied).await?;
        metrics.merge(applied);

        Ok(CycleRecord {
            scenario: id.to_string(),
            intersection: self.spec.intersection_id.clone(),
            result,
            metrics,
        })
    }

    /// Runs one collaborator call under the configured bound.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, CollaboratorError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_elapsed) => Err(CollaboratorError::Timeout {
                operation,
                timeout: self.call_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::optimizer::{PhasePlan, VehicleCounts};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct SimProvider(VehicleCounts);

    #[async_trait]
    impl VehicleCountProvider for SimProvider {
        async fn fetch_counts(
            &self,
            _intersection_id: &str,
        ) -> Result<VehicleCounts, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    struct DeadProvider;

    #[async_trait]
    impl VehicleCountProvider for DeadProvider {
        async fn fetch_counts(
            &self,
            _intersection_id: &str,
        ) -> Result<VehicleCounts, CollaboratorError> {
            Err(CollaboratorError::failed("fetch_counts", "camera offline"))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl VehicleCountProvider for SlowProvider {
        async fn fetch_counts(
            &self,
            _intersection_id: &str,
        ) -> Result<VehicleCounts, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(VehicleCounts::default())
        }
    }

    #[derive(Default)]
    struct CaptureSink(Mutex<Vec<PhasePlan>>);

    #[async_trait]
    impl LightControlSink for CaptureSink {
        async fn apply(
            &self,
            _intersection_id: &str,
            plan: &PhasePlan,
        ) -> Result<(), CollaboratorError> {
            self.0.lock().unwrap().push(*plan);
            Ok(())
        }
    }

    fn worker_with(
        provider: Arc<dyn VehicleCountProvider>,
        lights: Arc<dyn LightControlSink>,
        manager: Arc<ScenarioManager>,
        bus: Bus,
    ) -> IntersectionWorker {
        let (_tx, rx) = watch::channel(Weather::Normal);
        IntersectionWorker::new(
            IntersectionSpec::new("main-and-5th", provider, lights),
            manager,
            TimingOptimizer::default(),
            bus,
            Duration::from_secs(2),
            Duration::from_millis(200),
            rx,
        )
    }

    fn manager_with(limit: usize) -> Arc<ScenarioManager> {
        let cfg = Config {
            max_concurrent_scenarios: limit,
            ..Config::default()
        };
        Arc::new(ScenarioManager::new(&cfg, Bus::new(64)))
    }

    #[tokio::test]
    async fn happy_cycle_completes_and_closes() {
        let manager = manager_with(10);
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let sink = Arc::new(CaptureSink::default());
        let worker = worker_with(
            Arc::new(SimProvider(VehicleCounts::from_totals(4, 3, 5, 4))),
            sink.clone(),
            manager.clone(),
            bus,
        );

        worker.run_cycle().await.expect("cycle succeeds");

        let stats = manager.stats().await;
        assert_eq!(stats.total_created, 1);
        assert_eq!(stats.total_completed, 1);
        assert_eq!(stats.total_failed, 0);
        assert_eq!(stats.total_closed, 1);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.aggregate.vehicles_processed, 16);
        assert_eq!(stats.aggregate.predictions_made, 1);
        assert_eq!(stats.aggregate.light_changes, 1);

        let plans = sink.0.lock().unwrap();
        assert_eq!(plans.len(), 1);
        assert!(plans[0].cycle_secs() >= 36);

        // The completed cycle is announced with its record attached.
        let mut saw_record = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::CycleCompleted {
                let record = ev.record.expect("record attached");
                assert_eq!(record.intersection, "main-and-5th");
                assert_eq!(record.metrics.light_changes, 1);
                saw_record = true;
            }
        }
        assert!(saw_record);
    }

    #[tokio::test]
    async fn dead_provider_fails_the_scenario_only() {
        let manager = manager_with(10);
        let worker = worker_with(
            Arc::new(DeadProvider),
            Arc::new(CaptureSink::default()),
            manager.clone(),
            Bus::new(64),
        );

        let err = worker.run_cycle().await.unwrap_err();
        assert!(!err.is_skippable());

        let stats = manager.stats().await;
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.total_closed, 1);
        assert_eq!(stats.active, 0);

        // The failure text is recorded on the scenario.
        let history = manager.active_scenarios().await;
        assert!(history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_hits_the_call_bound() {
        let manager = manager_with(10);
        let worker = worker_with(
            Arc::new(SlowProvider),
            Arc::new(CaptureSink::default()),
            manager.clone(),
            Bus::new(64),
        );

        let err = worker.run_cycle().await.unwrap_err();
        assert_eq!(err.as_label(), "collaborator_timeout");
        assert_eq!(manager.stats().await.total_failed, 1);
    }

    #[tokio::test]
    async fn capacity_pushback_is_skippable() {
        let manager = manager_with(1);
        // Occupy the only slot.
        manager.create("other").await.unwrap();

        let worker = worker_with(
            Arc::new(SimProvider(VehicleCounts::default())),
            Arc::new(CaptureSink::default()),
            manager.clone(),
            Bus::new(64),
        );

        let err = worker.run_cycle().await.unwrap_err();
        assert!(err.is_skippable());

        // Nothing was created or failed for this intersection.
        let stats = manager.stats().await;
        assert_eq!(stats.total_created, 1);
        assert_eq!(stats.total_failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_worker_stops_ticking() {
        let manager = manager_with(10);
        let worker = worker_with(
            Arc::new(SimProvider(VehicleCounts::default())),
            Arc::new(CaptureSink::default()),
            manager.clone(),
            Bus::new(64),
        );

        let token = CancellationToken::new();
        let handle = tokio::spawn(worker.run(token.clone()));

        tokio::time::sleep(Duration::from_secs(7)).await;
        token.cancel();
        handle.await.unwrap();

        // ~4 ticks at 2s within 7s of paused time (first tick is immediate).
        let stats = manager.stats().await;
        assert!(stats.total_completed >= 3);
        assert_eq!(stats.active, 0);
    }
}
