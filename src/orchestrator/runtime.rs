//! # SignalRuntime: wiring, worker fleet, and graceful shutdown.
//!
//! The runtime owns the event bus, the subscriber fan-out, the shared
//! [`ScenarioManager`], and the ambient weather channel. It spawns one
//! worker per intersection plus the reaper, then waits for either natural
//! completion or a shutdown trigger.
//!
//! ## Shutdown path
//! ```text
//! OS signal / cancelled token
//!        └─► Bus.publish(ShutdownRequested)
//!        └─► cancel worker + reaper tokens
//!        └─► await workers within Config::grace:
//!               ├─ Ok           → close remaining scenarios,
//!               │                 publish AllStoppedWithin
//!               └─ grace hit    → collect stuck scenario ids,
//!                                 force-close everything,
//!                                 publish GraceExceeded,
//!                                 return RuntimeError::GraceExceeded
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::optimizer::{TimingOptimizer, TimingParams, Weather};
use crate::orchestrator::collaborators::TelemetrySink;
use crate::orchestrator::shutdown;
use crate::orchestrator::worker::{IntersectionSpec, IntersectionWorker};
use crate::scenario::{spawn_reaper, ScenarioManager};
use crate::subscribers::{Subscribe, SubscriberSet, TelemetryRelay};

/// Builder for constructing a [`SignalRuntime`] with optional features.
pub struct RuntimeBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    timing: Option<TimingParams>,
}

impl RuntimeBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            telemetry: None,
            timing: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (scenario lifecycle, cycle
    /// outcomes, shutdown) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one event subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Registers the fire-and-forget telemetry sink.
    ///
    /// The sink is fed every finished cycle's record from its own relay
    /// worker; cycles never wait on it.
    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Overrides the optimizer constants (defaults derive from the config).
    pub fn with_timing_params(mut self, params: TimingParams) -> Self {
        self.timing = Some(params);
        self
    }

    /// Builds the runtime.
    ///
    /// Must be called within a tokio runtime: subscriber workers are
    /// spawned here.
    pub fn build(mut self) -> Result<SignalRuntime, RuntimeError> {
        if let Err(reason) = self.cfg.check() {
            return Err(RuntimeError::InvalidConfig { reason });
        }

        if let Some(sink) = self.telemetry.take() {
            self.subscribers.push(Arc::new(TelemetryRelay::new(sink)));
        }

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers));
        let manager = Arc::new(ScenarioManager::new(&self.cfg, bus.clone()));
        let optimizer =
            TimingOptimizer::new(self.timing.unwrap_or_else(|| self.cfg.timing_params()));
        let (weather_tx, _weather_rx) = watch::channel(Weather::Normal);

        Ok(SignalRuntime {
            cfg: self.cfg,
            bus,
            subs,
            manager,
            optimizer,
            weather: weather_tx,
        })
    }
}

/// Coordinates intersection workers, event delivery, and graceful shutdown.
pub struct SignalRuntime {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    manager: Arc<ScenarioManager>,
    optimizer: TimingOptimizer,
    weather: watch::Sender<Weather>,
}

impl SignalRuntime {
    /// Starts a builder.
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    /// Handle to the shared scenario manager (status queries, statistics).
    pub fn manager(&self) -> Arc<ScenarioManager> {
        Arc::clone(&self.manager)
    }

    /// A clone of the event bus (e.g. for ad-hoc subscriptions).
    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    /// Updates the ambient weather; workers pick it up on their next tick.
    pub fn set_weather(&self, weather: Weather) {
        let _ = self.weather.send_replace(weather);
    }

    /// Runs the given intersections until an OS termination signal arrives.
    ///
    /// Equivalent to [`SignalRuntime::run_with_token`] with a token cancelled
    /// by SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere). Call once per runtime.
    pub async fn run(&self, intersections: Vec<IntersectionSpec>) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        let signal_token = token.clone();
        tokio::spawn(async move {
            if shutdown::wait_for_shutdown_signal().await.is_ok() {
                signal_token.cancel();
            }
        });
        self.run_with_token(intersections, token).await
    }

    /// Runs the given intersections until `token` is cancelled.
    ///
    /// Returns after draining workers and closing every remaining scenario;
    /// exceeding the grace period yields [`RuntimeError::GraceExceeded`].
    pub async fn run_with_token(
        &self,
        intersections: Vec<IntersectionSpec>,
        token: CancellationToken,
    ) -> Result<(), RuntimeError> {
        self.subscriber_listener();
        let reaper = spawn_reaper(
            Arc::clone(&self.manager),
            self.cfg.reaper_interval,
            token.child_token(),
        );

        let mut set = JoinSet::new();
        for spec in intersections {
            let worker = IntersectionWorker::new(
                spec,
                Arc::clone(&self.manager),
                self.optimizer,
                self.bus.clone(),
                self.cfg.tick_interval,
                self.cfg.collaborator_timeout,
                self.weather.subscribe(),
            );
            set.spawn(worker.run(token.child_token()));
        }

        let drained = tokio::select! {
            _ = token.cancelled() => {
                self.bus.publish(Event::now(EventKind::ShutdownRequested));
                self.drain(&mut set).await
            }
            _ = async { while set.join_next().await.is_some() {} } => {
                token.cancel();
                Ok(())
            }
        };

        let _ = reaper.await;

        match drained {
            Ok(()) => {
                self.manager.close_all().await;
                self.bus.publish(Event::now(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget).
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                set.emit(&ev);
            }
        });
    }

    /// Waits for all workers to finish within the configured grace period.
    async fn drain(&self, set: &mut JoinSet<()>) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        let done = async { while set.join_next().await.is_some() {} };

        match tokio::time::timeout(grace, done).await {
            Ok(_) => Ok(()),
            Err(_) => {
                let stuck = self.manager.open_ids().await;
                self.manager.close_all().await;
                self.bus.publish(Event::now(EventKind::GraceExceeded));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::optimizer::{PhasePlan, VehicleCounts};
    use crate::orchestrator::collaborators::{
        CycleRecord, LightControlSink, VehicleCountProvider,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

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

    #[derive(Default)]
    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl LightControlSink for CountingSink {
        async fn apply(
            &self,
            _intersection_id: &str,
            _plan: &PhasePlan,
        ) -> Result<(), CollaboratorError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingTelemetry(Mutex<Vec<CycleRecord>>);

    #[async_trait]
    impl TelemetrySink for RecordingTelemetry {
        async fn record(&self, record: CycleRecord) {
            self.0.lock().unwrap().push(record);
        }
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_at_build() {
        let cfg = Config {
            max_concurrent_scenarios: 0,
            ..Config::default()
        };
        let err = match SignalRuntime::builder(cfg).build() {
            Err(err) => err,
            Ok(_) => panic!("expected the config to be rejected"),
        };
        assert_eq!(err.as_label(), "runtime_invalid_config");
    }

    #[tokio::test]
    async fn empty_intersection_set_finishes_on_its_own() {
        let runtime = SignalRuntime::builder(Config::default()).build().unwrap();
        let token = CancellationToken::new();
        runtime
            .run_with_token(Vec::new(), token)
            .await
            .expect("natural completion");
    }

    #[tokio::test(start_paused = true)]
    async fn two_intersections_cycle_independently() {
        let lights_a = Arc::new(CountingSink::default());
        let lights_b = Arc::new(CountingSink::default());
        let telemetry = Arc::new(RecordingTelemetry::default());

        let runtime = Arc::new(
            SignalRuntime::builder(Config::default())
                .with_telemetry(telemetry.clone())
                .build()
                .unwrap(),
        );

        let specs = vec![
            IntersectionSpec::new(
                "elm",
                Arc::new(SimProvider(VehicleCounts::from_totals(4, 3, 5, 4))),
                lights_a.clone(),
            ),
            IntersectionSpec::new(
                "oak",
                Arc::new(SimProvider(VehicleCounts::from_totals(9, 7, 1, 2))),
                lights_b.clone(),
            ),
        ];

        let token = CancellationToken::new();
        let rt = Arc::clone(&runtime);
        let stop = token.clone();
        let driver =
            tokio::spawn(async move { rt.run_with_token(specs, stop).await });

        tokio::time::sleep(Duration::from_secs(7)).await;
        token.cancel();
        driver.await.unwrap().expect("clean shutdown");

        // Let the listener and relay workers drain their queues.
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }

        let stats = runtime.manager().stats().await;
        // Both intersections ticked several times and everything closed.
        assert!(stats.total_completed >= 6);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.total_closed, stats.total_created);
        assert!(lights_a.0.load(Ordering::SeqCst) >= 3);
        assert!(lights_b.0.load(Ordering::SeqCst) >= 3);

        // The relay delivered records for both intersections.
        let records = telemetry.0.lock().unwrap();
        assert!(records.iter().any(|r| r.intersection == "elm"));
        assert!(records.iter().any(|r| r.intersection == "oak"));
    }

    #[tokio::test(start_paused = true)]
    async fn weather_changes_reach_workers() {
        let lights = Arc::new(CountingSink::default());
        let telemetry = Arc::new(RecordingTelemetry::default());
        let runtime = Arc::new(
            SignalRuntime::builder(Config::default())
                .with_telemetry(telemetry.clone())
                .build()
                .unwrap(),
        );
        runtime.set_weather(Weather::Snow);

        let specs = vec![IntersectionSpec::new(
            "elm",
            Arc::new(SimProvider(VehicleCounts::from_totals(6, 5, 5, 6))),
            lights,
        )];

        let token = CancellationToken::new();
        let rt = Arc::clone(&runtime);
        let stop = token.clone();
        let driver =
            tokio::spawn(async move { rt.run_with_token(specs, stop).await });

        tokio::time::sleep(Duration::from_secs(3)).await;
        token.cancel();
        driver.await.unwrap().unwrap();

        for _ in 0..32 {
            tokio::task::yield_now().await;
        }

        let records = telemetry.0.lock().unwrap();
        assert!(!records.is_empty());
        assert!(records[0].result.reasoning.contains("Snow"));
    }
}
