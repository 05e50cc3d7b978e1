//! # Reaper — background expiry sweeps.
//!
//! One reaper task per runtime scans the manager's active set on a fixed
//! interval and force-closes any scenario older than the configured timeout.
//! This is the mechanism that upholds the liveness invariant: every created
//! scenario reaches `Closed`, even when its worker is wedged or gone.
//!
//! ## Rules
//! - The sweep itself is the manager's job ([`ScenarioManager::sweep_expired`]);
//!   the reaper only provides the cadence.
//! - Cancellation is checked between ticks; a sweep in progress finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::scenario::ScenarioManager;

/// Spawns the reaper loop; returns its join handle.
pub(crate) fn spawn_reaper(
    manager: Arc<ScenarioManager>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; skip it so a
        // freshly started runtime does not sweep before anything can age.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    manager.sweep_expired().await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::Bus;
    use crate::scenario::ScenarioState;

    #[tokio::test(start_paused = true)]
    async fn reaper_closes_abandoned_scenarios() {
        let cfg = Config {
            scenario_timeout: Duration::from_secs(300),
            reaper_interval: Duration::from_secs(30),
            ..Config::default()
        };
        let manager = Arc::new(ScenarioManager::new(&cfg, Bus::new(64)));
        let token = CancellationToken::new();
        let handle = spawn_reaper(manager.clone(), cfg.reaper_interval, token.clone());

        // A scenario nobody ever completes or closes.
        let id = manager.create("elm").await.unwrap();
        manager.start(&id).await.unwrap();

        // Paused-clock auto-advance drives the interval past the timeout.
        tokio::time::sleep(Duration::from_secs(331)).await;

        let snap = manager.status(&id).await.expect("kept in history");
        assert_eq!(snap.state, ScenarioState::Closed);
        assert!(manager.open_ids().await.is_empty());
        assert_eq!(manager.stats().await.total_expired, 1);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_leaves_fresh_scenarios_alone() {
        let cfg = Config {
            scenario_timeout: Duration::from_secs(300),
            reaper_interval: Duration::from_secs(30),
            ..Config::default()
        };
        let manager = Arc::new(ScenarioManager::new(&cfg, Bus::new(64)));
        let token = CancellationToken::new();
        let handle = spawn_reaper(manager.clone(), cfg.reaper_interval, token.clone());

        let id = manager.create("elm").await.unwrap();
        tokio::time::sleep(Duration::from_secs(90)).await;

        assert_eq!(manager.open_ids().await, vec![id]);
        assert_eq!(manager.stats().await.total_expired, 0);

        token.cancel();
        handle.await.unwrap();
    }
}
