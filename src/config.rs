//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for the signal runtime.
//!
//! Config is used in three ways:
//! 1. **Runtime creation**: `SignalRuntime::builder(config)`
//! 2. **Manager limits**: concurrency cap, scenario timeout, reaper cadence
//! 3. **Optimizer parameters**: [`Config::timing_params`] derives the
//!    constants the timing engine runs with
//!
//! Configuration is injected by the embedding application; greenwave does not
//! read files or environment variables.
//!
//! ## Sentinel values
//! - `bus_capacity` is clamped to a minimum of 1 by the bus.
//! - `closed_history = 0` → no closed-scenario history is kept.

use std::time::Duration;

use crate::optimizer::TimingParams;

/// Global configuration for the signal runtime.
///
/// Defines:
/// - **Timing bounds**: min/max green, fixed yellow, safety factors
/// - **Scenario lifecycle**: concurrency limit, timeout, reaper interval
/// - **Orchestration cadence**: tick interval, collaborator call bound
/// - **Shutdown behavior**: grace period for draining workers
/// - **Event system**: bus capacity for event delivery
#[derive(Clone, Debug)]
pub struct Config {
    /// Minimum green interval per phase group.
    pub min_green: Duration,

    /// Maximum green interval per phase group.
    pub max_green: Duration,

    /// Fixed yellow interval per phase group.
    pub yellow: Duration,

    /// Green-time multiplier applied to the phase group carrying an
    /// emergency vehicle (re-clamped to `[min_green, max_green]`).
    pub emergency_multiplier: f64,

    /// Safety factor for rain and fog.
    pub wet_factor: f64,

    /// Safety factor for snow.
    pub snow_factor: f64,

    /// Maximum number of scenarios that may be active at once.
    ///
    /// `create` fails with `CapacityExceeded` at the limit; the caller skips
    /// its tick rather than queueing.
    pub max_concurrent_scenarios: usize,

    /// Age at which a still-open scenario is force-closed by the reaper.
    pub scenario_timeout: Duration,

    /// Interval between reaper sweeps.
    pub reaper_interval: Duration,

    /// Interval between optimization cycles per intersection.
    pub tick_interval: Duration,

    /// Bound on each collaborator call (count fetch, plan apply). Exceeding
    /// it fails that cycle only.
    pub collaborator_timeout: Duration,

    /// Maximum time to wait for workers to drain after a shutdown signal.
    pub grace: Duration,

    /// Capacity of the event bus broadcast ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` events will
    /// observe `Lagged` and skip older items. Minimum value is 1.
    pub bus_capacity: usize,

    /// How many closed-scenario snapshots to retain for status queries.
    /// When the bound is hit the history is trimmed to half.
    pub closed_history: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Derives the optimizer constants from the timing fields.
    pub fn timing_params(&self) -> TimingParams {
        TimingParams {
            min_green: self.min_green.as_secs() as u32,
            max_green: self.max_green.as_secs() as u32,
            yellow: self.yellow.as_secs() as u32,
            emergency_multiplier: self.emergency_multiplier,
            wet_factor: self.wet_factor,
            snow_factor: self.snow_factor,
            ..TimingParams::default()
        }
    }

    /// Checks the invariants the runtime relies on.
    ///
    /// Called by the runtime builder; returns the first violated rule as a
    /// static description.
    pub fn check(&self) -> Result<(), &'static str> {
        if self.max_green < self.min_green {
            return Err("max_green must be >= min_green");
        }
        if self.emergency_multiplier < 1.0 {
            return Err("emergency_multiplier must be >= 1.0");
        }
        if self.wet_factor < 1.0 || self.snow_factor < 1.0 {
            return Err("weather factors must be >= 1.0");
        }
        if self.max_concurrent_scenarios == 0 {
            return Err("max_concurrent_scenarios must be > 0");
        }
        if self.scenario_timeout.is_zero() || self.reaper_interval.is_zero() {
            return Err("scenario_timeout and reaper_interval must be > 0");
        }
        Ok(())
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `min_green = 15s`, `max_green = 90s`, `yellow = 3s`
    /// - `emergency_multiplier = 2.0`, `wet_factor = 1.1`, `snow_factor = 1.2`
    /// - `max_concurrent_scenarios = 10`
    /// - `scenario_timeout = 300s`, `reaper_interval = 30s`
    /// - `tick_interval = 2s`, `collaborator_timeout = 2s`
    /// - `grace = 10s`, `bus_capacity = 1024`, `closed_history = 100`
    fn default() -> Self {
        Self {
            min_green: Duration::from_secs(15),
            max_green: Duration::from_secs(90),
            yellow: Duration::from_secs(3),
            emergency_multiplier: 2.0,
            wet_factor: 1.1,
            snow_factor: 1.2,
            max_concurrent_scenarios: 10,
            scenario_timeout: Duration::from_secs(300),
            reaper_interval: Duration::from_secs(30),
            tick_interval: Duration::from_secs(2),
            collaborator_timeout: Duration::from_secs(2),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            closed_history: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_check() {
        assert!(Config::default().check().is_ok());
    }

    #[test]
    fn inverted_green_bounds_rejected() {
        let cfg = Config {
            min_green: Duration::from_secs(90),
            max_green: Duration::from_secs(15),
            ..Config::default()
        };
        assert!(cfg.check().is_err());
    }

    #[test]
    fn timing_params_inherit_bounds() {
        let cfg = Config {
            min_green: Duration::from_secs(10),
            max_green: Duration::from_secs(60),
            ..Config::default()
        };
        let params = cfg.timing_params();
        assert_eq!(params.min_green, 10);
        assert_eq!(params.max_green, 60);
        assert_eq!(params.yellow, 3);
    }
}
