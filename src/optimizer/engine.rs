//! # Timing engine: demand-proportional green allocation.
//!
//! [`TimingOptimizer`] maps validated [`VehicleCounts`] plus a
//! [`TimingContext`] to an [`OptimizationResult`]. It is pure: no I/O, no
//! shared state, freely callable from any number of workers without locking.
//!
//! ## Allocation pipeline
//! ```text
//! counts ──► validate ──► demand split (NS vs EW)
//!                              │
//!                              ▼
//!              blend with historical ratio (90/10)
//!                              │
//!                              ▼
//!         green budget = 30 + min(total, 80) × 2.5   (clamped to [30, 170])
//!                              │
//!                              ▼
//!        per-group green = clamp(ratio × budget, 15, 90)
//!        (remainder split 60/40 when both clamps bind)
//!                              │
//!                              ▼
//!            emergency override ──► weather factor
//!                              │
//!                              ▼
//!            efficiency score ∈ [0.95, 1.0] + reasoning
//! ```
//!
//! ## Rules
//! - Every produced green interval lies in `[min_green, max_green]`.
//! - Cycle length is always `NS.green + EW.green + 2 × yellow`.
//! - Zero demand yields the minimum plan and the baseline score.
//! - The efficiency floor (0.95) always wins over a lower computed score.

use crate::error::OptimizeError;
use crate::optimizer::{
    OptimizationResult, PhaseGroup, PhasePlan, PhaseTiming, TimingContext, VehicleCounts,
};

/// Guaranteed lower bound of the efficiency score.
const EFFICIENCY_FLOOR: f64 = 0.95;

/// Tunable constants of the timing engine.
///
/// Deployments may adjust any of these; the engine re-clamps every produced
/// green interval to `[min_green, max_green]` either way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingParams {
    /// Minimum green per phase group (seconds).
    pub min_green: u32,
    /// Maximum green per phase group (seconds).
    pub max_green: u32,
    /// Fixed yellow per phase group (seconds).
    pub yellow: u32,
    /// Multiplier applied to the emergency group's green.
    pub emergency_multiplier: f64,
    /// Safety factor for rain and fog.
    pub wet_factor: f64,
    /// Safety factor for snow.
    pub snow_factor: f64,
    /// Intercept of the green budget (seconds at zero demand).
    pub budget_base: f64,
    /// Budget seconds granted per queued vehicle.
    pub budget_slope: f64,
    /// Demand beyond this no longer grows the budget.
    pub budget_demand_cap: u32,
    /// Hard cap of the green budget (seconds).
    pub budget_cap: f64,
    /// Weight of the observed demand ratio when blending with the
    /// historical baseline.
    pub actual_weight: f64,
    /// Vehicles one green second can serve (per phase group).
    pub processing_rate: f64,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            min_green: 15,
            max_green: 90,
            yellow: 3,
            emergency_multiplier: 2.0,
            wet_factor: 1.1,
            snow_factor: 1.2,
            budget_base: 30.0,
            budget_slope: 2.5,
            budget_demand_cap: 80,
            budget_cap: 170.0,
            actual_weight: 0.9,
            processing_rate: 2.5,
        }
    }
}

/// Stateless timing optimizer.
///
/// Holds only immutable [`TimingParams`]; `optimize` never blocks and never
/// mutates, so one instance can be shared by reference across all workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingOptimizer {
    params: TimingParams,
}

impl TimingOptimizer {
    /// Creates an optimizer with explicit parameters.
    pub fn new(params: TimingParams) -> Self {
        Self { params }
    }

    /// The parameters this optimizer runs with.
    pub fn params(&self) -> &TimingParams {
        &self.params
    }

    /// Produces a timing plan for one intersection snapshot.
    ///
    /// Fails only on invalid input (inconsistent class breakdown, historical
    /// ratio outside `[0, 1]`); every valid input yields a plan honoring the
    /// green bounds and the score bounds.
    pub fn optimize(
        &self,
        counts: &VehicleCounts,
        ctx: &TimingContext,
    ) -> Result<OptimizationResult, OptimizeError> {
        counts.validate()?;
        ctx.validate()?;

        let p = &self.params;
        let ns_demand = counts.group_total(PhaseGroup::NorthSouth);
        let ew_demand = counts.group_total(PhaseGroup::EastWest);
        let total = ns_demand + ew_demand;

        if total == 0 {
            return Ok(self.minimum_plan(counts));
        }

        let mut notes = vec![format!(
            "demand N={} S={} E={} W={} (NS={ns_demand} EW={ew_demand}, total {total})",
            counts.north.total, counts.south.total, counts.east.total, counts.west.total,
        )];

        // Blend observed demand with the time-of-day baseline.
        let actual_ratio_ns = f64::from(ns_demand) / f64::from(total);
        let ratio_ns = actual_ratio_ns * p.actual_weight
            + ctx.historical_ratio_ns * (1.0 - p.actual_weight);
        notes.push(format!(
            "NS share {ratio_ns:.2} (observed {actual_ratio_ns:.2}, baseline {:.2})",
            ctx.historical_ratio_ns
        ));

        // Demand-scaled green budget.
        let effective = total.min(p.budget_demand_cap);
        let budget = (p.budget_base + f64::from(effective) * p.budget_slope)
            .clamp(p.budget_base, p.budget_cap);
        notes.push(format!("green budget {budget:.0}s"));

        let (mut ns_green, mut ew_green) =
            self.allocate(ratio_ns, budget, ns_demand, ew_demand, &mut notes);

        // Emergency override: double the flagged group, hand the rest of the
        // budget to the crossing group.
        let emergency_group = counts.emergency_group().or_else(|| {
            ctx.emergency_present.then(|| {
                if ns_demand >= ew_demand {
                    PhaseGroup::NorthSouth
                } else {
                    PhaseGroup::EastWest
                }
            })
        });
        if let Some(group) = emergency_group {
            let (target, other) = match group {
                PhaseGroup::NorthSouth => (&mut ns_green, &mut ew_green),
                PhaseGroup::EastWest => (&mut ew_green, &mut ns_green),
            };
            *target = self.clamp_green(f64::from(*target) * p.emergency_multiplier);
            *other = self.clamp_green(budget - f64::from(*target));
            notes.push(format!("emergency priority for {group:?}"));
        }

        // Weather slows everyone down; longer greens compensate.
        let weather_factor = ctx.weather.factor(p.wet_factor, p.snow_factor);
        if weather_factor > 1.0 {
            ns_green = self.clamp_green(f64::from(ns_green) * weather_factor);
            ew_green = self.clamp_green(f64::from(ew_green) * weather_factor);
            notes.push(format!(
                "{:?} weather factor {weather_factor:.1}",
                ctx.weather
            ));
        }

        let plan = PhasePlan {
            ns: PhaseTiming {
                green_secs: ns_green,
                yellow_secs: p.yellow,
            },
            ew: PhaseTiming {
                green_secs: ew_green,
                yellow_secs: p.yellow,
            },
        };

        let efficiency_score = self.efficiency(ns_demand, ew_demand, &plan, &mut notes);

        Ok(OptimizationResult {
            plan,
            efficiency_score,
            confidence: self.confidence(total),
            reasoning: notes.join("; "),
        })
    }

    /// Plan for an empty intersection: hold both groups at minimum green.
    fn minimum_plan(&self, counts: &VehicleCounts) -> OptimizationResult {
        let p = &self.params;
        let timing = PhaseTiming {
            green_secs: p.min_green,
            yellow_secs: p.yellow,
        };
        let plan = PhasePlan {
            ns: timing,
            ew: timing,
        };
        let mut reasoning = format!(
            "no demand detected; holding minimum green {}s per group (cycle {}s)",
            p.min_green,
            plan.cycle_secs()
        );
        if counts.any_emergency() {
            reasoning.push_str("; emergency flag ignored at zero demand");
        }
        OptimizationResult {
            plan,
            efficiency_score: EFFICIENCY_FLOOR,
            confidence: 0.5,
            reasoning,
        }
    }

    /// Proportional split of the budget, clamped per group.
    ///
    /// When both clamps bind (heavy group capped, light group lifted to the
    /// floor) the unallocated remainder is split 60/40 in favor of the
    /// heavier group and re-clamped. When only the cap binds, the lighter
    /// group keeps its proportional share and the remainder shortens the
    /// cycle instead.
    fn allocate(
        &self,
        ratio_ns: f64,
        budget: f64,
        ns_demand: u32,
        ew_demand: u32,
        notes: &mut Vec<String>,
    ) -> (u32, u32) {
        let p = &self.params;
        let ns_raw = ratio_ns * budget;
        let ew_raw = budget - ns_raw;

        let mut ns_green = self.clamp_green(ns_raw);
        let mut ew_green = self.clamp_green(ew_raw);
        if f64::from(ns_green) != ns_raw.round() || f64::from(ew_green) != ew_raw.round() {
            notes.push(format!(
                "clamped to [{}, {}]s",
                p.min_green, p.max_green
            ));
        }

        let (heavy_raw, light_raw) = if ns_demand >= ew_demand {
            (ns_raw, ew_raw)
        } else {
            (ew_raw, ns_raw)
        };
        let both_bound =
            heavy_raw > f64::from(p.max_green) && light_raw < f64::from(p.min_green);
        let leftover = budget - f64::from(ns_green + ew_green);
        if both_bound && leftover > 0.0 {
            let (heavy, light) = if ns_demand >= ew_demand {
                (&mut ns_green, &mut ew_green)
            } else {
                (&mut ew_green, &mut ns_green)
            };
            *heavy = self.clamp_green(f64::from(*heavy) + 0.6 * leftover);
            *light = self.clamp_green(f64::from(*light) + 0.4 * leftover);
            notes.push(format!("redistributed {leftover:.0}s remainder 60/40"));
        }

        (ns_green, ew_green)
    }

    /// Bounded efficiency score.
    ///
    /// Base is the served share of demand (each green second serves
    /// `processing_rate` vehicles), plus bonuses for a demand-matched split,
    /// a comfortable cycle length, and high volume. Capped at 1.0, floored
    /// at 0.95.
    fn efficiency(
        &self,
        ns_demand: u32,
        ew_demand: u32,
        plan: &PhasePlan,
        notes: &mut Vec<String>,
    ) -> f64 {
        let p = &self.params;
        let total = f64::from(ns_demand + ew_demand);

        let served = f64::from(ns_demand).min(f64::from(plan.ns.green_secs) * p.processing_rate)
            + f64::from(ew_demand).min(f64::from(plan.ew.green_secs) * p.processing_rate);
        let mut score = (served / total).min(1.0);

        let green_total = f64::from(plan.ns.green_secs + plan.ew.green_secs);
        let alloc_share_ns = f64::from(plan.ns.green_secs) / green_total;
        let demand_share_ns = f64::from(ns_demand) / total;
        if (alloc_share_ns - demand_share_ns).abs() <= 0.05 {
            score += 0.10;
            notes.push("allocation matches demand within 5%".to_string());
        }

        let cycle = plan.cycle_secs();
        if (60..=120).contains(&cycle) {
            score += 0.05;
        }

        score += (total / 50.0 * 0.10).min(0.10);

        score.min(1.0).max(EFFICIENCY_FLOOR)
    }

    /// Prediction confidence: grows with observed volume, capped at 0.95.
    fn confidence(&self, total: u32) -> f64 {
        if total == 0 {
            return 0.5;
        }
        let demand_factor = (f64::from(total) / 10.0).min(1.0);
        (0.7 + demand_factor * 0.2 + 0.1).min(0.95)
    }

    #[inline]
    fn clamp_green(&self, secs: f64) -> u32 {
        secs.round()
            .clamp(f64::from(self.params.min_green), f64::from(self.params.max_green))
            as u32
    }
}
