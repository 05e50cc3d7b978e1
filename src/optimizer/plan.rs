//! # Timing plans produced by the optimizer.
//!
//! A [`PhasePlan`] fixes the green interval of both phase groups; yellow is a
//! constant 3 seconds per group and the cycle contains nothing else (no
//! all-red clearance interval).

use crate::optimizer::PhaseGroup;

/// Timing for one phase group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTiming {
    /// Green interval in seconds.
    pub green_secs: u32,
    /// Yellow interval in seconds (fixed).
    pub yellow_secs: u32,
}

impl PhaseTiming {
    /// Total time this group holds the intersection.
    pub fn total_secs(self) -> u32 {
        self.green_secs + self.yellow_secs
    }
}

/// Complete signal plan for one intersection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePlan {
    /// North-South timing.
    pub ns: PhaseTiming,
    /// East-West timing.
    pub ew: PhaseTiming,
}

impl PhasePlan {
    /// Timing of one group.
    pub fn group(&self, group: PhaseGroup) -> PhaseTiming {
        match group {
            PhaseGroup::NorthSouth => self.ns,
            PhaseGroup::EastWest => self.ew,
        }
    }

    /// Full cycle length: both greens plus both yellows.
    pub fn cycle_secs(&self) -> u32 {
        self.ns.total_secs() + self.ew.total_secs()
    }
}

/// Outcome of one optimization call.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// The produced plan.
    pub plan: PhasePlan,
    /// Bounded efficiency score in `[0.95, 1.0]`.
    pub efficiency_score: f64,
    /// Prediction confidence in `[0, 1]`.
    pub confidence: f64,
    /// Human-readable account of the inputs and which rules fired.
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_is_greens_plus_fixed_yellows() {
        let plan = PhasePlan {
            ns: PhaseTiming {
                green_secs: 42,
                yellow_secs: 3,
            },
            ew: PhaseTiming {
                green_secs: 21,
                yellow_secs: 3,
            },
        };
        assert_eq!(plan.cycle_secs(), 42 + 21 + 6);
        assert_eq!(plan.group(PhaseGroup::NorthSouth).green_secs, 42);
        assert_eq!(plan.group(PhaseGroup::EastWest).green_secs, 21);
    }
}
