//! # Validated vehicle counts per intersection approach.
//!
//! Detection collaborators report loosely shaped results; everything is
//! normalized into one explicit structure here and validated before any
//! timing math runs. An inconsistent class breakdown is rejected with
//! [`OptimizeError::ClassBreakdownMismatch`] instead of being probed around
//! at runtime.

use std::collections::BTreeMap;

use crate::error::OptimizeError;

/// One intersection approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All four approaches in fixed order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// The phase group this approach belongs to.
    pub fn group(self) -> PhaseGroup {
        match self {
            Direction::North | Direction::South => PhaseGroup::NorthSouth,
            Direction::East | Direction::West => PhaseGroup::EastWest,
        }
    }
}

/// Set of directions sharing a simultaneous green interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseGroup {
    NorthSouth,
    EastWest,
}

impl PhaseGroup {
    /// The crossing group.
    pub fn opposite(self) -> PhaseGroup {
        match self {
            PhaseGroup::NorthSouth => PhaseGroup::EastWest,
            PhaseGroup::EastWest => PhaseGroup::NorthSouth,
        }
    }
}

/// Vehicle classes the detection stage distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VehicleClass {
    Car,
    Truck,
    Bus,
    Motorcycle,
    Bicycle,
}

/// Counts observed on a single approach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApproachCount {
    /// Total vehicles queued/approaching on this approach.
    pub total: u32,
    /// Optional per-class breakdown; empty means the detector reported no
    /// breakdown. A non-empty breakdown must sum to `total`.
    pub by_class: BTreeMap<VehicleClass, u32>,
    /// Whether an emergency vehicle was detected on this approach.
    pub emergency: bool,
}

impl ApproachCount {
    /// Plain count with no breakdown and no emergency flag.
    pub fn plain(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Marks this approach as carrying an emergency vehicle.
    pub fn with_emergency(mut self) -> Self {
        self.emergency = true;
        self
    }

    /// Sets one class count.
    pub fn with_class(mut self, class: VehicleClass, count: u32) -> Self {
        self.by_class.insert(class, count);
        self
    }

    fn class_sum(&self) -> u32 {
        self.by_class.values().copied().sum()
    }
}

/// Validated counts for all four approaches of one intersection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleCounts {
    pub north: ApproachCount,
    pub south: ApproachCount,
    pub east: ApproachCount,
    pub west: ApproachCount,
}

impl VehicleCounts {
    /// Builds counts from four plain totals (tests, simulators).
    pub fn from_totals(north: u32, south: u32, east: u32, west: u32) -> Self {
        Self {
            north: ApproachCount::plain(north),
            south: ApproachCount::plain(south),
            east: ApproachCount::plain(east),
            west: ApproachCount::plain(west),
        }
    }

    /// Returns the approach for one direction.
    pub fn get(&self, direction: Direction) -> &ApproachCount {
        match direction {
            Direction::North => &self.north,
            Direction::South => &self.south,
            Direction::East => &self.east,
            Direction::West => &self.west,
        }
    }

    /// Combined demand of one phase group.
    pub fn group_total(&self, group: PhaseGroup) -> u32 {
        match group {
            PhaseGroup::NorthSouth => self.north.total + self.south.total,
            PhaseGroup::EastWest => self.east.total + self.west.total,
        }
    }

    /// Demand across the whole intersection.
    pub fn total(&self) -> u32 {
        self.group_total(PhaseGroup::NorthSouth) + self.group_total(PhaseGroup::EastWest)
    }

    /// True if any approach reported an emergency vehicle.
    pub fn any_emergency(&self) -> bool {
        Direction::ALL.iter().any(|d| self.get(*d).emergency)
    }

    /// The phase group carrying an emergency vehicle, if any.
    ///
    /// North-South wins when both groups are flagged.
    pub fn emergency_group(&self) -> Option<PhaseGroup> {
        if self.north.emergency || self.south.emergency {
            Some(PhaseGroup::NorthSouth)
        } else if self.east.emergency || self.west.emergency {
            Some(PhaseGroup::EastWest)
        } else {
            None
        }
    }

    /// Validates every approach: a non-empty class breakdown must sum to the
    /// direction total.
    pub fn validate(&self) -> Result<(), OptimizeError> {
        for direction in Direction::ALL {
            let approach = self.get(direction);
            if approach.by_class.is_empty() {
                continue;
            }
            let class_sum = approach.class_sum();
            if class_sum != approach.total {
                return Err(OptimizeError::ClassBreakdownMismatch {
                    direction,
                    total: approach.total,
                    class_sum,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_totals_sum_approaches() {
        let counts = VehicleCounts::from_totals(3, 2, 12, 8);
        assert_eq!(counts.group_total(PhaseGroup::NorthSouth), 5);
        assert_eq!(counts.group_total(PhaseGroup::EastWest), 20);
        assert_eq!(counts.total(), 25);
    }

    #[test]
    fn consistent_breakdown_passes() {
        let mut counts = VehicleCounts::from_totals(5, 0, 0, 0);
        counts.north = ApproachCount::plain(5)
            .with_class(VehicleClass::Car, 3)
            .with_class(VehicleClass::Truck, 2);
        assert!(counts.validate().is_ok());
    }

    #[test]
    fn inconsistent_breakdown_rejected() {
        let mut counts = VehicleCounts::from_totals(0, 0, 4, 0);
        counts.east = ApproachCount::plain(4).with_class(VehicleClass::Bus, 1);
        let err = counts.validate().unwrap_err();
        assert_eq!(
            err,
            OptimizeError::ClassBreakdownMismatch {
                direction: Direction::East,
                total: 4,
                class_sum: 1,
            }
        );
    }

    #[test]
    fn empty_breakdown_is_not_a_mismatch() {
        assert!(VehicleCounts::from_totals(7, 0, 0, 0).validate().is_ok());
    }

    #[test]
    fn north_south_wins_ambiguous_emergency() {
        let mut counts = VehicleCounts::from_totals(1, 1, 1, 1);
        counts.south = ApproachCount::plain(1).with_emergency();
        counts.west = ApproachCount::plain(1).with_emergency();
        assert_eq!(counts.emergency_group(), Some(PhaseGroup::NorthSouth));
    }
}
