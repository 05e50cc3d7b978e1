//! # Timing context: everything about the moment that is not a count.
//!
//! [`TimingContext`] carries the weather condition, an intersection-agnostic
//! emergency flag, and the historical North-South demand ratio for the
//! current time of day. [`DayPattern`] derives that ratio from the local
//! clock; the mapping itself is a pure function of hour and weekday so it
//! can be tested without one.

use chrono::{Datelike, Local, Timelike};

use crate::error::OptimizeError;

/// Weather condition affecting safe signal timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weather {
    #[default]
    Normal,
    Rain,
    Fog,
    Snow,
}

impl Weather {
    /// Green-time safety factor for this condition.
    ///
    /// `wet` applies to rain and fog, `snow` to snow; normal conditions are
    /// unscaled.
    pub fn factor(self, wet: f64, snow: f64) -> f64 {
        match self {
            Weather::Normal => 1.0,
            Weather::Rain | Weather::Fog => wet,
            Weather::Snow => snow,
        }
    }
}

/// Recurring demand pattern derived from time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPattern {
    MorningRush,
    EveningRush,
    Night,
    Weekend,
    Midday,
}

impl DayPattern {
    /// Pattern for a given local hour and weekend flag.
    pub fn classify(hour: u32, weekend: bool) -> Self {
        if weekend {
            DayPattern::Weekend
        } else if (7..=9).contains(&hour) {
            DayPattern::MorningRush
        } else if (17..=19).contains(&hour) {
            DayPattern::EveningRush
        } else if hour >= 22 || hour <= 6 {
            DayPattern::Night
        } else {
            DayPattern::Midday
        }
    }

    /// Pattern for the current local time.
    pub fn current() -> Self {
        let now = Local::now();
        let weekend = now.weekday().number_from_monday() >= 6;
        Self::classify(now.hour(), weekend)
    }

    /// Baseline share of demand expected on the North-South axis.
    pub fn ratio_ns(self) -> f64 {
        match self {
            DayPattern::MorningRush => 0.7,
            DayPattern::EveningRush => 0.3,
            DayPattern::Night => 0.4,
            DayPattern::Weekend => 0.45,
            DayPattern::Midday => 0.5,
        }
    }
}

/// Context for one optimization call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingContext {
    /// An emergency vehicle is present somewhere at the intersection.
    ///
    /// Redundant when the counts carry per-direction flags; used as the
    /// fallback signal when they do not.
    pub emergency_present: bool,
    /// Current weather condition.
    pub weather: Weather,
    /// Baseline North-South demand share in `[0, 1]` from the time-of-day
    /// pattern.
    pub historical_ratio_ns: f64,
}

impl TimingContext {
    /// Plain context: no emergency, normal weather, explicit baseline ratio.
    pub fn normal(historical_ratio_ns: f64) -> Self {
        Self {
            emergency_present: false,
            weather: Weather::Normal,
            historical_ratio_ns,
        }
    }

    /// Context seeded from the current local time's demand pattern.
    pub fn for_now(weather: Weather) -> Self {
        Self {
            emergency_present: false,
            weather,
            historical_ratio_ns: DayPattern::current().ratio_ns(),
        }
    }

    /// Marks an emergency as present.
    pub fn with_emergency(mut self) -> Self {
        self.emergency_present = true;
        self
    }

    /// Validates the baseline ratio.
    pub fn validate(&self) -> Result<(), OptimizeError> {
        let r = self.historical_ratio_ns;
        if !r.is_finite() || !(0.0..=1.0).contains(&r) {
            return Err(OptimizeError::RatioOutOfRange { value: r });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_hours_map_to_patterns() {
        assert_eq!(DayPattern::classify(8, false), DayPattern::MorningRush);
        assert_eq!(DayPattern::classify(18, false), DayPattern::EveningRush);
        assert_eq!(DayPattern::classify(23, false), DayPattern::Night);
        assert_eq!(DayPattern::classify(3, false), DayPattern::Night);
        assert_eq!(DayPattern::classify(13, false), DayPattern::Midday);
    }

    #[test]
    fn weekend_overrides_hour() {
        assert_eq!(DayPattern::classify(8, true), DayPattern::Weekend);
    }

    #[test]
    fn ratios_stay_in_unit_interval() {
        for pattern in [
            DayPattern::MorningRush,
            DayPattern::EveningRush,
            DayPattern::Night,
            DayPattern::Weekend,
            DayPattern::Midday,
        ] {
            let r = pattern.ratio_ns();
            assert!((0.0..=1.0).contains(&r));
        }
    }

    #[test]
    fn out_of_range_ratio_rejected() {
        assert!(TimingContext::normal(1.2).validate().is_err());
        assert!(TimingContext::normal(f64::NAN).validate().is_err());
        assert!(TimingContext::normal(0.0).validate().is_ok());
        assert!(TimingContext::normal(1.0).validate().is_ok());
    }

    #[test]
    fn weather_factors() {
        assert_eq!(Weather::Normal.factor(1.1, 1.2), 1.0);
        assert_eq!(Weather::Rain.factor(1.1, 1.2), 1.1);
        assert_eq!(Weather::Fog.factor(1.1, 1.2), 1.1);
        assert_eq!(Weather::Snow.factor(1.1, 1.2), 1.2);
    }
}
