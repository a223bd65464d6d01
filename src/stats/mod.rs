pub mod format;
pub mod performance;

use serde::{Deserialize, Serialize};

use crate::api::{ComparisonLap, Lap};

pub use format::{PLACEHOLDER_LAP_TIME, PLACEHOLDER_SECONDS, format_date, format_lap_time, format_seconds};
pub use performance::{
    DriverPerformance, LapSummary, PerformanceSort, TeamSummary, driver_performance, filter_laps,
    team_summaries,
};

/// One of the three timed sub-segments of a lap
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    One,
    Two,
    Three,
}

impl Sector {
    pub const ALL: [Sector; 3] = [Sector::One, Sector::Two, Sector::Three];
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sector::One => write!(f, "S1"),
            Sector::Two => write!(f, "S2"),
            Sector::Three => write!(f, "S3"),
        }
    }
}

/// Anything carrying a lap time and sector times.
///
/// Session laps and comparison laps come from different endpoints with
/// different shapes; both feed the same statistics through this trait.
pub trait TimedLap {
    fn lap_number(&self) -> u32;
    fn lap_duration(&self) -> Option<f64>;
    fn sector_time(&self, sector: Sector) -> Option<f64>;
}

impl TimedLap for Lap {
    fn lap_number(&self) -> u32 {
        self.lap_number
    }

    fn lap_duration(&self) -> Option<f64> {
        self.lap_duration
    }

    fn sector_time(&self, sector: Sector) -> Option<f64> {
        match sector {
            Sector::One => self.sector_1_time,
            Sector::Two => self.sector_2_time,
            Sector::Three => self.sector_3_time,
        }
    }
}

impl TimedLap for ComparisonLap {
    fn lap_number(&self) -> u32 {
        self.lap_number
    }

    fn lap_duration(&self) -> Option<f64> {
        self.lap_duration
    }

    fn sector_time(&self, sector: Sector) -> Option<f64> {
        match sector {
            Sector::One => self.sector_1_time,
            Sector::Two => self.sector_2_time,
            Sector::Three => self.sector_3_time,
        }
    }
}

impl<T: TimedLap + ?Sized> TimedLap for &T {
    fn lap_number(&self) -> u32 {
        (**self).lap_number()
    }

    fn lap_duration(&self) -> Option<f64> {
        (**self).lap_duration()
    }

    fn sector_time(&self, sector: Sector) -> Option<f64> {
        (**self).sector_time(sector)
    }
}

/// A duration counts only when present, finite and strictly positive.
pub fn valid_duration(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.)
}

pub fn is_valid_lap<L: TimedLap>(lap: &L) -> bool {
    valid_duration(lap.lap_duration()).is_some()
}

fn valid_durations<L: TimedLap>(laps: &[L]) -> Vec<f64> {
    laps.iter()
        .filter_map(|lap| valid_duration(lap.lap_duration()))
        .collect()
}

fn minimum(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

fn maximum(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn mean(values: &[f64]) -> Option<f64> {
    let (min, max) = (minimum(values)?, maximum(values)?);
    if min == max {
        return Some(min);
    }
    let sum: f64 = values.iter().sum();
    // the true mean always lies within [min, max]; clamping absorbs rounding
    Some((sum / values.len() as f64).clamp(min, max))
}

fn population_std_dev(values: &[f64]) -> Option<f64> {
    let (min, max) = (minimum(values)?, maximum(values)?);
    if min == max {
        return Some(0.);
    }
    let average = mean(values)?;
    let variance = values
        .iter()
        .map(|value| (value - average).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    Some(variance.sqrt())
}

/// Minimum valid lap duration.
pub fn fastest_lap<L: TimedLap>(laps: &[L]) -> Option<f64> {
    minimum(&valid_durations(laps))
}

/// Arithmetic mean of valid lap durations.
pub fn average_lap<L: TimedLap>(laps: &[L]) -> Option<f64> {
    mean(&valid_durations(laps))
}

/// Population standard deviation (divide by N) of valid lap durations.
/// Lower is more consistent.
pub fn consistency<L: TimedLap>(laps: &[L]) -> Option<f64> {
    population_std_dev(&valid_durations(laps))
}

/// Best time in one sector. A lap without a valid value for this sector is
/// skipped for this sector only.
pub fn sector_best<L: TimedLap>(laps: &[L], sector: Sector) -> Option<f64> {
    laps.iter()
        .filter_map(|lap| valid_duration(lap.sector_time(sector)))
        .reduce(f64::min)
}

/// Aggregates derived from a lap collection. Every statistic is `None` when
/// the collection holds no valid lap.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedStats {
    pub fastest_lap: Option<f64>,
    pub average_lap: Option<f64>,
    pub consistency: Option<f64>,
    pub valid_laps: usize,
}

impl DerivedStats {
    pub fn from_laps<L: TimedLap>(laps: &[L]) -> Self {
        let durations = valid_durations(laps);
        Self {
            fastest_lap: minimum(&durations),
            average_lap: mean(&durations),
            consistency: population_std_dev(&durations),
            valid_laps: durations.len(),
        }
    }

    /// Stats over the laps of one driver only.
    pub fn for_driver(laps: &[Lap], driver: crate::api::DriverNumber) -> Self {
        let driver_laps: Vec<&Lap> = laps
            .iter()
            .filter(|lap| lap.driver_number == driver)
            .collect();
        Self::from_laps(&driver_laps)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct SectorBests {
    pub sector_1: Option<f64>,
    pub sector_2: Option<f64>,
    pub sector_3: Option<f64>,
}

impl SectorBests {
    pub fn from_laps<L: TimedLap>(laps: &[L]) -> Self {
        Self {
            sector_1: sector_best(laps, Sector::One),
            sector_2: sector_best(laps, Sector::Two),
            sector_3: sector_best(laps, Sector::Three),
        }
    }

    pub fn get(&self, sector: Sector) -> Option<f64> {
        match sector {
            Sector::One => self.sector_1,
            Sector::Two => self.sector_2,
            Sector::Three => self.sector_3,
        }
    }
}
