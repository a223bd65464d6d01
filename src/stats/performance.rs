// Per-driver and per-team breakdowns of a session's laps

use std::{cmp::Ordering, fmt, str::FromStr};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{DerivedStats, SectorBests, is_valid_lap};
use crate::{
    PaddockError,
    api::{Driver, DriverNumber, Lap},
};

/// Ordering applied to a [`DriverPerformance`] table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceSort {
    #[default]
    Fastest,
    Average,
    Consistency,
    Laps,
}

impl FromStr for PerformanceSort {
    type Err = PaddockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fastest" => Ok(PerformanceSort::Fastest),
            "average" => Ok(PerformanceSort::Average),
            "consistency" => Ok(PerformanceSort::Consistency),
            "laps" => Ok(PerformanceSort::Laps),
            _ => Err(PaddockError::InvalidUserInput {
                field: "sort".to_string(),
                reason: format!(
                    "'{}' is not one of fastest, average, consistency, laps",
                    s
                ),
            }),
        }
    }
}

impl fmt::Display for PerformanceSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PerformanceSort::Fastest => "fastest",
            PerformanceSort::Average => "average",
            PerformanceSort::Consistency => "consistency",
            PerformanceSort::Laps => "laps",
        };
        write!(f, "{}", name)
    }
}

/// What one driver did in one session.
#[derive(Clone, Debug, PartialEq)]
pub struct DriverPerformance {
    pub driver: Driver,
    pub stats: DerivedStats,
    /// The lap that set `stats.fastest_lap`
    pub fastest_lap: Option<Lap>,
    /// Number of pit-out laps, valid or not
    pub pit_stops: usize,
    /// Sector bests over valid laps only
    pub sector_bests: SectorBests,
}

impl DriverPerformance {
    pub fn from_session(driver: &Driver, laps: &[Lap]) -> Self {
        let driver_laps: Vec<&Lap> = laps
            .iter()
            .filter(|lap| lap.driver_number == driver.number)
            .collect();
        let valid_laps: Vec<&Lap> = driver_laps
            .iter()
            .copied()
            .filter(|lap| is_valid_lap(lap))
            .collect();

        let fastest_lap = valid_laps
            .iter()
            .min_by(|a, b| compare_durations(a.lap_duration, b.lap_duration))
            .map(|lap| (*lap).clone());

        Self {
            driver: driver.clone(),
            stats: DerivedStats::from_laps(&valid_laps),
            fastest_lap,
            pit_stops: driver_laps.iter().filter(|lap| lap.is_pit_out_lap).count(),
            sector_bests: SectorBests::from_laps(&valid_laps),
        }
    }

    pub fn valid_laps(&self) -> usize {
        self.stats.valid_laps
    }
}

/// Case-insensitive match on driver name, team or acronym. An empty query
/// matches everyone.
pub fn driver_matches(driver: &Driver, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    [&driver.full_name, &driver.team_name, &driver.name_acronym]
        .iter()
        .any(|field| field.to_lowercase().contains(&query))
}

/// Build the performance table of a session.
pub fn driver_performance(
    drivers: &[Driver],
    laps: &[Lap],
    sort: PerformanceSort,
    search: Option<&str>,
) -> Vec<DriverPerformance> {
    let mut table: Vec<DriverPerformance> = drivers
        .iter()
        .filter(|driver| search.is_none_or(|query| driver_matches(driver, query)))
        .map(|driver| DriverPerformance::from_session(driver, laps))
        .collect();

    let by_laps = |a: &DriverPerformance, b: &DriverPerformance| b.valid_laps().cmp(&a.valid_laps());
    match sort {
        PerformanceSort::Fastest => table.sort_by(|a, b| {
            compare_durations(a.stats.fastest_lap, b.stats.fastest_lap).then_with(|| by_laps(a, b))
        }),
        PerformanceSort::Average => {
            table.sort_by(|a, b| compare_durations(a.stats.average_lap, b.stats.average_lap))
        }
        PerformanceSort::Consistency => {
            table.sort_by(|a, b| compare_durations(a.stats.consistency, b.stats.consistency))
        }
        PerformanceSort::Laps => table.sort_by(by_laps),
    }
    table
}

/// Ascending, with missing values last.
fn compare_durations(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TeamSummary {
    pub team_name: String,
    pub team_colour: String,
    pub drivers: Vec<DriverNumber>,
    pub total_laps: usize,
    /// Driver and time of the team's fastest lap
    pub best_lap: Option<(DriverNumber, f64)>,
    /// Mean of the drivers' consistency values, over drivers that have one
    pub average_consistency: Option<f64>,
}

/// Group a performance table by team, fastest team first.
pub fn team_summaries(table: &[DriverPerformance]) -> Vec<TeamSummary> {
    let mut teams: Vec<TeamSummary> = table
        .iter()
        .map(|row| row.driver.team_name.as_str())
        .unique()
        .map(|team_name| {
            let rows: Vec<&DriverPerformance> = table
                .iter()
                .filter(|row| row.driver.team_name == team_name)
                .collect();
            let best_lap = rows
                .iter()
                .filter_map(|row| row.stats.fastest_lap.map(|time| (row.driver.number, time)))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let consistencies: Vec<f64> =
                rows.iter().filter_map(|row| row.stats.consistency).collect();

            TeamSummary {
                team_name: team_name.to_string(),
                team_colour: rows
                    .first()
                    .map(|row| row.driver.team_colour.clone())
                    .unwrap_or_default(),
                drivers: rows.iter().map(|row| row.driver.number).collect(),
                total_laps: rows.iter().map(|row| row.valid_laps()).sum(),
                best_lap,
                average_consistency: (!consistencies.is_empty())
                    .then(|| consistencies.iter().sum::<f64>() / consistencies.len() as f64),
            }
        })
        .collect();

    teams.sort_by(|a, b| {
        compare_durations(a.best_lap.map(|l| l.1), b.best_lap.map(|l| l.1))
            .then_with(|| b.total_laps.cmp(&a.total_laps))
    });
    teams
}

/// Valid laps of a session, optionally restricted to one driver, fastest
/// first.
pub fn filter_laps(laps: &[Lap], driver: Option<DriverNumber>) -> Vec<&Lap> {
    laps.iter()
        .filter(|lap| is_valid_lap(*lap))
        .filter(|lap| driver.is_none_or(|number| lap.driver_number == number))
        .sorted_by(|a, b| compare_durations(a.lap_duration, b.lap_duration))
        .collect()
}

/// Headline numbers shown above a lap listing
#[derive(Clone, Debug, PartialEq)]
pub struct LapSummary {
    pub fastest_lap: Option<Lap>,
    pub average_lap: Option<f64>,
    pub total_laps: usize,
    pub pit_out_laps: usize,
}

impl LapSummary {
    /// Summarize the output of [`filter_laps`]. `None` when there are no laps.
    pub fn from_filtered(laps: &[&Lap]) -> Option<Self> {
        let fastest = laps.first()?;
        Some(Self {
            fastest_lap: Some((*fastest).clone()),
            average_lap: DerivedStats::from_laps(laps).average_lap,
            total_laps: laps.len(),
            pit_out_laps: laps.iter().filter(|lap| lap.is_pit_out_lap).count(),
        })
    }
}
