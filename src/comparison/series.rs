use std::{collections::HashMap, str::FromStr};

use itertools::Itertools;

use super::{ColumnResult, ComparisonColumn};
use crate::{
    PaddockError,
    api::ComparisonLap,
    stats::{Sector, TimedLap, valid_duration},
};

/// Which value of a lap to plot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LapMetric {
    #[default]
    LapTime,
    Sector(Sector),
}

impl LapMetric {
    pub fn value<L: TimedLap>(&self, lap: &L) -> Option<f64> {
        let raw = match self {
            LapMetric::LapTime => lap.lap_duration(),
            LapMetric::Sector(sector) => lap.sector_time(*sector),
        };
        valid_duration(raw)
    }
}

impl FromStr for LapMetric {
    type Err = PaddockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lap_time" | "lap" => Ok(LapMetric::LapTime),
            "sector_1" | "s1" => Ok(LapMetric::Sector(Sector::One)),
            "sector_2" | "s2" => Ok(LapMetric::Sector(Sector::Two)),
            "sector_3" | "s3" => Ok(LapMetric::Sector(Sector::Three)),
            _ => Err(PaddockError::InvalidUserInput {
                field: "metric".to_string(),
                reason: format!("'{}' is not one of lap_time, sector_1, sector_2, sector_3", s),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SeriesLine {
    pub column_id: String,
    pub label: String,
    /// Team colour as a hex string, empty when unknown
    pub colour: String,
    /// One entry per label; `None` where the lap is missing or has no valid value
    pub values: Vec<Option<f64>>,
}

/// Lap-by-lap chart data for a comparison
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LapSeries {
    /// Distinct lap numbers present in any column, ascending
    pub labels: Vec<u32>,
    pub lines: Vec<SeriesLine>,
}

impl LapSeries {
    pub(super) fn build(
        results: &[ColumnResult],
        columns: &[ComparisonColumn],
        metric: LapMetric,
    ) -> Self {
        let labels: Vec<u32> = results
            .iter()
            .flat_map(|result| result.laps.iter().map(|lap| lap.lap_number))
            .sorted()
            .dedup()
            .collect();

        let lines = results
            .iter()
            .map(|result| {
                let column = columns.iter().find(|column| column.id == result.column_id);
                let driver = column.and_then(|column| column.driver.as_ref());
                let name = driver
                    .map(|driver| driver.full_name.clone())
                    .unwrap_or_else(|| format!("#{}", result.driver_number));
                let label = match column.and_then(|column| column.year) {
                    Some(year) => format!("{} ({})", name, year),
                    None => name,
                };
                let by_number: HashMap<u32, &ComparisonLap> = result
                    .laps
                    .iter()
                    .map(|lap| (lap.lap_number, lap))
                    .collect();

                SeriesLine {
                    column_id: result.column_id.clone(),
                    label,
                    colour: driver.map(|d| d.team_colour.clone()).unwrap_or_default(),
                    values: labels
                        .iter()
                        .map(|number| by_number.get(number).and_then(|lap| metric.value(*lap)))
                        .collect(),
                }
            })
            .collect();

        Self { labels, lines }
    }
}
