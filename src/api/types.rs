// Data structures returned by the timing API

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::ids::{DriverNumber, MeetingKey, RecordId, SessionKey};

/// Deserialize `null` the same way as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse an API timestamp. Offsets are honoured when present, naive
/// timestamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// A race weekend or test event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Meeting {
    #[serde(rename = "_id")]
    pub key: MeetingKey,
    #[serde(default, deserialize_with = "nullable")]
    pub meeting_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub circuit_short_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub location: String,
    #[serde(default, deserialize_with = "nullable")]
    pub country_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub country_code: String,
    pub year: i32,
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(default)]
    pub circuit_key: Option<u64>,
}

impl Meeting {
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.date_start.as_deref().and_then(parse_timestamp)
    }
}

/// A timed activity (practice, qualifying, sprint, race) within a meeting
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
    #[serde(rename = "_id")]
    pub key: SessionKey,
    pub meeting_key: MeetingKey,
    #[serde(default, deserialize_with = "nullable")]
    pub session_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub session_type: String,
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(default)]
    pub date_end: Option<String>,
}

impl Session {
    /// Whether this is the main race of its meeting
    pub fn is_race(&self) -> bool {
        self.session_name.to_lowercase() == "race"
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.date_start.as_deref().and_then(parse_timestamp)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.date_end.as_deref().and_then(parse_timestamp)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Driver {
    #[serde(rename = "_id", alias = "driver_number")]
    pub number: DriverNumber,
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub first_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub last_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name_acronym: String,
    #[serde(default, deserialize_with = "nullable")]
    pub team_name: String,
    /// Team colour as a hex string without the leading `#`
    #[serde(default, deserialize_with = "nullable")]
    pub team_colour: String,
    #[serde(default, deserialize_with = "nullable")]
    pub headshot_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub country_code: String,
}

impl Driver {
    /// A driver known only by number, with every descriptive field empty
    pub fn with_number(number: DriverNumber) -> Self {
        Self {
            number,
            full_name: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            name_acronym: String::new(),
            team_name: String::new(),
            team_colour: String::new(),
            headshot_url: String::new(),
            country_code: String::new(),
        }
    }

    /// Full name, falling back to the acronym and then the number
    pub fn display_name(&self) -> String {
        if !self.full_name.is_empty() {
            self.full_name.clone()
        } else if !self.name_acronym.is_empty() {
            self.name_acronym.clone()
        } else {
            format!("#{}", self.number)
        }
    }
}

/// One timed circuit by one driver within one session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Lap {
    #[serde(rename = "_id", default)]
    pub record_id: Option<RecordId>,
    pub session_key: SessionKey,
    pub driver_number: DriverNumber,
    #[serde(default, deserialize_with = "nullable")]
    pub lap_number: u32,
    /// Lap time in seconds. Missing or non-positive values mark an invalid lap
    #[serde(default)]
    pub lap_duration: Option<f64>,
    #[serde(default)]
    pub sector_1_time: Option<f64>,
    #[serde(default)]
    pub sector_2_time: Option<f64>,
    #[serde(default)]
    pub sector_3_time: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub is_pit_out_lap: bool,
    #[serde(default)]
    pub tyre_compound: Option<String>,
    #[serde(default)]
    pub stint: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub team_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub team_color: String,
}

/// Lap as returned by the batched comparison endpoint
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ComparisonLap {
    #[serde(default, deserialize_with = "nullable")]
    pub lap_number: u32,
    #[serde(default)]
    pub lap_duration: Option<f64>,
    #[serde(default)]
    pub sector_1_time: Option<f64>,
    #[serde(default)]
    pub sector_2_time: Option<f64>,
    #[serde(default)]
    pub sector_3_time: Option<f64>,
    #[serde(default)]
    pub tyre_compound: Option<String>,
}

/// One entry of the batched comparison request body
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    pub id: String,
    pub driver_number: DriverNumber,
    pub session_key: SessionKey,
}

/// Laps returned for one comparison column, matched by `column_id`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ComparisonColumnData {
    #[serde(rename = "columnId")]
    pub column_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub laps: Vec<ComparisonLap>,
}

/// Classified finishing position within a session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Position {
    #[serde(default)]
    pub position: Option<u32>,
    pub driver_number: DriverNumber,
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub team_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub team_color: String,
    #[serde(default, deserialize_with = "nullable")]
    pub laps_completed: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub headshot_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub dnf: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MeetingDetails {
    #[serde(rename = "meeting_details", alias = "meeting")]
    pub meeting: Meeting,
    #[serde(default, deserialize_with = "nullable")]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub winner: Option<Position>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionDetails {
    pub session: Session,
    #[serde(default)]
    pub meeting: Option<Meeting>,
    #[serde(default, deserialize_with = "nullable")]
    pub positions: Vec<Position>,
    #[serde(default, deserialize_with = "nullable")]
    pub fastest_laps: Vec<Lap>,
}

/// Season-level aggregates, keyed by year
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct SeasonStats {
    pub year: i32,
    #[serde(default, deserialize_with = "nullable")]
    pub total_sessions: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub total_drivers: u32,
}

/// Career counters for a single driver
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DriverStats {
    pub driver_number: DriverNumber,
    #[serde(default, deserialize_with = "nullable")]
    pub grand_prix_victories: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub championships_won: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeasonChampionRecord {
    #[serde(rename = "_id")]
    pub driver_number: DriverNumber,
    #[serde(default, deserialize_with = "nullable")]
    pub total_points: f64,
    pub driver_info: Driver,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MostWinsRecord {
    #[serde(rename = "_id")]
    pub driver_number: DriverNumber,
    #[serde(default, deserialize_with = "nullable")]
    pub wins: u32,
    pub driver_info: Driver,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FastestLapRecord {
    #[serde(rename = "_id", default)]
    pub record_id: Option<RecordId>,
    pub lap_duration: f64,
    pub driver_info: Driver,
    pub meeting_info: Meeting,
}

/// Season records: champion, most wins and fastest lap
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecordsResponse {
    pub year: i32,
    #[serde(default)]
    pub season_champion: Option<SeasonChampionRecord>,
    #[serde(default)]
    pub most_wins: Option<MostWinsRecord>,
    #[serde(default)]
    pub fastest_lap: Option<FastestLapRecord>,
}

/// Payload of the connectivity probe
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiStatusResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub status: String,
}

impl ApiStatusResponse {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
