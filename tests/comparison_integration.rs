// Integration tests for the comparison builder

use std::sync::Arc;

use paddock::api::{
    ComparisonLap, Driver, DriverNumber, GateKey, MockRequest, MockResourceClient, SessionKey,
};
use paddock::stats::Sector;
use paddock::{ComparisonBuilder, LapMetric};
use serde_json::json;

fn driver(number: u64, name: &str, colour: &str) -> Driver {
    serde_json::from_value(json!({
        "driver_number": number,
        "full_name": name,
        "team_colour": colour
    }))
    .unwrap()
}

fn lap(number: u32, duration: f64, sectors: [f64; 3]) -> ComparisonLap {
    ComparisonLap {
        lap_number: number,
        lap_duration: Some(duration),
        sector_1_time: Some(sectors[0]),
        sector_2_time: Some(sectors[1]),
        sector_3_time: Some(sectors[2]),
        tyre_compound: Some("SOFT".to_string()),
    }
}

/// Fill the first two columns with (driver, session) pairs and return their ids.
fn two_columns(builder: &mut ComparisonBuilder, first: (Driver, u64), second: (Driver, u64)) -> [String; 2] {
    let ids = [builder.columns()[0].id.clone(), builder.add_column().unwrap()];
    for (id, (driver, session)) in ids.iter().zip([first, second]) {
        builder.set_driver(id, Some(driver)).unwrap();
        builder.set_year(id, Some(2024)).unwrap();
        builder.set_session(id, Some(SessionKey(session))).unwrap();
    }
    ids
}

#[tokio::test]
async fn test_results_are_joined_by_column_id() {
    let client = MockResourceClient::new()
        .with_comparison_laps(
            SessionKey(11),
            DriverNumber(1),
            vec![lap(1, 91.0, [30.0, 31.0, 30.0]), lap(2, 90.0, [29.5, 31.0, 29.5])],
        )
        .with_comparison_laps(
            SessionKey(11),
            DriverNumber(44),
            vec![lap(1, 92.0, [30.5, 31.5, 30.0])],
        )
        .with_reversed_comparison_order();
    let mut builder = ComparisonBuilder::new(Arc::new(client));
    let [verstappen, hamilton] = two_columns(
        &mut builder,
        (driver(1, "Max Verstappen", "3671C6"), 11),
        (driver(44, "Lewis Hamilton", "27F4D2"), 11),
    );

    assert!(builder.run_comparison());
    assert!(builder.comparing());
    builder.settle().await;

    let first = builder.result(&verstappen).unwrap();
    assert_eq!(first.driver_number, DriverNumber(1));
    assert_eq!(first.laps.len(), 2);
    assert_eq!(first.stats.fastest_lap, Some(90.0));
    assert_eq!(first.stats.average_lap, Some(90.5));
    assert_eq!(first.sector_bests.sector_1, Some(29.5));

    let second = builder.result(&hamilton).unwrap();
    assert_eq!(second.laps.len(), 1);
    assert_eq!(second.stats.fastest_lap, Some(92.0));
    assert_eq!(second.stats.consistency, Some(0.));

    assert_eq!(builder.results()[0].column_id, verstappen);
    assert_eq!(builder.fastest_overall(), Some(90.0));
    assert_eq!(builder.most_consistent(), Some(0.));
}

#[tokio::test]
async fn test_overlapping_runs_only_commit_the_latest() {
    let client = MockResourceClient::new()
        .with_comparison_laps(SessionKey(11), DriverNumber(1), vec![lap(1, 95.0, [31.0; 3])])
        .with_comparison_laps(SessionKey(12), DriverNumber(1), vec![lap(1, 88.0, [29.0; 3])])
        .with_comparison_laps(SessionKey(11), DriverNumber(44), vec![lap(1, 93.0, [31.0; 3])]);
    let mut builder = ComparisonBuilder::new(Arc::new(client));
    let [first, _] = two_columns(
        &mut builder,
        (driver(1, "Max Verstappen", "3671C6"), 11),
        (driver(44, "Lewis Hamilton", "27F4D2"), 11),
    );

    assert!(builder.run_comparison());
    builder.set_session(&first, Some(SessionKey(12))).unwrap();
    assert!(builder.run_comparison());
    builder.settle().await;

    assert_eq!(builder.result(&first).unwrap().session_key, SessionKey(12));
    assert_eq!(builder.fastest_overall(), Some(88.0));
}

#[tokio::test]
async fn test_stale_run_arriving_last_is_discarded() {
    let client = Arc::new(
        MockResourceClient::new()
            .with_comparison_laps(SessionKey(11), DriverNumber(1), vec![lap(1, 95.0, [31.0; 3])])
            .with_comparison_laps(SessionKey(12), DriverNumber(1), vec![lap(1, 88.0, [29.0; 3])]),
    );
    let mut builder = ComparisonBuilder::new(client.clone());
    let id = builder.columns()[0].id.clone();
    let slow = client.gate(GateKey::ComparisonLaps {
        column_id: id.clone(),
        session: SessionKey(11),
    });

    builder.set_driver(&id, Some(driver(1, "Max Verstappen", "3671C6"))).unwrap();
    builder.set_session(&id, Some(SessionKey(11))).unwrap();
    assert!(builder.run_comparison());
    builder.set_session(&id, Some(SessionKey(12))).unwrap();
    assert!(builder.run_comparison());
    builder.settle().await;
    assert_eq!(builder.result(&id).unwrap().stats.fastest_lap, Some(88.0));

    slow.open();
    assert!(!builder.next_event().await);
    assert_eq!(builder.result(&id).unwrap().stats.fastest_lap, Some(88.0));
    assert_eq!(
        client.request_count(|r| matches!(r, MockRequest::ComparisonLaps(_))),
        2
    );
}

#[tokio::test]
async fn test_incomplete_columns_are_not_requested() {
    let client = Arc::new(
        MockResourceClient::new()
            .with_comparison_laps(SessionKey(11), DriverNumber(1), vec![lap(1, 90.0, [30.0; 3])]),
    );
    let mut builder = ComparisonBuilder::new(client.clone());
    let complete = builder.columns()[0].id.clone();
    let incomplete = builder.add_column().unwrap();
    builder.set_driver(&complete, Some(driver(1, "Max Verstappen", "3671C6"))).unwrap();
    builder.set_session(&complete, Some(SessionKey(11))).unwrap();
    builder.set_driver(&incomplete, Some(driver(44, "Lewis Hamilton", "27F4D2"))).unwrap();

    builder.run_comparison();
    builder.settle().await;

    assert_eq!(builder.results().len(), 1);
    assert!(builder.result(&incomplete).is_none());
    let requested = client
        .requests()
        .into_iter()
        .find_map(|r| match r {
            MockRequest::ComparisonLaps(columns) => Some(columns),
            _ => None,
        })
        .unwrap();
    assert_eq!(requested.len(), 1);
    assert_eq!(requested[0].id, complete);
}

#[tokio::test]
async fn test_column_removed_during_run_is_skipped() {
    let client = Arc::new(MockResourceClient::new());
    let mut builder = ComparisonBuilder::new(client.clone());
    let [first, second] = two_columns(
        &mut builder,
        (driver(1, "Max Verstappen", "3671C6"), 11),
        (driver(44, "Lewis Hamilton", "27F4D2"), 11),
    );
    let gate = client.gate(GateKey::ComparisonLaps {
        column_id: second.clone(),
        session: SessionKey(11),
    });

    builder.run_comparison();
    builder.remove_column(&second).unwrap();
    gate.open();
    builder.settle().await;

    assert_eq!(builder.results().len(), 1);
    assert!(builder.result(&first).unwrap().laps.is_empty());
}

#[tokio::test]
async fn test_lap_series_follows_the_metric() {
    let client = MockResourceClient::new()
        .with_comparison_laps(
            SessionKey(11),
            DriverNumber(1),
            vec![lap(1, 91.0, [30.0, 31.0, 30.0]), lap(2, 90.0, [29.5, 31.0, 29.5])],
        )
        .with_comparison_laps(
            SessionKey(11),
            DriverNumber(44),
            vec![lap(2, 92.0, [30.5, 31.5, 30.0]), lap(3, 91.5, [30.5, 31.0, 30.0])],
        );
    let mut builder = ComparisonBuilder::new(Arc::new(client));
    two_columns(
        &mut builder,
        (driver(1, "Max Verstappen", "3671C6"), 11),
        (driver(44, "Lewis Hamilton", "27F4D2"), 11),
    );
    builder.run_comparison();
    builder.settle().await;

    let series = builder.lap_series(LapMetric::LapTime);
    assert_eq!(series.labels, vec![1, 2, 3]);
    assert_eq!(series.lines[0].label, "Max Verstappen (2024)");
    assert_eq!(series.lines[0].colour, "3671C6");
    assert_eq!(series.lines[0].values, vec![Some(91.0), Some(90.0), None]);
    assert_eq!(series.lines[1].values, vec![None, Some(92.0), Some(91.5)]);

    let sector = builder.lap_series(LapMetric::Sector(Sector::Two));
    assert_eq!(sector.lines[1].values, vec![None, Some(31.5), Some(31.0)]);
}
