// Integration tests for the cascading selection store
//
// Fixtures are decoded from JSON the way the timing API serves them, so these
// tests also cover identifier normalization on the way in.

use std::{sync::Arc, time::Duration};

use paddock::api::{
    Driver, DriverNumber, GateKey, Lap, Meeting, MeetingKey, MockRequest, MockResourceClient,
    Session, SessionKey,
};
use paddock::{ApiStatus, DerivedStats, SelectionStage, SelectionStore, StoreOptions};
use serde_json::{Value, json};

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).unwrap()
}

fn sessions(meeting: Value, entries: &[(u64, &str)]) -> Vec<Session> {
    entries
        .iter()
        .map(|(key, name)| {
            decode(json!({"_id": key, "meeting_key": meeting, "session_name": name}))
        })
        .collect()
}

fn laps(session: u64, driver: u64, durations: &[f64]) -> Vec<Lap> {
    durations
        .iter()
        .enumerate()
        .map(|(index, duration)| {
            decode(json!({
                "_id": {"$oid": format!("lap-{}-{}-{}", session, driver, index)},
                "session_key": session,
                "driver_number": driver,
                "lap_number": index + 1,
                "lap_duration": duration
            }))
        })
        .collect()
}

fn drivers(numbers: &[u64]) -> Vec<Driver> {
    numbers
        .iter()
        .map(|number| decode(json!({"_id": number, "full_name": format!("Driver {}", number)})))
        .collect()
}

fn manual_options() -> StoreOptions {
    StoreOptions {
        auto_select_first_meeting: false,
        auto_select_session: true,
        season_year: Some(2024),
    }
}

#[tokio::test]
async fn test_first_meeting_opens_on_the_race() {
    let meetings: Vec<Meeting> = decode(json!([
        {"_id": 1, "year": 2024, "meeting_name": "Bahrain"}
    ]));
    let client = Arc::new(
        MockResourceClient::new()
            .with_meetings(meetings)
            .with_sessions(MeetingKey(1), sessions(json!(1), &[(10, "Practice"), (11, "Race")]))
            .with_session_drivers(SessionKey(11), drivers(&[1]))
            .with_laps(SessionKey(11), laps(11, 1, &[90.123, 89.500, 0.]))
            .with_status("ok"),
    );
    let mut store = SelectionStore::with_options(
        client.clone(),
        StoreOptions {
            auto_select_first_meeting: true,
            auto_select_session: true,
            season_year: Some(2024),
        },
    );

    store.initialize().await;
    store.settle().await;
    while store.api_status() == ApiStatus::Checking {
        store.next_event().await;
    }

    assert_eq!(store.selected_meeting_key(), Some(MeetingKey(1)));
    assert_eq!(store.selected_session_key(), Some(SessionKey(11)));
    assert_eq!(store.stage(), SelectionStage::SessionSelected);
    assert_eq!(store.api_status(), ApiStatus::Connected);
    assert_eq!(store.drivers().len(), 1);
    assert_eq!(store.laps().len(), 3);

    let stats = DerivedStats::for_driver(store.laps(), DriverNumber(1));
    assert_eq!(stats.fastest_lap, Some(89.500));
    assert!((stats.average_lap.unwrap() - 89.8115).abs() < 1e-9);

    // the practice session was never loaded
    assert_eq!(
        client.request_count(|r| matches!(r, MockRequest::Laps(SessionKey(10)))),
        0
    );
}

#[tokio::test]
async fn test_hanging_status_and_season_stats_do_not_hold_up_the_cascade() {
    let meetings: Vec<Meeting> = decode(json!([
        {"_id": 1, "year": 2024, "meeting_name": "Bahrain"}
    ]));
    let client = Arc::new(
        MockResourceClient::new()
            .with_meetings(meetings)
            .with_sessions(MeetingKey(1), sessions(json!(1), &[(10, "Practice"), (11, "Race")]))
            .with_session_drivers(SessionKey(11), drivers(&[1]))
            .with_laps(SessionKey(11), laps(11, 1, &[90.0]))
            .with_season_stats(decode(json!({"year": 2024, "total_sessions": 120, "total_drivers": 24})))
            .with_status("ok"),
    );
    let status = client.gate(GateKey::Status);
    let season = client.gate(GateKey::SeasonStats(2024));
    let mut store = SelectionStore::with_options(
        client.clone(),
        StoreOptions {
            auto_select_first_meeting: true,
            auto_select_session: true,
            season_year: Some(2024),
        },
    );

    let opened = tokio::time::timeout(Duration::from_secs(2), async {
        store.initialize().await;
        store.settle().await;
    })
    .await;
    assert!(opened.is_ok());
    assert_eq!(store.meetings().len(), 1);
    assert_eq!(store.selected_session_key(), Some(SessionKey(11)));
    assert_eq!(store.laps().len(), 1);
    assert_eq!(store.api_status(), ApiStatus::Checking);
    assert!(store.season_stats().is_none());

    status.open();
    season.open();
    while store.api_status() == ApiStatus::Checking || store.season_stats().is_none() {
        store.next_event().await;
    }
    assert_eq!(store.api_status(), ApiStatus::Connected);
    assert_eq!(store.selected_session_key(), Some(SessionKey(11)));
}

#[tokio::test]
async fn test_late_sessions_of_abandoned_meeting_are_discarded() {
    let client = Arc::new(
        MockResourceClient::new()
            .with_sessions(MeetingKey(1), sessions(json!(1), &[(11, "Race")]))
            .with_sessions(MeetingKey(2), sessions(json!(2), &[(21, "Qualifying"), (22, "Race")]))
            .with_laps(SessionKey(22), laps(22, 44, &[92.1, 91.7])),
    );
    let slow = client.gate(GateKey::Sessions(MeetingKey(1)));
    let mut store = SelectionStore::with_options(client.clone(), manual_options());

    store.select_meeting(Some(MeetingKey(1)));
    store.select_meeting(Some(MeetingKey(2)));
    store.settle().await;

    assert_eq!(store.selected_session_key(), Some(SessionKey(22)));
    assert_eq!(store.laps().len(), 2);

    slow.open();
    assert!(!store.next_event().await);

    let keys: Vec<SessionKey> = store.sessions().iter().map(|s| s.key).collect();
    assert_eq!(keys, vec![SessionKey(21), SessionKey(22)]);
    assert_eq!(store.selected_session_key(), Some(SessionKey(22)));
    assert_eq!(store.laps().len(), 2);
    assert_eq!(
        client.request_count(|r| matches!(r, MockRequest::Laps(SessionKey(11)))),
        0
    );
}

#[tokio::test]
async fn test_abandoned_meeting_resolving_first_is_discarded() {
    let client = Arc::new(
        MockResourceClient::new()
            .with_sessions(MeetingKey(1), sessions(json!(1), &[(11, "Race")]))
            .with_sessions(MeetingKey(2), sessions(json!(2), &[(22, "Race")])),
    );
    let first = client.gate(GateKey::Sessions(MeetingKey(1)));
    let second = client.gate(GateKey::Sessions(MeetingKey(2)));
    let mut store = SelectionStore::with_options(client, manual_options());

    store.select_meeting(Some(MeetingKey(1)));
    store.select_meeting(Some(MeetingKey(2)));

    first.open();
    assert!(!store.next_event().await);
    assert!(store.sessions().is_empty());
    assert!(store.loading());

    second.open();
    store.settle().await;
    assert_eq!(store.sessions().len(), 1);
    assert_eq!(store.sessions()[0].key, SessionKey(22));
}

#[tokio::test]
async fn test_reselecting_a_meeting_ignores_its_earlier_fetch() {
    let client = Arc::new(
        MockResourceClient::new()
            .with_sessions(MeetingKey(1), sessions(json!({"$oid": "1"}), &[(11, "Race")]))
            .with_sessions(MeetingKey(2), sessions(json!("2"), &[(22, "Race")])),
    );
    let gate = client.gate(GateKey::Sessions(MeetingKey(1)));
    let mut store = SelectionStore::with_options(client.clone(), manual_options());

    store.select_meeting(Some(MeetingKey(1)));
    store.select_meeting(Some(MeetingKey(2)));
    store.select_meeting(Some(MeetingKey(1)));
    gate.open();
    store.settle().await;

    assert_eq!(store.selected_meeting_key(), Some(MeetingKey(1)));
    assert_eq!(store.selected_session_key(), Some(SessionKey(11)));
    assert_eq!(store.sessions().len(), 1);
    assert_eq!(
        client.request_count(|r| matches!(r, MockRequest::Sessions(MeetingKey(1)))),
        2
    );
}

#[tokio::test]
async fn test_late_laps_of_abandoned_session_are_discarded() {
    let client = Arc::new(
        MockResourceClient::new()
            .with_session_drivers(SessionKey(11), drivers(&[1, 44]))
            .with_laps(SessionKey(11), laps(11, 1, &[95.0, 94.0, 93.0]))
            .with_session_drivers(SessionKey(12), drivers(&[16]))
            .with_laps(SessionKey(12), laps(12, 16, &[88.0])),
    );
    let slow = client.gate(GateKey::Laps(SessionKey(11)));
    let mut store = SelectionStore::with_options(client, manual_options());

    store.select_session(Some(SessionKey(11)));
    store.select_session(Some(SessionKey(12)));
    store.settle().await;
    assert_eq!(store.laps().len(), 1);

    slow.open();
    assert!(!store.next_event().await);
    assert_eq!(store.drivers().len(), 1);
    assert_eq!(store.drivers()[0].number, DriverNumber(16));
    assert_eq!(store.laps()[0].session_key, SessionKey(12));
}

#[tokio::test]
async fn test_laps_failure_still_commits_drivers() {
    let client = Arc::new(
        MockResourceClient::new()
            .with_sessions(MeetingKey(1), sessions(json!(1), &[(11, "Race")]))
            .with_session_drivers(SessionKey(11), drivers(&[1, 11, 44])),
    );
    let mut store = SelectionStore::with_options(client, manual_options());

    store.select_meeting(Some(MeetingKey(1)));
    store.settle().await;

    assert!(!store.loading());
    assert_eq!(store.drivers().len(), 3);
    assert!(store.laps().is_empty());
    assert_eq!(DerivedStats::from_laps(store.laps()), DerivedStats::default());
}

#[tokio::test]
async fn test_drivers_and_laps_commit_together() {
    let client = Arc::new(
        MockResourceClient::new()
            .with_session_drivers(SessionKey(11), drivers(&[1]))
            .with_laps(SessionKey(11), laps(11, 1, &[90.0])),
    );
    let drivers_gate = client.gate(GateKey::SessionDrivers(SessionKey(11)));
    let mut store = SelectionStore::with_options(client, manual_options());

    store.select_session(Some(SessionKey(11)));
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    // laps are back but drivers are not, nothing is visible yet
    assert_eq!(store.drain(), 0);
    assert!(store.laps().is_empty());

    drivers_gate.open();
    store.settle().await;
    assert_eq!(store.drivers().len(), 1);
    assert_eq!(store.laps().len(), 1);
}

#[tokio::test]
async fn test_clearing_the_meeting_resets_everything() {
    let client = Arc::new(
        MockResourceClient::new()
            .with_sessions(MeetingKey(1), sessions(json!(1), &[(11, "Race")]))
            .with_laps(SessionKey(11), laps(11, 1, &[90.0])),
    );
    let mut store = SelectionStore::with_options(client, manual_options());

    store.select_meeting(Some(MeetingKey(1)));
    store.settle().await;
    assert_eq!(store.laps().len(), 1);

    store.select_meeting(None);
    assert_eq!(store.stage(), SelectionStage::Idle);
    assert!(store.sessions().is_empty());
    assert!(store.laps().is_empty());
    assert!(store.drivers().is_empty());
    assert!(!store.loading());
}
