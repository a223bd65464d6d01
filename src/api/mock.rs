use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::{
    ApiStatusResponse, ComparisonColumnData, ComparisonLap, ComparisonRequest, Driver,
    DriverNumber, DriverStats, Lap, Meeting, MeetingDetails, MeetingKey, RecordsResponse,
    ResourceClient, SeasonStats, Session, SessionDetails, SessionKey,
};

/// Identifies a request that a [`MockResourceClient`] can hold back until the
/// test opens the matching [`MockGate`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GateKey {
    Sessions(MeetingKey),
    SessionDrivers(SessionKey),
    Laps(SessionKey),
    /// Any comparison request containing this column bound to this session
    ComparisonLaps {
        column_id: String,
        session: SessionKey,
    },
    SeasonStats(i32),
    Status,
}

/// Handle that releases every request held on one [`GateKey`].
#[derive(Clone)]
pub struct MockGate {
    semaphore: Arc<Semaphore>,
}

impl MockGate {
    /// Let held and future requests through.
    pub fn open(&self) {
        self.semaphore.close();
    }
}

/// A request observed by the mock, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum MockRequest {
    Meetings,
    MeetingDetails(MeetingKey),
    Sessions(MeetingKey),
    SessionDetails(SessionKey),
    SessionDrivers(SessionKey),
    AllDrivers,
    Laps(SessionKey),
    ComparisonLaps(Vec<ComparisonRequest>),
    SeasonStats(i32),
    Records(i32),
    AvailableYears,
    DriverStats(DriverNumber),
    Status,
}

/// A scripted, in-memory [`ResourceClient`].
///
/// MockResourceClient answers every operation from data registered with its
/// `with_*` builders. Unregistered resources resolve to `None`, exactly as a
/// failed HTTP request would. This enables:
/// - Deterministic tests of the cascading store and the comparison builder
/// - Reproducing out-of-order responses by holding requests behind gates
/// - Offline benchmarks of the statistics pipeline
#[derive(Default)]
pub struct MockResourceClient {
    meetings: Option<Vec<Meeting>>,
    meeting_details: HashMap<MeetingKey, MeetingDetails>,
    sessions: HashMap<MeetingKey, Vec<Session>>,
    session_details: HashMap<SessionKey, SessionDetails>,
    session_drivers: HashMap<SessionKey, Vec<Driver>>,
    all_drivers: Option<Vec<Driver>>,
    laps: HashMap<SessionKey, Vec<Lap>>,
    comparison_laps: HashMap<(SessionKey, DriverNumber), Vec<ComparisonLap>>,
    comparison_unavailable: bool,
    reverse_comparison_order: bool,
    season_stats: HashMap<i32, SeasonStats>,
    records: HashMap<i32, RecordsResponse>,
    years: Option<Vec<i32>>,
    driver_stats: HashMap<DriverNumber, DriverStats>,
    status: Option<ApiStatusResponse>,
    gates: Mutex<HashMap<GateKey, Arc<Semaphore>>>,
    requests: Mutex<Vec<MockRequest>>,
}

impl MockResourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meetings(mut self, meetings: Vec<Meeting>) -> Self {
        self.meetings = Some(meetings);
        self
    }

    pub fn with_meeting_details(mut self, details: MeetingDetails) -> Self {
        self.meeting_details.insert(details.meeting.key, details);
        self
    }

    pub fn with_sessions(mut self, meeting: MeetingKey, sessions: Vec<Session>) -> Self {
        self.sessions.insert(meeting, sessions);
        self
    }

    pub fn with_session_details(mut self, details: SessionDetails) -> Self {
        self.session_details.insert(details.session.key, details);
        self
    }

    pub fn with_session_drivers(mut self, session: SessionKey, drivers: Vec<Driver>) -> Self {
        self.session_drivers.insert(session, drivers);
        self
    }

    pub fn with_all_drivers(mut self, drivers: Vec<Driver>) -> Self {
        self.all_drivers = Some(drivers);
        self
    }

    pub fn with_laps(mut self, session: SessionKey, laps: Vec<Lap>) -> Self {
        self.laps.insert(session, laps);
        self
    }

    pub fn with_comparison_laps(
        mut self,
        session: SessionKey,
        driver: DriverNumber,
        laps: Vec<ComparisonLap>,
    ) -> Self {
        self.comparison_laps.insert((session, driver), laps);
        self
    }

    /// Make the comparison endpoint fail as a whole.
    pub fn with_comparison_unavailable(mut self) -> Self {
        self.comparison_unavailable = true;
        self
    }

    /// Answer comparison requests in reverse request order.
    pub fn with_reversed_comparison_order(mut self) -> Self {
        self.reverse_comparison_order = true;
        self
    }

    pub fn with_season_stats(mut self, stats: SeasonStats) -> Self {
        self.season_stats.insert(stats.year, stats);
        self
    }

    pub fn with_records(mut self, records: RecordsResponse) -> Self {
        self.records.insert(records.year, records);
        self
    }

    pub fn with_available_years(mut self, years: Vec<i32>) -> Self {
        self.years = Some(years);
        self
    }

    pub fn with_driver_stats(mut self, stats: DriverStats) -> Self {
        self.driver_stats.insert(stats.driver_number, stats);
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(ApiStatusResponse {
            status: status.to_string(),
        });
        self
    }

    /// Hold every request matching `key` until the returned gate is opened.
    pub fn gate(&self, key: GateKey) -> MockGate {
        let semaphore = self
            .gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key)
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone();
        MockGate { semaphore }
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of received requests matching `predicate`.
    pub fn request_count(&self, predicate: impl Fn(&MockRequest) -> bool) -> usize {
        self.requests().iter().filter(|r| predicate(r)).count()
    }

    fn record(&self, request: MockRequest) {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
    }

    async fn wait_for_gate(&self, key: &GateKey) {
        let semaphore = self
            .gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned();
        if let Some(semaphore) = semaphore {
            // a closed semaphore is an open gate
            let _ = semaphore.acquire().await;
        }
    }
}

#[async_trait]
impl ResourceClient for MockResourceClient {
    async fn meetings(&self) -> Option<Vec<Meeting>> {
        self.record(MockRequest::Meetings);
        self.meetings.clone()
    }

    async fn meeting_details(&self, meeting: MeetingKey) -> Option<MeetingDetails> {
        self.record(MockRequest::MeetingDetails(meeting));
        self.meeting_details.get(&meeting).cloned()
    }

    async fn sessions(&self, meeting: MeetingKey) -> Option<Vec<Session>> {
        self.record(MockRequest::Sessions(meeting));
        self.wait_for_gate(&GateKey::Sessions(meeting)).await;
        self.sessions.get(&meeting).cloned()
    }

    async fn session_details(&self, session: SessionKey) -> Option<SessionDetails> {
        self.record(MockRequest::SessionDetails(session));
        self.session_details.get(&session).cloned()
    }

    async fn session_drivers(&self, session: SessionKey) -> Option<Vec<Driver>> {
        self.record(MockRequest::SessionDrivers(session));
        self.wait_for_gate(&GateKey::SessionDrivers(session)).await;
        self.session_drivers.get(&session).cloned()
    }

    async fn all_drivers(&self) -> Option<Vec<Driver>> {
        self.record(MockRequest::AllDrivers);
        self.all_drivers.clone()
    }

    async fn laps(&self, session: SessionKey) -> Option<Vec<Lap>> {
        self.record(MockRequest::Laps(session));
        self.wait_for_gate(&GateKey::Laps(session)).await;
        self.laps.get(&session).cloned()
    }

    async fn comparison_laps(
        &self,
        columns: &[ComparisonRequest],
    ) -> Option<Vec<ComparisonColumnData>> {
        self.record(MockRequest::ComparisonLaps(columns.to_vec()));
        for column in columns {
            self.wait_for_gate(&GateKey::ComparisonLaps {
                column_id: column.id.clone(),
                session: column.session_key,
            })
            .await;
        }
        if self.comparison_unavailable {
            return None;
        }

        let mut response: Vec<ComparisonColumnData> = columns
            .iter()
            .map(|column| ComparisonColumnData {
                column_id: column.id.clone(),
                laps: self
                    .comparison_laps
                    .get(&(column.session_key, column.driver_number))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        if self.reverse_comparison_order {
            response.reverse();
        }
        Some(response)
    }

    async fn season_stats(&self, year: i32) -> Option<SeasonStats> {
        self.record(MockRequest::SeasonStats(year));
        self.wait_for_gate(&GateKey::SeasonStats(year)).await;
        self.season_stats.get(&year).cloned()
    }

    async fn records(&self, year: i32) -> Option<RecordsResponse> {
        self.record(MockRequest::Records(year));
        self.records.get(&year).cloned()
    }

    async fn available_years(&self) -> Option<Vec<i32>> {
        self.record(MockRequest::AvailableYears);
        self.years.clone()
    }

    async fn driver_stats(&self, driver: DriverNumber) -> Option<DriverStats> {
        self.record(MockRequest::DriverStats(driver));
        self.driver_stats.get(&driver).cloned()
    }

    async fn status(&self) -> Option<ApiStatusResponse> {
        self.record(MockRequest::Status);
        self.wait_for_gate(&GateKey::Status).await;
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(key: u64, meeting: u64, name: &str) -> Session {
        Session {
            key: SessionKey(key),
            meeting_key: MeetingKey(meeting),
            session_name: name.to_string(),
            session_type: String::new(),
            date_start: None,
            date_end: None,
        }
    }

    #[tokio::test]
    async fn test_unregistered_resources_resolve_to_none() {
        let client = MockResourceClient::new();
        assert!(client.meetings().await.is_none());
        assert!(client.sessions(MeetingKey(1)).await.is_none());
        assert_eq!(
            client.requests(),
            vec![MockRequest::Meetings, MockRequest::Sessions(MeetingKey(1))]
        );
    }

    #[tokio::test]
    async fn test_gate_holds_request_until_opened() {
        let client = Arc::new(
            MockResourceClient::new()
                .with_sessions(MeetingKey(1), vec![session(10, 1, "Race")]),
        );
        let gate = client.gate(GateKey::Sessions(MeetingKey(1)));

        let task_client = client.clone();
        let handle = tokio::spawn(async move { task_client.sessions(MeetingKey(1)).await });

        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert!(!handle.is_finished());
        assert_eq!(client.request_count(|r| matches!(r, MockRequest::Sessions(_))), 1);

        gate.open();
        let sessions = handle.await.unwrap().unwrap();
        assert_eq!(sessions[0].key, SessionKey(10));
    }

    #[tokio::test]
    async fn test_comparison_order_can_be_reversed() {
        let client = MockResourceClient::new().with_reversed_comparison_order();
        let request = vec![
            ComparisonRequest {
                id: "a".to_string(),
                driver_number: DriverNumber(1),
                session_key: SessionKey(11),
            },
            ComparisonRequest {
                id: "b".to_string(),
                driver_number: DriverNumber(44),
                session_key: SessionKey(11),
            },
        ];

        let response = client.comparison_laps(&request).await.unwrap();
        let ids: Vec<&str> = response.iter().map(|c| c.column_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
