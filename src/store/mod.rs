// Cascading selection over meetings, sessions, drivers and laps
//
// Selecting a meeting loads its sessions and picks a default session;
// selecting a session loads its drivers and laps. Every fetch runs as a
// spawned task and reports back through the store's event queue, tagged with
// the generation token that was current when it was issued. Only events whose
// token and key still match the current selection are committed, so a slow
// response for an abandoned selection can never overwrite a newer one.

mod status;

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Datelike;
use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub use status::{ApiStatus, DEFAULT_STATUS_POLL_INTERVAL, StatusPoller, probe};

use crate::{
    api::{
        Driver, Lap, Meeting, MeetingKey, ResourceClient, SeasonStats, Session, SessionKey,
    },
    config::AppConfig,
};

/// How far down the hierarchy the current selection reaches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionStage {
    Idle,
    MeetingSelected,
    SessionSelected,
}

/// Result of a fetch issued by the store, delivered through its event queue.
#[derive(Debug)]
pub enum StoreEvent {
    Sessions {
        token: u64,
        meeting: MeetingKey,
        sessions: Vec<Session>,
    },
    SessionData {
        token: u64,
        session: SessionKey,
        drivers: Vec<Driver>,
        laps: Vec<Lap>,
    },
    SeasonStats {
        year: i32,
        stats: Option<SeasonStats>,
    },
    Status(ApiStatus),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoreOptions {
    /// Select the first meeting once `initialize` has loaded the list
    pub auto_select_first_meeting: bool,
    /// Open the default session once a meeting's sessions arrive
    pub auto_select_session: bool,
    /// Season used for the aggregate stats; the current year when unset
    pub season_year: Option<i32>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            auto_select_first_meeting: true,
            auto_select_session: true,
            season_year: None,
        }
    }
}

impl From<&AppConfig> for StoreOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            auto_select_first_meeting: config.auto_select_first_meeting,
            auto_select_session: true,
            season_year: config.season_year,
        }
    }
}

/// Pick the session a freshly loaded meeting should open on: the race when
/// there is one, otherwise the first session.
pub fn default_session(sessions: &[Session]) -> Option<SessionKey> {
    sessions
        .iter()
        .find(|session| session.is_race())
        .or_else(|| sessions.first())
        .map(|session| session.key)
}

/// Case-insensitive search on meeting name, location and country, optionally
/// restricted to one season.
pub fn filter_meetings<'a>(
    meetings: &'a [Meeting],
    query: Option<&str>,
    year: Option<i32>,
) -> Vec<&'a Meeting> {
    let query = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();
    meetings
        .iter()
        .filter(|meeting| year.is_none_or(|year| meeting.year == year))
        .filter(|meeting| {
            query.is_empty()
                || [&meeting.meeting_name, &meeting.location, &meeting.country_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
        })
        .collect()
}

/// The cascading selection state.
///
/// Selection methods are synchronous: they clear dependent state immediately
/// and spawn the fetch for the next level, so they must be called from within
/// a tokio runtime. Results are folded in by [`apply`](Self::apply), driven by
/// [`drain`](Self::drain) from a polling loop or by
/// [`next_event`](Self::next_event) / [`settle`](Self::settle) from async code.
pub struct SelectionStore {
    client: Arc<dyn ResourceClient>,
    options: StoreOptions,
    events_tx: UnboundedSender<StoreEvent>,
    events_rx: UnboundedReceiver<StoreEvent>,

    meeting_token: u64,
    session_token: u64,
    sessions_pending: bool,
    session_data_pending: bool,

    meetings: Vec<Meeting>,
    all_drivers: Vec<Driver>,
    selected_meeting: Option<MeetingKey>,
    sessions: Vec<Session>,
    selected_session: Option<SessionKey>,
    drivers: Vec<Driver>,
    laps: Vec<Lap>,

    season_year: i32,
    season_stats: HashMap<i32, SeasonStats>,
    api_status: ApiStatus,
}

impl SelectionStore {
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self::with_options(client, StoreOptions::default())
    }

    pub fn with_options(client: Arc<dyn ResourceClient>, options: StoreOptions) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let season_year = options
            .season_year
            .unwrap_or_else(|| chrono::Local::now().year());
        Self {
            client,
            options,
            events_tx,
            events_rx,
            meeting_token: 0,
            session_token: 0,
            sessions_pending: false,
            session_data_pending: false,
            meetings: Vec::new(),
            all_drivers: Vec::new(),
            selected_meeting: None,
            sessions: Vec::new(),
            selected_session: None,
            drivers: Vec::new(),
            laps: Vec::new(),
            season_year,
            season_stats: HashMap::new(),
            api_status: ApiStatus::Checking,
        }
    }

    pub fn client(&self) -> Arc<dyn ResourceClient> {
        self.client.clone()
    }

    /// Load the meeting list and the full driver roster, then open the first
    /// meeting when configured to. The season aggregates and a status probe
    /// are fetched in the background and arrive as events, so a slow or
    /// hanging endpoint never holds up the cascade.
    pub async fn initialize(&mut self) {
        self.spawn_season_stats(self.season_year);
        self.spawn_status_probe();

        let client = self.client.clone();
        let (meetings, all_drivers) = tokio::join!(client.meetings(), client.all_drivers());
        self.meetings = meetings.unwrap_or_default();
        self.all_drivers = all_drivers.unwrap_or_default();
        info!(
            "Loaded {} meetings and {} drivers",
            self.meetings.len(),
            self.all_drivers.len()
        );

        if self.options.auto_select_first_meeting {
            if let Some(first) = self.meetings.first().map(|meeting| meeting.key) {
                self.select_meeting(Some(first));
            }
        }
    }

    fn spawn_season_stats(&self, year: i32) {
        let client = self.client.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let stats = client.season_stats(year).await;
            let _ = events.send(StoreEvent::SeasonStats { year, stats });
        });
    }

    fn spawn_status_probe(&self) {
        let client = self.client.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let status = probe(client.as_ref()).await;
            let _ = events.send(StoreEvent::Status(status));
        });
    }

    /// Change the selected meeting. Sessions, the selected session, drivers
    /// and laps are cleared before this returns; the sessions of the new
    /// meeting are fetched in the background.
    pub fn select_meeting(&mut self, meeting: Option<MeetingKey>) {
        self.meeting_token += 1;
        self.session_token += 1;
        self.selected_meeting = meeting;
        self.sessions.clear();
        self.selected_session = None;
        self.drivers.clear();
        self.laps.clear();
        self.session_data_pending = false;

        let Some(meeting) = meeting else {
            self.sessions_pending = false;
            return;
        };
        self.sessions_pending = true;

        let token = self.meeting_token;
        let client = self.client.clone();
        let events = self.events_tx.clone();
        debug!("Fetching sessions of meeting {} (token {})", meeting, token);
        tokio::spawn(async move {
            let sessions = client.sessions(meeting).await.unwrap_or_default();
            let _ = events.send(StoreEvent::Sessions {
                token,
                meeting,
                sessions,
            });
        });
    }

    /// Change the selected session. Drivers and laps are cleared before this
    /// returns and fetched together in the background.
    pub fn select_session(&mut self, session: Option<SessionKey>) {
        self.session_token += 1;
        self.selected_session = session;
        self.drivers.clear();
        self.laps.clear();

        let Some(session) = session else {
            self.session_data_pending = false;
            return;
        };
        self.session_data_pending = true;

        let token = self.session_token;
        let client = self.client.clone();
        let events = self.events_tx.clone();
        debug!("Fetching drivers and laps of session {} (token {})", session, token);
        tokio::spawn(async move {
            let (drivers, laps) = tokio::join!(client.session_drivers(session), client.laps(session));
            let _ = events.send(StoreEvent::SessionData {
                token,
                session,
                drivers: drivers.unwrap_or_default(),
                laps: laps.unwrap_or_default(),
            });
        });
    }

    /// Fold one event into the state. Returns `false` when the event was
    /// stale and has been discarded.
    pub fn apply(&mut self, event: StoreEvent) -> bool {
        match event {
            StoreEvent::Sessions {
                token,
                meeting,
                sessions,
            } => {
                if token != self.meeting_token || Some(meeting) != self.selected_meeting {
                    debug!(
                        "Discarding sessions of meeting {} (token {}, current {})",
                        meeting, token, self.meeting_token
                    );
                    return false;
                }
                self.sessions_pending = false;
                let session = if self.options.auto_select_session {
                    default_session(&sessions)
                } else {
                    None
                };
                self.sessions = sessions;
                self.select_session(session);
                true
            }
            StoreEvent::SessionData {
                token,
                session,
                drivers,
                laps,
            } => {
                if token != self.session_token || Some(session) != self.selected_session {
                    debug!(
                        "Discarding drivers and laps of session {} (token {}, current {})",
                        session, token, self.session_token
                    );
                    return false;
                }
                self.session_data_pending = false;
                self.drivers = drivers;
                self.laps = laps;
                true
            }
            StoreEvent::SeasonStats { year, stats } => {
                match stats {
                    Some(stats) => {
                        self.season_stats.insert(year, stats);
                    }
                    None => debug!("No season stats for {}", year),
                }
                true
            }
            StoreEvent::Status(status) => {
                self.api_status = status;
                true
            }
        }
    }

    /// Apply every event already queued, without waiting. Returns the number
    /// of events committed.
    pub fn drain(&mut self) -> usize {
        let mut committed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.apply(event) {
                committed += 1;
            }
        }
        committed
    }

    /// Wait for the next event and apply it.
    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => self.apply(event),
            // the store holds a sender, so the queue never closes
            None => false,
        }
    }

    /// Apply events until no fetch for the current selection is outstanding.
    pub async fn settle(&mut self) {
        while self.loading() {
            self.next_event().await;
        }
    }

    /// Season aggregates for `year`, fetched once and cached. A year the API
    /// has no data for reads as zero sessions and zero drivers.
    pub async fn load_season_stats(&mut self, year: i32) -> SeasonStats {
        if let Some(stats) = self.season_stats.get(&year) {
            return stats.clone();
        }
        let stats = self.client.season_stats(year).await;
        self.apply(StoreEvent::SeasonStats {
            year,
            stats: stats.clone(),
        });
        stats.unwrap_or(SeasonStats {
            year,
            ..SeasonStats::default()
        })
    }

    /// Probe the API once and record the result.
    pub async fn check_status(&mut self) -> ApiStatus {
        let status = probe(self.client.as_ref()).await;
        self.apply(StoreEvent::Status(status));
        status
    }

    /// Probe the API every `interval` in the background. Results arrive as
    /// events; polling stops when the returned poller is dropped.
    pub fn start_status_polling(&self, interval: Duration) -> StatusPoller {
        StatusPoller::spawn(self.client.clone(), self.events_tx.clone(), interval)
    }

    pub fn stage(&self) -> SelectionStage {
        match (self.selected_meeting, self.selected_session) {
            (None, _) => SelectionStage::Idle,
            (Some(_), None) => SelectionStage::MeetingSelected,
            (Some(_), Some(_)) => SelectionStage::SessionSelected,
        }
    }

    /// Whether a fetch for the current selection is still outstanding.
    pub fn loading(&self) -> bool {
        self.sessions_pending || self.session_data_pending
    }

    pub fn meetings(&self) -> &[Meeting] {
        &self.meetings
    }

    pub fn all_drivers(&self) -> &[Driver] {
        &self.all_drivers
    }

    pub fn selected_meeting_key(&self) -> Option<MeetingKey> {
        self.selected_meeting
    }

    pub fn selected_meeting(&self) -> Option<&Meeting> {
        let key = self.selected_meeting?;
        self.meetings.iter().find(|meeting| meeting.key == key)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn selected_session_key(&self) -> Option<SessionKey> {
        self.selected_session
    }

    pub fn selected_session(&self) -> Option<&Session> {
        let key = self.selected_session?;
        self.sessions.iter().find(|session| session.key == key)
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    pub fn laps(&self) -> &[Lap] {
        &self.laps
    }

    pub fn season_year(&self) -> i32 {
        self.season_year
    }

    /// Aggregates for the configured season, if loaded
    pub fn season_stats(&self) -> Option<&SeasonStats> {
        self.season_stats.get(&self.season_year)
    }

    pub fn api_status(&self) -> ApiStatus {
        self.api_status
    }
}
