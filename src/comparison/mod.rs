// Side-by-side comparison of up to four (driver, session) columns
//
// Each column is its own small cascade: driver, then season, then meeting,
// then session. Choosing a meeting loads that meeting's sessions for the
// column only. Running the comparison fetches the laps of every complete
// column in one batched request and derives per-column statistics.

mod series;

use std::sync::Arc;

use itertools::Itertools;
use log::{debug, info};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub use series::{LapMetric, LapSeries, SeriesLine};

use crate::{
    PaddockError,
    api::{
        ComparisonColumnData, ComparisonLap, ComparisonRequest, Driver, DriverNumber, Meeting,
        MeetingKey, ResourceClient, Session, SessionKey,
    },
    stats::{DerivedStats, SectorBests},
};

pub const MAX_COMPARISON_COLUMNS: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct ComparisonColumn {
    pub id: String,
    pub driver: Option<Driver>,
    pub year: Option<i32>,
    pub meeting: Option<MeetingKey>,
    pub session: Option<SessionKey>,
    /// Sessions of `meeting`, once loaded
    pub session_options: Vec<Session>,
    sessions_token: u64,
    sessions_pending: bool,
}

impl ComparisonColumn {
    fn empty() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            driver: None,
            year: None,
            meeting: None,
            session: None,
            session_options: Vec::new(),
            sessions_token: 0,
            sessions_pending: false,
        }
    }

    /// A column takes part in a run once it has a driver and a session.
    pub fn is_complete(&self) -> bool {
        self.driver.is_some() && self.session.is_some()
    }

    pub fn sessions_loading(&self) -> bool {
        self.sessions_pending
    }

    fn request(&self) -> Option<ComparisonRequest> {
        Some(ComparisonRequest {
            id: self.id.clone(),
            driver_number: self.driver.as_ref()?.number,
            session_key: self.session?,
        })
    }
}

/// Laps and statistics of one column from the latest run
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnResult {
    pub column_id: String,
    pub driver_number: DriverNumber,
    pub session_key: SessionKey,
    pub laps: Vec<ComparisonLap>,
    pub stats: DerivedStats,
    pub sector_bests: SectorBests,
}

impl ColumnResult {
    fn new(request: &ComparisonRequest, laps: Vec<ComparisonLap>) -> Self {
        Self {
            column_id: request.id.clone(),
            driver_number: request.driver_number,
            session_key: request.session_key,
            stats: DerivedStats::from_laps(&laps),
            sector_bests: SectorBests::from_laps(&laps),
            laps,
        }
    }
}

#[derive(Debug)]
pub enum ComparisonEvent {
    ColumnSessions {
        column_id: String,
        token: u64,
        meeting: MeetingKey,
        sessions: Vec<Session>,
    },
    Laps {
        run: u64,
        requested: Vec<ComparisonRequest>,
        response: Option<Vec<ComparisonColumnData>>,
    },
}

/// Seasons present in `meetings`, newest first.
pub fn available_years(meetings: &[Meeting]) -> Vec<i32> {
    meetings
        .iter()
        .map(|meeting| meeting.year)
        .unique()
        .sorted_by(|a, b| b.cmp(a))
        .collect()
}

pub fn meetings_for_year(meetings: &[Meeting], year: i32) -> Vec<&Meeting> {
    meetings
        .iter()
        .filter(|meeting| meeting.year == year)
        .collect()
}

/// Builder and runner for driver comparisons.
///
/// Always holds between one and [`MAX_COMPARISON_COLUMNS`] columns. Like the
/// selection store, fetches run in the background and their results are
/// folded in through [`apply`](Self::apply); results of superseded runs and
/// of abandoned meeting choices are discarded.
pub struct ComparisonBuilder {
    client: Arc<dyn ResourceClient>,
    events_tx: UnboundedSender<ComparisonEvent>,
    events_rx: UnboundedReceiver<ComparisonEvent>,
    columns: Vec<ComparisonColumn>,
    run_token: u64,
    run_pending: bool,
    results: Vec<ColumnResult>,
}

impl ComparisonBuilder {
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            client,
            events_tx,
            events_rx,
            columns: vec![ComparisonColumn::empty()],
            run_token: 0,
            run_pending: false,
            results: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[ComparisonColumn] {
        &self.columns
    }

    pub fn column(&self, column_id: &str) -> Option<&ComparisonColumn> {
        self.columns.iter().find(|column| column.id == column_id)
    }

    fn column_mut(&mut self, column_id: &str) -> Result<&mut ComparisonColumn, PaddockError> {
        self.columns
            .iter_mut()
            .find(|column| column.id == column_id)
            .ok_or_else(|| PaddockError::UnknownColumn {
                column_id: column_id.to_string(),
            })
    }

    /// Append an empty column and return its id.
    pub fn add_column(&mut self) -> Result<String, PaddockError> {
        if self.columns.len() >= MAX_COMPARISON_COLUMNS {
            return Err(PaddockError::ColumnLimitReached {
                max: MAX_COMPARISON_COLUMNS,
            });
        }
        let column = ComparisonColumn::empty();
        let id = column.id.clone();
        self.columns.push(column);
        Ok(id)
    }

    /// Remove a column. Removing the only column replaces it with a fresh
    /// empty one.
    pub fn remove_column(&mut self, column_id: &str) -> Result<(), PaddockError> {
        let index = self
            .columns
            .iter()
            .position(|column| column.id == column_id)
            .ok_or_else(|| PaddockError::UnknownColumn {
                column_id: column_id.to_string(),
            })?;
        if self.columns.len() == 1 {
            self.columns = vec![ComparisonColumn::empty()];
        } else {
            self.columns.remove(index);
        }
        Ok(())
    }

    /// Changing the driver restarts the column's cascade.
    pub fn set_driver(
        &mut self,
        column_id: &str,
        driver: Option<Driver>,
    ) -> Result<(), PaddockError> {
        let column = self.column_mut(column_id)?;
        column.driver = driver;
        column.year = None;
        clear_meeting(column);
        Ok(())
    }

    pub fn set_year(&mut self, column_id: &str, year: Option<i32>) -> Result<(), PaddockError> {
        let column = self.column_mut(column_id)?;
        column.year = year;
        clear_meeting(column);
        Ok(())
    }

    /// Choose the column's meeting and load its sessions in the background.
    pub fn set_meeting(
        &mut self,
        column_id: &str,
        meeting: Option<MeetingKey>,
    ) -> Result<(), PaddockError> {
        let column = self.column_mut(column_id)?;
        clear_meeting(column);
        column.meeting = meeting;
        let Some(meeting) = meeting else {
            return Ok(());
        };
        column.sessions_pending = true;

        let column_id = column.id.clone();
        let token = column.sessions_token;
        let client = self.client.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let sessions = client.sessions(meeting).await.unwrap_or_default();
            let _ = events.send(ComparisonEvent::ColumnSessions {
                column_id,
                token,
                meeting,
                sessions,
            });
        });
        Ok(())
    }

    pub fn set_session(
        &mut self,
        column_id: &str,
        session: Option<SessionKey>,
    ) -> Result<(), PaddockError> {
        self.column_mut(column_id)?.session = session;
        Ok(())
    }

    /// Put a driver into a column, as when dragging a driver from the roster.
    /// Filling the last column opens a new empty one while there is room;
    /// its id is returned.
    pub fn drop_driver(
        &mut self,
        column_id: &str,
        driver: Driver,
    ) -> Result<Option<String>, PaddockError> {
        self.set_driver(column_id, Some(driver))?;
        let is_last = self
            .columns
            .last()
            .is_some_and(|column| column.id == column_id);
        if is_last && self.columns.len() < MAX_COMPARISON_COLUMNS {
            return self.add_column().map(Some);
        }
        Ok(None)
    }

    /// Fetch laps for every complete column in one request. Returns `false`
    /// and leaves previous results untouched when no column is complete.
    pub fn run_comparison(&mut self) -> bool {
        let requests: Vec<ComparisonRequest> = self
            .columns
            .iter()
            .filter_map(ComparisonColumn::request)
            .collect();
        if requests.is_empty() {
            debug!("No complete column to compare");
            return false;
        }

        self.run_token += 1;
        self.run_pending = true;
        self.results.clear();

        let run = self.run_token;
        let client = self.client.clone();
        let events = self.events_tx.clone();
        info!("Comparing {} columns (run {})", requests.len(), run);
        tokio::spawn(async move {
            let response = client.comparison_laps(&requests).await;
            let _ = events.send(ComparisonEvent::Laps {
                run,
                requested: requests,
                response,
            });
        });
        true
    }

    pub fn apply(&mut self, event: ComparisonEvent) -> bool {
        match event {
            ComparisonEvent::ColumnSessions {
                column_id,
                token,
                meeting,
                sessions,
            } => {
                let Some(column) = self.columns.iter_mut().find(|column| {
                    column.id == column_id
                        && column.sessions_token == token
                        && column.meeting == Some(meeting)
                }) else {
                    debug!(
                        "Discarding sessions of meeting {} for column {}",
                        meeting, column_id
                    );
                    return false;
                };
                column.session_options = sessions;
                column.sessions_pending = false;
                true
            }
            ComparisonEvent::Laps {
                run,
                requested,
                response,
            } => {
                if run != self.run_token {
                    debug!("Discarding comparison run {} (current {})", run, self.run_token);
                    return false;
                }
                self.run_pending = false;
                let mut response = response.unwrap_or_default();
                self.results = requested
                    .iter()
                    .filter(|request| self.column(&request.id).is_some())
                    .map(|request| {
                        let laps = response
                            .iter()
                            .position(|data| data.column_id == request.id)
                            .map(|index| response.swap_remove(index).laps)
                            .unwrap_or_default();
                        ColumnResult::new(request, laps)
                    })
                    .collect();
                true
            }
        }
    }

    pub fn drain(&mut self) -> usize {
        let mut committed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.apply(event) {
                committed += 1;
            }
        }
        committed
    }

    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => self.apply(event),
            None => false,
        }
    }

    pub async fn settle(&mut self) {
        while self.loading() {
            self.next_event().await;
        }
    }

    /// Whether the current run or any column's session list is still loading.
    pub fn loading(&self) -> bool {
        self.comparing() || self.columns.iter().any(ComparisonColumn::sessions_loading)
    }

    pub fn comparing(&self) -> bool {
        self.run_pending
    }

    /// Results of the latest completed run, in column order at request time.
    pub fn results(&self) -> &[ColumnResult] {
        &self.results
    }

    pub fn result(&self, column_id: &str) -> Option<&ColumnResult> {
        self.results.iter().find(|result| result.column_id == column_id)
    }

    /// Best fastest lap across columns.
    pub fn fastest_overall(&self) -> Option<f64> {
        self.results
            .iter()
            .filter_map(|result| result.stats.fastest_lap)
            .reduce(f64::min)
    }

    /// Lowest consistency (standard deviation) across columns.
    pub fn most_consistent(&self) -> Option<f64> {
        self.results
            .iter()
            .filter_map(|result| result.stats.consistency)
            .reduce(f64::min)
    }

    /// Per-lap values of `metric` for every result, aligned on lap number.
    pub fn lap_series(&self, metric: LapMetric) -> LapSeries {
        LapSeries::build(&self.results, &self.columns, metric)
    }
}

fn clear_meeting(column: &mut ComparisonColumn) {
    column.meeting = None;
    column.session = None;
    column.session_options.clear();
    column.sessions_pending = false;
    column.sessions_token += 1;
}
