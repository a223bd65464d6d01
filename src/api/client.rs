use std::error::Error;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::{Client, RequestBuilder, header};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::PaddockError;

use super::{
    ApiStatusResponse, ComparisonColumnData, ComparisonRequest, Driver, DriverNumber, DriverStats,
    Lap, Meeting, MeetingDetails, MeetingKey, RecordsResponse, SeasonStats, Session,
    SessionDetails, SessionKey,
};

pub const DEFAULT_BASE_URL: &str = "https://f1-backend-deployment.onrender.com/api";

const USER_AGENT: &str = concat!("paddock/", env!("CARGO_PKG_VERSION"));

/// A source of race data, one operation per logical API resource.
///
/// This trait is the only seam between the orchestrator and the network. The
/// store and the comparison builder receive an implementation as a value, so
/// tests and offline tools can swap in [`MockResourceClient`](super::MockResourceClient).
///
/// # Failure model
///
/// Operations never return errors. Transport failures, non-2xx statuses and
/// undecodable payloads are logged by the implementation and resolve to
/// `None`. Callers treat `None` for a list resource exactly like an empty
/// list. Every call is a single attempt: no retries, no backoff.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// All meetings, the root of the selection hierarchy.
    async fn meetings(&self) -> Option<Vec<Meeting>>;

    /// A meeting with its sessions and race winner.
    async fn meeting_details(&self, meeting: MeetingKey) -> Option<MeetingDetails>;

    /// Sessions belonging to one meeting.
    async fn sessions(&self, meeting: MeetingKey) -> Option<Vec<Session>>;

    /// A session with its meeting, classification and fastest laps.
    async fn session_details(&self, session: SessionKey) -> Option<SessionDetails>;

    /// Drivers that took part in one session.
    async fn session_drivers(&self, session: SessionKey) -> Option<Vec<Driver>>;

    /// The full driver roster, independent of any selection.
    async fn all_drivers(&self) -> Option<Vec<Driver>>;

    /// Every lap of one session.
    async fn laps(&self, session: SessionKey) -> Option<Vec<Lap>>;

    /// Laps for several (driver, session) columns in one request.
    ///
    /// The response holds one entry per column but its order is not
    /// guaranteed to match `columns`; join on `column_id`.
    async fn comparison_laps(
        &self,
        columns: &[ComparisonRequest],
    ) -> Option<Vec<ComparisonColumnData>>;

    async fn season_stats(&self, year: i32) -> Option<SeasonStats>;

    async fn records(&self, year: i32) -> Option<RecordsResponse>;

    async fn available_years(&self) -> Option<Vec<i32>>;

    async fn driver_stats(&self, driver: DriverNumber) -> Option<DriverStats>;

    /// Connectivity probe.
    async fn status(&self) -> Option<ApiStatusResponse>;
}

/// [`ResourceClient`] talking JSON over HTTP to the timing API.
pub struct HttpResourceClient {
    http_client: Client,
    base_url: String,
}

impl HttpResourceClient {
    pub fn new(base_url: &str) -> Result<Self, PaddockError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        let http_client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PaddockError::HttpClientBuild { source: e })?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn request_json(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<Value, PaddockError> {
        let response = request
            .send()
            .await
            .map_err(|e| PaddockError::HttpTransport {
                endpoint: endpoint.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaddockError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PaddockError::HttpTransport {
                endpoint: endpoint.to_string(),
                source: e,
            })?;
        serde_json::from_slice(&body).map_err(|e| PaddockError::ResponseDecode {
            endpoint: endpoint.to_string(),
            source: e,
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Option<T> {
        debug!("GET {}", self.url(endpoint));
        let result = self
            .request_json(self.http_client.get(self.url(endpoint)), endpoint)
            .await
            .and_then(|value| {
                serde_json::from_value(value).map_err(|e| PaddockError::ResponseDecode {
                    endpoint: endpoint.to_string(),
                    source: e,
                })
            });
        settle_response(endpoint, result)
    }

    async fn get_list<T: DeserializeOwned>(&self, endpoint: &str) -> Option<Vec<T>> {
        debug!("GET {}", self.url(endpoint));
        let result = self
            .request_json(self.http_client.get(self.url(endpoint)), endpoint)
            .await
            .and_then(|value| decode_list(endpoint, value));
        settle_response(endpoint, result)
    }
}

#[async_trait]
impl ResourceClient for HttpResourceClient {
    async fn meetings(&self) -> Option<Vec<Meeting>> {
        self.get_list("/meetings").await
    }

    async fn meeting_details(&self, meeting: MeetingKey) -> Option<MeetingDetails> {
        self.get(&format!("/meetings/{}/details", meeting)).await
    }

    async fn sessions(&self, meeting: MeetingKey) -> Option<Vec<Session>> {
        self.get_list(&format!("/meetings/{}/sessions", meeting))
            .await
    }

    async fn session_details(&self, session: SessionKey) -> Option<SessionDetails> {
        self.get(&format!("/sessions/{}/details", session)).await
    }

    async fn session_drivers(&self, session: SessionKey) -> Option<Vec<Driver>> {
        self.get_list(&format!("/drivers?session_key={}", session))
            .await
    }

    async fn all_drivers(&self) -> Option<Vec<Driver>> {
        self.get_list("/drivers/all").await
    }

    async fn laps(&self, session: SessionKey) -> Option<Vec<Lap>> {
        self.get_list(&format!("/laps?session_key={}", session))
            .await
    }

    async fn comparison_laps(
        &self,
        columns: &[ComparisonRequest],
    ) -> Option<Vec<ComparisonColumnData>> {
        let endpoint = "/comparison/laps";
        debug!(
            "POST {} with {} columns",
            self.url(endpoint),
            columns.len()
        );
        let request = self.http_client.post(self.url(endpoint)).json(columns);
        let result = self
            .request_json(request, endpoint)
            .await
            .and_then(|value| decode_list(endpoint, value));
        settle_response(endpoint, result)
    }

    async fn season_stats(&self, year: i32) -> Option<SeasonStats> {
        self.get(&format!("/stats/season/{}", year)).await
    }

    async fn records(&self, year: i32) -> Option<RecordsResponse> {
        self.get(&format!("/records?year={}", year)).await
    }

    async fn available_years(&self) -> Option<Vec<i32>> {
        self.get_list("/years").await
    }

    async fn driver_stats(&self, driver: DriverNumber) -> Option<DriverStats> {
        self.get(&format!("/drivers/{}/stats", driver)).await
    }

    async fn status(&self) -> Option<ApiStatusResponse> {
        self.get("/status").await
    }
}

/// Decode a JSON array element by element.
///
/// Elements that do not decode (typically because their identifier cannot be
/// normalized) are dropped with a warning so one bad record does not blank a
/// whole collection.
pub(crate) fn decode_list<T: DeserializeOwned>(
    endpoint: &str,
    value: Value,
) -> Result<Vec<T>, PaddockError> {
    let elements: Vec<Value> =
        serde_json::from_value(value).map_err(|e| PaddockError::ResponseDecode {
            endpoint: endpoint.to_string(),
            source: e,
        })?;

    Ok(elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, element)| match serde_json::from_value(element) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Dropping element {} of {}: {}", index, endpoint, e);
                None
            }
        })
        .collect())
}

/// Collapse a request outcome into the client's `Option` contract, logging
/// whatever went wrong.
fn settle_response<T>(endpoint: &str, result: Result<T, PaddockError>) -> Option<T> {
    match result {
        Ok(payload) => Some(payload),
        Err(e @ PaddockError::HttpStatus { .. }) => {
            warn!("API error: {}", e);
            None
        }
        Err(e) => {
            match e.source() {
                Some(cause) => error!("Network or parsing error for {}: {}: {}", endpoint, e, cause),
                None => error!("Network or parsing error for {}: {}", endpoint, e),
            }
            None
        }
    }
}
