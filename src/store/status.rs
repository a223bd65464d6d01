use std::{fmt, sync::Arc, time::Duration};

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

use super::StoreEvent;
use crate::api::{ApiStatusResponse, ResourceClient};

pub const DEFAULT_STATUS_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Reachability of the timing API as last observed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiStatus {
    /// No probe has completed yet
    #[default]
    Checking,
    Connected,
    Offline,
}

impl ApiStatus {
    pub fn from_response(response: Option<&ApiStatusResponse>) -> Self {
        match response {
            Some(response) if response.is_ok() => ApiStatus::Connected,
            _ => ApiStatus::Offline,
        }
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiStatus::Checking => write!(f, "checking"),
            ApiStatus::Connected => write!(f, "Connected"),
            ApiStatus::Offline => write!(f, "Offline"),
        }
    }
}

/// Probe the API once.
pub async fn probe(client: &dyn ResourceClient) -> ApiStatus {
    ApiStatus::from_response(client.status().await.as_ref())
}

/// Background task that probes the API on a fixed interval and reports each
/// result to the store. The task stops when the poller is dropped.
pub struct StatusPoller {
    handle: JoinHandle<()>,
}

impl StatusPoller {
    pub(crate) fn spawn(
        client: Arc<dyn ResourceClient>,
        events: UnboundedSender<StoreEvent>,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = probe(client.as_ref()).await;
                if events.send(StoreEvent::Status(status)).is_err() {
                    debug!("Store is gone, stopping status polling");
                    break;
                }
            }
        });
        Self { handle }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
