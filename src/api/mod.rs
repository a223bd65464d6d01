// Remote resource access for the timing API
// Typed payloads, identifier normalization and the client seam used by the
// store and the comparison builder

pub mod client;
pub mod ids;
pub mod mock;
pub mod types;

pub use client::{DEFAULT_BASE_URL, HttpResourceClient, ResourceClient};
pub use ids::{DriverNumber, MeetingKey, RecordId, SessionKey};
pub use mock::{GateKey, MockGate, MockRequest, MockResourceClient};
pub use types::{
    ApiStatusResponse, ComparisonColumnData, ComparisonLap, ComparisonRequest, Driver,
    DriverStats, FastestLapRecord, Lap, Meeting, MeetingDetails, MostWinsRecord, Position,
    RecordsResponse, SeasonChampionRecord, SeasonStats, Session, SessionDetails,
};
