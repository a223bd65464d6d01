// Library interface for paddock
// This allows integration tests and benches to access internal modules

pub mod api;
pub mod comparison;
pub mod config;
pub mod errors;
pub mod export;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use api::{HttpResourceClient, MockResourceClient, ResourceClient};
pub use comparison::{ComparisonBuilder, LapMetric, MAX_COMPARISON_COLUMNS};
pub use config::AppConfig;
pub use errors::PaddockError;
pub use stats::{DerivedStats, SectorBests, TimedLap};
pub use store::{ApiStatus, SelectionStage, SelectionStore, StoreOptions};
