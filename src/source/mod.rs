mod error;
mod file;
mod trip;

pub use error::SourceError;
pub use file::FileSource;
pub use trip::{parse_trip_metadata, TripMetadata};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Request parameters as they cross the fetch boundary (civil time strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackQuery {
    pub imei: String,
    pub start_date: String,
    pub end_date: String,
}

/// Supplier of raw track payloads and trip metadata.
///
/// Implementations may talk to a remote API or read local files; the
/// normalization pipeline only ever sees the returned JSON.
#[async_trait]
pub trait TrackSource: Send + Sync {
    async fn fetch_raw_track(&self, query: &TrackQuery) -> Result<Value, SourceError>;

    async fn fetch_trip_metadata(&self, trip_id: &str) -> Result<TripMetadata, SourceError>;
}
