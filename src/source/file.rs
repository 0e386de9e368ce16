use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::error::SourceError;
use super::trip::{parse_trip_metadata, TripMetadata};
use super::{TrackQuery, TrackSource};

/// Reads track payloads and trip envelopes from disk.
///
/// The query is not used to narrow the read: the whole file is returned and
/// filtering is left to the normalization pipeline.
#[derive(Debug, Clone)]
pub struct FileSource {
    track_file: PathBuf,
    trip_dir: PathBuf,
}

impl FileSource {
    pub fn new(track_file: PathBuf, trip_dir: PathBuf) -> Self {
        Self {
            track_file,
            trip_dir,
        }
    }

    pub fn track_file(&self) -> &Path {
        &self.track_file
    }

    fn trip_path(&self, trip_id: &str) -> Result<PathBuf, SourceError> {
        let valid = !trip_id.is_empty()
            && trip_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SourceError::Trip(format!("invalid trip id: {}", trip_id)));
        }
        Ok(self.trip_dir.join(format!("{}.json", trip_id)))
    }
}

async fn read_json(path: &Path) -> Result<Value, SourceError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

#[async_trait]
impl TrackSource for FileSource {
    async fn fetch_raw_track(&self, query: &TrackQuery) -> Result<Value, SourceError> {
        log::info!(
            "Reading track for {} ({} .. {}) from {}",
            query.imei,
            query.start_date,
            query.end_date,
            self.track_file.display()
        );
        read_json(&self.track_file).await
    }

    async fn fetch_trip_metadata(&self, trip_id: &str) -> Result<TripMetadata, SourceError> {
        let path = self.trip_path(trip_id)?;
        let raw = read_json(&path).await?;
        parse_trip_metadata(&raw)
    }
}
