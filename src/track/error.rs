use thiserror::Error;

use crate::source::SourceError;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to fetch track data: {0}")]
    Fetch(#[from] SourceError),
    #[error("no track data available for device {device_id} in the selected window")]
    NoData { device_id: String },
    #[error("{0}")]
    Validation(String),
}

impl TrackError {
    /// Text shown in the single error slot of the playback view.
    pub fn user_message(&self) -> String {
        match self {
            TrackError::Fetch(_) => "Failed to fetch track data".to_string(),
            TrackError::NoData { .. } => {
                "No track data available for the selected criteria".to_string()
            }
            TrackError::Validation(msg) => msg.clone(),
        }
    }
}
