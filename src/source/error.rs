use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognised track payload")]
    UnrecognisedShape,
    #[error("trip lookup failed: {0}")]
    Trip(String),
}
