use thiserror::Error;

/// Failures inside the timer callback. Never returned to callers; a failing
/// tick stops playback instead.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("tick with no samples loaded")]
    NoSamples,
    #[error("no tokio runtime available to drive the playback timer")]
    NoRuntime,
}
