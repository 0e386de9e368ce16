mod clock;
mod controller;
mod error;
mod types;

pub use clock::{sample_index, PlaybackClock, TickOutcome, PROGRESS_MAX};
pub use controller::PlaybackController;
pub use error::PlaybackError;
pub use types::{speed_multiplier_label, Intent, PlaybackMode, PlaybackSettings, PlaybackSnapshot};
