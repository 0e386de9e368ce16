use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::clock::PROGRESS_MAX;
use crate::track::{Sample, SampleSequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
pub enum PlaybackMode {
    /// No sequence loaded.
    Idle,
    Stopped,
    Playing,
}

/// Read-only view handed to presentation collaborators after every mutation.
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub samples: Option<SampleSequence>,
    pub progress: u16,
    pub current_index: Option<usize>,
    pub mode: PlaybackMode,
    pub is_playing: bool,
    pub tick_interval: Duration,
}

impl PlaybackSnapshot {
    pub fn current_sample(&self) -> Option<&Sample> {
        let samples = self.samples.as_ref()?;
        samples.get(self.current_index?)
    }

    pub fn fraction(&self) -> f64 {
        f64::from(self.progress) / f64::from(PROGRESS_MAX)
    }
}

/// User intents emitted by the controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    PlayPause,
    Reset,
    StepForward,
    StepBackward,
    SpeedIncrease,
    SpeedDecrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    pub tick_interval: Duration,
    /// Speed-up never goes below this.
    pub min_tick_interval: Duration,
    pub speed_step: Duration,
    /// Progress units moved by one step forward/backward.
    pub step_size: u16,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(20),
            min_tick_interval: Duration::from_millis(5),
            speed_step: Duration::from_millis(5),
            step_size: 10,
        }
    }
}

/// Display label for a tick interval, as shown next to the step buttons.
pub fn speed_multiplier_label(tick_interval: Duration) -> &'static str {
    match tick_interval.as_millis() {
        0..=5 => "4X",
        6..=10 => "3X",
        11..=15 => "2X",
        _ => "1X",
    }
}
