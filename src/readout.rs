use serde::Serialize;
use std::fmt;

use crate::boundary::Boundary;
use crate::playback::{speed_multiplier_label, PlaybackSnapshot};
use crate::track::{PathGeometry, SampleSequence};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "kmh", rename_all = "snake_case")]
pub enum SpeedReading {
    Measured(f64),
    /// The sample carried no speed.
    Unknown,
}

impl fmt::Display for SpeedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeedReading::Measured(kmh) => write!(f, "{:.0} km/h", kmh),
            SpeedReading::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FuelSummary {
    pub start: Option<f64>,
    pub end: Option<f64>,
    /// Drop between first and last known level; refuelling reads as zero.
    pub used: Option<f64>,
}

impl FuelSummary {
    pub fn from_samples(samples: &SampleSequence) -> Self {
        let start = samples.iter().find_map(|s| s.fuel_level);
        let end = samples.iter().rev().find_map(|s| s.fuel_level);
        let used = match (start, end) {
            (Some(start), Some(end)) => Some((start - end).max(0.0)),
            _ => None,
        };
        Self { start, end, used }
    }
}

/// Values shown by the info panel for the current playback position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readout {
    pub date_line: String,
    pub device_id: String,
    pub speed: SpeedReading,
    pub ignition: Option<bool>,
    pub fuel: FuelSummary,
    pub total_distance_m: f64,
    pub travelled_m: f64,
    pub speed_label: &'static str,
    pub progress: u16,
}

impl Readout {
    /// `None` until a sequence with a current sample is loaded.
    pub fn from_snapshot(snapshot: &PlaybackSnapshot, boundary: &Boundary) -> Option<Self> {
        let samples = snapshot.samples.as_ref()?;
        let sample = snapshot.current_sample()?;
        let path = PathGeometry::new(samples);
        let total_distance_m = path.total_length_m();

        Some(Self {
            date_line: boundary.display(sample.timestamp),
            device_id: sample.device_id.clone(),
            speed: sample
                .speed
                .map_or(SpeedReading::Unknown, SpeedReading::Measured),
            ignition: sample.ignition,
            fuel: FuelSummary::from_samples(samples),
            total_distance_m,
            travelled_m: total_distance_m * snapshot.fraction(),
            speed_label: speed_multiplier_label(snapshot.tick_interval),
            progress: snapshot.progress,
        })
    }
}

impl fmt::Display for Readout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ignition = match self.ignition {
            Some(true) => "on",
            Some(false) => "off",
            None => "-",
        };
        write!(
            f,
            "{} | {} | speed {} | ignition {} | {:.2}/{:.2} km | {}",
            self.date_line,
            self.device_id,
            self.speed,
            ignition,
            self.travelled_m / 1000.0,
            self.total_distance_m / 1000.0,
            self.speed_label
        )
    }
}
