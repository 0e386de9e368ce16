use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::sync::Arc;

/// One normalized telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: String,
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub bearing: f64,
    pub timestamp: DateTime<Utc>,
    /// km/h; `None` means the device reported nothing.
    pub speed: Option<f64>,
    /// Percent of tank.
    pub fuel_level: Option<f64>,
    pub ignition: Option<bool>,
}

/// Device- and time-filtered samples for one playback session, in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSequence {
    device_id: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    samples: Arc<Vec<Sample>>,
}

impl SampleSequence {
    pub fn new(
        device_id: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        samples: Vec<Sample>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            start,
            end,
            samples: Arc::new(samples),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Requested window start (inclusive).
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Requested window end (inclusive).
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }
}

impl Index<usize> for SampleSequence {
    type Output = Sample;

    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl<'a> IntoIterator for &'a SampleSequence {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
