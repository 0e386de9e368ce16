use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

const REQUEST_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const DISPLAY_FORMAT: &str = "%d %b %Y (%a) | %H:%M:%S";
const ACCEPTED_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoundaryError {
    #[error("UTC offset of {0} minutes is out of range")]
    InvalidOffset(i32),
    #[error("invalid date/time '{0}'")]
    InvalidTime(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BoundaryConfig {
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

fn default_utc_offset_minutes() -> i32 {
    330
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

/// Civil-time conversions at the request boundary.
///
/// Selections and request parameters are local civil strings in a fixed
/// offset (India Standard Time by default). Sample timestamps never pass
/// through here; they stay absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    offset: FixedOffset,
}

impl Default for Boundary {
    fn default() -> Self {
        let offset =
            FixedOffset::east_opt(default_utc_offset_minutes() * 60).unwrap_or(Utc.fix());
        Self { offset }
    }
}

impl Boundary {
    pub fn new(utc_offset_minutes: i32) -> Result<Self, BoundaryError> {
        let offset = FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60))
            .ok_or(BoundaryError::InvalidOffset(utc_offset_minutes))?;
        Ok(Self { offset })
    }

    pub fn from_config(config: &BoundaryConfig) -> Result<Self, BoundaryError> {
        Self::new(config.utc_offset_minutes)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Parses a civil date/time string as typed into the selection inputs.
    ///
    /// A trailing `Z` is ignored: the text is always read as civil time in
    /// the boundary offset.
    pub fn parse_local(&self, input: &str) -> Result<DateTime<Utc>, BoundaryError> {
        let trimmed = input.trim();
        let civil = trimmed.strip_suffix('Z').unwrap_or(trimmed);

        let naive = ACCEPTED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(civil, fmt).ok())
            .ok_or_else(|| BoundaryError::InvalidTime(input.to_string()))?;

        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| BoundaryError::InvalidTime(input.to_string()))
    }

    /// Civil string sent as `startDate`/`endDate` request parameters.
    pub fn request_param(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format(REQUEST_FORMAT)
            .to_string()
    }

    /// Civil input value for an epoch-millisecond instant (trip pre-fill).
    pub fn input_value(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format(INPUT_FORMAT)
            .to_string()
    }

    /// Date line of the telemetry readout, e.g. `18 Mar 2025 (Tue) | 15:37:58`.
    pub fn display(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format(DISPLAY_FORMAT)
            .to_string()
    }
}
