use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::error::SourceError;
use crate::track::coerce::coerce_text;

/// Pre-fill data for a trip selected through routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripMetadata {
    pub device_id: String,
    pub expected_start: DateTime<Utc>,
    pub expected_end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TripEnvelope {
    #[serde(default)]
    success: bool,
    data: Option<TripData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripData {
    vehicle_details: VehicleDetails,
    trip_details: TripDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VehicleDetails {
    vehicle_number: VehicleNumber,
}

#[derive(Debug, Deserialize)]
struct VehicleNumber {
    device: Device,
}

#[derive(Debug, Deserialize)]
struct Device {
    imei: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripDetails {
    trip_expected_start_date: i64,
    trip_expected_end_date: i64,
}

pub fn parse_trip_metadata(raw: &Value) -> Result<TripMetadata, SourceError> {
    let envelope = TripEnvelope::deserialize(raw)?;
    let data = match envelope.data {
        Some(data) if envelope.success => data,
        _ => return Err(SourceError::Trip("Failed to fetch trip data".into())),
    };

    let device_id = coerce_text(&data.vehicle_details.vehicle_number.device.imei)
        .ok_or_else(|| SourceError::Trip("trip has no device imei".into()))?;
    let expected_start = millis(data.trip_details.trip_expected_start_date)?;
    let expected_end = millis(data.trip_details.trip_expected_end_date)?;

    Ok(TripMetadata {
        device_id,
        expected_start,
        expected_end,
    })
}

fn millis(ms: i64) -> Result<DateTime<Utc>, SourceError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| SourceError::Trip(format!("invalid trip timestamp {}", ms)))
}
