use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::builtin::builtin_samples;
use super::coerce::{
    coerce_bool, coerce_id, coerce_integer, coerce_integer_or, coerce_number, coerce_number_or,
    coerce_text, coerce_timestamp,
};
use super::error::TrackError;
use super::sample::{Sample, SampleSequence};
use super::shapes::{self, CandidateRecord, NumericStyle};
use crate::source::SourceError;

const DEVICE_KEYS: [&str; 3] = ["imei", "deviceId", "device_id"];
const LATITUDE_KEYS: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_KEYS: [&str; 3] = ["longitude", "lng", "lon"];
const TIMESTAMP_KEYS: [&str; 3] = ["dateTime", "timestamp", "time"];
const ALTITUDE_KEYS: [&str; 2] = ["altitude", "alt"];
const BEARING_KEYS: [&str; 2] = ["bearing", "heading"];
const SPEED_KEYS: [&str; 1] = ["speed"];
const FUEL_KEYS: [&str; 3] = ["fuelLevel", "fuel_level", "fuel"];
const IGNITION_KEYS: [&str; 2] = ["ignition", "ign"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NormalizeOptions {
    /// Use the built-in track when no shape detector accepts the input.
    #[serde(default = "default_builtin_fallback")]
    pub builtin_fallback: bool,
}

fn default_builtin_fallback() -> bool {
    true
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            builtin_fallback: default_builtin_fallback(),
        }
    }
}

/// Converts raw telemetry into the samples of `device_id` within `[start, end]`.
pub fn normalize(
    raw: &Value,
    device_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<SampleSequence, TrackError> {
    normalize_with(raw, device_id, start, end, NormalizeOptions::default())
}

pub fn normalize_with(
    raw: &Value,
    device_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    options: NormalizeOptions,
) -> Result<SampleSequence, TrackError> {
    let no_data = || TrackError::NoData {
        device_id: device_id.to_string(),
    };

    let candidates = match shapes::detect(raw) {
        Some(shape) => {
            let kind = shape.kind();
            if !shape.succeeded() {
                log::warn!("Track source reported failure ({} shape)", kind);
                return Err(no_data());
            }
            let records = shape.into_records();
            let total = records.len();
            let samples: Vec<Sample> = records.into_iter().filter_map(to_sample).collect();
            log::debug!(
                "Parsed {} shape: {} of {} records usable",
                kind,
                samples.len(),
                total
            );
            samples
        }
        None if options.builtin_fallback => {
            log::warn!("Unrecognised track payload, falling back to built-in samples");
            builtin_samples()
        }
        None => {
            return Err(SourceError::UnrecognisedShape.into());
        }
    };

    let samples: Vec<Sample> = candidates
        .into_iter()
        .filter(|s| s.device_id == device_id && start <= s.timestamp && s.timestamp <= end)
        .collect();

    if samples.is_empty() {
        return Err(no_data());
    }

    log::info!(
        "Normalized {} samples for device {} between {} and {}",
        samples.len(),
        device_id,
        start,
        end
    );
    Ok(SampleSequence::new(device_id, start, end, samples))
}

/// Latitude, longitude and timestamp are required; everything else is repaired.
pub fn to_sample(record: CandidateRecord<'_>) -> Option<Sample> {
    let required = |keys: &[&str], name: &str| {
        let value = record.field(keys);
        if value.is_none() {
            log::debug!("Dropping record without {}", name);
        }
        value
    };

    let device_id = required(&DEVICE_KEYS, "device id").and_then(coerce_text)?;
    let latitude = required(&LATITUDE_KEYS, "latitude").and_then(coerce_number)?;
    let longitude = required(&LONGITUDE_KEYS, "longitude").and_then(coerce_number)?;
    let timestamp = required(&TIMESTAMP_KEYS, "timestamp").and_then(coerce_timestamp)?;

    let (bearing, speed) = match record.numeric {
        NumericStyle::Native => (
            coerce_number_or(record.field(&BEARING_KEYS), 0.0),
            record.field(&SPEED_KEYS).and_then(coerce_number),
        ),
        NumericStyle::Textual => (
            coerce_integer_or(record.field(&BEARING_KEYS), 0.0),
            record.field(&SPEED_KEYS).and_then(coerce_integer),
        ),
    };

    let id = record
        .id()
        .and_then(coerce_id)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Some(Sample {
        id,
        device_id,
        latitude,
        longitude,
        altitude: coerce_number_or(record.field(&ALTITUDE_KEYS), 0.0),
        bearing,
        timestamp,
        speed,
        fuel_level: record.field(&FUEL_KEYS).and_then(coerce_number),
        ignition: record.field(&IGNITION_KEYS).and_then(coerce_bool),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::builtin::BUILTIN_DEVICE;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 18, h, m, 0).unwrap()
    }

    fn record(id: &str, imei: &str, h: u32, m: u32) -> Value {
        json!({
            "id": id,
            "imei": imei,
            "latitude": 12.97,
            "longitude": 77.59,
            "dateTime": at(h, m).to_rfc3339(),
        })
    }

    #[test]
    fn test_filters_by_device_and_window_in_order() {
        let raw = json!([
            record("a", "111", 9, 0),
            record("b", "111", 10, 15),
            record("c", "222", 10, 30),
            record("d", "111", 10, 45),
            record("e", "111", 11, 59),
        ]);

        let seq = normalize(&raw, "111", at(10, 0), at(11, 0)).unwrap();
        let ids: Vec<&str> = seq.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);
        assert!(seq.iter().all(|s| s.device_id == "111"));
    }

    #[test]
    fn test_window_is_inclusive() {
        let raw = json!([record("a", "111", 10, 0), record("b", "111", 11, 0)]);
        let seq = normalize(&raw, "111", at(10, 0), at(11, 0)).unwrap();
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_source_order_is_trusted() {
        let raw = json!([record("late", "111", 10, 50), record("early", "111", 10, 5)]);
        let seq = normalize(&raw, "111", at(10, 0), at(11, 0)).unwrap();
        assert_eq!(seq[0].id, "late");
        assert_eq!(seq[1].id, "early");
    }

    #[test]
    fn test_empty_window_is_no_data() {
        let raw = json!([record("a", "111", 9, 0)]);
        let err = normalize(&raw, "111", at(10, 0), at(11, 0)).unwrap_err();
        assert!(matches!(err, TrackError::NoData { .. }));
    }

    #[test]
    fn test_empty_array_does_not_fall_back() {
        let err = normalize(&json!([]), BUILTIN_DEVICE, at(0, 0), at(23, 0)).unwrap_err();
        assert!(matches!(err, TrackError::NoData { .. }));
    }

    #[test]
    fn test_bearing_string_coercion() {
        let mut good = record("a", "111", 10, 10);
        good["bearing"] = json!("45");
        let mut bad = record("b", "111", 10, 20);
        bad["bearing"] = json!("north");

        let seq = normalize(&json!([good, bad]), "111", at(10, 0), at(11, 0)).unwrap();
        assert_eq!(seq[0].bearing, 45.0);
        assert_eq!(seq[1].bearing, 0.0);
    }

    #[test]
    fn test_envelope_with_string_fields() {
        let raw = json!({
            "success": true,
            "count": 2,
            "data": [
                {
                    "_id": "e1",
                    "imei": "111",
                    "latitude": "12.9716",
                    "longitude": "77.5946",
                    "altitude": "910.5",
                    "bearing": "90.8",
                    "speed": "42",
                    "dateTime": "2025-03-18T10:10:00Z"
                },
                {
                    "_id": "e2",
                    "imei": "111",
                    "latitude": "not-a-number",
                    "longitude": "77.5946",
                    "dateTime": "2025-03-18T10:11:00Z"
                }
            ]
        });

        let seq = normalize(&raw, "111", at(10, 0), at(11, 0)).unwrap();
        assert_eq!(seq.len(), 1);
        let sample = &seq[0];
        assert_eq!(sample.latitude, 12.9716);
        assert_eq!(sample.altitude, 910.5);
        assert_eq!(sample.bearing, 90.0);
        assert_eq!(sample.speed, Some(42.0));
    }

    #[test]
    fn test_failed_envelope_is_no_data() {
        let raw = json!({"success": false, "count": 0, "data": []});
        let err = normalize(&raw, "111", at(10, 0), at(11, 0)).unwrap_err();
        assert!(matches!(err, TrackError::NoData { .. }));
    }

    #[test]
    fn test_envelope_without_data_never_falls_back() {
        let start = at(10, 0);
        let end = at(11, 0);

        let failed = json!({"success": false, "message": "upstream error"});
        let err = normalize(&failed, BUILTIN_DEVICE, start, end).unwrap_err();
        assert!(matches!(err, TrackError::NoData { .. }));

        let null_data = json!({"success": true, "count": 0, "data": null});
        let err = normalize(&null_data, BUILTIN_DEVICE, start, end).unwrap_err();
        assert!(matches!(err, TrackError::NoData { .. }));
    }

    #[test]
    fn test_nested_and_missing_ids() {
        let mut nested = record("", "111", 10, 10);
        nested["_id"] = json!({"$oid": "65f1c0"});
        nested.as_object_mut().unwrap().remove("id");
        let mut missing = record("", "111", 10, 20);
        missing.as_object_mut().unwrap().remove("id");

        let seq = normalize(&json!([nested, missing]), "111", at(10, 0), at(11, 0)).unwrap();
        assert_eq!(seq[0].id, "65f1c0");
        assert!(!seq[1].id.is_empty());
        assert!(Uuid::parse_str(&seq[1].id).is_ok());
    }

    #[test]
    fn test_unparsable_timestamp_is_dropped() {
        let mut bad = record("a", "111", 10, 10);
        bad["dateTime"] = json!("sometime");
        let raw = json!([bad, record("b", "111", 10, 20)]);
        let seq = normalize(&raw, "111", at(10, 0), at(11, 0)).unwrap();
        assert_eq!(seq.len(), 1);
        assert_eq!(seq[0].id, "b");
    }

    #[test]
    fn test_optional_fields_default() {
        let raw = json!([record("a", "111", 10, 10)]);
        let seq = normalize(&raw, "111", at(10, 0), at(11, 0)).unwrap();
        let sample = &seq[0];
        assert_eq!(sample.altitude, 0.0);
        assert_eq!(sample.bearing, 0.0);
        assert_eq!(sample.speed, None);
        assert_eq!(sample.fuel_level, None);
        assert_eq!(sample.ignition, None);
    }

    #[test]
    fn test_unrecognised_payload_uses_builtin_set() {
        let raw = json!({"unexpected": true});
        let seq = normalize(&raw, BUILTIN_DEVICE, at(10, 0), at(11, 0)).unwrap();
        assert_eq!(seq.len(), builtin_samples().len());

        let options = NormalizeOptions {
            builtin_fallback: false,
        };
        let err = normalize_with(&raw, BUILTIN_DEVICE, at(10, 0), at(11, 0), options)
            .unwrap_err();
        assert!(matches!(
            err,
            TrackError::Fetch(SourceError::UnrecognisedShape)
        ));
    }
}
