use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Reads a finite float from a JSON number or numeric string.
pub fn coerce_number(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

/// Ingestion lenience: absent or malformed numbers become `fallback`.
pub fn coerce_number_or(raw: Option<&Value>, fallback: f64) -> f64 {
    raw.and_then(coerce_number).unwrap_or(fallback)
}

/// Integer reading with leading-digits semantics: `"45.7"` and `"45deg"` read as 45.
pub fn coerce_integer(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(f64::trunc),
        Value::String(s) => {
            let s = s.trim();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (-1.0, rest),
                None => (1.0, s.strip_prefix('+').unwrap_or(s)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            if end == 0 {
                return None;
            }
            digits[..end].parse::<f64>().ok().map(|v| sign * v)
        }
        _ => None,
    }
}

pub fn coerce_integer_or(raw: Option<&Value>, fallback: f64) -> f64 {
    raw.and_then(coerce_integer).unwrap_or(fallback)
}

/// RFC 3339, naive ISO-8601 (taken as UTC) or epoch milliseconds.
pub fn coerce_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

pub fn coerce_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" | "yes" => Some(true),
            "off" | "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Non-empty text from a string or number.
pub fn coerce_text(raw: &Value) -> Option<String> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Identifiers may arrive flat or wrapped, e.g. `{"$oid": "..."}`.
pub fn coerce_id(raw: &Value) -> Option<String> {
    match raw {
        Value::Object(map) => map.values().find_map(coerce_text),
        other => coerce_text(other),
    }
}
