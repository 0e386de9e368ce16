use serde_json::{Map, Value};

/// Key under which the API envelope carries its records.
pub const ENVELOPE_KEY: &str = "data";
const SUCCESS_KEY: &str = "success";

const ID_KEYS: [&str; 2] = ["_id", "id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ShapeKind {
    Envelope,
    NestedId,
    Flat,
}

/// How numeric fields are encoded in a given shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericStyle {
    /// JSON numbers, possibly with the odd string.
    Native,
    /// Every number is a string; bearing and speed are integers.
    Textual,
}

/// One record of the raw input, before any coercion.
#[derive(Debug, Clone, Copy)]
pub struct CandidateRecord<'a> {
    pub fields: &'a Map<String, Value>,
    pub numeric: NumericStyle,
}

impl<'a> CandidateRecord<'a> {
    /// First present value among `keys`.
    pub fn field(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .find_map(|k| self.fields.get(*k).filter(|v| !v.is_null()))
    }

    pub fn id(&self) -> Option<&'a Value> {
        self.field(&ID_KEYS)
    }
}

#[derive(Debug)]
pub enum RawShape<'a> {
    Envelope {
        success: bool,
        records: Vec<CandidateRecord<'a>>,
    },
    NestedId(Vec<CandidateRecord<'a>>),
    Flat(Vec<CandidateRecord<'a>>),
}

impl<'a> RawShape<'a> {
    pub fn kind(&self) -> ShapeKind {
        match self {
            RawShape::Envelope { .. } => ShapeKind::Envelope,
            RawShape::NestedId(_) => ShapeKind::NestedId,
            RawShape::Flat(_) => ShapeKind::Flat,
        }
    }

    /// `false` only for an envelope that reports failure.
    pub fn succeeded(&self) -> bool {
        match self {
            RawShape::Envelope { success, .. } => *success,
            _ => true,
        }
    }

    pub fn into_records(self) -> Vec<CandidateRecord<'a>> {
        match self {
            RawShape::Envelope { records, .. } => records,
            RawShape::NestedId(records) | RawShape::Flat(records) => records,
        }
    }
}

pub struct ShapeDetector {
    pub kind: ShapeKind,
    pub matches: fn(&Value) -> bool,
    pub extract: for<'a> fn(&'a Value) -> RawShape<'a>,
}

/// Checked in order; the first match wins.
pub const DETECTORS: [ShapeDetector; 3] = [
    ShapeDetector {
        kind: ShapeKind::Envelope,
        matches: is_envelope,
        extract: extract_envelope,
    },
    ShapeDetector {
        kind: ShapeKind::NestedId,
        matches: is_nested_id,
        extract: extract_nested_id,
    },
    ShapeDetector {
        kind: ShapeKind::Flat,
        matches: Value::is_array,
        extract: extract_flat,
    },
];

/// Resolves the input shape, or `None` when no detector accepts it.
pub fn detect(raw: &Value) -> Option<RawShape<'_>> {
    DETECTORS
        .iter()
        .find(|d| (d.matches)(raw))
        .map(|d| (d.extract)(raw))
}

/// Any API response object, including failures that carry no `data`.
fn is_envelope(raw: &Value) -> bool {
    raw.as_object()
        .is_some_and(|obj| obj.contains_key(ENVELOPE_KEY) || obj.contains_key(SUCCESS_KEY))
}

fn is_nested_id(raw: &Value) -> bool {
    raw.as_array().is_some_and(|items| {
        items.iter().any(|item| {
            ID_KEYS
                .iter()
                .any(|k| item.get(*k).is_some_and(Value::is_object))
        })
    })
}

fn extract_envelope(raw: &Value) -> RawShape<'_> {
    let success = raw
        .get(SUCCESS_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let records = raw
        .get(ENVELOPE_KEY)
        .and_then(Value::as_array)
        .map(|items| candidates(items, NumericStyle::Textual))
        .unwrap_or_default();
    RawShape::Envelope { success, records }
}

fn extract_nested_id(raw: &Value) -> RawShape<'_> {
    RawShape::NestedId(array_candidates(raw))
}

fn extract_flat(raw: &Value) -> RawShape<'_> {
    RawShape::Flat(array_candidates(raw))
}

fn array_candidates(raw: &Value) -> Vec<CandidateRecord<'_>> {
    raw.as_array()
        .map(|items| candidates(items, NumericStyle::Native))
        .unwrap_or_default()
}

fn candidates(items: &[Value], numeric: NumericStyle) -> Vec<CandidateRecord<'_>> {
    items
        .iter()
        .filter_map(|item| match item.as_object() {
            Some(fields) => Some(CandidateRecord { fields, numeric }),
            None => {
                log::debug!("Skipping non-object track record: {}", item);
                None
            }
        })
        .collect()
}
