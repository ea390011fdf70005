//! ==============================================================================
//! pipeline.rs - normalize, sort and truncate the raw store document
//! ==============================================================================
//!
//! purpose:
//!     turns the JSON document returned by the remote store into the rows
//!     the dashboard shows. everything here is pure and synchronous.
//!
//! flow:
//!     raw document ──► extract_records ──► select_latest ──► DisplayState
//!                      (drop keys,          (newest first,
//!                       parse each entry)    keep `limit`)
//!
//! rejected entries are excluded, never fatal. the caller decides whether
//! an all-rejected document counts as an empty cycle.
//!
//! ==============================================================================

use crate::domain::{SensorRecord, Timestamp};
use crate::error::RecordRejection;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// naive layouts seen in device uploads and csv exports
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

/// numeric timestamps below this are epoch seconds, otherwise epoch millis
const SECONDS_CUTOFF: f64 = 1e11;

/// outcome of normalizing one store document
#[derive(Debug, Default)]
pub struct Extracted {
    pub records: Vec<SensorRecord>,
    /// store key (or array index) and the reason the entry was dropped
    pub rejections: Vec<(String, RecordRejection)>,
}

/// extract the values of the store document, discarding its keys.
///
/// objects are the normal shape. arrays show up when the store sees
/// sequential integer keys; their `null` holes are skipped.
pub fn extract_records(document: Value) -> Extracted {
    let entries: Vec<(String, Value)> = match document {
        Value::Null => Vec::new(),
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        other => vec![(String::from("<root>"), other)],
    };

    let mut out = Extracted::default();
    for (key, value) in entries {
        match parse_record(&value) {
            Ok(record) => out.records.push(record),
            Err(reason) => out.rejections.push((key, reason)),
        }
    }
    out
}

/// sort newest first and keep at most `limit` rows.
/// equal timestamps have no defined order.
pub fn select_latest(mut records: Vec<SensorRecord>, limit: usize) -> Vec<SensorRecord> {
    records.sort_by(|a, b| b.timestamp.instant().cmp(&a.timestamp.instant()));
    records.truncate(limit);
    records
}

/// parse one store entry into a typed record
pub fn parse_record(value: &Value) -> Result<SensorRecord, RecordRejection> {
    let obj = value.as_object().ok_or(RecordRejection::NotAnObject)?;

    Ok(SensorRecord {
        timestamp: parse_timestamp(obj)?,
        temperature: parse_measurement(obj, "temperature")?,
        tds: parse_measurement(obj, "tds")?,
        ph: parse_measurement(obj, "ph")?,
        orp: parse_measurement(obj, "orp")?,
    })
}

fn parse_timestamp(obj: &Map<String, Value>) -> Result<Timestamp, RecordRejection> {
    match obj.get("timestamp") {
        None | Some(Value::Null) => Err(RecordRejection::MissingField("timestamp")),
        Some(Value::String(s)) => {
            let instant = parse_instant_text(s.trim())
                .ok_or_else(|| RecordRejection::InvalidTimestamp(s.clone()))?;
            Ok(Timestamp::new(s.clone(), instant))
        }
        Some(Value::Number(n)) => {
            let instant = n
                .as_f64()
                .and_then(instant_from_epoch)
                .ok_or_else(|| RecordRejection::InvalidTimestamp(n.to_string()))?;
            Ok(Timestamp::new(n.to_string(), instant))
        }
        Some(other) => Err(RecordRejection::InvalidTimestamp(other.to_string())),
    }
}

fn parse_instant_text(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // naive wall-clock time: one device, one clock, so utc is as good as any
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<f64>().ok().and_then(instant_from_epoch);
    }

    None
}

fn instant_from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let millis = if value < SECONDS_CUTOFF {
        value * 1000.0
    } else {
        value
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// absent or `null` is a blank cell, anything non-numeric rejects the record
fn parse_measurement(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<f64>, RecordRejection> {
    let raw = match obj.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(raw) => raw,
    };

    let value = match raw {
        Value::Number(n) => n.as_f64(),
        // some firmware posts formatted strings
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match value {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(RecordRejection::InvalidField {
            field,
            reason: format!("expected a number, got {raw}"),
        }),
    }
}
