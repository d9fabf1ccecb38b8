//! Canonical byte form of a service record.
//!
//! The encoding covers every signable field in a fixed order and does not
//! depend on how a backend stores the row: integers are big-endian, strings
//! and byte blobs are length-prefixed, timestamps are microseconds since the
//! Unix epoch and JSON objects are written with their keys sorted.

use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use services_registry_sdk::{ConsumerId, ServiceRecord};

use super::model::StoredService;

const HEADER: &[u8] = b"cds.services.v1";

const TAG_NULL: u8 = 0;
const TAG_FALSE: u8 = 1;
const TAG_TRUE: u8 = 2;
const TAG_NUMBER: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_ARRAY: u8 = 5;
const TAG_OBJECT: u8 = 6;

/// Borrowed view over the signable fields of a record.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalRecord<'a> {
    pub id: i64,
    pub name: &'a str,
    pub service_type: &'a str,
    pub consumer_id: Option<&'a ConsumerId>,
    pub last_heartbeat: DateTime<Utc>,
    pub payload: &'a Value,
}

impl<'a> From<&'a StoredService> for CanonicalRecord<'a> {
    fn from(s: &'a StoredService) -> Self {
        Self {
            id: s.id,
            name: &s.name,
            service_type: &s.service_type,
            consumer_id: s.consumer_id.as_ref(),
            last_heartbeat: s.last_heartbeat,
            payload: &s.payload,
        }
    }
}

impl<'a> From<&'a ServiceRecord> for CanonicalRecord<'a> {
    fn from(r: &'a ServiceRecord) -> Self {
        Self {
            id: r.id,
            name: &r.name,
            service_type: &r.service_type,
            consumer_id: r.consumer_id.as_ref(),
            last_heartbeat: r.last_heartbeat,
            payload: &r.payload,
        }
    }
}

impl CanonicalRecord<'_> {
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        write_bytes(&mut out, HEADER);
        out.extend_from_slice(&self.id.to_be_bytes());
        write_bytes(&mut out, self.name.as_bytes());
        write_bytes(&mut out, self.service_type.as_bytes());
        match self.consumer_id {
            Some(consumer) => {
                out.push(1);
                write_bytes(&mut out, consumer.as_str().as_bytes());
            }
            None => out.push(0),
        }
        out.extend_from_slice(&self.last_heartbeat.timestamp_micros().to_be_bytes());
        write_value(&mut out, self.payload);
        out
    }
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    // Lengths beyond u32 cannot come out of any supported backend.
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_be_bytes());
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(false) => out.push(TAG_FALSE),
        Value::Bool(true) => out.push(TAG_TRUE),
        Value::Number(n) => {
            out.push(TAG_NUMBER);
            write_bytes(out, number_text(n).as_bytes());
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            write_bytes(out, s.as_bytes());
        }
        Value::Array(items) => {
            out.push(TAG_ARRAY);
            write_len(out, items.len());
            for item in items {
                write_value(out, item);
            }
        }
        Value::Object(map) => {
            out.push(TAG_OBJECT);
            write_len(out, map.len());
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
            for (key, item) in entries {
                write_bytes(out, key.as_bytes());
                write_value(out, item);
            }
        }
    }
}

// Numeric JSON columns have no negative zero; `-0.0` comes back as `0.0`.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.to_bits() == (-0.0_f64).to_bits() => "0.0".to_owned(),
        _ => n.to_string(),
    }
}
