//! Time-series points derived from readings, rendered as InfluxDB line protocol.
//!
//! ```text
//! measurement,tag=value field=1.5,other=1i timestamp_s
//! ```

use std::fmt;

use ultrafreezer_mqtt::Reading;

/// Measurement all readings are written to.
pub const MEASUREMENT: &str = "freezer_readings";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}i", v),
        }
    }
}

/// The record persisted for one reading.
///
/// Derived purely from the reading's content. The same reading always yields the same point, and
/// the store keys points by measurement, tags and timestamp, so a redelivered reading overwrites
/// itself instead of adding a row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub measurement: &'static str,
    pub tags: Vec<(&'static str, String)>,
    pub fields: Vec<(&'static str, FieldValue)>,
    /// Unix time in seconds.
    pub timestamp: i64,
}

impl From<&Reading> for StoredPoint {
    fn from(reading: &Reading) -> Self {
        Self {
            measurement: MEASUREMENT,
            tags: vec![("device_id", reading.device_id.clone())],
            fields: vec![
                (
                    "freezer_temperature",
                    FieldValue::Float(reading.freezer_temperature),
                ),
                (
                    "ambient_temperature",
                    FieldValue::Float(reading.ambient_temperature),
                ),
                (
                    "power_status",
                    FieldValue::Integer(reading.power_status.into()),
                ),
            ],
            timestamp: reading.timestamp,
        }
    }
}

impl StoredPoint {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Render as a single line of line protocol with a timestamp in seconds.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape_measurement(self.measurement);

        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_string());
        }

        line.push(' ');
        line.push_str(&self.timestamp.to_string());
        line
    }
}

/// Backslashes, spaces and commas are escaped in measurement names.
fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
}

/// Backslashes, commas, equals signs and spaces are escaped in tag keys, tag values and field
/// keys. Backslashes go first so the escapes added afterwards are not doubled.
fn escape_key(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
