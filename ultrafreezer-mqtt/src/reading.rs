use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::Error;

/// Whether the freezer compressor had power when the reading was taken.
///
/// On the wire this is the integer `1` (on) or `0` (off).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PowerStatus {
    Off,
    On,
}

#[derive(Debug, thiserror::Error)]
#[error("power status must be 0 or 1, got {0}")]
pub struct InvalidPowerStatus(pub u8);

impl TryFrom<u8> for PowerStatus {
    type Error = InvalidPowerStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PowerStatus::Off),
            1 => Ok(PowerStatus::On),
            other => Err(InvalidPowerStatus(other)),
        }
    }
}

impl From<PowerStatus> for u8 {
    fn from(status: PowerStatus) -> u8 {
        match status {
            PowerStatus::Off => 0,
            PowerStatus::On => 1,
        }
    }
}

impl From<PowerStatus> for i64 {
    fn from(status: PowerStatus) -> i64 {
        u8::from(status).into()
    }
}

/// One observation of an ultrafreezer, published as a JSON document.
///
/// Readings are immutable facts: they carry no identity beyond their content, so delivering the
/// same reading twice describes the same observation twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "dispositivo_id")]
    pub device_id: String,
    /// Unix time in whole seconds.
    #[serde(rename = "timestamp_utc")]
    pub timestamp: i64,
    #[serde(rename = "temperatura_freezer")]
    pub freezer_temperature: f64,
    #[serde(rename = "temperatura_ambiente")]
    pub ambient_temperature: f64,
    #[serde(rename = "status_energia")]
    pub power_status: PowerStatus,
}

impl Reading {
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(Error::Encode)
    }

    /// Decode a wire payload. All five keys are required.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let reading: Reading = serde_json::from_slice(payload).map_err(Error::Decode)?;
        if reading.device_id.is_empty() {
            return Err(Error::MalformedMessage("empty device id"));
        }
        if reading.device_id.chars().any(char::is_control) {
            return Err(Error::MalformedMessage("control character in device id"));
        }
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIRE: &str = r#"{"dispositivo_id":"ultrafreezer_01","timestamp_utc":1700000000,"temperatura_freezer":-75.5,"temperatura_ambiente":21.3,"status_energia":1}"#;

    #[test]
    fn decodes_wire_message() {
        let reading = Reading::decode(WIRE.as_bytes()).unwrap();
        assert_eq!(reading.device_id, "ultrafreezer_01");
        assert_eq!(reading.timestamp, 1_700_000_000);
        assert_eq!(reading.freezer_temperature, -75.5);
        assert_eq!(reading.ambient_temperature, 21.3);
        assert_eq!(reading.power_status, PowerStatus::On);
    }

    #[test]
    fn encode_then_decode_preserves_fields() {
        let reading = Reading {
            device_id: "ultrafreezer_02".to_owned(),
            timestamp: 1_712_345_678,
            freezer_temperature: -12.34,
            ambient_temperature: 24.99,
            power_status: PowerStatus::Off,
        };

        let decoded = Reading::decode(&reading.encode().unwrap()).unwrap();
        assert_eq!(decoded.device_id, reading.device_id);
        assert_eq!(decoded.timestamp, reading.timestamp);
        assert_eq!(decoded.power_status, reading.power_status);
        assert!((decoded.freezer_temperature - reading.freezer_temperature).abs() < 1e-9);
        assert!((decoded.ambient_temperature - reading.ambient_temperature).abs() < 1e-9);
    }

    #[test]
    fn encodes_wire_key_names() {
        let reading = Reading::decode(WIRE.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&reading.encode().unwrap()).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "dispositivo_id",
                "status_energia",
                "temperatura_ambiente",
                "temperatura_freezer",
                "timestamp_utc"
            ]
        );
        assert_eq!(object["status_energia"], serde_json::json!(1));
    }

    #[test]
    fn missing_key_is_malformed() {
        let err = Reading::decode(
            br#"{"dispositivo_id":"ultrafreezer_01","timestamp_utc":1700000000,"temperatura_ambiente":21.3,"status_energia":1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert!(err.is_malformed());
    }

    #[test]
    fn non_numeric_temperature_is_malformed() {
        let err = Reading::decode(
            br#"{"dispositivo_id":"ultrafreezer_01","timestamp_utc":1700000000,"temperatura_freezer":"cold","temperatura_ambiente":21.3,"status_energia":1}"#,
        )
        .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn unknown_power_status_is_malformed() {
        let err = Reading::decode(
            br#"{"dispositivo_id":"ultrafreezer_01","timestamp_utc":1700000000,"temperatura_freezer":-70.0,"temperatura_ambiente":21.3,"status_energia":2}"#,
        )
        .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn empty_device_id_is_malformed() {
        let err = Reading::decode(
            br#"{"dispositivo_id":"","timestamp_utc":1700000000,"temperatura_freezer":-70.0,"temperatura_ambiente":21.3,"status_energia":0}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedMessage(_)));
    }

    #[test]
    fn control_characters_in_device_id_are_malformed() {
        for device_id in [r"x\nforged,device_id=evil", r"tab\there", r"nul\u0000"] {
            let payload = format!(
                r#"{{"dispositivo_id":"{}","timestamp_utc":1700000000,"temperatura_freezer":-70.0,"temperatura_ambiente":21.3,"status_energia":1}}"#,
                device_id
            );
            let err = Reading::decode(payload.as_bytes()).unwrap_err();
            assert!(
                matches!(err, Error::MalformedMessage(_)),
                "device id {} should be rejected",
                device_id
            );
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(Reading::decode(b"\xff\x00not json").unwrap_err().is_malformed());
    }
}
