use std::time::Duration;

use ultrafreezer_mqtt::config::{optional, parse};
use ultrafreezer_mqtt::{BrokerConfig, ConfigError};

pub static DEFAULT_DEVICE_ID: &str = "ultrafreezer_01";
const DEFAULT_PUBLISH_INTERVAL_SECS: u64 = 10;
const DEFAULT_ERROR_BACKOFF_SECS: u64 = 15;
const DEFAULT_STARTUP_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub broker: BrokerConfig,
    pub device_id: String,
    /// Pause between two published readings.
    pub publish_interval: Duration,
    /// Pause after an unexpected failure inside the publish loop.
    pub error_backoff: Duration,
    /// Pause before the single connection attempt, giving the network time to come up.
    pub startup_delay: Duration,
}

impl SimulatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let device_id = optional(&lookup, "DEVICE_ID", DEFAULT_DEVICE_ID);
        if device_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "DEVICE_ID",
                reason: "the device id must not be empty".to_owned(),
            });
        }

        Ok(Self {
            broker: BrokerConfig::from_lookup("ultrafreezer-simulator", &lookup)?,
            device_id,
            publish_interval: secs(&lookup, "PUBLISH_INTERVAL_SECS", DEFAULT_PUBLISH_INTERVAL_SECS)?,
            error_backoff: secs(&lookup, "ERROR_BACKOFF_SECS", DEFAULT_ERROR_BACKOFF_SECS)?,
            startup_delay: secs(&lookup, "STARTUP_DELAY_SECS", DEFAULT_STARTUP_DELAY_SECS)?,
        })
    }
}

fn secs<F>(lookup: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse(lookup, key, default).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SimulatorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.device_id, DEFAULT_DEVICE_ID);
        assert_eq!(config.publish_interval, Duration::from_secs(10));
        assert_eq!(config.error_backoff, Duration::from_secs(15));
        assert_eq!(config.startup_delay, Duration::from_secs(5));
        assert!(config.broker.client_id.starts_with("ultrafreezer-simulator-"));
    }

    #[test]
    fn overrides() {
        let config = SimulatorConfig::from_lookup(|key| match key {
            "DEVICE_ID" => Some("ultrafreezer_09".to_owned()),
            "PUBLISH_INTERVAL_SECS" => Some("2".to_owned()),
            "STARTUP_DELAY_SECS" => Some("0".to_owned()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.device_id, "ultrafreezer_09");
        assert_eq!(config.publish_interval, Duration::from_secs(2));
        assert_eq!(config.startup_delay, Duration::ZERO);
    }

    #[test]
    fn empty_device_id_is_rejected() {
        let err = SimulatorConfig::from_lookup(|key| match key {
            "DEVICE_ID" => Some(" ".to_owned()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DEVICE_ID", .. }));
    }

    #[test]
    fn unparseable_interval_is_rejected() {
        let err = SimulatorConfig::from_lookup(|key| match key {
            "PUBLISH_INTERVAL_SECS" => Some("ten".to_owned()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "PUBLISH_INTERVAL_SECS",
                ..
            }
        ));
    }
}
