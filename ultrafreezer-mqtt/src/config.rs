use std::str::FromStr;
use std::time::Duration;

use crate::connection::ConnectionBuilder;
use crate::utils::random_client_id;

pub static DEFAULT_MQTT_HOST: &str = "localhost";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub static DEFAULT_MQTT_TOPIC: &str = "ultrafreezer/readings";
const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;
const MIN_KEEP_ALIVE_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("{0} still holds a placeholder value")]
    Placeholder(&'static str),
}

/// Where the broker is and how to identify ourselves to it.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    /// Unique per connecting process.
    pub client_id: String,
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
}

impl BrokerConfig {
    /// Read the broker settings from the process environment.
    ///
    /// When `MQTT_CLIENT_ID` is not set, a random id prefixed with `component` is generated.
    pub fn from_env(component: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(component, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(component: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let topic = optional(&lookup, "MQTT_TOPIC", DEFAULT_MQTT_TOPIC);
        if topic.is_empty() {
            return Err(ConfigError::Invalid {
                key: "MQTT_TOPIC",
                reason: "the topic must not be empty".to_owned(),
            });
        }

        let credentials = lookup("MQTT_USERNAME").map(|username| {
            let password = lookup("MQTT_PASSWORD").unwrap_or_default();
            (username, password)
        });

        let keep_alive = parse(&lookup, "MQTT_KEEP_ALIVE_SECS", DEFAULT_KEEP_ALIVE_SECS)?;
        if keep_alive < MIN_KEEP_ALIVE_SECS {
            return Err(ConfigError::Invalid {
                key: "MQTT_KEEP_ALIVE_SECS",
                reason: format!("must be at least {} seconds", MIN_KEEP_ALIVE_SECS),
            });
        }

        Ok(Self {
            host: optional(&lookup, "MQTT_HOST", DEFAULT_MQTT_HOST),
            port: parse(&lookup, "MQTT_PORT", DEFAULT_MQTT_PORT)?,
            topic,
            client_id: lookup("MQTT_CLIENT_ID").unwrap_or_else(|| random_client_id(component)),
            credentials,
            keep_alive: Duration::from_secs(keep_alive),
        })
    }

    pub fn connection_builder(&self) -> ConnectionBuilder {
        let mut builder = ConnectionBuilder::new(self.host.clone(), self.port)
            .with_client_id(self.client_id.clone())
            .with_keep_alive(self.keep_alive);

        if let Some((username, password)) = &self.credentials {
            builder = builder.with_credentials(username.clone(), password.clone());
        }

        builder
    }
}

/// Look up `key`, falling back to `default` when unset.
pub fn optional<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| default.to_owned())
}

/// Look up and parse `key`, falling back to `default` when unset.
pub fn parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            reason: format!("{:?}: {}", raw, err),
        }),
    }
}
