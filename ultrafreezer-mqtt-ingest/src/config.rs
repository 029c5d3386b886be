use std::time::Duration;

use ultrafreezer_mqtt::config::{optional, parse};
use ultrafreezer_mqtt::{BrokerConfig, ConfigError, RetryPolicy, DEFAULT_MESSAGE_BUFFER};

pub static DEFAULT_INFLUXDB_URL: &str = "http://localhost:8086";
pub static DEFAULT_INFLUXDB_ORG: &str = "ultrafreezer";
pub static DEFAULT_INFLUXDB_BUCKET: &str = "iot_bucket";
const DEFAULT_INFLUXDB_TIMEOUT_SECS: u64 = 10;

/// Token values shipped in sample configurations. Matched case-insensitively as substrings.
const PLACEHOLDER_TOKENS: &[&str] = &[
    "cole_seu_token_aqui",
    "changeme",
    "change-me",
    "<token>",
    "your-token",
    "your_token",
    "placeholder",
];

/// Connection settings for the InfluxDB v2 store.
#[derive(Clone)]
pub struct StoreConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Applied to every request to the store.
    pub timeout: Duration,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub broker: BrokerConfig,
    pub store: StoreConfig,
    pub retry: RetryPolicy,
    /// Messages buffered between the broker and the store writer.
    pub queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration, rejecting a missing or placeholder store token before anything
    /// touches the network.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("INFLUXDB_TOKEN").ok_or(ConfigError::Missing("INFLUXDB_TOKEN"))?;
        if is_placeholder_token(&token) {
            return Err(ConfigError::Placeholder("INFLUXDB_TOKEN"));
        }

        let store = StoreConfig {
            url: optional(&lookup, "INFLUXDB_URL", DEFAULT_INFLUXDB_URL),
            token,
            org: optional(&lookup, "INFLUXDB_ORG", DEFAULT_INFLUXDB_ORG),
            bucket: optional(&lookup, "INFLUXDB_BUCKET", DEFAULT_INFLUXDB_BUCKET),
            timeout: Duration::from_secs(parse(
                &lookup,
                "INFLUXDB_TIMEOUT_SECS",
                DEFAULT_INFLUXDB_TIMEOUT_SECS,
            )?),
        };
        if !store.url.starts_with("http://") && !store.url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "INFLUXDB_URL",
                reason: format!("{:?} is not an http(s) URL", store.url),
            });
        }

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            initial: Duration::from_secs(parse(
                &lookup,
                "RETRY_INITIAL_SECS",
                defaults.initial.as_secs(),
            )?),
            max: Duration::from_secs(parse(&lookup, "RETRY_MAX_SECS", defaults.max.as_secs())?),
            multiplier: defaults.multiplier,
            jitter: parse(&lookup, "RETRY_JITTER", defaults.jitter)?,
        };
        if !(0.0..=1.0).contains(&retry.jitter) {
            return Err(ConfigError::Invalid {
                key: "RETRY_JITTER",
                reason: "must be between 0 and 1".to_owned(),
            });
        }
        if retry.max < retry.initial {
            return Err(ConfigError::Invalid {
                key: "RETRY_MAX_SECS",
                reason: "must not be smaller than RETRY_INITIAL_SECS".to_owned(),
            });
        }

        let queue_capacity = parse(&lookup, "INGEST_QUEUE_CAPACITY", DEFAULT_MESSAGE_BUFFER)?;
        if queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "INGEST_QUEUE_CAPACITY",
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            broker: BrokerConfig::from_lookup("ultrafreezer-ingest", &lookup)?,
            store,
            retry,
            queue_capacity,
        })
    }
}

fn is_placeholder_token(token: &str) -> bool {
    let token = token.trim().to_lowercase();
    token.is_empty() || PLACEHOLDER_TOKENS.iter().any(|p| token.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(
            from(&[]),
            Err(ConfigError::Missing("INFLUXDB_TOKEN"))
        ));
    }

    #[test]
    fn placeholder_tokens_are_fatal() {
        for token in ["", "  ", "cole_seu_token_aqui", "CHANGEME", "<token>"] {
            assert!(
                matches!(
                    from(&[("INFLUXDB_TOKEN", token)]),
                    Err(ConfigError::Placeholder("INFLUXDB_TOKEN"))
                ),
                "token {:?} should be rejected",
                token
            );
        }
    }

    #[test]
    fn defaults_with_real_token() {
        let config = from(&[("INFLUXDB_TOKEN", "s3cr3t-t0ken")]).unwrap();
        assert_eq!(config.store.url, DEFAULT_INFLUXDB_URL);
        assert_eq!(config.store.token, "s3cr3t-t0ken");
        assert_eq!(config.store.org, DEFAULT_INFLUXDB_ORG);
        assert_eq!(config.store.bucket, DEFAULT_INFLUXDB_BUCKET);
        assert_eq!(config.store.timeout, Duration::from_secs(10));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.queue_capacity, DEFAULT_MESSAGE_BUFFER);
        assert!(config.broker.client_id.starts_with("ultrafreezer-ingest-"));
    }

    #[test]
    fn token_is_not_printed() {
        let config = from(&[("INFLUXDB_TOKEN", "s3cr3t-t0ken")]).unwrap();
        assert!(!format!("{:?}", config).contains("s3cr3t-t0ken"));
    }

    #[test]
    fn retry_settings_are_read() {
        let config = from(&[
            ("INFLUXDB_TOKEN", "s3cr3t-t0ken"),
            ("RETRY_INITIAL_SECS", "2"),
            ("RETRY_MAX_SECS", "30"),
            ("RETRY_JITTER", "0"),
        ])
        .unwrap();
        assert_eq!(config.retry.initial, Duration::from_secs(2));
        assert_eq!(config.retry.max, Duration::from_secs(30));
        assert_eq!(config.retry.jitter, 0.0);
    }

    #[test]
    fn out_of_range_jitter_is_rejected() {
        let err = from(&[("INFLUXDB_TOKEN", "s3cr3t-t0ken"), ("RETRY_JITTER", "1.5")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RETRY_JITTER", .. }));
    }

    #[test]
    fn non_http_url_is_rejected() {
        let err = from(&[
            ("INFLUXDB_TOKEN", "s3cr3t-t0ken"),
            ("INFLUXDB_URL", "influxdb:8086"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "INFLUXDB_URL", .. }));
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let err = from(&[
            ("INFLUXDB_TOKEN", "s3cr3t-t0ken"),
            ("INGEST_QUEUE_CAPACITY", "0"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "INGEST_QUEUE_CAPACITY",
                ..
            }
        ));
    }
}
