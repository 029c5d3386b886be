//! MQTT plumbing shared by the ultrafreezer simulator and the ingest service.
//!
//! The simulator publishes [Reading]s onto a single topic; the ingest service subscribes to that
//! topic and receives them through a [Subscription]. Both sides configure the broker through
//! [BrokerConfig].

pub mod config;
mod connection;
mod reading;
mod retry;
pub mod utils;

pub use config::{BrokerConfig, ConfigError};
pub use connection::{Connection, ConnectionBuilder, Message, Publish, Publisher, Subscription};
pub use reading::{InvalidPowerStatus, PowerStatus, Reading};
pub use retry::{Backoff, RetryPolicy};

pub use rumqttc::{ConnectReturnCode, QoS};

/// Number of inbound messages buffered between the broker and the consumer.
pub const DEFAULT_MESSAGE_BUFFER: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not reach the MQTT broker: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("the MQTT broker refused the connection: {0:?}")]
    ConnectionRefused(rumqttc::ConnectReturnCode),
    #[error("the MQTT broker refused the subscription to {0}")]
    SubscriptionRefused(String),
    #[error("the MQTT client could not queue the request: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("the MQTT session ended")]
    Disconnected,
    #[error("malformed message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),
    #[error("could not encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by the payload rather than by the transport.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::Decode(_) | Error::MalformedMessage(_))
    }
}
