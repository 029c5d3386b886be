//! Drains ultrafreezer readings from the MQTT broker into InfluxDB.
//!
//! ```text
//! broker --> Subscription (bounded) --> Ingestor --> on_message --> StoredPoint --> PointStore
//! ```
//!
//! Delivery is best effort: malformed messages and failed writes are logged and dropped, and a
//! lost broker session is re-established with exponential backoff.

pub mod config;
pub mod ingest;
pub mod point;
pub mod store;

pub use config::{Config, StoreConfig};
pub use ingest::{on_message, Broker, IngestStats, Ingestor, MessageOutcome, MqttBroker, State};
pub use point::{FieldValue, StoredPoint, MEASUREMENT};
pub use store::{InfluxStore, PointStore, StoreWriteError};
