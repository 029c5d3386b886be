use tokio_util::sync::CancellationToken;

use ultrafreezer_mqtt::utils::sleep_or_cancel;
use ultrafreezer_mqtt::{ConnectionBuilder, Error, Reading, RetryPolicy, Subscription};

use crate::point::StoredPoint;
use crate::store::PointStore;

/// Connection state of the [Ingestor].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disconnected,
    Connecting,
    Subscribed,
    Receiving,
}

/// What happened to a single inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Stored,
    /// The payload could not be decoded; dropped.
    Malformed,
    /// The store did not accept the point; dropped.
    StoreFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub stored: u64,
    pub malformed: u64,
    pub store_failed: u64,
    /// Broker sessions successfully established.
    pub sessions: u64,
}

impl IngestStats {
    fn record(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Stored => self.stored += 1,
            MessageOutcome::Malformed => self.malformed += 1,
            MessageOutcome::StoreFailed => self.store_failed += 1,
        }
    }
}

/// Something that can open a subscribed session on the readings topic.
#[async_trait::async_trait]
pub trait Broker: Send + Sync {
    async fn connect_and_subscribe(&self) -> Result<Subscription, Error>;
}

/// The MQTT broker, reached through a fresh connection on every attempt.
pub struct MqttBroker {
    builder: ConnectionBuilder,
    topic: String,
    capacity: usize,
}

impl MqttBroker {
    pub fn new(builder: ConnectionBuilder, topic: String, capacity: usize) -> Self {
        Self {
            builder,
            topic,
            capacity,
        }
    }
}

#[async_trait::async_trait]
impl Broker for MqttBroker {
    async fn connect_and_subscribe(&self) -> Result<Subscription, Error> {
        let connection = self.builder.connect().await?;
        tracing::info!(
            "Connected to the MQTT broker, subscribing to {}",
            self.topic
        );
        connection.subscribe(&self.topic, self.capacity).await
    }
}

/// Decode one payload and write the resulting point.
///
/// Never fails: malformed payloads and failed writes are logged and the message is dropped.
pub async fn on_message<S>(store: &S, payload: &[u8]) -> MessageOutcome
where
    S: PointStore + ?Sized,
{
    let reading = match Reading::decode(payload) {
        Ok(reading) => reading,
        Err(err) => {
            tracing::warn!(
                "Dropping malformed message ({}): {}",
                err,
                String::from_utf8_lossy(payload)
            );
            return MessageOutcome::Malformed;
        }
    };

    let point = StoredPoint::from(&reading);
    match store.write(&point).await {
        Ok(()) => {
            tracing::trace!(
                device_id = %reading.device_id,
                timestamp = reading.timestamp,
                "Stored reading"
            );
            MessageOutcome::Stored
        }
        Err(err) => {
            tracing::warn!(
                device_id = %reading.device_id,
                timestamp = reading.timestamp,
                "Dropping reading, the store did not accept it: {}",
                err
            );
            MessageOutcome::StoreFailed
        }
    }
}

enum SessionEnd {
    Cancelled,
    Lost(Error),
}

/// Keeps a broker session alive and drains it into the store.
///
/// Runs `Disconnected -> Connecting -> Subscribed -> Receiving`, falling back to `Disconnected`
/// and retrying with backoff whenever the session cannot be established or is lost.
pub struct Ingestor<B, S> {
    broker: B,
    store: S,
    retry: RetryPolicy,
    state: State,
    stats: IngestStats,
}

impl<B: Broker, S: PointStore> Ingestor<B, S> {
    pub fn new(broker: B, store: S, retry: RetryPolicy) -> Self {
        Self {
            broker,
            store,
            retry,
            state: State::Disconnected,
            stats: IngestStats::default(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn transition(&mut self, state: State) {
        if self.state != state {
            tracing::debug!("Ingest state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) {
        let mut backoff = self.retry.backoff();

        loop {
            self.transition(State::Connecting);
            let connected = tokio::select! {
                result = self.broker.connect_and_subscribe() => Some(result),
                _ = cancel.cancelled() => None,
            };

            match connected {
                None => break,
                Some(Ok(subscription)) => {
                    backoff.reset();
                    self.stats.sessions += 1;
                    self.transition(State::Subscribed);

                    match self.drain(subscription, cancel).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Lost(err) => {
                            tracing::warn!("Lost the MQTT session: {}", err);
                        }
                    }
                }
                Some(Err(err)) => {
                    tracing::warn!("Could not subscribe to the MQTT broker: {}", err);
                }
            }

            self.transition(State::Disconnected);
            let delay = backoff.next_delay();
            tracing::info!("Reconnecting in {:.1}s", delay.as_secs_f64());
            if !sleep_or_cancel(delay, cancel).await {
                break;
            }
        }

        self.transition(State::Disconnected);
    }

    async fn drain(&mut self, mut subscription: Subscription, cancel: &CancellationToken) -> SessionEnd {
        self.transition(State::Receiving);

        loop {
            let next = tokio::select! {
                next = subscription.next() => Some(next),
                _ = cancel.cancelled() => None,
            };

            match next {
                None => {
                    subscription.disconnect().await;
                    return SessionEnd::Cancelled;
                }
                Some(Some(Ok(message))) => {
                    tracing::trace!("Received a message on {}", message.topic);
                    let outcome = on_message(&self.store, &message.payload).await;
                    self.stats.record(outcome);
                }
                Some(Some(Err(err))) => return SessionEnd::Lost(err),
                Some(None) => return SessionEnd::Lost(Error::Disconnected),
            }
        }
    }
}
