use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, SubscribeReasonCode,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::utils::random_client_id;
use crate::Error;

/// Requests the client may queue before the event loop picks them up.
const REQUEST_CAPACITY: usize = 16;

/// How long the producer's background loop waits before polling again after a transport error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long [Subscription::disconnect] waits for the DISCONNECT to reach the broker.
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

/// An inbound MQTT publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
}

pub struct ConnectionBuilder {
    host: String,
    port: u16,
    client_id: String,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
}

impl ConnectionBuilder {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            client_id: random_client_id("ultrafreezer"),
            credentials: None,
            keep_alive: Duration::from_secs(60),
        }
    }

    pub fn with_client_id(mut self, client_id: String) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.credentials = Some((username, password));
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username.clone(), password.clone());
        }
        options
    }

    /// Open a session and wait until the broker acknowledges it.
    ///
    /// A new client and event loop are created on every call, so a failed connection can simply
    /// be retried by calling this again.
    pub async fn connect(&self) -> Result<Connection, Error> {
        tracing::debug!(
            "Connecting to MQTT broker {}:{} as {}",
            self.host,
            self.port,
            self.client_id
        );

        let (client, mut event_loop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(Error::ConnectionRefused(ack.code));
                    }
                    tracing::debug!("MQTT broker accepted the connection");
                    return Ok(Connection { client, event_loop });
                }
                Ok(event) => tracing::trace!("MQTT event before CONNACK: {:?}", event),
                Err(err) => return Err(connection_error(err)),
            }
        }
    }
}

fn connection_error(err: ConnectionError) -> Error {
    match err {
        ConnectionError::ConnectionRefused(code) => Error::ConnectionRefused(code),
        err => Error::Connection(err),
    }
}

/// An acknowledged MQTT session that has not yet been handed to a background task.
pub struct Connection {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl Connection {
    /// Hand the event loop to a background task and return a handle publishing to `topic`.
    ///
    /// The background task keeps servicing the network, reconnecting on transport errors, until
    /// the publisher disconnects.
    pub fn spawn_publisher(self, topic: String) -> (Publisher, JoinHandle<()>) {
        let Connection {
            client,
            mut event_loop,
        } = self;

        let handle = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        tracing::debug!("MQTT session closed");
                        break;
                    }
                    Ok(event) => tracing::trace!("MQTT event: {:?}", event),
                    Err(err) => {
                        tracing::warn!("MQTT connection error, reconnecting: {}", err);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        let publisher = Publisher {
            client,
            topic,
            qos: QoS::AtLeastOnce,
        };
        (publisher, handle)
    }

    /// Subscribe to `topic` and forward inbound publishes into a channel of `capacity` messages.
    ///
    /// Waits for the broker's SUBACK. After that a background task pumps the event loop; the first
    /// transport error or broker disconnect is delivered as the final item of the subscription.
    pub async fn subscribe(self, topic: &str, capacity: usize) -> Result<Subscription, Error> {
        let Connection {
            client,
            mut event_loop,
        } = self;

        client.subscribe(topic, QoS::AtLeastOnce).await?;

        let (sender, receiver) = mpsc::channel(capacity.max(1));
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    if ack
                        .return_codes
                        .iter()
                        .any(|code| matches!(code, SubscribeReasonCode::Failure))
                    {
                        return Err(Error::SubscriptionRefused(topic.to_owned()));
                    }
                    tracing::debug!("Subscribed to {}", topic);
                    break;
                }
                // Retained messages may arrive before the SUBACK.
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = Message {
                        topic: publish.topic,
                        payload: publish.payload,
                    };
                    if sender.try_send(Ok(message)).is_err() {
                        tracing::warn!("Dropping message received before the subscription settled");
                    }
                }
                Ok(event) => tracing::trace!("MQTT event before SUBACK: {:?}", event),
                Err(err) => return Err(connection_error(err)),
            }
        }

        let pump = tokio::spawn(pump(event_loop, sender));

        Ok(Subscription {
            messages: receiver,
            client: Some(client),
            pump: Some(pump),
        })
    }
}

async fn pump(mut event_loop: EventLoop, sender: mpsc::Sender<Result<Message, Error>>) {
    loop {
        let event = tokio::select! {
            event = event_loop.poll() => event,
            _ = sender.closed() => break,
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::trace!("Received an MQTT message on topic {}", publish.topic);
                let message = Message {
                    topic: publish.topic,
                    payload: publish.payload,
                };
                // Waiting here applies backpressure to the broker.
                if sender.send(Ok(message)).await.is_err() {
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) | Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                let _ = sender.send(Err(Error::Disconnected)).await;
                break;
            }
            Ok(event) => tracing::trace!("MQTT event: {:?}", event),
            Err(err) => {
                let _ = sender.send(Err(connection_error(err))).await;
                break;
            }
        }
    }

    tracing::debug!("MQTT receive loop stopped");
}

/// The inbound side of a subscribed session.
///
/// Yields messages in broker delivery order. After a transport error or disconnect, the error is
/// yielded once and the subscription then ends.
pub struct Subscription {
    messages: mpsc::Receiver<Result<Message, Error>>,
    client: Option<AsyncClient>,
    pump: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a channel that is not backed by a broker session, e.g. an in-process broker.
    pub fn from_channel(messages: mpsc::Receiver<Result<Message, Error>>) -> Self {
        Self {
            messages,
            client: None,
            pump: None,
        }
    }

    pub async fn next(&mut self) -> Option<Result<Message, Error>> {
        self.messages.recv().await
    }

    /// Close the session and wait until the receive loop has flushed the DISCONNECT.
    ///
    /// Messages still buffered in the subscription are discarded.
    pub async fn disconnect(self) {
        let Subscription {
            mut messages,
            client,
            pump,
        } = self;

        if let Some(client) = &client {
            if let Err(err) = client.try_disconnect() {
                tracing::debug!("Could not request MQTT disconnect: {}", err);
            }
        }

        if let Some(pump) = pump {
            // The receiver stays open until the pump is done, so it never mistakes this for a
            // dropped subscription. Draining keeps it from blocking on a full channel.
            let flushed = tokio::time::timeout(DISCONNECT_GRACE, async {
                while messages.recv().await.is_some() {}
                pump.await
            })
            .await;
            match flushed {
                Ok(Ok(())) => tracing::debug!("MQTT session closed"),
                Ok(Err(err)) => tracing::warn!("MQTT receive loop ended abnormally: {}", err),
                Err(_) => tracing::warn!("MQTT session did not close in time"),
            }
        }
    }
}

/// Something readings can be published through.
#[async_trait::async_trait]
pub trait Publish: Send + Sync {
    /// Queue `payload` for publication without waiting. An error means the transport did not
    /// accept the message, e.g. because its queue is full while the broker is unreachable.
    async fn publish(&self, payload: Vec<u8>) -> Result<(), Error>;

    async fn disconnect(&self) -> Result<(), Error>;
}

/// Publishes to a fixed topic through a session serviced by a background task.
#[derive(Clone)]
pub struct Publisher {
    client: AsyncClient,
    topic: String,
    qos: QoS,
}

#[async_trait::async_trait]
impl Publish for Publisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), Error> {
        self.client.try_publish(self.topic.clone(), self.qos, false, payload)?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Error> {
        self.client.try_disconnect()?;
        Ok(())
    }
}
