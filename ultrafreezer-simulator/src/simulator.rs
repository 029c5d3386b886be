use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use ultrafreezer_mqtt::utils::sleep_or_cancel;
use ultrafreezer_mqtt::{Error, Publish};

use crate::config::SimulatorConfig;
use crate::generator::generate_reading;

/// Publishes one simulated reading per interval until cancelled.
pub struct Simulator<P> {
    publisher: P,
    device_id: String,
    rng: StdRng,
    publish_interval: Duration,
    error_backoff: Duration,
}

impl<P: Publish> Simulator<P> {
    pub fn new(publisher: P, config: &SimulatorConfig) -> Self {
        Self {
            publisher,
            device_id: config.device_id.clone(),
            rng: StdRng::from_entropy(),
            publish_interval: config.publish_interval,
            error_backoff: config.error_backoff,
        }
    }

    /// Replace the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Generate, encode and publish a single reading.
    ///
    /// A publish the transport does not accept is logged and skipped; only failures to produce a
    /// payload are returned.
    pub async fn tick(&mut self) -> Result<(), Error> {
        let timestamp = chrono::Utc::now().timestamp();
        let reading = generate_reading(&mut self.rng, &self.device_id, timestamp);
        let payload = reading.encode()?;

        match self.publisher.publish(payload).await {
            Ok(()) => tracing::info!(
                device_id = %reading.device_id,
                freezer_temperature = reading.freezer_temperature,
                ambient_temperature = reading.ambient_temperature,
                power_status = u8::from(reading.power_status),
                "Published reading"
            ),
            Err(err) => tracing::warn!("Failed to publish reading: {}", err),
        }

        Ok(())
    }

    /// Publish readings until `cancel` fires, then disconnect.
    pub async fn run(mut self, cancel: CancellationToken) -> P {
        loop {
            let ticked = tokio::select! {
                result = self.tick() => result,
                _ = cancel.cancelled() => break,
            };
            let pause = match ticked {
                Ok(()) => self.publish_interval,
                Err(err) => {
                    tracing::error!("Unexpected error in the publish loop: {}", err);
                    self.error_backoff
                }
            };

            if !sleep_or_cancel(pause, &cancel).await {
                break;
            }
        }

        tracing::info!("Simulator interrupted");
        if let Err(err) = self.publisher.disconnect().await {
            tracing::warn!("Failed to disconnect from the MQTT broker: {}", err);
        }

        self.publisher
    }
}
