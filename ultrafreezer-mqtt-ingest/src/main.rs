use tokio_util::sync::CancellationToken;

use ultrafreezer_mqtt_ingest::{Config, InfluxStore, Ingestor, MqttBroker, PointStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    ultrafreezer_mqtt::utils::tracing::init();

    // Configuration errors are fatal and must surface before any network activity.
    let config = Config::from_env()?;

    let store = InfluxStore::new(&config.store)?;
    match store.health().await {
        Ok(()) => tracing::info!("InfluxDB at {} is healthy", config.store.url),
        Err(err) => tracing::warn!(
            "InfluxDB at {} failed its health check, writes may be dropped: {}",
            config.store.url,
            err
        ),
    }

    let broker = MqttBroker::new(
        config.broker.connection_builder(),
        config.broker.topic.clone(),
        config.queue_capacity,
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for the interrupt signal: {}", err);
                return;
            }
            tracing::info!("MQTT ingest shutting down");
            cancel.cancel();
        }
    });

    tracing::info!(
        "MQTT ingest started: {}:{} topic {} -> bucket {}",
        config.broker.host,
        config.broker.port,
        config.broker.topic,
        config.store.bucket
    );

    let mut ingestor = Ingestor::new(broker, store, config.retry);
    ingestor.run(&cancel).await;

    let stats = ingestor.stats();
    tracing::info!(
        "MQTT ingest stopped: {} stored, {} malformed, {} failed writes over {} session(s)",
        stats.stored,
        stats.malformed,
        stats.store_failed,
        stats.sessions
    );
    Ok(())
}
