use std::time::Duration;
use tokio_util::sync::CancellationToken;

use ultrafreezer_simulator::{Simulator, SimulatorConfig};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    ultrafreezer_mqtt::utils::tracing::init();

    let config = SimulatorConfig::from_env()?;
    tracing::info!(
        "Ultrafreezer simulator publishing to {} on {}:{}",
        config.broker.topic,
        config.broker.host,
        config.broker.port
    );

    tokio::time::sleep(config.startup_delay).await;

    // A single attempt: the simulator does not retry its initial connection.
    let connection = match config.broker.connection_builder().connect().await {
        Ok(connection) => connection,
        Err(err) => {
            tracing::error!("Failed to connect to the MQTT broker: {}", err);
            return Err(err.into());
        }
    };
    tracing::info!("Connected to the MQTT broker");

    let (publisher, event_loop) = connection.spawn_publisher(config.broker.topic.clone());

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for the interrupt signal: {}", err);
                return;
            }
            cancel.cancel();
        }
    });

    Simulator::new(publisher, &config).run(cancel).await;

    // Let the background loop flush the disconnect.
    match tokio::time::timeout(SHUTDOWN_GRACE, event_loop).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!("MQTT background loop ended abnormally: {}", err),
        Err(_) => tracing::warn!("MQTT background loop did not stop in time"),
    }

    tracing::info!("Simulator stopped");
    Ok(())
}
