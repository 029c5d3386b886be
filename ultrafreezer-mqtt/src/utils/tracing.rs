//! Shared tracing setup for the simulator and the ingest service.
//!
//! Both run unattended next to a broker, so `RUST_LOG` directives replace the default level at
//! startup: a deployment can raise a single target, e.g. `RUST_LOG=info,rumqttc=debug`, without a
//! rebuild.

use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Init tracing with default level of `INFO`.
pub fn init() {
    init_with_default_level(LevelFilter::INFO);
}

fn init_with_default_level(level: LevelFilter) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .try_init();
}
