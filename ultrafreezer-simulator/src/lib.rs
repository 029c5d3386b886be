//! Simulated ultrafreezer that publishes one [Reading](ultrafreezer_mqtt::Reading) per tick.

pub mod config;
pub mod generator;
pub mod simulator;

pub use config::SimulatorConfig;
pub use generator::generate_reading;
pub use simulator::Simulator;
