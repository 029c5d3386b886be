use rand::Rng;
use std::ops::RangeInclusive;

use ultrafreezer_mqtt::{PowerStatus, Reading};

/// Probability that the freezer has power on any given tick. Ticks are independent.
pub const POWER_ON_PROBABILITY: f64 = 0.98;

/// Operating range of a powered ultra-low freezer, in °C.
pub const POWERED_RANGE: RangeInclusive<f64> = -82.0..=-65.0;

/// Range of an unpowered freezer warming up towards ambient, in °C.
///
/// Drawn uniformly per tick rather than following a thermal decay curve.
pub const UNPOWERED_RANGE: RangeInclusive<f64> = -64.0..=30.0;

/// Ambient (room) temperature range, in °C.
pub const AMBIENT_RANGE: RangeInclusive<f64> = 18.0..=25.0;

/// Generate one reading for `device_id`, taken at `timestamp` (unix seconds).
pub fn generate_reading<R: Rng>(rng: &mut R, device_id: &str, timestamp: i64) -> Reading {
    let power_status = if rng.gen_bool(POWER_ON_PROBABILITY) {
        PowerStatus::On
    } else {
        PowerStatus::Off
    };

    let freezer_range = match power_status {
        PowerStatus::On => POWERED_RANGE,
        PowerStatus::Off => UNPOWERED_RANGE,
    };

    Reading {
        device_id: device_id.to_owned(),
        timestamp,
        freezer_temperature: round_centi(rng.gen_range(freezer_range)),
        ambient_temperature: round_centi(rng.gen_range(AMBIENT_RANGE)),
        power_status,
    }
}

/// Round to two decimal digits.
fn round_centi(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
