//! Thermocast: a 15-minute temperature forecaster for an ESP32-C3 with an
//! AHT20 and a BMP280 on one I2C bus.
//!
//! Everything except the firmware entry point lives here so the pipeline can
//! be exercised on the host against simulated hardware (`sim` feature).

pub mod acquisition;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod inference;
pub mod normalizer;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod tasks;
pub mod ui;
pub mod window;
