// Thermocast — Pipeline Data Types

use std::fmt;

use crate::config::*;

// ---------------------------------------------------------------------------
// Feature channels (fixed column order of the model input)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    TemperatureA,
    HumidityA,
    TemperatureB,
    PressureB,
}

impl Channel {
    /// Column of this channel inside a feature vector.
    pub fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Sensor output (two calibrated physical values per chip)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// Temperature in °C.
    pub temperature: f32,
    /// Humidity in %RH (AHT20) or pressure in hPa (BMP280).
    pub secondary: f32,
}

// ---------------------------------------------------------------------------
// Feature vectors
// ---------------------------------------------------------------------------

/// One raw sample in physical units, in [`Channel`] declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureVector(pub [f32; NUM_FEATURES]);

impl FeatureVector {
    pub fn from_readings(a: SensorReading, b: SensorReading) -> Self {
        Self([a.temperature, a.secondary, b.temperature, b.secondary])
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AHT20={:.2}°C {:.2}% | BMP280={:.2}°C {:.2}hPa",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// A z-scored sample. Only the normalizer produces these, so the window can
/// never hold raw values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedVector(pub(crate) [f32; NUM_FEATURES]);

impl NormalizedVector {
    pub fn values(&self) -> &[f32; NUM_FEATURES] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Forecast (model output, shortest horizon first)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Forecast(pub [f32; NUM_HORIZONS]);

impl Forecast {
    /// `(minutes ahead, predicted °C)` pairs.
    pub fn horizons(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        HORIZON_MINUTES.iter().copied().zip(self.0.iter().copied())
    }
}
