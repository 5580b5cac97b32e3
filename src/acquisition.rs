// Thermocast — Multi-Sensor Acquisition
//
// One pass over both sensors in channel order. Either every channel is read
// or the whole sample is dropped; no partial vectors leave this module.

use crate::drivers::Sensor;
use crate::error::AcquisitionError;
use crate::events::{FeatureVector, SensorReading};

/// The two sensor chips feeding the model, in channel order:
/// `primary` → temperature_A / humidity_A, `secondary` → temperature_B / pressure_B.
pub struct Acquisition<A, B> {
    primary: A,
    secondary: B,
}

impl<A: Sensor, B: Sensor> Acquisition<A, B> {
    pub fn new(primary: A, secondary: B) -> Self {
        Self { primary, secondary }
    }

    /// Initialise both sensors; stops at the first one that fails.
    pub fn initialize(&mut self) -> Result<(), AcquisitionError> {
        init_one(&mut self.primary)?;
        init_one(&mut self.secondary)
    }

    /// Liveness of each sensor, for the boot self-test.
    pub fn check(&mut self) -> [(&'static str, bool); 2] {
        [
            (self.primary.name(), self.primary.check()),
            (self.secondary.name(), self.secondary.check()),
        ]
    }

    /// Read every sensor once and assemble a raw feature vector.
    pub fn collect(&mut self) -> Result<FeatureVector, AcquisitionError> {
        let a = read_one(&mut self.primary)?;
        let b = read_one(&mut self.secondary)?;
        Ok(FeatureVector::from_readings(a, b))
    }
}

fn init_one<S: Sensor>(sensor: &mut S) -> Result<(), AcquisitionError> {
    sensor.initialize().map_err(|source| {
        log::error!("{} init failed: {}", sensor.name(), source);
        AcquisitionError {
            sensor: sensor.name(),
            source,
        }
    })
}

fn read_one<S: Sensor>(sensor: &mut S) -> Result<SensorReading, AcquisitionError> {
    sensor.read().map_err(|source| {
        log::warn!("{} read failed: {}", sensor.name(), source);
        AcquisitionError {
            sensor: sensor.name(),
            source,
        }
    })
}
