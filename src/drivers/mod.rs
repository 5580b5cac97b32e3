// Thermocast — Sensor Drivers
//
// Register-level drivers over one shared I2C bus. Every driver keeps the bus
// locked for a whole transaction (command write → status polls → result
// read) so two chips never interleave on the wire.

pub mod aht20;
pub mod bmp280;
pub mod display;

use std::sync::{Mutex, MutexGuard, PoisonError};

use embedded_hal::delay::DelayNs;

use crate::config::*;
use crate::error::SensorError;
use crate::events::SensorReading;

/// Handle to the I2C bus shared by every device on it.
pub type SharedBus<'b, B> = &'b Mutex<B>;

/// Lock the shared bus. A panic elsewhere cannot leave the bus in a state we
/// could repair, so a poisoned lock is simply taken over.
pub(crate) fn lock_bus<B>(bus: &Mutex<B>) -> MutexGuard<'_, B> {
    bus.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Collapse any bus error into [`SensorError::Io`], keeping the kind in the log.
pub(crate) fn bus_error<E: embedded_hal::i2c::Error>(err: E) -> SensorError {
    log::debug!("I2C transfer failed: {:?}", err.kind());
    SensorError::Io
}

/// A sensor chip that yields two calibrated physical measurements per read.
pub trait Sensor {
    /// Short name used in logs and on the self-test screen.
    fn name(&self) -> &'static str;

    /// Bring the chip to a state where `read` can succeed.
    fn initialize(&mut self) -> Result<(), SensorError>;

    /// Trigger one measurement, wait for it and decode the result.
    fn read(&mut self) -> Result<SensorReading, SensorError>;

    /// Liveness probe: does the chip acknowledge on the bus?
    fn check(&mut self) -> bool;
}

/// Bounded status polling: `attempts` reads, `delay_ms` after each miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub delay_ms: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: SENSOR_POLL_ATTEMPTS,
            delay_ms: SENSOR_POLL_DELAY_MS,
        }
    }
}

impl PollPolicy {
    /// Poll `read_status` until `ready` accepts the status byte.
    ///
    /// Returns `Ok(true)` as soon as the condition holds and `Ok(false)` once
    /// the attempt bound is exhausted. A failed status read ends the poll
    /// immediately with that error.
    pub fn wait_for<D, R, C>(&self, delay: &mut D, mut read_status: R, ready: C) -> Result<bool, SensorError>
    where
        D: DelayNs,
        R: FnMut() -> Result<u8, SensorError>,
        C: Fn(u8) -> bool,
    {
        for _ in 0..self.attempts {
            if ready(read_status()?) {
                return Ok(true);
            }
            delay.delay_ms(self.delay_ms);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::NoDelay;

    #[test]
    fn poll_stops_at_first_ready_status() {
        let mut delay = NoDelay::default();
        let mut reads = 0;
        let ready = PollPolicy::default()
            .wait_for(
                &mut delay,
                || {
                    reads += 1;
                    Ok(if reads < 3 { 0x80 } else { 0x00 })
                },
                |s| s & 0x80 == 0,
            )
            .unwrap();

        assert!(ready);
        assert_eq!(reads, 3);
        assert_eq!(delay.total_ms(), 20);
    }

    #[test]
    fn poll_gives_up_after_bound() {
        let mut delay = NoDelay::default();
        let mut reads = 0;
        let ready = PollPolicy::default()
            .wait_for(
                &mut delay,
                || {
                    reads += 1;
                    Ok(0x80)
                },
                |s| s & 0x80 == 0,
            )
            .unwrap();

        assert!(!ready);
        assert_eq!(reads, 10);
        assert_eq!(delay.total_ms(), 100);
    }

    #[test]
    fn poll_propagates_bus_failure() {
        let mut delay = NoDelay::default();
        let res = PollPolicy::default().wait_for(&mut delay, || Err(SensorError::Io), |_| true);
        assert_eq!(res, Err(SensorError::Io));
    }
}
