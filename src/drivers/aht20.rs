// Thermocast — AHT20 Temperature / Humidity Driver
//
// Command-based protocol: no register map, every transfer is either a
// 3-byte command, a 1-byte status read or a 6-byte result read.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::*;
use crate::drivers::{bus_error, lock_bus, PollPolicy, Sensor, SharedBus};
use crate::error::SensorError;
use crate::events::SensorReading;

const CMD_INIT: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];
const CMD_SOFT_RESET: u8 = 0xBA;

const STATUS_BUSY: u8 = 0x80;
const STATUS_CALIBRATED: u8 = 0x08;

const INIT_SETTLE_MS: u32 = 50;
const RESET_SETTLE_MS: u32 = 20;

const FULL_SCALE: f32 = 1_048_576.0; // 2^20

pub struct Aht20<'b, B, D> {
    bus: SharedBus<'b, B>,
    delay: D,
    poll: PollPolicy,
}

impl<'b, B: I2c, D: DelayNs> Aht20<'b, B, D> {
    pub fn new(bus: SharedBus<'b, B>, delay: D) -> Self {
        Self {
            bus,
            delay,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Soft reset, then run the init sequence again.
    pub fn reset(&mut self) -> Result<(), SensorError> {
        lock_bus(self.bus)
            .write(I2C_ADDR_AHT20, &[CMD_SOFT_RESET])
            .map_err(bus_error)?;
        self.delay.delay_ms(RESET_SETTLE_MS);
        self.initialize()
    }

    fn read_status(bus: &mut B) -> Result<u8, SensorError> {
        let mut status = [0u8; 1];
        bus.read(I2C_ADDR_AHT20, &mut status).map_err(bus_error)?;
        Ok(status[0])
    }
}

/// Unpack the two 20-bit fields of a result frame (byte 0 is status).
pub fn decode(frame: &[u8; 6]) -> SensorReading {
    let raw_humidity = (u32::from(frame[1]) << 12) | (u32::from(frame[2]) << 4) | (u32::from(frame[3]) >> 4);
    let raw_temperature = (u32::from(frame[3] & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);

    SensorReading {
        temperature: raw_temperature as f32 * 200.0 / FULL_SCALE - 50.0,
        secondary: raw_humidity as f32 * 100.0 / FULL_SCALE,
    }
}

impl<'b, B: I2c, D: DelayNs> Sensor for Aht20<'b, B, D> {
    fn name(&self) -> &'static str {
        "AHT20"
    }

    fn initialize(&mut self) -> Result<(), SensorError> {
        let mut bus = lock_bus(self.bus);
        bus.write(I2C_ADDR_AHT20, &CMD_INIT).map_err(bus_error)?;
        self.delay.delay_ms(INIT_SETTLE_MS);

        let calibrated = self.poll.wait_for(
            &mut self.delay,
            || Self::read_status(&mut bus),
            |s| s & STATUS_CALIBRATED == STATUS_CALIBRATED,
        )?;
        if !calibrated {
            return Err(SensorError::NotCalibrated);
        }

        log::info!("AHT20 initialised (calibrated)");
        Ok(())
    }

    fn read(&mut self) -> Result<SensorReading, SensorError> {
        let mut bus = lock_bus(self.bus);
        bus.write(I2C_ADDR_AHT20, &CMD_TRIGGER).map_err(bus_error)?;

        let ready = self.poll.wait_for(
            &mut self.delay,
            || Self::read_status(&mut bus),
            |s| s & STATUS_BUSY == 0,
        )?;
        if !ready {
            return Err(SensorError::Timeout {
                attempts: self.poll.attempts,
            });
        }

        let mut frame = [0u8; 6];
        bus.read(I2C_ADDR_AHT20, &mut frame).map_err(bus_error)?;
        Ok(decode(&frame))
    }

    fn check(&mut self) -> bool {
        let mut status = [0u8; 1];
        lock_bus(self.bus).read(I2C_ADDR_AHT20, &mut status).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::sim::{NoDelay, SimBus};

    #[test]
    fn decode_half_scale_fields() {
        let reading = decode(&[0x1C, 0x80, 0x00, 0x08, 0x00, 0x00]);
        assert_eq!(reading.secondary, 50.0);
        assert_eq!(reading.temperature, 50.0);
    }

    #[test]
    fn decode_zero_frame_is_bottom_of_range() {
        let reading = decode(&[0; 6]);
        assert_eq!(reading.secondary, 0.0);
        assert_eq!(reading.temperature, -50.0);
    }

    #[test]
    fn init_then_read_round_trips_simulated_values() {
        let bus = Mutex::new(SimBus::new());
        bus.lock().unwrap().aht20.temperature = 23.5;
        bus.lock().unwrap().aht20.humidity = 48.0;

        let mut aht = Aht20::new(&bus, NoDelay::default());
        aht.initialize().unwrap();
        let reading = aht.read().unwrap();

        assert!((reading.temperature - 23.5).abs() < 0.01);
        assert!((reading.secondary - 48.0).abs() < 0.01);
    }

    #[test]
    fn init_fails_when_never_calibrated() {
        let bus = Mutex::new(SimBus::new());
        bus.lock().unwrap().aht20.calibrates = false;

        let mut aht = Aht20::new(&bus, NoDelay::default());
        assert_eq!(aht.initialize(), Err(SensorError::NotCalibrated));
        // 50 ms settle + 10 polls × 10 ms
        assert_eq!(aht.delay.total_ms(), 150);
    }

    #[test]
    fn read_times_out_when_busy_exceeds_bound() {
        let bus = Mutex::new(SimBus::new());
        let mut aht = Aht20::new(&bus, NoDelay::default());
        aht.initialize().unwrap();

        bus.lock().unwrap().aht20.busy_polls = 11;
        assert_eq!(aht.read(), Err(SensorError::Timeout { attempts: 10 }));

        bus.lock().unwrap().aht20.busy_polls = 9;
        assert!(aht.read().is_ok());
    }

    #[test]
    fn missing_device_is_an_io_error() {
        let bus = Mutex::new(SimBus::new());
        bus.lock().unwrap().aht20.present = false;

        let mut aht = Aht20::new(&bus, NoDelay::default());
        assert!(!aht.check());
        assert_eq!(aht.initialize(), Err(SensorError::Io));
        assert_eq!(aht.read(), Err(SensorError::Io));
    }

    #[test]
    fn reset_reinitialises() {
        let bus = Mutex::new(SimBus::new());
        let mut aht = Aht20::new(&bus, NoDelay::default());
        aht.initialize().unwrap();
        aht.reset().unwrap();
        assert!(aht.check());
    }

    #[test]
    fn custom_poll_policy_bounds_the_busy_wait() {
        let bus = Mutex::new(SimBus::new());
        let mut aht = Aht20::new(&bus, NoDelay::default()).with_poll_policy(PollPolicy {
            attempts: 3,
            delay_ms: 5,
        });
        aht.initialize().unwrap();

        bus.lock().unwrap().aht20.busy_polls = 3;
        assert_eq!(aht.read(), Err(SensorError::Timeout { attempts: 3 }));
        // 50 ms settle + 3 misses × 5 ms
        assert_eq!(aht.delay.total_ms(), 65);

        bus.lock().unwrap().aht20.busy_polls = 2;
        assert!(aht.read().is_ok());
    }
}
