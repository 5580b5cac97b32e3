// Thermocast — BMP280 Temperature / Pressure Driver
//
// Register-mapped protocol, run in forced mode: each read writes ctrl_meas,
// waits for `measuring` to clear and burst-reads the six data registers.
// Compensation uses the integer formulas from the Bosch datasheet with the
// trimming parameters read once during init.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::*;
use crate::drivers::{bus_error, lock_bus, PollPolicy, Sensor, SharedBus};
use crate::error::SensorError;
use crate::events::SensorReading;

// BMP280 register addresses
const REG_CALIB_START: u8 = 0x88; // dig_T1 .. dig_P9, 24 bytes little-endian
const REG_CHIP_ID: u8 = 0xD0;
const REG_RESET: u8 = 0xE0;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_PRESS_MSB: u8 = 0xF7; // Start of 6-byte data burst

const CHIP_ID_EXPECTED: u8 = 0x58;
const RESET_VALUE: u8 = 0xB6;

const STATUS_MEASURING: u8 = 0x08;
const STATUS_IM_UPDATE: u8 = 0x01;

// osrs_t ×1, osrs_p ×4, forced mode
const CTRL_MEAS_FORCED: u8 = (0b001 << 5) | (0b011 << 2) | 0b01;
// standby 0.5 ms, IIR filter off, no 3-wire SPI
const CONFIG_DEFAULT: u8 = 0x00;

const RESET_SETTLE_MS: u32 = 10;

/// Factory trimming parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
}

impl Calibration {
    pub fn from_bytes(raw: &[u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            dig_t1: u(0),
            dig_t2: s(2),
            dig_t3: s(4),
            dig_p1: u(6),
            dig_p2: s(8),
            dig_p3: s(10),
            dig_p4: s(12),
            dig_p5: s(14),
            dig_p6: s(16),
            dig_p7: s(18),
            dig_p8: s(20),
            dig_p9: s(22),
        }
    }

    /// Returns `(temperature in 0.01 °C, t_fine)`.
    pub fn compensate_temperature(&self, adc_t: i32) -> (i32, i32) {
        let t1 = i32::from(self.dig_t1);
        let var1 = (((adc_t >> 3) - (t1 << 1)) * i32::from(self.dig_t2)) >> 11;
        let var2 = (((((adc_t >> 4) - t1) * ((adc_t >> 4) - t1)) >> 12) * i32::from(self.dig_t3)) >> 14;
        let t_fine = var1 + var2;
        ((t_fine * 5 + 128) >> 8, t_fine)
    }

    /// Pressure in Pa as unsigned Q24.8, or `None` when `dig_P1` is zero.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: i32) -> Option<u32> {
        let mut var1 = i64::from(t_fine) - 128_000;
        let mut var2 = var1 * var1 * i64::from(self.dig_p6);
        var2 += (var1 * i64::from(self.dig_p5)) << 17;
        var2 += i64::from(self.dig_p4) << 35;
        var1 = ((var1 * var1 * i64::from(self.dig_p3)) >> 8) + ((var1 * i64::from(self.dig_p2)) << 12);
        var1 = (((1i64 << 47) + var1) * i64::from(self.dig_p1)) >> 33;
        if var1 == 0 {
            return None;
        }

        let mut p = 1_048_576 - i64::from(adc_p);
        p = (((p << 31) - var2) * 3125) / var1;
        var1 = (i64::from(self.dig_p9) * (p >> 13) * (p >> 13)) >> 25;
        var2 = (i64::from(self.dig_p8) * p) >> 19;
        p = ((p + var1 + var2) >> 8) + (i64::from(self.dig_p7) << 4);
        Some(p as u32)
    }

    /// Convert a raw data burst to `°C` and `hPa`.
    pub fn convert(&self, data: &[u8; 6]) -> Option<SensorReading> {
        let adc_p = (i32::from(data[0]) << 12) | (i32::from(data[1]) << 4) | (i32::from(data[2]) >> 4);
        let adc_t = (i32::from(data[3]) << 12) | (i32::from(data[4]) << 4) | (i32::from(data[5]) >> 4);

        let (centi_celsius, t_fine) = self.compensate_temperature(adc_t);
        let pressure_q24_8 = self.compensate_pressure(adc_p, t_fine)?;

        Some(SensorReading {
            temperature: centi_celsius as f32 / 100.0,
            secondary: pressure_q24_8 as f32 / 256.0 / 100.0,
        })
    }
}

pub struct Bmp280<'b, B, D> {
    bus: SharedBus<'b, B>,
    delay: D,
    poll: PollPolicy,
    calibration: Option<Calibration>,
}

impl<'b, B: I2c, D: DelayNs> Bmp280<'b, B, D> {
    pub fn new(bus: SharedBus<'b, B>, delay: D) -> Self {
        Self {
            bus,
            delay,
            poll: PollPolicy::default(),
            calibration: None,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Trimming parameters, once `initialize` has read them.
    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    fn read_registers(bus: &mut B, reg: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        bus.write_read(I2C_ADDR_BMP280, &[reg], buf).map_err(bus_error)
    }

    fn write_register(bus: &mut B, reg: u8, value: u8) -> Result<(), SensorError> {
        bus.write(I2C_ADDR_BMP280, &[reg, value]).map_err(bus_error)
    }

    fn read_status(bus: &mut B) -> Result<u8, SensorError> {
        let mut status = [0u8; 1];
        Self::read_registers(bus, REG_STATUS, &mut status)?;
        Ok(status[0])
    }
}

impl<'b, B: I2c, D: DelayNs> Sensor for Bmp280<'b, B, D> {
    fn name(&self) -> &'static str {
        "BMP280"
    }

    fn initialize(&mut self) -> Result<(), SensorError> {
        let mut bus = lock_bus(self.bus);

        let mut id = [0u8; 1];
        Self::read_registers(&mut bus, REG_CHIP_ID, &mut id)?;
        if id[0] != CHIP_ID_EXPECTED {
            return Err(SensorError::UnknownDevice { id: id[0] });
        }

        Self::write_register(&mut bus, REG_RESET, RESET_VALUE)?;
        self.delay.delay_ms(RESET_SETTLE_MS);

        // im_update is set while the NVM trimming data is copied to registers.
        let loaded = self.poll.wait_for(
            &mut self.delay,
            || Self::read_status(&mut bus),
            |s| s & STATUS_IM_UPDATE == 0,
        )?;
        if !loaded {
            return Err(SensorError::NotCalibrated);
        }

        let mut raw = [0u8; 24];
        Self::read_registers(&mut bus, REG_CALIB_START, &mut raw)?;
        let calibration = Calibration::from_bytes(&raw);
        if calibration.dig_t1 == 0 || calibration.dig_p1 == 0 {
            return Err(SensorError::NotCalibrated);
        }

        Self::write_register(&mut bus, REG_CONFIG, CONFIG_DEFAULT)?;
        self.calibration = Some(calibration);

        log::info!("BMP280 initialised (forced mode, T×1 P×4)");
        Ok(())
    }

    fn read(&mut self) -> Result<SensorReading, SensorError> {
        let calibration = self.calibration.ok_or(SensorError::NotCalibrated)?;
        let mut bus = lock_bus(self.bus);

        Self::write_register(&mut bus, REG_CTRL_MEAS, CTRL_MEAS_FORCED)?;

        let ready = self.poll.wait_for(
            &mut self.delay,
            || Self::read_status(&mut bus),
            |s| s & STATUS_MEASURING == 0,
        )?;
        if !ready {
            return Err(SensorError::Timeout {
                attempts: self.poll.attempts,
            });
        }

        let mut data = [0u8; 6];
        Self::read_registers(&mut bus, REG_PRESS_MSB, &mut data)?;
        calibration.convert(&data).ok_or(SensorError::NotCalibrated)
    }

    fn check(&mut self) -> bool {
        let mut id = [0u8; 1];
        Self::read_registers(&mut lock_bus(self.bus), REG_CHIP_ID, &mut id).is_ok()
    }
}
