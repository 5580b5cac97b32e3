// Thermocast — Simulated Bus
//
// Register-level stand-ins for the AHT20, the BMP280 and the SSD1306 behind
// one `embedded_hal::i2c::I2c` implementation, a delay that only counts, and
// scripted sensor / runtime / display doubles. Lets the whole pipeline run
// off-target.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::config::*;
use crate::drivers::Sensor;
use crate::error::{InferenceError, InitStage, SensorError};
use crate::events::SensorReading;
use crate::inference::InferenceEngine;
use crate::ui::{Presenter, Screen};

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

/// Delay that returns immediately and records how long it was asked to wait.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay {
    total_ns: u64,
}

impl NoDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}

// ---------------------------------------------------------------------------
// Bus error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

impl i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

// ---------------------------------------------------------------------------
// AHT20
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimAht20 {
    pub present: bool,
    /// Whether the init command leaves the calibrated bit set.
    pub calibrates: bool,
    /// Status reads that still report busy after each trigger.
    pub busy_polls: u32,
    pub temperature: f32,
    pub humidity: f32,
    /// Number of measurements triggered so far.
    pub triggers: u32,
    calibrated: bool,
    busy_remaining: u32,
}

impl Default for SimAht20 {
    fn default() -> Self {
        Self {
            present: true,
            calibrates: true,
            busy_polls: 2,
            temperature: 20.0,
            humidity: 65.0,
            triggers: 0,
            calibrated: false,
            busy_remaining: 0,
        }
    }
}

impl SimAht20 {
    fn status(&mut self) -> u8 {
        let mut status = 0;
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            status |= 0x80;
        }
        if self.calibrated {
            status |= 0x08;
        }
        status
    }

    fn write(&mut self, bytes: &[u8]) {
        match bytes.first() {
            Some(0xBE) => self.calibrated = self.calibrates,
            Some(0xAC) => {
                self.triggers += 1;
                self.busy_remaining = self.busy_polls;
            }
            Some(0xBA) => self.calibrated = false,
            _ => {}
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        let status = self.status();
        let hum = ((self.humidity / 100.0) * 1_048_576.0).round().clamp(0.0, 1_048_575.0) as u32;
        let temp = ((self.temperature + 50.0) / 200.0 * 1_048_576.0).round().clamp(0.0, 1_048_575.0) as u32;
        let frame = [
            status,
            (hum >> 12) as u8,
            (hum >> 4) as u8,
            ((hum & 0x0F) << 4) as u8 | ((temp >> 16) & 0x0F) as u8,
            (temp >> 8) as u8,
            temp as u8,
        ];
        for (dst, src) in buf.iter_mut().zip(frame.iter()) {
            *dst = *src;
        }
    }
}

// ---------------------------------------------------------------------------
// BMP280
// ---------------------------------------------------------------------------

/// Calibration block from the Bosch datasheet worked example.
pub const DATASHEET_CALIBRATION: [u8; 24] = [
    112, 107, 67, 103, 24, 252, 125, 142, 67, 214, 208, 11, 39, 11, 140, 0, 249, 255, 140, 60, 248,
    198, 112, 23,
];

#[derive(Debug, Clone)]
pub struct SimBmp280 {
    pub present: bool,
    pub chip_id: u8,
    /// Status reads that report `im_update` after a soft reset.
    pub nvm_polls: u32,
    /// Status reads that report `measuring` after a forced-mode trigger.
    pub busy_polls: u32,
    pub calibration: [u8; 24],
    /// 20-bit raw temperature returned by the data registers.
    pub adc_t: u32,
    /// 20-bit raw pressure returned by the data registers.
    pub adc_p: u32,
    pub triggers: u32,
    pointer: u8,
    nvm_remaining: u32,
    busy_remaining: u32,
}

impl Default for SimBmp280 {
    fn default() -> Self {
        Self {
            present: true,
            chip_id: 0x58,
            nvm_polls: 1,
            busy_polls: 2,
            calibration: DATASHEET_CALIBRATION,
            adc_t: 519_888,
            adc_p: 415_148,
            triggers: 0,
            pointer: 0,
            nvm_remaining: 0,
            busy_remaining: 0,
        }
    }
}

impl SimBmp280 {
    fn register(&mut self, reg: u8) -> u8 {
        match reg {
            0xD0 => self.chip_id,
            0xF3 => {
                let mut status = 0;
                if self.busy_remaining > 0 {
                    self.busy_remaining -= 1;
                    status |= 0x08;
                }
                if self.nvm_remaining > 0 {
                    self.nvm_remaining -= 1;
                    status |= 0x01;
                }
                status
            }
            0x88..=0x9F => self.calibration[usize::from(reg - 0x88)],
            0xF7 => (self.adc_p >> 12) as u8,
            0xF8 => (self.adc_p >> 4) as u8,
            0xF9 => ((self.adc_p & 0x0F) << 4) as u8,
            0xFA => (self.adc_t >> 12) as u8,
            0xFB => (self.adc_t >> 4) as u8,
            0xFC => ((self.adc_t & 0x0F) << 4) as u8,
            _ => 0,
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&reg, values)) = bytes.split_first() else {
            return;
        };
        self.pointer = reg;
        match (reg, values.first()) {
            (0xE0, Some(0xB6)) => self.nvm_remaining = self.nvm_polls,
            (0xF4, Some(&ctrl)) if ctrl & 0x03 == 0x01 => {
                self.triggers += 1;
                self.busy_remaining = self.busy_polls;
            }
            _ => {}
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        // Status polls re-read the same register; burst reads auto-increment.
        if self.pointer == 0xF3 {
            for b in buf.iter_mut() {
                *b = self.register(0xF3);
            }
            return;
        }
        for (offset, b) in buf.iter_mut().enumerate() {
            *b = self.register(self.pointer.wrapping_add(offset as u8));
        }
    }
}

// ---------------------------------------------------------------------------
// SSD1306
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimOled {
    pub present: bool,
    /// Command bytes received (control byte 0x00).
    pub commands: Vec<u8>,
    /// GDDRAM bytes received (control byte 0x40), newest frame last.
    pub ram: Vec<u8>,
    pub frames: u32,
}

impl Default for SimOled {
    fn default() -> Self {
        Self {
            present: true,
            commands: Vec::new(),
            ram: Vec::new(),
            frames: 0,
        }
    }
}

impl SimOled {
    fn write(&mut self, bytes: &[u8]) {
        match bytes.split_first() {
            Some((0x00, cmds)) => self.commands.extend_from_slice(cmds),
            Some((0x40, data)) => {
                if self.ram.len() >= DISPLAY_BUFFER_SIZE {
                    self.ram.clear();
                }
                self.ram.extend_from_slice(data);
                if self.ram.len() >= DISPLAY_BUFFER_SIZE {
                    self.frames += 1;
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SimBus {
    pub aht20: SimAht20,
    pub bmp280: SimBmp280,
    pub oled: SimOled,
    /// Device address of every transaction, in bus order.
    pub traffic: Vec<u8>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn present(&self, address: u8) -> bool {
        match address {
            I2C_ADDR_AHT20 => self.aht20.present,
            I2C_ADDR_BMP280 => self.bmp280.present,
            I2C_ADDR_OLED => self.oled.present,
            _ => false,
        }
    }
}

impl ErrorType for SimBus {
    type Error = SimError;
}

impl I2c for SimBus {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
        self.traffic.push(address);
        if !self.present(address) {
            return Err(SimError);
        }

        for op in operations.iter_mut() {
            match (address, op) {
                (I2C_ADDR_AHT20, Operation::Write(bytes)) => self.aht20.write(bytes),
                (I2C_ADDR_AHT20, Operation::Read(buf)) => self.aht20.read(buf),
                (I2C_ADDR_BMP280, Operation::Write(bytes)) => self.bmp280.write(bytes),
                (I2C_ADDR_BMP280, Operation::Read(buf)) => self.bmp280.read(buf),
                (I2C_ADDR_OLED, Operation::Write(bytes)) => self.oled.write(bytes),
                (I2C_ADDR_OLED, Operation::Read(buf)) => buf.fill(0x43),
                _ => return Err(SimError),
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

/// Sensor that plays back a fixed list of outcomes, then repeats `fallback`.
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    pub name: &'static str,
    pub init: Result<(), SensorError>,
    pub alive: bool,
    pub script: VecDeque<Result<SensorReading, SensorError>>,
    pub fallback: SensorReading,
    pub reads: u32,
}

impl ScriptedSensor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            init: Ok(()),
            alive: true,
            script: VecDeque::new(),
            fallback: SensorReading::default(),
            reads: 0,
        }
    }

    pub fn then(mut self, outcome: Result<SensorReading, SensorError>) -> Self {
        self.script.push_back(outcome);
        self
    }
}

impl Sensor for ScriptedSensor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn initialize(&mut self) -> Result<(), SensorError> {
        self.init
    }

    fn read(&mut self) -> Result<SensorReading, SensorError> {
        self.reads += 1;
        self.script.pop_front().unwrap_or(Ok(self.fallback))
    }

    fn check(&mut self) -> bool {
        self.alive
    }
}

/// Runtime that records its input and returns a fixed output.
#[derive(Debug, Clone)]
pub struct FixedEngine {
    /// Status returned by `init`; nonzero codes decode to an [`InitStage`].
    pub init_rc: i32,
    /// Status returned by `invoke`.
    pub invoke_rc: i32,
    pub input: Vec<f32>,
    pub output: Vec<f32>,
    pub invokes: u32,
    ready: bool,
}

impl FixedEngine {
    pub fn new(output: Vec<f32>) -> Self {
        Self {
            init_rc: 0,
            invoke_rc: 0,
            input: vec![0.0; MODEL_INPUT_LEN],
            output,
            invokes: 0,
            ready: false,
        }
    }
}

impl InferenceEngine for FixedEngine {
    fn init(&mut self) -> Result<(), InferenceError> {
        if self.init_rc != 0 {
            return Err(InferenceError::Init(InitStage::from_code(self.init_rc)));
        }
        self.ready = true;
        Ok(())
    }

    fn input_buffer(&mut self) -> Option<&mut [f32]> {
        self.ready.then_some(&mut self.input[..])
    }

    fn output_buffer(&self) -> Option<&[f32]> {
        self.ready.then_some(&self.output[..])
    }

    fn invoke(&mut self) -> Result<(), InferenceError> {
        self.invokes += 1;
        match self.invoke_rc {
            0 => Ok(()),
            rc => Err(InferenceError::Invoke(rc)),
        }
    }
}

/// Presenter that keeps every screen it was asked to show.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    pub screens: Vec<Vec<String>>,
}

impl RecordingPresenter {
    pub fn last(&self) -> Option<&[String]> {
        self.screens.last().map(Vec::as_slice)
    }
}

impl Presenter for RecordingPresenter {
    fn present(&mut self, screen: &Screen<'_>) -> anyhow::Result<()> {
        self.screens.push(screen.lines());
        Ok(())
    }
}
