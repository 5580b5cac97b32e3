// Thermocast — Hardware & System Configuration
// Target: Seeed Studio Xiao ESP32-C3 (RISC-V)

use std::time::Duration;

// ---------------------------------------------------------------------------
// GPIO Pin Definitions (Xiao ESP32-C3 pinout)
// ---------------------------------------------------------------------------
pub const PIN_I2C_SDA: i32 = 6;     // D4    I2C data line
pub const PIN_I2C_SCL: i32 = 7;     // D5    I2C clock line

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_BAUDRATE_KHZ: u32 = 400;
pub const I2C_ADDR_AHT20: u8 = 0x38;
pub const I2C_ADDR_BMP280: u8 = 0x76;
pub const I2C_ADDR_OLED: u8 = 0x3C;

// ---------------------------------------------------------------------------
// Display (SSD1306 OLED)
// ---------------------------------------------------------------------------
pub const SCREEN_WIDTH: u32 = 128;
pub const SCREEN_HEIGHT: u32 = 64;
pub const DISPLAY_BUFFER_SIZE: usize = (SCREEN_WIDTH as usize * SCREEN_HEIGHT as usize) / 8; // 1024

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const SAMPLE_INTERVAL_MS: u64 = 31_000;           // one window step
pub const SCHEDULER_TICK_MS: u64 = 100;               // busy-poll avoidance, not precision
pub const ACQUISITION_WARN_MS: u64 = 500;             // cycle slower than this gets a warning
pub const BOOT_SETTLE_MS: u64 = 2000;                 // let the rails and serial come up
pub const SENSOR_POLL_ATTEMPTS: u32 = 10;
pub const SENSOR_POLL_DELAY_MS: u32 = 10;

// ---------------------------------------------------------------------------
// Forecast model (CNN 1D, TFLite Micro)
// ---------------------------------------------------------------------------
pub const WINDOW_SIZE: usize = 10;                    // timesteps
pub const NUM_FEATURES: usize = 4;                    // Temp_AHT20, Hum_AHT20, Temp_BMP280, Press_BMP280
pub const NUM_HORIZONS: usize = 3;                    // +5 / +10 / +15 min
pub const MODEL_INPUT_LEN: usize = WINDOW_SIZE * NUM_FEATURES; // 40
pub const HORIZON_MINUTES: [u32; NUM_HORIZONS] = [5, 10, 15];

// ---------------------------------------------------------------------------
// Scaler (StandardScaler fit offline on the training set)
// ---------------------------------------------------------------------------
pub const SCALER_MEAN: [f32; NUM_FEATURES] = [24.613_f32, 61.872, 25.184, 917.496];
pub const SCALER_SCALE: [f32; NUM_FEATURES] = [2.187_f32, 9.314, 2.062, 1.873];

/// Timing of the sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Minimum time between two samples.
    pub sample_interval: Duration,
    /// Sleep between scheduler checks.
    pub tick: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(SAMPLE_INTERVAL_MS),
            tick: Duration::from_millis(SCHEDULER_TICK_MS),
        }
    }
}
