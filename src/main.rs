// Thermocast — Firmware Entry Point
//
// Boot sequence:
//   1. Let the rails settle, start the logger.
//   2. Bring up the shared I2C bus (400 kHz, SDA gpio6 / SCL gpio7).
//   3. Initialise the OLED; without one, screens go to the serial log.
//   4. Self-test, sensor init, scaler check, model start (`bring_up`).
//   5. Hand the main thread to the sampler loop.
//
// Any startup failure is shown on screen and the firmware idles without
// ever sampling.

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("thermocast firmware only runs on ESP-IDF; build with an espidf target")
}

#[cfg(target_os = "espidf")]
mod firmware {
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use esp_idf_hal::delay::FreeRtos;
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;

    use thermocast::acquisition::Acquisition;
    use thermocast::config::*;
    use thermocast::drivers::aht20::Aht20;
    use thermocast::drivers::bmp280::Bmp280;
    use thermocast::drivers::display::OledDisplay;
    use thermocast::inference::default_engine;
    use thermocast::tasks::sampler::bring_up;
    use thermocast::ui::{LogPresenter, Presenter};

    pub fn run() -> anyhow::Result<()> {
        // Link esp-idf-sys runtime patches and initialise logging.
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
        thread::sleep(Duration::from_millis(BOOT_SETTLE_MS));
        log::info!("Thermocast v{} starting…", env!("CARGO_PKG_VERSION"));

        // ---- Peripherals --------------------------------------------------
        let peripherals = Peripherals::take()?;

        // ---- I2C bus (shared between OLED, AHT20 and BMP280) --------------
        let i2c_config = I2cConfig::new().baudrate(I2C_BAUDRATE_KHZ.kHz().into());
        let i2c = I2cDriver::new(
            peripherals.i2c0,
            peripherals.pins.gpio6, // SDA
            peripherals.pins.gpio7, // SCL
            &i2c_config,
        )?;
        // The driver owns the peripheral singleton and the firmware never
        // exits, so the bus lives for the rest of the program.
        let bus: &'static Mutex<I2cDriver<'static>> = Box::leak(Box::new(Mutex::new(i2c)));
        log::info!("I2C bus up — {} kHz on SDA {} / SCL {}", I2C_BAUDRATE_KHZ, PIN_I2C_SDA, PIN_I2C_SCL);

        // ---- Display (optional) -------------------------------------------
        let mut display = OledDisplay::new(bus);
        let oled_ok = display.is_connected() && display.init().is_ok();
        let presenter: Box<dyn Presenter> = if oled_ok {
            log::info!("OLED initialised");
            Box::new(display)
        } else {
            log::warn!("OLED not found — screens go to the log");
            Box::new(LogPresenter)
        };

        // ---- Pipeline -----------------------------------------------------
        let acquisition = Acquisition::new(Aht20::new(bus, FreeRtos), Bmp280::new(bus, FreeRtos));

        match bring_up(
            acquisition,
            &[("OLED", oled_ok)],
            (SCALER_MEAN, SCALER_SCALE),
            default_engine,
            presenter,
            SamplerConfig::default(),
        ) {
            Ok(sampler) => sampler.run(),
            Err(e) => {
                log::error!("Halted: {}", e);
                idle_forever()
            }
        }
    }

    /// Safe halt: nothing is sampled or invoked again until reset.
    fn idle_forever() -> ! {
        loop {
            thread::sleep(Duration::from_secs(60));
        }
    }
}
