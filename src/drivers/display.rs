// Thermocast — SSD1306 OLED Driver
//
// 128×64 monochrome framebuffer drawn with embedded-graphics and pushed to
// the panel over the shared I2C bus in horizontal addressing mode.

use core::convert::Infallible;

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use embedded_hal::i2c::{Error as _, I2c};

use crate::config::*;
use crate::drivers::{lock_bus, SharedBus};

const CONTROL_COMMAND: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;
const DATA_CHUNK: usize = 128;

const CMD_DISPLAY_OFF: u8 = 0xAE;
const CMD_DISPLAY_ON: u8 = 0xAF;

#[rustfmt::skip]
const INIT_SEQUENCE: &[u8] = &[
    CMD_DISPLAY_OFF,
    0xD5, 0x80,       // clock divide / oscillator
    0xA8, 0x3F,       // multiplex 64
    0xD3, 0x00,       // display offset
    0x40,             // start line 0
    0x8D, 0x14,       // charge pump on
    0x20, 0x00,       // horizontal addressing
    0xA1,             // segment remap
    0xC8,             // COM scan descending
    0xDA, 0x12,       // COM pins
    0x81, 0xCF,       // contrast
    0xD9, 0xF1,       // pre-charge
    0xDB, 0x40,       // VCOMH deselect
    0xA4,             // resume from RAM
    0xA6,             // normal (not inverted)
    0x2E,             // scroll off
    CMD_DISPLAY_ON,
];

/// Vertical spacing of the text rows, matching the original screen layout.
pub const LINE_Y: [i32; 4] = [0, 16, 28, 40];

pub struct OledDisplay<'b, B> {
    bus: SharedBus<'b, B>,
    buffer: [u8; DISPLAY_BUFFER_SIZE],
}

impl<'b, B: I2c> OledDisplay<'b, B> {
    pub fn new(bus: SharedBus<'b, B>) -> Self {
        Self {
            bus,
            buffer: [0; DISPLAY_BUFFER_SIZE],
        }
    }

    /// Verify the panel acknowledges on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let mut status = [0u8; 1];
        lock_bus(self.bus).read(I2C_ADDR_OLED, &mut status).is_ok()
    }

    pub fn init(&mut self) -> anyhow::Result<()> {
        self.command(INIT_SEQUENCE)?;
        self.clear();
        self.flush()?;
        log::info!("SSD1306 initialised ({}x{})", SCREEN_WIDTH, SCREEN_HEIGHT);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }

    /// Raw framebuffer, page-major (8 vertical pixels per byte).
    pub fn buffer(&self) -> &[u8; DISPLAY_BUFFER_SIZE] {
        &self.buffer
    }

    /// Push the whole framebuffer to GDDRAM.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.command(&[0x21, 0x00, (SCREEN_WIDTH - 1) as u8, 0x22, 0x00, (SCREEN_HEIGHT / 8 - 1) as u8])?;

        let mut bus = lock_bus(self.bus);
        let mut packet = [0u8; DATA_CHUNK + 1];
        packet[0] = CONTROL_DATA;
        for chunk in self.buffer.chunks(DATA_CHUNK) {
            packet[1..=chunk.len()].copy_from_slice(chunk);
            bus.write(I2C_ADDR_OLED, &packet[..=chunk.len()])
                .map_err(|e| anyhow::anyhow!("OLED data write failed: {:?}", e.kind()))?;
        }
        Ok(())
    }

    /// Clear, draw up to four rows of text and flush.
    pub fn show_lines(&mut self, lines: &[&str]) -> anyhow::Result<()> {
        self.clear();
        let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        for (text, y) in lines.iter().zip(LINE_Y.iter()) {
            Text::with_baseline(text, Point::new(0, *y), style, Baseline::Top)
                .draw(self)
                .unwrap_or_else(|never| match never {});
        }
        self.flush()
    }

    fn command(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let mut packet = Vec::with_capacity(bytes.len() + 1);
        packet.push(CONTROL_COMMAND);
        packet.extend_from_slice(bytes);
        lock_bus(self.bus)
            .write(I2C_ADDR_OLED, &packet)
            .map_err(|e| anyhow::anyhow!("OLED command write failed: {:?}", e.kind()))
    }
}

impl<'b, B> OriginDimensions for OledDisplay<'b, B> {
    fn size(&self) -> Size {
        Size::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl<'b, B> DrawTarget for OledDisplay<'b, B> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x >= SCREEN_WIDTH || y >= SCREEN_HEIGHT {
                continue;
            }
            let index = (x + (y / 8) * SCREEN_WIDTH) as usize;
            let mask = 1u8 << (y % 8);
            match color {
                BinaryColor::On => self.buffer[index] |= mask,
                BinaryColor::Off => self.buffer[index] &= !mask,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::sim::SimBus;

    #[test]
    fn pixels_land_in_page_layout() {
        let bus = Mutex::new(SimBus::new());
        let mut oled = OledDisplay::new(&bus);

        Pixel(Point::new(3, 9), BinaryColor::On).draw(&mut oled).unwrap();
        assert_eq!(oled.buffer()[3 + 128], 0b0000_0010);

        Pixel(Point::new(3, 9), BinaryColor::Off).draw(&mut oled).unwrap();
        assert_eq!(oled.buffer()[3 + 128], 0);

        // Off-screen pixels are ignored.
        Pixel(Point::new(-1, 200), BinaryColor::On).draw(&mut oled).unwrap();
        assert!(oled.buffer().iter().all(|b| *b == 0));
    }

    #[test]
    fn init_sends_sequence_and_blank_frame() {
        let bus = Mutex::new(SimBus::new());
        let mut oled = OledDisplay::new(&bus);
        oled.init().unwrap();

        let sim = bus.lock().unwrap();
        assert_eq!(sim.oled.commands.first(), Some(&CMD_DISPLAY_OFF));
        assert!(sim.oled.commands.contains(&CMD_DISPLAY_ON));
        assert_eq!(sim.oled.frames, 1);
        assert!(sim.oled.ram.iter().all(|b| *b == 0));
    }

    #[test]
    fn text_reaches_the_panel() {
        let bus = Mutex::new(SimBus::new());
        let mut oled = OledDisplay::new(&bus);
        oled.show_lines(&["Temp Prediction", "+5m:  21.3C"]).unwrap();

        let sim = bus.lock().unwrap();
        assert_eq!(sim.oled.frames, 1);
        assert_eq!(sim.oled.ram.len(), DISPLAY_BUFFER_SIZE);
        assert!(sim.oled.ram.iter().any(|b| *b != 0));
    }

    #[test]
    fn absent_panel_reports_errors() {
        let bus = Mutex::new(SimBus::new());
        bus.lock().unwrap().oled.present = false;
        let mut oled = OledDisplay::new(&bus);
        assert!(!oled.is_connected());
        assert!(oled.init().is_err());
    }
}
