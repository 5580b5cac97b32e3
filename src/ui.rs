// Thermocast — Presentation
//
// Screens are described once as up to four short text rows. The OLED draws
// them; when no panel answers at boot the same rows go to the serial log.

use embedded_hal::i2c::I2c;

use crate::config::*;
use crate::drivers::display::OledDisplay;
use crate::events::Forecast;

/// Characters per row with the 6×10 font on a 128 px panel.
pub const LINE_CHARS: usize = SCREEN_WIDTH as usize / 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen<'a> {
    Boot,
    SelfTest(&'a [(&'static str, bool)]),
    Ready,
    Progress { collected: usize },
    Forecast(&'a Forecast),
    Fatal(&'a str),
}

impl Screen<'_> {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Screen::Boot => vec!["TinyML Temp".into(), "CNN 1D Model".into(), "Starting...".into()],
            Screen::SelfTest(results) => {
                let mut lines = vec!["Self-test".to_string()];
                lines.extend(
                    results
                        .iter()
                        .map(|(name, ok)| format!("{}: {}", name, if *ok { "OK" } else { "FAIL" })),
                );
                lines
            }
            Screen::Ready => vec![
                "READY!".into(),
                "Collecting".into(),
                "time window".into(),
                format!("({} samples)", WINDOW_SIZE),
            ],
            Screen::Progress { collected } => vec![
                "Collecting data".into(),
                format!("Samples {}/{}", collected, WINDOW_SIZE),
            ],
            Screen::Forecast(forecast) => {
                let mut lines = vec!["Temp Prediction".to_string()];
                lines.extend(
                    forecast
                        .horizons()
                        .map(|(minutes, value)| format!("{:<5} {:.1}C", format!("+{}m:", minutes), value)),
                );
                lines
            }
            Screen::Fatal(reason) => {
                let mut lines = vec!["ERROR!".to_string()];
                let chars: Vec<char> = reason.chars().collect();
                lines.extend(chars.chunks(LINE_CHARS).take(3).map(|c| c.iter().collect::<String>()));
                lines
            }
        }
    }
}

/// Where the pipeline's status and results are shown.
pub trait Presenter {
    fn present(&mut self, screen: &Screen<'_>) -> anyhow::Result<()>;
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn present(&mut self, screen: &Screen<'_>) -> anyhow::Result<()> {
        (**self).present(screen)
    }
}

impl<P: Presenter + ?Sized> Presenter for &mut P {
    fn present(&mut self, screen: &Screen<'_>) -> anyhow::Result<()> {
        (**self).present(screen)
    }
}

impl<'b, B: I2c> Presenter for OledDisplay<'b, B> {
    fn present(&mut self, screen: &Screen<'_>) -> anyhow::Result<()> {
        let lines = screen.lines();
        let rows: Vec<&str> = lines.iter().map(String::as_str).collect();
        self.show_lines(&rows)
    }
}

/// Headless fallback: one log line per screen.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn present(&mut self, screen: &Screen<'_>) -> anyhow::Result<()> {
        log::info!("[screen] {}", screen.lines().join(" | "));
        Ok(())
    }
}
