// Thermocast — Sampler Task
//
// The single control loop. Every 31 s it takes one sample from both sensors,
// normalises it into the sliding window and, once the window holds ten
// samples, forecasts the next 15 minutes. A failed sample is dropped and the
// next attempt waits a full interval; nothing here is fatal.
//
// `bring_up` is the boot sequence that leads into the loop. Everything it
// rejects is fatal.

use std::thread;
use std::time::{Duration, Instant};

use crate::acquisition::Acquisition;
use crate::config::*;
use crate::drivers::Sensor;
use crate::error::{AcquisitionError, InferenceError, StartupError};
use crate::events::Forecast;
use crate::inference::{Forecaster, InferenceEngine};
use crate::normalizer::NormalizationParams;
use crate::ui::{Presenter, Screen};
use crate::window::WindowBuffer;

/// What one scheduler tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cycle {
    /// Interval not yet elapsed.
    Idle,
    /// Acquisition failed; the window was left untouched.
    Dropped(AcquisitionError),
    /// Sample stored, window not full yet.
    Filling { collected: usize },
    Forecast(Forecast),
    /// Sample stored but the model failed to run. The window keeps it.
    InferenceFailed(InferenceError),
}

pub struct Sampler<A, B, E, P> {
    acquisition: Acquisition<A, B>,
    normalizer: NormalizationParams,
    window: WindowBuffer,
    forecaster: Forecaster<E>,
    presenter: P,
    config: SamplerConfig,
    last_sample: Instant,
}

impl<A, B, E, P> Sampler<A, B, E, P>
where
    A: Sensor,
    B: Sensor,
    E: InferenceEngine,
    P: Presenter,
{
    /// `started` counts as the last sample time, so the first sample is
    /// taken one full interval later.
    pub fn new(
        acquisition: Acquisition<A, B>,
        normalizer: NormalizationParams,
        forecaster: Forecaster<E>,
        presenter: P,
        config: SamplerConfig,
        started: Instant,
    ) -> Self {
        Self {
            acquisition,
            normalizer,
            window: WindowBuffer::new(),
            forecaster,
            presenter,
            config,
            last_sample: started,
        }
    }

    pub fn window(&self) -> &WindowBuffer {
        &self.window
    }

    pub fn forecaster(&self) -> &Forecaster<E> {
        &self.forecaster
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Run one sampling cycle if the interval has elapsed at `now`.
    pub fn tick(&mut self, now: Instant) -> Cycle {
        if now.saturating_duration_since(self.last_sample) < self.config.sample_interval {
            return Cycle::Idle;
        }

        let started = Instant::now();
        let cycle = self.cycle();
        // Success or not, the next attempt is a full interval away.
        self.last_sample = now;

        let took = started.elapsed();
        if took > Duration::from_millis(ACQUISITION_WARN_MS) {
            log::warn!("Sampling cycle took {} ms", took.as_millis());
        }
        cycle
    }

    /// Poll forever. Never returns; power-off is the only way out.
    pub fn run(mut self) -> ! {
        log::info!(
            "Sampler running — one sample every {} s",
            self.config.sample_interval.as_secs()
        );
        loop {
            self.tick(Instant::now());
            thread::sleep(self.config.tick);
        }
    }

    fn cycle(&mut self) -> Cycle {
        let raw = match self.acquisition.collect() {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Sample dropped — {}", e);
                return Cycle::Dropped(e);
            }
        };
        log::info!("{}", raw);

        if self.window.insert(self.normalizer.normalize(&raw)) {
            log::info!("Window full — forecasting from now on");
        }

        let Some(window) = self.window.snapshot_in_time_order() else {
            let collected = self.window.len();
            log::info!("Collecting samples: {}/{}", collected, WINDOW_SIZE);
            self.show(&Screen::Progress { collected });
            return Cycle::Filling { collected };
        };

        match self.forecaster.predict(&window) {
            Ok(forecast) => {
                for (minutes, value) in forecast.horizons() {
                    log::info!("Forecast +{} min: {:.2}°C", minutes, value);
                }
                self.show(&Screen::Forecast(&forecast));
                Cycle::Forecast(forecast)
            }
            Err(e) => {
                log::error!("{}", e);
                Cycle::InferenceFailed(e)
            }
        }
    }

    fn show(&mut self, screen: &Screen<'_>) {
        if let Err(e) = self.presenter.present(screen) {
            log::warn!("Display update failed: {:#}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Boot sequence
// ---------------------------------------------------------------------------

/// Offline scaler table as shipped with the model: `(mean, scale)`.
pub type ScalerTable = ([f32; NUM_FEATURES], [f32; NUM_FEATURES]);

/// Boot screen → self-test → sensor init → scaler check → model start →
/// ready screen. `peripherals` are extra self-test rows (e.g. the display).
///
/// On failure the reason is logged and shown on a fatal screen before the
/// error is returned; the caller is expected to idle without sampling.
pub fn bring_up<A, B, E, P, F>(
    mut acquisition: Acquisition<A, B>,
    peripherals: &[(&'static str, bool)],
    scaler: ScalerTable,
    make_engine: F,
    mut presenter: P,
    config: SamplerConfig,
) -> Result<Sampler<A, B, E, P>, StartupError>
where
    A: Sensor,
    B: Sensor,
    E: InferenceEngine,
    P: Presenter,
    F: FnOnce(&NormalizationParams) -> E,
{
    present_or_log(&mut presenter, &Screen::Boot);

    let mut results: Vec<(&'static str, bool)> = acquisition.check().to_vec();
    results.extend_from_slice(peripherals);
    for (name, ok) in &results {
        if *ok {
            log::info!("Self-test {}: OK", name);
        } else {
            log::error!("Self-test {}: FAIL", name);
        }
    }
    present_or_log(&mut presenter, &Screen::SelfTest(&results));

    let prepared = acquisition
        .initialize()
        .map_err(StartupError::from)
        .and_then(|()| {
            log::info!("Sensors initialised");
            let (mean, scale) = scaler;
            Ok(NormalizationParams::new(mean, scale)?)
        })
        .and_then(|params| {
            log::info!("Scaler loaded — mean {:?}, scale {:?}", params.mean(), params.scale());
            let forecaster = Forecaster::start(make_engine(&params))?;
            match forecaster.engine().arena_used_bytes() {
                Some(bytes) => log::info!("Inference ready — arena used {} bytes", bytes),
                None => log::info!("Inference ready"),
            }
            Ok((params, forecaster))
        });

    let (params, forecaster) = match prepared {
        Ok(ready) => ready,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            let reason = e.to_string();
            present_or_log(&mut presenter, &Screen::Fatal(&reason));
            return Err(e);
        }
    };

    present_or_log(&mut presenter, &Screen::Ready);
    Ok(Sampler::new(acquisition, params, forecaster, presenter, config, Instant::now()))
}

fn present_or_log<P: Presenter>(presenter: &mut P, screen: &Screen<'_>) {
    if let Err(e) = presenter.present(screen) {
        log::warn!("Display update failed: {:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InitStage, SensorError};
    use crate::events::SensorReading;
    use crate::sim::{FixedEngine, RecordingPresenter, ScriptedSensor};

    const IDENTITY: ScalerTable = ([0.0; NUM_FEATURES], [1.0; NUM_FEATURES]);

    fn sensors() -> Acquisition<ScriptedSensor, ScriptedSensor> {
        let mut a = ScriptedSensor::new("AHT20");
        a.fallback = SensorReading { temperature: 21.0, secondary: 50.0 };
        let mut b = ScriptedSensor::new("BMP280");
        b.fallback = SensorReading { temperature: 21.5, secondary: 1000.0 };
        Acquisition::new(a, b)
    }

    fn sampler<'a>(
        acquisition: Acquisition<ScriptedSensor, ScriptedSensor>,
        engine: &'a mut FixedEngine,
        presenter: &'a mut RecordingPresenter,
        t0: Instant,
    ) -> Sampler<ScriptedSensor, ScriptedSensor, &'a mut FixedEngine, &'a mut RecordingPresenter> {
        let params = NormalizationParams::new(IDENTITY.0, IDENTITY.1).unwrap();
        let forecaster = Forecaster::start(engine).unwrap();
        Sampler::new(acquisition, params, forecaster, presenter, SamplerConfig::default(), t0)
    }

    fn at(t0: Instant, secs: u64) -> Instant {
        t0 + Duration::from_secs(secs)
    }

    #[test]
    fn first_sample_waits_a_full_interval() {
        let t0 = Instant::now();
        let mut engine = FixedEngine::new(vec![0.0; 3]);
        let mut screens = RecordingPresenter::default();
        let mut s = sampler(sensors(), &mut engine, &mut screens, t0);

        assert_eq!(s.tick(at(t0, 30)), Cycle::Idle);
        assert!(s.window().is_empty());
        assert_eq!(s.tick(at(t0, 31)), Cycle::Filling { collected: 1 });
        assert_eq!(s.presenter().last().unwrap(), ["Collecting data", "Samples 1/10"]);
    }

    #[test]
    fn dropped_sample_is_not_retried_early() {
        let t0 = Instant::now();
        let acq = Acquisition::new(
            ScriptedSensor::new("AHT20").then(Err(SensorError::Timeout { attempts: 10 })),
            ScriptedSensor::new("BMP280"),
        );
        let mut engine = FixedEngine::new(vec![0.0; 3]);
        let mut screens = RecordingPresenter::default();
        let mut s = sampler(acq, &mut engine, &mut screens, t0);

        assert!(matches!(s.tick(at(t0, 31)), Cycle::Dropped(AcquisitionError { sensor: "AHT20", .. })));
        assert!(s.window().is_empty());
        assert!(s.presenter().screens.is_empty());

        assert_eq!(s.tick(at(t0, 61)), Cycle::Idle);
        assert_eq!(s.tick(at(t0, 62)), Cycle::Filling { collected: 1 });
    }

    #[test]
    fn tenth_sample_produces_a_forecast() {
        let t0 = Instant::now();
        let mut engine = FixedEngine::new(vec![21.3, 21.9, 22.4]);
        let mut screens = RecordingPresenter::default();
        let mut s = sampler(sensors(), &mut engine, &mut screens, t0);

        for n in 1..WINDOW_SIZE as u64 {
            assert_eq!(s.tick(at(t0, 31 * n)), Cycle::Filling { collected: n as usize });
        }
        assert_eq!(s.tick(at(t0, 310)), Cycle::Forecast(Forecast([21.3, 21.9, 22.4])));
        assert_eq!(
            s.presenter().last().unwrap(),
            ["Temp Prediction", "+5m:  21.3C", "+10m: 21.9C", "+15m: 22.4C"]
        );

        // Every later sample forecasts again.
        assert!(matches!(s.tick(at(t0, 341)), Cycle::Forecast(_)));
        assert_eq!(s.forecaster().engine().invokes, 2);
    }

    #[test]
    fn invoke_failure_keeps_the_window() {
        let t0 = Instant::now();
        let mut engine = FixedEngine::new(vec![0.0; 3]);
        engine.invoke_rc = 3;
        let mut screens = RecordingPresenter::default();
        let mut s = sampler(sensors(), &mut engine, &mut screens, t0);

        for n in 1..WINDOW_SIZE as u64 {
            s.tick(at(t0, 31 * n));
        }
        assert_eq!(s.tick(at(t0, 310)), Cycle::InferenceFailed(InferenceError::Invoke(3)));
        assert!(s.window().is_full());
        assert_eq!(s.tick(at(t0, 341)), Cycle::InferenceFailed(InferenceError::Invoke(3)));
    }

    #[test]
    fn bring_up_shows_boot_self_test_and_ready() {
        let mut screens = RecordingPresenter::default();
        let sampler = bring_up(
            sensors(),
            &[("OLED", true)],
            IDENTITY,
            |_| FixedEngine::new(vec![0.0; 3]),
            &mut screens,
            SamplerConfig::default(),
        );
        assert!(sampler.is_ok());
        drop(sampler);

        assert_eq!(screens.screens.len(), 3);
        assert_eq!(screens.screens[0][0], "TinyML Temp");
        assert_eq!(screens.screens[1], ["Self-test", "AHT20: OK", "BMP280: OK", "OLED: OK"]);
        assert_eq!(screens.screens[2][0], "READY!");
    }

    #[test]
    fn nonzero_init_code_is_fatal_and_never_invokes() {
        let mut engine = FixedEngine::new(vec![0.0; 3]);
        engine.init_rc = 2;
        let mut screens = RecordingPresenter::default();
        let handle = &mut engine;

        let result = bring_up(sensors(), &[], IDENTITY, move |_| handle, &mut screens, SamplerConfig::default());
        assert_eq!(
            result.err(),
            Some(StartupError::Inference(InferenceError::Init(InitStage::SchemaMismatch)))
        );
        assert_eq!(engine.invokes, 0);
        assert_eq!(
            screens.last().unwrap(),
            ["ERROR!", "inference init failed", ": schema version mism", "atch"]
        );
    }

    #[test]
    fn sensor_init_failure_stops_before_the_model() {
        let mut aht = ScriptedSensor::new("AHT20");
        aht.init = Err(SensorError::NotCalibrated);
        let mut engine_built = false;

        let result = bring_up(
            Acquisition::new(aht, ScriptedSensor::new("BMP280")),
            &[],
            IDENTITY,
            |_| {
                engine_built = true;
                FixedEngine::new(vec![0.0; 3])
            },
            RecordingPresenter::default(),
            SamplerConfig::default(),
        );
        assert!(matches!(
            result.err(),
            Some(StartupError::Sensor(AcquisitionError { sensor: "AHT20", source: SensorError::NotCalibrated }))
        ));
        assert!(!engine_built);
    }

    #[test]
    fn zero_scale_is_rejected() {
        let mut scale = [1.0; NUM_FEATURES];
        scale[3] = 0.0;
        let result = bring_up(
            sensors(),
            &[],
            ([0.0; NUM_FEATURES], scale),
            |_| FixedEngine::new(vec![0.0; 3]),
            RecordingPresenter::default(),
            SamplerConfig::default(),
        );
        assert!(matches!(
            result.err(),
            Some(StartupError::Scaler(crate::error::ConfigError::ZeroScale { channel: 3 }))
        ));
    }
}
