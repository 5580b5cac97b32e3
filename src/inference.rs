// Thermocast — Forecast Inference Interface
//
// This module provides a safe Rust API over the temperature forecast model.
//
// Architecture:
//   1. STUB mode (default): a deterministic trend extrapolator so the rest of
//      the firmware can be developed and tested without the C++ TFLite Micro
//      runtime compiled in.
//   2. FFI mode: enable the `tflm` feature; build.rs compiles the wrapper
//      and links the real interpreter through its `tflm_*` C ABI.
//
// Either way the runtime owns both tensors. The core only writes the
// [1, 10, 4] float32 input (time-major, feature-minor) and reads the first
// three floats of the [1, 3] output.

use crate::config::*;
use crate::error::InferenceError;
#[cfg(feature = "tflm")]
use crate::error::InitStage;
use crate::events::{Forecast, NormalizedVector};
#[cfg(not(feature = "tflm"))]
use crate::{events::Channel, normalizer::NormalizationParams};

// ---------------------------------------------------------------------------
// Runtime contract
// ---------------------------------------------------------------------------

/// The model runtime seen from the pipeline.
pub trait InferenceEngine {
    /// Load the model and allocate tensors.
    fn init(&mut self) -> Result<(), InferenceError>;

    /// Input tensor as floats, `None` before a successful `init`.
    fn input_buffer(&mut self) -> Option<&mut [f32]>;

    /// Output tensor as floats, `None` before a successful `init`.
    fn output_buffer(&self) -> Option<&[f32]>;

    /// Run the model on the current input tensor.
    fn invoke(&mut self) -> Result<(), InferenceError>;

    /// Arena bytes in use, when the runtime reports it.
    fn arena_used_bytes(&self) -> Option<usize> {
        None
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for &mut E {
    fn init(&mut self) -> Result<(), InferenceError> {
        (**self).init()
    }

    fn input_buffer(&mut self) -> Option<&mut [f32]> {
        (**self).input_buffer()
    }

    fn output_buffer(&self) -> Option<&[f32]> {
        (**self).output_buffer()
    }

    fn invoke(&mut self) -> Result<(), InferenceError> {
        (**self).invoke()
    }

    fn arena_used_bytes(&self) -> Option<usize> {
        (**self).arena_used_bytes()
    }
}

/// Started runtime with validated tensor shapes.
pub struct Forecaster<E> {
    engine: E,
}

impl<E: InferenceEngine> Forecaster<E> {
    /// Run `init` and check that both tensors have the expected size.
    pub fn start(mut engine: E) -> Result<Self, InferenceError> {
        engine.init()?;

        let input_len = engine.input_buffer().ok_or(InferenceError::NullTensor)?.len();
        if input_len != MODEL_INPUT_LEN {
            return Err(InferenceError::TensorShape {
                tensor: "input",
                expected: MODEL_INPUT_LEN,
                actual: input_len,
            });
        }

        let output_len = engine.output_buffer().ok_or(InferenceError::NullTensor)?.len();
        if output_len < NUM_HORIZONS {
            return Err(InferenceError::TensorShape {
                tensor: "output",
                expected: NUM_HORIZONS,
                actual: output_len,
            });
        }

        Ok(Self { engine })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Copy the window into the input tensor, invoke, and read the horizons.
    pub fn predict(&mut self, window: &[NormalizedVector; WINDOW_SIZE]) -> Result<Forecast, InferenceError> {
        let input = self.engine.input_buffer().ok_or(InferenceError::NullTensor)?;
        for (row, sample) in input.chunks_exact_mut(NUM_FEATURES).zip(window.iter()) {
            row.copy_from_slice(sample.values());
        }

        self.engine.invoke()?;

        let output = self.engine.output_buffer().ok_or(InferenceError::NullTensor)?;
        let mut horizons = [0.0f32; NUM_HORIZONS];
        horizons.copy_from_slice(&output[..NUM_HORIZONS]);
        Ok(Forecast(horizons))
    }
}

// ---------------------------------------------------------------------------
// Back-end selection (swap between stub / real FFI)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "tflm"))]
pub type DefaultEngine = StubEngine;

#[cfg(feature = "tflm")]
pub type DefaultEngine = TflmEngine;

#[cfg(not(feature = "tflm"))]
pub fn default_engine(params: &NormalizationParams) -> DefaultEngine {
    StubEngine::new(*params)
}

#[cfg(feature = "tflm")]
pub fn default_engine(_params: &crate::normalizer::NormalizationParams) -> DefaultEngine {
    TflmEngine::new()
}

// ---------------------------------------------------------------------------
// Stub back-end (host development and tests, no C++ runtime)
// ---------------------------------------------------------------------------

/// Linear-trend extrapolation of temperature_A, in °C.
#[cfg(not(feature = "tflm"))]
pub struct StubEngine {
    params: NormalizationParams,
    input: [f32; MODEL_INPUT_LEN],
    output: [f32; NUM_HORIZONS],
    ready: bool,
}

#[cfg(not(feature = "tflm"))]
impl StubEngine {
    pub fn new(params: NormalizationParams) -> Self {
        Self {
            params,
            input: [0.0; MODEL_INPUT_LEN],
            output: [0.0; NUM_HORIZONS],
            ready: false,
        }
    }
}

#[cfg(not(feature = "tflm"))]
impl InferenceEngine for StubEngine {
    fn init(&mut self) -> Result<(), InferenceError> {
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
        if !self.ready {
            return Err(InferenceError::Invoke(1));
        }

        let channel = Channel::TemperatureA.index();
        let first = self.params.denormalize(channel, self.input[channel]);
        let last = self
            .params
            .denormalize(channel, self.input[(WINDOW_SIZE - 1) * NUM_FEATURES + channel]);
        let slope_per_sample = (last - first) / (WINDOW_SIZE - 1) as f32;

        for (out, minutes) in self.output.iter_mut().zip(HORIZON_MINUTES.iter()) {
            let samples_ahead = (*minutes as f32 * 60_000.0) / SAMPLE_INTERVAL_MS as f32;
            *out = last + slope_per_sample * samples_ahead;
        }

        log::debug!(
            "STUB inference — last = {:.2}°C, slope = {:.4}°C/sample, preds = {:?}",
            last,
            slope_per_sample,
            self.output
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Real FFI back-end: calls the C++ TFLite Micro wrapper
// ---------------------------------------------------------------------------
#[cfg(feature = "tflm")]
mod ffi {
    use std::ffi::c_int;

    extern "C" {
        pub fn tflm_init() -> c_int;
        pub fn tflm_input_ptr(nfloats: *mut c_int) -> *mut f32;
        pub fn tflm_output_ptr(nfloats: *mut c_int) -> *mut f32;
        pub fn tflm_invoke() -> c_int;
        pub fn tflm_arena_used_bytes() -> c_int;
    }
}

#[cfg(feature = "tflm")]
pub struct TflmEngine {
    input: *mut f32,
    input_len: usize,
    output: *const f32,
    output_len: usize,
}

#[cfg(feature = "tflm")]
impl TflmEngine {
    pub fn new() -> Self {
        Self {
            input: std::ptr::null_mut(),
            input_len: 0,
            output: std::ptr::null(),
            output_len: 0,
        }
    }
}

#[cfg(feature = "tflm")]
impl Default for TflmEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "tflm")]
impl InferenceEngine for TflmEngine {
    fn init(&mut self) -> Result<(), InferenceError> {
        // SAFETY: the wrapper keeps its interpreter and arena in statics; only
        // this engine (owned by the single sampler thread) calls into it.
        unsafe {
            let rc = ffi::tflm_init();
            if rc != 0 {
                return Err(InferenceError::Init(InitStage::from_code(rc)));
            }

            let mut n: std::ffi::c_int = 0;
            self.input = ffi::tflm_input_ptr(&mut n);
            self.input_len = usize::try_from(n).unwrap_or(0);

            let mut n: std::ffi::c_int = 0;
            self.output = ffi::tflm_output_ptr(&mut n);
            self.output_len = usize::try_from(n).unwrap_or(0);
        }

        if self.input.is_null() || self.output.is_null() {
            return Err(InferenceError::Init(InitStage::NullTensors));
        }
        Ok(())
    }

    fn input_buffer(&mut self) -> Option<&mut [f32]> {
        if self.input.is_null() {
            return None;
        }
        // SAFETY: the tensor lives in the static arena for the rest of the
        // program and `&mut self` makes this the only live view of it.
        Some(unsafe { std::slice::from_raw_parts_mut(self.input, self.input_len) })
    }

    fn output_buffer(&self) -> Option<&[f32]> {
        if self.output.is_null() {
            return None;
        }
        // SAFETY: as above; the interpreter only writes it during `invoke`.
        Some(unsafe { std::slice::from_raw_parts(self.output, self.output_len) })
    }

    fn invoke(&mut self) -> Result<(), InferenceError> {
        // SAFETY: see `init`.
        let rc = unsafe { ffi::tflm_invoke() };
        if rc != 0 {
            return Err(InferenceError::Invoke(rc));
        }
        Ok(())
    }

    fn arena_used_bytes(&self) -> Option<usize> {
        // SAFETY: read-only query on the static interpreter.
        let used = unsafe { ffi::tflm_arena_used_bytes() };
        usize::try_from(used).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InitStage;
    use crate::sim::FixedEngine;

    fn window() -> [NormalizedVector; WINDOW_SIZE] {
        let mut w = [NormalizedVector::default(); WINDOW_SIZE];
        for (t, v) in w.iter_mut().enumerate() {
            *v = NormalizedVector([t as f32, t as f32 + 0.1, t as f32 + 0.2, t as f32 + 0.3]);
        }
        w
    }

    #[test]
    fn input_is_time_major_feature_minor() {
        let mut f = Forecaster::start(FixedEngine::new(vec![1.0, 2.0, 3.0])).unwrap();
        f.predict(&window()).unwrap();

        let input = &f.engine().input;
        for t in 0..WINDOW_SIZE {
            for c in 0..NUM_FEATURES {
                assert_eq!(input[t * NUM_FEATURES + c], window()[t].values()[c]);
            }
        }
    }

    #[test]
    fn output_is_passed_through_untouched() {
        let mut f = Forecaster::start(FixedEngine::new(vec![21.37, -0.5, 1e6])).unwrap();
        let forecast = f.predict(&window()).unwrap();
        assert_eq!(forecast, Forecast([21.37, -0.5, 1e6]));
    }

    #[test]
    fn init_code_is_decoded() {
        let mut engine = FixedEngine::new(vec![0.0; 3]);
        engine.init_rc = 2;
        assert_eq!(
            Forecaster::start(engine).err(),
            Some(InferenceError::Init(InitStage::SchemaMismatch))
        );
    }

    #[test]
    fn wrong_tensor_sizes_refuse_to_start() {
        let mut engine = FixedEngine::new(vec![0.0; 3]);
        engine.input = vec![0.0; 12];
        assert_eq!(
            Forecaster::start(engine).err(),
            Some(InferenceError::TensorShape {
                tensor: "input",
                expected: MODEL_INPUT_LEN,
                actual: 12
            })
        );

        let engine = FixedEngine::new(vec![0.0; 2]);
        assert!(matches!(
            Forecaster::start(engine).err(),
            Some(InferenceError::TensorShape { tensor: "output", .. })
        ));
    }

    #[test]
    fn invoke_failure_surfaces_status() {
        let mut engine = FixedEngine::new(vec![0.0; 3]);
        engine.invoke_rc = 2;
        let mut f = Forecaster::start(engine).unwrap();
        assert_eq!(f.predict(&window()), Err(InferenceError::Invoke(2)));
        assert_eq!(f.engine().invokes, 1);
    }

    #[cfg(not(feature = "tflm"))]
    #[test]
    fn stub_extrapolates_temperature_trend() {
        let params = NormalizationParams::new([20.0, 0.0, 0.0, 0.0], [1.0; NUM_FEATURES]).unwrap();
        let mut f = Forecaster::start(default_engine(&params)).unwrap();

        // temperature_A climbs 0.1 °C per sample from 20.0 °C.
        let mut w = [NormalizedVector::default(); WINDOW_SIZE];
        for (t, v) in w.iter_mut().enumerate() {
            *v = NormalizedVector([t as f32 * 0.1, 0.0, 0.0, 0.0]);
        }
        let forecast = f.predict(&w).unwrap();

        let last = 20.9;
        for (minutes, predicted) in forecast.horizons() {
            let expected = last + 0.1 * (minutes as f32 * 60.0 / 31.0);
            assert!((predicted - expected).abs() < 1e-3, "+{minutes} min");
        }
    }
}
