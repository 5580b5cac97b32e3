// Thermocast — Feature Normalizer
//
// Z-score transform with the StandardScaler table fit offline alongside the
// model. The table is validated once at startup; afterwards normalisation has
// no failure path.

use crate::config::*;
use crate::error::ConfigError;
use crate::events::{FeatureVector, NormalizedVector};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationParams {
    mean: [f32; NUM_FEATURES],
    scale: [f32; NUM_FEATURES],
}

impl NormalizationParams {
    /// Rejects any non-finite entry and any zero scale.
    pub fn new(mean: [f32; NUM_FEATURES], scale: [f32; NUM_FEATURES]) -> Result<Self, ConfigError> {
        for channel in 0..NUM_FEATURES {
            if !mean[channel].is_finite() || !scale[channel].is_finite() {
                return Err(ConfigError::NonFiniteParam { channel });
            }
            if scale[channel] == 0.0 {
                return Err(ConfigError::ZeroScale { channel });
            }
        }
        Ok(Self { mean, scale })
    }

    /// The table shipped with the model.
    pub fn trained() -> Result<Self, ConfigError> {
        Self::new(SCALER_MEAN, SCALER_SCALE)
    }

    pub fn mean(&self) -> &[f32; NUM_FEATURES] {
        &self.mean
    }

    pub fn scale(&self) -> &[f32; NUM_FEATURES] {
        &self.scale
    }

    /// `(x - mean) / scale` per channel.
    pub fn normalize(&self, raw: &FeatureVector) -> NormalizedVector {
        let mut out = [0.0f32; NUM_FEATURES];
        for (i, v) in out.iter_mut().enumerate() {
            *v = (raw.0[i] - self.mean[i]) / self.scale[i];
        }
        NormalizedVector(out)
    }

    /// Inverse transform of a single channel.
    pub fn denormalize(&self, channel: usize, value: f32) -> f32 {
        value * self.scale[channel] + self.mean[channel]
    }
}
