// Thermocast — Error Taxonomy

use thiserror::Error;

/// Failure of a single sensor transaction.
///
/// A NACK, a short transfer and a poll bound that ran out all mean the same
/// thing to callers: no usable reading this time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    /// Status never left the busy state within the poll bound.
    #[error("timed out after {attempts} status polls")]
    Timeout { attempts: u32 },
    /// The bus transfer failed (NACK, arbitration loss, short read/write).
    #[error("bus I/O failure")]
    Io,
    /// Initialisation never reported calibration data as ready.
    #[error("sensor never reported calibrated")]
    NotCalibrated,
    /// Chip-id register returned something other than the expected part.
    #[error("unexpected chip id 0x{id:02X}")]
    UnknownDevice { id: u8 },
}

/// One acquisition cycle failed; carries which sensor and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{sensor} read failed: {source}")]
pub struct AcquisitionError {
    pub sensor: &'static str,
    pub source: SensorError,
}

/// Stage at which the inference runtime refused to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    ModelNotFound,
    SchemaMismatch,
    TensorAllocation,
    NullTensors,
    InputNotFloat,
    OutputNotFloat,
    Unknown(i32),
}

impl InitStage {
    /// Decode a nonzero status returned by the runtime's `init`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::ModelNotFound,
            2 => Self::SchemaMismatch,
            3 => Self::TensorAllocation,
            4 => Self::NullTensors,
            5 => Self::InputNotFloat,
            6 => Self::OutputNotFloat,
            other => Self::Unknown(other),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ModelNotFound    => "model not found",
            Self::SchemaMismatch   => "schema version mismatch",
            Self::TensorAllocation => "tensor allocation failed",
            Self::NullTensors      => "null input/output tensors",
            Self::InputNotFloat    => "input tensor is not float32",
            Self::OutputNotFloat   => "output tensor is not float32",
            Self::Unknown(_)       => "unknown init failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InferenceError {
    #[error("inference init failed: {}", .0.description())]
    Init(InitStage),
    #[error("inference invoke failed with status {0}")]
    Invoke(i32),
    #[error("inference tensors not available")]
    NullTensor,
    #[error("{tensor} tensor holds {actual} floats, expected {expected}")]
    TensorShape {
        tensor: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// The offline scaler table is unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("scaler scale for channel {channel} is zero")]
    ZeroScale { channel: usize },
    #[error("scaler parameter for channel {channel} is not finite")]
    NonFiniteParam { channel: usize },
}

/// Anything that keeps the pipeline from starting. All of these are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartupError {
    #[error(transparent)]
    Sensor(#[from] AcquisitionError),
    #[error("invalid scaler table: {0}")]
    Scaler(#[from] ConfigError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}
