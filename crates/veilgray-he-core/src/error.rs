//! Error type shared by every CKKS operation.

use thiserror::Error;

/// Result type for CKKS operations.
pub type HeResult<T> = Result<T, HeError>;

/// Errors that can occur while configuring or evaluating the CKKS scheme.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeError {
    /// The requested parameter set cannot be built.
    #[error("invalid CKKS parameters: {0}")]
    ParameterSetup(String),

    /// More values than the parameter set has slots.
    #[error("input length {len} exceeds slot count {slots}")]
    SlotOverflow { len: usize, slots: usize },

    /// NaN or infinite input value.
    #[error("value at slot {index} is not finite")]
    NonFiniteValue { index: usize },

    /// A value whose scaled coefficient would not fit the modulus chain.
    #[error("value {value} is too large to encode at scale 2^{scale_bits}")]
    ValueOutOfRange { value: f64, scale_bits: u32 },

    /// Operands live at different levels of the modulus chain.
    #[error("level mismatch: {left} vs {right}")]
    LevelMismatch { left: usize, right: usize },

    /// Operands carry different scales.
    #[error("scale mismatch: {left} vs {right}")]
    ScaleMismatch { left: f64, right: f64 },

    /// Operands have a different number of polynomial components.
    #[error("ciphertext degree mismatch: {left} vs {right}")]
    DegreeMismatch { left: usize, right: usize },

    /// The operation is not defined for a ciphertext of this degree.
    #[error("unsupported ciphertext degree {0}")]
    UnsupportedDegree(usize),

    /// No modulus left to drop.
    #[error("cannot rescale a ciphertext at level 0")]
    LevelExhausted,

    /// A key does not cover the limbs of the operand it is applied to.
    #[error("key covers {key_limbs} limbs but the operand needs {needed}")]
    KeyMismatch { key_limbs: usize, needed: usize },
}
