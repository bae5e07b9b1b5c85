//! Construction-time contract violations and engine-internal faults.
//!
//! `PatternError` fails fast when a schema is built with impossible
//! constraints; it never leaks into match/generate time. `EngineError` is the
//! "exception" arm of [`crate::outcome::Outcome`]: unexpected internal faults
//! and the cycle marker that nullable ancestors are allowed to absorb.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("maxItems ({max}) must be >= minItems ({min})")]
    ItemBounds { min: usize, max: usize },

    #[error("maxLength ({max}) must be >= minLength ({min})")]
    LengthBounds { min: usize, max: usize },

    #[error("maximum ({max}) must be >= minimum ({min})")]
    NumericBounds { min: f64, max: f64 },

    #[error("maxProperties ({max}) must be >= minProperties ({min})")]
    PropertyBounds { min: usize, max: usize },

    #[error("maxProperties ({max}) is too small to fit {mandatory} mandatory keys")]
    MandatoryExceedsMax { mandatory: usize, max: usize },

    #[error("minProperties ({min}) cannot be met: only {available} keys are declared")]
    NotEnoughKeys { min: usize, available: usize },

    #[error("exclusive bounds leave no admissible value between {min} and {max}")]
    EmptyRange { min: f64, max: f64 },

    #[error("enum values must share one type (saw {first} and {second}); set multi_type to allow this")]
    EnumHeterogeneous { first: String, second: String },

    #[error("nullable enum must include a null value")]
    EnumMissingNull,

    #[error("non-nullable enum must not include a null value")]
    EnumUnexpectedNull,

    #[error("invalid regex {pattern:?}: {message}")]
    BadRegex { pattern: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A self-referential schema was re-entered on the current call chain.
    /// Nullable/optional ancestors absorb this into an omission; mandatory
    /// ancestors must surface it.
    #[error("cyclic reference through {0}; generation cannot terminate here")]
    Cycle(String),

    #[error("unknown pattern {0:?}")]
    UnknownPattern(String),

    #[error("row example could not be resolved: {0}")]
    RowLookup(String),

    #[error("string generation failed: {0}")]
    StringGen(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn is_cycle(&self) -> bool {
        matches!(self, EngineError::Cycle(_))
    }
}
