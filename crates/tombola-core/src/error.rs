// Errors raised by round mutators. Every variant is a caller-side rejection:
// the round state is left untouched when one of these is returned.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("invalid config field `{field}`: {message}")]
    InvalidConfig { field: &'static str, message: String },

    #[error("number {value} {fault}, expected an integer in {min}..={max}")]
    InvalidNumber {
        value: String,
        fault: NumberFault,
        min: u32,
        max: u32,
    },

    #[error("plan has no valid targets")]
    EmptyPlan,
}

/// Why a caller-supplied number was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NumberFault {
    #[error("is outside the range")]
    OutOfRange,
    #[error("is not an integer")]
    NotInteger,
}

impl DrawError {
    pub(crate) fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        DrawError::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}
