//! Engine error type.
//!
//! Missing optional data is never an error: every formula has a neutral
//! default. Errors are reserved for invalid input (no partial result) and
//! invariant violations at the stop write boundary.

use thiserror::Error;

use crate::domain::ProtectionLevel;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid input '{field}': {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("stop decrease rejected for {symbol}: current {current:.4}, attempted {attempted:.4}")]
    StopDecrease {
        symbol: String,
        current: f64,
        attempted: f64,
    },

    #[error("protection level regression rejected for {symbol}: {current} -> {attempted}")]
    ProtectionRegression {
        symbol: String,
        current: ProtectionLevel,
        attempted: ProtectionLevel,
    },

    #[error("fingerprint serialization failed: {0}")]
    Fingerprint(String),
}

impl EngineError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// True for the write-boundary failures that must block persistence.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            EngineError::StopDecrease { .. } | EngineError::ProtectionRegression { .. }
        )
    }
}
