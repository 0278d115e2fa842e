//! Error types for TT-Tucker construction, evaluation and fitting
//!
//! Every fallible operation in the ttuck stack reports one of these
//! variants. Construction and evaluation problems surface immediately;
//! numerical failures during fitting are reported through the fit result
//! together with the last known-good tensor.

use thiserror::Error;

/// Error type for TT-Tucker operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TtError {
    /// Inconsistent rank chain, mismatched factor/core sizes, invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Evaluation index outside the grid of its dimension
    #[error("Index {index} out of range for dimension {dim}: must be < {bound}")]
    OutOfRange {
        dim: usize,
        index: usize,
        bound: usize,
    },

    /// Relative error requested against an all-zero target with nonzero residual
    #[error("Degenerate norm: target norm is zero but residual norm is {residual_norm}")]
    DegenerateNorm { residual_norm: f64 },

    /// Non-finite loss or gradient encountered while fitting
    #[error("Numerical divergence at iteration {iteration}: {message}")]
    NumericalDivergence { iteration: usize, message: String },

    /// Snapshot encoding/decoding failure
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Result type for TT-Tucker operations
pub type TtResult<T> = Result<T, TtError>;

impl TtError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        TtError::Configuration(message.into())
    }

    /// Create an out-of-range error
    pub fn out_of_range(dim: usize, index: usize, bound: usize) -> Self {
        TtError::OutOfRange { dim, index, bound }
    }

    /// Create a numerical divergence error
    pub fn divergence(iteration: usize, message: impl Into<String>) -> Self {
        TtError::NumericalDivergence {
            iteration,
            message: message.into(),
        }
    }

    /// Whether this error aborts a fit (as opposed to rejecting its inputs)
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            TtError::DegenerateNorm { .. } | TtError::NumericalDivergence { .. }
        )
    }
}

impl From<serde_json::Error> for TtError {
    fn from(err: serde_json::Error) -> Self {
        TtError::Serialization(err.to_string())
    }
}

/// Convert an `f64` setting into the working scalar type.
pub fn cast<T: scirs2_core::numeric::Float>(value: f64, what: &str) -> TtResult<T> {
    T::from(value)
        .ok_or_else(|| TtError::configuration(format!("cannot represent {what} = {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_display() {
        let err = TtError::out_of_range(2, 7, 4);
        let msg = format!("{}", err);
        assert!(msg.contains("Index 7"));
        assert!(msg.contains("dimension 2"));
        assert!(msg.contains("< 4"));
    }

    #[test]
    fn test_divergence_display() {
        let err = TtError::divergence(12, "loss is NaN");
        let msg = format!("{}", err);
        assert!(msg.contains("iteration 12"));
        assert!(msg.contains("NaN"));
        assert!(err.is_numerical());
    }

    #[test]
    fn test_configuration_is_not_numerical() {
        let err = TtError::configuration("rank chain broken");
        assert!(!err.is_numerical());
        assert!(format!("{}", err).contains("rank chain broken"));
    }
}
