//! Error types for rust_cgmres

use thiserror::Error;

/// Main error type for the NMPC solver
#[derive(Debug, Error)]
pub enum NmpcError {
    /// A configuration value is out of its admissible range
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A vector handed in by the caller does not match the configured dimension
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The horizon is only defined from the initial time onwards
    #[error("time {time} precedes the initial time {initial_time}")]
    TimeBeforeInitial { time: f64, initial_time: f64 },

    /// `control_update` or `get_error` was called before `init_solution`
    #[error("solution is not initialized, call init_solution first")]
    NotInitialized,

    /// The static Newton-GMRES solve did not reach its tolerance
    #[error(
        "initialization did not converge after {iterations} iterations: \
         residual {residual_norm:e} (tolerance {tolerance:e})"
    )]
    InitializationFailed {
        iterations: usize,
        residual_norm: f64,
        tolerance: f64,
    },

    /// Numerical computation failed (non-finite residual, update, ...)
    #[error("numerical error: {0}")]
    NumericalError(String),
}

/// Result type alias for solver operations
pub type NmpcResult<T> = Result<T, NmpcError>;

pub(crate) fn check_dimension(
    what: &'static str,
    expected: usize,
    actual: usize,
) -> NmpcResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(NmpcError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}

pub(crate) fn check_positive(name: &'static str, value: f64) -> NmpcResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(NmpcError::InvalidParameter {
            name,
            reason: format!("must be positive and finite, got {}", value),
        })
    }
}

pub(crate) fn check_non_negative(name: &'static str, value: f64) -> NmpcResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(NmpcError::InvalidParameter {
            name,
            reason: format!("must be non-negative and finite, got {}", value),
        })
    }
}

pub(crate) fn check_finite(what: &'static str, values: &[f64]) -> NmpcResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        None => Ok(()),
        Some(i) => Err(NmpcError::InvalidParameter {
            name: what,
            reason: format!("entry {} is not finite ({})", i, values[i]),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NmpcError::DimensionMismatch {
            what: "state",
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            format!("{}", err),
            "dimension mismatch for state: expected 4, got 3"
        );
    }

    #[test]
    fn test_checks() {
        assert!(check_dimension("state", 2, 2).is_ok());
        assert!(check_positive("T_f", 0.0).is_err());
        assert!(check_positive("T_f", f64::NAN).is_err());
        assert!(check_non_negative("alpha", 0.0).is_ok());
        assert!(check_non_negative("alpha", -1.0).is_err());

        let err = check_finite("state", &[1.0, f64::INFINITY]).unwrap_err();
        assert!(matches!(err, NmpcError::InvalidParameter { name: "state", .. }));
    }
}
