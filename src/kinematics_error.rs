//! Error handling for malformed kinematic input

use thiserror::Error;

/// Unified error to report malformed input to the kinematics, Jacobian and planning calls.
///
/// Only caller mistakes end up here (wrong shapes, non-finite values, nonsensical
/// durations). Expected outcomes such as an unreachable target or a solver that did not
/// converge are reported as tagged values (see [`crate::ik::IkOutcome`]), never as errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KinematicsError {
    #[error("Invalid length of {what}: expected {expected}, found {found}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Unsupported number of joints: {0} (1 to 6 are supported)")]
    InvalidDof(usize),

    #[error("Non-finite value in {what} at index {index}")]
    NonFinite { what: &'static str, index: usize },

    #[error("Invalid limits of joint {joint}: min {min} is above max {max}")]
    InvalidLimits { joint: usize, min: f64, max: f64 },

    #[error("Invalid argument {name}: {message}")]
    InvalidArgument {
        name: &'static str,
        message: String,
    },

    #[error("Linear algebra failure: {0}")]
    LinearAlgebra(String),
}

impl KinematicsError {
    pub(crate) fn argument(name: &'static str, message: impl Into<String>) -> Self {
        KinematicsError::InvalidArgument {
            name,
            message: message.into(),
        }
    }
}

/// Checks that all values are finite, reporting the first offender.
pub(crate) fn ensure_finite(what: &'static str, values: &[f64]) -> Result<(), KinematicsError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(KinematicsError::NonFinite { what, index }),
        None => Ok(()),
    }
}

/// Checks that the slice has the expected length.
pub(crate) fn ensure_length(
    what: &'static str,
    values: &[f64],
    expected: usize,
) -> Result<(), KinematicsError> {
    if values.len() != expected {
        return Err(KinematicsError::InvalidLength {
            what,
            expected,
            found: values.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("joints", &[0.0, 1.0, -2.0]).is_ok());
        assert_eq!(
            ensure_finite("joints", &[0.0, f64::NAN]),
            Err(KinematicsError::NonFinite {
                what: "joints",
                index: 1
            })
        );
        assert!(ensure_finite("joints", &[f64::NEG_INFINITY]).is_err());
    }

    #[test]
    fn test_messages() {
        let error = KinematicsError::InvalidLength {
            what: "joints",
            expected: 3,
            found: 2,
        };
        assert_eq!(
            error.to_string(),
            "Invalid length of joints: expected 3, found 2"
        );
        assert_eq!(
            KinematicsError::InvalidDof(7).to_string(),
            "Unsupported number of joints: 7 (1 to 6 are supported)"
        );
    }
}
