use std::f64::consts::PI;

use crate::kinematic_traits::MAX_DOF;
use crate::kinematics_error::{ensure_finite, KinematicsError};

/// Default joint limits in degrees, indexed by joint. Joints beyond the sixth are not supported.
pub const DEFAULT_LIMITS_DEG: [(f64, f64); MAX_DOF] = [
    (-180.0, 180.0),
    (-135.0, 135.0),
    (-90.0, 90.0),
    (-180.0, 180.0),
    (-120.0, 120.0),
    (-180.0, 180.0),
];

/// Per-joint lower and upper limits, radians. There is one (min, max) pair for every
/// joint of the chain; the table belongs to the caller and is passed alongside the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    /// Lower limit of each joint, radians
    pub from: Vec<f64>,

    /// Upper limit of each joint, radians
    pub to: Vec<f64>,
}

/// A joint found outside its configured range. Violations are rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimitViolation {
    /// Zero based joint index
    pub joint: usize,
    pub angle: f64,
    pub min: f64,
    pub max: f64,
}

impl Constraints {
    /// Limits from (min, max) pairs, radians.
    pub fn new(limits: &[(f64, f64)]) -> Result<Self, KinematicsError> {
        if limits.is_empty() || limits.len() > MAX_DOF {
            return Err(KinematicsError::InvalidDof(limits.len()));
        }
        for (joint, &(min, max)) in limits.iter().enumerate() {
            ensure_finite("joint limits", &[min, max]).map_err(|_| KinematicsError::NonFinite {
                what: "joint limits",
                index: joint,
            })?;
            if min > max {
                return Err(KinematicsError::InvalidLimits { joint, min, max });
            }
        }
        Ok(Constraints {
            from: limits.iter().map(|l| l.0).collect(),
            to: limits.iter().map(|l| l.1).collect(),
        })
    }

    /// Limits from (min, max) pairs given in degrees.
    pub fn from_degrees(limits: &[(f64, f64)]) -> Result<Self, KinematicsError> {
        let radians: Vec<(f64, f64)> = limits
            .iter()
            .map(|&(min, max)| (min.to_radians(), max.to_radians()))
            .collect();
        Constraints::new(&radians)
    }

    /// The default limits table for the chain with the given number of joints.
    pub fn default_for_dof(dof: usize) -> Result<Self, KinematicsError> {
        if dof == 0 || dof > MAX_DOF {
            return Err(KinematicsError::InvalidDof(dof));
        }
        Constraints::from_degrees(&DEFAULT_LIMITS_DEG[..dof])
    }

    /// All joints allowed the full turn from -PI to PI.
    pub fn full_circle(dof: usize) -> Result<Self, KinematicsError> {
        Constraints::new(&vec![(-PI, PI); dof])
    }

    /// Number of joints these limits are defined for.
    pub fn dof(&self) -> usize {
        self.from.len()
    }

    /// Checks that the table matches the chain length.
    pub fn ensure_dof(&self, dof: usize) -> Result<(), KinematicsError> {
        if self.dof() != dof {
            return Err(KinematicsError::InvalidLength {
                what: "joint limits",
                expected: dof,
                found: self.dof(),
            });
        }
        Ok(())
    }

    /// Returns the first joint outside its limits, if any.
    pub fn violation(&self, angles: &[f64]) -> Option<JointLimitViolation> {
        angles
            .iter()
            .zip(self.from.iter().zip(self.to.iter()))
            .enumerate()
            .find(|(_, (angle, (min, max)))| !(**angle >= **min && **angle <= **max))
            .map(|(joint, (angle, (min, max)))| JointLimitViolation {
                joint,
                angle: *angle,
                min: *min,
                max: *max,
            })
    }

    pub fn compliant(&self, angles: &[f64]) -> bool {
        angles.len() == self.dof() && self.violation(angles).is_none()
    }

    pub fn filter(&self, angles: &[Vec<f64>]) -> Vec<Vec<f64>> {
        angles
            .iter()
            .filter(|angle_array| self.compliant(angle_array))
            .cloned()
            .collect()
    }

    /// Brings the configuration into limits. Only used to place initial guesses of the
    /// solver inside its bounds; solutions themselves are never clamped.
    pub(crate) fn project(&self, angles: &mut [f64]) {
        for (i, angle) in angles.iter_mut().enumerate() {
            *angle = angle.clamp(self.from[i], self.to[i]);
        }
    }
}
