//! Defines the Denavit-Hartenberg link data structure

use std::fmt;

use crate::kinematic_traits::MAX_DOF;
use crate::kinematics_error::{ensure_finite, KinematicsError};

/// Conversion factor from the DH length unit (centimeters) to the pose unit (meters).
/// Lengths are only converted in `dh_transform`, nowhere else.
pub const CM_TO_M: f64 = 0.01;

/// Standard Denavit-Hartenberg parameters of a single link.
///
/// Lengths `a` and `d` are in centimeters (as the robot data sheets usually give them),
/// angles `alpha` and `theta_offset` are in radians. Use [`DhLink::from_degrees`] to build
/// the link from the degree values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhLink {
    /// Link length along the common normal (x axis), centimeters.
    pub a: f64,

    /// Link twist about the x axis, radians.
    pub alpha: f64,

    /// Link offset along the previous z axis, centimeters.
    pub d: f64,

    /// Constant offset added to the joint variable, radians.
    pub theta_offset: f64,
}

impl DhLink {
    /// Creates the link from lengths in centimeters and angles in radians.
    pub fn new(a: f64, alpha: f64, d: f64, theta_offset: f64) -> Self {
        DhLink {
            a,
            alpha,
            d,
            theta_offset,
        }
    }

    /// Creates the link from lengths in centimeters and angles in degrees.
    pub fn from_degrees(a: f64, alpha_deg: f64, d: f64, theta_offset_deg: f64) -> Self {
        DhLink::new(a, alpha_deg.to_radians(), d, theta_offset_deg.to_radians())
    }

    /// Planar revolute link of the given length in centimeters.
    pub fn planar(a: f64) -> Self {
        DhLink::new(a, 0.0, 0.0, 0.0)
    }

    /// Length of the translation this link contributes, in meters. The distance
    /// between consecutive frame origins is always exactly this value.
    pub fn reach(&self) -> f64 {
        self.a.hypot(self.d) * CM_TO_M
    }

    fn values(&self) -> [f64; 4] {
        [self.a, self.alpha, self.d, self.theta_offset]
    }
}

impl fmt::Display for DhLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a: {:.1} cm, alpha: {:.1}°, d: {:.1} cm, theta: {:.1}°",
            self.a,
            self.alpha.to_degrees(),
            self.d,
            self.theta_offset.to_degrees()
        )
    }
}

/// Checks the chain shape: between 1 and 6 links, all parameters finite.
pub fn validate_chain(chain: &[DhLink]) -> Result<(), KinematicsError> {
    if chain.is_empty() || chain.len() > MAX_DOF {
        return Err(KinematicsError::InvalidDof(chain.len()));
    }
    for (index, link) in chain.iter().enumerate() {
        if ensure_finite("DH parameters", &link.values()).is_err() {
            return Err(KinematicsError::NonFinite {
                what: "DH parameters",
                index,
            });
        }
    }
    Ok(())
}

/// Maximal distance from the base the chain may reach, meters.
pub fn max_reach(chain: &[DhLink]) -> f64 {
    chain.iter().map(DhLink::reach).sum()
}

/// Minimal distance from the base the chain may reach, meters. It is only positive
/// when a single link is longer than all others taken together.
pub fn min_reach(chain: &[DhLink]) -> f64 {
    let total = max_reach(chain);
    let longest = chain.iter().map(DhLink::reach).fold(0.0, f64::max);
    (2.0 * longest - total).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_degrees() {
        let link = DhLink::from_degrees(25.0, 90.0, 15.0, -45.0);
        assert_eq!(link.a, 25.0);
        assert!((link.alpha - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(link.d, 15.0);
        assert!((link.theta_offset + std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_reach() {
        let chain = [DhLink::planar(40.0), DhLink::planar(30.0)];
        assert!((max_reach(&chain) - 0.7).abs() < 1e-12);
        assert!((min_reach(&chain) - 0.1).abs() < 1e-12);

        // Offset d counts into the length of the link translation
        let link = DhLink::new(30.0, 0.0, 40.0, 0.0);
        assert!((link.reach() - 0.5).abs() < 1e-12);

        let balanced = [DhLink::planar(30.0), DhLink::planar(20.0), DhLink::planar(10.0)];
        assert_eq!(min_reach(&balanced), 0.0);
    }

    #[test]
    fn test_validate_chain() {
        assert!(validate_chain(&[DhLink::planar(10.0)]).is_ok());
        assert_eq!(validate_chain(&[]), Err(KinematicsError::InvalidDof(0)));
        assert_eq!(
            validate_chain(&[DhLink::planar(10.0); 7]),
            Err(KinematicsError::InvalidDof(7))
        );
        let broken = [DhLink::planar(10.0), DhLink::new(1.0, f64::NAN, 0.0, 0.0)];
        assert_eq!(
            validate_chain(&broken),
            Err(KinematicsError::NonFinite {
                what: "DH parameters",
                index: 1
            })
        );
    }
}
