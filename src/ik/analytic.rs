//! Closed form inverse kinematics of the planar two link arm

use nalgebra::Vector3;

use crate::kinematic_traits::Solutions;
use crate::parameters::{DhLink, CM_TO_M};
use crate::utils::normalize_angle;

/// How far off the working plane (meters) the target may be.
const PLANE_TOLERANCE: f64 = 1e-6;

/// Link twist below which the link counts as planar.
const TWIST_TOLERANCE: f64 = 1e-9;

/// True if both joint axes are parallel (zero link twist), so the tool moves in the plane
/// z = d1 + d2.
pub fn is_planar_two_link(chain: &[DhLink]) -> bool {
    chain.len() == 2
        && chain
            .iter()
            .all(|link| link.alpha.sin().abs() < TWIST_TOLERANCE && link.alpha.cos() > 0.0)
}

/// Both law of cosines solutions for the planar two link arm.
///
/// Returns None if the chain is not a planar two link arm or the target is not on its
/// working plane. The list is empty if the target is out of reach. The second joint is
/// positive in the first solution and negative in the second; they coincide when the arm
/// is fully stretched or folded. Joint limits are not checked here.
pub fn analytical_2dof(chain: &[DhLink], target: &Vector3<f64>) -> Option<Solutions> {
    if !is_planar_two_link(chain) {
        return None;
    }
    let plane = (chain[0].d + chain[1].d) * CM_TO_M;
    if (target.z - plane).abs() > PLANE_TOLERANCE {
        return None;
    }

    let l1 = chain[0].a * CM_TO_M;
    let l2 = chain[1].a * CM_TO_M;
    if l1 <= 0.0 || l2 <= 0.0 {
        return None;
    }

    let (x, y) = (target.x, target.y);
    let r = x.hypot(y);
    if r > l1 + l2 + PLANE_TOLERANCE || r < (l1 - l2).abs() - PLANE_TOLERANCE {
        return Some(Vec::new());
    }

    let cos_elbow = ((x * x + y * y - l1 * l1 - l2 * l2) / (2.0 * l1 * l2)).clamp(-1.0, 1.0);
    let elbow = cos_elbow.acos();

    let solutions = [elbow, -elbow]
        .iter()
        .map(|&theta2| {
            let theta1 = y.atan2(x) - (l2 * theta2.sin()).atan2(l1 + l2 * theta2.cos());
            vec![
                normalize_angle(theta1 - chain[0].theta_offset),
                normalize_angle(theta2 - chain[1].theta_offset),
            ]
        })
        .collect();
    Some(solutions)
}
