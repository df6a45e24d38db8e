//! Reachable workspace sampling and mechanism mobility.

use nalgebra::Vector3;
use rand::Rng;
use tracing::debug;

use crate::constraints::Constraints;
use crate::kinematics_error::KinematicsError;
use crate::kinematics_impl::{check_input, end_pose};
use crate::parameters::DhLink;

/// Number of random configurations sampled for chains of three or more joints.
pub const RANDOM_SAMPLES: usize = 1000;

/// Grid size used per joint for the random sampling of longer chains.
pub const MAX_RANDOM_RESOLUTION: usize = 20;

/// `count` evenly spaced values from `min` to `max`, both included.
fn linspace(min: f64, max: f64, count: usize) -> Vec<f64> {
    if count == 1 {
        return vec![min];
    }
    let step = (max - min) / (count - 1) as f64;
    (0..count).map(|i| min + step * i as f64).collect()
}

/// Tool positions (meters) spread over the reachable workspace.
///
/// Chains of one or two joints are sampled on the full grid of `resolution` values per
/// joint over the joint limits. Longer chains would need too many grid points, so
/// [`RANDOM_SAMPLES`] configurations are drawn from a grid of at most
/// [`MAX_RANDOM_RESOLUTION`] values between -90° and 90° per joint.
pub fn sample_workspace<R: Rng + ?Sized>(
    chain: &[DhLink],
    limits: &Constraints,
    resolution: usize,
    rng: &mut R,
) -> Result<Vec<Vector3<f64>>, KinematicsError> {
    let dof = chain.len();
    check_input(chain, &vec![0.0; dof])?;
    limits.ensure_dof(dof)?;
    if resolution == 0 {
        return Err(KinematicsError::argument("resolution", "must be at least 1"));
    }

    let position = |joints: &[f64]| end_pose(chain, joints).translation.vector;
    let points: Vec<Vector3<f64>> = match dof {
        1 => linspace(limits.from[0], limits.to[0], resolution)
            .into_iter()
            .map(|q| position(&[q]))
            .collect(),
        2 => {
            let first = linspace(limits.from[0], limits.to[0], resolution);
            let second = linspace(limits.from[1], limits.to[1], resolution);
            first
                .iter()
                .flat_map(|&q1| second.iter().map(move |&q2| [q1, q2]))
                .map(|joints| position(&joints))
                .collect()
        }
        _ => {
            let grid = linspace(
                (-90f64).to_radians(),
                90f64.to_radians(),
                resolution.min(MAX_RANDOM_RESOLUTION),
            );
            (0..RANDOM_SAMPLES)
                .map(|_| {
                    let joints: Vec<f64> =
                        (0..dof).map(|_| grid[rng.gen_range(0..grid.len())]).collect();
                    position(&joints)
                })
                .collect()
        }
    };
    debug!("Sampled {} workspace points for {dof} joints", points.len());
    Ok(points)
}

/// Space the mechanism moves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Planar,
    Spatial,
}

impl Space {
    /// Degrees of freedom of a free body in this space.
    pub fn mobility(self) -> usize {
        match self {
            Space::Planar => 3,
            Space::Spatial => 6,
        }
    }
}

/// `count` joints, each allowing `freedom` degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointGroup {
    pub count: usize,
    pub freedom: usize,
}

/// Grübler (Kutzbach) mobility M = λ(N − 1 − J) + Σ fᵢ of the mechanism with `links`
/// links (the ground included). Negative values mean an overconstrained structure.
pub fn grubler_mobility(
    links: usize,
    joints: &[JointGroup],
    space: Space,
) -> Result<i64, KinematicsError> {
    if links == 0 {
        return Err(KinematicsError::argument("links", "at least the ground link is required"));
    }
    let lambda = space.mobility();
    if let Some(group) = joints.iter().find(|g| g.freedom > lambda) {
        return Err(KinematicsError::argument(
            "joints",
            format!("joint freedom {} exceeds the mobility {lambda} of the space", group.freedom),
        ));
    }
    let joint_count: i64 = joints.iter().map(|g| g.count as i64).sum();
    let freedoms: i64 = joints.iter().map(|g| (g.count * g.freedom) as i64).sum();
    Ok(lambda as i64 * (links as i64 - 1 - joint_count) + freedoms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_planar_grid() {
        let chain = [DhLink::planar(40.0), DhLink::planar(30.0)];
        let limits = Constraints::default_for_dof(2).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let points = sample_workspace(&chain, &limits, 10, &mut rng).unwrap();
        assert_eq!(points.len(), 100);
        for p in &points {
            let r = p.norm();
            assert!(r <= 0.7 + 1e-12 && r >= 0.1 - 1e-12);
            assert!(p.z.abs() < 1e-12);
        }
    }

    #[test]
    fn test_single_joint_circle() {
        let chain = [DhLink::planar(20.0)];
        let limits = Constraints::default_for_dof(1).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let points = sample_workspace(&chain, &limits, 5, &mut rng).unwrap();
        assert_eq!(points.len(), 5);
        assert!(points.iter().all(|p| (p.norm() - 0.2).abs() < 1e-12));
    }

    #[test]
    fn test_random_sampling_is_seeded() {
        let chain = [DhLink::from_degrees(0.0, 90.0, 30.0, 0.0), DhLink::planar(25.0), DhLink::planar(20.0)];
        let limits = Constraints::default_for_dof(3).unwrap();
        let first = sample_workspace(&chain, &limits, 50, &mut StdRng::seed_from_u64(9)).unwrap();
        let second = sample_workspace(&chain, &limits, 50, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(first.len(), RANDOM_SAMPLES);
        assert_eq!(first, second);
        let reach = 0.3 + 0.25 + 0.2;
        assert!(first.iter().all(|p| p.norm() <= reach + 1e-12));
    }

    #[test]
    fn test_workspace_errors() {
        let chain = [DhLink::planar(20.0)];
        let limits = Constraints::default_for_dof(2).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(sample_workspace(&chain, &limits, 5, &mut rng).is_err());
        let limits = Constraints::default_for_dof(1).unwrap();
        assert!(sample_workspace(&chain, &limits, 0, &mut rng).is_err());
    }

    #[test]
    fn test_grubler() {
        // Four bar linkage: 4 links, 4 revolute joints, one degree of freedom
        let four_bar = [JointGroup { count: 4, freedom: 1 }];
        assert_eq!(grubler_mobility(4, &four_bar, Space::Planar).unwrap(), 1);

        // Six axis serial arm: 7 links with the ground, 6 revolute joints
        let arm = [JointGroup { count: 6, freedom: 1 }];
        assert_eq!(grubler_mobility(7, &arm, Space::Spatial).unwrap(), 6);

        // Triangle of three links is a structure
        let triangle = [JointGroup { count: 3, freedom: 1 }];
        assert_eq!(grubler_mobility(3, &triangle, Space::Planar).unwrap(), 0);

        assert!(grubler_mobility(0, &arm, Space::Spatial).is_err());
        let ball = [JointGroup { count: 1, freedom: 4 }];
        assert!(grubler_mobility(2, &ball, Space::Planar).is_err());
        assert_eq!(grubler_mobility(2, &ball, Space::Spatial).unwrap(), 4);
    }
}
