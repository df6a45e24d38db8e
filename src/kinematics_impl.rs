//! Forward kinematics of the DH chain and the [`Kinematics`] implementation
//! that bundles chain, joint limits and solver settings.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rand::RngCore;

use crate::constraints::Constraints;
use crate::ik::{inverse_kinematics, IkConfig, IkOutcome, IkTarget};
use crate::jacobian::{check_singularity, compute_jacobian, SingularityReport, SingularityThresholds};
use crate::kinematic_traits::{Kinematics, Pose};
use crate::kinematics_error::{ensure_finite, ensure_length, KinematicsError};
use crate::parameters::{validate_chain, DhLink, CM_TO_M};

/// Transform of a single link: Rotz(theta) * Transz(d) * Transx(a) * Rotx(alpha),
/// where theta is the joint angle plus the link's angular offset.
///
/// This is the only place where the DH lengths are converted from centimeters
/// to meters.
pub fn dh_transform(link: &DhLink, joint_angle: f64) -> Pose {
    let theta = joint_angle + link.theta_offset;
    let rot_z = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), theta);
    let rot_x = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), link.alpha);

    // Transz(d) * Transx(a) is a single translation; expressed in the rotated frame
    // it becomes (a cos(theta), a sin(theta), d).
    let a = link.a * CM_TO_M;
    let d = link.d * CM_TO_M;
    let translation = Translation3::new(a * theta.cos(), a * theta.sin(), d);

    Isometry3::from_parts(translation, rot_z * rot_x)
}

/// Checks that joints match the chain and everything is finite.
pub(crate) fn check_input(chain: &[DhLink], joints: &[f64]) -> Result<(), KinematicsError> {
    validate_chain(chain)?;
    ensure_length("joints", joints, chain.len())?;
    ensure_finite("joints", joints)
}

/// Pose of the end of the chain: product of all link transforms in chain order.
pub fn forward_kinematics(chain: &[DhLink], joints: &[f64]) -> Result<Pose, KinematicsError> {
    check_input(chain, joints)?;
    Ok(end_pose(chain, joints))
}

/// Same as [`forward_kinematics`] for input that has already been checked.
pub(crate) fn end_pose(chain: &[DhLink], joints: &[f64]) -> Pose {
    chain
        .iter()
        .zip(joints.iter())
        .fold(Pose::identity(), |pose, (link, &q)| pose * dh_transform(link, q))
}

/// Cumulative poses: the base (identity) followed by the pose after every link.
/// Entry `i` is the frame whose z axis joint `i` rotates about.
pub fn transformation_chain(
    chain: &[DhLink],
    joints: &[f64],
) -> Result<Vec<Pose>, KinematicsError> {
    check_input(chain, joints)?;
    let mut poses = Vec::with_capacity(chain.len() + 1);
    let mut pose = Pose::identity();
    poses.push(pose);
    for (link, &q) in chain.iter().zip(joints.iter()) {
        pose *= dh_transform(link, q);
        poses.push(pose);
    }
    Ok(poses)
}

/// Origins of the base and of every link frame, meters.
pub fn link_positions(chain: &[DhLink], joints: &[f64]) -> Result<Vec<Vector3<f64>>, KinematicsError> {
    Ok(transformation_chain(chain, joints)?
        .iter()
        .map(|pose| pose.translation.vector)
        .collect())
}

/// Distance between the end of the chain and the target position, meters.
pub fn position_error(
    chain: &[DhLink],
    joints: &[f64],
    target: &Vector3<f64>,
) -> Result<f64, KinematicsError> {
    let pose = forward_kinematics(chain, joints)?;
    Ok((target - pose.translation.vector).norm())
}

/// Robot described by the DH chain. Owns copies of its chain and joint limits,
/// so it can be handed over as `dyn Kinematics`.
#[derive(Debug, Clone)]
pub struct DHKinematics {
    chain: Vec<DhLink>,
    constraints: Constraints,
    ik_config: IkConfig,
    singularity_thresholds: SingularityThresholds,
}

impl DHKinematics {
    /// Creates the robot with the default joint limits for its number of joints.
    pub fn new(chain: Vec<DhLink>) -> Result<Self, KinematicsError> {
        validate_chain(&chain)?;
        let constraints = Constraints::default_for_dof(chain.len())?;
        Self::new_with_constraints(chain, constraints)
    }

    /// Creates the robot with the explicitly given joint limits.
    pub fn new_with_constraints(
        chain: Vec<DhLink>,
        constraints: Constraints,
    ) -> Result<Self, KinematicsError> {
        validate_chain(&chain)?;
        constraints.ensure_dof(chain.len())?;
        Ok(DHKinematics {
            chain,
            constraints,
            ik_config: IkConfig::default(),
            singularity_thresholds: SingularityThresholds::default(),
        })
    }

    /// Replaces the settings of the inverse kinematics solver.
    pub fn with_ik_config(mut self, ik_config: IkConfig) -> Self {
        self.ik_config = ik_config;
        self
    }

    /// Replaces the thresholds used to call the configuration singular.
    pub fn with_singularity_thresholds(mut self, thresholds: SingularityThresholds) -> Self {
        self.singularity_thresholds = thresholds;
        self
    }

    pub fn chain(&self) -> &[DhLink] {
        &self.chain
    }

    pub fn ik_config(&self) -> &IkConfig {
        &self.ik_config
    }

    pub fn singularity_thresholds(&self) -> &SingularityThresholds {
        &self.singularity_thresholds
    }
}

impl Kinematics for DHKinematics {
    fn dof(&self) -> usize {
        self.chain.len()
    }

    fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    fn forward(&self, qs: &[f64]) -> Result<Pose, KinematicsError> {
        forward_kinematics(&self.chain, qs)
    }

    fn forward_with_joint_poses(&self, qs: &[f64]) -> Result<Vec<Pose>, KinematicsError> {
        transformation_chain(&self.chain, qs)
    }

    fn inverse(
        &self,
        target: &IkTarget,
        previous: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<IkOutcome, KinematicsError> {
        inverse_kinematics(
            &self.chain,
            &self.constraints,
            target,
            previous,
            &self.ik_config,
            rng,
        )
    }

    fn kinematic_singularity(
        &self,
        qs: &[f64],
    ) -> Result<Option<SingularityReport>, KinematicsError> {
        let jacobian = compute_jacobian(&self.chain, qs)?;
        let report = check_singularity(&jacobian, &self.singularity_thresholds);
        Ok(report.is_singular.then_some(report))
    }
}
