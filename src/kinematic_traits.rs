extern crate nalgebra as na;

use na::Isometry3;
use rand::RngCore;

use crate::constraints::Constraints;
use crate::ik::{IkOutcome, IkTarget};
use crate::jacobian::SingularityReport;
use crate::kinematics_error::KinematicsError;

/// Pose is used a pose of the robot tcp. It contains both Cartesian position (meters)
/// and rotation quaternion. The homogeneous 4x4 form is available with `to_homogeneous()`.
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion, Vector3};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// // The quaternion should be normalized to represent a valid rotation.
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0).normalize());
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Joint angles in radians, one value per link of the chain.
pub type Joints = Vec<f64>;

/// The inverse kinematics may return several (up to three by default) solutions.
pub type Solutions = Vec<Joints>;

/// The largest chain this library works with.
pub const MAX_DOF: usize = 6;

/// Seam shared by all robot representations of this crate. Implementations bundle
/// the chain, its joint limits and solver settings, so that the caller only deals with
/// joints and poses.
pub trait Kinematics {
    /// Number of joints
    fn dof(&self) -> usize;

    /// Joint limits, one range per joint.
    fn constraints(&self) -> &Constraints;

    /// Pose of the tool flange (end of the last link) for the given joints.
    fn forward(&self, qs: &[f64]) -> Result<Pose, KinematicsError>;

    /// Poses of the base and of the end of every link, base first. The last entry
    /// is the same as returned by `forward`.
    fn forward_with_joint_poses(&self, qs: &[f64]) -> Result<Vec<Pose>, KinematicsError>;

    /// Solve the inverse kinematics for the target. The `previous` joints, if given,
    /// are tried as the first initial guess. All randomness is taken from `rng`.
    fn inverse(
        &self,
        target: &IkTarget,
        previous: Option<&[f64]>,
        rng: &mut dyn RngCore,
    ) -> Result<IkOutcome, KinematicsError>;

    /// Returns the singularity report if the robot is singular or close to being singular
    /// with the given joints, None otherwise.
    fn kinematic_singularity(&self, qs: &[f64])
                             -> Result<Option<SingularityReport>, KinematicsError>;
}
