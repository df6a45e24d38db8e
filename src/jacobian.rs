extern crate nalgebra as na;

use na::linalg::SVD;
use na::{DMatrix, DVector, Isometry3, Vector3, Vector6};
use tracing::debug;

use crate::kinematic_traits::Joints;
use crate::kinematics_error::KinematicsError;
use crate::kinematics_impl::transformation_chain;
use crate::parameters::DhLink;

/// Damping the original singularity avoidance used.
pub const DEFAULT_DAMPING: f64 = 0.1;

/// Singular values below this (relative to the largest) are treated as zero by the
/// SVD pseudo-inverse fallback.
const PSEUDO_INVERSE_EPSILON: f64 = 1e-12;

/// The damped matrix is considered singular when its reciprocal condition number
/// drops below this value.
const MIN_RECIPROCAL_CONDITION: f64 = 1e-12;

/// When the configuration is called singular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingularityThresholds {
    /// Singular if the absolute determinant (of J, or of JᵀJ for non square J) is below.
    pub determinant: f64,

    /// Singular if the condition number of the same matrix is above.
    pub condition_number: f64,
}

impl Default for SingularityThresholds {
    fn default() -> Self {
        SingularityThresholds {
            determinant: 1e-6,
            condition_number: 100.0,
        }
    }
}

/// Result of the singularity check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingularityReport {
    pub is_singular: bool,
    pub determinant: f64,
    pub condition_number: f64,

    /// Rank of the Jacobian itself (not of the squared matrix).
    pub rank: usize,
}

/// Struct representing the Jacobian matrix
pub struct Jacobian {
    /// A 6xN matrix representing the Jacobian
    ///
    /// The Jacobian matrix maps the joint velocities to the end-effector velocities.
    /// Each column corresponds to a joint, the first three rows give the linear and
    /// the last three rows the angular velocity of the end-effector.
    matrix: DMatrix<f64>,

    /// Damping used when the matrix must be pseudo-inverted
    damping: f64,
}

impl Jacobian {
    /// Constructs a new Jacobian struct by computing the Jacobian matrix for the given chain
    /// and joint configuration.
    pub fn new(chain: &[DhLink], qs: &[f64]) -> Result<Self, KinematicsError> {
        let matrix = compute_jacobian(chain, qs)?;
        Ok(Self {
            matrix,
            damping: 0.0,
        })
    }

    /// Use damped least squares when inverting (see [`damped_pseudo_inverse`]).
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn singularity(&self, thresholds: &SingularityThresholds) -> SingularityReport {
        check_singularity(&self.matrix, thresholds)
    }

    pub fn manipulability(&self) -> f64 {
        compute_manipulability(&self.matrix)
    }

    /// Computes the joint velocities required to achieve a desired end-effector velocity
    ///
    /// # Arguments
    ///
    /// * `desired_end_effector_velocity` - An Isometry3 representing the desired linear and angular velocity of the end-effector
    ///
    /// # Returns
    ///
    /// Joint values, representing joint velocities rather than angles,
    /// or an error if the computation fails.
    pub fn velocities(
        &self,
        desired_end_effector_velocity: &Isometry3<f64>,
    ) -> Result<Joints, KinematicsError> {
        let linear_velocity = desired_end_effector_velocity.translation.vector;
        let angular_velocity = desired_end_effector_velocity.rotation.scaled_axis();

        let desired_velocity = Vector6::new(
            linear_velocity.x, linear_velocity.y, linear_velocity.z,
            angular_velocity.x, angular_velocity.y, angular_velocity.z,
        );
        self.velocities_from_vector(&desired_velocity)
    }

    /// Computes the joint velocities required to achieve a desired end-effector velocity,
    /// given as [vx, vy, vz, wx, wy, wz].
    ///
    /// The inverse of the Jacobian is used when it exists (6 joints, not singular).
    /// Otherwise the velocities are the least squares fit from the (damped) pseudo-inverse.
    pub fn velocities_from_vector(
        &self,
        desired_end_effector_velocity: &Vector6<f64>,
    ) -> Result<Joints, KinematicsError> {
        let desired = DVector::from_column_slice(desired_end_effector_velocity.as_slice());
        let square_inverse = if self.matrix.is_square() {
            self.matrix.clone().try_inverse()
        } else {
            None
        };
        let joint_velocities = match square_inverse {
            Some(inverse) => inverse * desired,
            None => damped_pseudo_inverse(&self.matrix, self.damping)? * desired,
        };
        Ok(joint_velocities.iter().copied().collect())
    }
}

/// Computes the geometric Jacobian of the chain for the given joints.
///
/// Column `i` is built from the frame joint `i` rotates in (entry `i` of
/// [`transformation_chain`]): the linear part is `z_i × (p_end − p_i)` and the angular
/// part is `z_i`. The frames are the same as used by the forward kinematics, no numeric
/// differentiation is involved.
pub fn compute_jacobian(chain: &[DhLink], joints: &[f64]) -> Result<DMatrix<f64>, KinematicsError> {
    let frames = transformation_chain(chain, joints)?;
    let end_position = frames[chain.len()].translation.vector;
    let mut jacobian = DMatrix::zeros(6, chain.len());

    for (i, frame) in frames.iter().take(chain.len()).enumerate() {
        let z_axis: Vector3<f64> = frame.rotation * Vector3::z();
        let linear = z_axis.cross(&(end_position - frame.translation.vector));
        jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&linear);
        jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&z_axis);
    }
    Ok(jacobian)
}

/// Checks how close the Jacobian is to singularity. Non square matrices are squared
/// as JᵀJ before taking the determinant and the condition number.
pub fn check_singularity(
    jacobian: &DMatrix<f64>,
    thresholds: &SingularityThresholds,
) -> SingularityReport {
    let square = if jacobian.is_square() {
        jacobian.clone()
    } else {
        jacobian.transpose() * jacobian
    };

    let determinant = square.determinant();
    let condition_number = condition_number(&square);
    let rank = rank(jacobian);
    let is_singular = determinant.abs() < thresholds.determinant
        || condition_number > thresholds.condition_number
        || !condition_number.is_finite();

    SingularityReport {
        is_singular,
        determinant,
        condition_number,
        rank,
    }
}

/// Yoshikawa manipulability index: |det J| for square J, otherwise the square root of
/// the determinant of the smaller Gram matrix (JᵀJ for the usual 6xN, N < 6).
/// For N < 6 this is not sqrt(det(J·Jᵀ)), which is always zero there.
pub fn compute_manipulability(jacobian: &DMatrix<f64>) -> f64 {
    if jacobian.is_square() {
        return jacobian.determinant().abs();
    }
    let gram = if jacobian.nrows() > jacobian.ncols() {
        jacobian.transpose() * jacobian
    } else {
        jacobian * jacobian.transpose()
    };
    gram.determinant().max(0.0).sqrt()
}

/// Damped least squares pseudo-inverse (JᵀJ + λI)⁻¹Jᵀ.
///
/// Only if the damped matrix is found singular or ill-conditioned (possible with a zero
/// or tiny λ) the SVD-based pseudo-inverse of J is returned instead.
pub fn damped_pseudo_inverse(
    jacobian: &DMatrix<f64>,
    lambda: f64,
) -> Result<DMatrix<f64>, KinematicsError> {
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(KinematicsError::argument(
            "lambda",
            format!("damping must be finite and not negative, got {lambda}"),
        ));
    }
    let transposed = jacobian.transpose();
    let n = jacobian.ncols();
    let damped = &transposed * jacobian + DMatrix::<f64>::identity(n, n) * lambda;

    if reciprocal_condition(&damped) >= MIN_RECIPROCAL_CONDITION {
        if let Some(inverse) = damped.try_inverse() {
            return Ok(inverse * transposed);
        }
    }

    debug!("Damped matrix is singular (lambda = {lambda}), using SVD pseudo-inverse");
    SVD::new(jacobian.clone(), true, true)
        .pseudo_inverse(PSEUDO_INVERSE_EPSILON)
        .map_err(|e| KinematicsError::LinearAlgebra(e.to_string()))
}

/// Damped pseudo-inverse with the default damping, for moving near singular configurations.
pub fn avoid_singularity(jacobian: &DMatrix<f64>) -> Result<DMatrix<f64>, KinematicsError> {
    damped_pseudo_inverse(jacobian, DEFAULT_DAMPING)
}

fn singular_values(matrix: &DMatrix<f64>) -> DVector<f64> {
    matrix.clone().svd(false, false).singular_values
}

fn condition_number(matrix: &DMatrix<f64>) -> f64 {
    let values = singular_values(matrix);
    let min = values.min();
    if min <= 0.0 {
        return f64::INFINITY;
    }
    values.max() / min
}

fn reciprocal_condition(matrix: &DMatrix<f64>) -> f64 {
    let values = singular_values(matrix);
    let max = values.max();
    if max <= 0.0 {
        return 0.0;
    }
    values.min() / max
}

fn rank(matrix: &DMatrix<f64>) -> usize {
    let values = singular_values(matrix);
    let tolerance = values.max() * matrix.nrows().max(matrix.ncols()) as f64 * f64::EPSILON;
    values.iter().filter(|&&v| v > tolerance).count()
}
