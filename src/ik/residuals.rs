//! Error terms of the numeric inverse kinematics.

use nalgebra::{DVector, UnitQuaternion, Vector3};

use crate::kinematic_traits::{Pose, MAX_DOF};

/// Shape of the residual vector for the least squares refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualKind {
    /// Position error only (3 values)
    Position,

    /// Position error and the error of the tool z axis (6 values)
    PositionAndApproach,

    /// Position error, z axis and x axis errors (9 values)
    FullPose,
}

use ResidualKind::*;

/// Residual used when the orientation is requested, indexed by the number of joints minus one.
/// Short chains cannot follow the orientation and only get the position error.
const ORIENTED_RESIDUALS: [ResidualKind; MAX_DOF] = [
    Position,
    Position,
    PositionAndApproach,
    PositionAndApproach,
    PositionAndApproach,
    FullPose,
];

impl ResidualKind {
    /// Looks up the residual for the chain length. Out of range lengths fall back to the
    /// position residual.
    pub fn select(dof: usize, oriented: bool) -> Self {
        match dof.checked_sub(1).and_then(|i| ORIENTED_RESIDUALS.get(i)) {
            Some(&kind) if oriented => kind,
            _ => Position,
        }
    }

    pub fn len(self) -> usize {
        match self {
            Position => 3,
            PositionAndApproach => 6,
            FullPose => 9,
        }
    }

    /// Target minus current, in meters for the position and as unit vector differences
    /// for the axes.
    pub fn evaluate(self, current: &Pose, target: &Pose) -> DVector<f64> {
        let mut residual = DVector::zeros(self.len());
        let position = target.translation.vector - current.translation.vector;
        residual.fixed_rows_mut::<3>(0).copy_from(&position);

        if self != Position {
            let z = target.rotation * Vector3::z() - current.rotation * Vector3::z();
            residual.fixed_rows_mut::<3>(3).copy_from(&z);
        }
        if self == FullPose {
            let x = target.rotation * Vector3::x() - current.rotation * Vector3::x();
            residual.fixed_rows_mut::<3>(6).copy_from(&x);
        }
        residual
    }
}

/// Rotation that brings `current` into `target` (R_target * R_currentᵀ), as axis times
/// angle. The angle comes from the trace, clamped into the arccos domain.
pub fn rotation_error(current: &UnitQuaternion<f64>, target: &UnitQuaternion<f64>) -> Vector3<f64> {
    let error = target * current.inverse();
    let matrix = error.to_rotation_matrix().into_inner();
    let angle = ((matrix.trace() - 1.0) / 2.0).clamp(-1.0, 1.0).acos();
    if angle < 1e-9 {
        return Vector3::zeros();
    }
    let sin = angle.sin();
    if sin.abs() < 1e-6 {
        // Near the half turn the skew part vanishes, the quaternion still knows the axis
        return error.scaled_axis();
    }
    Vector3::new(
        matrix[(2, 1)] - matrix[(1, 2)],
        matrix[(0, 2)] - matrix[(2, 0)],
        matrix[(1, 0)] - matrix[(0, 1)],
    ) * (angle / (2.0 * sin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Isometry3, Translation3};
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_lookup() {
        assert_eq!(ResidualKind::select(1, true), Position);
        assert_eq!(ResidualKind::select(2, true), Position);
        assert_eq!(ResidualKind::select(3, true), PositionAndApproach);
        assert_eq!(ResidualKind::select(5, true), PositionAndApproach);
        assert_eq!(ResidualKind::select(6, true), FullPose);
        assert_eq!(ResidualKind::select(6, false), Position);
        assert_eq!(ResidualKind::select(0, true), Position);
        assert_eq!(ResidualKind::select(7, true), Position);
    }

    #[test]
    fn test_evaluate() {
        let target = Isometry3::from_parts(
            Translation3::new(0.1, 0.2, 0.3),
            UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
        );
        let current = Isometry3::identity();
        let residual = FullPose.evaluate(&current, &target);
        assert_eq!(residual.len(), 9);
        assert!((residual[0] - 0.1).abs() < 1e-12);
        assert!((residual[2] - 0.3).abs() < 1e-12);
        // Rotation about z leaves the z axis in place
        assert!(residual.rows(3, 3).norm() < 1e-12);
        // x axis turned to y
        assert!((residual[6] + 1.0).abs() < 1e-12);
        assert!((residual[7] - 1.0).abs() < 1e-12);

        assert_eq!(Position.evaluate(&target, &target).norm(), 0.0);
    }

    #[test]
    fn test_rotation_error() {
        let current = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        let delta = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.4);
        let target = delta * current;
        let error = rotation_error(&current, &target);
        assert!((error - Vector3::new(0.0, 0.4, 0.0)).norm() < 1e-9);

        assert_eq!(rotation_error(&current, &current), Vector3::zeros());

        let half_turn = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI);
        let error = rotation_error(&UnitQuaternion::identity(), &half_turn);
        assert!((error.norm() - PI).abs() < 1e-6);
    }
}
