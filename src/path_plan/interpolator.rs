//! Joint space interpolation that turns every joint the short way round.

use crate::kinematic_traits::Joints;
use crate::kinematics_error::{ensure_finite, ensure_length, KinematicsError};
use crate::utils::{angle_difference, normalize_angle};

/// Configuration at `t` (0.0 to 1.0) between `start` and `end`. Every joint moves by the
/// shortest signed difference, wrapped into (-PI, PI]; results are normalized the same way.
/// Values of `t` outside the range are clamped.
pub fn interpolate_joints(start: &[f64], end: &[f64], t: f64) -> Joints {
    let t = t.clamp(0.0, 1.0);
    start
        .iter()
        .zip(end.iter())
        .map(|(&from, &to)| normalize_angle(from + t * angle_difference(from, to)))
        .collect()
}

/// `steps + 1` evenly spaced configurations from `start` to `end`, both included.
pub fn interpolate_path(
    start: &[f64],
    end: &[f64],
    steps: usize,
) -> Result<Vec<Joints>, KinematicsError> {
    if steps == 0 {
        return Err(KinematicsError::argument("steps", "at least one step is required"));
    }
    ensure_length("goal", end, start.len())?;
    ensure_finite("start", start)?;
    ensure_finite("goal", end)?;
    Ok((0..=steps)
        .map(|i| interpolate_joints(start, end, i as f64 / steps as f64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_interpolate_midpoint() {
        let start = [0.0, 1.0];
        let end = [1.0, -1.0];
        let middle = interpolate_joints(&start, &end, 0.5);
        assert!((middle[0] - 0.5).abs() < 1e-12);
        assert!(middle[1].abs() < 1e-12);
    }

    #[test]
    fn test_wraps_the_short_way() {
        let start = [170f64.to_radians()];
        let end = [-170f64.to_radians()];
        // Half way is 180°, not 0°
        let middle = interpolate_joints(&start, &end, 0.5);
        assert!((middle[0].abs() - PI).abs() < 1e-12);

        let quarter = interpolate_joints(&start, &end, 0.25);
        assert!((quarter[0] - 175f64.to_radians()).abs() < 1e-12);
    }

    #[test]
    fn test_clamped_parameter() {
        let start = [0.2];
        let end = [0.4];
        assert_eq!(interpolate_joints(&start, &end, -1.0), vec![0.2]);
        assert!((interpolate_joints(&start, &end, 2.0)[0] - 0.4).abs() < 1e-15);
    }

    #[test]
    fn test_path() {
        let path = interpolate_path(&[0.0, 0.0], &[0.4, -0.8], 40).unwrap();
        assert_eq!(path.len(), 41);
        assert_eq!(path[0], vec![0.0, 0.0]);
        assert!((path[40][0] - 0.4).abs() < 1e-12);
        assert!((path[40][1] + 0.8).abs() < 1e-12);
        assert!((path[10][0] - 0.1).abs() < 1e-12);

        assert!(interpolate_path(&[0.0], &[0.4], 0).is_err());
        assert!(interpolate_path(&[0.0], &[0.4, 0.1], 10).is_err());
    }
}
