//! Helper functions

use std::f64::consts::{PI, TAU};

use crate::kinematic_traits::{Joints, Solutions};
use nalgebra::{Isometry3, UnitQuaternion};

/// Checks if all elements in the array are finite
pub fn is_valid(qs: &[f64]) -> bool {
    qs.iter().all(|&q| q.is_finite())
}

/// Allows to specify joint values in degrees (converts to radians)
pub fn as_radians(degrees: &[f64]) -> Joints {
    degrees.iter().map(|d| d.to_radians()).collect()
}

/// Convert joints in radians to degrees
pub fn to_degrees(angles: &[f64]) -> Vec<f64> {
    angles.iter().map(|a| a.to_degrees()).collect()
}

/// Wraps the angle into (-PI, PI].
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Signed shortest rotation from `from` to `to`, in (-PI, PI].
pub fn angle_difference(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

fn format_joints(joints: &[f64]) -> String {
    let row: Vec<String> = joints
        .iter()
        .map(|q| format!("{:5.2}", q.to_degrees()))
        .collect();
    format!("[{}]", row.join(" "))
}

/// Print joint values for all solutions, converting radians to degrees.
#[allow(dead_code)]
pub fn dump_solutions(solutions: &Solutions) {
    if solutions.is_empty() {
        println!("No solutions");
    }
    for solution in solutions {
        println!("{}", format_joints(solution));
    }
}

/// Print joint values, converting radians to degrees.
#[allow(dead_code)]
pub fn dump_joints(joints: &[f64]) {
    println!("{}", format_joints(joints));
}

pub fn dump_pose(isometry: &Isometry3<f64>) {
    // Extract translation components
    let translation = isometry.translation.vector;

    // Extract rotation components and convert to Euler angles in radians
    let rotation: UnitQuaternion<f64> = isometry.rotation;

    // Print translation and rotation
    println!(
        "x: {:.5}, y: {:.5}, z: {:.5},  quat: {:.5},{:.5},{:.5},{:.5}",
        translation.x, translation.y, translation.z, rotation.i, rotation.j, rotation.k, rotation.w
    );
}

pub fn assert_pose_eq(ta: &Isometry3<f64>, tb: &Isometry3<f64>,
                 distance_tolerance: f64, angular_tolerance: f64) -> bool {
    fn bad(ta: &Isometry3<f64>, tb: &Isometry3<f64>) {
        dump_pose(ta);
        dump_pose(tb);
    }

    let translation_distance = (ta.translation.vector - tb.translation.vector).norm();
    let angular_distance = ta.rotation.angle_to(&tb.rotation);

    if translation_distance.abs() > distance_tolerance {
        bad(ta, tb);
        panic!("Poses have too different translations");
    }

    if angular_distance.abs() > angular_tolerance {
        bad(ta, tb);
        panic!("Poses have too different angles");
    }
    true
}
