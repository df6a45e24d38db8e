use nalgebra::Matrix3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::kinematic_traits::Kinematics;
use crate::kinematics_impl::link_positions;
use crate::utils::assert_pose_eq;
use crate::tests::test_utils::{
    are_isometries_approx_equal, random_joints, robot_from_table, robot_tables,
};

const SMALL: f64 = 1e-9;

#[test]
fn test_rotation_stays_orthonormal() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(2024);
    for table in robot_tables() {
        let robot = robot_from_table(table)?;
        for _ in 0..100 {
            let joints = random_joints(robot.constraints(), 0.0, &mut rng);
            let pose = robot.forward(&joints)?;
            let rotation: Matrix3<f64> = pose.rotation.to_rotation_matrix().into_inner();
            let gram = rotation.transpose() * rotation;
            assert!(
                (gram - Matrix3::identity()).amax() < SMALL,
                "Rotation not orthonormal for {joints:?}"
            );
            assert!((rotation.determinant() - 1.0).abs() < SMALL);
        }
    }
    Ok(())
}

#[test]
fn test_forward_is_deterministic() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(5);
    for table in robot_tables() {
        let robot = robot_from_table(table)?;
        let joints = random_joints(robot.constraints(), 0.0, &mut rng);
        let first = robot.forward(&joints)?;
        let second = robot.forward(&joints)?;
        // Bit equal, not approximately equal
        assert_eq!(first, second);
    }
    Ok(())
}

#[test]
fn test_joint_poses_end_with_forward() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(17);
    for table in robot_tables() {
        let robot = robot_from_table(table)?;
        let joints = random_joints(robot.constraints(), 0.0, &mut rng);
        let poses = robot.forward_with_joint_poses(&joints)?;
        assert_eq!(poses.len(), table.len() + 1);
        assert!(are_isometries_approx_equal(&poses[0], &nalgebra::Isometry3::identity(), SMALL));

        let last = poses.last().unwrap();
        assert_pose_eq(last, &robot.forward(&joints)?, SMALL, SMALL);
    }
    Ok(())
}

#[test]
fn test_links_keep_their_length() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(99);
    for table in robot_tables() {
        let robot = robot_from_table(table)?;
        for _ in 0..20 {
            let joints = random_joints(robot.constraints(), 0.0, &mut rng);
            let positions = link_positions(robot.chain(), &joints)?;
            for (link, pair) in robot.chain().iter().zip(positions.windows(2)) {
                let distance = (pair[1] - pair[0]).norm();
                assert!(
                    (distance - link.reach()).abs() < SMALL,
                    "Link {link} moved by {distance} m"
                );
            }
        }
    }
    Ok(())
}

#[test]
fn test_home_pose_of_industrial_arm() -> anyhow::Result<()> {
    use crate::tests::test_utils::INDUSTRIAL_6;
    let robot = robot_from_table(&INDUSTRIAL_6)?;
    let pose = robot.forward(&[0.0; 6])?;
    // Upper arm and forearm offset point forward (25 + 5 cm), the wrist (22 + 6 cm)
    // hangs down from the shoulder height of 15 cm
    let p = pose.translation.vector;
    assert!((p.x - 0.30).abs() < SMALL, "x = {}", p.x);
    assert!(p.y.abs() < SMALL, "y = {}", p.y);
    assert!((p.z + 0.13).abs() < SMALL, "z = {}", p.z);
    Ok(())
}

#[test]
fn test_malformed_joints_rejected() -> anyhow::Result<()> {
    for table in robot_tables() {
        let robot = robot_from_table(table)?;
        let dof = robot.dof();
        assert!(robot.forward(&vec![0.0; dof + 1]).is_err());
        let mut joints = vec![0.0; dof];
        joints[dof - 1] = f64::NAN;
        assert!(robot.forward(&joints).is_err());
    }
    Ok(())
}
