use nalgebra::{DMatrix, Vector6};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::constraints::Constraints;
use crate::jacobian::{check_singularity, compute_jacobian, Jacobian, SingularityThresholds};
use crate::kinematics_impl::forward_kinematics;
use crate::parameters::DhLink;
use crate::tests::test_utils::{
    chain_from_table, random_chain, random_joints, robot_tables, INDUSTRIAL_6,
};

const STEP: f64 = 1e-6;
const RELATIVE: f64 = 1e-4;

/// Magnitude below which an entry is compared as if it had this size.
const SMALL_FLOOR: f64 = 1e-5;

/// Jacobian from central differences of the forward kinematics. The angular rows come
/// from the rotation between the two shifted poses, expressed in the base frame.
fn numeric_jacobian(chain: &[DhLink], joints: &[f64]) -> anyhow::Result<DMatrix<f64>> {
    let mut jacobian = DMatrix::zeros(6, joints.len());
    for i in 0..joints.len() {
        let mut plus = joints.to_vec();
        let mut minus = joints.to_vec();
        plus[i] += STEP;
        minus[i] -= STEP;
        let forward = forward_kinematics(chain, &plus)?;
        let backward = forward_kinematics(chain, &minus)?;

        let linear = (forward.translation.vector - backward.translation.vector) / (2.0 * STEP);
        let angular = (forward.rotation * backward.rotation.inverse()).scaled_axis() / (2.0 * STEP);
        jacobian.fixed_view_mut::<3, 1>(0, i).copy_from(&linear);
        jacobian.fixed_view_mut::<3, 1>(3, i).copy_from(&angular);
    }
    Ok(jacobian)
}

fn assert_close(analytic: &DMatrix<f64>, numeric: &DMatrix<f64>, chain: &[DhLink], joints: &[f64]) {
    for (a, n) in analytic.iter().zip(numeric.iter()) {
        assert!(
            (a - n).abs() <= RELATIVE * a.abs().max(SMALL_FLOOR),
            "Analytic {a} vs numeric {n} for {} links at {joints:?}:\n{analytic}{numeric}",
            chain.len()
        );
    }
}

#[test]
fn test_random_chains_match_differences() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(31337);
    let mut checked = 0;
    for dof in 1..=6 {
        let limits = Constraints::default_for_dof(dof)?;
        for _ in 0..10 {
            let chain = random_chain(dof, &mut rng);
            let joints = random_joints(&limits, 0.0, &mut rng);
            let analytic = compute_jacobian(&chain, &joints)?;
            let numeric = numeric_jacobian(&chain, &joints)?;
            assert_eq!(analytic.shape(), (6, dof));
            assert_close(&analytic, &numeric, &chain, &joints);
            checked += 1;
        }
    }
    assert!(checked >= 50);
    Ok(())
}

#[test]
fn test_robot_tables_match_differences() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(8);
    for table in robot_tables() {
        let chain = chain_from_table(table);
        let limits = Constraints::default_for_dof(chain.len())?;
        for _ in 0..5 {
            let joints = random_joints(&limits, 0.0, &mut rng);
            let analytic = compute_jacobian(&chain, &joints)?;
            assert_close(&analytic, &numeric_jacobian(&chain, &joints)?, &chain, &joints);
        }
    }
    Ok(())
}

#[test]
fn test_resolved_rate_step_moves_tool() -> anyhow::Result<()> {
    // Joint velocities for a pure x velocity move the tool along x only
    let chain = chain_from_table(&INDUSTRIAL_6);
    let joints = [0.1, 0.6, -0.4, 0.3, 0.7, -0.2];
    let jacobian = Jacobian::new(&chain, &joints)?;

    let twist = Vector6::new(0.01, 0.0, 0.0, 0.0, 0.0, 0.0);
    let velocities = jacobian.velocities_from_vector(&twist)?;
    let dt = 0.001;
    let next: Vec<f64> = joints
        .iter()
        .zip(velocities.iter())
        .map(|(q, v)| q + v * dt)
        .collect();
    let before = forward_kinematics(&chain, &joints)?.translation.vector;
    let after = forward_kinematics(&chain, &next)?.translation.vector;
    let moved = (after - before) / dt;
    assert!((moved.x - 0.01).abs() < 1e-4, "moved {moved}");
    assert!(moved.y.abs() < 1e-4 && moved.z.abs() < 1e-4, "moved {moved}");
    Ok(())
}

#[test]
fn test_stretched_arm_is_singular() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let chain = vec![DhLink::planar(30.0), DhLink::planar(20.0), DhLink::planar(10.0)];
    let thresholds = SingularityThresholds::default();
    for _ in 0..10 {
        // All joints in line, however the base is turned
        let base = rng.gen_range(-3.0..3.0);
        let jacobian = compute_jacobian(&chain, &[base, 0.0, 0.0])?;
        let report = check_singularity(&jacobian, &thresholds);
        assert!(report.is_singular);
        assert!(report.rank < 3);
    }
    Ok(())
}
