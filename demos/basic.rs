use anyhow::{Context, Result};
use nalgebra::{Isometry3, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rs_dh_kinematics::jacobian::{Jacobian, SingularityThresholds};
use rs_dh_kinematics::kinematic_traits::{Joints, Kinematics};
use rs_dh_kinematics::kinematics_impl::DHKinematics;
use rs_dh_kinematics::parameters::DhLink;
use rs_dh_kinematics::ik::IkTarget;
use rs_dh_kinematics::quintic::{analyze_smoothness, optimize_duration, plan_quintic, DurationLimits};
use rs_dh_kinematics::utils::{as_radians, dump_joints, dump_pose, dump_solutions};

fn main() -> Result<()> {
    // Anthropomorphic arm: base turning about z, shoulder and elbow in the vertical plane.
    // DH lengths are in centimeters, angles in degrees here.
    let robot = DHKinematics::new(vec![
        DhLink::from_degrees(0.0, 90.0, 15.0, 0.0),
        DhLink::from_degrees(35.0, 0.0, 0.0, 0.0),
        DhLink::from_degrees(25.0, 0.0, 0.0, 0.0),
    ])
    .context("Invalid DH table")?;
    for link in robot.chain() {
        println!("{link}");
    }

    let joints: Joints = vec![0.3, 0.4, -0.8];
    println!("\nInitial joints:");
    dump_joints(&joints);

    let pose = robot.forward(&joints)?;
    println!("\nForward kinematics (meters):");
    dump_pose(&pose);

    // Only the position is followed for three joints
    let position = pose.translation.vector;
    let target = IkTarget::position(position.x, position.y, position.z);
    let mut rng = StdRng::seed_from_u64(42);
    let outcome = robot.inverse(&target, None, &mut rng)?;
    println!("\nInverse kinematics solutions:");
    dump_solutions(&outcome.solutions());

    let too_far = IkTarget::position(1.0, 0.0, 0.5);
    println!("\nTarget 1 m away: {:?}", robot.inverse(&too_far, None, &mut rng)?);

    let jacobian = Jacobian::new(robot.chain(), &joints)?;
    println!("\nJacobian:{}", jacobian.matrix());
    let report = jacobian.singularity(&SingularityThresholds::default());
    println!(
        "Singular: {}, determinant {:.3e}, condition number {:.1}, rank {}",
        report.is_singular, report.determinant, report.condition_number, report.rank
    );
    println!("Manipulability: {:.5}", jacobian.manipulability());

    // Joint velocities for moving the tool 10 cm/s up
    let up = Isometry3::new(Vector3::new(0.0, 0.0, 0.1), Vector3::zeros());
    println!("Joint velocities for 10 cm/s up: {:?}", jacobian.velocities(&up)?);

    // Quintic trajectory to the other side, as fast as the joint limits allow
    let goal = as_radians(&[90.0, 45.0, -70.0]);
    let duration = optimize_duration(&joints, &goal, &DurationLimits::default_for_dof(3))?;
    let trajectory = plan_quintic(&joints, &goal, duration, 0.01, None)?;
    let smoothness = analyze_smoothness(&trajectory)?;
    println!(
        "\nTrajectory: {:.2} s, {} samples, smoothness score {:.3}",
        trajectory.duration(),
        trajectory.len(),
        smoothness.overall_score
    );
    for (j, joint) in smoothness.joints.iter().enumerate() {
        println!(
            "J{}: max velocity {:.3} rad/s, max acceleration {:.3} rad/s², RMS jerk {:.3}",
            j + 1,
            joint.max_velocity,
            joint.max_acceleration,
            joint.rms_jerk
        );
    }
    Ok(())
}
