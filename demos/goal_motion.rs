use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rs_dh_kinematics::goal_planner::{GoalMotion, GoalPlannerConfig, MotionPhase};
use rs_dh_kinematics::ik::IkTarget;
use rs_dh_kinematics::kinematics_impl::DHKinematics;
use rs_dh_kinematics::parameters::DhLink;
use rs_dh_kinematics::utils::dump_joints;

fn main() -> Result<()> {
    // Two link planar arm, 40 and 30 cm
    let robot = DHKinematics::new(vec![DhLink::planar(40.0), DhLink::planar(30.0)])?;
    let config = GoalPlannerConfig {
        steps: 10,
        ..GoalPlannerConfig::default()
    };
    let mut motion = GoalMotion::new(&robot, config);
    let mut rng = StdRng::seed_from_u64(7);

    let start = [0.0, 0.5];
    let target = IkTarget::position(0.3, 0.4, 0.0);
    let phase = motion.plan_to_position(&start, &target, &mut rng)?;
    if phase != MotionPhase::Executing {
        bail!("Motion not planned: {:?}", motion.rejection());
    }

    if let Some(path) = motion.path() {
        for warning in &path.warnings {
            println!("Warning: {warning}");
        }
    }
    while let Some(joints) = motion.advance() {
        print!("{:5.1}% ", motion.progress() * 100.0);
        dump_joints(&joints);
    }
    if let Some(error) = motion
        .path()
        .and_then(|path| path.final_position_error(&target.position))
    {
        println!("Reached the target within {:.2} mm", error * 1000.0);
    }
    println!("Phase: {:?}", motion.phase());

    // Out of reach: the motion fails without moving
    let far = IkTarget::position(1.0, 0.0, 0.0);
    motion.plan_to_position(&start, &far, &mut rng)?;
    if let Some(rejection) = motion.rejection() {
        if let Some(reason) = &rejection.reason {
            println!("Rejected: {reason}");
        }
    }
    println!("Phase: {:?}", motion.phase());
    Ok(())
}
