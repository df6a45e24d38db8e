//! Goal directed joint motion.
//!
//! [`GoalMotion`] moves the robot from its current joints to the goal joints along the
//! shortest joint rotation, checking every intermediate configuration before any of them
//! is executed. The phases are
//!
//! Idle → Planning → Validating → Executing → Completed, or Failed if validation rejects
//! the path (or the goal position cannot be solved).
//!
//! Execution is driven by the caller, one step per [`GoalMotion::advance`] call.

use std::fmt;

use nalgebra::Vector3;
use rand::RngCore;
use tracing::{debug, warn};

use crate::constraints::JointLimitViolation;
use crate::ik::{IkOutcome, IkTarget};
use crate::interpolator::interpolate_path;
use crate::kinematic_traits::{Joints, Kinematics};
use crate::kinematics_error::{ensure_length, KinematicsError};

/// Settings of the goal directed motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalPlannerConfig {
    /// Number of interpolation steps; the path has one configuration more.
    pub steps: usize,

    /// No link frame origin may go below this height, meters.
    pub ground_height: f64,
}

impl Default for GoalPlannerConfig {
    fn default() -> Self {
        GoalPlannerConfig {
            steps: 40,
            ground_height: -0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    Idle,
    Planning,
    Validating,
    Executing,
    Completed,
    Failed,
}

/// Why the path has been rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum PathFailure {
    /// A joint leaves its range at the given step.
    JointLimit {
        step: usize,
        violation: JointLimitViolation,
    },

    /// The origin of the link frame goes below the ground height at the given step.
    /// Link 0 is the base.
    GroundCollision { step: usize, link: usize, height: f64 },

    /// The goal position has no inverse kinematics solution.
    GoalNotSolved(IkOutcome),
}

impl fmt::Display for PathFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathFailure::JointLimit { step, violation } => write!(
                f,
                "joint {} exceeds its limits at step {}: {:.1}° not in [{:.1}°, {:.1}°]",
                violation.joint + 1,
                step,
                violation.angle.to_degrees(),
                violation.min.to_degrees(),
                violation.max.to_degrees()
            ),
            PathFailure::GroundCollision { step, link, height } => write!(
                f,
                "link {link} collides with the ground at step {step} (z = {height:.3} m)"
            ),
            PathFailure::GoalNotSolved(outcome) => match outcome {
                IkOutcome::Unreachable { reason, .. } => {
                    write!(f, "goal position is out of reach ({reason:?})")
                }
                _ => write!(f, "no inverse kinematics solution for the goal position"),
            },
        }
    }
}

/// Informational findings that do not reject the path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanningWarning {
    NearSingularity {
        step: usize,
        determinant: f64,
        condition_number: f64,
    },
}

impl fmt::Display for PlanningWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanningWarning::NearSingularity {
                step,
                condition_number,
                ..
            } => write!(
                f,
                "near singularity at step {step} (condition number {condition_number:.1})"
            ),
        }
    }
}

/// Result of checking the path. Always carries the warnings collected so far.
#[derive(Debug, Clone, PartialEq)]
pub struct PathValidation {
    pub valid: bool,
    pub reason: Option<PathFailure>,
    pub warnings: Vec<PlanningWarning>,
}

/// Validated path, ready to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPath {
    /// Joint configurations, start and goal included
    pub steps: Vec<Joints>,

    /// Tool position for every step, meters
    pub end_effector_path: Vec<Vector3<f64>>,
    pub warnings: Vec<PlanningWarning>,
}

impl PlannedPath {
    /// Distance between where the path ends and the given position, meters.
    pub fn final_position_error(&self, target: &Vector3<f64>) -> Option<f64> {
        self.end_effector_path.last().map(|p| (target - p).norm())
    }
}

/// Either the validated path or the validation that rejected it.
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    Planned(PlannedPath),
    Rejected(PathValidation),
}

/// Checks every configuration of the path in order: joint limits and ground clearance
/// reject the path at the first offending step, singular configurations only add a warning.
pub fn validate_path(
    robot: &dyn Kinematics,
    path: &[Joints],
    config: &GoalPlannerConfig,
) -> Result<PathValidation, KinematicsError> {
    let mut warnings = Vec::new();
    let rejected = |reason: PathFailure, warnings: Vec<PlanningWarning>| PathValidation {
        valid: false,
        reason: Some(reason),
        warnings,
    };

    for (step, joints) in path.iter().enumerate() {
        ensure_length("path step", joints, robot.dof())?;
        if let Some(violation) = robot.constraints().violation(joints) {
            return Ok(rejected(PathFailure::JointLimit { step, violation }, warnings));
        }

        let poses = robot.forward_with_joint_poses(joints)?;
        let below = poses
            .iter()
            .enumerate()
            .find(|(_, pose)| pose.translation.vector.z < config.ground_height);
        if let Some((link, pose)) = below {
            let height = pose.translation.vector.z;
            return Ok(rejected(PathFailure::GroundCollision { step, link, height }, warnings));
        }

        if let Some(report) = robot.kinematic_singularity(joints)? {
            warnings.push(PlanningWarning::NearSingularity {
                step,
                determinant: report.determinant,
                condition_number: report.condition_number,
            });
        }
    }

    Ok(PathValidation {
        valid: true,
        reason: None,
        warnings,
    })
}

fn end_effector_path(
    robot: &dyn Kinematics,
    steps: &[Joints],
) -> Result<Vec<Vector3<f64>>, KinematicsError> {
    steps
        .iter()
        .map(|joints| robot.forward(joints).map(|pose| pose.translation.vector))
        .collect()
}

/// Interpolates from `start` to `goal` and validates the result.
pub fn plan_path(
    robot: &dyn Kinematics,
    start: &[f64],
    goal: &[f64],
    config: &GoalPlannerConfig,
) -> Result<PathOutcome, KinematicsError> {
    ensure_length("start", start, robot.dof())?;
    let steps = interpolate_path(start, goal, config.steps)?;
    let validation = validate_path(robot, &steps, config)?;
    if !validation.valid {
        return Ok(PathOutcome::Rejected(validation));
    }

    let end_effector_path = end_effector_path(robot, &steps)?;
    Ok(PathOutcome::Planned(PlannedPath {
        steps,
        end_effector_path,
        warnings: validation.warnings,
    }))
}

/// Step by step motion of the robot towards a goal.
pub struct GoalMotion<'a> {
    robot: &'a dyn Kinematics,
    config: GoalPlannerConfig,
    phase: MotionPhase,
    path: Option<PlannedPath>,
    rejection: Option<PathValidation>,
    cursor: usize,
}

impl<'a> GoalMotion<'a> {
    pub fn new(robot: &'a dyn Kinematics, config: GoalPlannerConfig) -> Self {
        GoalMotion {
            robot,
            config,
            phase: MotionPhase::Idle,
            path: None,
            rejection: None,
            cursor: 0,
        }
    }

    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// The validated path, once planning succeeded.
    pub fn path(&self) -> Option<&PlannedPath> {
        self.path.as_ref()
    }

    /// The validation that failed the plan, if it failed.
    pub fn rejection(&self) -> Option<&PathValidation> {
        self.rejection.as_ref()
    }

    /// Fraction of steps executed so far.
    pub fn progress(&self) -> f64 {
        match &self.path {
            Some(path) if !path.steps.is_empty() => self.cursor as f64 / path.steps.len() as f64,
            _ => 0.0,
        }
    }

    /// Back to Idle, forgetting the plan.
    pub fn reset(&mut self) {
        self.phase = MotionPhase::Idle;
        self.path = None;
        self.rejection = None;
        self.cursor = 0;
    }

    fn transition(&mut self, phase: MotionPhase) {
        debug!("Goal motion {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Plans and validates the motion to the goal joints. Ends in Executing if the path
    /// is valid and in Failed otherwise. Malformed input returns the error and leaves the
    /// motion Idle.
    pub fn plan(&mut self, start: &[f64], goal: &[f64]) -> Result<MotionPhase, KinematicsError> {
        self.reset();
        self.transition(MotionPhase::Planning);
        let result = self.plan_steps(start, goal);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn plan_steps(&mut self, start: &[f64], goal: &[f64]) -> Result<MotionPhase, KinematicsError> {
        ensure_length("start", start, self.robot.dof())?;
        let steps = interpolate_path(start, goal, self.config.steps)?;

        self.transition(MotionPhase::Validating);
        let validation = validate_path(self.robot, &steps, &self.config)?;
        if !validation.valid {
            self.fail(validation);
            return Ok(self.phase);
        }
        for warning in &validation.warnings {
            debug!("Planning warning: {warning}");
        }

        let end_effector_path = end_effector_path(self.robot, &steps)?;
        self.path = Some(PlannedPath {
            steps,
            end_effector_path,
            warnings: validation.warnings,
        });
        self.transition(MotionPhase::Executing);
        Ok(self.phase)
    }

    /// Resolves the goal position through the inverse kinematics (seeded with `start`,
    /// first solution taken) and plans the motion to it.
    pub fn plan_to_position(
        &mut self,
        start: &[f64],
        target: &IkTarget,
        rng: &mut dyn RngCore,
    ) -> Result<MotionPhase, KinematicsError> {
        self.reset();
        self.transition(MotionPhase::Planning);
        let outcome = match self.robot.inverse(target, Some(start), rng) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };
        match outcome.first() {
            Some(solution) => {
                let goal = solution.joints.clone();
                self.plan(start, &goal)
            }
            None => {
                self.fail(PathValidation {
                    valid: false,
                    reason: Some(PathFailure::GoalNotSolved(outcome)),
                    warnings: Vec::new(),
                });
                Ok(self.phase)
            }
        }
    }

    fn fail(&mut self, validation: PathValidation) {
        if let Some(reason) = &validation.reason {
            warn!("Goal motion rejected: {reason}");
        }
        self.rejection = Some(validation);
        self.transition(MotionPhase::Failed);
    }

    /// Next configuration to execute, None unless Executing. The motion becomes
    /// Completed after the last configuration has been handed out.
    pub fn advance(&mut self) -> Option<Joints> {
        if self.phase != MotionPhase::Executing {
            return None;
        }
        let path = self.path.as_ref()?;
        let joints = path.steps.get(self.cursor)?.clone();
        self.cursor += 1;
        if self.cursor >= path.steps.len() {
            self.transition(MotionPhase::Completed);
        }
        Some(joints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraints;
    use crate::kinematics_impl::DHKinematics;
    use crate::parameters::DhLink;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::f64::consts::FRAC_PI_2;

    fn planar_robot() -> DHKinematics {
        DHKinematics::new(vec![DhLink::planar(40.0), DhLink::planar(30.0)]).unwrap()
    }

    /// Base joint turning about z, shoulder tilting the arm in the vertical plane.
    fn vertical_robot() -> DHKinematics {
        let chain = vec![
            DhLink::from_degrees(0.0, 90.0, 20.0, 0.0),
            DhLink::planar(30.0),
        ];
        DHKinematics::new_with_constraints(chain, Constraints::full_circle(2).unwrap()).unwrap()
    }

    #[test]
    fn test_full_motion() {
        let robot = planar_robot();
        let mut motion = GoalMotion::new(&robot, GoalPlannerConfig::default());
        assert_eq!(motion.phase(), MotionPhase::Idle);
        assert_eq!(motion.advance(), None);

        let phase = motion.plan(&[0.0, 0.3], &[0.6, 1.2]).unwrap();
        assert_eq!(phase, MotionPhase::Executing);
        let path = motion.path().unwrap();
        assert_eq!(path.steps.len(), 41);
        assert_eq!(path.end_effector_path.len(), 41);

        let mut executed = Vec::new();
        while let Some(joints) = motion.advance() {
            executed.push(joints);
        }
        assert_eq!(executed.len(), 41);
        assert_eq!(motion.phase(), MotionPhase::Completed);
        assert_eq!(motion.progress(), 1.0);
        assert!((executed[40][1] - 1.2).abs() < 1e-12);
        assert_eq!(motion.advance(), None);
    }

    #[test]
    fn test_limit_violation_fails() {
        let robot = planar_robot();
        let mut motion = GoalMotion::new(&robot, GoalPlannerConfig::default());
        // Second joint limited to ±135°
        let phase = motion.plan(&[0.0, 0.0], &[0.0, 2.5]).unwrap();
        assert_eq!(phase, MotionPhase::Failed);
        let rejection = motion.rejection().unwrap();
        assert!(!rejection.valid);
        match rejection.reason.as_ref().unwrap() {
            PathFailure::JointLimit { step, violation } => {
                assert_eq!(violation.joint, 1);
                assert!(*step > 0 && *step <= 40);
            }
            other => panic!("Unexpected failure {other}"),
        }
        assert!(motion.path().is_none());
        assert_eq!(motion.advance(), None);
    }

    #[test]
    fn test_ground_collision_fails() {
        let robot = vertical_robot();
        let config = GoalPlannerConfig::default();
        // Tilting the arm 90° down puts its end 10 cm below the ground
        let outcome = plan_path(&robot, &[0.0, 0.0], &[0.0, -FRAC_PI_2], &config).unwrap();
        let PathOutcome::Rejected(validation) = outcome else {
            panic!("Path through the ground accepted");
        };
        match validation.reason.unwrap() {
            PathFailure::GroundCollision { link, height, .. } => {
                assert_eq!(link, 2);
                assert!(height < -0.02);
            }
            other => panic!("Unexpected failure {other}"),
        }

        // Tilting up is fine
        let outcome = plan_path(&robot, &[0.0, 0.0], &[0.0, FRAC_PI_2], &config).unwrap();
        assert!(matches!(outcome, PathOutcome::Planned(_)));
    }

    #[test]
    fn test_singularity_warnings() {
        // Stretched three link arm stays singular all the way
        let chain = vec![DhLink::planar(30.0), DhLink::planar(20.0), DhLink::planar(10.0)];
        let robot = DHKinematics::new(chain).unwrap();
        let outcome = plan_path(&robot, &[0.0, 0.0, 0.0], &[0.5, 0.0, 0.0], &GoalPlannerConfig::default())
            .unwrap();
        let PathOutcome::Planned(path) = outcome else {
            panic!("Singular path must not be rejected");
        };
        assert_eq!(path.warnings.len(), 41);
        assert!(matches!(path.warnings[0], PlanningWarning::NearSingularity { step: 0, .. }));
    }

    #[test]
    fn test_plan_to_position() {
        let robot = planar_robot();
        let mut motion = GoalMotion::new(&robot, GoalPlannerConfig::default());
        let mut rng = StdRng::seed_from_u64(42);
        let target = IkTarget::position(0.5, 0.0, 0.0);
        let phase = motion.plan_to_position(&[0.0, 0.0], &target, &mut rng).unwrap();
        assert_eq!(phase, MotionPhase::Executing);
        let error = motion
            .path()
            .unwrap()
            .final_position_error(&target.position)
            .unwrap();
        assert!(error < 0.005);

        let far = IkTarget::position(2.0, 0.0, 0.0);
        let phase = motion.plan_to_position(&[0.0, 0.0], &far, &mut rng).unwrap();
        assert_eq!(phase, MotionPhase::Failed);
        assert!(matches!(
            motion.rejection().unwrap().reason,
            Some(PathFailure::GoalNotSolved(IkOutcome::Unreachable { .. }))
        ));
    }

    #[test]
    fn test_malformed_input_keeps_idle() {
        let robot = planar_robot();
        let mut motion = GoalMotion::new(&robot, GoalPlannerConfig::default());
        assert!(motion.plan(&[0.0], &[0.0]).is_err());
        assert_eq!(motion.phase(), MotionPhase::Idle);
        assert!(motion.plan(&[0.0, 0.0], &[0.0, f64::NAN]).is_err());
        assert_eq!(motion.phase(), MotionPhase::Idle);
    }
}
