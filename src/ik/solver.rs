//! Numeric inverse kinematics for DH chains of one to six joints.
//!
//! The solver runs a small, fixed set of initial guesses. From each guess it first
//! minimizes the weighted pose error with a bounded quasi-Newton method and, if this does
//! not reach the target, refines with a bounded Levenberg-Marquardt fit of the residual.
//! Planar two link arms additionally get their closed form solutions. Candidates are
//! only accepted if the forward kinematics confirms them and all joint limits hold.

use std::f64::consts::FRAC_PI_2;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rand::Rng;
use tracing::{debug, trace};

use crate::analytic::analytical_2dof;
use crate::constraints::Constraints;
use crate::kinematic_traits::{Joints, Pose, Solutions};
use crate::kinematics_error::{ensure_finite, ensure_length, KinematicsError};
use crate::kinematics_impl::end_pose;
use crate::minimizers::{least_squares_bounded, minimize_bounded};
use crate::parameters::{max_reach, min_reach, validate_chain, DhLink};
use crate::residuals::{rotation_error, ResidualKind};
use crate::utils::is_valid;

/// Weight of the position error against the rotation error (radians) in the minimized
/// objective. With positions in meters this makes 1 cm count as much as 0.1 rad.
pub const POSITION_WEIGHT: f64 = 10.0;

/// Desired tool position and optionally orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkTarget {
    /// Meters, in the base frame
    pub position: Vector3<f64>,

    /// Roll, pitch and yaw in radians, R = Rz(yaw) * Ry(pitch) * Rx(roll).
    /// Only followed by chains of three or more joints.
    pub orientation: Option<[f64; 3]>,
}

impl IkTarget {
    pub fn position(x: f64, y: f64, z: f64) -> Self {
        IkTarget {
            position: Vector3::new(x, y, z),
            orientation: None,
        }
    }

    pub fn with_orientation(mut self, roll: f64, pitch: f64, yaw: f64) -> Self {
        self.orientation = Some([roll, pitch, yaw]);
        self
    }

    /// Target built from the pose (for instance, one computed with the forward kinematics).
    pub fn from_pose(pose: &Pose) -> Self {
        let (roll, pitch, yaw) = pose.rotation.euler_angles();
        let t = pose.translation.vector;
        IkTarget::position(t.x, t.y, t.z).with_orientation(roll, pitch, yaw)
    }

    /// The target as a pose; identity rotation if no orientation is given.
    pub fn pose(&self) -> Pose {
        let rotation = match self.orientation {
            Some([roll, pitch, yaw]) => UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            None => UnitQuaternion::identity(),
        };
        Isometry3::from_parts(Translation3::from(self.position), rotation)
    }

    fn check(&self) -> Result<(), KinematicsError> {
        ensure_finite("target position", self.position.as_slice())?;
        match &self.orientation {
            Some(rpy) => ensure_finite("target orientation", rpy),
            None => Ok(()),
        }
    }
}

/// Settings of the inverse kinematics solver.
#[derive(Debug, Clone, PartialEq)]
pub struct IkConfig {
    /// Largest accepted distance between the reached and the target position, meters.
    pub tolerance: f64,

    /// See [`POSITION_WEIGHT`]
    pub position_weight: f64,

    /// Two solutions are the same if all joints differ by less than this, radians.
    pub duplicate_threshold: f64,

    /// The search stops once this many distinct solutions are found.
    pub max_solutions: usize,

    /// Number of random initial guesses after the fixed ones.
    pub random_guesses: usize,

    /// Random guesses are uniform in [-random_range, random_range], radians.
    pub random_range: f64,

    pub minimizer_iterations: usize,
    pub least_squares_iterations: usize,

    /// Initial Levenberg-Marquardt damping.
    pub initial_damping: f64,

    /// Use the closed form for planar two link arms.
    pub use_analytic: bool,
}

impl Default for IkConfig {
    fn default() -> Self {
        IkConfig {
            tolerance: 0.005,
            position_weight: POSITION_WEIGHT,
            duplicate_threshold: 5f64.to_radians(),
            max_solutions: 3,
            random_guesses: 3,
            random_range: FRAC_PI_2,
            minimizer_iterations: 200,
            least_squares_iterations: 100,
            initial_damping: 1e-3,
            use_analytic: true,
        }
    }
}

impl IkConfig {
    fn check(&self) -> Result<(), KinematicsError> {
        let positive = [
            ("tolerance", self.tolerance),
            ("position_weight", self.position_weight),
            ("random_range", self.random_range),
            ("initial_damping", self.initial_damping),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(KinematicsError::argument(
                    name,
                    format!("must be positive and finite, got {value}"),
                ));
            }
        }
        if !(self.duplicate_threshold.is_finite() && self.duplicate_threshold >= 0.0) {
            return Err(KinematicsError::argument(
                "duplicate_threshold",
                "must be finite and not negative",
            ));
        }
        if self.max_solutions == 0 {
            return Err(KinematicsError::argument("max_solutions", "must be at least 1"));
        }
        Ok(())
    }
}

/// Which method produced the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IkMethod {
    Analytic,
    QuasiNewton,
    LevenbergMarquardt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IkSolution {
    pub joints: Joints,

    /// Distance between the reached and the target position, meters.
    pub position_error: f64,
    pub method: IkMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachFailure {
    /// Further away than the stretched chain reaches
    TooFar,

    /// Closer to the base than the folded chain reaches
    TooClose,
}

/// Reach of the chain and the distance to the target, all in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachDiagnostics {
    pub max_reach: f64,
    pub min_reach: f64,
    pub target_distance: f64,
}

/// Result of the inverse kinematics. Failing to solve is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum IkOutcome {
    /// At least one solution, distinct from each other, in the order found.
    Solved(Vec<IkSolution>),

    /// The target is geometrically out of reach, no search has been done.
    Unreachable {
        reason: ReachFailure,
        diagnostics: ReachDiagnostics,
    },

    /// The target is within reach but no guess converged to a valid solution.
    NoConvergence { diagnostics: ReachDiagnostics },
}

impl IkOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, IkOutcome::Solved(_))
    }

    /// Joint values of all solutions, empty if not solved.
    pub fn solutions(&self) -> Solutions {
        match self {
            IkOutcome::Solved(solutions) => solutions.iter().map(|s| s.joints.clone()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn first(&self) -> Option<&IkSolution> {
        match self {
            IkOutcome::Solved(solutions) => solutions.first(),
            _ => None,
        }
    }
}

/// Pose error evaluation for one call of the solver.
struct IkProblem<'a> {
    chain: &'a [DhLink],
    target: Pose,
    oriented: bool,
    position_weight: f64,
    residual: ResidualKind,
}

impl IkProblem<'_> {
    /// |w * Δp|² + |rotation error|², the rotation only if orientation is followed.
    fn objective(&self, joints: &[f64]) -> f64 {
        let pose = end_pose(self.chain, joints);
        let position = (self.target.translation.vector - pose.translation.vector)
            * self.position_weight;
        let mut value = position.norm_squared();
        if self.oriented {
            value += rotation_error(&pose.rotation, &self.target.rotation).norm_squared();
        }
        value
    }

    fn position_error(&self, joints: &[f64]) -> f64 {
        (self.target.translation.vector - end_pose(self.chain, joints).translation.vector).norm()
    }
}

/// Solves the inverse kinematics of the chain for the target.
///
/// Initial guesses, in this order: the seed (zeros if none), zeros, elbow up and elbow down
/// (second joint at ±90°, chains of two or more joints) and then `config.random_guesses`
/// uniform random configurations drawn from `rng`. Guesses are brought inside the limits
/// before solving. The same rng state always gives the same result.
///
/// Returns `Err` only for malformed input (chain, limits, target, seed or config).
pub fn inverse_kinematics<R: Rng + ?Sized>(
    chain: &[DhLink],
    limits: &Constraints,
    target: &IkTarget,
    seed: Option<&[f64]>,
    config: &IkConfig,
    rng: &mut R,
) -> Result<IkOutcome, KinematicsError> {
    validate_chain(chain)?;
    limits.ensure_dof(chain.len())?;
    target.check()?;
    config.check()?;
    if let Some(seed) = seed {
        ensure_length("seed", seed, chain.len())?;
        ensure_finite("seed", seed)?;
    }

    let dof = chain.len();
    let diagnostics = ReachDiagnostics {
        max_reach: max_reach(chain),
        min_reach: min_reach(chain),
        target_distance: target.position.norm(),
    };
    if let Some(reason) = reach_failure(&diagnostics, config.tolerance) {
        debug!("Target out of reach ({reason:?}): {diagnostics:?}");
        return Ok(IkOutcome::Unreachable {
            reason,
            diagnostics,
        });
    }

    let oriented = target.orientation.is_some() && dof >= 3;
    let problem = IkProblem {
        chain,
        target: target.pose(),
        oriented,
        position_weight: config.position_weight,
        residual: ResidualKind::select(dof, oriented),
    };

    // Guesses are drawn before solving so the rng is consumed the same way every time
    let guesses = initial_guesses(dof, seed, limits, config, rng);
    let mut solutions: Vec<IkSolution> = Vec::new();

    if config.use_analytic {
        if let Some(branches) = analytical_2dof(chain, &target.position) {
            for joints in branches {
                accept(&problem, limits, config, &mut solutions, joints, IkMethod::Analytic);
            }
        }
    }

    for (index, guess) in guesses.iter().enumerate() {
        if solutions.len() >= config.max_solutions {
            break;
        }
        match solve_from(&problem, limits, config, guess) {
            Some((joints, method)) => {
                debug!("Guess {index} converged with {method:?}");
                accept(&problem, limits, config, &mut solutions, joints, method);
            }
            None => trace!("Guess {index} did not converge"),
        }
    }

    if solutions.is_empty() {
        debug!("No solution found from {} guesses", guesses.len());
        return Ok(IkOutcome::NoConvergence { diagnostics });
    }
    Ok(IkOutcome::Solved(solutions))
}

fn reach_failure(diagnostics: &ReachDiagnostics, tolerance: f64) -> Option<ReachFailure> {
    if diagnostics.target_distance > diagnostics.max_reach + tolerance {
        Some(ReachFailure::TooFar)
    } else if diagnostics.target_distance < diagnostics.min_reach - tolerance {
        Some(ReachFailure::TooClose)
    } else {
        None
    }
}

fn initial_guesses<R: Rng + ?Sized>(
    dof: usize,
    seed: Option<&[f64]>,
    limits: &Constraints,
    config: &IkConfig,
    rng: &mut R,
) -> Vec<Joints> {
    let zeros = vec![0.0; dof];
    let mut guesses = vec![seed.map_or_else(|| zeros.clone(), <[f64]>::to_vec), zeros.clone()];
    if dof >= 2 {
        for elbow in [FRAC_PI_2, -FRAC_PI_2] {
            let mut guess = zeros.clone();
            guess[1] = elbow;
            guesses.push(guess);
        }
    }
    for _ in 0..config.random_guesses {
        guesses.push(
            (0..dof)
                .map(|_| rng.gen_range(-config.random_range..=config.random_range))
                .collect(),
        );
    }

    for guess in guesses.iter_mut() {
        limits.project(guess);
    }
    // Without the seed, the first two guesses are the same
    guesses.dedup();
    guesses
}

/// Runs the methods from the guess, returning the first result within tolerance.
fn solve_from(
    problem: &IkProblem,
    limits: &Constraints,
    config: &IkConfig,
    guess: &[f64],
) -> Option<(Joints, IkMethod)> {
    let minimized = minimize_bounded(
        |q| problem.objective(q),
        guess,
        limits,
        config.minimizer_iterations,
    );
    let error = problem.position_error(&minimized.x);
    trace!(
        "Quasi-Newton: {} iterations (converged: {}), objective {:e}, position error {error:e}",
        minimized.iterations, minimized.converged, minimized.value
    );
    if error < config.tolerance {
        return Some((minimized.x, IkMethod::QuasiNewton));
    }

    let fitted = least_squares_bounded(
        |q| problem.residual.evaluate(&end_pose(problem.chain, q), &problem.target),
        guess,
        limits,
        config.least_squares_iterations,
        config.initial_damping,
    );
    let error = problem.position_error(&fitted.x);
    trace!(
        "Levenberg-Marquardt: {} iterations (converged: {}), cost {:e}, position error {error:e}",
        fitted.iterations, fitted.converged, fitted.value
    );
    (error < config.tolerance).then_some((fitted.x, IkMethod::LevenbergMarquardt))
}

/// Adds the candidate if it reaches the target, respects the limits and is not a
/// duplicate of an already accepted solution.
fn accept(
    problem: &IkProblem,
    limits: &Constraints,
    config: &IkConfig,
    solutions: &mut Vec<IkSolution>,
    joints: Joints,
    method: IkMethod,
) {
    if solutions.len() >= config.max_solutions || !is_valid(&joints) {
        return;
    }
    if let Some(violation) = limits.violation(&joints) {
        trace!("Rejected candidate, joint {} out of limits", violation.joint);
        return;
    }
    let position_error = problem.position_error(&joints);
    if position_error >= config.tolerance {
        return;
    }
    let duplicate = solutions.iter().any(|existing| {
        existing
            .joints
            .iter()
            .zip(joints.iter())
            .all(|(a, b)| (a - b).abs() < config.duplicate_threshold)
    });
    if !duplicate {
        solutions.push(IkSolution {
            joints,
            position_error,
            method,
        });
    }
}
