//! Quintic polynomial joint trajectories.
//!
//! Every joint follows its own fifth order polynomial between the start and the end
//! configuration, matching position, velocity and acceleration at both ends. Positions
//! and all derivatives of the samples are evaluated from the polynomial, not differentiated
//! numerically.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use crate::kinematic_traits::Joints;
use crate::kinematics_error::{ensure_finite, ensure_length, KinematicsError};

/// Upper bound on the number of samples of a single segment.
const MAX_SAMPLES: f64 = 1e7;

/// Defaults used when the caller does not give the duration or the time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryConfig {
    /// Seconds
    pub duration: f64,

    /// Sampling step, seconds
    pub dt: f64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        TrajectoryConfig {
            duration: 5.0,
            dt: 0.01,
        }
    }
}

impl TrajectoryConfig {
    /// Rest to rest trajectory with the configured duration and step.
    pub fn plan(&self, start: &[f64], end: &[f64]) -> Result<Trajectory, KinematicsError> {
        plan_quintic(start, end, self.duration, self.dt, None)
    }

    /// Stop and go trajectory through all waypoints, every segment taking the configured duration.
    pub fn plan_through(&self, waypoints: &[Joints]) -> Result<Trajectory, KinematicsError> {
        let durations = vec![self.duration; waypoints.len().saturating_sub(1)];
        plan_multi_point(waypoints, Some(&durations), self.dt)
    }
}

/// Joint velocity and acceleration limits used to pick the trajectory duration.
#[derive(Debug, Clone, PartialEq)]
pub struct DurationLimits {
    /// rad/s, per joint
    pub max_velocity: Vec<f64>,

    /// rad/s², per joint
    pub max_acceleration: Vec<f64>,
}

impl DurationLimits {
    pub fn uniform(dof: usize, max_velocity: f64, max_acceleration: f64) -> Self {
        DurationLimits {
            max_velocity: vec![max_velocity; dof],
            max_acceleration: vec![max_acceleration; dof],
        }
    }

    /// 90°/s and 180°/s² for every joint.
    pub fn default_for_dof(dof: usize) -> Self {
        DurationLimits::uniform(dof, FRAC_PI_2, PI)
    }
}

/// Velocities and accelerations at both ends, per joint. Rest to rest if not given.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryConditions {
    pub start_velocity: Vec<f64>,
    pub end_velocity: Vec<f64>,
    pub start_acceleration: Vec<f64>,
    pub end_acceleration: Vec<f64>,
}

impl BoundaryConditions {
    /// Zero velocity and acceleration at both ends.
    pub fn rest(dof: usize) -> Self {
        BoundaryConditions {
            start_velocity: vec![0.0; dof],
            end_velocity: vec![0.0; dof],
            start_acceleration: vec![0.0; dof],
            end_acceleration: vec![0.0; dof],
        }
    }

    fn check(&self, dof: usize) -> Result<(), KinematicsError> {
        for (what, values) in [
            ("start velocity", &self.start_velocity),
            ("end velocity", &self.end_velocity),
            ("start acceleration", &self.start_acceleration),
            ("end acceleration", &self.end_acceleration),
        ] {
            ensure_length(what, values, dof)?;
            ensure_finite(what, values)?;
        }
        Ok(())
    }
}

/// θ(t) = a0 + a1 t + a2 t² + a3 t³ + a4 t⁴ + a5 t⁵
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuinticPolynomial {
    pub coefficients: [f64; 6],
}

impl QuinticPolynomial {
    /// Polynomial taking the joint from (θ0, ω0, α0) at t = 0 to (θf, ωf, αf) at t = T.
    ///
    /// The first three coefficients follow directly from the start. The last three
    /// come from the 3x3 end condition block, solved by LU in normalized time t / T.
    pub fn solve(
        start: (f64, f64, f64),
        end: (f64, f64, f64),
        duration: f64,
    ) -> Result<Self, KinematicsError> {
        let (theta0, omega0, alpha0) = start;
        let (theta_f, omega_f, alpha_f) = end;
        let t = duration;

        // Coefficients in normalized time
        let b0 = theta0;
        let b1 = omega0 * t;
        let b2 = alpha0 * t * t / 2.0;

        let block = Matrix3::new(
            1.0, 1.0, 1.0,
            3.0, 4.0, 5.0,
            6.0, 12.0, 20.0,
        );
        let rhs = Vector3::new(
            theta_f - b0 - b1 - b2,
            omega_f * t - b1 - 2.0 * b2,
            alpha_f * t * t - 2.0 * b2,
        );
        let b = block
            .lu()
            .solve(&rhs)
            .ok_or_else(|| KinematicsError::LinearAlgebra("quintic boundary block is singular".into()))?;

        Ok(QuinticPolynomial {
            coefficients: [
                b0,
                omega0,
                alpha0 / 2.0,
                b[0] / t.powi(3),
                b[1] / t.powi(4),
                b[2] / t.powi(5),
            ],
        })
    }

    pub fn position(&self, t: f64) -> f64 {
        let [a0, a1, a2, a3, a4, a5] = self.coefficients;
        a0 + t * (a1 + t * (a2 + t * (a3 + t * (a4 + t * a5))))
    }

    pub fn velocity(&self, t: f64) -> f64 {
        let [_, a1, a2, a3, a4, a5] = self.coefficients;
        a1 + t * (2.0 * a2 + t * (3.0 * a3 + t * (4.0 * a4 + t * 5.0 * a5)))
    }

    pub fn acceleration(&self, t: f64) -> f64 {
        let [_, _, a2, a3, a4, a5] = self.coefficients;
        2.0 * a2 + t * (6.0 * a3 + t * (12.0 * a4 + t * 20.0 * a5))
    }

    pub fn jerk(&self, t: f64) -> f64 {
        let [_, _, _, a3, a4, a5] = self.coefficients;
        6.0 * a3 + t * (24.0 * a4 + t * 60.0 * a5)
    }
}

/// State of all joints at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectorySample {
    /// Seconds since the start of the trajectory
    pub time: f64,
    pub positions: Joints,
    pub velocities: Vec<f64>,
    pub accelerations: Vec<f64>,
    pub jerks: Vec<f64>,
}

/// One polynomial per joint, valid from `start_time` for `duration` seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectorySegment {
    pub start_time: f64,
    pub duration: f64,
    pub polynomials: Vec<QuinticPolynomial>,
}

impl TrajectorySegment {
    /// Evaluates all joints at the time given relative to the segment start.
    fn sample(&self, local_time: f64) -> TrajectorySample {
        let p = &self.polynomials;
        TrajectorySample {
            time: self.start_time + local_time,
            positions: p.iter().map(|q| q.position(local_time)).collect(),
            velocities: p.iter().map(|q| q.velocity(local_time)).collect(),
            accelerations: p.iter().map(|q| q.acceleration(local_time)).collect(),
            jerks: p.iter().map(|q| q.jerk(local_time)).collect(),
        }
    }
}

/// Sampled trajectory together with the polynomials it was sampled from.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub samples: Vec<TrajectorySample>,
    pub segments: Vec<TrajectorySegment>,
}

impl Trajectory {
    /// Total duration, seconds.
    pub fn duration(&self) -> f64 {
        self.segments
            .last()
            .map_or(0.0, |s| s.start_time + s.duration)
    }

    pub fn dof(&self) -> usize {
        self.segments.first().map_or(0, |s| s.polynomials.len())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Evaluates the trajectory at any time inside it, None outside.
    pub fn sample_at(&self, time: f64) -> Option<TrajectorySample> {
        self.segments
            .iter()
            .find(|s| time >= s.start_time && time <= s.start_time + s.duration)
            .map(|s| s.sample(time - s.start_time))
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), KinematicsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(KinematicsError::argument(
            name,
            format!("must be positive and finite, got {value}"),
        ))
    }
}

/// Sample times 0, dt, 2 dt, ... with the last sample exactly at the duration.
fn sample_times(duration: f64, dt: f64) -> Result<Vec<f64>, KinematicsError> {
    let steps = (duration / dt - 1e-9).ceil().max(1.0);
    if steps > MAX_SAMPLES {
        return Err(KinematicsError::argument(
            "dt",
            format!("{steps} samples for duration {duration} s is too many"),
        ));
    }
    let steps = steps as usize;
    let mut times: Vec<f64> = (0..steps).map(|i| i as f64 * dt).collect();
    times.push(duration);
    Ok(times)
}

fn segment(
    start: &[f64],
    end: &[f64],
    start_time: f64,
    duration: f64,
    boundary: &BoundaryConditions,
) -> Result<TrajectorySegment, KinematicsError> {
    let polynomials = (0..start.len())
        .map(|j| {
            QuinticPolynomial::solve(
                (start[j], boundary.start_velocity[j], boundary.start_acceleration[j]),
                (end[j], boundary.end_velocity[j], boundary.end_acceleration[j]),
                duration,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TrajectorySegment {
        start_time,
        duration,
        polynomials,
    })
}

fn check_endpoints(start: &[f64], end: &[f64]) -> Result<(), KinematicsError> {
    if start.is_empty() {
        return Err(KinematicsError::InvalidDof(0));
    }
    ensure_length("end configuration", end, start.len())?;
    ensure_finite("start configuration", start)?;
    ensure_finite("end configuration", end)
}

/// Plans the quintic trajectory from `start` to `end` taking `duration` seconds, sampled
/// every `dt` seconds. Without boundary conditions the motion is rest to rest.
pub fn plan_quintic(
    start: &[f64],
    end: &[f64],
    duration: f64,
    dt: f64,
    boundary: Option<&BoundaryConditions>,
) -> Result<Trajectory, KinematicsError> {
    check_endpoints(start, end)?;
    check_positive("duration", duration)?;
    check_positive("dt", dt)?;
    let rest;
    let boundary = match boundary {
        Some(boundary) => boundary,
        None => {
            rest = BoundaryConditions::rest(start.len());
            &rest
        }
    };
    boundary.check(start.len())?;

    let segment = segment(start, end, 0.0, duration, boundary)?;
    let samples = sample_times(duration, dt)?
        .into_iter()
        .map(|t| segment.sample(t))
        .collect::<Vec<_>>();
    debug!("Quintic trajectory: {} joints, {duration} s, {} samples", start.len(), samples.len());

    Ok(Trajectory {
        samples,
        segments: vec![segment],
    })
}

/// Plans through all waypoints, stopping at each one (zero velocity and acceleration).
///
/// `durations` gives the time of every segment, the default duration is used for all
/// segments if None. Segments are concatenated without repeating the shared waypoint sample.
pub fn plan_multi_point(
    waypoints: &[Joints],
    durations: Option<&[f64]>,
    dt: f64,
) -> Result<Trajectory, KinematicsError> {
    if waypoints.len() < 2 {
        return Err(KinematicsError::argument(
            "waypoints",
            format!("at least 2 waypoints are required, got {}", waypoints.len()),
        ));
    }
    let segment_count = waypoints.len() - 1;
    let durations = match durations {
        Some(durations) => {
            ensure_length("durations", durations, segment_count)?;
            durations.to_vec()
        }
        None => vec![TrajectoryConfig::default().duration; segment_count],
    };
    check_positive("dt", dt)?;
    for (pair, &duration) in waypoints.windows(2).zip(durations.iter()) {
        check_endpoints(&pair[0], &pair[1])?;
        check_positive("duration", duration)?;
    }

    let dof = waypoints[0].len();
    let rest = BoundaryConditions::rest(dof);
    let mut samples = Vec::new();
    let mut segments = Vec::with_capacity(segment_count);
    let mut start_time = 0.0;

    for (index, (pair, &duration)) in waypoints.windows(2).zip(durations.iter()).enumerate() {
        let segment = segment(&pair[0], &pair[1], start_time, duration, &rest)?;
        let times = sample_times(duration, dt)?;
        // The first sample of a later segment repeats the last one of the previous
        let skip = if index == 0 { 0 } else { 1 };
        samples.extend(times.into_iter().skip(skip).map(|t| segment.sample(t)));
        start_time += duration;
        segments.push(segment);
    }
    debug!(
        "Multi point trajectory: {segment_count} segments, {start_time} s, {} samples",
        samples.len()
    );

    Ok(Trajectory { samples, segments })
}

/// Shortest duration respecting the joint limits, with a 1.5 safety margin and never
/// below one second. For every joint the bound is max(Δθ / v, √(4 Δθ / a)); the slowest
/// joint decides.
pub fn optimize_duration(
    start: &[f64],
    end: &[f64],
    limits: &DurationLimits,
) -> Result<f64, KinematicsError> {
    check_endpoints(start, end)?;
    ensure_length("max velocity", &limits.max_velocity, start.len())?;
    ensure_length("max acceleration", &limits.max_acceleration, start.len())?;

    let mut slowest: f64 = 0.0;
    for j in 0..start.len() {
        let velocity = limits.max_velocity[j];
        let acceleration = limits.max_acceleration[j];
        check_positive("max_velocity", velocity)?;
        check_positive("max_acceleration", acceleration)?;

        let distance = (end[j] - start[j]).abs();
        let by_velocity = distance / velocity;
        let by_acceleration = (4.0 * distance / acceleration).sqrt();
        slowest = slowest.max(by_velocity.max(by_acceleration));
    }
    Ok((slowest * 1.5).max(1.0))
}

/// Smoothness figures of one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSmoothness {
    pub rms_jerk: f64,
    pub max_velocity: f64,
    pub max_acceleration: f64,
    pub max_jerk: f64,

    /// 1 / (1 + rms_jerk), 1 for a jerk free motion
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmoothnessReport {
    pub joints: Vec<JointSmoothness>,

    /// Mean of the joint scores
    pub overall_score: f64,
}

fn max_abs(samples: &[TrajectorySample], value: impl Fn(&TrajectorySample) -> f64) -> f64 {
    samples.iter().map(|s| value(s).abs()).fold(0.0, f64::max)
}

/// Jerk based smoothness of the sampled trajectory.
pub fn analyze_smoothness(trajectory: &Trajectory) -> Result<SmoothnessReport, KinematicsError> {
    let Some(first) = trajectory.samples.first() else {
        return Err(KinematicsError::argument("trajectory", "has no samples"));
    };
    let dof = first.positions.len();
    if dof == 0 {
        return Err(KinematicsError::InvalidDof(0));
    }
    let samples = &trajectory.samples;
    for sample in samples {
        ensure_length("sample positions", &sample.positions, dof)?;
        ensure_length("sample velocities", &sample.velocities, dof)?;
        ensure_length("sample accelerations", &sample.accelerations, dof)?;
        ensure_length("sample jerks", &sample.jerks, dof)?;
    }
    let count = samples.len() as f64;

    let joints: Vec<JointSmoothness> = (0..dof)
        .map(|j| {
            let mean_square = samples
                .iter()
                .map(|s| s.jerks[j] * s.jerks[j])
                .sum::<f64>()
                / count;
            let rms_jerk = mean_square.sqrt();
            JointSmoothness {
                rms_jerk,
                max_velocity: max_abs(samples, |s| s.velocities[j]),
                max_acceleration: max_abs(samples, |s| s.accelerations[j]),
                max_jerk: max_abs(samples, |s| s.jerks[j]),
                score: 1.0 / (1.0 + rms_jerk),
            }
        })
        .collect();

    let overall_score = joints.iter().map(|j| j.score).sum::<f64>() / dof as f64;
    Ok(SmoothnessReport {
        joints,
        overall_score,
    })
}
