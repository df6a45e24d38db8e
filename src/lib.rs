//! Rust implementation of forward, inverse and differential kinematics for serial robot arms
//! with one to six revolute joints, described by standard Denavit-Hartenberg parameters,
//! together with quintic polynomial joint trajectories.
//!
//! # Features
//!
//! - Forward kinematics of any DH chain, including the pose of every intermediate link frame.
//! - Analytic geometric Jacobian, singularity and manipulability analysis, damped least squares
//!   pseudo-inverse and resolved rate joint velocities.
//! - Numeric inverse kinematics from several initial guesses, with up to three distinct
//!   solutions. All returned solutions are cross-checked with forward kinematics and
//!   comply with the joint limits. Planar two link arms are additionally solved in closed form.
//! - Unreachable targets are recognized from the reach of the chain and reported separately from
//!   targets the solver did not converge for.
//! - Quintic trajectories matching position, velocity and acceleration at both ends, stop and go
//!   trajectories through several waypoints, duration selection from joint limits and
//!   jerk based smoothness scores.
//! - Goal directed motion that validates every step (joint limits, ground clearance) before
//!   executing it, and warns about singular configurations on the way.
//! - Workspace sampling and Grübler mobility count.
//!
//! # Units
//!
//! DH lengths `a` and `d` are given in centimeters, as robot data sheets usually give them.
//! All poses, targets, tolerances and reach values are in meters. All angles are in radians.
//! The conversion happens in exactly one place, [`kinematics_impl::dh_transform`].
//!
//! # Randomness
//!
//! The inverse kinematics and the workspace sampling take the random generator as an argument.
//! Given the same seeded generator, results are reproducible.
//!
//! ## Examples
//!
//! - **basic.rs**: Forward and inverse kinematics, Jacobian and a quintic trajectory.
//! - **goal_motion.rs**: Goal directed motion to a Cartesian target, step by step.

pub mod parameters;

#[path = "utils/utils.rs"]
pub mod utils;
pub mod kinematic_traits;
pub mod kinematics_error;
pub mod kinematics_impl;

pub mod constraints;

pub mod jacobian;

#[path = "ik/solver.rs"]
pub mod ik;

#[path = "ik/residuals.rs"]
pub mod residuals;

#[path = "ik/minimizers.rs"]
mod minimizers;

#[path = "ik/analytic.rs"]
pub mod analytic;

#[path = "path_plan/quintic.rs"]
pub mod quintic;

#[path = "path_plan/interpolator.rs"]
pub mod interpolator;

#[path = "path_plan/goal_planner.rs"]
pub mod goal_planner;

pub mod workspace;

#[cfg(test)]
mod tests;

pub use constraints::Constraints;
pub use goal_planner::{GoalMotion, GoalPlannerConfig, MotionPhase};
pub use ik::{inverse_kinematics, IkConfig, IkOutcome, IkSolution, IkTarget};
pub use jacobian::{
    check_singularity, compute_jacobian, compute_manipulability, damped_pseudo_inverse,
    SingularityReport, SingularityThresholds,
};
pub use kinematic_traits::{Joints, Kinematics, Pose};
pub use kinematics_error::KinematicsError;
pub use kinematics_impl::{forward_kinematics, transformation_chain, DHKinematics};
pub use parameters::DhLink;
pub use quintic::{analyze_smoothness, optimize_duration, plan_multi_point, plan_quintic, Trajectory};
