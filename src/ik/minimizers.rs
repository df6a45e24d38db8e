//! Bounded local optimizers used by the numeric inverse kinematics. Both keep every
//! iterate inside the joint limits by projecting onto them.

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::constraints::Constraints;
use crate::jacobian::damped_pseudo_inverse;

/// Step of the central differences.
const DIFFERENCE_STEP: f64 = 1e-7;

/// Sufficient decrease constant of the Armijo line search.
const ARMIJO: f64 = 1e-4;

const MAX_LINE_SEARCH_STEPS: usize = 40;

/// Relative change of the objective below which the search is considered converged.
const VALUE_TOLERANCE: f64 = 1e-14;

/// Projected gradient norm below which the search is considered converged.
const GRADIENT_TOLERANCE: f64 = 1e-12;

const MAX_DAMPING: f64 = 1e10;
const MIN_DAMPING: f64 = 1e-12;

#[derive(Debug, Clone)]
pub(crate) struct MinimizerResult {
    pub x: Vec<f64>,

    /// Objective value at `x` (half the squared residual norm for least squares)
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

fn project(limits: &Constraints, x: &mut DVector<f64>) {
    limits.project(x.as_mut_slice());
}

/// Central difference gradient of the scalar function.
fn numeric_gradient<F: Fn(&[f64]) -> f64>(f: &F, x: &DVector<f64>) -> DVector<f64> {
    let mut shifted = x.clone();
    DVector::from_fn(x.len(), |i, _| {
        let h = DIFFERENCE_STEP * x[i].abs().max(1.0);
        shifted[i] = x[i] + h;
        let forward = f(shifted.as_slice());
        shifted[i] = x[i] - h;
        let backward = f(shifted.as_slice());
        shifted[i] = x[i];
        (forward - backward) / (2.0 * h)
    })
}

/// Central difference Jacobian of the vector function, one column per variable.
fn numeric_jacobian<F: Fn(&[f64]) -> DVector<f64>>(
    f: &F,
    x: &DVector<f64>,
    rows: usize,
) -> DMatrix<f64> {
    let mut jacobian = DMatrix::zeros(rows, x.len());
    let mut shifted = x.clone();
    for i in 0..x.len() {
        let h = DIFFERENCE_STEP * x[i].abs().max(1.0);
        shifted[i] = x[i] + h;
        let forward = f(shifted.as_slice());
        shifted[i] = x[i] - h;
        let backward = f(shifted.as_slice());
        shifted[i] = x[i];
        jacobian.set_column(i, &((forward - backward) / (2.0 * h)));
    }
    jacobian
}

/// Gradient with the components that would push against an active bound removed.
fn projected_gradient(limits: &Constraints, x: &DVector<f64>, gradient: &DVector<f64>) -> DVector<f64> {
    let mut stepped = x - gradient;
    project(limits, &mut stepped);
    x - stepped
}

/// Quasi-Newton (BFGS) minimization of `f` inside the joint limits.
///
/// The search direction is zeroed for joints sitting on a bound and pointing outwards;
/// the step is found by backtracking with the Armijo condition measured on the projected
/// step. The inverse Hessian estimate is reset whenever the direction stops descending.
pub(crate) fn minimize_bounded<F: Fn(&[f64]) -> f64>(
    f: F,
    start: &[f64],
    limits: &Constraints,
    max_iterations: usize,
) -> MinimizerResult {
    let n = start.len();
    let mut x = DVector::from_column_slice(start);
    project(limits, &mut x);
    let mut value = f(x.as_slice());
    let mut gradient = numeric_gradient(&f, &x);
    let mut inverse_hessian = DMatrix::<f64>::identity(n, n);
    let mut converged = false;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        if projected_gradient(limits, &x, &gradient).amax() < GRADIENT_TOLERANCE {
            converged = true;
            break;
        }

        let mut direction = free_direction(limits, &x, -(&inverse_hessian * &gradient));
        if gradient.dot(&direction) >= 0.0 {
            inverse_hessian.fill_with_identity();
            direction = free_direction(limits, &x, -gradient.clone());
            if gradient.dot(&direction) >= 0.0 {
                converged = true;
                break;
            }
        }

        let Some((next, next_value)) = line_search(&f, limits, &x, value, &gradient, &direction)
        else {
            trace!("Line search stalled at iteration {iterations}, value {value:e}");
            break;
        };

        let next_gradient = numeric_gradient(&f, &next);
        let s = &next - &x;
        let y = &next_gradient - &gradient;
        let sy = s.dot(&y);
        if sy > 1e-16 {
            let rho = 1.0 / sy;
            let identity = DMatrix::<f64>::identity(n, n);
            let left = &identity - &s * y.transpose() * rho;
            let right = &identity - &y * s.transpose() * rho;
            inverse_hessian = left * &inverse_hessian * right + &s * s.transpose() * rho;
        }

        let decrease = value - next_value;
        x = next;
        gradient = next_gradient;
        value = next_value;
        if decrease <= VALUE_TOLERANCE * value.abs().max(1.0) {
            converged = true;
            break;
        }
    }

    MinimizerResult {
        x: x.iter().copied().collect(),
        value,
        iterations,
        converged,
    }
}

/// Removes direction components of joints that sit on a bound and would leave it.
fn free_direction(limits: &Constraints, x: &DVector<f64>, mut direction: DVector<f64>) -> DVector<f64> {
    for i in 0..x.len() {
        let at_lower = x[i] <= limits.from[i] && direction[i] < 0.0;
        let at_upper = x[i] >= limits.to[i] && direction[i] > 0.0;
        if at_lower || at_upper {
            direction[i] = 0.0;
        }
    }
    direction
}

fn line_search<F: Fn(&[f64]) -> f64>(
    f: &F,
    limits: &Constraints,
    x: &DVector<f64>,
    value: f64,
    gradient: &DVector<f64>,
    direction: &DVector<f64>,
) -> Option<(DVector<f64>, f64)> {
    let mut step = 1.0;
    for _ in 0..MAX_LINE_SEARCH_STEPS {
        let mut candidate = x + direction * step;
        project(limits, &mut candidate);
        let candidate_value = f(candidate.as_slice());
        let expected = gradient.dot(&(&candidate - x));
        if candidate_value.is_finite() && candidate_value <= value + ARMIJO * expected {
            return Some((candidate, candidate_value));
        }
        step *= 0.5;
    }
    None
}

/// Levenberg-Marquardt least squares fit of the residual inside the joint limits.
///
/// Each step is the damped least squares solution computed with
/// [`damped_pseudo_inverse`] and projected onto the limits. Damping is divided by ten
/// after a successful step and multiplied by ten after a rejected one.
pub(crate) fn least_squares_bounded<F: Fn(&[f64]) -> DVector<f64>>(
    residual: F,
    start: &[f64],
    limits: &Constraints,
    max_iterations: usize,
    initial_damping: f64,
) -> MinimizerResult {
    let mut x = DVector::from_column_slice(start);
    project(limits, &mut x);
    let mut r = residual(x.as_slice());
    let mut cost = 0.5 * r.norm_squared();
    let mut damping = initial_damping;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        let jacobian = numeric_jacobian(&residual, &x, r.len());
        if (jacobian.transpose() * &r).amax() < GRADIENT_TOLERANCE {
            converged = true;
            break;
        }

        let inverse = match damped_pseudo_inverse(&jacobian, damping) {
            Ok(inverse) => inverse,
            Err(e) => {
                trace!("Least squares step failed: {e}");
                break;
            }
        };

        let mut candidate = &x - inverse * &r;
        project(limits, &mut candidate);
        let candidate_r = residual(candidate.as_slice());
        let candidate_cost = 0.5 * candidate_r.norm_squared();

        if candidate_cost.is_finite() && candidate_cost < cost {
            let decrease = cost - candidate_cost;
            let moved = (&candidate - &x).amax();
            x = candidate;
            r = candidate_r;
            cost = candidate_cost;
            damping = (damping / 10.0).max(MIN_DAMPING);
            if decrease <= VALUE_TOLERANCE * cost.max(1.0) || moved < GRADIENT_TOLERANCE {
                converged = true;
                break;
            }
        } else {
            damping *= 10.0;
            if damping > MAX_DAMPING {
                break;
            }
        }
    }

    MinimizerResult {
        x: x.iter().copied().collect(),
        value: cost,
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rosenbrock(x: &[f64]) -> f64 {
        (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2)
    }

    #[test]
    fn test_minimize_unconstrained_minimum() {
        let limits = Constraints::new(&[(-2.0, 2.0), (-2.0, 2.0)]).unwrap();
        let result = minimize_bounded(rosenbrock, &[-1.2, 1.0], &limits, 500);
        assert!(result.value < 1e-8, "value {}", result.value);
        assert!((result.x[0] - 1.0).abs() < 1e-3);
        assert!((result.x[1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_minimize_respects_bounds() {
        // Unconstrained minimum at (1, 1) is outside, constrained one is on the bound
        let limits = Constraints::new(&[(-2.0, 0.5), (-2.0, 2.0)]).unwrap();
        let result = minimize_bounded(rosenbrock, &[0.0, 0.0], &limits, 500);
        assert!(result.x[0] <= 0.5);
        assert!((result.x[0] - 0.5).abs() < 1e-6);
        assert!((result.x[1] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_least_squares() {
        // Residual is "target minus model": target (3, -1), model x
        let residual = |x: &[f64]| DVector::from_vec(vec![3.0 - x[0], -1.0 - x[1], 0.0]);
        let limits = Constraints::new(&[(-5.0, 5.0), (-5.0, 5.0)]).unwrap();
        let result = least_squares_bounded(residual, &[0.0, 0.0], &limits, 100, 1e-3);
        assert!(result.value < 1e-12, "cost {}", result.value);
        assert!((result.x[0] - 3.0).abs() < 1e-6);

        // Same problem with the target outside the limits ends on the bound
        let limits = Constraints::new(&[(-5.0, 2.0), (-5.0, 5.0)]).unwrap();
        let result = least_squares_bounded(residual, &[0.0, 0.0], &limits, 100, 1e-3);
        assert!((result.x[0] - 2.0).abs() < 1e-9);
        assert!((result.x[1] + 1.0).abs() < 1e-6);
    }
}
