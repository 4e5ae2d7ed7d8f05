//! Nonlinear least-squares optimization.
//!
//! Steepest descent with numerical gradients and Armijo backtracking.
//! The curve-fitting objectives in this library are small (four
//! parameters) and smooth, so the simple scheme converges quickly while
//! honoring a hard iteration budget.

use crate::error::MathResult;

/// Configuration for the optimizer.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    /// Gradient-norm threshold for convergence.
    pub tolerance: f64,
    /// Hard iteration budget; the optimizer never blocks beyond it.
    pub max_iterations: usize,
    /// Step size for central-difference gradients.
    pub gradient_step: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 500,
            gradient_step: 1e-6,
        }
    }
}

/// Outcome of an optimization run.
///
/// Non-convergence is reported through `converged`, with the last
/// parameters and objective retained so callers can surface them in
/// their own fit errors instead of returning garbage silently.
#[derive(Debug, Clone)]
pub struct OptimizerResult {
    /// Best parameters found.
    pub parameters: Vec<f64>,
    /// Objective value at those parameters.
    pub objective: f64,
    /// Iterations consumed.
    pub iterations: usize,
    /// Whether the gradient norm fell below tolerance.
    pub converged: bool,
}

/// Central-difference gradient of `f` at `params`.
fn numerical_gradient<F>(f: &F, params: &[f64], step: f64) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut gradient = vec![0.0; params.len()];
    let mut probe = params.to_vec();
    for (i, g) in gradient.iter_mut().enumerate() {
        let original = probe[i];
        probe[i] = original + step;
        let up = f(&probe);
        probe[i] = original - step;
        let down = f(&probe);
        probe[i] = original;
        *g = (up - down) / (2.0 * step);
    }
    gradient
}

/// Minimizes `f` from `initial` by steepest descent with backtracking.
///
/// Returns the best parameters seen, whether or not convergence was
/// reached within the budget.
pub fn minimize<F>(f: F, initial: &[f64], config: &OptimizerConfig) -> MathResult<OptimizerResult>
where
    F: Fn(&[f64]) -> f64,
{
    let mut params = initial.to_vec();
    let mut value = f(&params);

    for iteration in 0..config.max_iterations {
        let gradient = numerical_gradient(&f, &params, config.gradient_step);
        let grad_norm_sq: f64 = gradient.iter().map(|g| g * g).sum();

        if grad_norm_sq.sqrt() < config.tolerance {
            return Ok(OptimizerResult {
                parameters: params,
                objective: value,
                iterations: iteration,
                converged: true,
            });
        }

        // Armijo backtracking line search along -gradient.
        let mut step = 1.0;
        let sufficient_decrease = 0.5 * grad_norm_sq;
        let accepted = loop {
            let trial: Vec<f64> = params
                .iter()
                .zip(&gradient)
                .map(|(p, g)| p - step * g)
                .collect();
            let trial_value = f(&trial);

            if trial_value < value - step * sufficient_decrease {
                params = trial;
                value = trial_value;
                break true;
            }

            step *= 0.5;
            if step < 1e-15 {
                break false;
            }
        };

        if !accepted {
            // Stalled: gradient no longer yields descent at any step.
            let converged = grad_norm_sq.sqrt() < config.tolerance * 100.0;
            return Ok(OptimizerResult {
                parameters: params,
                objective: value,
                iterations: iteration + 1,
                converged,
            });
        }
    }

    log::debug!(
        "optimizer exhausted {} iterations (objective {:.4e})",
        config.max_iterations,
        value
    );

    Ok(OptimizerResult {
        parameters: params,
        objective: value,
        iterations: config.max_iterations,
        converged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_minimize_quadratic() {
        // Minimize (x - 2)^2 + (y + 1)^2.
        let f = |p: &[f64]| (p[0] - 2.0).powi(2) + (p[1] + 1.0).powi(2);

        let result = minimize(f, &[0.0, 0.0], &OptimizerConfig::default()).unwrap();

        assert!(result.converged);
        assert_relative_eq!(result.parameters[0], 2.0, epsilon = 1e-5);
        assert_relative_eq!(result.parameters[1], -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_minimize_rosenbrock_like_within_budget() {
        let f = |p: &[f64]| {
            let (x, y) = (p[0], p[1]);
            (1.0 - x).powi(2) + 10.0 * (y - x * x).powi(2)
        };

        let config = OptimizerConfig {
            max_iterations: 5_000,
            tolerance: 1e-6,
            ..OptimizerConfig::default()
        };
        let result = minimize(f, &[-1.0, 1.0], &config).unwrap();

        // The valley is slow for steepest descent; the budget must cap
        // the work either way, and the objective must have improved.
        assert!(result.iterations <= 5_000);
        assert!(result.objective < f(&[-1.0, 1.0]));
    }

    #[test]
    fn test_budget_is_honored() {
        let f = |p: &[f64]| p[0].powi(2);
        let config = OptimizerConfig {
            max_iterations: 3,
            tolerance: 0.0, // unreachable tolerance
            ..OptimizerConfig::default()
        };

        let result = minimize(f, &[100.0], &config).unwrap();
        assert!(result.iterations <= 3);
        assert!(!result.converged || result.iterations < 3);
    }
}
