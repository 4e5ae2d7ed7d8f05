//! Variance algebra for uncertainty combination and propagation.

use nalgebra::{DMatrix, DVector};

use crate::error::{MathError, MathResult};

/// Regime-marginalized variance via the total-variance decomposition:
///
/// ```text
/// Var = Σᵢ pᵢ·vᵢ + Σᵢ pᵢ·(mᵢ - m̄)²   where m̄ = Σᵢ pᵢ·mᵢ
/// ```
///
/// The result is bounded below by `min(vᵢ)` and above by `max(vᵢ)` plus
/// the between-component mean spread.
///
/// # Errors
///
/// Returns an error when the slices disagree in length, are empty,
/// probabilities do not sum to 1, or any probability or variance is
/// negative.
pub fn mixture_variance(probs: &[f64], means: &[f64], variances: &[f64]) -> MathResult<f64> {
    if probs.len() != means.len() || probs.len() != variances.len() {
        return Err(MathError::dimension_mismatch(
            format!("{} components", probs.len()),
            format!("{} means / {} variances", means.len(), variances.len()),
        ));
    }
    if probs.is_empty() {
        return Err(MathError::insufficient_data(1, 0));
    }
    if probs.iter().any(|p| *p < 0.0) {
        return Err(MathError::invalid_input("negative mixture probability"));
    }
    if variances.iter().any(|v| *v < 0.0) {
        return Err(MathError::invalid_input("negative component variance"));
    }
    let total: f64 = probs.iter().sum();
    if (total - 1.0).abs() > 1e-8 {
        return Err(MathError::invalid_input(format!(
            "mixture probabilities sum to {total}, expected 1"
        )));
    }

    let mixed_mean: f64 = probs.iter().zip(means).map(|(p, m)| p * m).sum();
    let within: f64 = probs.iter().zip(variances).map(|(p, v)| p * v).sum();
    let between: f64 = probs
        .iter()
        .zip(means)
        .map(|(p, m)| p * (m - mixed_mean).powi(2))
        .sum();

    Ok(within + between)
}

/// Propagates a base covariance through an aggregation matrix:
/// `diag(H · Σ · Hᵗ)`, one variance per aggregate row.
///
/// # Errors
///
/// Returns an error when Σ is not square or its dimension disagrees
/// with H's column count.
pub fn propagate_variance(h: &DMatrix<f64>, cov: &DMatrix<f64>) -> MathResult<DVector<f64>> {
    if cov.nrows() != cov.ncols() {
        return Err(MathError::dimension_mismatch(
            "square covariance".to_string(),
            format!("{}x{}", cov.nrows(), cov.ncols()),
        ));
    }
    if cov.nrows() != h.ncols() {
        return Err(MathError::dimension_mismatch(
            format!("{}x{} covariance", h.ncols(), h.ncols()),
            format!("{}x{}", cov.nrows(), cov.ncols()),
        ));
    }

    let propagated = h * cov * h.transpose();
    Ok(DVector::from_iterator(
        h.nrows(),
        (0..h.nrows()).map(|i| propagated[(i, i)]),
    ))
}

/// Combines per-source standard deviations through a correlation matrix:
/// `Σᵢⱼ ρᵢⱼ·σᵢ·σⱼ`. With ρ = I this reduces to the independent sum of
/// variances.
///
/// # Errors
///
/// Returns an error when the correlation matrix is not square of the
/// source count, has off-unit diagonal, or entries outside [-1, 1].
pub fn correlated_combination(std_devs: &[f64], correlation: &DMatrix<f64>) -> MathResult<f64> {
    let k = std_devs.len();
    if correlation.nrows() != k || correlation.ncols() != k {
        return Err(MathError::dimension_mismatch(
            format!("{k}x{k} correlation"),
            format!("{}x{}", correlation.nrows(), correlation.ncols()),
        ));
    }
    for i in 0..k {
        if (correlation[(i, i)] - 1.0).abs() > 1e-8 {
            return Err(MathError::invalid_input(
                "correlation diagonal must be 1",
            ));
        }
        for j in 0..k {
            if correlation[(i, j)].abs() > 1.0 + 1e-8 {
                return Err(MathError::invalid_input(
                    "correlation entries must lie in [-1, 1]",
                ));
            }
        }
    }

    let mut combined = 0.0;
    for i in 0..k {
        for j in 0..k {
            combined += correlation[(i, j)] * std_devs[i] * std_devs[j];
        }
    }
    // Quadratic form of a valid correlation matrix; numerical noise can
    // still dip a hair below zero.
    Ok(combined.max(0.0))
}

/// Unbiased sample variance; zero for fewer than two observations.
#[must_use]
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean: f64 = values.iter().sum::<f64>() / n as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0)
}

/// Weighted mean; returns `None` when weights sum to zero.
#[must_use]
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || values.len() != weights.len() {
        return None;
    }
    Some(
        values
            .iter()
            .zip(weights)
            .map(|(v, w)| v * w)
            .sum::<f64>()
            / total,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mixture_variance_equal_means() {
        // Equal means: between term vanishes, result is the weighted
        // average of variances.
        let v = mixture_variance(&[0.5, 0.5], &[100.0, 100.0], &[1.0, 9.0]).unwrap();
        assert_relative_eq!(v, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mixture_variance_bounds() {
        let probs = [0.3, 0.7];
        let means = [90.0, 110.0];
        let variances = [4.0, 16.0];
        let v = mixture_variance(&probs, &means, &variances).unwrap();

        let min_var = 4.0;
        let mean_spread: f64 = {
            let mixed = 0.3 * 90.0 + 0.7 * 110.0;
            0.3 * (90.0_f64 - mixed).powi(2) + 0.7 * (110.0_f64 - mixed).powi(2)
        };
        assert!(v >= min_var);
        assert!(v <= 16.0 + mean_spread + 1e-12);
    }

    #[test]
    fn test_mixture_variance_rejects_bad_input() {
        assert!(mixture_variance(&[0.5, 0.6], &[0.0, 0.0], &[1.0, 1.0]).is_err());
        assert!(mixture_variance(&[1.0], &[0.0], &[-1.0]).is_err());
        assert!(mixture_variance(&[], &[], &[]).is_err());
        assert!(mixture_variance(&[1.0], &[0.0, 1.0], &[1.0]).is_err());
    }

    #[test]
    fn test_propagate_variance_row_sum() {
        // H = [1, 1], diagonal Σ with 2 and 2: aggregate variance 4.
        let h = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let cov = DMatrix::from_diagonal(&DVector::from_vec(vec![2.0, 2.0]));
        let out = propagate_variance(&h, &cov).unwrap();
        assert_relative_eq!(out[0], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_propagate_variance_with_covariance_term() {
        // Var(a+b) = Va + Vb + 2 Cov(a,b).
        let h = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let out = propagate_variance(&h, &cov).unwrap();
        assert_relative_eq!(out[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_propagate_variance_dimension_checks() {
        let h = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let bad = DMatrix::from_row_slice(3, 3, &[0.0; 9]);
        assert!(propagate_variance(&h, &bad).is_err());
    }

    #[test]
    fn test_correlated_combination_identity_is_additive() {
        let sigmas = [1.0, 1.0];
        let rho = DMatrix::identity(2, 2);
        let v = correlated_combination(&sigmas, &rho).unwrap();
        assert_relative_eq!(v, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correlated_combination_full_form() {
        let sigmas = [2.0, 3.0];
        let rho = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.5, 1.0]);
        let v = correlated_combination(&sigmas, &rho).unwrap();
        // 4 + 9 + 2*0.5*6 = 19
        assert_relative_eq!(v, 19.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_variance() {
        assert_relative_eq!(sample_variance(&[1.0, 3.0]), 2.0, epsilon = 1e-12);
        assert_eq!(sample_variance(&[5.0]), 0.0);
    }

    #[test]
    fn test_weighted_mean() {
        let m = weighted_mean(&[10.0, 20.0], &[3.0, 1.0]).unwrap();
        assert_relative_eq!(m, 12.5, epsilon = 1e-12);
        assert!(weighted_mean(&[1.0], &[0.0]).is_none());
    }
}
