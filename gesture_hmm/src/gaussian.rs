//! Multivariate normal emission densities.

use nalgebra::{Cholesky, DMatrix, DVector};

/// ln(2π)
const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// A full-covariance Gaussian with its precision matrix and normalising
/// constant precomputed.
#[derive(Clone, Debug)]
pub struct Gaussian {
    mean:      DVector<f64>,
    cov:       DMatrix<f64>,
    precision: DMatrix<f64>,
    log_norm:  f64,
}

impl Gaussian {
    /// `None` when the shapes disagree, any entry is non-finite, or the
    /// covariance is not positive definite.
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Option<Self> {
        let d = mean.len();
        if d == 0 || cov.nrows() != d || cov.ncols() != d {
            return None;
        }
        if mean.iter().chain(cov.iter()).any(|v| !v.is_finite()) {
            return None;
        }
        let chol = Cholesky::new(cov.clone())?;
        let log_det = 2.0 * chol.l().diagonal().iter().map(|v| v.ln()).sum::<f64>();
        if !log_det.is_finite() {
            return None;
        }
        let precision = chol.inverse();
        let log_norm = -0.5 * (d as f64 * LN_2PI + log_det);
        Some(Gaussian { mean, cov, precision, log_norm })
    }

    pub fn dim(&self) -> usize { self.mean.len() }
    pub fn mean(&self) -> &DVector<f64> { &self.mean }
    pub fn covariance(&self) -> &DMatrix<f64> { &self.cov }

    pub fn log_pdf(&self, x: &DVector<f64>) -> f64 {
        let diff = x - &self.mean;
        let maha = diff.dot(&(&self.precision * &diff));
        self.log_norm - 0.5 * maha
    }
}

/// Weighted sample mean and (population) covariance.
///
/// Returns `None` when the total weight is not positive. A mean built from
/// non-finite inputs is returned as-is so callers can detect it.
pub fn weighted_moments(points: &[DVector<f64>], weights: &[f64]) -> Option<(DVector<f64>, DMatrix<f64>)> {
    let d = points.first()?.len();
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return None;
    }

    let mut mean = DVector::zeros(d);
    for (p, w) in points.iter().zip(weights) {
        mean.axpy(*w, p, 1.0);
    }
    mean /= total;

    let mut cov = DMatrix::zeros(d, d);
    for (p, w) in points.iter().zip(weights) {
        let diff = p - &mean;
        cov.ger(*w, &diff, &diff, 1.0);
    }
    cov /= total;

    Some((mean, cov))
}

/// Add `floor` to every diagonal entry.
pub fn floor_variance(cov: &mut DMatrix<f64>, floor: f64) {
    for i in 0..cov.nrows().min(cov.ncols()) {
        cov[(i, i)] += floor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_normal_density_at_mean() {
        let g = Gaussian::new(DVector::zeros(2), DMatrix::identity(2, 2)).unwrap();
        // 1 / (2π) for a 2-D standard normal.
        assert!((g.log_pdf(&DVector::zeros(2)) - (-LN_2PI)).abs() < 1e-12);
    }

    #[test]
    fn density_falls_off_with_distance() {
        let g = Gaussian::new(DVector::from_vec(vec![1.0, 2.0, 3.0]), DMatrix::identity(3, 3) * 4.0).unwrap();
        let near = g.log_pdf(&DVector::from_vec(vec![1.5, 2.0, 3.0]));
        let far = g.log_pdf(&DVector::from_vec(vec![9.0, 2.0, 3.0]));
        assert!(near > far);
    }

    #[test]
    fn rejects_singular_and_non_finite() {
        assert!(Gaussian::new(DVector::zeros(2), DMatrix::zeros(2, 2)).is_none());
        assert!(Gaussian::new(DVector::from_vec(vec![f64::NAN, 0.0]), DMatrix::identity(2, 2)).is_none());
        assert!(Gaussian::new(DVector::zeros(3), DMatrix::identity(2, 2)).is_none());
    }

    #[test]
    fn moments_and_floor() {
        let pts = vec![DVector::from_vec(vec![0.0, 0.0]), DVector::from_vec(vec![2.0, 0.0])];
        let (mean, mut cov) = weighted_moments(&pts, &[1.0, 1.0]).unwrap();
        assert_eq!(mean, DVector::from_vec(vec![1.0, 0.0]));
        assert!((cov[(0, 0)] - 1.0).abs() < 1e-12);
        assert_eq!(cov[(1, 1)], 0.0);

        floor_variance(&mut cov, 0.01);
        assert!((cov[(1, 1)] - 0.01).abs() < 1e-15);
        assert!(Gaussian::new(mean, cov).is_some());
    }

    #[test]
    fn zero_weight_has_no_moments() {
        let pts = vec![DVector::from_vec(vec![1.0])];
        assert!(weighted_moments(&pts, &[0.0]).is_none());
    }
}
