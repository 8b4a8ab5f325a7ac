use nalgebra::linalg::Schur;
use nalgebra::{Complex, DMatrix};

use super::Polynomial;
use crate::error::PolynomialError;

/// Largest imaginary part a root may carry and still count as real when
/// classifying critical points.
pub const DEFAULT_IMAGINARY_TOLERANCE: f64 = 1e-8;

/// QR iterations granted to the Schur decomposition before giving up.
const SCHUR_MAX_ITERATIONS: usize = 500;

#[derive(Clone, Copy)]
enum CriticalPointKind {
    Minimum,
    Maximum,
    Any,
}

impl Polynomial {
    /// Complex roots of the polynomial, computed as the eigenvalues of its
    /// companion matrix. The order of the returned roots is whatever the
    /// eigensolver produces. A polynomial of degree 0 has no roots.
    pub fn roots(&self) -> Result<Vec<Complex<f64>>, PolynomialError> {
        let degree = self.degree();
        if degree == 0 {
            return Ok(Vec::new());
        }

        let lead = self.coeffs[degree];
        let companion = DMatrix::from_fn(degree, degree, |row, col| {
            if col + 1 == degree {
                -self.coeffs[row] / lead
            } else if row == col + 1 {
                1.0
            } else {
                0.0
            }
        });

        let schur = Schur::try_new(companion, f64::EPSILON, SCHUR_MAX_ITERATIONS)
            .ok_or(PolynomialError::EigenConvergence)?;
        Ok(schur.complex_eigenvalues().iter().copied().collect())
    }

    /// Real arguments of local minima (`p'' > 0`), sorted ascending.
    pub fn minima(&self) -> Result<Vec<f64>, PolynomialError> {
        self.minima_with_threshold(DEFAULT_IMAGINARY_TOLERANCE)
    }

    pub fn minima_with_threshold(&self, threshold: f64) -> Result<Vec<f64>, PolynomialError> {
        self.critical_points(threshold, CriticalPointKind::Minimum)
    }

    /// Real arguments of local maxima (`p'' < 0`), sorted ascending.
    pub fn maxima(&self) -> Result<Vec<f64>, PolynomialError> {
        self.maxima_with_threshold(DEFAULT_IMAGINARY_TOLERANCE)
    }

    pub fn maxima_with_threshold(&self, threshold: f64) -> Result<Vec<f64>, PolynomialError> {
        self.critical_points(threshold, CriticalPointKind::Maximum)
    }

    /// Minima and maxima together, sorted ascending.
    pub fn extrema(&self) -> Result<Vec<f64>, PolynomialError> {
        self.extrema_with_threshold(DEFAULT_IMAGINARY_TOLERANCE)
    }

    pub fn extrema_with_threshold(&self, threshold: f64) -> Result<Vec<f64>, PolynomialError> {
        self.critical_points(threshold, CriticalPointKind::Any)
    }

    /// Candidate extrema are the near-real roots of the derivative; the sign
    /// of the second derivative classifies them. Points where the second
    /// derivative vanishes are reported by neither filter.
    fn critical_points(
        &self,
        threshold: f64,
        kind: CriticalPointKind,
    ) -> Result<Vec<f64>, PolynomialError> {
        if threshold < 0.0 {
            return Err(PolynomialError::NegativeThreshold(threshold));
        }

        let derivative = self.derivative();
        if derivative.degree() == 0 {
            return Ok(Vec::new());
        }

        let mut points: Vec<f64> = derivative
            .roots()?
            .into_iter()
            .filter(|root| root.im.abs() <= threshold)
            .map(|root| root.re)
            .filter(|&x| {
                let curvature = self.evaluate_second_derivative(x);
                match kind {
                    CriticalPointKind::Minimum => curvature > 0.0,
                    CriticalPointKind::Maximum => curvature < 0.0,
                    CriticalPointKind::Any => curvature != 0.0,
                }
            })
            .collect();
        points.sort_by(f64::total_cmp);
        Ok(points)
    }
}
