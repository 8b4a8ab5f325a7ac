mod analysis;

#[cfg(test)]
mod tests;

pub use self::analysis::DEFAULT_IMAGINARY_TOLERANCE;

use std::cmp::max;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::error::PolynomialError;

/// A dense univariate polynomial with real coefficients.
///
/// Coefficients are stored in ascending order of degree, so a value holding
/// `[c0, c1, c2]` represents `c0 + c1*x + c2*x^2`. At least one coefficient is
/// always present; trailing zeros are permitted and do not change the value
/// the polynomial represents.
///
/// Every binary or unary operation comes in three flavours that agree on the
/// result: a `*_into` primitive writing to a caller-provided buffer, an
/// in-place form, and a value-returning form (often a `std::ops` impl on
/// references).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    /// A zero polynomial with `len` coefficients.
    pub fn zero(len: usize) -> Result<Self, PolynomialError> {
        if len < 1 {
            return Err(PolynomialError::EmptyCoefficients);
        }
        Ok(Self {
            coeffs: vec![0.0; len],
        })
    }

    /// Adopts `coeffs` as the coefficient sequence, lowest degree first.
    pub fn new(coeffs: Vec<f64>) -> Result<Self, PolynomialError> {
        if coeffs.is_empty() {
            return Err(PolynomialError::EmptyCoefficients);
        }
        Ok(Self { coeffs })
    }

    /// The constant polynomial `p(x) = value`.
    pub fn constant(value: f64) -> Self {
        Self {
            coeffs: vec![value],
        }
    }

    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    pub fn set_coeffs(&mut self, coeffs: Vec<f64>) -> Result<(), PolynomialError> {
        if coeffs.is_empty() {
            return Err(PolynomialError::EmptyCoefficients);
        }
        self.coeffs = coeffs;
        Ok(())
    }

    /// Highest index with a nonzero coefficient, or 0 when all coefficients
    /// are zero.
    pub fn degree(&self) -> usize {
        self.coeffs.iter().rposition(|&c| c != 0.0).unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0.0)
    }

    /// Leading nonzero coefficient, or 0 for the zero polynomial.
    pub fn lead(&self) -> f64 {
        self.coeffs
            .iter()
            .rev()
            .find(|&&c| c != 0.0)
            .copied()
            .unwrap_or(0.0)
    }

    /// Drops trailing zero coefficients down to the shortest representation.
    pub fn trim(&mut self) {
        let keep = self.degree() + 1;
        self.coeffs.truncate(keep);
    }

    pub fn trim_into(&self, result: &mut Self) {
        result.coeffs.clear();
        result.coeffs.extend_from_slice(&self.coeffs[..self.degree() + 1]);
    }

    pub fn trimmed(&self) -> Self {
        let mut result = Self::constant(0.0);
        self.trim_into(&mut result);
        result
    }

    // ---- arithmetic -------------------------------------------------------

    pub fn add_into(&self, other: &Self, result: &mut Self) {
        let len = max(self.coeffs.len(), other.coeffs.len());
        result.coeffs.clear();
        result.coeffs.resize(len, 0.0);
        for (i, out) in result.coeffs.iter_mut().enumerate() {
            *out = self.coeffs.get(i).copied().unwrap_or(0.0)
                + other.coeffs.get(i).copied().unwrap_or(0.0);
        }
    }

    pub fn sub_into(&self, other: &Self, result: &mut Self) {
        let len = max(self.coeffs.len(), other.coeffs.len());
        result.coeffs.clear();
        result.coeffs.resize(len, 0.0);
        for (i, out) in result.coeffs.iter_mut().enumerate() {
            *out = self.coeffs.get(i).copied().unwrap_or(0.0)
                - other.coeffs.get(i).copied().unwrap_or(0.0);
        }
    }

    /// Convolution of the two coefficient sequences; the result has
    /// `la + lb - 1` coefficients.
    pub fn mul_into(&self, other: &Self, result: &mut Self) {
        let mut product = vec![0.0; self.coeffs.len() + other.coeffs.len() - 1];
        for (i, &a) in self.coeffs.iter().enumerate() {
            for (j, &b) in other.coeffs.iter().enumerate() {
                product[i + j] += a * b;
            }
        }
        result.coeffs = product;
    }

    pub fn scale_into(&self, factor: f64, result: &mut Self) {
        result.coeffs.clear();
        result.coeffs.extend(self.coeffs.iter().map(|&c| c * factor));
    }

    // ---- calculus ---------------------------------------------------------

    /// First derivative: `d[i] = (i + 1) * c[i + 1]`. The derivative of a
    /// constant is the single coefficient 0.
    pub fn derivative_into(&self, result: &mut Self) {
        result.coeffs.clear();
        if self.coeffs.len() <= 1 {
            result.coeffs.push(0.0);
            return;
        }
        result.coeffs.extend(
            self.coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, &c)| i as f64 * c),
        );
    }

    pub fn derivative(&self) -> Self {
        let mut result = Self::constant(0.0);
        self.derivative_into(&mut result);
        result
    }

    pub fn differentiate(&mut self) {
        let len = self.coeffs.len();
        if len <= 1 {
            self.coeffs[0] = 0.0;
            return;
        }
        for i in 1..len {
            self.coeffs[i - 1] = i as f64 * self.coeffs[i];
        }
        self.coeffs.truncate(len - 1);
    }

    pub fn nth_derivative_into(
        &self,
        order: usize,
        result: &mut Self,
    ) -> Result<(), PolynomialError> {
        if order < 1 {
            return Err(PolynomialError::InvalidOrder(order));
        }
        self.derivative_into(result);
        for _ in 1..order {
            result.differentiate();
        }
        Ok(())
    }

    pub fn nth_derivative(&self, order: usize) -> Result<Self, PolynomialError> {
        let mut result = Self::constant(0.0);
        self.nth_derivative_into(order, &mut result)?;
        Ok(result)
    }

    pub fn differentiate_nth(&mut self, order: usize) -> Result<(), PolynomialError> {
        if order < 1 {
            return Err(PolynomialError::InvalidOrder(order));
        }
        for _ in 0..order {
            self.differentiate();
        }
        Ok(())
    }

    /// Antiderivative with integration constant `constant`:
    /// `I[0] = constant`, `I[i + 1] = c[i] / (i + 1)`.
    pub fn integral_with_constant_into(&self, constant: f64, result: &mut Self) {
        result.coeffs.clear();
        result.coeffs.reserve(self.coeffs.len() + 1);
        result.coeffs.push(constant);
        result.coeffs.extend(
            self.coeffs
                .iter()
                .enumerate()
                .map(|(i, &c)| c / (i + 1) as f64),
        );
    }

    pub fn integral_into(&self, result: &mut Self) {
        self.integral_with_constant_into(0.0, result);
    }

    pub fn integral_with_constant(&self, constant: f64) -> Self {
        let mut result = Self::constant(0.0);
        self.integral_with_constant_into(constant, &mut result);
        result
    }

    pub fn integral(&self) -> Self {
        self.integral_with_constant(0.0)
    }

    pub fn integrate_with_constant(&mut self, constant: f64) {
        for (i, c) in self.coeffs.iter_mut().enumerate() {
            *c /= (i + 1) as f64;
        }
        self.coeffs.insert(0, constant);
    }

    pub fn integrate(&mut self) {
        self.integrate_with_constant(0.0);
    }

    /// Iterated antiderivative. `constants[j]` is the constant applied at
    /// integration step `j` (outermost first); when `constants` is `None`
    /// all of them are zero. The constant count must equal `order`.
    pub fn nth_integral_into(
        &self,
        order: usize,
        constants: Option<&[f64]>,
        result: &mut Self,
    ) -> Result<(), PolynomialError> {
        check_integration_constants(order, constants)?;
        result.coeffs.clear();
        result.coeffs.extend_from_slice(&self.coeffs);
        for step in 0..order {
            let constant = constants.map_or(0.0, |values| values[step]);
            result.integrate_with_constant(constant);
        }
        Ok(())
    }

    pub fn nth_integral(
        &self,
        order: usize,
        constants: Option<&[f64]>,
    ) -> Result<Self, PolynomialError> {
        let mut result = Self::constant(0.0);
        self.nth_integral_into(order, constants, &mut result)?;
        Ok(result)
    }

    pub fn integrate_nth(
        &mut self,
        order: usize,
        constants: Option<&[f64]>,
    ) -> Result<(), PolynomialError> {
        check_integration_constants(order, constants)?;
        for step in 0..order {
            let constant = constants.map_or(0.0, |values| values[step]);
            self.integrate_with_constant(constant);
        }
        Ok(())
    }

    /// Definite integral over `[a, b]`; the integration constant cancels.
    pub fn integrate_interval(&self, a: f64, b: f64) -> f64 {
        let antiderivative = self.integral();
        antiderivative.evaluate(b) - antiderivative.evaluate(a)
    }

    /// `F(b) - F(a)` for the `order`-fold antiderivative `F`. Unlike the
    /// single integral, the inner constants do not cancel, so they may be
    /// supplied.
    pub fn nth_integrate_interval(
        &self,
        a: f64,
        b: f64,
        order: usize,
        constants: Option<&[f64]>,
    ) -> Result<f64, PolynomialError> {
        let antiderivative = self.nth_integral(order, constants)?;
        Ok(antiderivative.evaluate(b) - antiderivative.evaluate(a))
    }

    // ---- evaluation -------------------------------------------------------

    /// Horner-form evaluation at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    pub fn evaluate_derivative(&self, x: f64) -> f64 {
        self.coeffs
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (i, &c)| acc * x + i as f64 * c)
    }

    pub fn evaluate_second_derivative(&self, x: f64) -> f64 {
        self.coeffs
            .iter()
            .enumerate()
            .skip(2)
            .rev()
            .fold(0.0, |acc, (i, &c)| acc * x + (i * (i - 1)) as f64 * c)
    }

    pub fn evaluate_nth_derivative(&self, x: f64, order: usize) -> Result<f64, PolynomialError> {
        Ok(self.nth_derivative(order)?.evaluate(x))
    }

    // ---- normalization ----------------------------------------------------

    /// Divides the coefficient vector by its Euclidean norm. The zero
    /// polynomial is left unchanged.
    pub fn normalize(&mut self) {
        let norm = self.coeffs.iter().map(|&c| c * c).sum::<f64>().sqrt();
        if norm > 0.0 {
            for c in &mut self.coeffs {
                *c /= norm;
            }
        }
    }

    pub fn normalize_into(&self, result: &mut Self) {
        result.coeffs.clear();
        result.coeffs.extend_from_slice(&self.coeffs);
        result.normalize();
    }

    pub fn normalized(&self) -> Self {
        let mut result = self.clone();
        result.normalize();
        result
    }

    /// Divides all coefficients by the leading coefficient so that the
    /// highest-degree term becomes 1. The zero polynomial is left unchanged.
    pub fn normalize_highest_degree(&mut self) {
        let lead = self.lead();
        if lead != 0.0 {
            for c in &mut self.coeffs {
                *c /= lead;
            }
        }
    }

    pub fn normalize_highest_degree_into(&self, result: &mut Self) {
        result.coeffs.clear();
        result.coeffs.extend_from_slice(&self.coeffs);
        result.normalize_highest_degree();
    }

    pub fn normalized_highest_degree(&self) -> Self {
        let mut result = self.clone();
        result.normalize_highest_degree();
        result
    }
}

fn check_integration_constants(
    order: usize,
    constants: Option<&[f64]>,
) -> Result<(), PolynomialError> {
    if order < 1 {
        return Err(PolynomialError::InvalidOrder(order));
    }
    if let Some(values) = constants {
        if values.len() != order {
            return Err(PolynomialError::ConstantCountMismatch {
                expected: order,
                actual: values.len(),
            });
        }
    }
    Ok(())
}

/// Trailing zero coefficients do not affect equality.
impl PartialEq for Polynomial {
    fn eq(&self, other: &Self) -> bool {
        let terms = max(self.coeffs.len(), other.coeffs.len());
        (0..terms).all(|i| {
            self.coeffs.get(i).copied().unwrap_or(0.0)
                == other.coeffs.get(i).copied().unwrap_or(0.0)
        })
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: Self) -> Polynomial {
        let mut result = Polynomial::constant(0.0);
        self.add_into(rhs, &mut result);
        result
    }
}

impl AddAssign<&Polynomial> for Polynomial {
    fn add_assign(&mut self, rhs: &Polynomial) {
        let len = max(self.coeffs.len(), rhs.coeffs.len());
        self.coeffs.resize(len, 0.0);
        for (l, &r) in self.coeffs.iter_mut().zip(&rhs.coeffs) {
            *l += r;
        }
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: Self) -> Polynomial {
        let mut result = Polynomial::constant(0.0);
        self.sub_into(rhs, &mut result);
        result
    }
}

impl SubAssign<&Polynomial> for Polynomial {
    fn sub_assign(&mut self, rhs: &Polynomial) {
        let len = max(self.coeffs.len(), rhs.coeffs.len());
        self.coeffs.resize(len, 0.0);
        for (l, &r) in self.coeffs.iter_mut().zip(&rhs.coeffs) {
            *l -= r;
        }
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: Self) -> Polynomial {
        let mut result = Polynomial::constant(0.0);
        self.mul_into(rhs, &mut result);
        result
    }
}

/// In-place multiplication materializes into a fresh buffer before adopting
/// it, so the convolution never reads coefficients it already overwrote.
impl MulAssign<&Polynomial> for Polynomial {
    fn mul_assign(&mut self, rhs: &Polynomial) {
        let mut product = Polynomial::constant(0.0);
        self.mul_into(rhs, &mut product);
        self.coeffs = product.coeffs;
    }
}

impl Mul<f64> for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: f64) -> Polynomial {
        let mut result = Polynomial::constant(0.0);
        self.scale_into(rhs, &mut result);
        result
    }
}

impl MulAssign<f64> for Polynomial {
    fn mul_assign(&mut self, rhs: f64) {
        self.coeffs.iter_mut().for_each(|c| *c *= rhs);
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        self * -1.0
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let mut first = true;
        for (i, &c) in self.coeffs.iter().enumerate() {
            if c == 0.0 {
                continue;
            }
            if first {
                write!(f, "{c}")?;
                first = false;
            } else if c < 0.0 {
                write!(f, " - {}", -c)?;
            } else {
                write!(f, " + {c}")?;
            }
            match i {
                0 => {}
                1 => write!(f, "*x")?,
                _ => write!(f, "*x^{i}")?,
            }
        }
        Ok(())
    }
}
