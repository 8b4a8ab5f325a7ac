use pretty_assertions::assert_eq;
use test_case::test_case;

use super::{Polynomial, poly};

#[test_case(&[1.0, 2.0, 3.0]; "plain")]
#[test_case(&[0.0]; "zero")]
#[test_case(&[-0.125, 0.0, 7.5, 0.0]; "trailing zero")]
#[test_case(&[0.1, -0.3, 1e-12]; "non representable decimals")]
fn serialization_round_trips_coefficients_and_degree(coeffs: &[f64]) {
    let original = poly(coeffs);
    let bytes = serde_json::to_vec(&original).unwrap();
    let restored: Polynomial = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(restored.coeffs(), original.coeffs());
    assert_eq!(restored.degree(), original.degree());
}

#[test]
fn display_renders_nonzero_terms_in_ascending_degree() {
    assert_eq!(poly(&[1.0, 2.0, -3.0]).to_string(), "1 + 2*x - 3*x^2");
    assert_eq!(poly(&[0.0, 0.0, 4.0]).to_string(), "4*x^2");
    assert_eq!(poly(&[0.0, 0.0]).to_string(), "0");
    assert_eq!(poly(&[-1.5]).to_string(), "-1.5");
}
