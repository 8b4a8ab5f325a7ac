mod serialization;

use super::Polynomial;

fn poly(coeffs: &[f64]) -> Polynomial {
    Polynomial::new(coeffs.to_vec()).unwrap()
}

fn assert_close(a: f64, b: f64) {
    let tol = 1e-8 * (1.0 + a.abs().max(b.abs()));
    assert!(
        (a - b).abs() <= tol,
        "{a} and {b} differ by more than {tol}"
    );
}
