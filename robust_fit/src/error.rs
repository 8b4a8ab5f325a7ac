use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolynomialError {
    #[error("a polynomial needs at least one coefficient")]
    EmptyCoefficients,

    #[error("derivative/integration order must be at least 1, got {0}")]
    InvalidOrder(usize),

    #[error("expected {expected} integration constants, got {actual}")]
    ConstantCountMismatch { expected: usize, actual: usize },

    #[error("imaginary-part threshold must be non-negative, got {0}")]
    NegativeThreshold(f64),

    #[error("eigenvalue iteration on the companion matrix did not converge")]
    EigenConvergence,
}

#[derive(Error, Debug)]
pub enum SubsetError {
    #[error("subset size {subset_size} is invalid for {available} candidate samples")]
    InvalidSubsetSize { subset_size: usize, available: usize },

    #[error("invalid subset range [{lo}, {hi})")]
    InvalidSubsetRange { lo: usize, hi: usize },

    #[error("not enough samples; needed {needed}, have {available}")]
    NotEnoughSamples { needed: usize, available: usize },
}

#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("estimator settings are locked while an estimation is running")]
    Locked,

    #[error("estimator is not ready: {0}")]
    NotReady(&'static str),

    #[error("{name} must lie in {bounds}, got {value}")]
    OutOfBounds {
        name: &'static str,
        bounds: &'static str,
        value: f64,
    },

    #[error("quality scores length {actual} does not match sample count {expected}")]
    QualityScoresMismatch { expected: usize, actual: usize },

    #[error("no model reached consensus after {iterations} iterations")]
    NoConsensus { iterations: usize },

    #[error("subset selection error: {0}")]
    Subset(#[from] SubsetError),
}
