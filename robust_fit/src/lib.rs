pub mod error;
pub mod estimation;
pub mod polynomial;

pub mod prelude {
    pub use crate::{
        error::*,
        estimation::{
            ConsensusProblem, EstimationProblem, InliersData, Method, QualityRankedProblem,
            RobustEstimator, RunSnapshot,
            lmeds::Lmeds,
            msac::Msac,
            promeds::Promeds,
            prosac::Prosac,
            ransac::Ransac,
            subsets::SubsetSelector,
        },
        polynomial::Polynomial,
    };

    pub use nalgebra;
}
