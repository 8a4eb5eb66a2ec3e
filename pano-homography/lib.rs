//! Robust homography estimation from point correspondences.
//!
//! [`RansacEstimator`] is the default search; [`LmedsEstimator`] is a
//! threshold-free alternative. Either result goes through
//! [`HomographyValidator`] before it is trusted for warping.

pub mod dlt;
mod error;
mod lmeds;
mod ransac;
mod types;
mod validator;

use pano_core::Correspondence;

pub use error::{HomographyError, HomographyResult, RejectionReason};
pub use lmeds::LmedsEstimator;
pub use ransac::{classify, mean_inlier_error, required_iterations, RansacEstimator};
pub use types::{EstimationResult, MIN_SAMPLE_SIZE};
pub use validator::HomographyValidator;

/// A robust estimator that maps correspondences to a best-fit homography
pub trait RobustEstimator {
    fn estimate(&self, pairs: &[Correspondence]) -> EstimationResult;

    fn name(&self) -> &'static str;
}
