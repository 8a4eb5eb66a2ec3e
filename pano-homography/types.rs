use std::time::Duration;

use pano_core::{Homography, InlierMask};

use crate::error::{HomographyError, HomographyResult};

/// Minimum number of correspondences that determine a homography
pub const MIN_SAMPLE_SIZE: usize = 4;

/// Outcome of one robust estimation call
#[derive(Debug, Clone)]
pub struct EstimationResult {
    /// Best model found, `None` when no sample yielded a usable one
    pub model: Option<Homography>,
    pub inlier_mask: InlierMask,
    pub inlier_count: usize,
    /// `inlier_count / correspondence_count`, 0 for empty input
    pub inlier_ratio: f64,
    /// Mean reprojection error over inliers with a finite projection
    pub mean_error: Option<f64>,
    pub iterations: usize,
    pub elapsed: Duration,
    pub correspondence_count: usize,
    pub estimator: &'static str,
}

impl EstimationResult {
    /// Result returned without sampling, e.g. for fewer than four pairs
    pub fn empty(correspondence_count: usize, estimator: &'static str) -> Self {
        Self {
            model: None,
            inlier_mask: vec![false; correspondence_count],
            inlier_count: 0,
            inlier_ratio: 0.0,
            mean_error: None,
            iterations: 0,
            elapsed: Duration::ZERO,
            correspondence_count,
            estimator,
        }
    }

    pub fn is_success(&self) -> bool {
        self.homography().is_ok()
    }

    /// The model, or the reason this estimation cannot be used
    pub fn homography(&self) -> HomographyResult<Homography> {
        if self.correspondence_count < MIN_SAMPLE_SIZE {
            return Err(HomographyError::InsufficientCorrespondences {
                required: MIN_SAMPLE_SIZE,
                available: self.correspondence_count,
            });
        }
        let model = self.model.ok_or(HomographyError::DegenerateModel {
            iterations: self.iterations,
        })?;
        if self.inlier_count < MIN_SAMPLE_SIZE {
            return Err(HomographyError::InsufficientCorrespondences {
                required: MIN_SAMPLE_SIZE,
                available: self.inlier_count,
            });
        }
        Ok(model)
    }

    /// Indices of the correspondences classified as inliers
    pub fn inlier_indices(&self) -> Vec<usize> {
        self.inlier_mask
            .iter()
            .enumerate()
            .filter_map(|(i, &inlier)| inlier.then_some(i))
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} inliers ({:.1}%), mean error {}, {} iterations, {:.2?}",
            self.estimator,
            self.inlier_count,
            self.correspondence_count,
            self.inlier_ratio * 100.0,
            self.mean_error
                .map(|e| format!("{:.3}px", e))
                .unwrap_or_else(|| "n/a".to_string()),
            self.iterations,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_too_few() {
        let result = EstimationResult::empty(3, "ransac");
        assert_eq!(result.inlier_mask.len(), 3);
        assert!(matches!(
            result.homography(),
            Err(HomographyError::InsufficientCorrespondences { required: 4, available: 3 })
        ));
    }

    #[test]
    fn test_missing_model_is_degenerate() {
        let mut result = EstimationResult::empty(10, "ransac");
        result.iterations = 50;
        assert_eq!(
            result.homography(),
            Err(HomographyError::DegenerateModel { iterations: 50 })
        );
    }

    #[test]
    fn test_too_few_inliers() {
        let mut result = EstimationResult::empty(10, "ransac");
        result.model = Some(Homography::identity());
        result.inlier_count = 3;
        assert!(matches!(
            result.homography(),
            Err(HomographyError::InsufficientCorrespondences { available: 3, .. })
        ));

        result.inlier_count = 4;
        assert_eq!(result.homography(), Ok(Homography::identity()));
        assert!(result.is_success());
    }

    #[test]
    fn test_inlier_indices() {
        let mut result = EstimationResult::empty(5, "ransac");
        result.inlier_mask = vec![true, false, true, false, true];
        assert_eq!(result.inlier_indices(), vec![0, 2, 4]);
        assert!(result.summary().contains("n/a"));
    }
}
