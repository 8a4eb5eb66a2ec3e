use log::{debug, warn};
use pano_core::{Homography, ValidationParams};

use crate::error::{HomographyResult, RejectionReason};
use crate::types::EstimationResult;

/// Geometric sanity checks applied before a homography is used for warping
#[derive(Debug, Clone, Default)]
pub struct HomographyValidator {
    params: ValidationParams,
}

impl HomographyValidator {
    pub fn new(params: ValidationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ValidationParams {
        &self.params
    }

    /// Checks run in order: finiteness, determinant range, normalization,
    /// axis scales, inlier support. The first failure is reported.
    pub fn check(&self, h: &Homography, inlier_count: usize) -> Result<(), RejectionReason> {
        let p = &self.params;

        if !h.is_finite() {
            return Err(RejectionReason::NonFinite);
        }

        let det = h.determinant().abs();
        if det < p.det_min || det > p.det_max {
            return Err(RejectionReason::DeterminantOutOfRange {
                determinant: det,
                min: p.det_min,
                max: p.det_max,
            });
        }

        let h22 = h.matrix()[(2, 2)];
        if h22.abs() < p.epsilon {
            return Err(RejectionReason::SingularNormalization { h22 });
        }

        let m = h.normalized().into_inner();
        let scale_x = m[(0, 0)].hypot(m[(1, 0)]);
        let scale_y = m[(0, 1)].hypot(m[(1, 1)]);
        let in_range = |s: f64| s >= p.scale_min && s <= p.scale_max;
        if !in_range(scale_x) || !in_range(scale_y) {
            return Err(RejectionReason::ScaleOutOfRange {
                scale_x,
                scale_y,
                min: p.scale_min,
                max: p.scale_max,
            });
        }

        if inlier_count < p.min_inliers {
            return Err(RejectionReason::TooFewInliers {
                found: inlier_count,
                required: p.min_inliers,
            });
        }

        Ok(())
    }

    /// Unwrap an estimation into a usable homography or the reason it is not
    pub fn validate(&self, result: &EstimationResult) -> HomographyResult<Homography> {
        let h = result.homography()?;
        match self.check(&h, result.inlier_count) {
            Ok(()) => {
                debug!("homography accepted, det {:.4}", h.determinant());
                Ok(h)
            }
            Err(reason) => {
                warn!("{}", reason);
                Err(reason.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HomographyError;
    use nalgebra::Matrix3;

    fn validator() -> HomographyValidator {
        HomographyValidator::default()
    }

    fn diag(a: f64, b: f64, c: f64) -> Homography {
        Homography::from_matrix(Matrix3::from_diagonal(&nalgebra::Vector3::new(a, b, c)))
    }

    #[test]
    fn test_identity_accepted() {
        assert_eq!(validator().check(&Homography::identity(), 25), Ok(()));
    }

    #[test]
    fn test_large_determinant_rejected() {
        let err = validator().check(&diag(100.0, 100.0, 1.0), 100).unwrap_err();
        assert!(matches!(err, RejectionReason::DeterminantOutOfRange { determinant, .. } if determinant == 10000.0));
    }

    #[test]
    fn test_tiny_determinant_rejected() {
        let err = validator().check(&diag(1e-3, 1e-3, 1.0), 100).unwrap_err();
        assert!(matches!(err, RejectionReason::DeterminantOutOfRange { .. }));
    }

    #[test]
    fn test_non_finite_rejected_first() {
        let h = Homography::from_row_slice(&[f64::NAN, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(validator().check(&h, 0), Err(RejectionReason::NonFinite));
    }

    #[test]
    fn test_small_h22_rejected() {
        let h = Homography::from_row_slice(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1e-12]);
        // det is 1e-12 here, so the determinant check fires first
        assert!(matches!(
            validator().check(&h, 50),
            Err(RejectionReason::DeterminantOutOfRange { .. })
        ));

        // |det| is about 1, but H[2,2] cannot be normalized
        let h = Homography::from_row_slice(&[1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1e-12]);
        assert!(matches!(
            validator().check(&h, 50),
            Err(RejectionReason::SingularNormalization { .. })
        ));
    }

    #[test]
    fn test_anisotropic_scale_rejected() {
        // det = 20 * 0.06 = 1.2, within range, but y scale is tiny
        let err = validator().check(&diag(20.0, 0.06, 1.0), 100).unwrap_err();
        assert!(matches!(err, RejectionReason::ScaleOutOfRange { .. }));
    }

    #[test]
    fn test_too_few_inliers() {
        assert_eq!(
            validator().check(&Homography::translation(40.0, -3.0), 19),
            Err(RejectionReason::TooFewInliers { found: 19, required: 20 })
        );
    }

    #[test]
    fn test_validate_propagates_estimation_failure() {
        let result = EstimationResult::empty(2, "ransac");
        assert!(matches!(
            validator().validate(&result),
            Err(HomographyError::InsufficientCorrespondences { .. })
        ));

        let mut result = EstimationResult::empty(30, "ransac");
        result.model = Some(diag(100.0, 100.0, 1.0));
        result.inlier_count = 30;
        assert!(matches!(
            validator().validate(&result),
            Err(HomographyError::GeometryRejected(RejectionReason::DeterminantOutOfRange { .. }))
        ));

        result.model = Some(Homography::identity());
        assert_eq!(validator().validate(&result), Ok(Homography::identity()));
    }
}
