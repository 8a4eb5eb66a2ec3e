/// Why the validator refused a homography
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    NonFinite,
    DeterminantOutOfRange { determinant: f64, min: f64, max: f64 },
    SingularNormalization { h22: f64 },
    ScaleOutOfRange { scale_x: f64, scale_y: f64, min: f64, max: f64 },
    TooFewInliers { found: usize, required: usize },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::NonFinite => {
                write!(f, "homography contains NaN or infinite entries")
            }
            RejectionReason::DeterminantOutOfRange { determinant, min, max } => {
                write!(
                    f,
                    "determinant {:.3e} outside [{}, {}]; matches are poor or the images are incompatible, try a different detector or more overlap (30-40%)",
                    determinant, min, max
                )
            }
            RejectionReason::SingularNormalization { h22 } => {
                write!(f, "homography is singular (H[2,2] = {:.3e})", h22)
            }
            RejectionReason::ScaleOutOfRange { scale_x, scale_y, min, max } => {
                write!(
                    f,
                    "implied scaling x={:.3}, y={:.3} outside [{}, {}]; images may not show the same scene or overlap too little",
                    scale_x, scale_y, min, max
                )
            }
            RejectionReason::TooFewInliers { found, required } => {
                write!(
                    f,
                    "only {} inliers, at least {} required for a stable homography; try a larger reprojection threshold or more features",
                    found, required
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    /// Fewer than four input pairs, or fewer than four inliers after the search
    InsufficientCorrespondences { required: usize, available: usize },
    /// Every minimal sample produced a non-finite or near-singular model
    DegenerateModel { iterations: usize },
    GeometryRejected(RejectionReason),
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HomographyError::InsufficientCorrespondences { required, available } => {
                write!(f, "Insufficient correspondences: need {}, have {}", required, available)
            }
            HomographyError::DegenerateModel { iterations } => {
                write!(f, "No non-degenerate homography found in {} iterations", iterations)
            }
            HomographyError::GeometryRejected(reason) => {
                write!(f, "Homography rejected: {}", reason)
            }
        }
    }
}

impl std::error::Error for HomographyError {}

impl From<RejectionReason> for HomographyError {
    fn from(reason: RejectionReason) -> Self {
        HomographyError::GeometryRejected(reason)
    }
}

pub type HomographyResult<T> = Result<T, HomographyError>;
