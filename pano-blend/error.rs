#[derive(Debug, Clone, PartialEq)]
pub enum CompositeError {
    /// H⁻¹ could not be formed at warp time
    NonInvertibleTransform,
    /// A corner of image B maps to infinity under H⁻¹
    UnboundedProjection,
    CanvasTooLarge { width: u64, height: u64, max: u32 },
    MemoryBudgetExceeded { required_bytes: u64, budget_bytes: u64 },
    SizeOrTypeMismatch { detail: String },
    EmptyImage { width: u32, height: u32 },
}

impl std::fmt::Display for CompositeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositeError::NonInvertibleTransform => {
                write!(f, "Homography is not invertible, cannot warp")
            }
            CompositeError::UnboundedProjection => {
                write!(f, "Image corner projects to infinity; the homography is too strongly perspective")
            }
            CompositeError::CanvasTooLarge { width, height, max } => {
                write!(
                    f,
                    "Output canvas {}x{} exceeds the {} px limit; the homography likely has extreme perspective",
                    width, height, max
                )
            }
            CompositeError::MemoryBudgetExceeded { required_bytes, budget_bytes } => {
                write!(
                    f,
                    "Output canvas needs {:.1} MiB, budget is {:.1} MiB",
                    *required_bytes as f64 / (1024.0 * 1024.0),
                    *budget_bytes as f64 / (1024.0 * 1024.0)
                )
            }
            CompositeError::SizeOrTypeMismatch { detail } => {
                write!(f, "Blend inputs do not match: {}", detail)
            }
            CompositeError::EmptyImage { width, height } => {
                write!(f, "Image {}x{} has no pixels", width, height)
            }
        }
    }
}

impl std::error::Error for CompositeError {}

pub type CompositeResult<T> = Result<T, CompositeError>;
