use pano_blend::CompositeError;
use pano_homography::HomographyError;

use crate::config::ConfigError;

/// Input images the pipeline refuses before any estimation work
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    EmptyImage { which: &'static str },
    TooSmall { which: &'static str, width: u32, height: u32, min: u32 },
    TooManyPixels { total: u64, max: u64 },
    NoImages,
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::EmptyImage { which } => write!(f, "Image {} is empty", which),
            InputError::TooSmall { which, width, height, min } => {
                write!(f, "Image {} is {}x{}, minimum is {}x{}", which, width, height, min, min)
            }
            InputError::TooManyPixels { total, max } => write!(
                f,
                "Combined input is {:.1} MP, maximum is {:.1} MP",
                *total as f64 / 1e6,
                *max as f64 / 1e6
            ),
            InputError::NoImages => write!(f, "No images provided for stitching"),
        }
    }
}

impl std::error::Error for InputError {}

#[derive(Debug)]
pub enum StitchError {
    Input(InputError),
    Homography(HomographyError),
    Composite(CompositeError),
    Config(ConfigError),
    ThreadPool(rayon::ThreadPoolBuildError),
    /// A step of a multi-image sequence failed; `index` is the image being added
    Sequence { index: usize, source: Box<StitchError> },
}

impl std::fmt::Display for StitchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StitchError::Input(e) => write!(f, "Input error: {}", e),
            StitchError::Homography(e) => write!(f, "Homography error: {}", e),
            StitchError::Composite(e) => write!(f, "Composite error: {}", e),
            StitchError::Config(e) => write!(f, "Configuration error: {}", e),
            StitchError::ThreadPool(e) => write!(f, "Thread pool error: {}", e),
            StitchError::Sequence { index, source } => {
                write!(f, "Failed to stitch image {}: {}", index, source)
            }
        }
    }
}

impl std::error::Error for StitchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StitchError::Input(e) => Some(e),
            StitchError::Homography(e) => Some(e),
            StitchError::Composite(e) => Some(e),
            StitchError::Config(e) => Some(e),
            StitchError::ThreadPool(e) => Some(e),
            StitchError::Sequence { source, .. } => Some(source.as_ref()),
        }
    }
}

impl From<InputError> for StitchError {
    fn from(err: InputError) -> Self {
        StitchError::Input(err)
    }
}

impl From<HomographyError> for StitchError {
    fn from(err: HomographyError) -> Self {
        StitchError::Homography(err)
    }
}

impl From<CompositeError> for StitchError {
    fn from(err: CompositeError) -> Self {
        StitchError::Composite(err)
    }
}

impl From<ConfigError> for StitchError {
    fn from(err: ConfigError) -> Self {
        StitchError::Config(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for StitchError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        StitchError::ThreadPool(err)
    }
}

pub type StitchResult<T> = Result<T, StitchError>;
