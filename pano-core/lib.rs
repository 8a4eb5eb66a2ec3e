use nalgebra::{Matrix3, Point2, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Denominators below this magnitude are treated as a failed projection
pub const PROJECTION_EPSILON: f64 = 1e-10;

/// Tentative point match: `src` in image A's frame, `dst` in image B's frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Correspondence {
    pub src: Point2<f64>,
    pub dst: Point2<f64>,
    /// Matcher score, carried along but never read by the estimator
    #[cfg_attr(feature = "serde", serde(default))]
    pub distance: f32,
}

impl Correspondence {
    pub fn new(src: Point2<f64>, dst: Point2<f64>) -> Self {
        Self { src, dst, distance: 0.0 }
    }

    pub fn from_coords(sx: f64, sy: f64, dx: f64, dy: f64) -> Self {
        Self::new(Point2::new(sx, sy), Point2::new(dx, dy))
    }

    pub fn with_distance(mut self, distance: f32) -> Self {
        self.distance = distance;
        self
    }
}

/// One flag per correspondence, true when consistent with the current model
pub type InlierMask = Vec<bool>;

/// Projective transform q ≈ H·p mapping image-A pixels into image B's frame
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        Self(m)
    }

    /// Build from row-major entries
    pub fn from_row_slice(rows: &[f64; 9]) -> Self {
        Self(Matrix3::from_row_slice(rows))
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self(Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn into_inner(self) -> Matrix3<f64> {
        self.0
    }

    pub fn determinant(&self) -> f64 {
        self.0.determinant()
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Rescale so that H[2][2] = 1. Left untouched when H[2][2] is ~0.
    pub fn normalized(&self) -> Self {
        let h22 = self.0[(2, 2)];
        if h22.abs() < PROJECTION_EPSILON {
            *self
        } else {
            Self(self.0 / h22)
        }
    }

    pub fn try_inverse(&self) -> Option<Self> {
        self.0
            .try_inverse()
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .map(|inv| Self(inv).normalized())
    }

    /// `self` applied after `first`
    pub fn compose(&self, first: &Homography) -> Self {
        Self(self.0 * first.0)
    }

    /// Map a point through H with perspective division.
    ///
    /// Returns `None` when the homogeneous denominator vanishes or the
    /// result is not finite.
    pub fn project(&self, p: &Point2<f64>) -> Option<Point2<f64>> {
        let v = self.0 * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < PROJECTION_EPSILON {
            return None;
        }
        let q = Point2::new(v.x / v.z, v.y / v.z);
        (q.x.is_finite() && q.y.is_finite()).then_some(q)
    }

    /// Euclidean distance between H·src and dst, `None` on a failed projection
    pub fn reprojection_error(&self, c: &Correspondence) -> Option<f64> {
        self.project(&c.src).map(|q| (q - c.dst).norm())
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Matrix3<f64>> for Homography {
    fn from(m: Matrix3<f64>) -> Self {
        Self(m)
    }
}

/// Blend strategy used by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BlendMode {
    /// Image B pasted over image A wherever B has coverage
    #[cfg_attr(feature = "serde", serde(alias = "simple"))]
    Overlay,
    /// Distance-weighted alpha blend
    #[default]
    Feather,
    /// Laplacian pyramid blend
    MultiBand,
}

impl BlendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Overlay => "simple",
            BlendMode::Feather => "feather",
            BlendMode::MultiBand => "multiband",
        }
    }
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBlendModeError(pub String);

impl std::fmt::Display for ParseBlendModeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown blend mode '{}' (expected simple, feather or multiband)", self.0)
    }
}

impl std::error::Error for ParseBlendModeError {}

impl std::str::FromStr for BlendMode {
    type Err = ParseBlendModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "overlay" => Ok(BlendMode::Overlay),
            "feather" | "feathering" => Ok(BlendMode::Feather),
            "multiband" | "multi-band" => Ok(BlendMode::MultiBand),
            _ => Err(ParseBlendModeError(s.to_string())),
        }
    }
}

/// Robust estimator parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacParams {
    /// Reprojection error threshold in pixels
    pub threshold: f64,
    /// Target probability of having drawn one all-inlier sample
    pub confidence: f64,
    pub max_iterations: usize,
    /// Fixed seed for reproducible sampling; fresh entropy per call when unset
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub seed: Option<u64>,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            confidence: 0.995,
            max_iterations: 2000,
            seed: None,
        }
    }
}

/// Plausibility bounds applied to an estimated homography
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ValidationParams {
    pub min_inliers: usize,
    pub det_min: f64,
    pub det_max: f64,
    pub scale_min: f64,
    pub scale_max: f64,
    pub epsilon: f64,
}

impl Default for ValidationParams {
    fn default() -> Self {
        Self {
            min_inliers: 20,
            det_min: 0.001,
            det_max: 1000.0,
            scale_min: 0.1,
            scale_max: 10.0,
            epsilon: PROJECTION_EPSILON,
        }
    }
}

/// Output canvas limits, all checked before allocation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CanvasParams {
    /// Border added on every side of the union bounding box
    pub padding: u32,
    pub max_dimension: u32,
    pub max_memory_bytes: u64,
}

impl Default for CanvasParams {
    fn default() -> Self {
        Self {
            padding: 10,
            max_dimension: 15_000,
            max_memory_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BlendParams {
    pub mode: BlendMode,
    /// Feather width in pixels; 0 falls back to binary mask weights
    pub feather_radius: u32,
    pub pyramid_levels: usize,
    pub pyramid_memory_budget: u64,
}

impl Default for BlendParams {
    fn default() -> Self {
        Self {
            mode: BlendMode::Feather,
            feather_radius: 30,
            pyramid_levels: 5,
            pyramid_memory_budget: 1024 * 1024 * 1024,
        }
    }
}
