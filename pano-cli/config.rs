use pano_core::{BlendMode, BlendParams, CanvasParams, RansacParams, ValidationParams};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const MIN_THRESHOLD: f64 = 0.1;
pub const MAX_THRESHOLD: f64 = 50.0;

#[derive(Debug)]
pub enum ConfigError {
    Invalid { field: &'static str, reason: String },
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { field, reason } => write!(f, "Invalid {}: {}", field, reason),
            ConfigError::Io(e) => write!(f, "Config I/O error: {}", e),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

/// Which robust estimator produces the homography
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EstimatorKind {
    #[default]
    Ransac,
    Lmeds,
}

impl std::str::FromStr for EstimatorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ransac" => Ok(EstimatorKind::Ransac),
            "lmeds" => Ok(EstimatorKind::Lmeds),
            other => Err(invalid("estimator", format!("unknown estimator '{}' (expected ransac or lmeds)", other))),
        }
    }
}

/// Complete pairwise stitching configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StitchConfig {
    pub ransac: RansacParams,
    pub validation: ValidationParams,
    pub canvas: CanvasParams,
    pub blend: BlendParams,
    pub estimator: EstimatorKind,
    /// Retry with LMedS when RANSAC finds no usable model
    pub lmeds_fallback: bool,
    /// Smallest accepted width or height of an input image
    pub min_image_dimension: u32,
    /// Cap on the combined pixel count of both inputs
    pub max_input_pixels: u64,
    /// Combined pixel count above which a slow-processing warning is logged
    pub warn_input_pixels: u64,
    /// Worker threads for independent pairs
    pub n_threads: usize,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            ransac: RansacParams::default(),
            validation: ValidationParams::default(),
            canvas: CanvasParams::default(),
            blend: BlendParams::default(),
            estimator: EstimatorKind::Ransac,
            lmeds_fallback: false,
            min_image_dimension: 50,
            max_input_pixels: 100_000_000,
            warn_input_pixels: 50_000_000,
            n_threads: 1,
            name: None,
            description: None,
        }
    }
}

impl StitchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fast preset: fewer iterations and a hard-edged overlay
    pub fn fast_preset() -> Self {
        Self {
            ransac: RansacParams {
                threshold: 4.0,
                confidence: 0.99,
                max_iterations: 500,
                seed: None,
            },
            blend: BlendParams {
                mode: BlendMode::Overlay,
                ..BlendParams::default()
            },
            n_threads: num_cpus::get(),
            name: Some("Fast".to_string()),
            description: Some("Short RANSAC budget and overlay blending".to_string()),
            ..Self::default()
        }
    }

    /// Quality preset: tight threshold and multi-band blending
    pub fn quality_preset() -> Self {
        Self {
            ransac: RansacParams {
                threshold: 2.0,
                confidence: 0.999,
                max_iterations: 5000,
                seed: None,
            },
            blend: BlendParams {
                mode: BlendMode::MultiBand,
                pyramid_levels: 6,
                ..BlendParams::default()
            },
            n_threads: num_cpus::get(),
            name: Some("Quality".to_string()),
            description: Some("Strict inlier threshold and multi-band blending".to_string()),
            ..Self::default()
        }
    }

    /// Robust preset for low inlier ratios
    pub fn robust_preset() -> Self {
        Self {
            ransac: RansacParams {
                threshold: 5.0,
                confidence: 0.999,
                max_iterations: 10_000,
                seed: None,
            },
            lmeds_fallback: true,
            blend: BlendParams {
                mode: BlendMode::Feather,
                feather_radius: 50,
                ..BlendParams::default()
            },
            n_threads: num_cpus::get(),
            name: Some("Robust".to_string()),
            description: Some("Large sampling budget with LMedS fallback and wide feathering".to_string()),
            ..Self::default()
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "StitchConfig: estimator={:?}{}, threshold={:.1}px, confidence={}, max_iter={}, min_inliers={}, blend={}, feather={}px, levels={}, threads={}",
            self.estimator,
            if self.lmeds_fallback { "+lmeds" } else { "" },
            self.ransac.threshold,
            self.ransac.confidence,
            self.ransac.max_iterations,
            self.validation.min_inliers,
            self.blend.mode,
            self.blend.feather_radius,
            self.blend.pyramid_levels,
            self.n_threads
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.ransac;
        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&r.threshold) {
            return Err(invalid(
                "ransac.threshold",
                format!("{} not in [{}, {}]", r.threshold, MIN_THRESHOLD, MAX_THRESHOLD),
            ));
        }
        if !(r.confidence > 0.0 && r.confidence < 1.0) {
            return Err(invalid("ransac.confidence", format!("{} not in (0, 1)", r.confidence)));
        }
        if r.max_iterations == 0 {
            return Err(invalid("ransac.max_iterations", "must be at least 1"));
        }

        let v = &self.validation;
        if v.min_inliers < 4 {
            return Err(invalid("validation.min_inliers", format!("{} < 4", v.min_inliers)));
        }
        if !(v.det_min > 0.0 && v.det_min < v.det_max) {
            return Err(invalid(
                "validation.det_min/det_max",
                format!("need 0 < {} < {}", v.det_min, v.det_max),
            ));
        }
        if !(v.scale_min > 0.0 && v.scale_min < v.scale_max) {
            return Err(invalid(
                "validation.scale_min/scale_max",
                format!("need 0 < {} < {}", v.scale_min, v.scale_max),
            ));
        }

        if self.canvas.max_dimension == 0 {
            return Err(invalid("canvas.max_dimension", "must be at least 1"));
        }
        if self.canvas.max_memory_bytes == 0 {
            return Err(invalid("canvas.max_memory_bytes", "must be positive"));
        }
        if self.blend.pyramid_levels == 0 {
            return Err(invalid("blend.pyramid_levels", "must be at least 1"));
        }
        if self.blend.pyramid_memory_budget == 0 {
            return Err(invalid("blend.pyramid_memory_budget", "must be positive"));
        }
        if self.n_threads == 0 {
            return Err(invalid("n_threads", "must be at least 1"));
        }
        Ok(())
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Load by extension: `.toml` as TOML, anything else as JSON
    #[cfg(feature = "serde")]
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let is_toml = path
            .as_ref()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml { Self::load_toml(path) } else { Self::load_json(path) }
    }
}
