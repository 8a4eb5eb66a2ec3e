use pano_core::BlendMode;

use crate::config::{EstimatorKind, StitchConfig};
use crate::error::StitchResult;
use crate::Stitcher;

/// Fluent builder for a validated [`Stitcher`]
#[derive(Debug, Clone, Default)]
pub struct StitcherBuilder {
    config: StitchConfig,
}

impl StitcherBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from an existing `StitchConfig`
    pub fn from_config(config: StitchConfig) -> Self {
        Self { config }
    }

    /// Set the RANSAC reprojection threshold in pixels
    pub fn threshold(mut self, pixels: f64) -> Self {
        self.config.ransac.threshold = pixels;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.config.ransac.confidence = confidence;
        self
    }

    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.ransac.max_iterations = iterations;
        self
    }

    /// Fix the sampling seed for reproducible runs
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.ransac.seed = Some(seed);
        self
    }

    pub fn estimator(mut self, kind: EstimatorKind) -> Self {
        self.config.estimator = kind;
        self
    }

    /// Retry with LMedS when RANSAC finds no usable model
    pub fn lmeds_fallback(mut self, enable: bool) -> Self {
        self.config.lmeds_fallback = enable;
        self
    }

    pub fn min_inliers(mut self, count: usize) -> Self {
        self.config.validation.min_inliers = count;
        self
    }

    /// Accepted range of |det(H)|
    pub fn determinant_range(mut self, min: f64, max: f64) -> Self {
        self.config.validation.det_min = min;
        self.config.validation.det_max = max;
        self
    }

    /// Accepted range of the per-axis scale implied by H
    pub fn scale_range(mut self, min: f64, max: f64) -> Self {
        self.config.validation.scale_min = min;
        self.config.validation.scale_max = max;
        self
    }

    pub fn padding(mut self, pixels: u32) -> Self {
        self.config.canvas.padding = pixels;
        self
    }

    pub fn max_canvas_dimension(mut self, pixels: u32) -> Self {
        self.config.canvas.max_dimension = pixels;
        self
    }

    pub fn max_canvas_memory(mut self, bytes: u64) -> Self {
        self.config.canvas.max_memory_bytes = bytes;
        self
    }

    pub fn blend_mode(mut self, mode: BlendMode) -> Self {
        self.config.blend.mode = mode;
        self
    }

    pub fn feather_radius(mut self, pixels: u32) -> Self {
        self.config.blend.feather_radius = pixels;
        self
    }

    pub fn pyramid_levels(mut self, levels: usize) -> Self {
        self.config.blend.pyramid_levels = levels;
        self
    }

    pub fn pyramid_memory_budget(mut self, bytes: u64) -> Self {
        self.config.blend.pyramid_memory_budget = bytes;
        self
    }

    pub fn min_image_dimension(mut self, pixels: u32) -> Self {
        self.config.min_image_dimension = pixels;
        self
    }

    pub fn max_input_pixels(mut self, pixels: u64) -> Self {
        self.config.max_input_pixels = pixels;
        self
    }

    /// Set the number of threads used for independent pairs
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    /// Apply the fast preset
    pub fn preset_fast(mut self) -> Self {
        self.config = StitchConfig::fast_preset();
        self
    }

    /// Apply the quality preset
    pub fn preset_quality(mut self) -> Self {
        self.config = StitchConfig::quality_preset();
        self
    }

    /// Apply the robust preset
    pub fn preset_robust(mut self) -> Self {
        self.config = StitchConfig::robust_preset();
        self
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.config.summary()
    }

    /// Convert the builder into a `StitchConfig`
    pub fn to_config(self) -> StitchConfig {
        self.config
    }

    /// Validate and build the `Stitcher`
    pub fn build(self) -> StitchResult<Stitcher> {
        Stitcher::new(self.config)
    }
}
