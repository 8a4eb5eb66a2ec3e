use image::{Luma, Rgb, RgbImage};
use log::{debug, warn};
use pano_core::BlendMode;

use crate::blend::{to_plane, to_rgb8, BlendInputs, Blender};
use crate::error::{CompositeError, CompositeResult};
use crate::pyramid::{self, Plane};

/// Depth the memory guard will not reduce below
pub const MIN_GUARDED_LEVELS: usize = 3;

const MASK_SUM_EPSILON: f32 = 1e-6;

/// Peak pyramid memory: f32 RGB for two images at every level
pub fn pyramid_bytes(pixels: u64, levels: usize) -> u64 {
    pixels * 3 * 4 * 2 * levels as u64
}

/// Laplacian-pyramid blend: low frequencies mix over wide regions, high
/// frequencies over narrow ones.
#[derive(Debug, Clone, Copy)]
pub struct MultiBandBlender {
    pub levels: usize,
    pub memory_budget: u64,
}

impl MultiBandBlender {
    pub fn new(levels: usize, memory_budget: u64) -> Self {
        Self { levels, memory_budget }
    }

    /// Requested depth, reduced until the estimate fits the budget or the
    /// floor is reached. A request already below the floor is kept.
    pub fn effective_levels(&self, width: u32, height: u32) -> usize {
        let pixels = width as u64 * height as u64;
        let mut levels = self.levels.max(1);
        while levels > MIN_GUARDED_LEVELS && pyramid_bytes(pixels, levels) > self.memory_budget {
            levels -= 1;
        }
        if levels != self.levels.max(1) {
            warn!(
                "multi-band: reduced pyramid depth {} -> {} to stay within {:.0} MiB",
                self.levels,
                levels,
                self.memory_budget as f64 / (1024.0 * 1024.0)
            );
        }
        levels
    }
}

impl Default for MultiBandBlender {
    fn default() -> Self {
        Self::new(5, 1024 * 1024 * 1024)
    }
}

fn mask_plane(mask: &image::GrayImage) -> Plane<Luma<f32>> {
    Plane::from_fn(mask.width(), mask.height(), |x, y| Luma([mask.get_pixel(x, y)[0] as f32 / 255.0]))
}

/// Weighted sum of two pyramid levels; zero-sum pixels split evenly
fn blend_level(
    la: &Plane<Rgb<f32>>,
    lb: &Plane<Rgb<f32>>,
    ma: &Plane<Luma<f32>>,
    mb: &Plane<Luma<f32>>,
) -> Plane<Rgb<f32>> {
    let mut out = la.clone();
    for (((dst, pb), wa), wb) in out.pixels_mut().zip(lb.pixels()).zip(ma.pixels()).zip(mb.pixels()) {
        let sum = wa[0] + wb[0];
        let (wa, wb) = if sum < MASK_SUM_EPSILON {
            (0.5, 0.5)
        } else {
            (wa[0] / sum, wb[0] / sum)
        };
        for c in 0..3 {
            dst[c] = wa * dst[c] + wb * pb[c];
        }
    }
    out
}

impl Blender for MultiBandBlender {
    fn blend(&self, inputs: &BlendInputs<'_>) -> CompositeResult<RgbImage> {
        let (width, height) = inputs.dimensions();
        let levels = self.effective_levels(width, height);
        debug!("multi-band: {} levels on {}x{}", levels, width, height);

        let lap_a = pyramid::laplacian(&to_plane(inputs.image_a), levels);
        let lap_b = pyramid::laplacian(&to_plane(inputs.image_b), levels);
        let gauss_a = pyramid::gaussian(&mask_plane(inputs.mask_a), levels);
        let gauss_b = pyramid::gaussian(&mask_plane(inputs.mask_b), levels);

        let blended: Vec<_> = lap_a
            .iter()
            .zip(&lap_b)
            .zip(gauss_a.iter().zip(&gauss_b))
            .map(|((la, lb), (ma, mb))| blend_level(la, lb, ma, mb))
            .collect();

        let out = pyramid::reconstruct(blended).ok_or(CompositeError::EmptyImage { width, height })?;
        Ok(to_rgb8(&out))
    }

    fn mode(&self) -> BlendMode {
        BlendMode::MultiBand
    }
}
