use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::euclidean_squared_distance_transform;
use pano_core::BlendMode;

use crate::blend::{BlendInputs, Blender};
use crate::error::CompositeResult;

/// Weight sums below this are treated as no coverage
const WEIGHT_EPSILON: f32 = 1e-6;

/// Distance-weighted blend that ramps each image in from its mask edge
#[derive(Debug, Clone, Copy)]
pub struct FeatherBlender {
    pub radius: u32,
}

impl FeatherBlender {
    pub fn new(radius: u32) -> Self {
        Self { radius }
    }

    /// Per-pixel weight in [0, 1]: distance to the nearest uncovered pixel,
    /// clamped to the radius. Radius 0 gives the binary mask.
    pub fn weights(&self, mask: &GrayImage) -> Vec<f32> {
        if self.radius == 0 {
            return mask.pixels().map(|m| m[0] as f32 / 255.0).collect();
        }

        // Uncovered pixels become the foreground the transform measures to
        let uncovered = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
            Luma([if mask.get_pixel(x, y)[0] == 0 { 255 } else { 0 }])
        });
        let dist_sq = euclidean_squared_distance_transform(&uncovered);
        let radius = self.radius as f64;

        dist_sq
            .pixels()
            .zip(mask.pixels())
            .map(|(d, m)| {
                if m[0] == 0 {
                    0.0
                } else {
                    (d[0].sqrt().min(radius) / radius) as f32
                }
            })
            .collect()
    }
}

impl Default for FeatherBlender {
    fn default() -> Self {
        Self::new(30)
    }
}

impl Blender for FeatherBlender {
    fn blend(&self, inputs: &BlendInputs<'_>) -> CompositeResult<RgbImage> {
        let (width, height) = inputs.dimensions();
        let wa = self.weights(inputs.mask_a);
        let wb = self.weights(inputs.mask_b);

        let mut out = RgbImage::new(width, height);
        for (i, ((dst, pa), pb)) in out
            .pixels_mut()
            .zip(inputs.image_a.pixels())
            .zip(inputs.image_b.pixels())
            .enumerate()
        {
            let (a, b) = (wa[i], wb[i]);
            let sum = a + b;
            let denom = if sum < WEIGHT_EPSILON { 1.0 } else { sum };
            let mut px = [0u8; 3];
            for (c, slot) in px.iter_mut().enumerate() {
                let v = (a * pa[c] as f32 + b * pb[c] as f32) / denom;
                *slot = v.round().clamp(0.0, 255.0) as u8;
            }
            *dst = Rgb(px);
        }
        Ok(out)
    }

    fn mode(&self) -> BlendMode {
        BlendMode::Feather
    }
}
