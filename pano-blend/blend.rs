use image::{GrayImage, Rgb, RgbImage};
use pano_core::BlendMode;

use crate::error::{CompositeError, CompositeResult};
use crate::pyramid::Plane;

/// Two warped images and their coverage masks, all on the same canvas
#[derive(Debug, Clone, Copy)]
pub struct BlendInputs<'a> {
    pub image_a: &'a RgbImage,
    pub image_b: &'a RgbImage,
    pub mask_a: &'a GrayImage,
    pub mask_b: &'a GrayImage,
}

impl<'a> BlendInputs<'a> {
    /// Checks that all four buffers share one non-empty size
    pub fn new(
        image_a: &'a RgbImage,
        image_b: &'a RgbImage,
        mask_a: &'a GrayImage,
        mask_b: &'a GrayImage,
    ) -> CompositeResult<Self> {
        let (width, height) = image_a.dimensions();
        if width == 0 || height == 0 {
            return Err(CompositeError::EmptyImage { width, height });
        }

        let others = [
            ("image B", image_b.dimensions()),
            ("mask A", mask_a.dimensions()),
            ("mask B", mask_b.dimensions()),
        ];
        for (name, dims) in others {
            if dims != (width, height) {
                return Err(CompositeError::SizeOrTypeMismatch {
                    detail: format!("{} is {}x{}, image A is {}x{}", name, dims.0, dims.1, width, height),
                });
            }
        }

        Ok(Self { image_a, image_b, mask_a, mask_b })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image_a.dimensions()
    }
}

/// One seam-blending strategy
pub trait Blender {
    fn blend(&self, inputs: &BlendInputs<'_>) -> CompositeResult<RgbImage>;

    fn mode(&self) -> BlendMode;
}

/// B's pixels replace A's wherever B's mask is set
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayBlender;

impl Blender for OverlayBlender {
    fn blend(&self, inputs: &BlendInputs<'_>) -> CompositeResult<RgbImage> {
        let mut out = inputs.image_a.clone();
        for ((dst, src), m) in out
            .pixels_mut()
            .zip(inputs.image_b.pixels())
            .zip(inputs.mask_b.pixels())
        {
            if m[0] != 0 {
                *dst = *src;
            }
        }
        Ok(out)
    }

    fn mode(&self) -> BlendMode {
        BlendMode::Overlay
    }
}

pub(crate) fn to_plane(img: &RgbImage) -> Plane<Rgb<f32>> {
    Plane::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        Rgb([p[0] as f32, p[1] as f32, p[2] as f32])
    })
}

pub(crate) fn to_rgb8(plane: &Plane<Rgb<f32>>) -> RgbImage {
    RgbImage::from_fn(plane.width(), plane.height(), |x, y| {
        let p = plane.get_pixel(x, y);
        Rgb(p.0.map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}
