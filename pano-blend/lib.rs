//! Compositing of an aligned image pair: warp both onto one canvas, then
//! merge them with one of three seam strategies.

mod blend;
mod error;
mod feather;
mod multiband;
pub mod pyramid;
mod warp;

use image::RgbImage;
use log::debug;
use pano_core::{BlendMode, BlendParams, CanvasParams, Homography};

pub use blend::{BlendInputs, Blender, OverlayBlender};
pub use error::{CompositeError, CompositeResult};
pub use feather::FeatherBlender;
pub use multiband::{pyramid_bytes, MultiBandBlender, MIN_GUARDED_LEVELS};
pub use warp::{plan_canvas, warp_pair, CanvasLayout, WarpedPair, MASK_ON};

/// Strategy selected by `params.mode`
pub fn blender_for(params: &BlendParams) -> Box<dyn Blender + Send + Sync> {
    match params.mode {
        BlendMode::Overlay => Box::new(OverlayBlender),
        BlendMode::Feather => Box::new(FeatherBlender::new(params.feather_radius)),
        BlendMode::MultiBand => Box::new(MultiBandBlender::new(
            params.pyramid_levels,
            params.pyramid_memory_budget,
        )),
    }
}

/// Warp `b` into `a`'s frame through `h` (A → B) and blend the pair
pub fn composite(
    a: &RgbImage,
    b: &RgbImage,
    h: &Homography,
    canvas: &CanvasParams,
    blend: &BlendParams,
) -> CompositeResult<(RgbImage, CanvasLayout)> {
    let warped = warp_pair(a, b, h, canvas)?;
    let inputs = BlendInputs::new(&warped.image_a, &warped.image_b, &warped.mask_a, &warped.mask_b)?;
    let blender = blender_for(blend);
    debug!("blending {}x{} canvas with {}", warped.layout.width, warped.layout.height, blender.mode());
    Ok((blender.blend(&inputs)?, warped.layout))
}
