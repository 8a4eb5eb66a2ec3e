//! Placement of two images on a shared canvas in image A's frame.

use image::{GrayImage, Luma, Rgb, RgbImage};
use log::debug;
use nalgebra::Point2;
use pano_core::{CanvasParams, Homography};

use crate::error::{CompositeError, CompositeResult};

/// Bounds this close to a whole pixel are treated as exact
const SNAP_TOLERANCE: f64 = 1e-6;

/// Bytes per canvas pixel across both warped RGB images and both masks
const BYTES_PER_CANVAS_PIXEL: u64 = 3 + 3 + 1 + 1;

pub const MASK_ON: u8 = 255;

/// Output canvas size and where image A's origin lands on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasLayout {
    pub width: u32,
    pub height: u32,
    pub offset_x: i64,
    pub offset_y: i64,
}

impl CanvasLayout {
    /// Canvas pixel → image A coordinates
    #[inline]
    pub fn to_frame_a(&self, u: u32, v: u32) -> Point2<f64> {
        Point2::new((u as i64 - self.offset_x) as f64, (v as i64 - self.offset_y) as f64)
    }

    pub fn estimated_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * BYTES_PER_CANVAS_PIXEL
    }
}

/// Both images resampled onto one canvas, with coverage masks
#[derive(Debug, Clone)]
pub struct WarpedPair {
    pub image_a: RgbImage,
    pub image_b: RgbImage,
    pub mask_a: GrayImage,
    pub mask_b: GrayImage,
    pub layout: CanvasLayout,
}

fn corners(width: u32, height: u32) -> [Point2<f64>; 4] {
    let (w, h) = (width as f64, height as f64);
    [Point2::new(0.0, 0.0), Point2::new(w, 0.0), Point2::new(w, h), Point2::new(0.0, h)]
}

/// Remove floating-point noise so a refined fit does not grow the canvas by a pixel
fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < SNAP_TOLERANCE { r } else { v }
}

fn ensure_non_empty((width, height): (u32, u32)) -> CompositeResult<()> {
    if width == 0 || height == 0 {
        return Err(CompositeError::EmptyImage { width, height });
    }
    Ok(())
}

/// Size the canvas for A plus B mapped through H⁻¹.
///
/// `h` maps image A coordinates into image B. Every limit is checked here,
/// before anything is allocated.
pub fn plan_canvas(
    size_a: (u32, u32),
    size_b: (u32, u32),
    h: &Homography,
    params: &CanvasParams,
) -> CompositeResult<CanvasLayout> {
    ensure_non_empty(size_a)?;
    ensure_non_empty(size_b)?;
    let h_inv = h.try_inverse().ok_or(CompositeError::NonInvertibleTransform)?;

    let mut points = corners(size_a.0, size_a.1).to_vec();
    for corner in corners(size_b.0, size_b.1) {
        points.push(h_inv.project(&corner).ok_or(CompositeError::UnboundedProjection)?);
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in &points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let (min_x, min_y) = (snap(min_x).floor(), snap(min_y).floor());
    let (max_x, max_y) = (snap(max_x).ceil(), snap(max_y).ceil());
    let pad = params.padding as f64;
    let width = max_x - min_x + 2.0 * pad;
    let height = max_y - min_y + 2.0 * pad;

    let max = params.max_dimension as f64;
    if width > max || height > max {
        return Err(CompositeError::CanvasTooLarge {
            width: width.min(u64::MAX as f64) as u64,
            height: height.min(u64::MAX as f64) as u64,
            max: params.max_dimension,
        });
    }

    let layout = CanvasLayout {
        width: width as u32,
        height: height as u32,
        offset_x: (pad - min_x) as i64,
        offset_y: (pad - min_y) as i64,
    };

    let required_bytes = layout.estimated_bytes();
    if required_bytes > params.max_memory_bytes {
        return Err(CompositeError::MemoryBudgetExceeded {
            required_bytes,
            budget_bytes: params.max_memory_bytes,
        });
    }

    debug!(
        "canvas {}x{}, image A at ({}, {}), ~{:.1} MiB",
        layout.width,
        layout.height,
        layout.offset_x,
        layout.offset_y,
        required_bytes as f64 / (1024.0 * 1024.0)
    );
    Ok(layout)
}

/// Bilinear sample with coordinates clamped to the image
fn sample_bilinear(img: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let (w, h) = img.dimensions();
    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Nearest source pixel, if it lies inside a `width`×`height` image
#[inline]
fn nearest_inside(p: &Point2<f64>, width: u32, height: u32) -> bool {
    let (x, y) = (p.x.round(), p.y.round());
    x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64
}

/// Warp A by translation and B by translation∘H⁻¹ onto a common canvas.
///
/// Coverage is decided by the nearest source pixel; colour is bilinear.
pub fn warp_pair(
    a: &RgbImage,
    b: &RgbImage,
    h: &Homography,
    params: &CanvasParams,
) -> CompositeResult<WarpedPair> {
    let layout = plan_canvas(a.dimensions(), b.dimensions(), h, params)?;
    let (cw, ch) = (layout.width, layout.height);

    let mut image_a = RgbImage::new(cw, ch);
    let mut mask_a = GrayImage::new(cw, ch);
    let (aw, ah) = a.dimensions();
    for y in 0..ah {
        for x in 0..aw {
            let u = (x as i64 + layout.offset_x) as u32;
            let v = (y as i64 + layout.offset_y) as u32;
            image_a.put_pixel(u, v, *a.get_pixel(x, y));
            mask_a.put_pixel(u, v, Luma([MASK_ON]));
        }
    }

    let mut image_b = RgbImage::new(cw, ch);
    let mut mask_b = GrayImage::new(cw, ch);
    let (bw, bh) = b.dimensions();
    for v in 0..ch {
        for u in 0..cw {
            let Some(q) = h.project(&layout.to_frame_a(u, v)) else {
                continue;
            };
            if nearest_inside(&q, bw, bh) {
                image_b.put_pixel(u, v, sample_bilinear(b, q.x, q.y));
                mask_b.put_pixel(u, v, Luma([MASK_ON]));
            }
        }
    }

    Ok(WarpedPair { image_a, image_b, mask_a, mask_b, layout })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8]))
    }

    #[test]
    fn test_identity_canvas_is_image_plus_padding() {
        let a = gradient(64, 48);
        let warped = warp_pair(&a, &a, &Homography::identity(), &CanvasParams::default()).unwrap();

        assert_eq!(warped.layout.width, 64 + 20);
        assert_eq!(warped.layout.height, 48 + 20);
        assert_eq!((warped.layout.offset_x, warped.layout.offset_y), (10, 10));

        let cropped = image::imageops::crop_imm(&warped.image_a, 10, 10, 64, 48).to_image();
        assert_eq!(cropped, a);
        assert_eq!(warped.mask_a.get_pixel(9, 9)[0], 0);
        assert_eq!(warped.mask_a.get_pixel(10, 10)[0], MASK_ON);
    }

    #[test]
    fn test_identity_b_matches_a() {
        let a = gradient(32, 20);
        let warped = warp_pair(&a, &a, &Homography::identity(), &CanvasParams::default()).unwrap();
        assert_eq!(warped.image_a, warped.image_b);
        assert_eq!(warped.mask_a, warped.mask_b);
    }

    #[test]
    fn test_translation_extends_canvas() {
        // B's origin sits at x = 40 in A's frame
        let h = Homography::translation(-40.0, 0.0);
        let a = gradient(100, 50);
        let b = gradient(100, 50);
        let params = CanvasParams { padding: 0, ..CanvasParams::default() };
        let warped = warp_pair(&a, &b, &h, &params).unwrap();

        assert_eq!(warped.layout.width, 140);
        assert_eq!(warped.layout.height, 50);
        assert_eq!(warped.mask_b.get_pixel(39, 10)[0], 0);
        assert_eq!(warped.mask_b.get_pixel(40, 10)[0], MASK_ON);
        assert_eq!(warped.image_b.get_pixel(45, 10), b.get_pixel(5, 10));
        assert_eq!(warped.mask_a.get_pixel(100, 10)[0], 0);
    }

    #[test]
    fn test_negative_offset_places_a_inside() {
        let h = Homography::translation(30.0, 12.0);
        let a = gradient(40, 40);
        let params = CanvasParams { padding: 2, ..CanvasParams::default() };
        let layout = plan_canvas(a.dimensions(), a.dimensions(), &h, &params).unwrap();

        assert_eq!((layout.offset_x, layout.offset_y), (32, 14));
        assert_eq!((layout.width, layout.height), (74, 56));
    }

    #[test]
    fn test_canvas_too_large() {
        let h = Homography::from_row_slice(&[0.005, 0.0, 0.0, 0.0, 0.005, 0.0, 0.0, 0.0, 1.0]);
        let err = plan_canvas((100, 100), (100, 100), &h, &CanvasParams::default()).unwrap_err();
        assert!(matches!(err, CompositeError::CanvasTooLarge { max: 15000, .. }));
    }

    #[test]
    fn test_memory_budget_checked() {
        let params = CanvasParams { max_memory_bytes: 1000, ..CanvasParams::default() };
        let err = plan_canvas((100, 100), (100, 100), &Homography::identity(), &params).unwrap_err();
        assert_eq!(
            err,
            CompositeError::MemoryBudgetExceeded { required_bytes: 120 * 120 * 8, budget_bytes: 1000 }
        );
    }

    #[test]
    fn test_corner_sent_to_infinity() {
        // H⁻¹ has bottom row (-0.01, 0, 1), so B's corner at x = 100 lands on w = 0
        let h = Homography::from_row_slice(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.01, 0.0, 1.0]);
        assert_eq!(
            plan_canvas((50, 50), (100, 50), &h, &CanvasParams::default()).unwrap_err(),
            CompositeError::UnboundedProjection
        );
    }

    #[test]
    fn test_non_invertible_and_empty() {
        let singular = Homography::from_row_slice(&[1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0]);
        let img = gradient(10, 10);
        assert_eq!(
            warp_pair(&img, &img, &singular, &CanvasParams::default()).unwrap_err(),
            CompositeError::NonInvertibleTransform
        );

        let empty = RgbImage::new(0, 10);
        assert!(matches!(
            warp_pair(&empty, &img, &Homography::identity(), &CanvasParams::default()),
            Err(CompositeError::EmptyImage { .. })
        ));
    }

    #[test]
    fn test_bilinear_midpoint() {
        let img = RgbImage::from_fn(2, 1, |x, _| if x == 0 { Rgb([0, 0, 0]) } else { Rgb([200, 100, 50]) });
        assert_eq!(sample_bilinear(&img, 0.5, 0.0), Rgb([100, 50, 25]));
        assert_eq!(sample_bilinear(&img, -3.0, 0.0), Rgb([0, 0, 0]));
    }
}
