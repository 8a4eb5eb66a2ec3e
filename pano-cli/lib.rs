//! Pairwise panorama stitching pipeline.
//!
//! [`Stitcher`] runs input checks, robust homography estimation,
//! validation, warping and blending for one image pair. Chains of images
//! are assembled with [`Stitcher::stitch_sequence`]; unrelated pairs can be
//! processed concurrently with [`Stitcher::stitch_pairs`].

mod builder;
mod config;
mod error;

use std::time::Instant;

use image::{DynamicImage, RgbImage};
use log::{debug, info, warn};
use pano_blend::{blender_for, warp_pair, BlendInputs, CanvasLayout, CompositeError};
use pano_core::RansacParams;
use pano_homography::{
    EstimationResult, HomographyValidator, LmedsEstimator, RansacEstimator, RobustEstimator,
};
use rayon::prelude::*;

pub use builder::StitcherBuilder;
pub use config::{ConfigError, EstimatorKind, StitchConfig, MAX_THRESHOLD, MIN_THRESHOLD};
pub use error::{InputError, StitchError, StitchResult};
pub use pano_blend;
pub use pano_core::{self, BlendMode, Correspondence, Homography};
pub use pano_homography;

/// A stitched pair with the estimation that produced it
#[derive(Debug, Clone)]
pub struct Panorama {
    pub image: RgbImage,
    pub estimation: EstimationResult,
    /// Canvas size and where the first input's origin landed
    pub layout: CanvasLayout,
}

/// Result of assembling an ordered image sequence
#[derive(Debug, Clone)]
pub struct SequencePanorama {
    pub image: RgbImage,
    /// Index of the image every other image was stitched onto
    pub reference: usize,
    /// Number of input images contained in `image`
    pub stitched: usize,
    /// Images left out after a recoverable failure, in the order they failed
    pub skipped: Vec<usize>,
}

/// One independent pair for batch stitching
#[derive(Debug, Clone)]
pub struct PairInput {
    pub image_a: RgbImage,
    pub image_b: RgbImage,
    pub correspondences: Vec<Correspondence>,
}

/// Supplies correspondences between two images, `src` in `a` and `dst` in `b`
pub trait CorrespondenceSource {
    fn correspondences(&mut self, a: &RgbImage, b: &RgbImage) -> Vec<Correspondence>;
}

impl<F> CorrespondenceSource for F
where
    F: FnMut(&RgbImage, &RgbImage) -> Vec<Correspondence>,
{
    fn correspondences(&mut self, a: &RgbImage, b: &RgbImage) -> Vec<Correspondence> {
        self(a, b)
    }
}

#[derive(Debug, Clone)]
pub struct Stitcher {
    config: StitchConfig,
    validator: HomographyValidator,
}

impl Stitcher {
    pub fn new(config: StitchConfig) -> StitchResult<Self> {
        config.validate()?;
        debug!("{}", config.summary());
        Ok(Self {
            validator: HomographyValidator::new(config.validation.clone()),
            config,
        })
    }

    pub fn builder() -> StitcherBuilder {
        StitcherBuilder::new()
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    fn check_inputs(&self, a: &RgbImage, b: &RgbImage) -> Result<(), InputError> {
        let min = self.config.min_image_dimension;
        for (which, img) in [("A", a), ("B", b)] {
            let (width, height) = img.dimensions();
            if width == 0 || height == 0 {
                return Err(InputError::EmptyImage { which });
            }
            if width < min || height < min {
                return Err(InputError::TooSmall { which, width, height, min });
            }
        }

        let total = a.width() as u64 * a.height() as u64 + b.width() as u64 * b.height() as u64;
        if total > self.config.max_input_pixels {
            return Err(InputError::TooManyPixels { total, max: self.config.max_input_pixels });
        }
        if total > self.config.warn_input_pixels {
            warn!("large input ({:.1} MP), processing may be slow", total as f64 / 1e6);
        }
        Ok(())
    }

    fn primary_estimator(&self) -> Box<dyn RobustEstimator> {
        let params = self.config.ransac.clone();
        match self.config.estimator {
            EstimatorKind::Ransac => Box::new(RansacEstimator::new(params)),
            EstimatorKind::Lmeds => Box::new(LmedsEstimator::new(params)),
        }
    }

    /// LMedS retry parameters; a fixed seed is shifted so the retry does not
    /// replay the samples RANSAC already rejected
    fn fallback_params(&self) -> RansacParams {
        let mut params = self.config.ransac.clone();
        params.seed = params.seed.map(|seed| seed.wrapping_add(1));
        params
    }

    /// Robust estimation with the optional LMedS retry
    pub fn estimate(&self, pairs: &[Correspondence]) -> EstimationResult {
        let result = self.primary_estimator().estimate(pairs);
        info!("{}", result.summary());

        if !self.config.lmeds_fallback || self.config.estimator == EstimatorKind::Lmeds {
            return result;
        }
        match result.homography() {
            Ok(_) => result,
            Err(err) if pairs.len() >= pano_homography::MIN_SAMPLE_SIZE => {
                warn!("{}, retrying with LMedS", err);
                let fallback = LmedsEstimator::new(self.fallback_params()).estimate(pairs);
                info!("{}", fallback.summary());
                if fallback.is_success() { fallback } else { result }
            }
            Err(_) => result,
        }
    }

    /// Stitch `b` onto `a`; the output lives in `a`'s frame.
    ///
    /// `pairs` map points of `a` (`src`) to points of `b` (`dst`).
    pub fn stitch(&self, a: &RgbImage, b: &RgbImage, pairs: &[Correspondence]) -> StitchResult<Panorama> {
        let start = Instant::now();
        self.check_inputs(a, b)?;
        info!(
            "stitching {}x{} + {}x{} from {} correspondences",
            a.width(),
            a.height(),
            b.width(),
            b.height(),
            pairs.len()
        );

        let estimation = self.estimate(pairs);
        let h = self.validator.validate(&estimation)?;

        info!("warping onto shared canvas");
        let warped = warp_pair(a, b, &h, &self.config.canvas)?;
        let inputs = BlendInputs::new(&warped.image_a, &warped.image_b, &warped.mask_a, &warped.mask_b)?;

        let blender = blender_for(&self.config.blend);
        info!("blending with {}", blender.mode());
        let image = blender.blend(&inputs)?;

        info!("panorama {}x{} in {:.2?}", image.width(), image.height(), start.elapsed());
        Ok(Panorama { image, estimation, layout: warped.layout })
    }

    /// Stitch decoded images of any layout, provided both share one colour type
    pub fn stitch_dynamic(
        &self,
        a: &DynamicImage,
        b: &DynamicImage,
        pairs: &[Correspondence],
    ) -> StitchResult<Panorama> {
        if a.color() != b.color() {
            return Err(CompositeError::SizeOrTypeMismatch {
                detail: format!("image A is {:?}, image B is {:?}", a.color(), b.color()),
            }
            .into());
        }
        self.stitch(&a.to_rgb8(), &b.to_rgb8(), pairs)
    }

    /// Assemble an ordered sequence around its middle image.
    ///
    /// Images left of the middle are added as `(image, panorama)` walking
    /// outwards, then images to the right as `(panorama, image)`. Each step
    /// depends on the previous one.
    ///
    /// Two failures are recoverable. If the leftmost image fails while images
    /// remain on the right, the left side is dropped and assembly restarts
    /// from the reference image. A failure on the final image keeps the
    /// panorama built so far. Any other failure aborts.
    pub fn stitch_sequence<S>(&self, images: &[RgbImage], source: &mut S) -> StitchResult<SequencePanorama>
    where
        S: CorrespondenceSource + ?Sized,
    {
        let Some(last) = images.len().checked_sub(1) else {
            return Err(InputError::NoImages.into());
        };
        let reference = images.len() / 2;
        info!("sequence of {} images, reference is image {}", images.len(), reference);

        let mut panorama = images[reference].clone();
        let mut stitched = 1;
        let mut skipped = Vec::new();

        for index in (0..reference).rev() {
            let pairs = source.correspondences(&images[index], &panorama);
            match self.stitch(&images[index], &panorama, &pairs) {
                Ok(step) => {
                    panorama = step.image;
                    stitched += 1;
                }
                Err(e) if index == 0 && reference < last => {
                    warn!("failed to stitch image 0 ({}), dropping the left side and continuing from image {}", e, reference);
                    panorama = images[reference].clone();
                    stitched = 1;
                    skipped.push(index);
                }
                Err(e) => return Err(StitchError::Sequence { index, source: Box::new(e) }),
            }
        }

        for index in reference + 1..images.len() {
            let pairs = source.correspondences(&panorama, &images[index]);
            match self.stitch(&panorama, &images[index], &pairs) {
                Ok(step) => {
                    panorama = step.image;
                    stitched += 1;
                }
                Err(e) if index == last => {
                    warn!("failed to stitch image {} ({}), returning partial panorama", index, e);
                    skipped.push(index);
                    return Ok(SequencePanorama { image: panorama, reference, stitched, skipped });
                }
                Err(e) => return Err(StitchError::Sequence { index, source: Box::new(e) }),
            }
        }

        Ok(SequencePanorama { image: panorama, reference, stitched, skipped })
    }

    /// Stitch unrelated pairs concurrently on a pool of `n_threads` workers.
    /// Results keep the input order.
    pub fn stitch_pairs(&self, inputs: &[PairInput]) -> StitchResult<Vec<StitchResult<Panorama>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.n_threads)
            .build()?;
        info!("stitching {} pairs on {} threads", inputs.len(), self.config.n_threads);

        Ok(pool.install(|| {
            inputs
                .par_iter()
                .map(|p| self.stitch(&p.image_a, &p.image_b, &p.correspondences))
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{imageops, Rgb};
    use pano_homography::HomographyError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn scene(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([((x * 5 + y * 3) % 256) as u8, ((x * y) % 256) as u8, (((x / 4) ^ (y / 4)) * 16 % 256) as u8])
        })
    }

    fn crop(img: &RgbImage, x: u32, y: u32, w: u32, h: u32) -> RgbImage {
        imageops::crop_imm(img, x, y, w, h).to_image()
    }

    /// Grid correspondences for a pure translation `dst = src + (dx, dy)`
    fn shifted_grid(xs: (f64, f64), ys: (f64, f64), dx: f64, dy: f64) -> Vec<Correspondence> {
        let mut pairs = Vec::new();
        for i in 0..6 {
            for j in 0..5 {
                let x = xs.0 + (xs.1 - xs.0) * i as f64 / 5.0;
                let y = ys.0 + (ys.1 - ys.0) * j as f64 / 4.0;
                pairs.push(Correspondence::from_coords(x, y, x + dx, y + dy));
            }
        }
        pairs
    }

    fn with_outliers(mut pairs: Vec<Correspondence>, n: usize, seed: u64) -> Vec<Correspondence> {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..n {
            pairs.push(Correspondence::from_coords(
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
            ));
        }
        pairs
    }

    fn stitcher(mode: BlendMode) -> Stitcher {
        Stitcher::builder().seed(3).blend_mode(mode).build().unwrap()
    }

    #[test]
    fn test_translated_pair_reassembles_scene() {
        let base = scene(180, 120);
        let a = crop(&base, 0, 0, 120, 120);
        let b = crop(&base, 60, 0, 120, 120);
        let pairs = with_outliers(shifted_grid((65.0, 115.0), (5.0, 115.0), -60.0, 0.0), 10, 1);

        let pano = stitcher(BlendMode::Feather).stitch(&a, &b, &pairs).unwrap();

        assert!(pano.estimation.inlier_count >= 30);
        assert_eq!((pano.layout.offset_x, pano.layout.offset_y), (10, 10));
        assert_eq!(pano.image.dimensions(), (200, 140));

        for (x, y) in [(5, 5), (90, 60), (170, 110)] {
            let expected = base.get_pixel(x, y);
            let got = pano.image.get_pixel(x + 10, y + 10);
            for c in 0..3 {
                assert!((expected[c] as i16 - got[c] as i16).abs() <= 1, "({}, {}): {:?} vs {:?}", x, y, got, expected);
            }
        }
    }

    #[test]
    fn test_lmeds_estimator_selected() {
        let base = scene(180, 120);
        let a = crop(&base, 0, 0, 120, 120);
        let b = crop(&base, 60, 0, 120, 120);
        let pairs = shifted_grid((65.0, 115.0), (5.0, 115.0), -60.0, 0.0);

        let stitcher = Stitcher::builder().estimator(EstimatorKind::Lmeds).seed(8).build().unwrap();
        let pano = stitcher.stitch(&a, &b, &pairs).unwrap();
        assert_eq!(pano.estimation.estimator, "lmeds");
        assert_eq!(pano.estimation.inlier_count, 30);
    }

    /// Six points on one line plus two off it: most four-point samples are collinear
    fn mostly_collinear() -> Vec<Correspondence> {
        let mut src: Vec<(f64, f64)> = (0..6).map(|i| (10.0 + 10.0 * i as f64, 20.0 + 5.0 * i as f64)).collect();
        src.extend([(15.0, 60.0), (70.0, 10.0)]);
        src.into_iter().map(|(x, y)| Correspondence::from_coords(x, y, x + 3.0, y - 2.0)).collect()
    }

    fn single_draw(seed: u64) -> Stitcher {
        Stitcher::builder().seed(seed).max_iterations(1).lmeds_fallback(true).build().unwrap()
    }

    #[test]
    fn test_lmeds_fallback_recovers_failed_ransac() {
        let pairs = mostly_collinear();
        // A seed whose single RANSAC draw is degenerate while the retry's is not
        let seed = (0..1000u64)
            .find(|&seed| {
                let s = single_draw(seed);
                !s.primary_estimator().estimate(&pairs).is_success()
                    && LmedsEstimator::new(s.fallback_params()).estimate(&pairs).is_success()
            })
            .expect("some seed separates the two draws");

        let result = single_draw(seed).estimate(&pairs);
        assert_eq!(result.estimator, "lmeds");
        assert!(result.is_success());
        assert_eq!(result.inlier_count, 8);
    }

    #[test]
    fn test_lmeds_fallback_failure_returns_ransac_result() {
        // Every sample is collinear, so neither estimator finds a model
        let pairs: Vec<Correspondence> = (0..10)
            .map(|i| Correspondence::from_coords(i as f64 * 7.0, i as f64 * 3.0, i as f64 * 7.0 + 1.0, i as f64 * 3.0))
            .collect();
        let s = Stitcher::builder().seed(2).max_iterations(20).lmeds_fallback(true).build().unwrap();

        let result = s.estimate(&pairs);
        assert_eq!(result.estimator, "ransac");
        assert!(result.model.is_none());
        assert!(matches!(result.homography(), Err(HomographyError::DegenerateModel { iterations: 20 })));
    }

    #[test]
    fn test_fallback_seed_differs_from_primary() {
        let s = single_draw(41);
        assert_eq!(s.fallback_params().seed, Some(42));
        assert_eq!(s.fallback_params().max_iterations, 1);
    }

    #[test]
    fn test_too_few_correspondences() {
        let img = scene(80, 80);
        let pairs = shifted_grid((0.0, 10.0), (0.0, 10.0), 1.0, 1.0)[..3].to_vec();
        let err = stitcher(BlendMode::Overlay).stitch(&img, &img, &pairs).unwrap_err();
        assert!(matches!(
            err,
            StitchError::Homography(HomographyError::InsufficientCorrespondences { available: 3, .. })
        ));
    }

    #[test]
    fn test_input_checks() {
        let big = scene(80, 80);
        let small = scene(40, 80);
        let pairs = shifted_grid((0.0, 30.0), (0.0, 30.0), 0.0, 0.0);
        let s = stitcher(BlendMode::Overlay);

        assert!(matches!(
            s.stitch(&big, &small, &pairs),
            Err(StitchError::Input(InputError::TooSmall { which: "B", width: 40, .. }))
        ));
        assert!(matches!(
            s.stitch(&RgbImage::new(0, 0), &big, &pairs),
            Err(StitchError::Input(InputError::EmptyImage { which: "A" }))
        ));

        let capped = Stitcher::builder().max_input_pixels(10_000).build().unwrap();
        assert!(matches!(
            capped.stitch(&big, &big, &pairs),
            Err(StitchError::Input(InputError::TooManyPixels { total: 12_800, max: 10_000 }))
        ));
    }

    #[test]
    fn test_geometry_rejection_reported() {
        let img = scene(80, 80);
        // Exact 12x magnification in x only: a valid fit the validator must refuse
        let pairs: Vec<Correspondence> = shifted_grid((0.0, 70.0), (0.0, 70.0), 0.0, 0.0)
            .into_iter()
            .map(|c| Correspondence::from_coords(c.src.x, c.src.y, c.src.x * 12.0, c.src.y))
            .collect();
        let err = stitcher(BlendMode::Overlay).stitch(&img, &img, &pairs).unwrap_err();
        assert!(matches!(err, StitchError::Homography(HomographyError::GeometryRejected(_))));
    }

    #[test]
    fn test_dynamic_colour_mismatch() {
        let rgb = DynamicImage::ImageRgb8(scene(60, 60));
        let gray = DynamicImage::ImageLuma8(image::GrayImage::new(60, 60));
        let pairs = shifted_grid((0.0, 50.0), (0.0, 50.0), 0.0, 0.0);

        let err = stitcher(BlendMode::Overlay).stitch_dynamic(&rgb, &gray, &pairs).unwrap_err();
        assert!(matches!(err, StitchError::Composite(CompositeError::SizeOrTypeMismatch { .. })));
    }

    #[test]
    fn test_sequence_around_middle() {
        let base = scene(200, 80);
        let images = vec![crop(&base, 0, 0, 100, 80), crop(&base, 50, 0, 100, 80), crop(&base, 100, 0, 100, 80)];

        let mut calls = 0;
        let mut source = |a: &RgbImage, _b: &RgbImage| {
            calls += 1;
            if a.width() == 100 {
                // image 0 onto image 1
                shifted_grid((55.0, 95.0), (5.0, 75.0), -50.0, 0.0)
            } else {
                // running panorama (offset by padding) onto image 2
                shifted_grid((115.0, 155.0), (15.0, 85.0), -110.0, -10.0)
            }
        };

        let result = stitcher(BlendMode::Overlay).stitch_sequence(&images, &mut source).unwrap();
        assert_eq!(calls, 2);
        assert_eq!(result.reference, 1);
        assert_eq!(result.stitched, 3);
        assert!(result.skipped.is_empty());

        // Base pixel (x, y) sits at (x + 20, y + 20) after two padded steps
        for (x, y) in [(20u32, 40u32), (180, 40)] {
            assert_eq!(result.image.get_pixel(x + 20, y + 20), base.get_pixel(x, y));
        }
    }

    #[test]
    fn test_sequence_keeps_partial_on_last_failure() {
        let base = scene(150, 80);
        let images = vec![crop(&base, 0, 0, 100, 80), crop(&base, 50, 0, 100, 80)];
        let mut source = |_: &RgbImage, _: &RgbImage| Vec::<Correspondence>::new();

        // Reference is image 1 with nothing to its right, so a left failure aborts
        let err = stitcher(BlendMode::Overlay).stitch_sequence(&images, &mut source).unwrap_err();
        assert!(matches!(err, StitchError::Sequence { index: 0, .. }));

        let three = vec![images[0].clone(), images[1].clone(), images[0].clone()];
        let mut first_only = |a: &RgbImage, _: &RgbImage| {
            if a.width() == 100 { shifted_grid((55.0, 95.0), (5.0, 75.0), -50.0, 0.0) } else { Vec::<Correspondence>::new() }
        };
        let result = stitcher(BlendMode::Overlay).stitch_sequence(&three, &mut first_only).unwrap();
        assert_eq!(result.stitched, 2);
        assert_eq!(result.skipped, vec![2]);
    }

    #[test]
    fn test_sequence_drops_failed_left_side() {
        let base = scene(200, 80);
        let images = vec![crop(&base, 0, 0, 100, 80), crop(&base, 50, 0, 100, 80), crop(&base, 100, 0, 100, 80)];

        // No matches for (image 0, image 1); a valid grid for (image 1, image 2)
        let mut right_only = |a: &RgbImage, b: &RgbImage| {
            if a.width() == 100 && b.get_pixel(0, 0) == base.get_pixel(100, 0) {
                shifted_grid((55.0, 95.0), (5.0, 75.0), -50.0, 0.0)
            } else {
                Vec::<Correspondence>::new()
            }
        };

        let result = stitcher(BlendMode::Overlay).stitch_sequence(&images, &mut right_only).unwrap();
        assert_eq!(result.reference, 1);
        assert_eq!(result.stitched, 2);
        assert_eq!(result.skipped, vec![0]);
        assert_eq!(result.image.dimensions(), (170, 100));

        // Image 1 is the origin of the restarted panorama
        for (x, y) in [(60u32, 40u32), (180, 40)] {
            assert_eq!(result.image.get_pixel(x - 50 + 10, y + 10), base.get_pixel(x, y));
        }
    }

    #[test]
    fn test_sequence_edge_cases() {
        let mut source = |_: &RgbImage, _: &RgbImage| Vec::<Correspondence>::new();
        let s = stitcher(BlendMode::Overlay);
        assert!(matches!(
            s.stitch_sequence(&[], &mut source),
            Err(StitchError::Input(InputError::NoImages))
        ));

        let single = s.stitch_sequence(&[scene(60, 60)], &mut source).unwrap();
        assert_eq!(single.image, scene(60, 60));
        assert_eq!(single.stitched, 1);
    }

    #[test]
    fn test_pairs_keep_order() {
        let base = scene(180, 120);
        let good = PairInput {
            image_a: crop(&base, 0, 0, 120, 120),
            image_b: crop(&base, 60, 0, 120, 120),
            correspondences: shifted_grid((65.0, 115.0), (5.0, 115.0), -60.0, 0.0),
        };
        let bad = PairInput { correspondences: Vec::new(), ..good.clone() };

        let s = Stitcher::builder().seed(5).threads(2).build().unwrap();
        let results = s.stitch_pairs(&[good.clone(), bad, good]).unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(StitchError::Homography(_))));
        assert!(results[2].is_ok());
    }
}
