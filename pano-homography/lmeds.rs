use std::time::Instant;

use log::debug;
use pano_core::{Correspondence, Homography, RansacParams};

use crate::ransac::{classify, draw_sample, hypothesize, make_rng, mean_inlier_error, refine};
use crate::types::{EstimationResult, MIN_SAMPLE_SIZE};
use crate::RobustEstimator;

/// Lower bound on the derived inlier radius so exact data keeps its inliers
const MIN_INLIER_RADIUS: f64 = 1e-6;

/// Least-median-of-squares homography search.
///
/// Needs no reprojection threshold during sampling: the model with the
/// smallest median squared error wins, and the inlier radius is derived
/// from that median afterwards.
#[derive(Debug, Clone)]
pub struct LmedsEstimator {
    params: RansacParams,
}

impl LmedsEstimator {
    pub fn new(params: RansacParams) -> Self {
        Self { params }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params.seed = Some(seed);
        self
    }

    fn median_squared_error(h: &Homography, pairs: &[Correspondence], scratch: &mut Vec<f64>) -> f64 {
        scratch.clear();
        scratch.extend(
            pairs
                .iter()
                .map(|c| h.reprojection_error(c).map_or(f64::INFINITY, |e| e * e)),
        );
        let mid = scratch.len() / 2;
        let (_, median, _) = scratch.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        *median
    }

    /// Robust standard deviation estimate from the median squared residual
    fn inlier_radius(median_sq: f64, n: usize) -> f64 {
        let dof = n.saturating_sub(MIN_SAMPLE_SIZE).max(1) as f64;
        let sigma = 1.4826 * (1.0 + 5.0 / dof) * median_sq.sqrt();
        (2.5 * sigma).max(MIN_INLIER_RADIUS)
    }

    pub fn estimate(&self, pairs: &[Correspondence]) -> EstimationResult {
        let n = pairs.len();
        if n < MIN_SAMPLE_SIZE {
            return EstimationResult::empty(n, self.name());
        }

        let start = Instant::now();
        let mut rng = make_rng(self.params.seed);
        let mut scratch = Vec::with_capacity(n);

        let mut best: Option<(Homography, f64)> = None;
        let mut iterations = 0usize;

        while iterations < self.params.max_iterations {
            iterations += 1;
            let sample = draw_sample(&mut rng, pairs);
            let Some(h) = hypothesize(&sample) else {
                continue;
            };

            let median = Self::median_squared_error(&h, pairs, &mut scratch);
            if best.map_or(true, |(_, m)| median < m) {
                best = Some((h, median));
            }
        }

        let Some((sampled, median)) = best.filter(|(_, m)| m.is_finite()) else {
            let mut result = EstimationResult::empty(n, self.name());
            result.iterations = iterations;
            result.elapsed = start.elapsed();
            return result;
        };

        let radius = Self::inlier_radius(median, n);
        let (mask, count) = classify(&sampled, pairs, radius);
        let (model, inlier_mask, inlier_count) = refine(sampled, mask, count, pairs, radius);
        debug!("lmeds: median sq error {:.4}, inlier radius {:.3}px", median, radius);

        EstimationResult {
            model: Some(model),
            mean_error: mean_inlier_error(&model, pairs, &inlier_mask),
            inlier_mask,
            inlier_count,
            inlier_ratio: inlier_count as f64 / n as f64,
            iterations,
            elapsed: start.elapsed(),
            correspondence_count: n,
            estimator: self.name(),
        }
    }
}

impl RobustEstimator for LmedsEstimator {
    fn estimate(&self, pairs: &[Correspondence]) -> EstimationResult {
        LmedsEstimator::estimate(self, pairs)
    }

    fn name(&self) -> &'static str {
        "lmeds"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn grid_pairs(h: &Homography) -> Vec<Correspondence> {
        let mut pairs = Vec::new();
        for i in 0..8 {
            for j in 0..6 {
                let src = Point2::new(20.0 + i as f64 * 70.0, 15.0 + j as f64 * 75.0);
                pairs.push(Correspondence::new(src, h.project(&src).unwrap()));
            }
        }
        pairs
    }

    #[test]
    fn test_lmeds_with_minority_outliers() {
        let h = Homography::from_row_slice(&[0.97, -0.04, 55.0, 0.05, 1.01, -20.0, -3e-5, 4e-5, 1.0]);
        let mut pairs = grid_pairs(&h);
        let clean = pairs.len();
        // Corrupt a third of the destinations
        for (k, c) in pairs.iter_mut().enumerate().filter(|(k, _)| k % 3 == 0) {
            c.dst.x += 40.0 + k as f64;
            c.dst.y -= 25.0;
        }

        let result = LmedsEstimator::new(RansacParams::default()).with_seed(11).estimate(&pairs);
        let model = result.homography().unwrap();

        assert_eq!(result.estimator, "lmeds");
        assert_eq!(result.inlier_count, clean - clean.div_ceil(3));
        let p = Point2::new(300.0, 200.0);
        assert!((model.project(&p).unwrap() - h.project(&p).unwrap()).norm() < 1e-3);
    }

    #[test]
    fn test_lmeds_too_few() {
        let pairs = vec![Correspondence::from_coords(0.0, 0.0, 1.0, 1.0); 2];
        let result = LmedsEstimator::new(RansacParams::default()).estimate(&pairs);
        assert_eq!(result.iterations, 0);
        assert!(result.homography().is_err());
    }

    #[test]
    fn test_inlier_radius_floor() {
        assert_eq!(LmedsEstimator::inlier_radius(0.0, 50), MIN_INLIER_RADIUS);
        assert!(LmedsEstimator::inlier_radius(4.0, 50) > 2.5 * 1.4826 * 2.0);
    }
}
