use std::time::Instant;

use log::{debug, warn};
use pano_core::{Correspondence, Homography, InlierMask, RansacParams};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::dlt;
use crate::types::{EstimationResult, MIN_SAMPLE_SIZE};
use crate::RobustEstimator;

/// Per-call random source: seeded when reproducibility is requested
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Draw four distinct correspondences uniformly at random
pub(crate) fn draw_sample(rng: &mut StdRng, pairs: &[Correspondence]) -> [Correspondence; 4] {
    let idx = index::sample(rng, pairs.len(), MIN_SAMPLE_SIZE);
    [pairs[idx.index(0)], pairs[idx.index(1)], pairs[idx.index(2)], pairs[idx.index(3)]]
}

/// Minimal solve with the collinearity pre-check
pub(crate) fn hypothesize(sample: &[Correspondence; 4]) -> Option<Homography> {
    if dlt::is_degenerate_sample(sample) {
        return None;
    }
    dlt::solve_minimal(sample)
}

/// Flag every correspondence whose reprojection error is below `threshold`.
/// Failed projections are never inliers.
pub fn classify(h: &Homography, pairs: &[Correspondence], threshold: f64) -> (InlierMask, usize) {
    let mask: InlierMask = pairs
        .iter()
        .map(|c| h.reprojection_error(c).is_some_and(|e| e < threshold))
        .collect();
    let count = mask.iter().filter(|&&m| m).count();
    (mask, count)
}

/// Mean error over inliers, skipping projections that fail
pub fn mean_inlier_error(h: &Homography, pairs: &[Correspondence], mask: &[bool]) -> Option<f64> {
    let (sum, n) = pairs
        .iter()
        .zip(mask)
        .filter(|(_, inlier)| **inlier)
        .filter_map(|(c, _)| h.reprojection_error(c))
        .fold((0.0, 0usize), |(s, n), e| (s + e, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Iterations needed to draw one all-inlier sample with probability
/// `confidence` at inlier ratio `w`; `None` when the ratio gives no bound.
pub fn required_iterations(confidence: f64, w: f64) -> Option<usize> {
    if w <= 0.0 || w >= 1.0 {
        return None;
    }
    let denom = (-w.powi(MIN_SAMPLE_SIZE as i32)).ln_1p();
    if denom >= 0.0 {
        return None;
    }
    let n = ((1.0 - confidence).ln() / denom).ceil();
    n.is_finite().then(|| n.max(0.0) as usize + 1)
}

/// Least-squares refit over the inliers of `best`.
///
/// The refit replaces the hypothesis only if it still has at least four
/// inliers under `threshold`.
pub(crate) fn refine(
    best: Homography,
    best_mask: InlierMask,
    best_count: usize,
    pairs: &[Correspondence],
    threshold: f64,
) -> (Homography, InlierMask, usize) {
    if best_count < MIN_SAMPLE_SIZE {
        return (best, best_mask, best_count);
    }

    let inliers: Vec<Correspondence> = pairs
        .iter()
        .zip(&best_mask)
        .filter_map(|(c, &m)| m.then_some(*c))
        .collect();

    match dlt::solve_least_squares(&inliers) {
        Some(refined) => {
            let (mask, count) = classify(&refined, pairs, threshold);
            if count >= MIN_SAMPLE_SIZE {
                debug!("refinement: {} -> {} inliers", best_count, count);
                (refined, mask, count)
            } else {
                warn!(
                    "refined homography kept only {} inliers, keeping the sampled model ({} inliers)",
                    count, best_count
                );
                (best, best_mask, best_count)
            }
        }
        None => {
            warn!("least-squares refinement was degenerate, keeping the sampled model");
            (best, best_mask, best_count)
        }
    }
}

/// Hypothesize-and-verify homography search over minimal DLT samples
#[derive(Debug, Clone)]
pub struct RansacEstimator {
    params: RansacParams,
}

impl RansacEstimator {
    pub fn new(params: RansacParams) -> Self {
        Self { params }
    }

    /// Fix the sampling seed for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params.seed = Some(seed);
        self
    }

    pub fn params(&self) -> &RansacParams {
        &self.params
    }

    pub fn estimate(&self, pairs: &[Correspondence]) -> EstimationResult {
        let n = pairs.len();
        if n < MIN_SAMPLE_SIZE {
            debug!("ransac: {} correspondences, nothing to sample", n);
            return EstimationResult::empty(n, self.name());
        }

        let start = Instant::now();
        let threshold = self.params.threshold;
        let mut rng = make_rng(self.params.seed);

        let mut best: Option<Homography> = None;
        let mut best_mask: InlierMask = vec![false; n];
        let mut best_count = 0usize;

        let mut budget = self.params.max_iterations;
        let mut iterations = 0usize;

        while iterations < budget {
            iterations += 1;

            let sample = draw_sample(&mut rng, pairs);
            let Some(h) = hypothesize(&sample) else {
                continue;
            };

            let (mask, count) = classify(&h, pairs, threshold);
            if count > best_count {
                best = Some(h);
                best_mask = mask;
                best_count = count;

                let w = count as f64 / n as f64;
                if let Some(needed) = required_iterations(self.params.confidence, w) {
                    budget = budget.min(needed);
                }
                debug!(
                    "ransac iter {}: {} inliers ({:.1}%), budget {}",
                    iterations,
                    count,
                    w * 100.0,
                    budget
                );
                if count == n {
                    break;
                }
            }
        }

        let Some(sampled) = best else {
            debug!("ransac: no non-degenerate model in {} iterations", iterations);
            let mut result = EstimationResult::empty(n, self.name());
            result.iterations = iterations;
            result.elapsed = start.elapsed();
            return result;
        };

        let (model, inlier_mask, inlier_count) = refine(sampled, best_mask, best_count, pairs, threshold);
        let mean_error = mean_inlier_error(&model, pairs, &inlier_mask);

        let result = EstimationResult {
            model: Some(model),
            inlier_mask,
            inlier_count,
            inlier_ratio: inlier_count as f64 / n as f64,
            mean_error,
            iterations,
            elapsed: start.elapsed(),
            correspondence_count: n,
            estimator: self.name(),
        };
        debug!("{}", result.summary());
        result
    }
}

impl Default for RansacEstimator {
    fn default() -> Self {
        Self::new(RansacParams::default())
    }
}

impl RobustEstimator for RansacEstimator {
    fn estimate(&self, pairs: &[Correspondence]) -> EstimationResult {
        RansacEstimator::estimate(self, pairs)
    }

    fn name(&self) -> &'static str {
        "ransac"
    }
}
