//! Direct linear transform solvers.
//!
//! Point sets are Hartley-normalized (centroid at the origin, mean distance
//! √2) before the linear system is built, and the solution is mapped back
//! with `H = T_dst⁻¹ · Ĥ · T_src`.

use nalgebra::{DMatrix, Matrix3, Point2, SymmetricEigen};
use pano_core::{Correspondence, Homography, PROJECTION_EPSILON};

use crate::types::MIN_SAMPLE_SIZE;

/// Similarity transform that centres `pts` and scales their mean radius to √2
fn normalizing_transform<'a>(pts: impl Iterator<Item = &'a Point2<f64>> + Clone) -> Matrix3<f64> {
    let n = pts.clone().count() as f64;
    let (sx, sy) = pts.clone().fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = pts
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Closed-form inverse of a `normalizing_transform` output
fn invert_normalizing(t: &Matrix3<f64>) -> Matrix3<f64> {
    let s = t[(0, 0)];
    Matrix3::new(
        1.0 / s, 0.0, -t[(0, 2)] / s,
        0.0, 1.0 / s, -t[(1, 2)] / s,
        0.0, 0.0, 1.0,
    )
}

/// Build the 2N×9 system from q × (H·p) = 0, padded with zero rows to at
/// least 9×9 so a full right-singular basis is always available.
fn design_matrix(pairs: &[Correspondence], t_src: &Matrix3<f64>, t_dst: &Matrix3<f64>) -> DMatrix<f64> {
    let rows = (2 * pairs.len()).max(9);
    let mut a = DMatrix::zeros(rows, 9);

    for (i, c) in pairs.iter().enumerate() {
        let p = t_src.transform_point(&c.src);
        let q = t_dst.transform_point(&c.dst);
        let (x, y) = (p.x, p.y);
        let (u, v) = (q.x, q.y);

        // [ 0  0  0 | -x -y -1 |  v·x  v·y  v ]
        a[(2 * i, 3)] = -x;
        a[(2 * i, 4)] = -y;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = v * x;
        a[(2 * i, 7)] = v * y;
        a[(2 * i, 8)] = v;

        // [ x  y  1 |  0  0  0 | -u·x -u·y -u ]
        a[(2 * i + 1, 0)] = x;
        a[(2 * i + 1, 1)] = y;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -u * x;
        a[(2 * i + 1, 7)] = -u * y;
        a[(2 * i + 1, 8)] = -u;
    }

    a
}

/// Map a normalized-space solution back to pixels and reject degenerate ones
fn finish(h_vec: &[f64], t_src: &Matrix3<f64>, t_dst: &Matrix3<f64>) -> Option<Homography> {
    let h_norm = Matrix3::from_row_slice(h_vec);
    let h = Homography::from_matrix(invert_normalizing(t_dst) * h_norm * t_src).normalized();

    if !h.is_finite() || h.determinant().abs() < PROJECTION_EPSILON {
        return None;
    }
    Some(h)
}

fn twice_area(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Twice-area below this fraction of the squared bounding-box diagonal
/// counts as collinear
const COLLINEAR_TOLERANCE: f64 = 1e-8;

/// Squared diagonal of the bounding box around `pts`
fn extent_sq<'a>(pts: impl Iterator<Item = &'a Point2<f64>>) -> f64 {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in pts {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    (max_x - min_x).powi(2) + (max_y - min_y).powi(2)
}

/// True when any three of the four points on either side are collinear.
///
/// The cut-off scales with the sample's extent, so the test behaves the same
/// at any coordinate range.
pub fn is_degenerate_sample(sample: &[Correspondence; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    let tol_src = COLLINEAR_TOLERANCE * extent_sq(sample.iter().map(|c| &c.src));
    let tol_dst = COLLINEAR_TOLERANCE * extent_sq(sample.iter().map(|c| &c.dst));
    TRIPLES.iter().any(|&(i, j, k)| {
        twice_area(&sample[i].src, &sample[j].src, &sample[k].src).abs() <= tol_src
            || twice_area(&sample[i].dst, &sample[j].dst, &sample[k].dst).abs() <= tol_dst
    })
}

/// Exact homography through four correspondences.
///
/// Takes the right-singular vector of the smallest singular value of the
/// 8×9 system. Returns `None` for non-finite or near-singular results.
pub fn solve_minimal(sample: &[Correspondence; 4]) -> Option<Homography> {
    let t_src = normalizing_transform(sample.iter().map(|c| &c.src));
    let t_dst = normalizing_transform(sample.iter().map(|c| &c.dst));
    let a = design_matrix(sample, &t_src, &t_dst);

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;

    let h_vec: Vec<f64> = v_t.row(min_idx).iter().copied().collect();
    finish(&h_vec, &t_src, &t_dst)
}

/// Algebraic least-squares homography over N ≥ 4 correspondences.
///
/// The solution is the eigenvector of AᵀA with the smallest eigenvalue,
/// which keeps the decomposition at 9×9 regardless of N.
pub fn solve_least_squares(pairs: &[Correspondence]) -> Option<Homography> {
    if pairs.len() < MIN_SAMPLE_SIZE {
        return None;
    }

    let t_src = normalizing_transform(pairs.iter().map(|c| &c.src));
    let t_dst = normalizing_transform(pairs.iter().map(|c| &c.dst));
    let a = design_matrix(pairs, &t_src, &t_dst);

    let eig = SymmetricEigen::new(a.transpose() * &a);
    let (min_idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap_or(std::cmp::Ordering::Equal))?;

    let h_vec: Vec<f64> = eig.eigenvectors.column(min_idx).iter().copied().collect();
    finish(&h_vec, &t_src, &t_dst)
}
