//! Sholl analysis: crossings of concentric spheres around the soma.

use nalgebra::{DMatrix, DVector};

use crate::geometry;
use crate::model::Tree;

use super::AnalysisError;

/// Highest polynomial degree used by [`sholl_metrics`].
const MAX_FIT_DEGREE: usize = 7;
/// Samples used to bracket the maximum of the fitted polynomial.
const FIT_SAMPLES: usize = 512;

/// Crossing counts per radial bin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShollProfile {
    pub counts: Vec<u32>,
    /// Bin centres, `(i + 0.5) * bin_size`; bin `i` counts crossings of the
    /// sphere of radius `i * bin_size`.
    pub radii: Vec<f64>,
}

/// Polynomial summary of a [`ShollProfile`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShollFit {
    /// Coefficients in ascending powers of the radius.
    pub coefficients: Vec<f64>,
    /// Radius at which the fit peaks.
    pub critical_radius: f64,
    /// Fitted count at `critical_radius`.
    pub max_value: f64,
}

impl ShollFit {
    pub fn evaluate(&self, radius: f64) -> f64 {
        horner(&self.coefficients, radius)
    }
}

/// Count, for each `r = i * bin_size` below `max_radius`, the tree edges whose
/// endpoint distances to the soma satisfy `d_lo < r <= d_hi`.
///
/// Edges include the parent extension of every connected branch. A tree
/// without a root gives all-zero counts.
pub fn sholl_crossings(
    tree: &Tree,
    pixel_sizes: [f64; 3],
    bin_size: f64,
    max_radius: f64,
) -> Result<ShollProfile, AnalysisError> {
    if !bin_size.is_finite() || bin_size <= 0.0 {
        return Err(AnalysisError::invalid("bin_size", "must be finite and > 0"));
    }
    if !max_radius.is_finite() || max_radius < 0.0 {
        return Err(AnalysisError::invalid("max_radius", "must be finite and >= 0"));
    }
    let n_bins = (max_radius / bin_size).ceil() as usize;
    let mut profile = ShollProfile {
        counts: vec![0; n_bins],
        radii: (0..n_bins).map(|i| (i as f64 + 0.5) * bin_size).collect(),
    };
    let Some(root) = tree.root_point() else {
        return Ok(profile);
    };
    let centre = geometry::mul(root.location, pixel_sizes);
    let radial = |loc: [f64; 3]| geometry::distance(centre, geometry::mul(loc, pixel_sizes));

    for bi in tree.connected_branches() {
        let run = tree.points_with_parent(bi);
        for edge in run.windows(2) {
            let (d0, d1) = (radial(edge[0].location), radial(edge[1].location));
            let (lo, hi) = if d0 <= d1 { (d0, d1) } else { (d1, d0) };
            let first = (lo / bin_size).floor() as usize;
            for i in first..n_bins {
                let r = i as f64 * bin_size;
                if r > hi {
                    break;
                }
                if r > lo {
                    profile.counts[i] += 1;
                }
            }
        }
    }
    Ok(profile)
}

/// Least-squares polynomial fit of a profile and its global maximum over the
/// sampled radii.
///
/// The degree is `min(7, n_bins - 1)`. Returns `None` with fewer than two
/// bins, when every count is zero, or when the fit is singular.
pub fn sholl_metrics(profile: &ShollProfile) -> Option<ShollFit> {
    let n = profile.radii.len().min(profile.counts.len());
    if n < 2 || profile.counts[..n].iter().all(|&c| c == 0) {
        return None;
    }
    let degree = MAX_FIT_DEGREE.min(n - 1);
    let r0 = profile.radii[0];
    let span = profile.radii[n - 1] - r0;
    if span <= 0.0 {
        return None;
    }

    // Fit on t = (r - r0) / span in [0, 1] to keep the Vandermonde matrix
    // well conditioned.
    let mut a = DMatrix::<f64>::zeros(n, degree + 1);
    for i in 0..n {
        let t = (profile.radii[i] - r0) / span;
        let mut pow = 1.0;
        for k in 0..=degree {
            a[(i, k)] = pow;
            pow *= t;
        }
    }
    let b = DVector::from_iterator(n, profile.counts[..n].iter().map(|&c| c as f64));
    let solved = a.svd(true, true).solve(&b, 1e-12).ok()?;
    let normalized: Vec<f64> = solved.iter().copied().collect();

    let (t_best, max_value) = maximize_on_unit_interval(&normalized);
    let coefficients = to_radius_basis(&normalized, r0, span);
    let fit = ShollFit {
        coefficients,
        critical_radius: r0 + t_best * span,
        max_value,
    };
    tracing::trace!(
        degree,
        critical_radius = fit.critical_radius,
        max_value = fit.max_value,
        "sholl fit"
    );
    Some(fit)
}

fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Dense sampling followed by golden-section refinement around the best
/// sample.
fn maximize_on_unit_interval(coefficients: &[f64]) -> (f64, f64) {
    let step = 1.0 / FIT_SAMPLES as f64;
    let mut best_t = 0.0;
    let mut best_v = horner(coefficients, 0.0);
    for i in 1..=FIT_SAMPLES {
        let t = i as f64 * step;
        let v = horner(coefficients, t);
        if v > best_v {
            best_t = t;
            best_v = v;
        }
    }

    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let (mut lo, mut hi) = ((best_t - step).max(0.0), (best_t + step).min(1.0));
    for _ in 0..40 {
        let x1 = hi - inv_phi * (hi - lo);
        let x2 = lo + inv_phi * (hi - lo);
        if horner(coefficients, x1) < horner(coefficients, x2) {
            lo = x1;
        } else {
            hi = x2;
        }
    }
    let refined = 0.5 * (lo + hi);
    let refined_v = horner(coefficients, refined);
    if refined_v > best_v {
        (refined, refined_v)
    } else {
        (best_t, best_v)
    }
}

/// Re-express `p(t)` with `t = (r - r0) / span` as a polynomial in `r`.
fn to_radius_basis(normalized: &[f64], r0: f64, span: f64) -> Vec<f64> {
    let mut out = vec![0.0; normalized.len()];
    for (k, &a) in normalized.iter().enumerate() {
        let scale = a / span.powi(k as i32);
        // (r - r0)^k = Σ_j C(k, j) r^j (-r0)^(k - j)
        let mut binom = 1.0;
        for j in 0..=k {
            out[j] += scale * binom * (-r0).powi((k - j) as i32);
            binom = binom * (k - j) as f64 / (j + 1) as f64;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TreeBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_bad_bins() {
        let t = Tree::default();
        assert!(sholl_crossings(&t, [1.0; 3], 0.0, 10.0).is_err());
        assert!(sholl_crossings(&t, [1.0; 3], 1.0, f64::NAN).is_err());
        let p = sholl_crossings(&t, [1.0; 3], 5.0, 12.0).unwrap();
        assert_eq!(p.counts, vec![0, 0, 0]);
        assert_eq!(p.radii, vec![2.5, 7.5, 12.5]);
    }

    #[test]
    fn branching_tree_counts_each_edge() {
        // Two branches leaving the soma in opposite directions.
        let t = TreeBuilder::new([0.0; 3])
            .branch("A", "root", &[("a1", [12.0, 0.0, 0.0])])
            .branch("B", "root", &[("b1", [-7.0, 0.0, 0.0])])
            .build();
        let p = sholl_crossings(&t, [1.0; 3], 5.0, 20.0).unwrap();
        assert_eq!(p.counts, vec![0, 2, 1, 0]);
    }

    #[test]
    fn radius_basis_matches_normalized_polynomial() {
        let normalized = [1.0, -2.0, 3.0, 0.5];
        let (r0, span) = (2.5, 20.0);
        let coeffs = to_radius_basis(&normalized, r0, span);
        for r in [2.5, 7.0, 13.3, 22.5] {
            assert_relative_eq!(
                horner(&coeffs, r),
                horner(&normalized, (r - r0) / span),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn fit_finds_interior_peak() {
        // Counts follow 30 - k^2 with k = (r - 22.5) / 5, an exact parabola.
        let radii: Vec<f64> = (0..10).map(|i| (i as f64 + 0.5) * 5.0).collect();
        let counts: Vec<u32> = (0..10i32).map(|i| (30 - (i - 4) * (i - 4)) as u32).collect();
        let fit = sholl_metrics(&ShollProfile { counts, radii }).expect("fit");
        assert_relative_eq!(fit.critical_radius, 22.5, epsilon = 1e-3);
        assert_relative_eq!(fit.max_value, 30.0, epsilon = 1e-6);
        assert_relative_eq!(fit.evaluate(fit.critical_radius), fit.max_value, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_profiles_have_no_fit() {
        assert!(sholl_metrics(&ShollProfile::default()).is_none());
        let flat = ShollProfile {
            counts: vec![0, 0, 0],
            radii: vec![2.5, 7.5, 12.5],
        };
        assert!(sholl_metrics(&flat).is_none());
        let single = ShollProfile {
            counts: vec![3],
            radii: vec![2.5],
        };
        assert!(sholl_metrics(&single).is_none());
    }
}
