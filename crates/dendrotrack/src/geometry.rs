//! Small 3D vector helpers shared by the tree model and the analyses.
//!
//! Everything here works on plain `[f64; 3]` triples so that pixel and world
//! coordinates can flow through without conversion.

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    norm(sub(a, b))
}

/// Componentwise `a + b`.
#[inline]
pub fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Componentwise `a - b`.
#[inline]
pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Componentwise product, used for pixel → world scaling.
#[inline]
pub fn mul(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2]]
}

/// Multiply every component by `k`.
#[inline]
pub fn scale(a: [f64; 3], k: f64) -> [f64; 3] {
    [a[0] * k, a[1] * k, a[2] * k]
}

#[inline]
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Clamp each component of `v` into `[lo[i], hi[i]]`.
pub fn snap_to_range(v: [f64; 3], lo: [f64; 3], hi: [f64; 3]) -> [f64; 3] {
    let mut out = v;
    for i in 0..3 {
        out[i] = v[i].max(lo[i]).min(hi[i]);
    }
    out
}

/// Unit vector pointing from `from` to `to`.
///
/// Coincident points give the zero vector.
pub fn normalized_delta(from: [f64; 3], to: [f64; 3]) -> [f64; 3] {
    let d = sub(to, from);
    let n = norm(d);
    if n < 1e-12 {
        [0.0; 3]
    } else {
        scale(d, 1.0 / n)
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`.
///
/// Falls back to the point distance when `a == b`.
pub fn distance_to_line(p: [f64; 3], a: [f64; 3], b: [f64; 3]) -> f64 {
    let ab = sub(b, a);
    let len_sq = dot(ab, ab);
    if len_sq < 1e-24 {
        return distance(p, a);
    }
    let ap = sub(p, a);
    let t = dot(ap, ab) / len_sq;
    distance(p, add(a, scale(ab, t)))
}

/// Ramer–Douglas–Peucker simplification of a 3D polyline.
///
/// Returns the indices of the retained points, always including both
/// endpoints. Interior points are kept only where the polyline deviates from
/// the endpoint chord by more than `epsilon`.
pub fn simplify_rdp_indices(points: &[[f64; 3]], epsilon: f64) -> Vec<usize> {
    match points.len() {
        0 => return Vec::new(),
        1 => return vec![0],
        _ => {}
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    // Explicit stack of [start, end] spans; long traced branches would
    // otherwise recurse one frame per point.
    let mut spans = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = spans.pop() {
        if end <= start + 1 {
            continue;
        }
        let (mut worst_idx, mut worst_dist) = (start, -1.0f64);
        for (i, &p) in points.iter().enumerate().take(end).skip(start + 1) {
            let d = distance_to_line(p, points[start], points[end]);
            if d > worst_dist {
                worst_dist = d;
                worst_idx = i;
            }
        }
        if worst_dist > epsilon {
            keep[worst_idx] = true;
            spans.push((start, worst_idx));
            spans.push((worst_idx, end));
        }
    }

    keep.iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect()
}

/// Ramer–Douglas–Peucker simplification returning the retained points.
pub fn simplify_rdp(points: &[[f64; 3]], epsilon: f64) -> Vec<[f64; 3]> {
    simplify_rdp_indices(points, epsilon)
        .into_iter()
        .map(|i| points[i])
        .collect()
}
