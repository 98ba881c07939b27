// THEORY:
// The skeleton is the larva's midline, built directly from the reconstructed
// contour once head and tail are known. Both are points of that contour, so the
// boundary splits into two sides between them:
//
// 1.  **Two walks**: clockwise (increasing index) and counter-clockwise
//     (decreasing index) from head to tail. The side lengths in points usually
//     differ because the animal bends.
// 2.  **Paired resampling**: each side is sampled at `K` positions spread evenly
//     over its own length, first sample on the head and last on the tail. The
//     midpoint of each pair is one skeleton point, so the skeleton runs
//     monotonically from head (index 0) to tail (index K-1).
// 3.  **Derived measures**: total length, the neck (first point after the head
//     strictly past a fraction of the length) and a secant bearing through two
//     fixed points near the tail end.
//
// A least-squares line fit over the posterior skeleton was tried as an
// alternative to the secant and is not used.

use crate::core_modules::geometry::{wrap_index, Point2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Sampling and landmark parameters for skeleton extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonParams {
    /// Number of skeleton points `K`.
    pub points: usize,
    /// Fraction of the skeleton length from the head that defines the neck.
    pub neck_percentage: f64,
    /// The secant starts `secant_offset` points before the end of the skeleton...
    pub secant_offset: usize,
    /// ...and reaches back `secant_span` points towards the head.
    pub secant_span: usize,
}

impl Default for SkeletonParams {
    fn default() -> Self {
        Self {
            points: 500,
            neck_percentage: 0.5,
            secant_offset: 25,
            secant_span: 75,
        }
    }
}

/// Midline of one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Skeleton {
    pub points: Vec<Point2>,
    pub length: f64,
    pub neck_index: usize,
    pub neck: Point2,
    /// Secant bearing near the tail end, radians.
    pub secant_bearing: f64,
}

/// Builds the skeleton between contour indices `head` and `tail`.
///
/// `params.points` must be at least 2 and `secant_offset + secant_span` must not
/// exceed it; the tracker validates both at construction.
pub fn extract(contour: &[Point2], head: usize, tail: usize, params: &SkeletonParams) -> Skeleton {
    let m = contour.len();
    let k_total = params.points;
    if m == 0 || k_total < 2 {
        return Skeleton::default();
    }

    let len_cw = wrap_index(tail as isize - head as isize, m);
    let len_ccw = wrap_index(head as isize - tail as isize, m);
    let last = k_total - 1;

    let points: Vec<Point2> = (0..k_total)
        .map(|k| {
            let step_cw = k * len_cw / last;
            let step_ccw = k * len_ccw / last;
            let cw = contour[(head + step_cw) % m];
            let ccw = contour[wrap_index(head as isize - step_ccw as isize, m)];
            cw.midpoint(ccw)
        })
        .collect();

    let cumulative = cumulative_lengths(&points);
    let length = cumulative[last];
    let neck_index = neck_index(&cumulative, params.neck_percentage);
    let secant_bearing = secant_bearing(&points, params.secant_offset, params.secant_span);

    Skeleton {
        neck: points[neck_index],
        points,
        length,
        neck_index,
        secant_bearing,
    }
}

/// Running arc length from the first point; `out[0] == 0`.
pub fn cumulative_lengths(points: &[Point2]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut run = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            run += points[i - 1].distance(*p);
        }
        out.push(run);
    }
    out
}

/// First index after the head whose cumulative length exceeds `fraction` of the
/// total. Falls back to the tail when none does (zero length, or `fraction` 1).
fn neck_index(cumulative: &[f64], fraction: f64) -> usize {
    let total = cumulative.last().copied().unwrap_or(0.0);
    let target = fraction * total;
    cumulative
        .iter()
        .skip(1)
        .position(|&c| c > target)
        .map(|i| i + 1)
        .unwrap_or(cumulative.len().saturating_sub(1))
}

/// Two-point bearing through `points[K - offset]` and `points[K - offset - span]`,
/// pointing towards the tail.
fn secant_bearing(points: &[Point2], offset: usize, span: usize) -> f64 {
    let k = points.len();
    let (Some(start), Some(back)) = (k.checked_sub(offset), k.checked_sub(offset + span)) else {
        return 0.0;
    };
    match (points.get(start), points.get(back)) {
        (Some(a), Some(b)) => a.sub(*b).angle(),
        _ => 0.0,
    }
}

/// Backward triangular-weighted derivative of the secant bearing, in rad/s.
///
/// `bearings[0]` is the current bearing and `bearings[k]` the one `k` frames
/// back; `window + 1` entries are needed, otherwise the result is 0. Successive
/// bearings that straddle the +/-PI boundary are unwrapped before differencing.
/// The weighted sum is halved.
pub fn bearing_derivative(bearings: &[f64], window: usize, dt: f64) -> f64 {
    if window == 0 || bearings.len() < window + 1 || dt <= 0.0 {
        return 0.0;
    }
    let norm = (window * (window + 1) / 2) as f64;

    let accumulator: f64 = (0..window)
        .map(|k| {
            let current = bearings[k];
            let previous = bearings[k + 1];
            let delta = if current > FRAC_PI_2 && previous < -FRAC_PI_2 {
                current - (previous + 2.0 * PI)
            } else if current < -FRAC_PI_2 && previous > FRAC_PI_2 {
                current - (previous - 2.0 * PI)
            } else {
                current - previous
            };
            delta / dt * (window - k) as f64 / norm
        })
        .sum();

    accumulator / 2.0
}
