// THEORY:
// Curvature here is a chord angle, not a differential quantity. For each point of
// the reconstructed contour we look `d` samples ahead and `d` samples behind and
// take the angle between the two chords, wrapped into `[0, 2PI)`. With the
// contour orientation fixed by the extractor, a sharp convex tip (head or tail)
// gives a small angle, a straight flank gives roughly PI and a concave bend gives
// more than PI. Indices wrap around the closed curve.

use crate::core_modules::geometry::{wrap_index, Point2};
use std::f64::consts::PI;

/// Default look-ahead/behind distance for an `m`-point contour.
pub fn default_distance(points: usize) -> usize {
    points / 8
}

/// Computes the chord-angle curvature profile of a closed curve.
///
/// The returned profile is index-aligned with `contour`.
pub fn profile(contour: &[Point2], distance: usize) -> Vec<f64> {
    let m = contour.len();
    let d = distance as isize;
    (0..m)
        .map(|i| {
            let p = contour[i];
            let ahead = contour[wrap_index(i as isize + d, m)].sub(p);
            let behind = contour[wrap_index(i as isize - d, m)].sub(p);
            let mut angle = ahead.angle() - behind.angle();
            if angle < 0.0 {
                angle += 2.0 * PI;
            }
            angle
        })
        .collect()
}
