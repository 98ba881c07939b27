// THEORY:
// The spectral contour model represents the larva boundary as a truncated
// Fourier series in x and y, treating the contour index as parametric time.
//
// 1.  **Decomposition** projects the raw boundary onto harmonics `0..N`. Each
//     harmonic holds four coefficients `(ax, bx, ay, by)`. Harmonic 0 is halved
//     after the general sum so that `(ax[0], ay[0])` is the shape centroid.
// 2.  **Reconstruction** synthesizes `M` points at evenly spaced angles over
//     `[-PI, PI)`. Because `M` does not depend on the contour length, this is at
//     once a low-pass filter and a deterministic resampler: every frame yields
//     the same number of smooth, evenly parameterized points.
//
// Reconstruction is a pure function of the coefficients. Visualization and
// packetization consumers call it standalone on stored coefficients, at any
// resolution, without re-decomposing.

use crate::core_modules::geometry::{PixelPoint, Point2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Fourier coefficients of one harmonic.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Harmonic {
    pub ax: f64,
    pub bx: f64,
    pub ay: f64,
    pub by: f64,
}

impl Harmonic {
    pub fn as_array(&self) -> [f64; 4] {
        [self.ax, self.bx, self.ay, self.by]
    }
}

/// `N` harmonics describing one closed contour.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectralModel {
    pub harmonics: Vec<Harmonic>,
}

impl SpectralModel {
    /// Decomposes a closed contour into `harmonics` Fourier harmonics. O(L·N).
    pub fn decompose(contour: &[PixelPoint], harmonics: usize) -> Self {
        let len = contour.len();
        let mut coefficients = vec![Harmonic::default(); harmonics];
        if len == 0 {
            return Self { harmonics: coefficients };
        }

        let norm = 2.0 / len as f64;
        for (i, h) in coefficients.iter_mut().enumerate() {
            for (j, p) in contour.iter().enumerate() {
                let phase = i as f64 * PI * j as f64 * 2.0 / len as f64;
                let (sin, cos) = phase.sin_cos();
                h.ax += p.x as f64 * cos;
                h.bx += p.x as f64 * sin;
                h.ay += p.y as f64 * cos;
                h.by += p.y as f64 * sin;
            }
            h.ax *= norm;
            h.bx *= norm;
            h.ay *= norm;
            h.by *= norm;
        }
        if let Some(h0) = coefficients.first_mut() {
            h0.ax /= 2.0;
            h0.ay /= 2.0;
        }

        Self { harmonics: coefficients }
    }

    pub fn len(&self) -> usize {
        self.harmonics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.harmonics.is_empty()
    }

    /// Shape centroid, the zeroth harmonic's cosine terms.
    pub fn centroid(&self) -> Point2 {
        self.harmonics
            .first()
            .map(|h| Point2::new(h.ax, h.ay))
            .unwrap_or_default()
    }

    /// Synthesizes `points` evenly spaced boundary points. See [`reconstruct`].
    pub fn reconstruct(&self, points: usize) -> Vec<Point2> {
        reconstruct(&self.harmonics, points)
    }

    /// Coefficients flattened as `ax0, bx0, ay0, by0, ax1, ...`.
    pub fn flatten(&self) -> Vec<f64> {
        self.harmonics.iter().flat_map(|h| h.as_array()).collect()
    }
}

/// Rebuilds a closed curve with `points` samples from stored coefficients.
///
/// Sample `j` sits at `theta = -PI + j * 2PI / points`. The same coefficients and
/// resolution always produce bit-identical output. O(N·M).
pub fn reconstruct(harmonics: &[Harmonic], points: usize) -> Vec<Point2> {
    let mut curve = vec![Point2::ZERO; points];
    if points == 0 {
        return curve;
    }

    let step = 2.0 * PI / points as f64;
    for (i, h) in harmonics.iter().enumerate() {
        for (j, p) in curve.iter_mut().enumerate() {
            let theta = -PI + j as f64 * step;
            let (sin, cos) = (i as f64 * theta).sin_cos();
            p.x += h.ax * cos + h.bx * sin;
            p.y += h.ay * cos + h.by * sin;
        }
    }
    curve
}
