// THEORY:
// The threshold estimator runs on each frame until one shows a silhouette, and
// hands the tracker the intensity that best separates the dark larva from the
// bright backlight. It is Otsu's method in its within-group-variance form:
//
// 1.  **Histogram**: count every intensity and normalize by the pixel count, so
//     the result depends only on the shape of the histogram, never its scale.
// 2.  **Exhaustive search**: every candidate `t` splits the bins into a low group
//     `[0, t)` and a high group `[t, 256)`. Candidates that leave either group
//     empty are skipped.
// 3.  **Selection**: the candidate with the smallest mass-weighted sum of the two
//     within-group variances wins. Ties go to the lowest candidate.
//
// The search is O(256²) over the histogram and independent of frame size after
// the counting pass. The tracker freezes the result; illumination drift over a
// long session is not tracked.

pub mod otsu {
    pub const BINS: usize = 256;

    /// Computes the Otsu threshold of an 8-bit pixel buffer.
    pub fn threshold(pixels: &[u8]) -> u8 {
        let mut counts = [0u64; BINS];
        for &p in pixels {
            counts[p as usize] += 1;
        }
        threshold_from_histogram(&counts)
    }

    /// Computes the Otsu threshold from raw bin counts.
    ///
    /// An empty or single-valued histogram has no valid split and yields 0.
    pub fn threshold_from_histogram(counts: &[u64; BINS]) -> u8 {
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return 0;
        }
        let hist: Vec<f64> = counts.iter().map(|&c| c as f64 / total as f64).collect();

        let mut best: Option<(usize, f64)> = None;
        for t in 0..BINS {
            let Some(sigma) = within_group_variance(&hist, t) else {
                continue;
            };
            match best {
                Some((_, best_sigma)) if sigma >= best_sigma => {}
                _ => best = Some((t, sigma)),
            }
        }

        best.map(|(t, _)| t as u8).unwrap_or(0)
    }

    /// Weighted sum of within-group variances for the split at `t`, or `None`
    /// when one of the groups carries no mass.
    pub(crate) fn within_group_variance(hist: &[f64], t: usize) -> Option<f64> {
        let (low, high) = hist.split_at(t);
        let q1: f64 = low.iter().sum();
        let q2: f64 = high.iter().sum();
        if q1 == 0.0 || q2 == 0.0 {
            return None;
        }

        let (u1, s1) = group_moments(low, 0, q1);
        let (u2, s2) = group_moments(high, t, q2);
        debug_assert!(u1 <= u2);
        Some(q1 * s1 + q2 * s2)
    }

    /// Mean and variance of one group of bins starting at intensity `offset`.
    fn group_moments(bins: &[f64], offset: usize, mass: f64) -> (f64, f64) {
        let mean: f64 = bins
            .iter()
            .enumerate()
            .map(|(i, &h)| (offset + i) as f64 * h / mass)
            .sum();
        let variance: f64 = bins
            .iter()
            .enumerate()
            .map(|(i, &h)| ((offset + i) as f64 - mean).powi(2) * h / mass)
            .sum();
        (mean, variance)
    }
}
