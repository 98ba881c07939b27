// THEORY:
// The contour extractor turns the binary silhouette mask into the single closed
// boundary that the rest of the pipeline models. It is a stateless utility:
//
// 1.  **Border following**: `imageproc`'s Suzuki-Abe border follower lists every
//     border in the mask. Only outermost outer borders (no parent) are kept,
//     which matches external-only retrieval. Holes and anything nested inside
//     the silhouette are ignored.
// 2.  **Selection by perimeter**: of the remaining borders, the one with the
//     largest perimeter (open polyline length) is the larva. Perimeter, not area,
//     favours the long thin animal over compact debris of similar area.
// 3.  **Orientation**: the selected boundary is reversed if needed so that its
//     shoelace sum is negative in image coordinates. The curvature analyzer
//     depends on this: with this orientation convex extremities give small
//     angles and the flanks give angles near PI.
//
// An empty mask yields `None`, which the tracker reports as "no detection".

use crate::core_modules::geometry::{BoundingBox, PixelPoint};
use serde::{Deserialize, Serialize};

/// An ordered closed boundary of integer pixel points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<PixelPoint>,
}

impl Contour {
    pub fn new(points: Vec<PixelPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Length of the boundary walked as an open polyline (no closing segment).
    pub fn perimeter(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].to_point2().distance(w[1].to_point2()))
            .sum()
    }

    /// Twice the signed shoelace area, closing segment included.
    pub fn signed_area_x2(&self) -> i64 {
        let n = self.points.len();
        (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.points)
    }

    /// Reverses the traversal if needed so the shoelace sum is not positive.
    pub fn normalize_orientation(&mut self) {
        if self.signed_area_x2() > 0 {
            self.points.reverse();
        }
    }
}

pub mod contour_extractor {
    use super::*;
    use image::GrayImage;
    use imageproc::contours::{find_contours, BorderType};

    /// Result of scanning one mask: the chosen contour and how many external
    /// contours competed for it.
    #[derive(Debug, Clone)]
    pub struct Extraction {
        pub contour: Contour,
        pub perimeter: f64,
        pub candidates: usize,
    }

    /// Lists the outermost outer borders of a binary mask (non-zero = foreground).
    pub fn external_contours(mask: &GrayImage) -> Vec<Contour> {
        find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .map(|c| Contour::new(c.points.into_iter().map(|p| PixelPoint::new(p.x, p.y)).collect()))
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Picks the external contour with the largest perimeter. Later contours win
    /// ties. Returns `None` when the mask holds no foreground.
    pub fn select_largest_perimeter(contours: Vec<Contour>) -> Option<Extraction> {
        let candidates = contours.len();
        let mut best: Option<(Contour, f64)> = None;
        for contour in contours {
            let perimeter = contour.perimeter();
            match &best {
                Some((_, best_len)) if perimeter < *best_len => {}
                _ => best = Some((contour, perimeter)),
            }
        }

        best.map(|(mut contour, perimeter)| {
            contour.normalize_orientation();
            Extraction {
                contour,
                perimeter,
                candidates,
            }
        })
    }

    /// Extracts the larva silhouette from an inverted binary mask.
    pub fn extract(mask: &GrayImage) -> Option<Extraction> {
        select_largest_perimeter(external_contours(mask))
    }
}
