// THEORY:
// Synthetic frames for tests, the demo runner and offline debugging. A larva is
// drawn as a dark tapered tube around a polyline spine on a bright background,
// the same contrast the tracker expects from a backlit arena. The tube is
// narrower towards the head than towards the tail so the head is the sharper
// end.

pub mod image_helper {
    use crate::core_modules::geometry::Point2;
    use image::{GrayImage, ImageEncoder, Luma};

    /// Builds a spine of `segments + 1` points starting at `head` and heading
    /// backwards against `heading` (radians), bending by `bend` radians in total.
    pub fn crawl_spine(head: Point2, heading: f64, length: f64, bend: f64, segments: usize) -> Vec<Point2> {
        let segments = segments.max(1);
        let step = length / segments as f64;
        let mut direction = heading + std::f64::consts::PI;
        let mut spine = Vec::with_capacity(segments + 1);
        let mut current = head;
        spine.push(current);
        for _ in 0..segments {
            current = current.add(Point2::new(direction.cos(), direction.sin()).scale(step));
            spine.push(current);
            direction += bend / segments as f64;
        }
        spine
    }

    /// Tube radius at fraction `t` of the spine from the head.
    fn radius(t: f64, half_width: f64) -> f64 {
        let body = (4.0 * t * (1.0 - t)).max(0.0).sqrt();
        (half_width * body * (0.6 + 0.4 * t)).max(1.0)
    }

    /// Renders a larva around `spine` (head first).
    pub fn render_larva(
        width: u32,
        height: u32,
        spine: &[Point2],
        half_width: f64,
        foreground: u8,
        background: u8,
    ) -> GrayImage {
        let mut image = GrayImage::from_pixel(width, height, Luma([background]));
        if spine.len() < 2 {
            return image;
        }

        let segment_count = (spine.len() - 1) as f64;
        for y in 0..height {
            for x in 0..width {
                let p = Point2::new(x as f64, y as f64);
                let inside = spine.windows(2).enumerate().any(|(i, w)| {
                    let (distance, along) = distance_to_segment(p, w[0], w[1]);
                    let t = (i as f64 + along) / segment_count;
                    distance <= radius(t, half_width)
                });
                if inside {
                    image.put_pixel(x, y, Luma([foreground]));
                }
            }
        }
        image
    }

    /// Distance from `p` to segment `a-b` and the clamped position along it.
    fn distance_to_segment(p: Point2, a: Point2, b: Point2) -> (f64, f64) {
        let ab = b.sub(a);
        let len2 = ab.x * ab.x + ab.y * ab.y;
        let along = if len2 > 0.0 {
            let ap = p.sub(a);
            ((ap.x * ab.x + ap.y * ab.y) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (p.distance(a.add(ab.scale(along))), along)
    }

    /// Writes a grayscale frame as PNG.
    pub fn save(path: &std::path::Path, image: &GrayImage) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::image_helper::*;
    use crate::core_modules::geometry::Point2;

    #[test]
    fn straight_spine_has_requested_length() {
        let spine = crawl_spine(Point2::new(100.0, 50.0), 0.0, 60.0, 0.0, 12);
        assert_eq!(spine.len(), 13);
        assert!((spine[12].x - 40.0).abs() < 1e-9);
        assert!((spine[12].y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn larva_is_dark_on_bright_background() {
        let spine = crawl_spine(Point2::new(110.0, 60.0), 0.0, 70.0, 0.4, 14);
        let frame = render_larva(160, 120, &spine, 8.0, 20, 220);
        let dark = frame.pixels().filter(|p| p[0] == 20).count();
        assert!(dark > 300, "too few larva pixels: {dark}");
        assert_eq!(frame.get_pixel(0, 0)[0], 220);
        assert_eq!(frame.get_pixel(75, 60)[0], 20);
    }

    #[test]
    fn head_end_is_narrower_than_tail_end() {
        let spine = crawl_spine(Point2::new(120.0, 60.0), 0.0, 80.0, 0.0, 16);
        let frame = render_larva(160, 120, &spine, 10.0, 20, 220);
        let column_height = |x: u32| (0..120).filter(|&y| frame.get_pixel(x, y)[0] == 20).count();
        // 15% in from each end.
        assert!(column_height(108) < column_height(52));
    }

    #[test]
    fn save_gray_file() {
        let spine = crawl_spine(Point2::new(50.0, 25.0), 0.0, 30.0, 0.0, 6);
        let frame = render_larva(64, 48, &spine, 5.0, 20, 220);
        let path = std::env::temp_dir().join("larva_vision_image_helper.png");

        save(&path, &frame).expect("Error Saving File.");
        let reloaded = image::open(&path).expect("readable png").to_luma8();
        assert_eq!(reloaded, frame);
        let _ = std::fs::remove_file(path);
    }
}
