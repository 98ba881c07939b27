use approx::assert_abs_diff_eq;
use image::{GrayImage, Luma};
use larva_vision::core_modules::geometry::Point2;
use larva_vision::core_modules::utils::image_helper::image_helper::{crawl_spine, render_larva};
use larva_vision::{reconstruct, Frame, FrameReport, StageCalibration, StageResolver, Tracker, TrackerConfig};

const W: u32 = 200;
const H: u32 = 140;

fn session(history_capacity: usize) -> Tracker<StageResolver> {
    let config = TrackerConfig {
        image_width: W,
        image_height: H,
        history_capacity,
        bearing_window: 4,
        ..TrackerConfig::default()
    };
    Tracker::new(config, StageResolver::fixed(StageCalibration::default())).expect("valid config")
}

fn larva(head: Point2, bend: f64) -> GrayImage {
    let spine = crawl_spine(head, 0.0, 80.0, bend, 16);
    render_larva(W, H, &spine, 9.0, 20, 220)
}

#[test]
fn head_identity_is_stable_while_the_body_swings() {
    let mut tracker = session(128);
    let mut head_on_right = None;
    for i in 0..40u64 {
        let bend = 0.6 * (i as f64 * 0.3).sin();
        let image = larva(Point2::new(130.0 + i as f64, 70.0), bend);
        let report = tracker
            .process_frame(&Frame::from_gray_image(&image, i, 33))
            .expect("frame");
        let record = report.record().expect("larva visible");

        let right = record.head.x > record.tail.x;
        assert_eq!(*head_on_right.get_or_insert(right), right, "labels swapped at frame {i}");
        assert!(record.head.distance(record.tail) > 40.0);
    }
    let votes = tracker.votes();
    assert_eq!(votes.no_flip + votes.flip, 40);
}

#[test]
fn skipped_frames_do_not_advance_the_sequence() {
    let mut tracker = session(128);
    let blank = GrayImage::from_pixel(W, H, Luma([220]));
    let mut sequences = Vec::new();
    for i in 0..10u64 {
        let image = if i % 3 == 2 { blank.clone() } else { larva(Point2::new(140.0, 70.0), 0.2) };
        match tracker
            .process_frame(&Frame::from_gray_image(&image, i, 33))
            .expect("frame")
        {
            FrameReport::Detected(record) => sequences.push((record.sequence, record.frame_index)),
            FrameReport::NoDetection => {}
        }
    }
    assert_eq!(
        sequences,
        vec![(0, 0), (1, 1), (2, 3), (3, 4), (4, 6), (5, 7), (6, 9)]
    );
    assert_eq!(tracker.analysed_frames(), 7);
}

#[test]
fn history_keeps_only_the_newest_records() {
    let mut tracker = session(8);
    for i in 0..20u64 {
        let image = larva(Point2::new(120.0 + i as f64, 70.0), 0.0);
        tracker
            .process_frame(&Frame::from_gray_image(&image, i, 33))
            .expect("frame");
    }
    let history = tracker.history();
    assert_eq!(history.capacity(), 8);
    assert_eq!(history.len(), 8);
    assert!(history.get(11).is_none());
    assert_eq!(history.get(12).map(|r| r.frame_index), Some(12));
    assert_eq!(tracker.latest().map(|r| r.sequence), Some(19));
}

#[test]
fn stored_coefficients_reproduce_the_tracked_contour() {
    let mut tracker = session(16);
    let image = larva(Point2::new(140.0, 70.0), 0.4);
    tracker
        .process_frame(&Frame::from_gray_image(&image, 0, 33))
        .expect("frame");
    let record = tracker.latest().expect("detected").clone();

    let replayed = reconstruct(&record.spectral.harmonics, tracker.config().fit_resolution);
    assert_eq!(replayed.as_slice(), tracker.reconstruction());
    assert_eq!(replayed[record.head_index], record.head);
    assert_eq!(replayed[record.tail_index], record.tail);

    // The centroid term sits inside the silhouette's bounding box.
    let bbox = record.bounding_box;
    assert!(record.centroid.x > bbox.min.x as f64 && record.centroid.x < bbox.max.x as f64);
    assert_abs_diff_eq!(record.centroid.x, replayed.iter().map(|p| p.x).sum::<f64>() / replayed.len() as f64, epsilon = 1e-6);
}
