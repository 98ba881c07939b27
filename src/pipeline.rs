// THEORY:
// The `pipeline` module is the top-level API of the posture engine. A `Tracker`
// owns one tracking session and turns each captured frame into a
// `HistoryRecord`, running the stages in a fixed order:
//
// 1.  **Threshold** (recomputed until the first frame with a silhouette, then
//     frozen) and inverted binarization.
// 2.  **Silhouette**: largest-perimeter external contour. No contour means
//     `FrameReport::NoDetection` and nothing else happens.
// 3.  **Spectral model**: decompose, then reconstruct at a fixed resolution.
// 4.  **Curvature** profile and **head/tail** identity by proximity and votes.
// 5.  **Skeleton**, neck and secant bearing, plus the bearing's smoothed rate.
// 6.  **Body angles** and **kinematics** against the session history.
//
// All session state (threshold, identity votes, history, arena track) lives on
// the `Tracker` and is mutated only inside `process_frame`. A record becomes
// visible to readers once the call returns. Failure inside a frame is never
// fatal; the only errors are contract violations detected before any state is
// touched.

use crate::core_modules::body_angles::BodyAngles;
use crate::core_modules::contour::contour_extractor;
use crate::core_modules::curvature;
use crate::core_modules::frame::Frame;
use crate::core_modules::geometry::Point2;
use crate::core_modules::head_tail::HeadTailClassifier;
use crate::core_modules::history::{ArenaTrack, HistoryBuffer, HistoryRecord, StageClock, StageTimings};
use crate::core_modules::kinematics;
use crate::core_modules::skeleton::{self, Skeleton, SkeletonParams};
use crate::core_modules::spectral::SpectralModel;
use crate::core_modules::threshold::otsu;
use crate::core_modules::world::{to_world, WorldPositionResolver};
use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

// Re-export key data structures for the public API.
pub use crate::core_modules::head_tail::{AnatomicalPoints, Assignment, Votes};
pub use crate::core_modules::report::{data_legend, WorldSummary};

/// Configuration for a tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub image_width: u32,
    pub image_height: u32,
    /// Number of Fourier harmonics `N`, the centroid term included.
    pub harmonics: usize,
    /// Points in the reconstructed contour `M`.
    pub fit_resolution: usize,
    /// Chord look-ahead/behind for the curvature profile, in contour points.
    pub curvature_distance: usize,
    /// Half-width of the window blanked around the first extremity.
    pub suppression_window: usize,
    pub skeleton: SkeletonParams,
    /// Frames of history kept; fixed for the session.
    pub history_capacity: usize,
    pub head_velocity_step: usize,
    pub tail_velocity_step: usize,
    /// Window of the smoothed secant bearing derivative, in frames.
    pub bearing_window: usize,
    pub arena_track_interval: usize,
    pub arena_track_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let fit_resolution = 200;
        Self {
            image_width: 640,
            image_height: 480,
            harmonics: 7,
            fit_resolution,
            curvature_distance: curvature::default_distance(fit_resolution),
            suppression_window: fit_resolution / 8,
            skeleton: SkeletonParams::default(),
            history_capacity: 2000,
            head_velocity_step: 1,
            tail_velocity_step: 1,
            bearing_window: 30,
            arena_track_interval: 30,
            arena_track_capacity: 36_000,
        }
    }
}

impl TrackerConfig {
    /// Rejects configurations that cannot describe a session.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(TrackerError::InvalidConfig(msg));

        if self.image_width == 0 || self.image_height == 0 {
            return invalid(format!("image size {}x{} is empty", self.image_width, self.image_height));
        }
        if self.harmonics == 0 {
            return invalid("harmonics must be at least 1".into());
        }
        if self.fit_resolution < 8 {
            return invalid(format!("fit_resolution {} is below 8", self.fit_resolution));
        }
        if self.curvature_distance == 0 || self.curvature_distance >= self.fit_resolution {
            return invalid(format!(
                "curvature_distance {} must be in 1..{}",
                self.curvature_distance, self.fit_resolution
            ));
        }
        if self.suppression_window == 0 || 2 * self.suppression_window >= self.fit_resolution {
            return invalid(format!(
                "suppression_window {} leaves no room for a second extremity in {} points",
                self.suppression_window, self.fit_resolution
            ));
        }
        let sk = &self.skeleton;
        if sk.points < 2 {
            return invalid(format!("skeleton points {} is below 2", sk.points));
        }
        if sk.secant_offset == 0 || sk.secant_offset + sk.secant_span > sk.points {
            return invalid(format!(
                "secant offset {} and span {} do not fit in {} skeleton points",
                sk.secant_offset, sk.secant_span, sk.points
            ));
        }
        if !(0.0..=1.0).contains(&sk.neck_percentage) {
            return invalid(format!("neck_percentage {} is outside [0, 1]", sk.neck_percentage));
        }
        if self.history_capacity == 0 {
            return invalid("history_capacity must be positive".into());
        }
        for (name, step) in [
            ("head_velocity_step", self.head_velocity_step),
            ("tail_velocity_step", self.tail_velocity_step),
            ("bearing_window", self.bearing_window),
        ] {
            if step == 0 || step >= self.history_capacity {
                return invalid(format!("{name} {step} must be in 1..{}", self.history_capacity));
            }
        }
        if self.arena_track_interval == 0 || self.arena_track_capacity == 0 {
            return invalid("arena track interval and capacity must be positive".into());
        }
        Ok(())
    }
}

/// The outcome of processing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameReport {
    /// The frame held no silhouette; session state is unchanged.
    NoDetection,
    Detected(Box<HistoryRecord>),
}

impl FrameReport {
    pub fn record(&self) -> Option<&HistoryRecord> {
        match self {
            FrameReport::Detected(record) => Some(record),
            FrameReport::NoDetection => None,
        }
    }
}

/// One tracking session.
pub struct Tracker<R: WorldPositionResolver> {
    config: TrackerConfig,
    resolver: R,
    threshold: Option<u8>,
    classifier: HeadTailClassifier,
    history: HistoryBuffer<HistoryRecord>,
    arena_track: ArenaTrack,
    /// Sequence number the next detected frame will receive.
    next_sequence: u64,
    reconstruction: Vec<Point2>,
    skeleton: Skeleton,
}

impl<R: WorldPositionResolver> Tracker<R> {
    pub fn new(config: TrackerConfig, resolver: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            history: HistoryBuffer::new(config.history_capacity),
            arena_track: ArenaTrack::new(config.arena_track_interval, config.arena_track_capacity),
            config,
            resolver,
            threshold: None,
            classifier: HeadTailClassifier::new(),
            next_sequence: 0,
            reconstruction: Vec::new(),
            skeleton: Skeleton::default(),
        })
    }

    /// Analyses one frame.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameReport> {
        self.check_frame(frame)?;
        let mut timings = StageTimings::default();
        let mut clock = StageClock::start();

        // A frame without a silhouette must not fix the session's threshold.
        let threshold = self.threshold.unwrap_or_else(|| otsu::threshold(frame.pixels));
        let Some(mask) = frame.binarize_inverted(threshold) else {
            return Err(self.size_mismatch(frame));
        };
        timings.binarize = clock.lap();

        let Some(extraction) = contour_extractor::extract(&mask) else {
            debug!(frame = frame.index, threshold, "no contour detected");
            return Ok(FrameReport::NoDetection);
        };
        timings.contours = clock.lap();
        if self.threshold.is_none() {
            info!(threshold, frame = frame.index, "threshold frozen for session");
            self.threshold = Some(threshold);
        }

        let cfg = &self.config;
        let spectral = SpectralModel::decompose(&extraction.contour.points, cfg.harmonics);
        timings.decompose = clock.lap();
        let reconstruction = spectral.reconstruct(cfg.fit_resolution);
        timings.reconstruct = clock.lap();
        let profile = curvature::profile(&reconstruction, cfg.curvature_distance);
        timings.curvature = clock.lap();

        let Some(classification) = self
            .classifier
            .classify(&reconstruction, &profile, cfg.suppression_window)
        else {
            debug!(frame = frame.index, "empty reconstruction");
            return Ok(FrameReport::NoDetection);
        };
        timings.head_tail = clock.lap();

        let AnatomicalPoints { head, tail } = classification.anatomy;
        let skeleton = skeleton::extract(&reconstruction, head.index, tail.index, &cfg.skeleton);
        timings.skeleton = clock.lap();

        let angles = BodyAngles::compute(head.point, skeleton.neck, tail.point);
        let sequence = self.next_sequence;
        let secant_bearing_rate = self.secant_bearing_rate(sequence, skeleton.secant_bearing, frame.interval_ms);
        timings.angles = clock.lap();

        let stage_offset_mm = self.resolver.stage_offset_mm();
        let mm_per_pixel = self.resolver.mm_per_pixel();
        let head_kinematics = kinematics::estimate(
            sequence,
            cfg.head_velocity_step,
            frame.interval_ms,
            to_world(head.point, mm_per_pixel, stage_offset_mm),
            |past| self.history.get(past).map(|r| r.to_world(r.head, mm_per_pixel)),
        );
        let tail_kinematics = kinematics::estimate(
            sequence,
            cfg.tail_velocity_step,
            frame.interval_ms,
            to_world(tail.point, mm_per_pixel, stage_offset_mm),
            |past| self.history.get(past).map(|r| r.to_world(r.tail, mm_per_pixel)),
        );
        timings.kinematics = clock.lap();

        let centroid = spectral.centroid();
        let bounding_box = extraction.contour.bounding_box().unwrap_or_default();
        let record = HistoryRecord {
            sequence,
            frame_index: frame.index,
            sample_time_ms: frame.sample_time_ms(),
            interval_ms: frame.interval_ms,
            threshold,
            contour: extraction.contour,
            bounding_box,
            spectral,
            centroid,
            head: head.point,
            neck: skeleton.neck,
            tail: tail.point,
            head_index: head.index,
            tail_index: tail.index,
            skeleton_length: skeleton.length,
            angles,
            secant_bearing: skeleton.secant_bearing,
            secant_bearing_rate,
            head_kinematics,
            tail_kinematics,
            stage_offset_mm,
            votes: classification.votes,
            assignment: classification.assignment,
            degenerate: classification.degenerate,
            timings,
        };

        self.arena_track
            .observe(sequence, to_world(centroid, mm_per_pixel, stage_offset_mm));
        self.history.insert(sequence, record.clone());
        self.next_sequence += 1;
        self.reconstruction = reconstruction;
        self.skeleton = skeleton;

        trace!(
            sequence,
            binarize_us = timings.binarize.as_micros() as u64,
            contours_us = timings.contours.as_micros() as u64,
            spectral_us = (timings.decompose + timings.reconstruct).as_micros() as u64,
            curvature_us = timings.curvature.as_micros() as u64,
            head_tail_us = timings.head_tail.as_micros() as u64,
            skeleton_us = timings.skeleton.as_micros() as u64,
            total_us = timings.total().as_micros() as u64,
            "stage timings"
        );
        debug!(
            sequence,
            frame = frame.index,
            candidates = extraction.candidates,
            head_x = record.head.x,
            head_y = record.head.y,
            length = record.skeleton_length,
            no_flip = record.votes.no_flip,
            flip = record.votes.flip,
            "frame analysed"
        );

        Ok(FrameReport::Detected(Box::new(record)))
    }

    fn check_frame(&self, frame: &Frame) -> Result<()> {
        if frame.interval_ms == 0 {
            return Err(TrackerError::InvalidFrameInterval(frame.interval_ms));
        }
        let expected = self.config.image_width as usize * self.config.image_height as usize;
        if frame.width != self.config.image_width
            || frame.height != self.config.image_height
            || frame.pixels.len() != expected
        {
            return Err(self.size_mismatch(frame));
        }
        Ok(())
    }

    fn size_mismatch(&self, frame: &Frame) -> TrackerError {
        TrackerError::FrameSizeMismatch {
            width: self.config.image_width,
            height: self.config.image_height,
            expected: self.config.image_width as usize * self.config.image_height as usize,
            got: frame.pixels.len(),
        }
    }

    /// Smoothed secant bearing rate for the frame at `sequence`, 0 until more
    /// than `bearing_window` frames precede it.
    fn secant_bearing_rate(&self, sequence: u64, current: f64, interval_ms: u32) -> f64 {
        let window = self.config.bearing_window;
        if sequence <= window as u64 {
            return 0.0;
        }
        let mut bearings = Vec::with_capacity(window + 1);
        bearings.push(current);
        for k in 1..=window as u64 {
            match self.history.get(sequence - k) {
                Some(record) => bearings.push(record.secant_bearing),
                None => return 0.0,
            }
        }
        skeleton::bearing_derivative(&bearings, window, interval_ms as f64 / 1000.0)
    }

    /// Zeroes the head/tail vote counters. Master points and history are kept.
    pub fn reset_votes(&mut self) {
        info!(votes = ?self.classifier.votes(), "head/tail votes reset");
        self.classifier.reset_votes();
    }

    /// Starts a new session: unfreezes the threshold and forgets identity,
    /// votes, history and the arena track. Buffers keep their allocation.
    pub fn reset_session(&mut self) {
        info!(analysed = self.next_sequence, "session reset");
        self.threshold = None;
        self.classifier.reset();
        self.history.clear();
        self.arena_track.clear();
        self.next_sequence = 0;
        self.reconstruction.clear();
        self.skeleton = Skeleton::default();
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The frozen threshold, once a frame with a silhouette has been seen.
    pub fn threshold(&self) -> Option<u8> {
        self.threshold
    }

    /// Number of frames analysed in this session.
    pub fn analysed_frames(&self) -> u64 {
        self.next_sequence
    }

    pub fn votes(&self) -> Votes {
        self.classifier.votes()
    }

    pub fn history(&self) -> &HistoryBuffer<HistoryRecord> {
        &self.history
    }

    pub fn latest(&self) -> Option<&HistoryRecord> {
        self.history.latest()
    }

    pub fn arena_track(&self) -> &ArenaTrack {
        &self.arena_track
    }

    /// Reconstructed contour of the latest analysed frame.
    pub fn reconstruction(&self) -> &[Point2] {
        &self.reconstruction
    }

    /// Skeleton of the latest analysed frame.
    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    /// World summary of the latest analysed frame.
    pub fn latest_world_summary(&self) -> Option<WorldSummary> {
        let mm_per_pixel = self.resolver.mm_per_pixel();
        self.latest().map(|r| r.world_summary(mm_per_pixel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::utils::image_helper::image_helper::{crawl_spine, render_larva};
    use crate::core_modules::world::{StageCalibration, StageResolver};
    use approx::assert_abs_diff_eq;
    use image::GrayImage;

    const W: u32 = 160;
    const H: u32 = 120;

    fn config() -> TrackerConfig {
        TrackerConfig {
            image_width: W,
            image_height: H,
            history_capacity: 64,
            bearing_window: 5,
            arena_track_interval: 2,
            arena_track_capacity: 8,
            ..TrackerConfig::default()
        }
    }

    fn tracker() -> Tracker<StageResolver> {
        Tracker::new(config(), StageResolver::fixed(StageCalibration::default())).expect("valid config")
    }

    fn larva(head_x: f64) -> GrayImage {
        let spine = crawl_spine(Point2::new(head_x, 60.0), 0.0, 70.0, 0.3, 14);
        render_larva(W, H, &spine, 8.0, 20, 220)
    }

    #[test]
    fn default_config_is_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let cases = [
            TrackerConfig { fit_resolution: 4, ..config() },
            TrackerConfig { harmonics: 0, ..config() },
            TrackerConfig { suppression_window: 100, ..config() },
            TrackerConfig { head_velocity_step: 64, ..config() },
            TrackerConfig { bearing_window: 0, ..config() },
            TrackerConfig {
                skeleton: SkeletonParams { secant_offset: 30, secant_span: 480, ..SkeletonParams::default() },
                ..config()
            },
            TrackerConfig {
                skeleton: SkeletonParams { neck_percentage: 1.5, ..SkeletonParams::default() },
                ..config()
            },
        ];
        for cfg in cases {
            assert!(
                matches!(cfg.validate(), Err(TrackerError::InvalidConfig(_))),
                "accepted {cfg:?}"
            );
            let resolver = StageResolver::fixed(StageCalibration::default());
            assert!(Tracker::new(cfg, resolver).is_err());
        }
    }

    #[test]
    fn config_round_trips_through_json_with_defaults() {
        let cfg: TrackerConfig = serde_json::from_str(r#"{"image_width": 320, "harmonics": 9}"#).expect("json");
        assert_eq!(cfg.image_width, 320);
        assert_eq!(cfg.harmonics, 9);
        assert_eq!(cfg.fit_resolution, 200);
        assert_eq!(cfg.skeleton.points, 500);
    }

    #[test]
    fn contract_violations_leave_state_untouched() {
        let mut tracker = tracker();
        let small = GrayImage::new(10, 10);
        let err = tracker
            .process_frame(&Frame::from_gray_image(&small, 0, 33))
            .expect_err("wrong size");
        assert!(matches!(err, TrackerError::FrameSizeMismatch { got: 100, .. }));

        let image = larva(110.0);
        let err = tracker
            .process_frame(&Frame::from_gray_image(&image, 0, 0))
            .expect_err("zero interval");
        assert_eq!(err, TrackerError::InvalidFrameInterval(0));
        assert_eq!(tracker.threshold(), None);
        assert_eq!(tracker.analysed_frames(), 0);
    }

    #[test]
    fn blank_frame_is_no_detection_and_does_not_advance() {
        let mut tracker = tracker();
        let image = larva(110.0);
        tracker
            .process_frame(&Frame::from_gray_image(&image, 0, 33))
            .expect("frame");
        let threshold = tracker.threshold();

        let blank = GrayImage::from_pixel(W, H, image::Luma([220]));
        let report = tracker
            .process_frame(&Frame::from_gray_image(&blank, 1, 33))
            .expect("frame");
        assert_eq!(report, FrameReport::NoDetection);
        assert_eq!(tracker.analysed_frames(), 1);
        assert_eq!(tracker.threshold(), threshold);
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn blank_first_frame_does_not_freeze_the_threshold() {
        let mut tracker = tracker();
        let blank = GrayImage::from_pixel(W, H, image::Luma([220]));
        let report = tracker
            .process_frame(&Frame::from_gray_image(&blank, 0, 33))
            .expect("frame");
        assert_eq!(report, FrameReport::NoDetection);
        assert_eq!(tracker.threshold(), None);

        let mut first = None;
        for i in 1..6u64 {
            let image = larva(100.0 + i as f64);
            let report = tracker
                .process_frame(&Frame::from_gray_image(&image, i, 33))
                .expect("frame");
            let record = report.record().expect("larva after blank frame");
            let threshold = *first.get_or_insert(record.threshold);
            assert_eq!(record.threshold, threshold);
            assert_eq!(tracker.threshold(), Some(threshold));
        }
        assert!(first.is_some_and(|t| t > 20 && t < 220));
        assert_eq!(tracker.analysed_frames(), 5);
    }

    #[test]
    fn bearing_rate_waits_for_more_than_a_window() {
        let mut tracker = tracker();
        let window = tracker.config().bearing_window as u64;
        let mut rates = Vec::new();
        for i in 0..window + 3 {
            // Turning about the head at 0.06 rad per frame.
            let spine = crawl_spine(Point2::new(115.0, 60.0), 0.06 * i as f64, 70.0, 0.3, 14);
            let image = render_larva(W, H, &spine, 8.0, 20, 220);
            let report = tracker
                .process_frame(&Frame::from_gray_image(&image, i, 33))
                .expect("frame");
            rates.push(report.record().expect("detected").secant_bearing_rate);
        }
        assert!(rates[..=window as usize].iter().all(|&r| r == 0.0));
        assert!(rates[window as usize + 1..].iter().all(|r| r.abs() > 0.2));
    }

    #[test]
    fn detected_frame_fills_a_record() {
        let mut tracker = tracker();
        let image = larva(110.0);
        let report = tracker
            .process_frame(&Frame::from_gray_image(&image, 4, 40))
            .expect("frame");
        let record = report.record().expect("detected");

        assert_eq!(record.sequence, 0);
        assert_eq!(record.frame_index, 4);
        assert_eq!(record.sample_time_ms, 160);
        assert_eq!(record.spectral.len(), 7);
        assert_eq!(record.assignment, Assignment::Initial);
        assert_eq!(record.votes, Votes { no_flip: 1, flip: 0 });
        assert_eq!(record.head_kinematics.speed, 0.0);
        assert_eq!(record.secant_bearing_rate, 0.0);
        assert!(record.skeleton_length > 40.0 && record.skeleton_length < 90.0);
        assert!(record.threshold > 20 && record.threshold < 220);

        let bbox = record.bounding_box;
        for p in [record.head, record.tail, record.neck, record.centroid] {
            assert!(p.x >= bbox.min.x as f64 - 5.0 && p.x <= bbox.max.x as f64 + 5.0);
            assert!(p.y >= bbox.min.y as f64 - 5.0 && p.y <= bbox.max.y as f64 + 5.0);
        }
        assert_eq!(tracker.reconstruction().len(), 200);
        assert_eq!(tracker.skeleton().points.len(), 500);
        assert_eq!(tracker.skeleton().points[0], tracker.reconstruction()[record.head_index]);
    }

    #[test]
    fn velocities_follow_a_crawling_larva() {
        let mut tracker = tracker();
        let mm_per_pixel = StageCalibration::default().mm_per_pixel();
        let mut last = None;
        for i in 0..8u64 {
            let image = larva(100.0 + i as f64 * 2.0);
            let report = tracker
                .process_frame(&Frame::from_gray_image(&image, i, 100))
                .expect("frame");
            last = report.record().cloned();
        }
        let record = last.expect("detected");
        assert_eq!(record.sequence, 7);
        // Centroid moves 2 px per 100 ms; head and tail follow within a pixel.
        let expected = 2.0 * mm_per_pixel / 0.1;
        assert_abs_diff_eq!(record.head_kinematics.velocity.x, expected, epsilon = 1.2 * mm_per_pixel / 0.1);
        assert_abs_diff_eq!(record.tail_kinematics.velocity.x, expected, epsilon = 1.2 * mm_per_pixel / 0.1);
        // A straight crawl has no turning.
        assert!(record.secant_bearing_rate.abs() < 0.5);
        assert_eq!(tracker.arena_track().len(), 4);
    }

    #[test]
    fn reset_votes_and_session() {
        let mut tracker = tracker();
        for i in 0..3u64 {
            let image = larva(110.0);
            tracker
                .process_frame(&Frame::from_gray_image(&image, i, 33))
                .expect("frame");
        }
        assert_eq!(tracker.votes().no_flip + tracker.votes().flip, 3);

        tracker.reset_votes();
        assert_eq!(tracker.votes(), Votes::default());
        assert_eq!(tracker.history().len(), 3);

        tracker.reset_session();
        assert_eq!(tracker.threshold(), None);
        assert_eq!(tracker.analysed_frames(), 0);
        assert!(tracker.history().is_empty());
        assert!(tracker.arena_track().is_empty());
        assert!(tracker.latest_world_summary().is_none());
    }
}
