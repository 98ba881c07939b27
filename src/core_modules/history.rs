// THEORY:
// History is the tracker's memory. Every successfully analysed frame becomes one
// `HistoryRecord`, stored in a fixed-capacity ring addressed by the session
// sequence number.
//
// Key principles:
// 1.  **Allocated once**: the ring is sized at construction and never grows.
//     Slot `sequence % capacity` is overwritten in place, so the newest
//     `capacity` frames are always available and older ones are gone.
// 2.  **Sequence-checked reads**: each slot remembers the sequence it holds. A
//     lookup for a sequence that has been overwritten, or never written,
//     returns `None` instead of a stale record.
// 3.  **Arena track**: a second, sparser ring keeps the world-space centroid
//     every few frames for drawing the whole-arena path of a long session.

use crate::core_modules::body_angles::BodyAngles;
use crate::core_modules::contour::Contour;
use crate::core_modules::geometry::{BoundingBox, Point2};
use crate::core_modules::head_tail::{Assignment, Votes};
use crate::core_modules::kinematics::Kinematics;
use crate::core_modules::spectral::SpectralModel;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Fixed-capacity ring of values keyed by a monotonically increasing sequence.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    slots: Vec<Option<(u64, T)>>,
    latest: Option<u64>,
}

impl<T> HistoryBuffer<T> {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity.max(1));
        slots.resize_with(capacity.max(1), || None);
        Self { slots, latest: None }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, sequence: u64) -> usize {
        (sequence % self.slots.len() as u64) as usize
    }

    /// Writes `value` into the slot for `sequence`, replacing whatever was there.
    pub fn insert(&mut self, sequence: u64, value: T) {
        let slot = self.slot(sequence);
        self.slots[slot] = Some((sequence, value));
        self.latest = Some(self.latest.map_or(sequence, |l| l.max(sequence)));
    }

    pub fn get(&self, sequence: u64) -> Option<&T> {
        match &self.slots[self.slot(sequence)] {
            Some((stored, value)) if *stored == sequence => Some(value),
            _ => None,
        }
    }

    pub fn latest_sequence(&self) -> Option<u64> {
        self.latest
    }

    pub fn latest(&self) -> Option<&T> {
        self.latest.and_then(|s| self.get(s))
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_none()
    }

    /// Retained values, oldest first.
    pub fn iter_chronological(&self) -> impl Iterator<Item = &T> + '_ {
        let range = match self.latest {
            Some(newest) => {
                let span = (self.slots.len() as u64).min(newest + 1);
                (newest + 1 - span)..(newest + 1)
            }
            None => 0..0,
        };
        range.filter_map(move |s| self.get(s))
    }

    /// Empties every slot, keeping the allocation.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.latest = None;
    }
}

/// World-space centroid path sampled every `interval` sequences.
#[derive(Debug, Clone)]
pub struct ArenaTrack {
    interval: u64,
    points: HistoryBuffer<Point2>,
    next: u64,
}

impl ArenaTrack {
    pub fn new(interval: usize, capacity: usize) -> Self {
        Self {
            interval: interval.max(1) as u64,
            points: HistoryBuffer::new(capacity),
            next: 0,
        }
    }

    /// Appends `world_centroid` if `sequence` falls on the sampling interval.
    /// Returns whether a point was stored.
    pub fn observe(&mut self, sequence: u64, world_centroid: Point2) -> bool {
        if sequence % self.interval != 0 {
            return false;
        }
        self.points.insert(self.next, world_centroid);
        self.next += 1;
        true
    }

    /// Stored points, oldest first.
    pub fn points(&self) -> Vec<Point2> {
        self.points.iter_chronological().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.next = 0;
    }
}

/// Wall-clock cost of each pipeline stage for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub binarize: Duration,
    pub contours: Duration,
    pub decompose: Duration,
    pub reconstruct: Duration,
    pub curvature: Duration,
    pub head_tail: Duration,
    pub skeleton: Duration,
    pub angles: Duration,
    pub kinematics: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.binarize
            + self.contours
            + self.decompose
            + self.reconstruct
            + self.curvature
            + self.head_tail
            + self.skeleton
            + self.angles
            + self.kinematics
    }
}

/// Lap timer used to fill `StageTimings`.
#[derive(Debug)]
pub struct StageClock {
    last: Instant,
}

impl StageClock {
    pub fn start() -> Self {
        Self { last: Instant::now() }
    }

    /// Time since the previous lap (or start).
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed
    }
}

/// Everything the tracker derived from one analysed frame.
///
/// Points are in image pixels, angles in radians, velocities in mm/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Session sequence number of this record.
    pub sequence: u64,
    /// Capture frame index.
    pub frame_index: u64,
    pub sample_time_ms: u64,
    pub interval_ms: u32,
    pub threshold: u8,
    pub contour: Contour,
    pub bounding_box: BoundingBox,
    pub spectral: SpectralModel,
    pub centroid: Point2,
    pub head: Point2,
    pub neck: Point2,
    pub tail: Point2,
    /// Head and tail indices on the reconstructed contour.
    pub head_index: usize,
    pub tail_index: usize,
    pub skeleton_length: f64,
    pub angles: BodyAngles,
    pub secant_bearing: f64,
    /// Smoothed rate of change of `secant_bearing`, rad/s.
    pub secant_bearing_rate: f64,
    pub head_kinematics: Kinematics,
    pub tail_kinematics: Kinematics,
    pub stage_offset_mm: Point2,
    pub votes: Votes,
    pub assignment: Assignment,
    pub degenerate: bool,
    pub timings: StageTimings,
}

impl HistoryRecord {
    /// World position of an image point of this frame.
    pub fn to_world(&self, pixel: Point2, mm_per_pixel: f64) -> Point2 {
        crate::core_modules::world::to_world(pixel, mm_per_pixel, self.stage_offset_mm)
    }

    pub fn analysis_time(&self) -> Duration {
        self.timings.total()
    }
}
