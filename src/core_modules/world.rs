// THEORY:
// The camera rides on a motorized stage that keeps the larva in view, so a pixel
// coordinate alone says nothing about where the animal is in the arena. World
// position is the pixel position scaled to millimetres plus the stage offset at
// the moment the frame was analysed.
//
// The tracker does not talk to stage hardware. It asks a `WorldPositionResolver`
// for the current offset and the camera calibration. `StageResolver` is the
// provided implementation: a stage driver (on any thread) writes absolute tick
// counts into a shared `StagePosition`, and the resolver converts them with a
// per-axis ticks-per-millimetre calibration.

use crate::core_modules::geometry::Point2;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Source of stage offset and pixel calibration for the tracker.
pub trait WorldPositionResolver {
    /// Current stage offset in millimetres.
    fn stage_offset_mm(&self) -> Point2;
    /// Size of one camera pixel in millimetres.
    fn mm_per_pixel(&self) -> f64;
}

/// `pixel * mm_per_pixel + stage_offset_mm`.
pub fn to_world(pixel: Point2, mm_per_pixel: f64, stage_offset_mm: Point2) -> Point2 {
    pixel.scale(mm_per_pixel).add(stage_offset_mm)
}

/// Camera and stage calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageCalibration {
    pub ticks_per_mm_x: f64,
    pub ticks_per_mm_y: f64,
    pub um_per_pixel: f64,
}

impl Default for StageCalibration {
    fn default() -> Self {
        Self {
            ticks_per_mm_x: 2007.0,
            ticks_per_mm_y: 2032.0,
            um_per_pixel: 7.62,
        }
    }
}

impl StageCalibration {
    pub fn mm_per_pixel(&self) -> f64 {
        self.um_per_pixel / 1000.0
    }

    pub fn ticks_to_mm(&self, x_ticks: i64, y_ticks: i64) -> Point2 {
        Point2::new(
            x_ticks as f64 / self.ticks_per_mm_x,
            y_ticks as f64 / self.ticks_per_mm_y,
        )
    }

    /// Converts a millimetre displacement into whole stage ticks, rounded.
    pub fn mm_to_ticks(&self, mm: Point2) -> (i64, i64) {
        (
            (mm.x * self.ticks_per_mm_x).round() as i64,
            (mm.y * self.ticks_per_mm_y).round() as i64,
        )
    }
}

/// Absolute stage position in ticks, written by the stage driver.
#[derive(Debug, Default)]
pub struct StagePosition {
    x: AtomicI64,
    y: AtomicI64,
}

impl StagePosition {
    pub fn new(x_ticks: i64, y_ticks: i64) -> Self {
        Self {
            x: AtomicI64::new(x_ticks),
            y: AtomicI64::new(y_ticks),
        }
    }

    pub fn set(&self, x_ticks: i64, y_ticks: i64) {
        self.x.store(x_ticks, Ordering::Relaxed);
        self.y.store(y_ticks, Ordering::Relaxed);
    }

    pub fn move_by(&self, dx_ticks: i64, dy_ticks: i64) {
        self.x.fetch_add(dx_ticks, Ordering::Relaxed);
        self.y.fetch_add(dy_ticks, Ordering::Relaxed);
    }

    pub fn get(&self) -> (i64, i64) {
        (self.x.load(Ordering::Relaxed), self.y.load(Ordering::Relaxed))
    }
}

/// Resolves world positions from a shared stage readout.
#[derive(Debug, Clone)]
pub struct StageResolver {
    calibration: StageCalibration,
    position: Arc<StagePosition>,
}

impl StageResolver {
    pub fn new(calibration: StageCalibration, position: Arc<StagePosition>) -> Self {
        Self { calibration, position }
    }

    /// A resolver for a stage parked at the origin.
    pub fn fixed(calibration: StageCalibration) -> Self {
        Self::new(calibration, Arc::new(StagePosition::default()))
    }

    pub fn calibration(&self) -> StageCalibration {
        self.calibration
    }

    /// Handle for the stage driver.
    pub fn position(&self) -> Arc<StagePosition> {
        Arc::clone(&self.position)
    }
}

impl WorldPositionResolver for StageResolver {
    fn stage_offset_mm(&self) -> Point2 {
        let (x, y) = self.position.get();
        self.calibration.ticks_to_mm(x, y)
    }

    fn mm_per_pixel(&self) -> f64 {
        self.calibration.mm_per_pixel()
    }
}
