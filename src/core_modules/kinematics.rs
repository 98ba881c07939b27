// THEORY:
// Head and tail velocities are finite differences in world space over a fixed
// lag of `step` analysed frames. Each point is converted with the stage offset
// recorded for its own frame, so stage motion between the two frames is not
// mistaken for animal motion.
//
// Until `step` frames of history exist the estimate is exactly zero and history
// is not read at all.

use crate::core_modules::geometry::Point2;
use serde::{Deserialize, Serialize};

/// Velocity (mm/s) and speed of one tracked point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Kinematics {
    pub velocity: Point2,
    pub speed: f64,
}

impl Kinematics {
    pub const ZERO: Kinematics = Kinematics {
        velocity: Point2::ZERO,
        speed: 0.0,
    };

    /// Finite difference between two world positions `step` frames apart.
    pub fn between(current: Point2, past: Point2, step: usize, interval_ms: u32) -> Self {
        let dt = (step as f64 * interval_ms as f64) / 1000.0;
        if dt <= 0.0 {
            return Self::ZERO;
        }
        let velocity = current.sub(past).scale(1.0 / dt);
        Self {
            velocity,
            speed: velocity.norm(),
        }
    }
}

/// Estimates kinematics for the frame at `sequence`.
///
/// `past_world` is asked for the world position at `sequence - step` and is
/// only called when that frame exists. A missing past position also yields zero.
pub fn estimate<F>(sequence: u64, step: usize, interval_ms: u32, current_world: Point2, past_world: F) -> Kinematics
where
    F: FnOnce(u64) -> Option<Point2>,
{
    let lag = step as u64;
    if step == 0 || sequence < lag {
        return Kinematics::ZERO;
    }
    match past_world(sequence - lag) {
        Some(past) => Kinematics::between(current_world, past, step, interval_ms),
        None => Kinematics::ZERO,
    }
}
