// THEORY:
// Two posture angles summarise the skeleton for downstream behaviour rules:
//
// 1.  **Tail bearing**: the direction from the neck to the tail, i.e. the
//     orientation of the posterior body axis in image coordinates.
// 2.  **Head-to-body angle** (headcast): the direction of the head seen from the
//     neck, measured in the frame of the tail bearing and remapped so that a
//     head continuing the body axis reads 0 and a head folded back onto the
//     tail reads +/-PI. The sign tells which side the head is cast to.

use crate::core_modules::geometry::Point2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Posture angles of one frame, radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyAngles {
    pub tail_bearing: f64,
    pub head_to_body: f64,
}

impl BodyAngles {
    pub fn compute(head: Point2, neck: Point2, tail: Point2) -> Self {
        let tail_bearing = tail.sub(neck).angle();
        Self {
            tail_bearing,
            head_to_body: head_to_body_angle(head, neck, tail_bearing),
        }
    }
}

/// Angle of `head - neck` relative to the body axis given by `tail_bearing`.
pub fn head_to_body_angle(head: Point2, neck: Point2, tail_bearing: f64) -> f64 {
    let d = head.sub(neck);
    let (sin, cos) = tail_bearing.sin_cos();
    let raw = (d.y * cos - d.x * sin).atan2(d.y * sin + d.x * cos);
    if raw < 0.0 { -(PI + raw) } else { PI - raw }
}
