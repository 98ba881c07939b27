// THEORY:
// Formatting of history records for the outside world. Nothing here writes
// anywhere; callers decide where the text or the summary goes.
//
// 1.  **Data line**: one comma-separated text line per record in pixel units,
//     with a matching numbered legend, for session logs.
// 2.  **World summary**: the compact millimetre/degree view of a record that a
//     behaviour-rule service consumes.

use crate::core_modules::geometry::Point2;
use crate::core_modules::history::HistoryRecord;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Column legend for [`HistoryRecord::data_line`].
pub fn data_legend() -> String {
    [
        "1: Sample index",
        "2: Sample time (seconds)",
        "3: Head x (pixels)",
        "4: Head y (pixels)",
        "5: Neck x (pixels)",
        "6: Neck y (pixels)",
        "7: Tail x (pixels)",
        "8: Tail y (pixels)",
        "9: Skeleton length (pixels)",
        "10: Centroid x (pixels)",
        "11: Centroid y (pixels)",
        "12: Head to body angle (degrees)",
        "13: Tail bearing angle (degrees)",
        "14: Stage offset x (mm)",
        "15: Stage offset y (mm)",
        "16+: 4*N Fourier coefficients (ax[0], bx[0], ay[0], by[0], ax[1], ...)",
    ]
    .iter()
    .fold(String::new(), |mut legend, line| {
        legend.push_str(line);
        legend.push('\n');
        legend
    })
}

/// Per-frame summary in world units, as sent to the rule service.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldSummary {
    pub sequence: u64,
    pub frame_index: u64,
    pub sample_time_ms: u64,
    pub head_mm: Point2,
    pub neck_mm: Point2,
    pub tail_mm: Point2,
    pub length_mm: f64,
    pub centroid_mm: Point2,
    pub head_to_body_deg: f64,
    /// Secant bearing near the tail end, degrees.
    pub tail_bearing_deg: f64,
}

impl HistoryRecord {
    /// Comma-separated record, newline terminated. See [`data_legend`].
    pub fn data_line(&self) -> String {
        let mut line = String::new();
        let _ = write!(line, "{}, {:.3}", self.frame_index, self.sample_time_ms as f64 / 1000.0);
        for value in [
            self.head.x,
            self.head.y,
            self.neck.x,
            self.neck.y,
            self.tail.x,
            self.tail.y,
            self.skeleton_length,
            self.centroid.x,
            self.centroid.y,
            self.angles.head_to_body.to_degrees(),
            self.angles.tail_bearing.to_degrees(),
        ] {
            let _ = write!(line, ", {value:.2}");
        }
        let _ = write!(line, ", {:.4}, {:.4}", self.stage_offset_mm.x, self.stage_offset_mm.y);
        for coefficient in self.spectral.flatten() {
            let _ = write!(line, ", {coefficient:.4}");
        }
        line.push('\n');
        line
    }

    pub fn world_summary(&self, mm_per_pixel: f64) -> WorldSummary {
        WorldSummary {
            sequence: self.sequence,
            frame_index: self.frame_index,
            sample_time_ms: self.sample_time_ms,
            head_mm: self.to_world(self.head, mm_per_pixel),
            neck_mm: self.to_world(self.neck, mm_per_pixel),
            tail_mm: self.to_world(self.tail, mm_per_pixel),
            length_mm: self.skeleton_length * mm_per_pixel,
            centroid_mm: self.to_world(self.centroid, mm_per_pixel),
            head_to_body_deg: self.angles.head_to_body.to_degrees(),
            tail_bearing_deg: self.secant_bearing.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::body_angles::BodyAngles;
    use crate::core_modules::contour::Contour;
    use crate::core_modules::geometry::BoundingBox;
    use crate::core_modules::head_tail::{Assignment, Votes};
    use crate::core_modules::history::StageTimings;
    use crate::core_modules::kinematics::Kinematics;
    use crate::core_modules::spectral::{Harmonic, SpectralModel};
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn record() -> HistoryRecord {
        HistoryRecord {
            sequence: 7,
            frame_index: 12,
            sample_time_ms: 1500,
            interval_ms: 125,
            threshold: 90,
            contour: Contour::default(),
            bounding_box: BoundingBox::default(),
            spectral: SpectralModel {
                harmonics: vec![
                    Harmonic { ax: 50.0, bx: 0.0, ay: 40.0, by: 0.0 },
                    Harmonic { ax: 1.23456, bx: -2.0, ay: 0.5, by: 3.0 },
                ],
            },
            centroid: Point2::new(50.0, 40.0),
            head: Point2::new(70.0, 40.0),
            neck: Point2::new(50.0, 40.0),
            tail: Point2::new(30.0, 40.0),
            head_index: 0,
            tail_index: 100,
            skeleton_length: 40.0,
            angles: BodyAngles { tail_bearing: PI, head_to_body: 0.0 },
            secant_bearing: FRAC_PI_2,
            secant_bearing_rate: 0.0,
            head_kinematics: Kinematics::ZERO,
            tail_kinematics: Kinematics::ZERO,
            stage_offset_mm: Point2::new(2.0, -1.0),
            votes: Votes::default(),
            assignment: Assignment::Initial,
            degenerate: false,
            timings: StageTimings::default(),
        }
    }

    #[test]
    fn data_line_matches_legend() {
        let line = record().data_line();
        assert!(line.ends_with('\n'));
        let fields: Vec<&str> = line.trim_end().split(", ").collect();
        // 15 fixed columns plus 4 coefficients per harmonic.
        assert_eq!(fields.len(), 15 + 8);
        assert_eq!(data_legend().lines().count(), 16);
        assert_eq!(fields[0], "12");
        assert_eq!(fields[1], "1.500");
        assert_eq!(fields[2], "70.00");
        assert_eq!(fields[12], "180.00");
        assert_eq!(fields[13], "2.0000");
        assert_eq!(fields[19], "1.2346");
    }

    #[test]
    fn world_summary_converts_units() {
        let summary = record().world_summary(0.01);
        assert_relative_eq!(summary.head_mm.x, 2.7, epsilon = 1e-12);
        assert_relative_eq!(summary.head_mm.y, -0.6, epsilon = 1e-12);
        assert_relative_eq!(summary.length_mm, 0.4, epsilon = 1e-12);
        assert_relative_eq!(summary.tail_bearing_deg, 90.0, epsilon = 1e-12);
        assert_eq!(summary.sequence, 7);

        let json = serde_json::to_string(&summary).expect("serializable");
        assert!(json.contains("\"head_to_body_deg\""));
    }
}
