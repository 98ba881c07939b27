// THEORY:
// The `head_tail` module gives the tracker anatomical memory. A single frame
// cannot say which end of a symmetric silhouette is the head; the classifier
// answers that by tracking both extremities over time and letting them vote.
//
// Key principles:
// 1.  **Candidate search**: the sharpest point of the curvature profile is the
//     first candidate extremity. A circular window around it is suppressed on a
//     working copy (the canonical profile is never touched), and the sharpest
//     remaining point is the second candidate.
// 2.  **Proximity tracking**: a persistent `MasterIdentity` holds the two
//     extremities from the previous frame. Each new pair of candidates is
//     matched to it either as-is or swapped, whichever minimizes the total
//     squared distance. The master pair then moves to the matched points. This
//     keeps each slot glued to the same physical end of the animal despite
//     per-frame jitter in which end looks sharper.
// 3.  **Majority vote**: every frame credits one vote. "No-flip" means the
//     sharpest candidate matched master slot 0, "flip" means it matched slot 1.
//     The head is published as the slot with the most votes, so the long-run
//     tendency of the head to be the sharper end decides the label, and a
//     single odd frame cannot flip it.
// 4.  **Operator reset**: vote counters can be zeroed on demand without moving
//     the master points.
//
// Two well-separated minima are assumed. When the second candidate lands right
// at the edge of the suppression window (it is still on the slope of the first
// valley, as in a curled posture) the frame is flagged `degenerate` and logged;
// resolution proceeds unchanged.

use crate::core_modules::geometry::{wrap_index, Point2};
use serde::{Deserialize, Serialize};

/// Value written into suppressed curvature slots; above any wrapped angle.
const SUPPRESSED: f64 = 600.0;

/// One candidate extremity on the reconstructed contour.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extremity {
    /// Index into the reconstructed contour.
    pub index: usize,
    pub point: Point2,
    pub curvature: f64,
}

/// The two extremities found in one frame, in discovery order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidates {
    pub first: Extremity,
    pub second: Extremity,
    /// The second candidate sits on the edge of the suppression window.
    pub degenerate: bool,
}

/// Finds the two sharpest, mutually separated extremities of a contour.
///
/// `suppression` is the half-width of the window blanked around the first
/// candidate. Returns `None` for an empty profile.
pub fn find_candidates(contour: &[Point2], curvature: &[f64], suppression: usize) -> Option<Candidates> {
    let m = curvature.len().min(contour.len());
    let first = argmin(&curvature[..m])?;

    let mut working = curvature[..m].to_vec();
    let s = suppression as isize;
    for i in (first as isize - s)..(first as isize + s) {
        working[wrap_index(i, m)] = SUPPRESSED;
    }
    let second = argmin(&working)?;

    let ahead = wrap_index(first as isize + s, m);
    let behind = wrap_index(first as isize - s - 1, m);
    let degenerate = second == first || second == ahead || second == behind;

    Some(Candidates {
        first: Extremity {
            index: first,
            point: contour[first],
            curvature: curvature[first],
        },
        second: Extremity {
            index: second,
            point: contour[second],
            curvature: curvature[second],
        },
        degenerate,
    })
}

/// Index of the smallest value; the lowest index wins ties.
fn argmin(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Cumulative identity votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Votes {
    /// Frames where the sharpest candidate matched master slot 0.
    pub no_flip: u64,
    /// Frames where the sharpest candidate matched master slot 1.
    pub flip: u64,
}

/// How this frame's candidates were matched onto the master identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assignment {
    /// First frame of the session; the candidates became the master pair.
    Initial,
    Kept,
    Flipped,
}

/// Published head and tail.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnatomicalPoints {
    pub head: Extremity,
    pub tail: Extremity,
}

/// Outcome of one classification step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub anatomy: AnatomicalPoints,
    pub assignment: Assignment,
    pub votes: Votes,
    pub degenerate: bool,
}

/// Vote-based head/tail identity across frames.
#[derive(Debug, Clone, Default)]
pub struct HeadTailClassifier {
    master: Option<[Extremity; 2]>,
    votes: Votes,
}

impl HeadTailClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds candidates on the contour and resolves them. `None` only for an
    /// empty contour.
    pub fn classify(&mut self, contour: &[Point2], curvature: &[f64], suppression: usize) -> Option<Classification> {
        let candidates = find_candidates(contour, curvature, suppression)?;
        Some(self.resolve(candidates))
    }

    /// Matches a candidate pair onto the master identity and votes.
    pub fn resolve(&mut self, candidates: Candidates) -> Classification {
        let Candidates { first, second, degenerate } = candidates;

        let assignment = match self.master {
            None => {
                self.master = Some([first, second]);
                self.votes.no_flip += 1;
                Assignment::Initial
            }
            Some([m0, m1]) => {
                let keep = m0.point.distance_squared(first.point) + m1.point.distance_squared(second.point);
                let swap = m0.point.distance_squared(second.point) + m1.point.distance_squared(first.point);
                if swap < keep {
                    self.master = Some([second, first]);
                    self.votes.flip += 1;
                    Assignment::Flipped
                } else {
                    self.master = Some([first, second]);
                    self.votes.no_flip += 1;
                    Assignment::Kept
                }
            }
        };

        if degenerate {
            tracing::warn!(
                first = first.index,
                second = second.index,
                "extremities not separable; head/tail assignment may be unreliable"
            );
        }

        Classification {
            anatomy: self.published().unwrap_or(AnatomicalPoints { head: first, tail: second }),
            assignment,
            votes: self.votes,
            degenerate,
        }
    }

    /// Head is the master slot with more votes; slot 0 wins ties.
    pub fn published(&self) -> Option<AnatomicalPoints> {
        let [m0, m1] = self.master?;
        Some(if self.votes.no_flip >= self.votes.flip {
            AnatomicalPoints { head: m0, tail: m1 }
        } else {
            AnatomicalPoints { head: m1, tail: m0 }
        })
    }

    pub fn votes(&self) -> Votes {
        self.votes
    }

    pub fn master(&self) -> Option<[Extremity; 2]> {
        self.master
    }

    /// Zeroes both vote counters, keeping the master coordinates.
    pub fn reset_votes(&mut self) {
        self.votes = Votes::default();
    }

    /// Forgets the master identity and the votes.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
