// THEORY:
// This file is the entry point of the `larva_vision` library crate. It turns raw
// grayscale frames of a crawling larva into a per-frame posture description:
// contour, Fourier shape model, head/tail identity, midline, body angles and
// velocities, for a closed-loop behaviour rig.
//
// The public face is the `Tracker` in `pipeline`, together with its
// `TrackerConfig` and `FrameReport`. The stage implementations live in
// `core_modules` and stay usable on their own (the spectral reconstruction in
// particular is called directly by replay and visualization consumers).
// `publisher` fans finished records out to asynchronous consumers.

pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod publisher;

pub use core_modules::frame::Frame;
pub use core_modules::history::HistoryRecord;
pub use core_modules::spectral::{reconstruct, Harmonic, SpectralModel};
pub use core_modules::world::{StageCalibration, StagePosition, StageResolver, WorldPositionResolver};
pub use error::{Result, TrackerError};
pub use pipeline::{FrameReport, Tracker, TrackerConfig};
pub use publisher::ResultBus;
