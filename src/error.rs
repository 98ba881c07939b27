// THEORY:
// Failure inside the per-frame path is never fatal. A frame without a contour is
// a `FrameReport::NoDetection`, and missing history yields zero defaults. The only
// conditions that surface as `Err` are caller-contract violations caught before
// any session state is touched: a configuration that cannot describe a session,
// and a frame whose buffer does not match the session dimensions or whose
// nominal interval is zero.

use thiserror::Error;

/// Errors returned by the tracker's public API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame size mismatch: expected {expected} bytes ({width}x{height}), got {got}")]
    FrameSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    #[error("Invalid frame interval: {0} ms (must be positive)")]
    InvalidFrameInterval(u32),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
