// THEORY:
// The `Frame` module is the entry point of raw image data into the core. A `Frame`
// is a "dumb", borrowed view of one captured image: an 8-bit single-channel
// buffer plus its dimensions, the capture source's frame index and the nominal
// interval between frames. The core never owns or retains pixel data; the
// capture source keeps the buffer alive for the duration of one analysis call.

use image::GrayImage;
use imageproc::contrast::{threshold, ThresholdType};

/// A borrowed view of one captured grayscale frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Row-major 8-bit intensities, `width * height` bytes.
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Monotonically increasing index supplied by the capture source.
    pub index: u64,
    /// Nominal interval between frames in milliseconds.
    pub interval_ms: u32,
}

impl<'a> Frame<'a> {
    pub fn new(pixels: &'a [u8], width: u32, height: u32, index: u64, interval_ms: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            index,
            interval_ms,
        }
    }

    /// Borrows a frame from an `image` buffer.
    pub fn from_gray_image(image: &'a GrayImage, index: u64, interval_ms: u32) -> Self {
        Self::new(image.as_raw(), image.width(), image.height(), index, interval_ms)
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Sample time of this frame in milliseconds since the start of capture.
    pub fn sample_time_ms(&self) -> u64 {
        self.index * self.interval_ms as u64
    }

    /// Builds the inverted binary mask used for contour extraction. Pixels at or
    /// below `level` (the dark organism) become 255, the background 0.
    /// `None` when the buffer does not hold `width * height` bytes.
    pub fn binarize_inverted(&self, level: u8) -> Option<GrayImage> {
        let image = GrayImage::from_raw(self.width, self.height, self.pixels.to_vec())?;
        Some(threshold(&image, level, ThresholdType::BinaryInverted))
    }
}
