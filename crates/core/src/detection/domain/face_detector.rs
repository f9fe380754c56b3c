use crate::shared::error::InferenceError;
use crate::shared::frame::Frame;

/// A raw detector hit in the pixel space of the frame it was run on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub score: f64,
}

impl Detection {
    pub fn corners(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }
}

/// Domain interface for face detection backends.
///
/// Detectors are shared across threads and hold no per-frame state.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, InferenceError>;
}
