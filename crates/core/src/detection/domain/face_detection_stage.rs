use std::borrow::Cow;
use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Minimum detector score for a face to be reported.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.6;

/// Frames larger than this are downscaled before realtime detection.
pub const REALTIME_MAX_WIDTH: u32 = 640;
pub const REALTIME_MAX_HEIGHT: u32 = 480;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionMode {
    /// Full resolution, for uploaded and snapshot images.
    Precise,
    /// Bounded resolution, for live camera frames.
    Realtime,
}

/// Applies detection policy on top of a raw [`FaceDetector`]: optional
/// downscaling, score filtering and clipping to the input image.
#[derive(Clone)]
pub struct FaceDetectionStage {
    detector: Arc<dyn FaceDetector>,
    score_threshold: f64,
}

impl FaceDetectionStage {
    pub fn new(detector: Arc<dyn FaceDetector>) -> Self {
        Self::with_threshold(detector, DEFAULT_SCORE_THRESHOLD)
    }

    pub fn with_threshold(detector: Arc<dyn FaceDetector>, score_threshold: f64) -> Self {
        Self {
            detector,
            score_threshold,
        }
    }

    /// Face boxes in the coordinates of `frame`. Detector failures are
    /// logged and reported as "no faces".
    pub fn detect(&self, frame: &Frame, mode: DetectionMode) -> Vec<BoundingBox> {
        if frame.is_empty() {
            return Vec::new();
        }
        let (width, height) = (frame.width(), frame.height());

        let factor = match mode {
            DetectionMode::Precise => 1.0,
            DetectionMode::Realtime => realtime_scale(width, height),
        };
        let input = if factor < 1.0 {
            let scaled_w = ((width as f64 * factor) as u32).max(1);
            let scaled_h = ((height as f64 * factor) as u32).max(1);
            Cow::Owned(frame.resized(scaled_w, scaled_h))
        } else {
            Cow::Borrowed(frame)
        };

        let detections = match self.detector.detect(&input) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Face detection failed: {e}");
                return Vec::new();
            }
        };

        let boxes: Vec<BoundingBox> = detections
            .iter()
            .filter(|d| d.score >= self.score_threshold)
            .filter_map(|d| {
                BoundingBox::clipped(
                    d.x / factor,
                    d.y / factor,
                    d.width / factor,
                    d.height / factor,
                    width,
                    height,
                )
            })
            .collect();
        log::debug!(
            "Detected {} face(s) in {width}x{height} frame ({mode:?})",
            boxes.len()
        );
        boxes
    }
}

/// Downscale factor keeping a frame within 640x480, or 1.0 when it already fits.
pub fn realtime_scale(width: u32, height: u32) -> f64 {
    if width > REALTIME_MAX_WIDTH || height > REALTIME_MAX_HEIGHT {
        (REALTIME_MAX_WIDTH as f64 / width as f64).min(REALTIME_MAX_HEIGHT as f64 / height as f64)
    } else {
        1.0
    }
}
