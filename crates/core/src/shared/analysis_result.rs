use serde::Serialize;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::emotion::{Emotion, EmotionDistribution};

/// Per-face outcome: where the face is and what it shows.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FaceResult {
    /// 1-based position within the analysed image.
    pub id: usize,
    #[serde(flatten)]
    pub bbox: BoundingBox,
    #[serde(rename = "dominant_emotion")]
    pub dominant: Emotion,
    /// Probability of the dominant emotion, in [0, 1].
    pub confidence: f64,
    #[serde(rename = "emotions")]
    pub distribution: EmotionDistribution,
    /// Stored crop, relative to the media root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_image: Option<String>,
}

impl FaceResult {
    pub fn new(id: usize, bbox: BoundingBox, distribution: EmotionDistribution) -> Self {
        let (dominant, confidence) = distribution.dominant();
        Self {
            id,
            bbox,
            dominant,
            confidence,
            distribution,
            face_image: None,
        }
    }

    pub fn with_face_image(mut self, path: impl Into<String>) -> Self {
        self.face_image = Some(path.into());
        self
    }
}

/// Result of analysing one image or frame.
///
/// `faces_detected` counts every detection, which can exceed `faces.len()`
/// when the live policy caps or skips faces.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FrameAnalysisResult {
    faces: Vec<FaceResult>,
    faces_detected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl FrameAnalysisResult {
    pub fn new(faces: Vec<FaceResult>, faces_detected: usize) -> Self {
        Self {
            faces,
            faces_detected,
            error: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            faces: Vec::new(),
            faces_detected: 0,
            error: Some(message.into()),
        }
    }

    pub fn faces(&self) -> &[FaceResult] {
        &self.faces
    }

    pub fn faces_detected(&self) -> usize {
        self.faces_detected
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
