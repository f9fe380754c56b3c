use std::sync::Arc;

use crate::classification::preprocess;
use crate::inference::domain::inference_engine::InferenceEngine;
use crate::shared::emotion::EmotionDistribution;
use crate::shared::error::InferenceError;
use crate::shared::frame::Frame;

/// Crops whose shorter side is below this are not sent to the model.
pub const MIN_CLASSIFIABLE_SIDE: u32 = 30;

/// How a distribution was obtained.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassificationSource {
    Inferred,
    TooSmall,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub distribution: EmotionDistribution,
    pub source: ClassificationSource,
}

impl Classification {
    pub fn is_fallback(&self) -> bool {
        self.source != ClassificationSource::Inferred
    }
}

/// FER+ emotion classifier. Never fails outward: tiny crops and inference
/// errors produce fixed fallback distributions, tagged so callers can tell.
#[derive(Clone)]
pub struct EmotionClassifier {
    engine: Arc<dyn InferenceEngine>,
}

impl EmotionClassifier {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine }
    }

    pub fn classify(&self, crop: &Frame) -> Classification {
        if crop.width().min(crop.height()) < MIN_CLASSIFIABLE_SIDE {
            log::debug!(
                "Crop {}x{} too small to classify",
                crop.width(),
                crop.height()
            );
            return Classification {
                distribution: EmotionDistribution::too_small_fallback(),
                source: ClassificationSource::TooSmall,
            };
        }

        match self.infer(crop) {
            Ok(distribution) => Classification {
                distribution,
                source: ClassificationSource::Inferred,
            },
            Err(e) => {
                log::warn!("Emotion inference failed: {e}");
                Classification {
                    distribution: EmotionDistribution::failure_fallback(),
                    source: ClassificationSource::Failed(e.to_string()),
                }
            }
        }
    }

    fn infer(&self, crop: &Frame) -> Result<EmotionDistribution, InferenceError> {
        let tensor = preprocess::to_input_tensor(crop);
        let outputs = self.engine.infer(tensor)?;
        let scores = outputs
            .first()
            .ok_or_else(|| InferenceError::Output("emotion model produced no outputs".into()))?;
        EmotionDistribution::from_logits(&scores.data)
    }
}
