use serde::Serialize;

use crate::shared::analysis_result::FrameAnalysisResult;
use crate::shared::emotion::Emotion;
use crate::stats::aggregated_statistics::EmotionTally;

/// Headline numbers stored alongside each analysis.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub faces_detected: usize,
    /// Most common dominant emotion among the classified faces.
    pub dominant_emotion: Option<Emotion>,
    /// Mean dominant-emotion confidence, in percent.
    pub average_confidence: f64,
}

impl AnalysisSummary {
    pub fn from_result(result: &FrameAnalysisResult) -> Self {
        let faces = result.faces();
        let mut tally = EmotionTally::default();
        for face in faces {
            tally.add(face.dominant, 1);
        }
        let average_confidence = if faces.is_empty() {
            0.0
        } else {
            faces.iter().map(|f| f.confidence).sum::<f64>() / faces.len() as f64 * 100.0
        };
        Self {
            faces_detected: result.faces_detected(),
            dominant_emotion: tally.most_frequent(),
            average_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::analysis_result::FaceResult;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::emotion::EmotionDistribution;
    use approx::assert_relative_eq;

    fn face(id: usize, probabilities: [f64; 8]) -> FaceResult {
        FaceResult::new(
            id,
            BoundingBox::new(0, 0, 40, 40),
            EmotionDistribution::new(probabilities),
        )
    }

    #[test]
    fn test_summary_of_mixed_faces() {
        let result = FrameAnalysisResult::new(
            vec![
                face(1, [0.2, 0.8, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
                face(2, [0.6, 0.4, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
                face(3, [0.0, 0.7, 0.3, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ],
            3,
        );
        let summary = AnalysisSummary::from_result(&result);
        assert_eq!(summary.faces_detected, 3);
        assert_eq!(summary.dominant_emotion, Some(Emotion::Happiness));
        assert_relative_eq!(summary.average_confidence, 70.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tie_keeps_first_face_emotion() {
        let result = FrameAnalysisResult::new(
            vec![
                face(1, [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
                face(2, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            ],
            2,
        );
        assert_eq!(
            AnalysisSummary::from_result(&result).dominant_emotion,
            Some(Emotion::Sadness)
        );
    }

    #[test]
    fn test_empty_result() {
        let summary = AnalysisSummary::from_result(&FrameAnalysisResult::empty());
        assert_eq!(summary, AnalysisSummary::default());
    }
}
