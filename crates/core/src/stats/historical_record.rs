use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::shared::emotion::Emotion;

/// One persisted analysis as the store hands it back.
///
/// `analysis_results` is kept as raw JSON: older records put faces under
/// `faces`, newer ones under `faces_analysis`, and confidences were stored
/// either as fractions or as percentages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredAnalysis {
    #[serde(default)]
    pub analysis_results: Value,
    #[serde(default)]
    pub faces_detected: u32,
    #[serde(default)]
    pub dominant_emotion: Option<String>,
    /// Percent.
    #[serde(default)]
    pub average_confidence: f64,
}

/// Something a record says about one or more faces.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// `None` when the stored label is missing or not one of the eight.
    pub emotion: Option<Emotion>,
    /// How many faces this observation stands for.
    pub weight: u32,
    /// Percent; `None` when the record carries no usable confidence.
    pub confidence: Option<f64>,
}

/// A stored analysis reduced to a uniform shape.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalRecord {
    pub faces_detected: u32,
    pub observations: Vec<Observation>,
}

impl HistoricalRecord {
    pub fn normalize(record: &StoredAnalysis) -> Self {
        let faces = record
            .analysis_results
            .get("faces_analysis")
            .or_else(|| record.analysis_results.get("faces"));

        let observations = match faces {
            Some(Value::Array(faces)) => faces.iter().map(face_observation).collect(),
            Some(_) => Vec::new(),
            None => summary_observation(record).into_iter().collect(),
        };

        Self {
            faces_detected: record.faces_detected,
            observations,
        }
    }
}

fn face_observation(face: &Value) -> Observation {
    let emotion = ["dominant_emotion", "emotion"]
        .iter()
        .filter_map(|key| face.get(key).and_then(Value::as_str))
        .find(|label| !label.is_empty())
        .and_then(Emotion::from_label);
    let raw = face
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    Observation {
        emotion,
        weight: 1,
        confidence: Some(confidence_percent(raw)),
    }
}

/// Records without a per-face list contribute their own summary fields,
/// weighted by the number of faces they saw.
fn summary_observation(record: &StoredAnalysis) -> Option<Observation> {
    let emotion = record
        .dominant_emotion
        .as_deref()
        .filter(|label| !label.is_empty())?;
    Some(Observation {
        emotion: Emotion::from_label(emotion),
        weight: record.faces_detected,
        confidence: (record.average_confidence > 0.0).then_some(record.average_confidence),
    })
}

/// Values below 1 are fractions, anything else is already a percentage.
pub fn confidence_percent(raw: f64) -> f64 {
    if raw < 1.0 {
        raw * 100.0
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use serde_json::json;

    fn record(results: Value, faces_detected: u32) -> StoredAnalysis {
        StoredAnalysis {
            analysis_results: results,
            faces_detected,
            dominant_emotion: None,
            average_confidence: 0.0,
        }
    }

    #[rstest]
    #[case::fraction(0.42, 42.0)]
    #[case::fraction_high(0.9, 90.0)]
    #[case::zero(0.0, 0.0)]
    #[case::exactly_one(1.0, 1.0)]
    #[case::percentage(87.5, 87.5)]
    fn test_confidence_percent(#[case] raw: f64, #[case] expected: f64) {
        assert_relative_eq!(confidence_percent(raw), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_legacy_faces_key_with_fractions() {
        let stored = record(
            json!({"faces": [
                {"emotion": "happiness", "confidence": 0.42},
                {"dominant_emotion": "sadness", "confidence": 0.9},
            ]}),
            2,
        );
        let normalized = HistoricalRecord::normalize(&stored);

        assert_eq!(normalized.observations.len(), 2);
        assert_eq!(normalized.observations[0].emotion, Some(Emotion::Happiness));
        assert_relative_eq!(normalized.observations[0].confidence.unwrap(), 42.0, epsilon = 1e-9);
        assert_eq!(normalized.observations[1].emotion, Some(Emotion::Sadness));
        assert_relative_eq!(normalized.observations[1].confidence.unwrap(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_faces_analysis_preferred_over_faces() {
        let stored = record(
            json!({
                "faces_analysis": [{"dominant_emotion": "anger", "confidence": 0.5}],
                "faces": [{"dominant_emotion": "fear", "confidence": 0.5}],
            }),
            1,
        );
        let normalized = HistoricalRecord::normalize(&stored);
        assert_eq!(normalized.observations.len(), 1);
        assert_eq!(normalized.observations[0].emotion, Some(Emotion::Anger));
    }

    #[test]
    fn test_dominant_emotion_key_wins_over_emotion() {
        let stored = record(
            json!({"faces": [{"dominant_emotion": "fear", "emotion": "anger"}]}),
            1,
        );
        let normalized = HistoricalRecord::normalize(&stored);
        assert_eq!(normalized.observations[0].emotion, Some(Emotion::Fear));
    }

    #[test]
    fn test_unknown_label_still_contributes_confidence() {
        let stored = record(json!({"faces": [{"emotion": "bored", "confidence": 0.3}]}), 1);
        let normalized = HistoricalRecord::normalize(&stored);
        assert_eq!(normalized.observations[0].emotion, None);
        assert_relative_eq!(normalized.observations[0].confidence.unwrap(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_confidence_counts_as_zero() {
        let stored = record(json!({"faces": [{"emotion": "neutral"}]}), 1);
        let normalized = HistoricalRecord::normalize(&stored);
        assert_eq!(normalized.observations[0].confidence, Some(0.0));
    }

    #[test]
    fn test_summary_fallback_without_face_list() {
        let stored = StoredAnalysis {
            analysis_results: json!({"other": 1}),
            faces_detected: 3,
            dominant_emotion: Some("surprise".into()),
            average_confidence: 64.0,
        };
        let normalized = HistoricalRecord::normalize(&stored);
        assert_eq!(
            normalized.observations,
            vec![Observation {
                emotion: Some(Emotion::Surprise),
                weight: 3,
                confidence: Some(64.0),
            }]
        );
    }

    #[test]
    fn test_summary_fallback_applies_to_null_results() {
        let stored = StoredAnalysis {
            analysis_results: Value::Null,
            faces_detected: 2,
            dominant_emotion: Some("neutral".into()),
            average_confidence: 0.0,
        };
        let normalized = HistoricalRecord::normalize(&stored);
        assert_eq!(normalized.observations.len(), 1);
        assert_eq!(normalized.observations[0].confidence, None);
    }

    #[test]
    fn test_empty_face_list_yields_no_observations() {
        let stored = StoredAnalysis {
            analysis_results: json!({"faces_analysis": []}),
            faces_detected: 0,
            dominant_emotion: Some("happiness".into()),
            average_confidence: 80.0,
        };
        assert!(HistoricalRecord::normalize(&stored).observations.is_empty());
    }

    #[test]
    fn test_no_faces_and_no_summary() {
        let stored = record(json!({}), 0);
        assert!(HistoricalRecord::normalize(&stored).observations.is_empty());
    }

    #[test]
    fn test_deserializes_with_missing_fields() {
        let stored: StoredAnalysis =
            serde_json::from_value(json!({"faces_detected": 2})).unwrap();
        assert_eq!(stored.faces_detected, 2);
        assert_eq!(stored.analysis_results, Value::Null);
        assert_eq!(stored.dominant_emotion, None);
    }
}
