use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::shared::emotion::Emotion;
use crate::stats::historical_record::{HistoricalRecord, StoredAnalysis};

/// Per-emotion counts that remember the order labels were first counted.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct EmotionTally {
    counts: [u64; Emotion::COUNT],
    first_seen: Vec<Emotion>,
}

impl EmotionTally {
    pub(crate) fn add(&mut self, emotion: Emotion, weight: u64) {
        if weight == 0 {
            return;
        }
        if self.counts[emotion.index()] == 0 {
            self.first_seen.push(emotion);
        }
        self.counts[emotion.index()] += weight;
    }

    /// Highest count; on a tie the label counted first wins.
    pub(crate) fn most_frequent(&self) -> Option<Emotion> {
        let mut best: Option<Emotion> = None;
        for &emotion in &self.first_seen {
            if best.map_or(true, |b| self.counts[emotion.index()] > self.counts[b.index()]) {
                best = Some(emotion);
            }
        }
        best
    }

    pub(crate) fn counts(&self) -> [u64; Emotion::COUNT] {
        self.counts
    }
}

/// Statistics over a user's complete analysis history.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregatedStatistics {
    pub total_analyses: usize,
    pub total_faces_detected: u64,
    #[serde(serialize_with = "label_map")]
    pub emotion_counts: [u64; Emotion::COUNT],
    /// Share of counted faces per emotion, in percent with two decimals.
    /// All zero when nothing was counted.
    #[serde(serialize_with = "label_map")]
    pub emotion_distribution: [f64; Emotion::COUNT],
    pub most_frequent_emotion: Option<Emotion>,
    /// Percent.
    pub average_confidence: f64,
    pub average_faces_per_analysis: f64,
}

impl AggregatedStatistics {
    /// Rebuilds everything from scratch; the records' mixed shapes make
    /// incremental updates unreliable.
    pub fn recompute(records: &[StoredAnalysis]) -> Self {
        let mut tally = EmotionTally::default();
        let mut total_faces_detected = 0u64;
        let mut confidence_sum = 0.0;
        let mut confidence_weight = 0u64;

        for record in records {
            let normalized = HistoricalRecord::normalize(record);
            total_faces_detected += u64::from(normalized.faces_detected);
            for observation in &normalized.observations {
                let weight = u64::from(observation.weight);
                if let Some(emotion) = observation.emotion {
                    tally.add(emotion, weight);
                }
                if let Some(confidence) = observation.confidence {
                    confidence_sum += confidence * weight as f64;
                    confidence_weight += weight;
                }
            }
        }

        let emotion_counts = tally.counts();
        let counted: u64 = emotion_counts.iter().sum();
        let emotion_distribution = if counted == 0 {
            [0.0; Emotion::COUNT]
        } else {
            emotion_counts.map(|c| round2(c as f64 / counted as f64 * 100.0))
        };
        let average_confidence = if confidence_weight == 0 {
            0.0
        } else {
            confidence_sum / confidence_weight as f64
        };
        let average_faces_per_analysis = if records.is_empty() {
            0.0
        } else {
            total_faces_detected as f64 / records.len() as f64
        };

        log::debug!(
            "Recomputed statistics over {} analyses, {} faces",
            records.len(),
            total_faces_detected
        );

        Self {
            total_analyses: records.len(),
            total_faces_detected,
            emotion_counts,
            emotion_distribution,
            most_frequent_emotion: tally.most_frequent(),
            average_confidence,
            average_faces_per_analysis,
        }
    }

    pub fn count(&self, emotion: Emotion) -> u64 {
        self.emotion_counts[emotion.index()]
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn label_map<S, T>(values: &[T; Emotion::COUNT], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut map = serializer.serialize_map(Some(Emotion::COUNT))?;
    for (emotion, value) in Emotion::ALL.iter().zip(values) {
        map.serialize_entry(emotion.label(), value)?;
    }
    map.end()
}
