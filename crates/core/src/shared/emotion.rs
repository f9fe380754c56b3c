use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::shared::error::InferenceError;

/// Relative deviation from 1.0 beyond which a distribution is rescaled.
pub const SUM_TOLERANCE: f64 = 0.1;

/// The eight FER+ emotion classes, in model output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happiness,
    Surprise,
    Sadness,
    Anger,
    Disgust,
    Fear,
    Contempt,
}

impl Emotion {
    pub const COUNT: usize = 8;

    pub const ALL: [Emotion; Emotion::COUNT] = [
        Emotion::Neutral,
        Emotion::Happiness,
        Emotion::Surprise,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Contempt,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happiness => "happiness",
            Emotion::Surprise => "surprise",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Contempt => "contempt",
        }
    }

    /// Display name for overlays and reports.
    pub fn title(self) -> &'static str {
        match self {
            Emotion::Neutral => "Neutral",
            Emotion::Happiness => "Happiness",
            Emotion::Surprise => "Surprise",
            Emotion::Sadness => "Sadness",
            Emotion::Anger => "Anger",
            Emotion::Disgust => "Disgust",
            Emotion::Fear => "Fear",
            Emotion::Contempt => "Contempt",
        }
    }

    /// Overlay color as RGB.
    pub fn color(self) -> [u8; 3] {
        match self {
            Emotion::Neutral => [128, 128, 128],
            Emotion::Happiness => [0, 255, 0],
            Emotion::Surprise => [255, 255, 0],
            Emotion::Sadness => [0, 0, 255],
            Emotion::Anger => [255, 0, 0],
            Emotion::Disgust => [0, 128, 0],
            Emotion::Fear => [128, 0, 128],
            Emotion::Contempt => [255, 165, 0],
        }
    }

    /// Parses a stored label, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Emotion::ALL
            .into_iter()
            .find(|e| e.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Probability per emotion for one face. Values sum to 1.0 (within
/// [`SUM_TOLERANCE`] before rescaling).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmotionDistribution {
    probabilities: [f64; Emotion::COUNT],
}

impl EmotionDistribution {
    /// Wraps raw probabilities, rescaling them when their sum is off by more
    /// than [`SUM_TOLERANCE`].
    pub fn new(probabilities: [f64; Emotion::COUNT]) -> Self {
        let sum: f64 = probabilities.iter().sum();
        if sum > 0.0 && (sum - 1.0).abs() > SUM_TOLERANCE {
            return Self {
                probabilities: probabilities.map(|p| p / sum),
            };
        }
        Self { probabilities }
    }

    /// Numerically stable softmax over the eight model logits.
    pub fn from_logits(logits: &[f32]) -> Result<Self, InferenceError> {
        if logits.len() != Emotion::COUNT {
            return Err(InferenceError::Output(format!(
                "expected {} emotion scores, got {}",
                Emotion::COUNT,
                logits.len()
            )));
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(InferenceError::Output(
                "emotion scores contain non-finite values".into(),
            ));
        }

        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
        let mut exps = [0.0f64; Emotion::COUNT];
        for (slot, &logit) in exps.iter_mut().zip(logits) {
            *slot = (logit as f64 - max).exp();
        }
        let sum: f64 = exps.iter().sum();
        Ok(Self::new(exps.map(|e| e / sum)))
    }

    /// Returned for crops too small to classify.
    pub const fn too_small_fallback() -> Self {
        Self {
            probabilities: [0.80, 0.05, 0.05, 0.03, 0.02, 0.02, 0.02, 0.01],
        }
    }

    /// Returned when inference fails.
    pub const fn failure_fallback() -> Self {
        Self {
            probabilities: [0.70, 0.10, 0.05, 0.05, 0.03, 0.03, 0.02, 0.02],
        }
    }

    pub fn probability(&self, emotion: Emotion) -> f64 {
        self.probabilities[emotion.index()]
    }

    pub fn sum(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.into_iter().zip(self.probabilities.iter().copied())
    }

    /// Highest-probability emotion; ties resolve to the earlier class.
    pub fn dominant(&self) -> (Emotion, f64) {
        let mut best = (Emotion::Neutral, self.probabilities[0]);
        for (emotion, p) in self.iter().skip(1) {
            if p > best.1 {
                best = (emotion, p);
            }
        }
        best
    }

    /// Emotions ordered by descending probability.
    pub fn ranked(&self) -> Vec<(Emotion, f64)> {
        let mut ranked: Vec<_> = self.iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

impl Serialize for EmotionDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Emotion::COUNT))?;
        for (emotion, p) in self.iter() {
            map.serialize_entry(emotion.label(), &p)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_labels_follow_model_order() {
        let labels: Vec<_> = Emotion::ALL.iter().map(|e| e.label()).collect();
        assert_eq!(
            labels,
            [
                "neutral",
                "happiness",
                "surprise",
                "sadness",
                "anger",
                "disgust",
                "fear",
                "contempt"
            ]
        );
        assert_eq!(Emotion::Contempt.index(), 7);
    }

    #[rstest]
    #[case::exact("happiness", Some(Emotion::Happiness))]
    #[case::mixed_case(" Anger ", Some(Emotion::Anger))]
    #[case::unknown("joy", None)]
    #[case::empty("", None)]
    fn test_from_label(#[case] label: &str, #[case] expected: Option<Emotion>) {
        assert_eq!(Emotion::from_label(label), expected);
    }

    #[test]
    fn test_title() {
        assert_eq!(Emotion::Surprise.title(), "Surprise");
    }

    #[test]
    fn test_softmax_of_equal_logits_is_uniform() {
        let dist = EmotionDistribution::from_logits(&[0.5; 8]).unwrap();
        for (_, p) in dist.iter() {
            assert_relative_eq!(p, 0.125, epsilon = 1e-12);
        }
    }

    #[rstest]
    #[case::small([0.1, -0.3, 2.0, 0.0, 1.5, -1.0, 0.2, 0.7])]
    #[case::large([900.0, 880.0, 10.0, -500.0, 0.0, 1.0, 2.0, 3.0])]
    #[case::negative([-40.0, -41.0, -39.5, -60.0, -44.0, -42.0, -43.0, -45.0])]
    fn test_softmax_sums_to_one(#[case] logits: [f32; 8]) {
        let dist = EmotionDistribution::from_logits(&logits).unwrap();
        assert!((dist.sum() - 1.0).abs() <= 1e-6);
    }

    #[test]
    fn test_softmax_dominant_follows_largest_logit() {
        let dist =
            EmotionDistribution::from_logits(&[0.0, 5.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(dist.dominant().0, Emotion::Happiness);
    }

    #[rstest]
    #[case::too_few(vec![0.0; 7])]
    #[case::too_many(vec![0.0; 9])]
    #[case::nan(vec![0.0, f32::NAN, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])]
    fn test_from_logits_rejects_malformed(#[case] logits: Vec<f32>) {
        assert!(EmotionDistribution::from_logits(&logits).is_err());
    }

    #[test]
    fn test_fallbacks_sum_to_one() {
        assert!((EmotionDistribution::too_small_fallback().sum() - 1.0).abs() <= 1e-6);
        assert!((EmotionDistribution::failure_fallback().sum() - 1.0).abs() <= 1e-6);
        assert_eq!(
            EmotionDistribution::too_small_fallback().dominant(),
            (Emotion::Neutral, 0.80)
        );
    }

    #[test]
    fn test_new_rescales_when_sum_far_from_one() {
        let dist = EmotionDistribution::new([0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(dist.probability(Emotion::Neutral), 0.25);
        assert_relative_eq!(dist.sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_new_keeps_sum_within_tolerance() {
        let dist = EmotionDistribution::new([0.55, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(dist.probability(Emotion::Neutral), 0.55);
    }

    #[test]
    fn test_dominant_tie_prefers_earlier_class() {
        let dist = EmotionDistribution::new([0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(dist.dominant().0, Emotion::Surprise);
    }

    #[test]
    fn test_ranked_orders_descending() {
        let dist = EmotionDistribution::failure_fallback();
        let ranked = dist.ranked();
        assert_eq!(ranked[0].0, Emotion::Neutral);
        assert_eq!(ranked[1].0, Emotion::Happiness);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_serializes_as_label_map() {
        let value = serde_json::to_value(EmotionDistribution::too_small_fallback()).unwrap();
        assert_eq!(value["neutral"], 0.8);
        assert_eq!(value["contempt"], 0.01);
        assert_eq!(value.as_object().unwrap().len(), 8);
    }
}
