//! Confidence heuristic derived from browser-side emotion detection.
//!
//! This is a fixed linear weighting, not a fitted model: calm and positive
//! expressions raise the score, anxious and negative ones lower it, and a
//! sample with no signal sits at the midpoint.

use mockprep_schema::{EmotionData, EmotionLabel};

use crate::aggregate::round_to;

const POSITIVE_WEIGHTS: [(EmotionLabel, f64); 3] = [
    (EmotionLabel::Happy, 0.3),
    (EmotionLabel::Neutral, 0.4),
    (EmotionLabel::Surprised, 0.1),
];

const NEGATIVE_WEIGHTS: [(EmotionLabel, f64); 4] = [
    (EmotionLabel::Fearful, 0.3),
    (EmotionLabel::Sad, 0.2),
    (EmotionLabel::Angry, 0.1),
    (EmotionLabel::Disgusted, 0.1),
];

/// Confidence score in [0, 100], one decimal. Absent data, or data without
/// averages, yields 0.0; an all-zero sample yields 50.0.
pub fn estimate_confidence(emotions: Option<&EmotionData>) -> f64 {
    let Some(data) = emotions.filter(|d| d.has_averages()) else {
        return 0.0;
    };

    let weighted = |weights: &[(EmotionLabel, f64)]| -> f64 {
        weights
            .iter()
            .map(|(label, weight)| data.intensity(*label) * weight)
            .sum()
    };
    let positive = weighted(&POSITIVE_WEIGHTS);
    let negative = weighted(&NEGATIVE_WEIGHTS);

    let confidence = ((positive - negative) * 100.0 + 50.0).clamp(0.0, 100.0);
    round_to(confidence, 1)
}
