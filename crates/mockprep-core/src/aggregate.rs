use std::collections::BTreeMap;

use mockprep_schema::{EmotionData, EmotionLabel};

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Mean of the scored responses, one decimal. `None` when nothing was scored.
pub fn mean_score(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let total: f64 = scores.iter().sum();
    Some(round_to(total / scores.len() as f64, 1))
}

/// Per-label average over the samples that carry that label, three decimals.
///
/// Samples without averages contribute to no denominator. Labels outside
/// [`EmotionLabel::ALL`] are ignored.
pub fn emotion_summary<'a, I>(samples: I) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a EmotionData>,
{
    let mut totals: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for data in samples {
        for (label, value) in &data.averages {
            if !is_known_label(label) {
                continue;
            }
            let entry = totals.entry(label.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    totals
        .into_iter()
        .map(|(label, (sum, count))| (label, round_to(sum / f64::from(count), 3)))
        .collect()
}

fn is_known_label(label: &str) -> bool {
    EmotionLabel::ALL.iter().any(|known| known.as_str() == label)
}
