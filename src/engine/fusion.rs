//! Temporal fusion of the sample window
//!
//! Merges the sliding window of weighted samples into one best current
//! text plus a confidence. Scoring is a weighted vote over string
//! similarity, so low-confidence near-duplicates still contribute
//! partial support instead of splitting the vote.

use std::collections::HashMap;

use super::clamp01;
use super::config::EngineConfig;
use super::sample::{Sample, SampleSource};
use crate::text::similarity;

/// Fused reading for the current window. Recomputed every tick.
#[derive(Debug, Clone)]
pub struct FusionResult {
    pub text: String,
    pub conf: f64,
    pub source: SampleSource,
    pub rescue_brand: Option<String>,
    /// Rescued samples agreeing with the fused text (sim >= 0.82).
    pub rescued_hit_count: usize,
    /// Raw samples loosely corroborating it (sim >= 0.45).
    pub raw_support_count: usize,
}

impl FusionResult {
    fn empty() -> Self {
        Self {
            text: String::new(),
            conf: 0.0,
            source: SampleSource::Raw,
            rescue_brand: None,
            rescued_hit_count: 0,
            raw_support_count: 0,
        }
    }
}

/// Fuse the current window into a single best reading.
pub fn fuse(window: &[Sample], config: &EngineConfig) -> FusionResult {
    let usable: Vec<&Sample> = window
        .iter()
        .filter(|s| s.norm_text.chars().count() >= config.min_text_len)
        .collect();
    if usable.is_empty() {
        return FusionResult::empty();
    }

    let total_weight: f64 = usable.iter().map(|s| s.weight()).sum();
    if total_weight <= f64::EPSILON {
        return FusionResult::empty();
    }

    // One candidate per distinct normalized text, keeping the
    // highest-weight sample. Ties break on (earlier ts, smaller text)
    // so the result is independent of window insertion order.
    let mut candidates: HashMap<&str, &Sample> = HashMap::new();
    for &sample in &usable {
        candidates
            .entry(sample.norm_text.as_str())
            .and_modify(|held| {
                if prefers(sample, *held) {
                    *held = sample;
                }
            })
            .or_insert(sample);
    }

    // Weighted-voting cluster score per candidate.
    let mut scored: Vec<(&Sample, f64)> = candidates
        .into_values()
        .map(|candidate| {
            let score: f64 = usable
                .iter()
                .map(|s| s.weight() * similarity(&candidate.norm_text, &s.norm_text))
                .sum();
            (candidate, score)
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| a.0.norm_text.cmp(&b.0.norm_text))
    });

    let (mut best, mut best_score) = scored[0];

    // Rescue is a last resort: prefer the strongest raw candidate when
    // it scores within raw_preference_ratio of a rescued winner.
    if best.source == SampleSource::Rescued {
        if let Some((raw, raw_score)) = scored
            .iter()
            .find(|(candidate, _)| candidate.source == SampleSource::Raw)
        {
            if *raw_score >= config.raw_preference_ratio * best_score {
                best = *raw;
                best_score = *raw_score;
            }
        }
    }

    let rescued_hit_count = usable
        .iter()
        .filter(|s| {
            s.source == SampleSource::Rescued
                && similarity(&s.norm_text, &best.norm_text) >= config.rescued_hit_sim
        })
        .count();
    let raw_support_count = usable
        .iter()
        .filter(|s| {
            s.source == SampleSource::Raw
                && similarity(&s.norm_text, &best.norm_text) >= config.raw_support_sim
        })
        .count();

    FusionResult {
        text: best.text.clone(),
        conf: clamp01(best_score / total_weight),
        source: best.source,
        rescue_brand: best.rescue_brand.clone(),
        rescued_hit_count,
        raw_support_count,
    }
}

/// Dedupe preference: higher weight, then earlier timestamp, then
/// smaller original text.
fn prefers(challenger: &Sample, held: &Sample) -> bool {
    let cw = challenger.weight();
    let hw = held.weight();
    if cw != hw {
        return cw > hw;
    }
    if challenger.ts != held.ts {
        return challenger.ts < held.ts;
    }
    challenger.text < held.text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::frame::Frame;

    fn raw_sample(ts: f64, text: &str, det: f64, crop: f64, ocr: f64) -> Sample {
        let frame: Frame = serde_json::from_str(&format!(
            r#"{{"tMs": {ts}, "rawText": "{text}", "detScore": {det}, "cropScore": {crop}, "ocrConf": {ocr}}}"#
        ))
        .unwrap();
        Sample::raw(&frame)
    }

    fn rescued_sample(ts: f64, brand: &str, score: f64) -> Sample {
        let frame: Frame = serde_json::from_str(&format!(
            r#"{{"tMs": {ts}, "rawText": "", "detScore": 1.0, "cropScore": 1.0, "ocrConf": 1.0}}"#
        ))
        .unwrap();
        Sample::rescued(&frame, brand, score)
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_empty_window() {
        let result = fuse(&[], &config());
        assert!(result.text.is_empty());
        assert_eq!(result.conf, 0.0);
    }

    #[test]
    fn test_short_texts_are_unusable() {
        let window = vec![raw_sample(0.0, "f", 0.9, 0.9, 0.9)];
        let result = fuse(&window, &config());
        assert!(result.text.is_empty());
    }

    #[test]
    fn test_dominant_text_wins() {
        let window = vec![
            raw_sample(0.0, "fanta", 0.9, 0.9, 0.9),
            raw_sample(100.0, "fanta", 0.9, 0.9, 0.9),
            raw_sample(200.0, "fanta", 0.9, 0.9, 0.9),
            raw_sample(300.0, "xqz", 0.3, 0.3, 0.3),
        ];
        let result = fuse(&window, &config());
        assert_eq!(result.text, "fanta");
        assert_eq!(result.source, SampleSource::Raw);
        assert!(result.conf > 0.8);
    }

    #[test]
    fn test_identical_texts_give_full_confidence() {
        let window = vec![
            raw_sample(0.0, "urge", 0.6, 0.6, 0.6),
            raw_sample(100.0, "urge", 0.9, 0.9, 0.9),
        ];
        let result = fuse(&window, &config());
        assert_eq!(result.text, "urge");
        assert!((result.conf - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_order_independent() {
        let samples = vec![
            raw_sample(0.0, "fanta", 0.9, 0.8, 0.7),
            raw_sample(100.0, "fnta", 0.8, 0.8, 0.8),
            raw_sample(200.0, "fanta", 0.7, 0.9, 0.6),
            rescued_sample(300.0, "Fanta", 0.9),
            raw_sample(400.0, "solo", 0.5, 0.5, 0.5),
        ];
        let forward = fuse(&samples, &config());

        let mut reversed = samples.clone();
        reversed.reverse();
        let backward = fuse(&reversed, &config());

        assert_eq!(forward.text, backward.text);
        assert!((forward.conf - backward.conf).abs() < 1e-12);
        assert_eq!(forward.source, backward.source);
    }

    #[test]
    fn test_raw_preference_override() {
        // Two rescued "Fanta" (weight 0.96) vs one raw "fnta" (weight 1.0):
        //   score(fanta) = 0.96*2 + 1.0*0.8 = 2.72
        //   score(fnta)  = 0.96*0.8*2 + 1.0 = 2.536
        // 2.536 >= 0.92 * 2.72, so the raw reading wins.
        let window = vec![
            rescued_sample(0.0, "Fanta", 1.0),
            rescued_sample(100.0, "Fanta", 1.0),
            raw_sample(200.0, "fnta", 1.0, 1.0, 1.0),
        ];
        let result = fuse(&window, &config());
        assert_eq!(result.text, "fnta");
        assert_eq!(result.source, SampleSource::Raw);
    }

    #[test]
    fn test_rescued_wins_without_close_raw() {
        let window = vec![
            rescued_sample(0.0, "Urge", 0.9),
            rescued_sample(100.0, "Urge", 0.9),
            raw_sample(200.0, "zzzz", 0.4, 0.4, 0.4),
        ];
        let result = fuse(&window, &config());
        assert_eq!(result.text, "Urge");
        assert_eq!(result.source, SampleSource::Rescued);
        assert_eq!(result.rescue_brand.as_deref(), Some("Urge"));
    }

    #[test]
    fn test_corroboration_counts() {
        // Best is rescued "Fanta"; one garbled raw read still counts as
        // loose support (sim("fan", "fanta") = 0.6 >= 0.45).
        let window = vec![
            rescued_sample(0.0, "Fanta", 0.9),
            rescued_sample(100.0, "Fanta", 0.9),
            raw_sample(200.0, "fan", 0.4, 0.4, 0.4),
        ];
        let result = fuse(&window, &config());
        assert_eq!(result.text, "Fanta");
        assert_eq!(result.rescued_hit_count, 2);
        assert_eq!(result.raw_support_count, 1);
    }
}
