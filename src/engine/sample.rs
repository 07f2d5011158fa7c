//! Samples and reliability weighting
//!
//! A `Sample` is one processed frame held in the fusion window. Its
//! weight scores how much the fusion vote should trust it.

use serde::Serialize;

use super::clamp01;
use super::frame::{Frame, DEFAULT_OCR_CONF};
use crate::text::normalize;

/// Where a sample's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSource {
    /// Literal OCR output.
    Raw,
    /// Brand string inferred by the rescue heuristic.
    Rescued,
}

/// One processed frame in the sliding fusion window.
#[derive(Debug, Clone)]
pub struct Sample {
    pub ts: f64,
    pub text: String,
    /// Cached `normalize(text)`; fusion keys and filters on this.
    pub norm_text: String,
    pub ocr_conf: f64,
    pub det_score: f64,
    pub crop_score: f64,
    pub source: SampleSource,
    pub rescue_brand: Option<String>,
    pub rescue_score: Option<f64>,
}

const DET_WEIGHT: f64 = 0.45;
const CROP_WEIGHT: f64 = 0.45;
const OCR_WEIGHT: f64 = 0.10;
/// Rescued text is inferred, not read; discount it systematically.
const RESCUE_PENALTY: f64 = 0.88;
/// ...but reward it in proportion to the rescue heuristic's confidence.
const RESCUE_BONUS: f64 = 0.08;

impl Sample {
    /// Build a sample carrying the frame's literal OCR text.
    pub fn raw(frame: &Frame) -> Self {
        Self::build(frame, frame.raw_text.clone(), SampleSource::Raw, None, None)
    }

    /// Build a sample carrying a rescued brand string.
    pub fn rescued(frame: &Frame, brand: &str, score: f64) -> Self {
        Self::build(
            frame,
            brand.to_string(),
            SampleSource::Rescued,
            Some(brand.to_string()),
            Some(score),
        )
    }

    fn build(
        frame: &Frame,
        text: String,
        source: SampleSource,
        rescue_brand: Option<String>,
        rescue_score: Option<f64>,
    ) -> Self {
        let ocr_conf = if frame.ocr_conf.is_nan() {
            DEFAULT_OCR_CONF
        } else {
            clamp01(frame.ocr_conf)
        };
        let norm_text = normalize(&text);
        Self {
            ts: frame.t_ms,
            text,
            norm_text,
            ocr_conf,
            det_score: clamp01(frame.det_score),
            crop_score: clamp01(frame.crop_score),
            source,
            rescue_brand,
            rescue_score,
        }
    }

    /// Reliability weight in [0, 1] for the fusion vote.
    pub fn weight(&self) -> f64 {
        let base = DET_WEIGHT * self.det_score
            + CROP_WEIGHT * self.crop_score
            + OCR_WEIGHT * self.ocr_conf;

        let (penalty, bonus) = match self.source {
            SampleSource::Rescued => (
                RESCUE_PENALTY,
                RESCUE_BONUS * clamp01(self.rescue_score.unwrap_or(0.0)),
            ),
            SampleSource::Raw => (1.0, 0.0),
        };

        clamp01(base * penalty + bonus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(det: f64, crop: f64, ocr: f64) -> Frame {
        serde_json::from_str::<Frame>(&format!(
            r#"{{"tMs": 0, "rawText": "fanta", "detScore": {det}, "cropScore": {crop}, "ocrConf": {ocr}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_raw_weight() {
        let s = Sample::raw(&frame(0.9, 0.9, 0.9));
        // 0.45*0.9 + 0.45*0.9 + 0.10*0.9 = 0.9
        assert!((s.weight() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_rescued_weight_penalty_and_bonus() {
        let f = frame(0.9, 0.9, 0.9);
        let rescued = Sample::rescued(&f, "Fanta", 1.0);
        // 0.9 * 0.88 + 0.08 * 1.0 = 0.872
        assert!((rescued.weight() - 0.872).abs() < 1e-9);

        // Rescue bonus scales with the rescue score.
        let weak = Sample::rescued(&f, "Fanta", 0.5);
        assert!(weak.weight() < rescued.weight());
    }

    #[test]
    fn test_weight_monotonic_in_scores() {
        let base = Sample::raw(&frame(0.5, 0.5, 0.5));
        assert!(Sample::raw(&frame(0.6, 0.5, 0.5)).weight() >= base.weight());
        assert!(Sample::raw(&frame(0.5, 0.6, 0.5)).weight() >= base.weight());
        assert!(Sample::raw(&frame(0.5, 0.5, 0.6)).weight() >= base.weight());
    }

    #[test]
    fn test_weight_clamps_malformed_inputs() {
        let s = Sample::raw(&frame(5.0, 5.0, 5.0));
        assert_eq!(s.weight(), 1.0);

        let mut f = frame(0.9, 0.9, 0.9);
        f.ocr_conf = f64::NAN;
        // NaN OCR confidence falls back to the 0.5 default.
        let s = Sample::raw(&f);
        assert!((s.ocr_conf - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_norm_text_cached() {
        let s = Sample::raw(&frame(0.9, 0.9, 0.9));
        assert_eq!(s.norm_text, "fanta");
    }
}
