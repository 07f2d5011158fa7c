//! Per-frame observation records from the external recognition pipeline
//!
//! Frames are immutable inputs consumed once per tick. Malformed numeric
//! fields are never rejected; they are clamped or defaulted at the point
//! of use.

use serde::Deserialize;

/// One brand hypothesis attached to a frame by the upstream recognizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandCandidate {
    pub brand: String,
    #[serde(default)]
    pub regex_score: f64,
}

/// A single video-frame text observation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Frame timestamp in milliseconds.
    pub t_ms: f64,
    /// Raw OCR output for the frame, possibly empty or garbled.
    #[serde(default)]
    pub raw_text: String,
    /// Package/text detection confidence in [0, 1].
    #[serde(default)]
    pub det_score: f64,
    /// Crop quality score in [0, 1].
    #[serde(default)]
    pub crop_score: f64,
    /// OCR engine confidence in [0, 1]; 0.5 when the engine reports none.
    #[serde(default = "default_ocr_conf")]
    pub ocr_conf: f64,
    /// Pre-computed brand hypotheses, when the upstream recognizer ran.
    /// Absent means the engine derives candidates from the raw text.
    #[serde(default)]
    pub brand_candidates: Option<Vec<BrandCandidate>>,
    /// Green packaging color cue in [0, 1].
    #[serde(default)]
    pub green_cue: Option<f64>,
    /// Orange packaging color cue in [0, 1].
    #[serde(default)]
    pub orange_cue: Option<f64>,
    /// Normalized sharpness of the text crop in [0, 1].
    #[serde(default)]
    pub sharp_norm: Option<f64>,
    /// Normalized contrast of the text crop in [0, 1].
    #[serde(default)]
    pub contrast_norm: Option<f64>,
    /// Brand co-occurrence cue in [0, 1].
    #[serde(default)]
    pub cooccurrence_cue: Option<f64>,
}

pub(crate) const DEFAULT_OCR_CONF: f64 = 0.5;

fn default_ocr_conf() -> f64 {
    DEFAULT_OCR_CONF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_deserializes_camel_case() {
        let json = r#"{
            "tMs": 160,
            "rawText": "FANTA",
            "detScore": 0.9,
            "cropScore": 0.8,
            "ocrConf": 0.7,
            "orangeCue": 0.95,
            "brandCandidates": [{"brand": "Fanta", "regexScore": 0.56}]
        }"#;

        let frame: Frame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.t_ms, 160.0);
        assert_eq!(frame.raw_text, "FANTA");
        assert_eq!(frame.det_score, 0.9);
        assert_eq!(frame.orange_cue, Some(0.95));
        let candidates = frame.brand_candidates.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].brand, "Fanta");
        assert_eq!(candidates[0].regex_score, 0.56);
    }

    #[test]
    fn test_frame_defaults() {
        let frame: Frame = serde_json::from_str(r#"{"tMs": 0}"#).unwrap();
        assert_eq!(frame.raw_text, "");
        assert_eq!(frame.det_score, 0.0);
        assert_eq!(frame.crop_score, 0.0);
        assert_eq!(frame.ocr_conf, DEFAULT_OCR_CONF);
        assert!(frame.brand_candidates.is_none());
        assert!(frame.green_cue.is_none());
        assert!(frame.cooccurrence_cue.is_none());
    }
}
