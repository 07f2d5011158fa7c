//! Brand rescue heuristic
//!
//! When literal OCR is weak (occlusion, glare, motion) the rescue pass
//! infers a likely brand from tolerant pattern matches plus non-text
//! visual cues, and only substitutes it when the evidence is unambiguous.
//! The brand dictionary is a data table: adding a brand is a data change,
//! not a code change.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::clamp01;
use super::frame::Frame;
use crate::text::normalize;

/// Which frame color cue backs a brand's packaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorCue {
    Green,
    Orange,
    Neutral,
}

/// One row of the brand dictionary.
#[derive(Debug, Clone, Copy)]
pub struct BrandSpec {
    /// Canonical brand string emitted on a successful rescue.
    pub name: &'static str,
    /// Tolerant pattern covering common OCR confusions for this brand,
    /// matched against normalized text.
    pub pattern: &'static str,
    /// Packaging color cue selector.
    pub color: ColorCue,
    /// Minimum rescue score to apply this brand.
    pub threshold: f64,
    /// Whether the denylist guards this brand against look-alike words.
    pub denylist_guarded: bool,
}

/// Regex score assigned to candidates derived from raw text.
const DERIVED_REGEX_SCORE: f64 = 0.56;
/// Minimum lead over the runner-up candidate's regex score.
const MIN_COMPETITION_GAP: f64 = 0.15;
/// How much the visual cue score can raise the regex score.
const CUE_WEIGHT: f64 = 0.38;
const COLOR_MIX: f64 = 0.45;
const TYPOGRAPHY_MIX: f64 = 0.30;
const COOCCURRENCE_MIX: f64 = 0.25;
/// Color cue for brands without a modeled packaging color.
const NEUTRAL_COLOR_CUE: f64 = 0.3;
/// Acceptance threshold for brands without a dictionary row.
const DEFAULT_THRESHOLD: f64 = 0.70;

/// Brand dictionary. Urge and Fanta dominate the recorded corpus and
/// attract the most look-alike misreads, so they carry stricter
/// thresholds; Urge is additionally denylist-guarded because its
/// tolerant pattern can fire inside Norwegian "org..." words.
const BRAND_TABLE: &[BrandSpec] = &[
    BrandSpec {
        name: "Urge",
        pattern: r"[uvo]r[gq9]e?",
        color: ColorCue::Green,
        threshold: 0.76,
        denylist_guarded: true,
    },
    BrandSpec {
        name: "Fanta",
        pattern: r"f[a4]n[t7][a4]|tanta|fanla",
        color: ColorCue::Orange,
        threshold: 0.74,
        denylist_guarded: false,
    },
    BrandSpec {
        name: "Solo",
        pattern: r"s[o0]l[o0]",
        color: ColorCue::Orange,
        threshold: 0.70,
        denylist_guarded: false,
    },
    BrandSpec {
        name: "Sprite",
        pattern: r"spr[i1l]te|sprlte",
        color: ColorCue::Green,
        threshold: 0.70,
        denylist_guarded: false,
    },
    BrandSpec {
        name: "Pepsi Max",
        pattern: r"pep[s5][i1l]",
        color: ColorCue::Neutral,
        threshold: 0.70,
        denylist_guarded: false,
    },
    BrandSpec {
        name: "Coca-Cola",
        pattern: r"c[o0]c[a4]|c[o0]la",
        color: ColorCue::Neutral,
        threshold: 0.70,
        denylist_guarded: false,
    },
];

/// Words that disqualify a guarded brand match ("organisk" is not a
/// misread can of Urge).
const DENYLIST_PATTERN: &str = r"\b(order\w*|org\w*)";

/// Why a frame was not rescued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    NoBrandCandidate,
    DisqualifiedContext,
    BrandCompetition,
    LowRescueScore,
}

/// Outcome of the rescue pass for one frame. A blocked rescue is a
/// first-class diagnostic result, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RescueOutcome {
    Applied { brand: String, score: f64 },
    Blocked(BlockReason),
}

struct CompiledBrand {
    spec: BrandSpec,
    regex: Regex,
    norm_name: String,
}

/// A brand hypothesis under consideration for one frame.
struct Candidate {
    brand: String,
    score: f64,
}

/// Rescue engine with the brand dictionary compiled once.
pub struct Rescuer {
    brands: Vec<CompiledBrand>,
    denylist: Regex,
}

impl Rescuer {
    pub fn new() -> Result<Self> {
        let brands = BRAND_TABLE
            .iter()
            .map(|spec| {
                let regex = Regex::new(spec.pattern)
                    .with_context(|| format!("invalid brand pattern for {}", spec.name))?;
                Ok(CompiledBrand {
                    spec: *spec,
                    regex,
                    norm_name: normalize(spec.name),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let denylist =
            Regex::new(DENYLIST_PATTERN).context("invalid denylist pattern")?;

        Ok(Self { brands, denylist })
    }

    /// True when normalized text contains a denylisted look-alike word.
    pub fn disqualified(&self, normalized: &str) -> bool {
        self.denylist.is_match(normalized)
    }

    /// Attempt to recover a brand string for one frame.
    pub fn rescue(&self, frame: &Frame) -> RescueOutcome {
        let normalized = normalize(&frame.raw_text);

        let mut candidates = match &frame.brand_candidates {
            Some(supplied) => supplied
                .iter()
                .map(|c| Candidate {
                    brand: c.brand.clone(),
                    score: clamp01(c.regex_score),
                })
                .collect::<Vec<_>>(),
            None => self.derive_candidates(&normalized),
        };
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let Some(best) = candidates.first() else {
            debug!("Rescue blocked (no brand candidate): '{}'", normalized);
            return RescueOutcome::Blocked(BlockReason::NoBrandCandidate);
        };

        let spec = self.lookup(&best.brand);
        if spec.is_some_and(|s| s.denylist_guarded) && self.disqualified(&normalized) {
            debug!("Rescue blocked (disqualified context): '{}'", normalized);
            return RescueOutcome::Blocked(BlockReason::DisqualifiedContext);
        }

        let cue_score = self.cue_score(frame, spec);
        let rescue_score = clamp01(best.score + CUE_WEIGHT * cue_score);
        let threshold = spec.map_or(DEFAULT_THRESHOLD, |s| s.threshold);

        let competition_gap = match candidates.get(1) {
            Some(runner_up) => rescue_score - runner_up.score,
            None => 1.0,
        };
        if competition_gap < MIN_COMPETITION_GAP {
            debug!(
                "Rescue blocked (brand competition): {} gap {:.3}",
                best.brand, competition_gap
            );
            return RescueOutcome::Blocked(BlockReason::BrandCompetition);
        }

        if rescue_score < threshold {
            debug!(
                "Rescue blocked (low rescue score): {} {:.3} < {:.2}",
                best.brand, rescue_score, threshold
            );
            return RescueOutcome::Blocked(BlockReason::LowRescueScore);
        }

        let brand = spec.map_or_else(|| best.brand.clone(), |s| s.name.to_string());
        debug!("Rescue applied: {} ({:.3})", brand, rescue_score);
        RescueOutcome::Applied {
            brand,
            score: rescue_score,
        }
    }

    /// Derive brand candidates from normalized raw text via the
    /// dictionary patterns. Dictionary order is the deterministic
    /// tie-break for equal scores.
    fn derive_candidates(&self, normalized: &str) -> Vec<Candidate> {
        if normalized.is_empty() {
            return Vec::new();
        }
        self.brands
            .iter()
            .filter(|b| b.regex.is_match(normalized))
            .map(|b| Candidate {
                brand: b.spec.name.to_string(),
                score: DERIVED_REGEX_SCORE,
            })
            .collect()
    }

    fn lookup(&self, brand: &str) -> Option<&BrandSpec> {
        let norm = normalize(brand);
        self.brands
            .iter()
            .find(|b| b.norm_name == norm)
            .map(|b| &b.spec)
    }

    /// Blend color, typography, and co-occurrence cues into [0, 1].
    fn cue_score(&self, frame: &Frame, spec: Option<&BrandSpec>) -> f64 {
        let color_cue = match spec.map(|s| s.color) {
            Some(ColorCue::Green) => frame.green_cue.map(clamp01).unwrap_or(0.0),
            Some(ColorCue::Orange) => frame.orange_cue.map(clamp01).unwrap_or(0.0),
            Some(ColorCue::Neutral) | None => NEUTRAL_COLOR_CUE,
        };

        // Sharpness/contrast fall back to the crop score when the
        // upstream pipeline did not compute them.
        let crop = clamp01(frame.crop_score);
        let sharp = frame.sharp_norm.map(clamp01).unwrap_or(crop);
        let contrast = frame.contrast_norm.map(clamp01).unwrap_or(crop);
        let typography_cue = (sharp + contrast) / 2.0;

        let cooccurrence = frame.cooccurrence_cue.map(clamp01).unwrap_or(0.0);

        clamp01(
            COLOR_MIX * color_cue
                + TYPOGRAPHY_MIX * typography_cue
                + COOCCURRENCE_MIX * cooccurrence,
        )
    }
}
