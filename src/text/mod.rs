//! Text normalization and similarity scoring
//!
//! Every similarity comparison in the engine (fusion clustering, stability
//! checks, final-answer grading) goes through [`similarity`] so all
//! thresholds live on one scale.

use strsim::levenshtein;

/// Canonicalize OCR output: lowercase, strip characters that are not
/// letters, digits, or whitespace, collapse internal whitespace, trim.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;

    for ch in lowered.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() {
                pending_space = true;
            }
        } else if ch.is_alphanumeric() {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        }
        // Punctuation and symbols are dropped outright.
    }

    out
}

/// Bounded string similarity in [0, 1].
///
/// Inputs are normalized first; `1.0` when both normalize to empty,
/// `0.0` when exactly one does, otherwise `1 - distance / max(len)`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let distance = levenshtein(&a, &b) as f64;
    let max_len = a.chars().count().max(b.chars().count()).max(1) as f64;

    (1.0 - distance / max_len).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_and_collapses() {
        assert_eq!(normalize("  Coca-Cola  Zero! "), "cocacola zero");
        assert_eq!(normalize("FANTA"), "fanta");
        assert_eq!(normalize("a\t\nb"), "a b");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in ["  Urge 0.5L ", "PEPSI  MAX", "órgão", ""] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_similarity_identity() {
        assert!((similarity("fanta", "fanta") - 1.0).abs() < 1e-9);
        assert!((similarity("Fanta", "fanta") - 1.0).abs() < 1e-9);
        assert!((similarity("", "") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_empty_vs_nonempty() {
        assert_eq!(similarity("", "a"), 0.0);
        assert_eq!(similarity("a", ""), 0.0);
        // Punctuation-only input normalizes to empty.
        assert_eq!(similarity("!!!", "fanta"), 0.0);
    }

    #[test]
    fn test_similarity_partial() {
        // One edit across five characters.
        assert!((similarity("hello", "hallo") - 0.8).abs() < 1e-9);
        assert!(similarity("abc", "xyz") < 0.5);
    }

    #[test]
    fn test_similarity_symmetric() {
        let ab = similarity("kitten", "sitting");
        let ba = similarity("sitting", "kitten");
        assert!((ab - ba).abs() < 1e-9);
    }
}
