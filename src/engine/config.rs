//! Engine tuning parameters
//!
//! Every gate here is an empirically tuned knob, not a structural
//! invariant. Defaults reproduce the behavior of the recorded corpus;
//! change them in lockstep with a replay of that corpus.

/// Tunable thresholds for fusion and commit.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sliding window capacity (oldest sample evicted first).
    pub window_capacity: usize,
    /// Minimum normalized text length for a sample to join the vote,
    /// and for a fused text to be committable.
    pub min_text_len: usize,
    /// Minimum fused confidence to commit.
    pub commit_conf: f64,
    /// Stricter confidence floor when the fused text is rescued.
    pub rescued_commit_conf: f64,
    /// Consecutive similar-fusion ticks required to commit.
    pub min_stable_ticks: u32,
    /// Similarity floor for a tick to count as "stable".
    pub stability_sim: f64,
    /// Detection floor for the continuity run.
    pub continuity_det_floor: f64,
    /// Minimum unbroken continuity before a commit.
    pub min_continuity_ms: f64,
    /// Prefer a raw candidate scoring within this ratio of a rescued
    /// fusion winner.
    pub raw_preference_ratio: f64,
    /// Skip a frame when detection drops below this...
    pub skip_det_below: f64,
    /// ...while the fused confidence is already at least this.
    pub skip_conf_above: f64,
    /// Similarity floor for a rescued sample to count as a hit.
    pub rescued_hit_sim: f64,
    /// Looser floor for garbled raw reads to count as support.
    pub raw_support_sim: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_capacity: 5,
            min_text_len: 2,
            commit_conf: 0.85,
            rescued_commit_conf: 0.88,
            min_stable_ticks: 3,
            stability_sim: 0.92,
            continuity_det_floor: 0.34,
            min_continuity_ms: 500.0,
            raw_preference_ratio: 0.92,
            skip_det_below: 0.56,
            skip_conf_above: 0.72,
            rescued_hit_sim: 0.82,
            raw_support_sim: 0.45,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tuned_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.window_capacity, 5);
        assert_eq!(config.min_text_len, 2);
        assert!((config.commit_conf - 0.85).abs() < 1e-9);
        assert!((config.rescued_commit_conf - 0.88).abs() < 1e-9);
        assert_eq!(config.min_stable_ticks, 3);
        assert!((config.stability_sim - 0.92).abs() < 1e-9);
        assert!((config.continuity_det_floor - 0.34).abs() < 1e-9);
        assert!((config.min_continuity_ms - 500.0).abs() < 1e-9);
        assert!((config.raw_preference_ratio - 0.92).abs() < 1e-9);
        assert!((config.skip_det_below - 0.56).abs() < 1e-9);
        assert!((config.skip_conf_above - 0.72).abs() < 1e-9);
    }
}
