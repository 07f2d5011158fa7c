//! Commit state machine
//!
//! One `StreamState` per scan session, mutated only by [`Engine::tick`].
//! The stream moves NO_TEXT -> LIVE -> COMMITTED; commit is terminal and
//! gated by hysteresis (stability, continuity) plus evidence-quality
//! checks. A stream that never commits is a valid outcome, not an error.

use std::collections::VecDeque;

use anyhow::Result;
use tracing::debug;

use super::clamp01;
use super::config::EngineConfig;
use super::frame::Frame;
use super::fusion::fuse;
use super::rescue::{RescueOutcome, Rescuer};
use super::sample::{Sample, SampleSource};
use crate::text::{normalize, similarity};

/// Mutable per-stream state, owned by the caller.
#[derive(Debug)]
pub struct StreamState {
    window: VecDeque<Sample>,
    pub fused_text: String,
    pub fused_conf: f64,
    pub fused_source: SampleSource,
    pub rescue_brand: Option<String>,
    pub rescued_hit_count: usize,
    pub raw_support_count: usize,
    /// Consecutive ticks whose fused text stayed similar.
    pub stable_count: u32,
    /// Terminal once set; never overwritten.
    pub committed_text: Option<String>,
    /// Start of the current unbroken run of confident detections.
    continuity_start_ms: Option<f64>,
    /// Timestamp of the first non-empty fused text.
    pub first_live_ms: Option<f64>,
    /// Timestamp of the commit, when one happened.
    pub commit_ms: Option<f64>,
}

impl StreamState {
    pub fn new() -> Self {
        Self {
            window: VecDeque::new(),
            fused_text: String::new(),
            fused_conf: 0.0,
            fused_source: SampleSource::Raw,
            rescue_brand: None,
            rescued_hit_count: 0,
            raw_support_count: 0,
            stable_count: 0,
            committed_text: None,
            continuity_start_ms: None,
            first_live_ms: None,
            commit_ms: None,
        }
    }

    fn push_sample(&mut self, sample: Sample, capacity: usize) {
        while self.window.len() >= capacity.max(1) {
            self.window.pop_front();
        }
        self.window.push_back(sample);
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

/// What one tick did, for harness-side diagnostics.
#[derive(Debug)]
pub struct TickOutcome {
    /// Frame was dropped by the skip-if-noisy shortcut.
    pub skipped: bool,
    /// Rescue result for the frame, when the frame was processed.
    pub rescue: Option<RescueOutcome>,
    /// This tick performed the commit.
    pub committed: bool,
}

/// Stabilization engine: compiled brand dictionary plus tuning.
pub struct Engine {
    config: EngineConfig,
    rescuer: Rescuer,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Ok(Self {
            rescuer: Rescuer::new()?,
            config,
        })
    }

    /// Apply one frame to a stream. Frames must arrive in timestamp
    /// order; each tick depends on the previous tick's state.
    pub fn tick(&self, state: &mut StreamState, frame: &Frame) -> TickOutcome {
        let det = clamp01(frame.det_score);

        // Continuity tracks the most recent unbroken run of confident
        // detections, including frames the noise gate later drops.
        if det >= self.config.continuity_det_floor {
            if state.continuity_start_ms.is_none() {
                state.continuity_start_ms = Some(frame.t_ms);
            }
        } else {
            state.continuity_start_ms = None;
        }

        // A momentarily weak frame must not dilute an already-strong
        // fused answer.
        if det < self.config.skip_det_below && state.fused_conf >= self.config.skip_conf_above {
            debug!(
                "Skipping noisy frame at {}ms (det {:.2}, fused conf {:.2})",
                frame.t_ms, det, state.fused_conf
            );
            return TickOutcome {
                skipped: true,
                rescue: None,
                committed: false,
            };
        }

        let rescue = self.rescuer.rescue(frame);
        let sample = match &rescue {
            RescueOutcome::Applied { brand, score } => Sample::rescued(frame, brand, *score),
            RescueOutcome::Blocked(_) => Sample::raw(frame),
        };
        state.push_sample(sample, self.config.window_capacity);

        let fused = fuse(state.window.make_contiguous(), &self.config);

        if similarity(&fused.text, &state.fused_text) >= self.config.stability_sim {
            state.stable_count += 1;
        } else {
            state.stable_count = 1;
        }

        state.fused_text = fused.text;
        state.fused_conf = fused.conf;
        state.fused_source = fused.source;
        state.rescue_brand = fused.rescue_brand;
        state.rescued_hit_count = fused.rescued_hit_count;
        state.raw_support_count = fused.raw_support_count;

        if state.first_live_ms.is_none() && !state.fused_text.is_empty() {
            state.first_live_ms = Some(frame.t_ms);
        }

        let mut committed = false;
        if state.committed_text.is_none() && self.should_commit(state, frame.t_ms) {
            state.committed_text = Some(state.fused_text.clone());
            state.commit_ms = Some(frame.t_ms);
            committed = true;
            debug!(
                "Committed '{}' at {}ms (conf {:.3}, source {:?})",
                state.fused_text, frame.t_ms, state.fused_conf, state.fused_source
            );
        }

        TickOutcome {
            skipped: false,
            rescue: Some(rescue),
            committed,
        }
    }

    fn should_commit(&self, state: &StreamState, now_ms: f64) -> bool {
        let config = &self.config;

        if normalize(&state.fused_text).chars().count() < config.min_text_len {
            return false;
        }
        if state.fused_conf < config.commit_conf {
            return false;
        }
        if state.stable_count < config.min_stable_ticks {
            return false;
        }

        let continuity_ms = match state.continuity_start_ms {
            Some(start) => now_ms - start,
            None => return false,
        };
        if continuity_ms < config.min_continuity_ms {
            return false;
        }

        // Rescued commits need stronger corroboration than literal OCR.
        if state.fused_source == SampleSource::Rescued {
            if state.fused_conf < config.rescued_commit_conf {
                return false;
            }
            let corroborated = state.rescued_hit_count >= 2
                || (state.rescued_hit_count >= 1 && state.raw_support_count >= 1);
            if !corroborated {
                return false;
            }
        }

        true
    }
}
