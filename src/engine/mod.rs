//! OCR stabilization and brand-commit engine
//!
//! Turns a stream of noisy per-frame text observations into a single
//! trusted string: per-frame rescue, reliability weighting, temporal
//! fusion over a sliding window, and a terminal commit state machine.

pub mod commit;
pub mod config;
pub mod frame;
pub mod fusion;
pub mod rescue;
pub mod sample;

pub use commit::{Engine, StreamState, TickOutcome};
pub use config::EngineConfig;
pub use frame::{BrandCandidate, Frame};
pub use fusion::FusionResult;
pub use rescue::{BlockReason, RescueOutcome, Rescuer};
pub use sample::{Sample, SampleSource};

/// Clamp a possibly malformed score into [0, 1]. NaN maps to 0.0.
pub(crate) fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
