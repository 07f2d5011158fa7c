//! Replay harness and aggregate metrics
//!
//! Drives the commit engine over recorded frame sequences, grades the
//! committed text against expectations, and aggregates accuracy,
//! latency percentiles, and rescue-quality statistics. Cases are
//! independent, so they fan out across a worker pool and are gathered
//! back in input order.

use std::collections::BTreeMap;
use std::path::Path;
use std::thread;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::engine::{BlockReason, Engine, Frame, RescueOutcome, SampleSource, StreamState};
use crate::text::{normalize, similarity};

/// Committed text must reach this similarity to the expectation.
const GRADE_SIM: f64 = 0.9;

/// Fatal corpus-loading failures. Reported before any processing; all
/// per-case anomalies are captured in the structured output instead.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("cannot read cases file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cases file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cases file {path} contains no test cases")]
    Empty { path: String },
}

/// One recorded scan session plus optional grading expectations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
    /// Brand the rescue heuristic should have inferred, when known.
    #[serde(default)]
    pub expected_brand: Option<String>,
    /// Expected committed text; absent means the stream must not commit.
    #[serde(default)]
    pub expected_committed: Option<String>,
}

/// Replay outcome for one case. Read-only once computed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub id: String,
    pub committed_text: String,
    pub committed_correct: bool,
    /// Milliseconds from the first frame to the first live fused text.
    pub live_text_ms: Option<f64>,
    /// Milliseconds from the first frame to the commit.
    pub commit_ms: Option<f64>,
    /// Whether the committed text was literal OCR or a rescued brand.
    pub committed_source: Option<SampleSource>,
    pub rescue_applied_count: u32,
    pub false_rescue_count: u32,
    /// Blocked rescues by reason, for corpus-level rescue tuning.
    pub rescue_blocks: BTreeMap<BlockReason, u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub live_text_p50_ms: Option<f64>,
    pub live_text_p95_ms: Option<f64>,
    pub commit_p50_ms: Option<f64>,
    pub commit_p95_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescueSummary {
    pub total_applied: u32,
    pub false_rescue_rate_pct: f64,
}

/// Aggregate report emitted on stdout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub generated_at: String,
    pub cases: usize,
    pub commit_accuracy_pct: f64,
    pub latency: LatencySummary,
    pub rescue: RescueSummary,
    pub per_case: Vec<CaseResult>,
}

/// Load the test-case corpus. Missing, malformed, or empty corpora are
/// configuration errors and abort before any processing.
pub fn load_cases(path: &Path) -> Result<Vec<TestCase>, CorpusError> {
    let display = path.display().to_string();

    let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Read {
        path: display.clone(),
        source,
    })?;

    let cases: Vec<TestCase> =
        serde_json::from_str(&content).map_err(|source| CorpusError::Parse {
            path: display.clone(),
            source,
        })?;

    if cases.is_empty() {
        return Err(CorpusError::Empty { path: display });
    }

    Ok(cases)
}

/// Replay one case sequentially through a fresh stream.
pub fn run_case(engine: &Engine, case: &TestCase) -> CaseResult {
    let mut state = StreamState::new();
    let mut rescue_applied = 0u32;
    let mut false_rescues = 0u32;
    let mut rescue_blocks: BTreeMap<BlockReason, u32> = BTreeMap::new();
    let mut committed_source = None;
    let start_ms = case.frames.first().map(|f| f.t_ms).unwrap_or(0.0);

    for frame in &case.frames {
        let outcome = engine.tick(&mut state, frame);
        match &outcome.rescue {
            Some(RescueOutcome::Applied { brand, .. }) => {
                rescue_applied += 1;
                if let Some(expected) = &case.expected_brand {
                    if normalize(brand) != normalize(expected) {
                        false_rescues += 1;
                    }
                }
            }
            Some(RescueOutcome::Blocked(reason)) => {
                *rescue_blocks.entry(*reason).or_insert(0) += 1;
            }
            None => {}
        }
        if outcome.committed {
            committed_source = Some(state.fused_source);
        }
    }

    let committed_text = state.committed_text.clone().unwrap_or_default();
    let committed_correct = match &case.expected_committed {
        Some(expected) => similarity(expected, &committed_text) >= GRADE_SIM,
        None => committed_text.is_empty(),
    };

    debug!(
        "Case {}: committed '{}' ({})",
        case.id,
        committed_text,
        if committed_correct { "correct" } else { "wrong" }
    );

    CaseResult {
        id: case.id.clone(),
        committed_text,
        committed_correct,
        live_text_ms: state.first_live_ms.map(|t| t - start_ms),
        commit_ms: state.commit_ms.map(|t| t - start_ms),
        committed_source,
        rescue_applied_count: rescue_applied,
        false_rescue_count: false_rescues,
        rescue_blocks,
    }
}

/// Replay every case and aggregate the summary.
pub fn run(engine: &Engine, cases: &[TestCase]) -> Summary {
    let results = run_all(engine, cases);
    summarize(results)
}

/// Fan independent cases out over a worker pool; results come back in
/// input order so the report is deterministic.
fn run_all(engine: &Engine, cases: &[TestCase]) -> Vec<CaseResult> {
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(cases.len().max(1));

    if workers <= 1 {
        return cases.iter().map(|case| run_case(engine, case)).collect();
    }

    let (job_tx, job_rx) = crossbeam_channel::unbounded();
    let (result_tx, result_rx) = crossbeam_channel::unbounded();

    for job in cases.iter().enumerate() {
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok((index, case)) = job_rx.recv() {
                    let _ = result_tx.send((index, run_case(engine, case)));
                }
            });
        }
    });
    drop(result_tx);

    let mut indexed: Vec<(usize, CaseResult)> = result_rx.iter().collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}

fn summarize(results: Vec<CaseResult>) -> Summary {
    let cases = results.len();
    let correct = results.iter().filter(|r| r.committed_correct).count();

    let live: Vec<f64> = results.iter().filter_map(|r| r.live_text_ms).collect();
    let commit: Vec<f64> = results.iter().filter_map(|r| r.commit_ms).collect();

    let total_applied: u32 = results.iter().map(|r| r.rescue_applied_count).sum();
    let total_false: u32 = results.iter().map(|r| r.false_rescue_count).sum();
    let false_rescue_rate_pct = if total_applied > 0 {
        total_false as f64 / total_applied as f64 * 100.0
    } else {
        0.0
    };

    let commit_accuracy_pct = if cases > 0 {
        correct as f64 / cases as f64 * 100.0
    } else {
        0.0
    };

    info!(
        "Replayed {} cases: {:.1}% commit accuracy, {} rescues applied",
        cases, commit_accuracy_pct, total_applied
    );

    Summary {
        generated_at: Utc::now().to_rfc3339(),
        cases,
        commit_accuracy_pct,
        latency: LatencySummary {
            live_text_p50_ms: percentile(&live, 50.0),
            live_text_p95_ms: percentile(&live, 95.0),
            commit_p50_ms: percentile(&commit, 50.0),
            commit_p95_ms: percentile(&commit, 95.0),
        },
        rescue: RescueSummary {
            total_applied,
            false_rescue_rate_pct,
        },
        per_case: results,
    }
}

/// Nearest-rank percentile: `ceil(p/100 * n) - 1`, clamped. `None` for
/// an empty sample.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    Some(sorted[index])
}
