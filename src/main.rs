//! brandlock - Streaming OCR stabilization and brand-commit engine
//!
//! Replays recorded per-frame text-recognition samples through the
//! fusion/commit decision core and emits an aggregate accuracy report.

mod engine;
mod harness;
mod text;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::engine::{Engine, EngineConfig};

/// brandlock - replay harness for the OCR stabilization engine
#[derive(Parser, Debug)]
#[command(name = "brandlock")]
#[command(about = "Replays recorded OCR frame streams and reports commit accuracy")]
struct Args {
    /// Path to the JSON test-case corpus
    #[arg(short, long, default_value = "cases.json", env = "BRANDLOCK_CASES")]
    cases: PathBuf,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let cases = harness::load_cases(&args.cases)
        .with_context(|| format!("failed to load test-case corpus from {:?}", args.cases))?;
    info!("Loaded {} test cases from {:?}", cases.len(), args.cases);

    let engine = Engine::new(EngineConfig::default())?;
    let summary = harness::run(&engine, &cases);

    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
