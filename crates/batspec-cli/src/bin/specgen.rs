//! specgen - render and store spectrogram artifacts for recordings
//!
//! Usage: specgen [--config config.toml] [--output-dir DIR] [--id ID] <inputs...>

use anyhow::{Context, Result};
use batspec_cli::output::{print_json, GenerationSummary};
use batspec_core::{process_and_store, ArtifactStore, PipelineConfig, Settings};
use clap::Parser;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "specgen")]
#[command(about = "Generate full and segment-compressed spectrograms", long_about = None)]
struct Args {
    /// Input audio files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Path to configuration file (TOML). Defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact directory, overrides `storage.base_directory`
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Recording id (single input only). Defaults to the input file stem
    #[arg(long)]
    id: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    batspec_cli::init_logging(args.verbose);

    if args.id.is_some() && args.inputs.len() > 1 {
        anyhow::bail!("--id can only be used with a single input file");
    }

    let mut settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(dir) = &args.output_dir {
        settings.storage.base_directory = dir.display().to_string();
    }

    let store = settings.open_store();
    let config = settings.pipeline();
    log::info!(
        "Processing {} input(s) into {}",
        args.inputs.len(),
        store.base_dir().display()
    );

    let summaries: Vec<GenerationSummary> = args
        .inputs
        .par_iter()
        .map(|input| {
            let recording_id = match &args.id {
                Some(id) => id.clone(),
                None => match recording_id_for(input) {
                    Ok(id) => id,
                    Err(e) => return GenerationSummary::error(input, None, &e),
                },
            };
            let start = Instant::now();
            match generate(&store, &recording_id, input, &config) {
                Ok(artifacts) => GenerationSummary::success(input, &recording_id, &artifacts, start.elapsed()),
                Err(e) => {
                    log::error!("{}: {:#}", input.display(), e);
                    GenerationSummary::error(input, Some(&recording_id), &e)
                }
            }
        })
        .collect();

    print_json(&summaries);

    let failed = summaries.iter().filter(|s| !s.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} input(s) failed", failed, summaries.len());
    }
    Ok(())
}

fn recording_id_for(input: &Path) -> Result<String> {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a recording id from {}", input.display()))
}

fn generate(
    store: &dyn ArtifactStore,
    recording_id: &str,
    input: &Path,
    config: &PipelineConfig,
) -> Result<batspec_core::Artifacts> {
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let artifacts = process_and_store(store, recording_id, &bytes, config)
        .with_context(|| format!("Failed to process {}", input.display()))?;
    Ok(artifacts)
}
