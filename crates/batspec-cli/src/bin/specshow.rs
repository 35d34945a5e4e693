//! specshow - inspect a stored spectrogram artifact
//!
//! Prints the API response JSON for the full (default) or compressed view and
//! optionally exports the embedded PNG images.
//!
//! Usage: specshow [--compressed] [--export-dir DIR] <bundle.bspc>

use anyhow::{Context, Result};
use batspec_artifact::{ArtifactReader, SpectrogramResponse};
use batspec_cli::output::{export_pngs, print_json};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "specshow")]
#[command(about = "Print a stored spectrogram artifact as API JSON", long_about = None)]
struct Args {
    /// Artifact file (.bspc)
    bundle: PathBuf,

    /// Show the segment-compressed view instead of the full one
    #[arg(short, long)]
    compressed: bool,

    /// Write the full image and every distinct segment image here
    #[arg(short, long)]
    export_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    batspec_cli::init_logging(args.verbose);

    if !args.bundle.exists() {
        anyhow::bail!("Artifact file not found: {}", args.bundle.display());
    }

    let header = ArtifactReader::read_header(&args.bundle)
        .with_context(|| format!("Failed to read header of {}", args.bundle.display()))?;
    log::info!(
        "Header: v{} {}x{} px, {} segments, {} blobs, payload {} bytes (zstd: {})",
        header.version,
        header.width,
        header.height,
        header.num_segments,
        header.num_blobs,
        header.payload_size,
        header.is_compressed()
    );

    let bundle = ArtifactReader::read(&args.bundle)
        .with_context(|| format!("Failed to read {}", args.bundle.display()))?;
    log::info!(
        "Recording {} created {}",
        bundle.metadata.recording_id,
        bundle.metadata.created_at
    );

    let response = if args.compressed {
        SpectrogramResponse::from(&bundle.compressed)
    } else {
        SpectrogramResponse::from(&bundle.full)
    };
    print_json(&response);

    if let Some(dir) = &args.export_dir {
        export_pngs(&bundle, dir)?;
    }
    Ok(())
}
