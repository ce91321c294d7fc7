//! Batch screener over a photometry directory.
//!
//! Usage: `gfcat-screen <photdir> [config.toml] [out.csv]`
//!
//! Screens every visit under `photdir`, writes the candidate catalog as CSV
//! (default `gfcat_candidates.csv`) and the full per-visit results as JSON
//! next to it.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use gfcat_rust::config::PipelineConfig;
use gfcat_rust::services::{DirectoryVisitSource, SurveyScreener};

const DEFAULT_OUTPUT: &str = "gfcat_candidates.csv";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let photdir = match args.get(1) {
        Some(dir) => PathBuf::from(dir),
        None => anyhow::bail!("Usage: gfcat-screen <photdir> [config.toml] [out.csv]"),
    };
    let config = match args.get(2) {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::load_default()?,
    };
    let output = PathBuf::from(args.get(3).map(String::as_str).unwrap_or(DEFAULT_OUTPUT));

    log::info!(
        "Screening {} ({} band, {}\" aperture)",
        photdir.display(),
        config.photometry.band,
        config.photometry.aperture_radius
    );

    let source = Arc::new(DirectoryVisitSource::new(photdir));
    let report = SurveyScreener::new(source, config)
        .run()
        .await
        .context("Survey screening failed")?;

    report.catalog.write_csv(&output)?;
    let json_path = output.with_extension("json");
    report.catalog.write_json(&json_path)?;

    println!("Visits screened:   {}", report.catalog.len());
    println!("Visits skipped:    {}", report.catalog.skipped_visits().len());
    println!("Visits cursed:     {}", report.catalog.cursed_visits().len());
    println!("Visits failed:     {}", report.failures.len());
    println!("Candidates:        {}", report.catalog.candidate_count());
    for (reason, count) in report.catalog.rejection_frequencies() {
        println!("  {:<45} {}", reason, count);
    }
    println!("Catalog written to {}", output.display());
    Ok(())
}
