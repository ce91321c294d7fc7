use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Deserialize;
use std::path::Path;

use crate::core::domain::{Band, ExposureBin, ExposureTable};
use crate::core::error::{PipelineError, PipelineResult};
use crate::parsing::photometry_parser::{
    column_f64, column_names, parquet_key_value_metadata, parse_photometry_csv,
};

/// One exposure record as stored in JSON sidecars and Parquet metadata
#[derive(Debug, Deserialize)]
struct RawExposureBin {
    t0: f64,
    t1: f64,
    #[serde(alias = "expt_eff")]
    expt: f64,
}

/// Parse an exposure-time CSV (`t0,t1,expt`) into an ExposureTable
pub fn parse_exposure_csv(csv_path: &Path) -> Result<ExposureTable> {
    let df = parse_photometry_csv(csv_path)?;
    dataframe_to_exposure(&df)
        .with_context(|| format!("Invalid exposure table: {}", csv_path.display()))
}

/// Convert a DataFrame with `t0`, `t1` and `expt` (or `expt_eff`) columns
pub fn dataframe_to_exposure(df: &DataFrame) -> PipelineResult<ExposureTable> {
    let names = column_names(df);
    let expt_column = ["expt", "expt_eff"]
        .into_iter()
        .find(|c| names.iter().any(|n| n.as_str() == *c))
        .ok_or_else(|| {
            PipelineError::Schema(format!(
                "Exposure table needs an 'expt' column. Found columns: {:?}",
                names
            ))
        })?;
    let t0 = column_f64(df, "t0")?;
    let t1 = column_f64(df, "t1")?;
    let expt = column_f64(df, expt_column)?;
    ExposureTable::from_columns(&t0, &t1, &expt)
}

/// Parse an exposure-time JSON file (array of `{t0, t1, expt}` records)
pub fn parse_exposure_json(json_path: &Path) -> Result<ExposureTable> {
    let json_content = std::fs::read_to_string(json_path)
        .with_context(|| format!("Failed to read JSON file: {}", json_path.display()))?;
    parse_exposure_json_str(&json_content)
        .with_context(|| format!("Invalid exposure JSON: {}", json_path.display()))
}

/// Parse exposure records from a JSON string.
///
/// Deserialization errors report the path of the offending record,
/// e.g. `[3].expt: invalid type: string "x", expected f64`.
pub fn parse_exposure_json_str(json_str: &str) -> Result<ExposureTable> {
    let deserializer = &mut serde_json::Deserializer::from_str(json_str);
    let records: Vec<RawExposureBin> = serde_path_to_error::deserialize(deserializer)
        .map_err(|e| anyhow::anyhow!("JSON deserialization error at {}: {}", e.path(), e.inner()))?;

    let bins = records
        .into_iter()
        .map(|r| ExposureBin {
            t0: r.t0,
            t1: r.t1,
            expt: r.expt,
        })
        .collect();
    Ok(ExposureTable::new(bins)?)
}

/// Footer key of a band's exposure table in a combined photometry Parquet
/// file, e.g. `nuv_exptime`.
pub fn exposure_metadata_key(band: Band) -> String {
    format!("{}_exptime", band.as_str().to_lowercase())
}

/// Exposure table stored as JSON records in a photometry Parquet footer.
///
/// `Ok(None)` when the file has no exposure table for `band`.
pub fn parse_embedded_exposure(parquet_path: &Path, band: Band) -> Result<Option<ExposureTable>> {
    let metadata = parquet_key_value_metadata(parquet_path)?;
    let key = exposure_metadata_key(band);
    match metadata.get(&key) {
        Some(json) => parse_exposure_json_str(json)
            .with_context(|| format!("Invalid '{}' metadata in {}", key, parquet_path.display()))
            .map(Some),
        None => Ok(None),
    }
}

/// Parse an exposure table, choosing the reader by file extension
pub fn parse_exposure(path: &Path) -> Result<ExposureTable> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_exposure_json(path),
        _ => parse_exposure_csv(path),
    }
}
