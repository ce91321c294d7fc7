use anyhow::{Context, Result};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::core::error::{PipelineError, PipelineResult};

/// Parse a photometry CSV file into a Polars DataFrame
pub fn parse_photometry_csv(csv_path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(csv_path.into()))
        .with_context(|| format!("Failed to open photometry file: {}", csv_path.display()))?
        .finish()
        .with_context(|| format!("Failed to parse photometry CSV: {}", csv_path.display()))
}

/// Parse a photometry Parquet file into a Polars DataFrame
pub fn parse_photometry_parquet(parquet_path: &Path) -> Result<DataFrame> {
    let file = File::open(parquet_path)
        .with_context(|| format!("Failed to open photometry file: {}", parquet_path.display()))?;
    ParquetReader::new(file)
        .finish()
        .with_context(|| format!("Failed to parse photometry Parquet: {}", parquet_path.display()))
}

/// Key-value pairs stored in a Parquet file footer.
///
/// Keys without a value are dropped.
pub fn parquet_key_value_metadata(parquet_path: &Path) -> Result<BTreeMap<String, String>> {
    let file = File::open(parquet_path)
        .with_context(|| format!("Failed to open photometry file: {}", parquet_path.display()))?;
    let mut reader = ParquetReader::new(file);
    let metadata = reader
        .get_metadata()
        .with_context(|| format!("Failed to read Parquet metadata: {}", parquet_path.display()))?;
    Ok(metadata
        .key_value_metadata
        .iter()
        .flatten()
        .filter_map(|kv| kv.value.clone().map(|value| (kv.key.clone(), value)))
        .collect())
}

/// True for paths with a `.parquet` extension
pub fn is_parquet(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("parquet")
}

/// Parse a photometry table, choosing the reader by file extension
pub fn parse_photometry(path: &Path) -> Result<DataFrame> {
    if is_parquet(path) {
        parse_photometry_parquet(path)
    } else {
        parse_photometry_csv(path)
    }
}

/// Column names of a DataFrame as owned strings
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Extract a numeric column as `f64`, mapping nulls to NaN.
///
/// Integer columns (inferred when a CSV column has no decimal point) are cast.
pub fn column_f64(df: &DataFrame, name: &str) -> PipelineResult<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Schema(format!("Missing column '{}'", name)))?;
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Like [`column_f64`], but `None` when the column is absent.
pub fn optional_column_f64(df: &DataFrame, name: &str) -> PipelineResult<Option<Vec<f64>>> {
    if df.get_column_names().iter().any(|c| c.as_str() == name) {
        column_f64(df, name).map(Some)
    } else {
        Ok(None)
    }
}

/// Extract an identifier column as `i64`.
pub fn column_i64(df: &DataFrame, name: &str) -> PipelineResult<Vec<Option<i64>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Schema(format!("Missing column '{}'", name)))?;
    let casted = column.cast(&DataType::Int64)?;
    Ok(casted.i64()?.into_iter().collect())
}
