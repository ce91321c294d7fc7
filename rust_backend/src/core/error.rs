//! Error types for the screening pipeline.
//!
//! Rejections of individual light curves are not errors; they are recorded as
//! [`RejectionReason`](crate::core::domain::RejectionReason) values. The
//! variants here cover conditions that stop a whole computation.

use crate::core::domain::{Band, VisitId};

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type for pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No photometry (or no exposure) for the requested band in this visit.
    #[error("No {band} data for visit {visit}")]
    MissingBand { band: Band, visit: VisitId },

    /// Flare energy was requested for a light curve without aperture-corrected flux.
    #[error("Aperture-corrected count rates are required to compute flare energy")]
    MissingApertureCorrection,

    /// Total effective exposure of the visit is below the screening threshold.
    #[error("Insufficient exposure: {total:.1}s total, {required:.1}s required")]
    InsufficientExposure { total: f64, required: f64 },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Returns true when the error means "this visit has nothing to screen"
    /// rather than a processing failure.
    pub fn is_missing_data(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingBand { .. } | PipelineError::InsufficientExposure { .. }
        )
    }
}

impl From<String> for PipelineError {
    fn from(s: String) -> Self {
        PipelineError::InvalidData(s)
    }
}

impl From<&str> for PipelineError {
    fn from(s: &str) -> Self {
        PipelineError::InvalidData(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_band_message() {
        let err = PipelineError::MissingBand {
            band: Band::Fuv,
            visit: VisitId(23456),
        };
        assert_eq!(err.to_string(), "No FUV data for visit e23456");
        assert!(err.is_missing_data());
    }

    #[test]
    fn test_insufficient_exposure_message() {
        let err = PipelineError::InsufficientExposure {
            total: 420.0,
            required: 500.0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient exposure: 420.0s total, 500.0s required"
        );
    }

    #[test]
    fn test_string_conversion_is_invalid_data() {
        let err: PipelineError = "bad bin".into();
        assert!(matches!(err, PipelineError::InvalidData(_)));
        assert!(!err.is_missing_data());
    }
}
