//! Pipeline configuration file support.
//!
//! Every numeric threshold used by screening, deduplication and flare
//! characterization is a named field here. Each field carries a serde default,
//! so a partial (or empty) TOML file yields the canonical configuration.
//!
//! ```toml
//! [screening]
//! min_outliers = 3
//! outlier_baseline_excludes_edges = true
//!
//! [dedup]
//! bright_cps = 170.0
//!
//! [photometry]
//! band = "NUV"
//! aperture_radius = 17.3
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::algorithms::stats::SignificanceLevel;
use crate::core::domain::Band;
use crate::core::error::{PipelineError, PipelineResult};

/// Default configuration file name searched by [`PipelineConfig::load_default`].
pub const DEFAULT_CONFIG_FILE: &str = "gfcat.toml";

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub screening: ScreeningConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub flare: FlareConfig,
    #[serde(default)]
    pub photometry: PhotometryConfig,
    #[serde(default)]
    pub format: FormatConfig,
    #[serde(default)]
    pub survey: SurveyConfig,
}

/// One crude spike test: `min_count` local excursions of a `bunch`-bin
/// window whose `sigma` bounds clear both neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeTest {
    pub sigma: f64,
    pub bunch: usize,
    pub min_count: usize,
}

/// Thresholds of the per-object variability filter chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Visits with less total effective exposure (s) are skipped wholesale.
    pub min_visit_exposure: f64,
    /// At least one bin must exceed this count rate.
    pub dim_threshold_cps: f64,
    /// Minimum span (s) between the first and last valid bin.
    pub min_duration: f64,
    /// Minimum fraction of valid bins between the first and last valid bin.
    pub min_coverage: f64,
    pub outlier_sigma: f64,
    pub min_outliers: usize,
    /// Compute the second-lowest baseline over interior bins only.
    pub outlier_baseline_excludes_edges: bool,
    pub spike_tests: Vec<SpikeTest>,
    pub peak_prominence_sigma: f64,
    pub peak_min_distance: usize,
    pub max_peaks: usize,
    pub ad_significance: SignificanceLevel,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            min_visit_exposure: 500.0,
            dim_threshold_cps: 0.5,
            min_duration: 500.0,
            min_coverage: 0.75,
            outlier_sigma: 3.0,
            min_outliers: 3,
            outlier_baseline_excludes_edges: false,
            spike_tests: vec![
                SpikeTest {
                    sigma: 3.0,
                    bunch: 1,
                    min_count: 3,
                },
                SpikeTest {
                    sigma: 2.0,
                    bunch: 2,
                    min_count: 5,
                },
            ],
            peak_prominence_sigma: 3.0,
            peak_min_distance: 4,
            max_peaks: 3,
            ad_significance: SignificanceLevel::Five,
        }
    }
}

/// Thresholds of spatial deduplication and the visit-level escape valve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Neighbour radius (pixels) of the density-based clustering; 40 px is about 1'.
    pub cluster_radius_px: f64,
    pub min_cluster_size: usize,
    /// Median count rate above which the detector response is non-linear.
    pub bright_cps: f64,
    /// Clusters with at least this many members are presumed artifacts.
    pub max_cluster_members: usize,
    /// Maximum bounding diagonal (pixels) of a cluster that may be one source.
    pub max_cluster_extent_px: f64,
    /// Visits with at least this many surviving candidates are discarded.
    pub cursed_candidate_count: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            cluster_radius_px: 40.0,
            min_cluster_size: 1,
            bright_cps: 170.0,
            max_cluster_members: 12,
            max_cluster_extent_px: 80.0,
            cursed_candidate_count: 20,
        }
    }
}

/// Parameters of quiescence estimation and flare delineation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlareConfig {
    pub detection_sigma: f64,
    pub clip_sigma: f64,
    pub clip_max_iters: usize,
    /// Bins with less effective exposure (s) cannot seed a flare.
    pub min_bin_exposure: f64,
    /// A gap (s) between adjacent bin starts larger than this breaks a flare.
    pub max_gap: f64,
    /// Number of consecutive sub-threshold bins that ends a flare.
    pub quiet_run_length: usize,
    /// Nominal bin duration (s).
    pub bin_width: f64,
}

impl Default for FlareConfig {
    fn default() -> Self {
        Self {
            detection_sigma: 3.0,
            clip_sigma: 3.0,
            clip_max_iters: 5,
            min_bin_exposure: 20.0,
            max_gap: 1000.0,
            quiet_run_length: 2,
            bin_width: 30.0,
        }
    }
}

/// Unit-conversion constants of one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandConstants {
    /// erg s⁻¹ cm⁻² Å⁻¹ per count/s.
    pub flux_scale: f64,
    /// AB magnitude of 1 count/s.
    pub zero_point: f64,
    /// Effective bandpass width (Å).
    pub effective_width: f64,
}

/// Band selection, aperture, and the per-band conversion constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotometryConfig {
    pub band: Band,
    /// Aperture radius in arcseconds.
    pub aperture_radius: f64,
    pub nuv: BandConstants,
    pub fuv: BandConstants,
}

impl Default for PhotometryConfig {
    fn default() -> Self {
        Self {
            band: Band::Nuv,
            aperture_radius: 12.8,
            nuv: BandConstants {
                flux_scale: 2.06e-16,
                zero_point: 20.08,
                effective_width: 729.94,
            },
            fuv: BandConstants {
                flux_scale: 1.4e-15,
                zero_point: 18.82,
                effective_width: 255.45,
            },
        }
    }
}

impl PhotometryConfig {
    pub fn constants(&self, band: Band) -> &BandConstants {
        match band {
            Band::Nuv => &self.nuv,
            Band::Fuv => &self.fuv,
        }
    }
}

/// On-disk photometry table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Per-visit CSV with `aperture_sum_{bin}` columns and swapped flag planes.
    LegacyCsv,
    /// Columns named by band and aperture size (`aperture_sum_3_n_12_8`).
    BandAperture,
}

/// Source format version and flag-plane mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub version: SourceFormat,
    /// Plane name holding hot-spot mask contamination (overrides the format default).
    pub mask_plane: Option<String>,
    /// Plane name holding detector-edge contamination (overrides the format default).
    pub edge_plane: Option<String>,
    /// Object identifier column; row index when absent.
    pub id_column: Option<String>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            version: SourceFormat::BandAperture,
            mask_plane: None,
            edge_plane: None,
            id_column: None,
        }
    }
}

/// Survey-wide batch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub max_concurrent_visits: usize,
    /// Visits known to have been processed incorrectly upstream.
    pub excluded_visits: Vec<u32>,
    /// Bin cadence (s) used in file names.
    pub cadence: u32,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_visits: 8,
            excluded_visits: Vec::new(),
            cadence: 30,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> PipelineResult<Self> {
        let config: PipelineConfig = toml::from_str(content).map_err(|e| {
            PipelineError::Configuration(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `gfcat.toml` in:
    /// 1. Current directory
    /// 2. `rust_backend/` directory
    /// 3. Parent directory
    ///
    /// Falls back to the built-in defaults when no file is found.
    pub fn load_default() -> PipelineResult<Self> {
        match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading pipeline configuration from {}", path.display());
                Self::from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        [
            PathBuf::from(DEFAULT_CONFIG_FILE),
            PathBuf::from("rust_backend").join(DEFAULT_CONFIG_FILE),
            PathBuf::from("..").join(DEFAULT_CONFIG_FILE),
        ]
        .into_iter()
        .find(|p| p.exists())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> PipelineResult<()> {
        let s = &self.screening;
        if !(0.0..=1.0).contains(&s.min_coverage) {
            return Err(PipelineError::Configuration(format!(
                "screening.min_coverage must be within [0, 1], got {}",
                s.min_coverage
            )));
        }
        if s.spike_tests.iter().any(|t| t.bunch == 0) {
            return Err(PipelineError::Configuration(
                "screening.spike_tests: bunch must be at least 1".to_string(),
            ));
        }
        if s.peak_min_distance == 0 {
            return Err(PipelineError::Configuration(
                "screening.peak_min_distance must be at least 1".to_string(),
            ));
        }
        if !(self.dedup.cluster_radius_px > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "dedup.cluster_radius_px must be positive, got {}",
                self.dedup.cluster_radius_px
            )));
        }
        if self.dedup.min_cluster_size == 0 {
            return Err(PipelineError::Configuration(
                "dedup.min_cluster_size must be at least 1".to_string(),
            ));
        }
        if self.flare.quiet_run_length == 0 {
            return Err(PipelineError::Configuration(
                "flare.quiet_run_length must be at least 1".to_string(),
            ));
        }
        if !(self.flare.bin_width > 0.0) {
            return Err(PipelineError::Configuration(format!(
                "flare.bin_width must be positive, got {}",
                self.flare.bin_width
            )));
        }
        if self.survey.max_concurrent_visits == 0 {
            return Err(PipelineError::Configuration(
                "survey.max_concurrent_visits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.screening.min_visit_exposure, 500.0);
        assert_eq!(config.dedup.max_cluster_members, 12);
        assert_eq!(config.dedup.cursed_candidate_count, 20);
        assert_eq!(config.flare.max_gap, 1000.0);
        assert_eq!(config.screening.spike_tests.len(), 2);
    }

    #[test]
    fn test_partial_override() {
        let toml = r#"
            [screening]
            outlier_baseline_excludes_edges = true
            max_peaks = 5

            [dedup]
            max_cluster_members = 50

            [photometry]
            band = "FUV"
            aperture_radius = 17.3
        "#;
        let config = PipelineConfig::from_toml_str(toml).unwrap();
        assert!(config.screening.outlier_baseline_excludes_edges);
        assert_eq!(config.screening.max_peaks, 5);
        assert_eq!(config.screening.min_outliers, 3);
        assert_eq!(config.dedup.max_cluster_members, 50);
        assert_eq!(config.dedup.bright_cps, 170.0);
        assert_eq!(config.photometry.band, Band::Fuv);
        assert_eq!(config.photometry.constants(Band::Fuv).zero_point, 18.82);
    }

    #[test]
    fn test_format_section() {
        let toml = r#"
            [format]
            version = "legacy_csv"
            mask_plane = "flag"
        "#;
        let config = PipelineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.format.version, SourceFormat::LegacyCsv);
        assert_eq!(config.format.mask_plane.as_deref(), Some("flag"));
        assert!(config.format.edge_plane.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = PipelineConfig::from_toml_str("[screening]\nmin_coverage = 1.5\n");
        assert!(matches!(result, Err(PipelineError::Configuration(_))));

        let result = PipelineConfig::from_toml_str("[flare]\nquiet_run_length = 0\n");
        assert!(result.is_err());

        let result = PipelineConfig::from_toml_str("[dedup]\ncluster_radius_px = -1.0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_unparseable_toml() {
        let result = PipelineConfig::from_toml_str("[screening\nmin_outliers = ");
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[survey]\nexcluded_visits = [101, 202]\n").unwrap();
        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.survey.excluded_visits, vec![101, 202]);
        assert_eq!(config.survey.max_concurrent_visits, 8);
    }

    #[test]
    fn test_missing_file() {
        let result = PipelineConfig::from_file("/nonexistent/gfcat.toml");
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }
}
