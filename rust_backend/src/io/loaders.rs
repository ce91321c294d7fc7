use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::core::domain::{Band, ExposureTable, LightCurve, ObjectId, SourcePosition, VisitData, VisitId};
use crate::core::error::{PipelineError, PipelineResult};
use crate::parsing::columns::{ColumnScheme, FlagPlane};
use crate::parsing::exposure_parser;
use crate::parsing::photometry_parser::{self, column_f64, column_i64, column_names, optional_column_f64};

/// Builds light curves from a per-visit photometry table.
///
/// Count columns are resolved through a [`ColumnScheme`]; counts are
/// converted to count rates against the visit's [`ExposureTable`]. Every
/// light curve carries an aperture-corrected series for the scheme's
/// aperture.
#[derive(Debug, Clone)]
pub struct LightCurveLoader {
    scheme: ColumnScheme,
}

impl LightCurveLoader {
    pub fn new(scheme: ColumnScheme) -> Self {
        Self { scheme }
    }

    /// Loader for the configured band, aperture and source format.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(ColumnScheme::new(
            &config.format,
            config.photometry.band,
            config.photometry.aperture_radius,
        ))
    }

    pub fn scheme(&self) -> &ColumnScheme {
        &self.scheme
    }

    /// Light curves of every object in the table, with per-bin flags attached.
    ///
    /// Fails with [`PipelineError::MissingBand`] when the visit has no
    /// exposure or the table holds no count columns for the band and aperture.
    pub fn load_all(
        &self,
        df: &DataFrame,
        exposure: &ExposureTable,
        visit: VisitId,
    ) -> PipelineResult<Vec<LightCurve>> {
        Ok(self
            .load_with_totals(df, exposure, visit)?
            .into_iter()
            .map(|(lc, _)| lc)
            .collect())
    }

    /// Light curves of objects with no mask or edge contamination in any bin.
    ///
    /// The filter is all-or-nothing per object: one contaminated bin (or a
    /// nonzero full-depth contamination total) excludes the whole object.
    pub fn load_unflagged(
        &self,
        df: &DataFrame,
        exposure: &ExposureTable,
        visit: VisitId,
    ) -> PipelineResult<Vec<LightCurve>> {
        let all = self.load_with_totals(df, exposure, visit)?;
        let total = all.len();
        let unflagged: Vec<LightCurve> = all
            .into_iter()
            .filter(|(lc, contaminated_total)| !lc.is_flagged() && !contaminated_total)
            .map(|(lc, _)| lc)
            .collect();
        log::debug!(
            "{} {}: {} of {} objects unflagged",
            visit,
            self.scheme.band(),
            unflagged.len(),
            total
        );
        Ok(unflagged)
    }

    fn load_with_totals(
        &self,
        df: &DataFrame,
        exposure: &ExposureTable,
        visit: VisitId,
    ) -> PipelineResult<Vec<(LightCurve, bool)>> {
        let band = self.scheme.band();
        let missing = || PipelineError::MissingBand { band, visit };
        if exposure.is_empty() || !(exposure.total_exposure() > 0.0) {
            return Err(missing());
        }

        let names = column_names(df);
        let bins = self.scheme.bins(&names);
        if bins.is_empty() {
            return Err(missing());
        }
        if let Some(&last) = bins.last() {
            if last >= exposure.len() {
                return Err(PipelineError::Schema(format!(
                    "Photometry for {} has bin {} but the exposure table has {} bins",
                    visit,
                    last,
                    exposure.len()
                )));
            }
        }

        let height = df.height();
        let n_bins = exposure.len();
        let mut counts = vec![vec![f64::NAN; n_bins]; height];
        let mut mask = vec![vec![false; n_bins]; height];
        let mut edge = vec![vec![false; n_bins]; height];

        for &bin in &bins {
            let values = column_f64(df, &self.scheme.counts(Some(bin)))?;
            for (row, v) in values.into_iter().enumerate() {
                counts[row][bin] = v;
            }
            for (plane, target) in [(FlagPlane::Mask, &mut mask), (FlagPlane::Edge, &mut edge)] {
                if let Some(values) = optional_column_f64(df, &self.scheme.flag(plane, Some(bin)))? {
                    for (row, v) in values.into_iter().enumerate() {
                        target[row][bin] = is_contaminated(v);
                    }
                }
            }
        }

        let mut totals = vec![false; height];
        for plane in [FlagPlane::Mask, FlagPlane::Edge] {
            if let Some(values) = optional_column_f64(df, &self.scheme.flag(plane, None))? {
                for (row, v) in values.into_iter().enumerate() {
                    totals[row] |= is_contaminated(v);
                }
            }
        }

        let ids = self.object_ids(df, &names)?;
        let xcenter = column_f64(df, "xcenter")?;
        let ycenter = column_f64(df, "ycenter")?;
        let ra = optional_column_f64(df, "ra")?.unwrap_or_else(|| vec![f64::NAN; height]);
        let dec = optional_column_f64(df, "dec")?.unwrap_or_else(|| vec![f64::NAN; height]);

        let mut light_curves = Vec::with_capacity(height);
        for (row, ((row_counts, row_mask), row_edge)) in counts.into_iter().zip(mask).zip(edge).enumerate() {
            let position = SourcePosition::new(xcenter[row], ycenter[row], ra[row], dec[row]);
            let lc = LightCurve::from_counts(ids[row], position, &row_counts, exposure)?
                .with_flags(row_mask, row_edge)?
                .with_aperture_correction(self.scheme.aperture(), band)?;
            light_curves.push((lc, totals[row]));
        }
        Ok(light_curves)
    }

    /// Object ids from the id column, or row indices when there is none.
    fn object_ids(&self, df: &DataFrame, names: &[String]) -> PipelineResult<Vec<ObjectId>> {
        match self.scheme.id_column(names) {
            Some(column) => column_i64(df, &column)?
                .into_iter()
                .enumerate()
                .map(|(row, id)| {
                    id.map(ObjectId).ok_or_else(|| {
                        PipelineError::InvalidData(format!("Missing {} at row {}", column, row))
                    })
                })
                .collect(),
            None => Ok((0..df.height() as i64).map(ObjectId).collect()),
        }
    }
}

/// Nonzero (or unreadable) contamination count.
fn is_contaminated(value: f64) -> bool {
    value != 0.0
}

/// Unified interface for loading one visit from photometry and exposure files
pub struct VisitFileLoader;

impl VisitFileLoader {
    /// Load the unflagged light curves of a visit.
    ///
    /// The photometry table may be CSV or Parquet. The exposure table may be
    /// CSV or JSON, or a Parquet file carrying it in its footer under
    /// `{band}_exptime`; a footer without that key is [`PipelineError::MissingBand`].
    pub fn load(
        photometry_path: &Path,
        exposure_path: &Path,
        visit: VisitId,
        config: &PipelineConfig,
    ) -> Result<VisitData> {
        let band = config.photometry.band;
        let exposure = if photometry_parser::is_parquet(exposure_path) {
            exposure_parser::parse_embedded_exposure(exposure_path, band)
                .with_context(|| format!("Failed to load exposure for {}", visit))?
                .ok_or(PipelineError::MissingBand { band, visit })?
        } else {
            exposure_parser::parse_exposure(exposure_path)
                .with_context(|| format!("Failed to load exposure for {}", visit))?
        };
        let df = photometry_parser::parse_photometry(photometry_path)
            .with_context(|| format!("Failed to load photometry for {}", visit))?;
        Self::from_frames(&df, exposure, visit, config)
    }

    /// Load a combined photometry Parquet file that embeds its exposure tables.
    pub fn load_combined(parquet_path: &Path, visit: VisitId, config: &PipelineConfig) -> Result<VisitData> {
        Self::load(parquet_path, parquet_path, visit, config)
    }

    /// Build visit data from an already-parsed photometry DataFrame
    pub fn from_frames(
        df: &DataFrame,
        exposure: ExposureTable,
        visit: VisitId,
        config: &PipelineConfig,
    ) -> Result<VisitData> {
        let band: Band = config.photometry.band;
        let light_curves = LightCurveLoader::from_config(config)
            .load_unflagged(df, &exposure, visit)
            .with_context(|| format!("Failed to build {} light curves for {}", band, visit))?;
        Ok(VisitData::new(visit, band, exposure, light_curves))
    }
}
