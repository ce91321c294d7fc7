use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::algorithms::dedup::SpatialDeduplicator;
use crate::algorithms::flares::FlareCharacterizer;
use crate::algorithms::screening::{ScreeningOutcome, VariabilityScreener};
use crate::config::PipelineConfig;
use crate::core::domain::{
    Band, CandidateVariable, ExposureTable, FlareEvent, LightCurve, ObjectId, RejectionReason,
    VisitData, VisitId,
};
use crate::core::error::{PipelineError, PipelineResult};

/// How a visit's screening pass ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VisitOutcome {
    /// Every object was classified and the survivors kept
    Screened,
    /// Total exposure below the minimum; no object was classified
    SkippedInsufficientExposure { total: f64, required: f64 },
    /// Too many survivors; all of them were rejected as `VisitTooDense`
    Cursed { survivors: usize },
}

/// Result of screening one visit in one band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitScreening {
    pub visit: VisitId,
    pub band: Band,
    pub outcome: VisitOutcome,
    pub candidates: Vec<CandidateVariable>,
    pub rejections: BTreeMap<ObjectId, RejectionReason>,
}

impl VisitScreening {
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, VisitOutcome::SkippedInsufficientExposure { .. })
    }

    pub fn is_cursed(&self) -> bool {
        matches!(self.outcome, VisitOutcome::Cursed { .. })
    }

    /// Number of objects with a terminal classification
    pub fn classified(&self) -> usize {
        self.candidates.len() + self.rejections.len()
    }

    /// Rejection count per reason label
    pub fn rejection_tally(&self) -> BTreeMap<&'static str, usize> {
        let mut tally = BTreeMap::new();
        for reason in self.rejections.values() {
            *tally.entry(reason.label()).or_insert(0) += 1;
        }
        tally
    }
}

/// Per-visit screening pipeline
///
/// Runs the variability filter chain on every light curve, deduplicates the
/// survivors spatially and applies the cursed-visit valve.
pub struct VisitPipeline {
    config: PipelineConfig,
    screener: VariabilityScreener,
    deduplicator: SpatialDeduplicator,
}

impl VisitPipeline {
    /// Create a pipeline with custom configuration
    pub fn with_config(config: PipelineConfig) -> Self {
        let screener = VariabilityScreener::new(config.screening.clone());
        let deduplicator = SpatialDeduplicator::new(config.dedup.clone());
        Self {
            config,
            screener,
            deduplicator,
        }
    }

    /// Create a new pipeline with default configuration
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fails with [`PipelineError::InsufficientExposure`] when the visit is
    /// too short to screen.
    pub fn check_exposure(&self, exposure: &ExposureTable) -> PipelineResult<()> {
        let total = exposure.total_exposure();
        let required = self.config.screening.min_visit_exposure;
        if total < required {
            return Err(PipelineError::InsufficientExposure { total, required });
        }
        Ok(())
    }

    /// Screen a loaded visit
    pub fn screen(&self, visit: &VisitData) -> VisitScreening {
        self.screen_light_curves(visit.visit, visit.band, &visit.light_curves, &visit.exposure)
    }

    /// Screen light curves that share one exposure table
    pub fn screen_light_curves(
        &self,
        visit: VisitId,
        band: Band,
        light_curves: &[LightCurve],
        exposure: &ExposureTable,
    ) -> VisitScreening {
        let mut result = VisitScreening {
            visit,
            band,
            outcome: VisitOutcome::Screened,
            candidates: Vec::new(),
            rejections: BTreeMap::new(),
        };

        if let Err(PipelineError::InsufficientExposure { total, required }) = self.check_exposure(exposure) {
            log::info!(
                "Skipping {} {}: {:.1} s of exposure is below the {:.0} s minimum",
                visit,
                band,
                total,
                required
            );
            result.outcome = VisitOutcome::SkippedInsufficientExposure { total, required };
            return result;
        }

        let ScreeningOutcome {
            candidates,
            mut rejections,
        } = self.screener.screen_all(light_curves, exposure);
        let dedup = self.deduplicator.eliminate_dupes(&candidates);
        rejections.extend(dedup.rejections);

        let survivors = dedup.kept.len();
        if survivors >= self.config.dedup.cursed_candidate_count {
            log::warn!(
                "{} {} is cursed: {} candidates survived deduplication",
                visit,
                band,
                survivors
            );
            for candidate in dedup.kept {
                rejections.insert(candidate.object_id, RejectionReason::VisitTooDense);
            }
            result.outcome = VisitOutcome::Cursed { survivors };
        } else {
            result.candidates = dedup.kept;
        }
        result.rejections = rejections;

        log::debug!(
            "{} {}: {} candidates, rejections {:?}",
            visit,
            band,
            result.candidates.len(),
            result.rejection_tally()
        );
        result
    }

    /// Flare events of one light curve with their energies
    pub fn characterize_flare(
        &self,
        lc: &LightCurve,
        exposure: &ExposureTable,
        distance_pc: Option<f64>,
    ) -> PipelineResult<Vec<FlareEvent>> {
        let characterizer =
            FlareCharacterizer::new(self.config.flare.clone(), self.config.photometry.clone());
        Ok(characterizer.characterize(lc, exposure, distance_pc)?.flares)
    }
}

impl Default for VisitPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to screen one visit's light curves.
///
/// Returns empty candidates and rejections when the visit's total exposure
/// is below the minimum.
pub fn screen(
    light_curves: &[LightCurve],
    exposure: &ExposureTable,
    config: &PipelineConfig,
) -> ScreeningOutcome {
    let pipeline = VisitPipeline::with_config(config.clone());
    let screening = pipeline.screen_light_curves(
        VisitId(0),
        config.photometry.band,
        light_curves,
        exposure,
    );
    ScreeningOutcome {
        candidates: screening.candidates,
        rejections: screening.rejections,
    }
}

/// Convenience function to characterize the flares of one light curve
pub fn characterize_flare(
    lc: &LightCurve,
    exposure: &ExposureTable,
    distance_pc: Option<f64>,
    config: &PipelineConfig,
) -> PipelineResult<Vec<FlareEvent>> {
    VisitPipeline::with_config(config.clone()).characterize_flare(lc, exposure, distance_pc)
}
