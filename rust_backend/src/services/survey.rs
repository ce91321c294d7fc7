//! Cross-visit survey runner.
//!
//! Visits are independent units of work: each one is loaded through a
//! [`VisitSource`], screened on the blocking pool and recorded in a
//! [`SurveyCatalog`]. Deduplication never crosses visit boundaries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};

use crate::config::PipelineConfig;
use crate::core::domain::{Band, VisitData, VisitId};
use crate::core::error::PipelineError;
use crate::io::loaders::VisitFileLoader;
use crate::parsing::columns::aperture_token;
use crate::preprocessing::pipeline::VisitPipeline;
use crate::services::catalog::SurveyCatalog;

/// Supplier of per-visit photometry.
#[async_trait]
pub trait VisitSource: Send + Sync {
    /// All visits the source can provide, in ascending order.
    async fn list_visits(&self) -> Result<Vec<VisitId>>;

    /// Load the unflagged light curves of a visit for the configured band.
    ///
    /// A visit without data for the band fails with
    /// [`PipelineError::MissingBand`] in the error chain.
    async fn load_visit(&self, visit: VisitId, config: &PipelineConfig) -> Result<VisitData>;
}

/// In-memory visit source.
///
/// Suitable for unit tests and for callers that already hold loaded visits.
#[derive(Clone, Default)]
pub struct LocalVisitSource {
    visits: Arc<RwLock<HashMap<(VisitId, Band), VisitData>>>,
}

impl LocalVisitSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a visit's data for its band.
    pub async fn insert(&self, data: VisitData) {
        let mut visits = self.visits.write().await;
        visits.insert((data.visit, data.band), data);
    }

    pub async fn len(&self) -> usize {
        self.visits.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.visits.read().await.is_empty()
    }
}

#[async_trait]
impl VisitSource for LocalVisitSource {
    async fn list_visits(&self) -> Result<Vec<VisitId>> {
        let visits = self.visits.read().await;
        let mut ids: Vec<VisitId> = visits.keys().map(|(visit, _)| *visit).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn load_visit(&self, visit: VisitId, config: &PipelineConfig) -> Result<VisitData> {
        let band = config.photometry.band;
        let visits = self.visits.read().await;
        match visits.get(&(visit, band)) {
            Some(data) => Ok(data.clone()),
            None => Err(PipelineError::MissingBand { band, visit }.into()),
        }
    }
}

/// Visit source over a photometry directory.
///
/// Layout: one sub-directory per visit (`e23456/`) holding either
/// `e23456-nd-30s-photom[-12_8].{csv,parquet}` with
/// `e23456-nd-30s-exptime.{csv,json}`, or a combined
/// `e23456-30s-photom.parquet` covering both bands with the exposure tables
/// in its footer.
#[derive(Debug, Clone)]
pub struct DirectoryVisitSource {
    root: PathBuf,
}

impl DirectoryVisitSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File-name stem shared by a visit's products, e.g. `e23456-nd-30s`.
    pub fn stem(visit: VisitId, band: Band, cadence: u32) -> String {
        format!("{}-{}d-{}s", visit, band.letter(), cadence)
    }

    /// Combined two-band photometry file of a visit, e.g. `e23456-30s-photom.parquet`.
    pub fn combined_path(&self, visit: VisitId, cadence: u32) -> PathBuf {
        self.root
            .join(visit.to_string())
            .join(format!("{}-{}s-photom.parquet", visit, cadence))
    }

    /// Photometry file for the configured band and aperture, if present.
    ///
    /// Aperture-specific files win over the plain `-photom` file; Parquet
    /// wins over CSV. The combined file is the last resort.
    pub fn photometry_path(&self, visit: VisitId, config: &PipelineConfig) -> Option<PathBuf> {
        let dir = self.root.join(visit.to_string());
        let stem = Self::stem(visit, config.photometry.band, config.survey.cadence);
        let token = aperture_token(config.photometry.aperture_radius);
        [
            format!("{}-photom-{}.parquet", stem, token),
            format!("{}-photom-{}.csv", stem, token),
            format!("{}-photom.parquet", stem),
            format!("{}-photom.csv", stem),
        ]
        .into_iter()
        .map(|name| dir.join(name))
        .chain(std::iter::once(self.combined_path(visit, config.survey.cadence)))
        .find(|path| path.is_file())
    }

    /// Exposure table for the configured band, if present.
    ///
    /// Sidecar files win; otherwise the combined file, whose footer may or
    /// may not hold the band's table.
    pub fn exposure_path(&self, visit: VisitId, config: &PipelineConfig) -> Option<PathBuf> {
        let dir = self.root.join(visit.to_string());
        let stem = Self::stem(visit, config.photometry.band, config.survey.cadence);
        ["csv", "json"]
            .into_iter()
            .map(|ext| dir.join(format!("{}-exptime.{}", stem, ext)))
            .chain(std::iter::once(self.combined_path(visit, config.survey.cadence)))
            .find(|path| path.is_file())
    }
}

#[async_trait]
impl VisitSource for DirectoryVisitSource {
    async fn list_visits(&self) -> Result<Vec<VisitId>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("Failed to read photometry directory: {}", self.root.display()))?;
        let mut visits = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(visit) = entry.file_name().to_str().and_then(|n| n.parse::<VisitId>().ok()) {
                visits.push(visit);
            }
        }
        visits.sort();
        Ok(visits)
    }

    async fn load_visit(&self, visit: VisitId, config: &PipelineConfig) -> Result<VisitData> {
        let band = config.photometry.band;
        let (photometry, exposure) = match (
            self.photometry_path(visit, config),
            self.exposure_path(visit, config),
        ) {
            (Some(photometry), Some(exposure)) => (photometry, exposure),
            _ => return Err(PipelineError::MissingBand { band, visit }.into()),
        };

        let config = config.clone();
        tokio::task::spawn_blocking(move || {
            VisitFileLoader::load(&photometry, &exposure, visit, &config)
        })
        .await
        .context("Visit loading task panicked")?
    }
}

/// A visit that could not be screened.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitFailure {
    pub visit: VisitId,
    /// True when the visit has no data for the band (not a processing fault).
    pub missing_data: bool,
    pub message: String,
}

/// Everything a survey run produced.
#[derive(Debug, Clone, Default)]
pub struct SurveyReport {
    pub catalog: SurveyCatalog,
    pub failures: Vec<VisitFailure>,
    pub excluded: Vec<VisitId>,
}

/// Screens every visit of a source concurrently.
pub struct SurveyScreener {
    source: Arc<dyn VisitSource>,
    pipeline: Arc<VisitPipeline>,
}

impl SurveyScreener {
    pub fn new(source: Arc<dyn VisitSource>, config: PipelineConfig) -> Self {
        Self {
            source,
            pipeline: Arc::new(VisitPipeline::with_config(config)),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    /// Screen every visit the source lists.
    ///
    /// At most `survey.max_concurrent_visits` visits are in flight at once.
    /// Per-visit failures are recorded in the report and never abort the run;
    /// only a failure to list visits is an error.
    pub async fn run(&self) -> Result<SurveyReport> {
        let visits = self.source.list_visits().await?;
        let survey = &self.config().survey;
        let semaphore = Arc::new(Semaphore::new(survey.max_concurrent_visits.max(1)));
        let mut report = SurveyReport::default();

        let mut tasks = Vec::with_capacity(visits.len());
        for visit in visits {
            if survey.excluded_visits.contains(&visit.0) {
                log::info!("Skipping excluded visit {}", visit);
                report.excluded.push(visit);
                continue;
            }
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let pipeline = Arc::clone(&self.pipeline);
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                let data = source.load_visit(visit, pipeline.config()).await?;
                let screening = tokio::task::spawn_blocking(move || pipeline.screen(&data))
                    .await
                    .context("Screening task panicked")?;
                Ok::<_, anyhow::Error>(screening)
            });
            tasks.push((visit, handle));
        }

        for (visit, handle) in tasks {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(anyhow::Error::new(e).context("Visit task panicked")),
            };
            match outcome {
                Ok(screening) => report.catalog.insert(screening),
                Err(e) => {
                    let missing_data = e
                        .downcast_ref::<PipelineError>()
                        .is_some_and(PipelineError::is_missing_data);
                    if missing_data {
                        log::warn!("No {} data for {}: {:#}", self.config().photometry.band, visit, e);
                    } else {
                        log::warn!("Failed to screen {}: {:#}", visit, e);
                    }
                    report.failures.push(VisitFailure {
                        visit,
                        missing_data,
                        message: format!("{:#}", e),
                    });
                }
            }
        }

        log::info!(
            "Screened {} visits ({} failed, {} excluded): {} candidates",
            report.catalog.len(),
            report.failures.len(),
            report.excluded.len(),
            report.catalog.candidate_count()
        );
        Ok(report)
    }
}
