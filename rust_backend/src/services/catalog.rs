//! Survey-wide aggregation of per-visit screening results.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::core::domain::{Band, ObjectId, VisitId};
use crate::preprocessing::pipeline::VisitScreening;

/// One accepted candidate with the visit it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub visit: VisitId,
    pub band: Band,
    pub object_id: ObjectId,
    pub xcenter: f64,
    pub ycenter: f64,
    pub median_cps: f64,
    pub delta_cps: f64,
}

/// Screening results of a survey, keyed by visit.
///
/// Visits may be inserted in any order; iteration is always by visit id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurveyCatalog {
    visits: BTreeMap<VisitId, VisitScreening>,
}

impl SurveyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visit's result, replacing any earlier result for the visit.
    pub fn insert(&mut self, screening: VisitScreening) {
        self.visits.insert(screening.visit, screening);
    }

    pub fn get(&self, visit: VisitId) -> Option<&VisitScreening> {
        self.visits.get(&visit)
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    pub fn visits(&self) -> impl Iterator<Item = &VisitScreening> {
        self.visits.values()
    }

    pub fn candidate_count(&self) -> usize {
        self.visits.values().map(|v| v.candidates.len()).sum()
    }

    /// Visits skipped for insufficient exposure.
    pub fn skipped_visits(&self) -> Vec<VisitId> {
        self.visits
            .values()
            .filter(|v| v.is_skipped())
            .map(|v| v.visit)
            .collect()
    }

    /// Visits whose survivors were all discarded as too dense.
    pub fn cursed_visits(&self) -> Vec<VisitId> {
        self.visits
            .values()
            .filter(|v| v.is_cursed())
            .map(|v| v.visit)
            .collect()
    }

    /// Flat list of accepted candidates, ordered by visit then screening order.
    pub fn candidate_rows(&self) -> Vec<CandidateRow> {
        self.visits
            .values()
            .flat_map(|screening| {
                screening.candidates.iter().map(move |c| CandidateRow {
                    visit: screening.visit,
                    band: screening.band,
                    object_id: c.object_id,
                    xcenter: c.xcenter,
                    ycenter: c.ycenter,
                    median_cps: c.median_cps,
                    delta_cps: c.delta_cps,
                })
            })
            .collect()
    }

    /// Number of rejected objects per reason label across all visits.
    pub fn rejection_frequencies(&self) -> BTreeMap<&'static str, usize> {
        let mut frequencies = BTreeMap::new();
        for screening in self.visits.values() {
            for (label, count) in screening.rejection_tally() {
                *frequencies.entry(label).or_insert(0) += count;
            }
        }
        frequencies
    }

    /// Candidate rows as a DataFrame.
    pub fn candidates_dataframe(&self) -> PolarsResult<DataFrame> {
        let rows = self.candidate_rows();
        let n = rows.len();

        let mut visits = Vec::with_capacity(n);
        let mut bands = Vec::with_capacity(n);
        let mut object_ids = Vec::with_capacity(n);
        let mut xcenters = Vec::with_capacity(n);
        let mut ycenters = Vec::with_capacity(n);
        let mut medians = Vec::with_capacity(n);
        let mut deltas = Vec::with_capacity(n);

        for row in rows {
            visits.push(row.visit.0);
            bands.push(row.band.as_str());
            object_ids.push(row.object_id.0);
            xcenters.push(row.xcenter);
            ycenters.push(row.ycenter);
            medians.push(row.median_cps);
            deltas.push(row.delta_cps);
        }

        df!(
            "eclipse" => visits,
            "band" => bands,
            "obj_id" => object_ids,
            "xcenter" => xcenters,
            "ycenter" => ycenters,
            "median_cps" => medians,
            "delta_cps" => deltas,
        )
    }

    /// Write the candidate rows as CSV.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut df = self
            .candidates_dataframe()
            .context("Failed to build candidate table")?;
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Full per-visit results as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json().context("Failed to serialize catalog")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}
