//! Domain models for per-visit photometry.
//!
//! This module provides the data structures shared by every pipeline stage:
//! the exposure table of a visit, the light curve of one detected object, and
//! the records emitted by screening, deduplication and flare characterization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::core::error::{PipelineError, PipelineResult};

/// Identifier of an object within one visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a visit (a GALEX "eclipse").
///
/// Displays in the zero-padded form used for directory and file names.
///
/// ```
/// use gfcat_rust::core::domain::VisitId;
///
/// assert_eq!(VisitId(23456).to_string(), "e23456");
/// assert_eq!(VisitId(42).to_string(), "e00042");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitId(pub u32);

impl fmt::Display for VisitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{:05}", self.0)
    }
}

impl FromStr for VisitId {
    type Err = PipelineError;

    /// Parses either `23456` or the directory form `e23456`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('e');
        digits
            .parse::<u32>()
            .map(VisitId)
            .map_err(|_| PipelineError::InvalidData(format!("Invalid visit id: {}", s)))
    }
}

/// Photometric band of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    #[serde(rename = "NUV", alias = "nuv")]
    Nuv,
    #[serde(rename = "FUV", alias = "fuv")]
    Fuv,
}

impl Band {
    /// Upper-case band name ("NUV" / "FUV").
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Nuv => "NUV",
            Band::Fuv => "FUV",
        }
    }

    /// Single-letter band code used in column and file names.
    pub fn letter(&self) -> char {
        match self {
            Band::Nuv => 'n',
            Band::Fuv => 'f',
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Band {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NUV" | "N" => Ok(Band::Nuv),
            "FUV" | "F" => Ok(Band::Fuv),
            other => Err(PipelineError::Configuration(format!(
                "Unknown band '{}'. Must be 'NUV' or 'FUV'",
                other
            ))),
        }
    }
}

/// One time bin of a visit.
///
/// Times are GALEX seconds; `expt` is the effective (dead-time and
/// mask corrected) exposure within the bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureBin {
    pub t0: f64,
    pub t1: f64,
    pub expt: f64,
}

impl ExposureBin {
    /// Creates a bin, checking `t1 > t0` and `expt >= 0`.
    pub fn new(t0: f64, t1: f64, expt: f64) -> PipelineResult<Self> {
        let bin = Self { t0, t1, expt };
        bin.validate()?;
        Ok(bin)
    }

    fn validate(&self) -> PipelineResult<()> {
        if !(self.t1 > self.t0) {
            return Err(PipelineError::InvalidData(format!(
                "Exposure bin must satisfy t1 > t0 (t0={}, t1={})",
                self.t0, self.t1
            )));
        }
        if !(self.expt >= 0.0) {
            return Err(PipelineError::InvalidData(format!(
                "Exposure bin has negative or undefined exposure: {}",
                self.expt
            )));
        }
        Ok(())
    }

    /// Nominal duration of the bin in seconds.
    pub fn duration(&self) -> f64 {
        self.t1 - self.t0
    }
}

/// Ordered sequence of exposure bins for one visit.
///
/// Insertion order is temporal order; every light curve of the visit has
/// exactly one value per bin.
///
/// # Examples
///
/// ```
/// use gfcat_rust::core::domain::ExposureTable;
///
/// let table = ExposureTable::uniform(0.0, 30.0, 29.0, 40).unwrap();
/// assert_eq!(table.len(), 40);
/// assert!((table.total_exposure() - 1160.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExposureTable {
    bins: Vec<ExposureBin>,
}

impl ExposureTable {
    /// Creates a table from bins, validating each bin and the temporal order.
    pub fn new(bins: Vec<ExposureBin>) -> PipelineResult<Self> {
        for bin in &bins {
            bin.validate()?;
        }
        if let Some(pos) = bins.windows(2).position(|w| w[1].t0 < w[0].t0) {
            return Err(PipelineError::InvalidData(format!(
                "Exposure bins out of temporal order at bin {}",
                pos + 1
            )));
        }
        Ok(Self { bins })
    }

    /// Builds a table from parallel column vectors.
    pub fn from_columns(t0: &[f64], t1: &[f64], expt: &[f64]) -> PipelineResult<Self> {
        if t0.len() != t1.len() || t0.len() != expt.len() {
            return Err(PipelineError::Schema(format!(
                "Exposure columns differ in length: t0={}, t1={}, expt={}",
                t0.len(),
                t1.len(),
                expt.len()
            )));
        }
        let bins = t0
            .iter()
            .zip(t1)
            .zip(expt)
            .map(|((&t0, &t1), &expt)| ExposureBin { t0, t1, expt })
            .collect();
        Self::new(bins)
    }

    /// Contiguous bins of equal width and equal effective exposure.
    pub fn uniform(start: f64, bin_width: f64, expt: f64, n_bins: usize) -> PipelineResult<Self> {
        let bins = (0..n_bins)
            .map(|i| {
                let t0 = start + i as f64 * bin_width;
                ExposureBin {
                    t0,
                    t1: t0 + bin_width,
                    expt,
                }
            })
            .collect();
        Self::new(bins)
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bins(&self) -> &[ExposureBin] {
        &self.bins
    }

    pub fn get(&self, index: usize) -> Option<&ExposureBin> {
        self.bins.get(index)
    }

    /// Sum of effective exposure over all bins.
    pub fn total_exposure(&self) -> f64 {
        self.bins.iter().map(|b| b.expt).filter(|e| e.is_finite()).sum()
    }

    pub fn t0(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.t0).collect()
    }

    pub fn t1(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.t1).collect()
    }

    pub fn expt(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.expt).collect()
    }
}

/// Detector and sky position of a detected object.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SourcePosition {
    pub xcenter: f64,
    pub ycenter: f64,
    pub ra: f64,
    pub dec: f64,
}

impl SourcePosition {
    pub fn new(xcenter: f64, ycenter: f64, ra: f64, dec: f64) -> Self {
        Self {
            xcenter,
            ycenter,
            ra,
            dec,
        }
    }

    /// Position known only in detector pixels.
    pub fn pixel(xcenter: f64, ycenter: f64) -> Self {
        Self {
            xcenter,
            ycenter,
            ra: f64::NAN,
            dec: f64::NAN,
        }
    }
}

/// Count-rate time series of one object within one visit.
///
/// All per-bin sequences have the same length, which equals the number of
/// bins in the visit's [`ExposureTable`]. Dropped bins carry NaN. The series
/// is immutable once built; the builder-style `with_*` methods consume and
/// return a new value.
///
/// # Examples
///
/// ```
/// use gfcat_rust::core::domain::{ExposureTable, LightCurve, ObjectId, SourcePosition};
///
/// let exposure = ExposureTable::uniform(0.0, 30.0, 25.0, 3).unwrap();
/// let lc = LightCurve::from_counts(
///     ObjectId(7),
///     SourcePosition::pixel(100.0, 200.0),
///     &[100.0, 25.0, 0.0],
///     &exposure,
/// )
/// .unwrap();
///
/// assert_eq!(lc.cps(), &[4.0, 1.0, 0.0]);
/// assert_eq!(lc.cps_err()[0], 10.0 / 25.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCurve {
    pub object_id: ObjectId,
    pub position: SourcePosition,
    cps: Vec<f64>,
    cps_err: Vec<f64>,
    mask_flag: Vec<bool>,
    edge_flag: Vec<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cps_apcorrected: Option<Vec<f64>>,
}

impl LightCurve {
    /// Creates an unflagged light curve from count rates and their errors.
    pub fn new(
        object_id: ObjectId,
        position: SourcePosition,
        cps: Vec<f64>,
        cps_err: Vec<f64>,
    ) -> PipelineResult<Self> {
        if cps.len() != cps_err.len() {
            return Err(PipelineError::InvalidData(format!(
                "Object {}: cps has {} bins but cps_err has {}",
                object_id,
                cps.len(),
                cps_err.len()
            )));
        }
        let n = cps.len();
        Ok(Self {
            object_id,
            position,
            cps,
            cps_err,
            mask_flag: vec![false; n],
            edge_flag: vec![false; n],
            cps_apcorrected: None,
        })
    }

    /// Converts raw aperture sums to count rates using the visit's exposure.
    ///
    /// `cps = counts / expt` and `cps_err = sqrt(counts) / expt`. Bins with
    /// zero exposure, or negative counts for the error, yield NaN.
    pub fn from_counts(
        object_id: ObjectId,
        position: SourcePosition,
        counts: &[f64],
        exposure: &ExposureTable,
    ) -> PipelineResult<Self> {
        if counts.len() != exposure.len() {
            return Err(PipelineError::InvalidData(format!(
                "Object {}: {} count bins for {} exposure bins",
                object_id,
                counts.len(),
                exposure.len()
            )));
        }
        let (cps, cps_err) = counts
            .iter()
            .zip(exposure.bins())
            .map(|(&c, bin)| count_rate(c, bin.expt))
            .unzip();
        Self::new(object_id, position, cps, cps_err)
    }

    /// Attaches per-bin contamination flags.
    pub fn with_flags(mut self, mask_flag: Vec<bool>, edge_flag: Vec<bool>) -> PipelineResult<Self> {
        if mask_flag.len() != self.len() || edge_flag.len() != self.len() {
            return Err(PipelineError::InvalidData(format!(
                "Object {}: flag planes have {}/{} bins, expected {}",
                self.object_id,
                mask_flag.len(),
                edge_flag.len(),
                self.len()
            )));
        }
        self.mask_flag = mask_flag;
        self.edge_flag = edge_flag;
        Ok(self)
    }

    /// Attaches an aperture-corrected count-rate series.
    pub fn with_apcorrected(mut self, cps_apcorrected: Vec<f64>) -> PipelineResult<Self> {
        if cps_apcorrected.len() != self.len() {
            return Err(PipelineError::InvalidData(format!(
                "Object {}: aperture-corrected series has {} bins, expected {}",
                self.object_id,
                cps_apcorrected.len(),
                self.len()
            )));
        }
        self.cps_apcorrected = Some(cps_apcorrected);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.cps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cps.is_empty()
    }

    pub fn cps(&self) -> &[f64] {
        &self.cps
    }

    pub fn cps_err(&self) -> &[f64] {
        &self.cps_err
    }

    pub fn mask_flag(&self) -> &[bool] {
        &self.mask_flag
    }

    pub fn edge_flag(&self) -> &[bool] {
        &self.edge_flag
    }

    pub fn cps_apcorrected(&self) -> Option<&[f64]> {
        self.cps_apcorrected.as_deref()
    }

    pub fn xcenter(&self) -> f64 {
        self.position.xcenter
    }

    pub fn ycenter(&self) -> f64 {
        self.position.ycenter
    }

    /// True if any bin touches the hot-spot mask or the detector edge.
    pub fn is_flagged(&self) -> bool {
        self.mask_flag.iter().chain(&self.edge_flag).any(|&f| f)
    }

    /// Indices of bins with a finite, nonzero count rate.
    pub fn valid_indices(&self) -> Vec<usize> {
        self.cps
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_finite() && **c != 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    /// Count rates of the valid bins, in temporal order.
    pub fn valid_cps(&self) -> Vec<f64> {
        self.cps
            .iter()
            .copied()
            .filter(|c| c.is_finite() && *c != 0.0)
            .collect()
    }

    /// Checks the light curve against the visit's exposure table.
    pub fn check_alignment(&self, exposure: &ExposureTable) -> PipelineResult<()> {
        if self.len() != exposure.len() {
            return Err(PipelineError::InvalidData(format!(
                "Object {} has {} bins but the visit has {}",
                self.object_id,
                self.len(),
                exposure.len()
            )));
        }
        Ok(())
    }
}

/// Count rate and Poisson error for one bin.
pub fn count_rate(counts: f64, expt: f64) -> (f64, f64) {
    if !(expt > 0.0) || !counts.is_finite() {
        return (f64::NAN, f64::NAN);
    }
    let err = if counts >= 0.0 {
        counts.sqrt() / expt
    } else {
        f64::NAN
    };
    (counts / expt, err)
}

/// Everything the screening core needs for one visit and band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitData {
    pub visit: VisitId,
    pub band: Band,
    pub exposure: ExposureTable,
    pub light_curves: Vec<LightCurve>,
}

impl VisitData {
    pub fn new(visit: VisitId, band: Band, exposure: ExposureTable, light_curves: Vec<LightCurve>) -> Self {
        Self {
            visit,
            band,
            exposure,
            light_curves,
        }
    }
}

/// A light curve that passed every screening filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateVariable {
    pub object_id: ObjectId,
    pub xcenter: f64,
    pub ycenter: f64,
    /// Median count rate over valid bins.
    pub median_cps: f64,
    /// Minimum minus maximum valid count rate; never positive.
    pub delta_cps: f64,
}

/// Why an object was excluded from the candidate list.
///
/// Exactly one reason is recorded per rejected object: the first stage to
/// reject it wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    TooDim,
    TooBrief,
    InsufficientCoverage,
    InsufficientOutliers,
    SpikyCrude,
    SpikyFine,
    AndersonDarling,
    TooBright,
    ClusterTooLarge,
    ClusterTooSpread,
    Duplicate { representative: ObjectId },
    VisitTooDense,
}

impl RejectionReason {
    /// Stable short label, used as a frequency-table key.
    pub fn label(&self) -> &'static str {
        match self {
            RejectionReason::TooDim => "too dim",
            RejectionReason::TooBrief => "too brief",
            RejectionReason::InsufficientCoverage => "more than 1/4 bins unobserved",
            RejectionReason::InsufficientOutliers => "less than 3 outliers",
            RejectionReason::SpikyCrude => "spiky (crude)",
            RejectionReason::SpikyFine => "spiky (fine)",
            RejectionReason::AndersonDarling => "anderson-darling",
            RejectionReason::TooBright => "too bright (or in cluster w/too bright)",
            RejectionReason::ClusterTooLarge => "deduped: cluster too large",
            RejectionReason::ClusterTooSpread => "deduped: cluster > 2 arcmin",
            RejectionReason::Duplicate { .. } => "deduped: duplicate of cluster representative",
            RejectionReason::VisitTooDense => "cursed visit",
        }
    }

    /// True for reasons assigned by spatial deduplication or the visit-level valve.
    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            RejectionReason::TooBright
                | RejectionReason::ClusterTooLarge
                | RejectionReason::ClusterTooSpread
                | RejectionReason::Duplicate { .. }
                | RejectionReason::VisitTooDense
        )
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Duplicate { representative } => {
                write!(f, "{} {}", self.label(), representative)
            }
            _ => f.write_str(self.label()),
        }
    }
}

/// Inferred non-flaring count rate of a source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuiescenceEstimate {
    pub flux: f64,
    pub flux_err: f64,
}

/// Integrated output of a flare, in erg/cm² (fluence) or erg (energy).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlareEnergy {
    pub fluence: f64,
    pub fluence_err: f64,
    /// Isotropic energy; present only when a distance was supplied.
    pub energy: Option<f64>,
    pub energy_err: Option<f64>,
}

/// A contiguous run of bins with flux in excess of quiescence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlareEvent {
    /// First bin of the flare (inclusive).
    pub start: usize,
    /// Last bin of the flare (inclusive).
    pub end: usize,
    pub is_left_censored: bool,
    pub is_right_censored: bool,
    pub peak_index: usize,
    pub peak_is_censored: bool,
    pub energy: Option<FlareEnergy>,
}

impl FlareEvent {
    pub fn index_range(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }

    /// Number of bins in the flare.
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, index: usize) -> bool {
        self.index_range().contains(&index)
    }

    /// True when the start, end or peak of the flare lies outside the visit.
    pub fn is_censored(&self) -> bool {
        self.is_left_censored || self.is_right_censored || self.peak_is_censored
    }
}
