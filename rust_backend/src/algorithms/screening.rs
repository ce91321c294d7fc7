//! Variability screening filter chain.
//!
//! Each light curve is classified by a pure function: filters run in a fixed
//! order from cheapest to most expensive and the first one to fire decides
//! the rejection reason. Objects that survive every filter become
//! [`CandidateVariable`]s.
//!
//! # Filter order
//!
//! 1. too dim
//! 2. too brief
//! 3. insufficient coverage
//! 4. insufficient outliers (second-lowest baseline)
//! 5. spiky (crude), see [`crate::algorithms::spikes`]
//! 6. spiky (fine), prominence-based peak count
//! 7. Anderson-Darling normality test
//!
//! # Example
//!
//! ```
//! use gfcat_rust::algorithms::screening::{classify, Classification};
//! use gfcat_rust::config::ScreeningConfig;
//! use gfcat_rust::core::domain::{ExposureTable, LightCurve, ObjectId, RejectionReason, SourcePosition};
//!
//! let exposure = ExposureTable::uniform(0.0, 30.0, 29.0, 40).unwrap();
//! let lc = LightCurve::new(ObjectId(0), SourcePosition::default(), vec![0.2; 40], vec![0.05; 40]).unwrap();
//!
//! let result = classify(&lc, &exposure, &ScreeningConfig::default());
//! assert_eq!(result, Classification::Rejected(RejectionReason::TooDim));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::algorithms::spikes::is_spiky;
use crate::algorithms::stats::{anderson_darling, find_peaks, median};
use crate::config::ScreeningConfig;
use crate::core::domain::{CandidateVariable, ExposureTable, LightCurve, ObjectId, RejectionReason};

/// Terminal classification of one light curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Classification {
    Accepted(CandidateVariable),
    Rejected(RejectionReason),
}

impl Classification {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Classification::Accepted(_))
    }
}

/// Runs the filter chain on one light curve.
pub fn classify(lc: &LightCurve, exposure: &ExposureTable, config: &ScreeningConfig) -> Classification {
    match screen_light_curve(lc, exposure, config) {
        Ok(candidate) => Classification::Accepted(candidate),
        Err(reason) => Classification::Rejected(reason),
    }
}

fn screen_light_curve(
    lc: &LightCurve,
    exposure: &ExposureTable,
    config: &ScreeningConfig,
) -> Result<CandidateVariable, RejectionReason> {
    let cps = lc.cps();
    let err = lc.cps_err();

    if !cps.iter().any(|&c| c > config.dim_threshold_cps) {
        return Err(RejectionReason::TooDim);
    }

    let valid = lc.valid_indices();
    let (first, last) = match (valid.first(), valid.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return Err(RejectionReason::TooBrief),
    };

    let span = match (exposure.get(first), exposure.get(last)) {
        (Some(start), Some(end)) => end.t1 - start.t0,
        _ => f64::NAN,
    };
    if !(span >= config.min_duration) {
        return Err(RejectionReason::TooBrief);
    }

    let coverage = valid.len() as f64 / (last + 1 - first) as f64;
    if coverage < config.min_coverage {
        return Err(RejectionReason::InsufficientCoverage);
    }

    if count_outliers(cps, err, &valid, config) < config.min_outliers {
        return Err(RejectionReason::InsufficientOutliers);
    }

    if is_spiky(lc, &config.spike_tests) {
        return Err(RejectionReason::SpikyCrude);
    }

    let prominence: Vec<f64> = err.iter().map(|e| config.peak_prominence_sigma * e).collect();
    let peaks = find_peaks(cps, &prominence, config.peak_min_distance);
    if peaks.len() > config.max_peaks {
        return Err(RejectionReason::SpikyFine);
    }

    let valid_cps: Vec<f64> = valid.iter().map(|&i| cps[i]).collect();
    let variable = anderson_darling(&valid_cps)
        .map(|ad| ad.is_variable(config.ad_significance))
        .unwrap_or(false);
    if !variable {
        return Err(RejectionReason::AndersonDarling);
    }

    let (min, max) = valid_cps
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)));
    let median_cps = median(&valid_cps).ok_or(RejectionReason::TooBrief)?;

    Ok(CandidateVariable {
        object_id: lc.object_id,
        xcenter: lc.xcenter(),
        ycenter: lc.ycenter(),
        median_cps,
        delta_cps: min - max,
    })
}

/// Number of valid bins whose lower bound exceeds the second-lowest upper bound.
///
/// Using the second-lowest point as the baseline keeps a single bad bin from
/// manufacturing outliers. With `outlier_baseline_excludes_edges`, the first
/// and last bins of the visit do not contribute to the baseline.
pub fn count_outliers(cps: &[f64], err: &[f64], valid: &[usize], config: &ScreeningConfig) -> usize {
    let sigma = config.outlier_sigma;
    let last_bin = cps.len().saturating_sub(1);
    let mut upper: Vec<f64> = valid
        .iter()
        .filter(|&&i| !config.outlier_baseline_excludes_edges || (i != 0 && i != last_bin))
        .map(|&i| cps[i] + sigma * err[i])
        .filter(|u| u.is_finite())
        .collect();
    if upper.len() < 2 {
        return 0;
    }
    upper.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let second_min = upper[1];
    valid
        .iter()
        .filter(|&&i| cps[i] - sigma * err[i] > second_min)
        .count()
}

/// Accepted candidates and per-object rejection reasons of one set of light curves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    pub candidates: Vec<CandidateVariable>,
    pub rejections: BTreeMap<ObjectId, RejectionReason>,
}

impl ScreeningOutcome {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.rejections.is_empty()
    }

    /// Total number of classified objects.
    pub fn classified(&self) -> usize {
        self.candidates.len() + self.rejections.len()
    }
}

/// Per-object variability screener.
#[derive(Debug, Clone, Default)]
pub struct VariabilityScreener {
    config: ScreeningConfig,
}

impl VariabilityScreener {
    pub fn new(config: ScreeningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    pub fn classify(&self, lc: &LightCurve, exposure: &ExposureTable) -> Classification {
        classify(lc, exposure, &self.config)
    }

    /// Classifies every light curve; candidates keep input order.
    pub fn screen_all(&self, light_curves: &[LightCurve], exposure: &ExposureTable) -> ScreeningOutcome {
        let mut outcome = ScreeningOutcome::default();
        for lc in light_curves {
            match self.classify(lc, exposure) {
                Classification::Accepted(candidate) => outcome.candidates.push(candidate),
                Classification::Rejected(reason) => {
                    outcome.rejections.insert(lc.object_id, reason);
                }
            }
        }
        outcome
    }
}
