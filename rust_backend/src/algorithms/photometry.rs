//! Photometric unit conversions, aperture correction and light-curve summaries.
//!
//! Count rates are converted with the per-band constants of
//! [`BandConstants`]. The free functions taking a [`Band`] use the canonical
//! GALEX calibration; pipeline code passes the configured constants instead.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::algorithms::spikes::is_spiky;
use crate::algorithms::stats::{anderson_darling, SignificanceLevel};
use crate::config::{BandConstants, PhotometryConfig, SpikeTest};
use crate::core::domain::{Band, ExposureTable, LightCurve};
use crate::core::error::PipelineResult;

/// Offset between the GALEX time epoch and the Unix epoch, in seconds.
pub const GALEX_EPOCH_OFFSET: f64 = 315_964_800.0;

static CANONICAL: Lazy<PhotometryConfig> = Lazy::new(PhotometryConfig::default);

/// Aperture radii (arcsec) of the GALEX aperture-correction table.
const APERTURE_RADII: [f64; 10] = [1.5, 2.3, 3.8, 6.0, 9.0, 12.8, 17.3, 30.0, 60.0, 90.0];
const FUV_DMAG: [f64; 10] = [1.65, 0.96, 0.36, 0.15, 0.1, 0.09, 0.07, 0.06, 0.03, 0.01];
const NUV_DMAG: [f64; 10] = [2.09, 1.33, 0.59, 0.23, 0.13, 0.09, 0.07, 0.04, -0.00, -0.01];

impl BandConstants {
    /// Canonical constants of `band`.
    pub fn canonical(band: Band) -> &'static BandConstants {
        CANONICAL.constants(band)
    }

    /// Flux density (erg s⁻¹ cm⁻² Å⁻¹) of a count rate.
    pub fn counts_to_flux(&self, cps: f64) -> f64 {
        self.flux_scale * cps
    }

    /// AB magnitude of a count rate; NaN when `cps <= 0`.
    pub fn counts_to_mag(&self, cps: f64) -> f64 {
        if cps > 0.0 {
            -2.5 * cps.log10() + self.zero_point
        } else {
            f64::NAN
        }
    }

    pub fn mag_to_counts(&self, mag: f64) -> f64 {
        10f64.powf(-(mag - self.zero_point) / 2.5)
    }
}

pub fn counts_to_flux(cps: f64, band: Band) -> f64 {
    BandConstants::canonical(band).counts_to_flux(cps)
}

pub fn counts_to_mag(cps: f64, band: Band) -> f64 {
    BandConstants::canonical(band).counts_to_mag(cps)
}

pub fn mag_to_counts(mag: f64, band: Band) -> f64 {
    BandConstants::canonical(band).mag_to_counts(mag)
}

/// Magnitude correction for a circular aperture of `radius` arcseconds.
///
/// Linear interpolation in the GALEX aperture-correction table. Radii below
/// the table use its first entry; beyond 90″ (60″ for NUV) the correction is 0.
///
/// ```
/// use gfcat_rust::algorithms::photometry::aperture_correction;
/// use gfcat_rust::core::domain::Band;
///
/// assert_eq!(aperture_correction(12.8, Band::Nuv), 0.09);
/// assert_eq!(aperture_correction(120.0, Band::Fuv), 0.0);
/// ```
pub fn aperture_correction(radius: f64, band: Band) -> f64 {
    let dmag = match band {
        Band::Fuv => &FUV_DMAG,
        Band::Nuv => &NUV_DMAG,
    };
    let limit = match band {
        Band::Fuv => APERTURE_RADII[9],
        Band::Nuv => APERTURE_RADII[8],
    };
    if radius > limit {
        return 0.0;
    }
    if radius <= APERTURE_RADII[0] {
        return dmag[0];
    }
    let hi = APERTURE_RADII
        .iter()
        .position(|&r| r >= radius)
        .unwrap_or(APERTURE_RADII.len() - 1);
    if APERTURE_RADII[hi] == radius {
        return dmag[hi];
    }
    let lo = hi - 1;
    let slope = (dmag[hi] - dmag[lo]) / (APERTURE_RADII[hi] - APERTURE_RADII[lo]);
    dmag[lo] + slope * (radius - APERTURE_RADII[lo])
}

/// Count rate corrected to total flux for an aperture of `radius` arcseconds.
pub fn aperture_correct_cps(cps: f64, radius: f64, band: Band) -> f64 {
    cps * 10f64.powf(aperture_correction(radius, band) / 2.5)
}

impl LightCurve {
    /// Attaches the aperture-corrected count-rate series for `radius` arcseconds.
    pub fn with_aperture_correction(self, radius: f64, band: Band) -> PipelineResult<Self> {
        let corrected = self
            .cps()
            .iter()
            .map(|&c| aperture_correct_cps(c, radius, band))
            .collect();
        self.with_apcorrected(corrected)
    }
}

/// Converts GALEX seconds to UTC.
pub fn galex_to_utc(t: f64) -> Option<DateTime<Utc>> {
    if !t.is_finite() {
        return None;
    }
    let unix = t + GALEX_EPOCH_OFFSET;
    let secs = unix.floor();
    let nanos = ((unix - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

/// Visit-integrated photometry of one object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotometrySummary {
    /// Exposure-weighted mean count rate.
    pub cps: f64,
    pub cps_err: f64,
    pub mag: f64,
    /// Magnitude error toward brighter values.
    pub mag_err_bright: f64,
    /// Magnitude error toward fainter values; NaN when `cps <= cps_err`.
    pub mag_err_faint: f64,
}

/// Integrates a light curve over its visit.
///
/// Returns `None` when the finite bins hold no counts.
pub fn summarize_photometry(
    lc: &LightCurve,
    exposure: &ExposureTable,
    constants: &BandConstants,
) -> Option<PhotometrySummary> {
    let (counts, expt) = lc
        .cps()
        .iter()
        .zip(exposure.bins())
        .filter(|(c, _)| c.is_finite())
        .fold((0.0, 0.0), |(n, t), (c, bin)| (n + c * bin.expt, t + bin.expt));
    if counts == 0.0 || !(expt > 0.0) {
        return None;
    }
    let cps = counts / expt;
    let cps_err = counts.max(0.0).sqrt() / expt;
    let mag = constants.counts_to_mag(cps);
    Some(PhotometrySummary {
        cps,
        cps_err,
        mag,
        mag_err_bright: mag - constants.counts_to_mag(cps + cps_err),
        mag_err_faint: constants.counts_to_mag(cps - cps_err) - mag,
    })
}

/// Diagnostic statistics of one light curve, used for bright-star studies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCurveSummary {
    pub xcenter: f64,
    pub ycenter: f64,
    /// Mean absolute deviation from the mean count rate.
    pub mad: f64,
    /// Mean of the first five bins.
    pub start_cps: f64,
    /// Mean of the five bins before the final one.
    pub end_cps: f64,
    /// Extremes excluding the final bin.
    pub min_cps: f64,
    pub max_cps: f64,
    pub mean_err: f64,
    pub ad_statistic: f64,
    pub ad_critical_10: f64,
    pub ad_critical_05: f64,
    pub ad_critical_01: f64,
    pub is_spiky: bool,
}

fn nan_mean(values: &[f64]) -> f64 {
    crate::algorithms::stats::mean(values).unwrap_or(f64::NAN)
}

impl LightCurveSummary {
    pub fn from_light_curve(lc: &LightCurve, spike_tests: &[SpikeTest]) -> Self {
        let cps = lc.cps();
        let n = cps.len();
        let mean = nan_mean(cps);
        let deviations: Vec<f64> = cps.iter().map(|c| (c - mean).abs()).collect();
        let head = &cps[..n.min(5)];
        let tail = &cps[n.saturating_sub(6)..n.saturating_sub(1)];
        let body = &cps[..n.saturating_sub(1)];
        let finite_body = body.iter().copied().filter(|c| c.is_finite());
        let min_cps = finite_body.clone().fold(f64::NAN, f64::min);
        let max_cps = finite_body.fold(f64::NAN, f64::max);
        let ad = anderson_darling(cps);
        let critical = |level| ad.map(|a| a.critical_value(level)).unwrap_or(f64::NAN);

        Self {
            xcenter: lc.xcenter(),
            ycenter: lc.ycenter(),
            mad: nan_mean(&deviations),
            start_cps: nan_mean(head),
            end_cps: nan_mean(tail),
            min_cps,
            max_cps,
            mean_err: nan_mean(lc.cps_err()),
            ad_statistic: ad.map(|a| a.statistic).unwrap_or(f64::NAN),
            ad_critical_10: critical(SignificanceLevel::Ten),
            ad_critical_05: critical(SignificanceLevel::Five),
            ad_critical_01: critical(SignificanceLevel::One),
            is_spiky: is_spiky(lc, spike_tests),
        }
    }
}
