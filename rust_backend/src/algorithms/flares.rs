//! Flare delineation and energy integration.
//!
//! Quiescence is estimated twice. The first, robust estimate seeds the flare
//! search; the second is an exposure-weighted mean over bins outside every
//! extended flare range, and the search is repeated against it.
//!
//! # Example
//!
//! ```
//! use gfcat_rust::algorithms::flares::FlareCharacterizer;
//! use gfcat_rust::core::domain::{ExposureTable, LightCurve, ObjectId, SourcePosition};
//!
//! let exposure = ExposureTable::uniform(0.0, 30.0, 29.0, 40).unwrap();
//! let mut cps = vec![1.0; 40];
//! let mut err = vec![0.1; 40];
//! for i in 20..=22 {
//!     cps[i] = 5.0;
//!     err[i] = 0.3;
//! }
//! let lc = LightCurve::new(ObjectId(0), SourcePosition::default(), cps, err).unwrap();
//!
//! let (ranges, quiescence) = FlareCharacterizer::default().find_flare_ranges(&lc, &exposure).unwrap();
//! assert_eq!(ranges, vec![19..=23]);
//! assert_eq!(quiescence.flux, 1.0);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::algorithms::photometry::{aperture_correct_cps, galex_to_utc};
use crate::algorithms::stats::robust_quiescence;
use crate::config::{FlareConfig, PhotometryConfig};
use crate::core::domain::{ExposureTable, FlareEnergy, FlareEvent, LightCurve, QuiescenceEstimate};
use crate::core::error::{PipelineError, PipelineResult};

/// Centimetres per parsec.
pub const PARSEC_CM: f64 = 3.086e18;

/// Peak details of one flare, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlarePeak {
    pub cps: f64,
    pub cps_err: f64,
    /// Bin midpoint in GALEX seconds.
    pub time: f64,
    pub time_utc: Option<DateTime<Utc>>,
}

/// Flares of one light curve with the quiescence they were measured against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlareCharacterization {
    pub quiescence: QuiescenceEstimate,
    pub flares: Vec<FlareEvent>,
}

/// Two-pass quiescence estimation, flare delineation and energy integration.
#[derive(Debug, Clone, Default)]
pub struct FlareCharacterizer {
    flare: FlareConfig,
    photometry: PhotometryConfig,
}

impl FlareCharacterizer {
    pub fn new(flare: FlareConfig, photometry: PhotometryConfig) -> Self {
        Self { flare, photometry }
    }

    /// First-pass quiescence: sigma-clipped median of the whole curve.
    pub fn initial_quiescence(&self, lc: &LightCurve) -> Option<QuiescenceEstimate> {
        robust_quiescence(
            lc.cps(),
            self.flare.clip_sigma,
            self.flare.clip_max_iters,
            self.flare.bin_width,
        )
    }

    /// Exposure-weighted mean count rate over bins outside `ranges`.
    ///
    /// The error is the Poisson error of the summed counts. Returns `None`
    /// when no bin outside the ranges carries exposure.
    pub fn refine_quiescence(
        &self,
        lc: &LightCurve,
        exposure: &ExposureTable,
        ranges: &[RangeInclusive<usize>],
    ) -> Option<QuiescenceEstimate> {
        let (mut weighted, mut total_expt) = (0.0, 0.0);
        for (i, (&cps, bin)) in lc.cps().iter().zip(exposure.bins()).enumerate() {
            if ranges.iter().any(|r| r.contains(&i)) {
                continue;
            }
            if cps.is_finite() && bin.expt > 0.0 {
                weighted += cps * bin.expt;
                total_expt += bin.expt;
            }
        }
        if !(total_expt > 0.0) {
            return None;
        }
        Some(QuiescenceEstimate {
            flux: weighted / total_expt,
            flux_err: weighted.max(0.0).sqrt() / total_expt,
        })
    }

    /// Bins significantly above `quiescence` with adequate exposure.
    fn seed_bins(&self, lc: &LightCurve, exposure: &ExposureTable, q: f64) -> Vec<usize> {
        let sigma = self.flare.detection_sigma;
        lc.cps()
            .iter()
            .zip(lc.cps_err())
            .zip(exposure.bins())
            .enumerate()
            .filter(|(_, ((&cps, &err), bin))| {
                bin.expt >= self.flare.min_bin_exposure && cps - sigma * err >= q
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Extends a seed run outward until `quiet_run_length` consecutive bins
    /// fall below `quiescence + 1σ`, the visit ends, or a time gap longer
    /// than `max_gap` separates adjacent bins.
    fn extend(
        &self,
        lc: &LightCurve,
        exposure: &ExposureTable,
        run: RangeInclusive<usize>,
        q: f64,
    ) -> RangeInclusive<usize> {
        let t0 = exposure.t0();
        let is_quiet = |i: usize| !(lc.cps()[i] - lc.cps_err()[i] >= q);
        let gap = |a: usize, b: usize| (t0[b] - t0[a]).abs() > self.flare.max_gap;

        let (mut start, mut end) = (*run.start(), *run.end());

        let mut quiet = 0;
        let mut i = start;
        while i > 0 && !gap(i - 1, i) {
            i -= 1;
            if is_quiet(i) {
                quiet += 1;
                if quiet >= self.flare.quiet_run_length {
                    break;
                }
            } else {
                quiet = 0;
            }
            start = i;
        }

        let last = lc.len() - 1;
        let mut quiet = 0;
        let mut i = end;
        while i < last && !gap(i, i + 1) {
            i += 1;
            if is_quiet(i) {
                quiet += 1;
                if quiet >= self.flare.quiet_run_length {
                    break;
                }
            } else {
                quiet = 0;
            }
            end = i;
        }

        start..=end
    }

    /// Seeds and extended, merged flare ranges against one quiescence level.
    pub(crate) fn detect(&self, lc: &LightCurve, exposure: &ExposureTable, q: f64) -> Vec<RangeInclusive<usize>> {
        let seeds = self.seed_bins(lc, exposure, q);
        let extended: Vec<RangeInclusive<usize>> = contiguous_runs(&seeds)
            .into_iter()
            .map(|run| self.extend(lc, exposure, run, q))
            .collect();
        merge_ranges(extended)
    }

    /// Two-pass flare search. Returns the final ranges and the refined quiescence.
    ///
    /// Fails when the light curve and exposure table are not aligned.
    pub fn find_flare_ranges(
        &self,
        lc: &LightCurve,
        exposure: &ExposureTable,
    ) -> PipelineResult<(Vec<RangeInclusive<usize>>, QuiescenceEstimate)> {
        lc.check_alignment(exposure)?;
        let initial = self.initial_quiescence(lc).unwrap_or(QuiescenceEstimate {
            flux: f64::NAN,
            flux_err: f64::NAN,
        });
        let first_pass = if initial.flux.is_finite() {
            self.detect(lc, exposure, initial.flux)
        } else {
            Vec::new()
        };
        let refined = self
            .refine_quiescence(lc, exposure, &first_pass)
            .unwrap_or(initial);
        let ranges = if refined.flux.is_finite() {
            self.detect(lc, exposure, refined.flux)
        } else {
            first_pass
        };
        Ok((ranges, refined))
    }

    /// Delineates flares without integrating their energy.
    pub fn find_flares(&self, lc: &LightCurve, exposure: &ExposureTable) -> PipelineResult<FlareCharacterization> {
        let (ranges, quiescence) = self.find_flare_ranges(lc, exposure)?;
        let flares = ranges.into_iter().map(|r| flare_event(lc, r)).collect();
        Ok(FlareCharacterization { quiescence, flares })
    }

    /// Delineates flares and integrates each one's fluence (and energy when
    /// `distance_pc` is given).
    ///
    /// Fails with [`PipelineError::MissingApertureCorrection`] when the light
    /// curve carries no aperture-corrected series.
    pub fn characterize(
        &self,
        lc: &LightCurve,
        exposure: &ExposureTable,
        distance_pc: Option<f64>,
    ) -> PipelineResult<FlareCharacterization> {
        if lc.cps_apcorrected().is_none() {
            return Err(PipelineError::MissingApertureCorrection);
        }
        let mut result = self.find_flares(lc, exposure)?;
        let q_apcorrected = aperture_correct_cps(
            result.quiescence.flux,
            self.photometry.aperture_radius,
            self.photometry.band,
        );
        for flare in &mut result.flares {
            flare.energy = Some(self.flare_energy(lc, flare.index_range(), q_apcorrected, distance_pc)?);
        }
        Ok(result)
    }

    /// Integrated fluence of `range` above the aperture-corrected quiescent
    /// count rate `q_apcorrected`.
    ///
    /// Sub-quiescent bins contribute zero. A non-finite final bin is zeroed;
    /// any other non-finite bin makes the fluence NaN.
    pub fn flare_energy(
        &self,
        lc: &LightCurve,
        range: RangeInclusive<usize>,
        q_apcorrected: f64,
        distance_pc: Option<f64>,
    ) -> PipelineResult<FlareEnergy> {
        let apcorrected = lc
            .cps_apcorrected()
            .ok_or(PipelineError::MissingApertureCorrection)?;
        if range.is_empty() || *range.end() >= lc.len() {
            return Err(PipelineError::InvalidData(format!(
                "Flare range {:?} outside light curve of {} bins",
                range,
                lc.len()
            )));
        }
        let constants = self.photometry.constants(self.photometry.band);
        let bin_width = self.flare.bin_width;
        let q_flux = constants.flux_scale * q_apcorrected;

        let mut flux: Vec<f64> = apcorrected[range.clone()]
            .iter()
            .map(|&c| {
                let f = constants.flux_scale * c - q_flux;
                if f < 0.0 {
                    0.0
                } else {
                    f
                }
            })
            .collect();
        if let Some(last) = flux.last_mut() {
            if !last.is_finite() {
                *last = 0.0;
            }
        }

        let (fluence, fluence_err) = if flux.iter().all(|f| f.is_finite()) {
            let integrated: f64 = flux.iter().map(|f| f * bin_width).sum();
            let err_sq: f64 = lc.cps_err()[range]
                .iter()
                .map(|e| (constants.flux_scale * e * bin_width).powi(2))
                .sum();
            (
                integrated * constants.effective_width,
                err_sq.sqrt() * constants.effective_width,
            )
        } else {
            (f64::NAN, f64::NAN)
        };

        let sphere = distance_pc.map(|d| 4.0 * std::f64::consts::PI * (d * PARSEC_CM).powi(2));
        Ok(FlareEnergy {
            fluence,
            fluence_err,
            energy: sphere.map(|s| s * fluence),
            energy_err: sphere.map(|s| s * fluence_err),
        })
    }

    /// Peak count rate and time of a flare.
    pub fn peak(&self, lc: &LightCurve, exposure: &ExposureTable, flare: &FlareEvent) -> Option<FlarePeak> {
        let bin = exposure.get(flare.peak_index)?;
        let time = bin.t0 + self.flare.bin_width / 2.0;
        Some(FlarePeak {
            cps: *lc.cps().get(flare.peak_index)?,
            cps_err: *lc.cps_err().get(flare.peak_index)?,
            time,
            time_utc: galex_to_utc(time),
        })
    }
}

/// Builds a flare record with censoring flags from an index range.
pub fn flare_event(lc: &LightCurve, range: RangeInclusive<usize>) -> FlareEvent {
    let (start, end) = (*range.start(), *range.end());
    let last = lc.len().saturating_sub(1);
    let peak_index = argmax(&lc.cps()[range]).map(|i| start + i).unwrap_or(start);
    FlareEvent {
        start,
        end,
        is_left_censored: start == 0,
        is_right_censored: end == last,
        peak_index,
        peak_is_censored: peak_index == 0 || peak_index == last,
        energy: None,
    }
}

/// Index of the first maximum, skipping NaN.
fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Splits sorted indices into maximal runs of consecutive values.
pub fn contiguous_runs(indices: &[usize]) -> Vec<RangeInclusive<usize>> {
    let mut runs = Vec::new();
    let mut iter = indices.iter().copied();
    let Some(first) = iter.next() else {
        return runs;
    };
    let (mut start, mut end) = (first, first);
    for i in iter {
        if i == end + 1 {
            end = i;
        } else {
            runs.push(start..=end);
            start = i;
            end = i;
        }
    }
    runs.push(start..=end);
    runs
}

/// Merges overlapping or adjacent ranges into disjoint sorted ranges.
pub fn merge_ranges(mut ranges: Vec<RangeInclusive<usize>>) -> Vec<RangeInclusive<usize>> {
    ranges.sort_by_key(|r| *r.start());
    let mut merged: Vec<RangeInclusive<usize>> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match merged.last_mut() {
            Some(prev) if *r.start() <= *prev.end() + 1 => {
                let end = (*prev.end()).max(*r.end());
                *prev = *prev.start()..=end;
            }
            _ => merged.push(r),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{ExposureBin, ObjectId, SourcePosition};

    fn curve(cps: Vec<f64>, err: Vec<f64>) -> LightCurve {
        LightCurve::new(ObjectId(1), SourcePosition::default(), cps, err).unwrap()
    }

    fn flare_curve() -> LightCurve {
        let mut cps = vec![1.0; 40];
        let mut err = vec![0.1; 40];
        for i in 20..=22 {
            cps[i] = 5.0;
            err[i] = 0.3;
        }
        curve(cps, err)
    }

    #[test]
    fn test_two_pass_flare_range() {
        let exposure = ExposureTable::uniform(0.0, 30.0, 29.0, 40).unwrap();
        let result = FlareCharacterizer::default()
            .find_flares(&flare_curve(), &exposure)
            .unwrap();
        assert_eq!(result.flares.len(), 1);
        let flare = &result.flares[0];
        assert_eq!((flare.start, flare.end), (19, 23));
        assert!(!flare.is_left_censored);
        assert!(!flare.is_right_censored);
        assert_eq!(flare.peak_index, 20);
        assert!(!flare.peak_is_censored);
        assert_eq!(result.quiescence.flux, 1.0);
    }

    #[test]
    fn test_single_bin_excursion_stops_at_gap() {
        let mut cps = vec![1.0; 20];
        cps[10] = 2.0;
        let err = vec![0.1; 20];
        let lc = curve(cps, err);
        // Bin 11 starts 2000 s after bin 10
        let bins: Vec<ExposureBin> = (0..20)
            .map(|i| {
                let t0 = if i <= 10 { i as f64 * 30.0 } else { 2000.0 + i as f64 * 30.0 };
                ExposureBin::new(t0, t0 + 30.0, 29.0).unwrap()
            })
            .collect();
        let exposure = ExposureTable::new(bins).unwrap();
        let (ranges, _) = FlareCharacterizer::default().find_flare_ranges(&lc, &exposure).unwrap();
        assert_eq!(ranges, vec![9..=10]);
        assert!(ranges[0].contains(&10));
    }

    #[test]
    fn test_short_exposure_table_is_rejected() {
        let mut cps = vec![1.0; 20];
        cps[19] = 5.0;
        let lc = curve(cps, vec![0.1; 20]);
        let exposure = ExposureTable::uniform(0.0, 30.0, 29.0, 12).unwrap();
        let result = FlareCharacterizer::default().find_flare_ranges(&lc, &exposure);
        assert!(matches!(result, Err(PipelineError::InvalidData(_))));
    }

    #[test]
    fn test_low_exposure_bins_do_not_seed() {
        let mut cps = vec![1.0; 20];
        cps[10] = 5.0;
        let lc = curve(cps, vec![0.1; 20]);
        let mut bins: Vec<ExposureBin> = ExposureTable::uniform(0.0, 30.0, 29.0, 20)
            .unwrap()
            .bins()
            .to_vec();
        bins[10].expt = 10.0;
        let exposure = ExposureTable::new(bins).unwrap();
        let (ranges, _) = FlareCharacterizer::default().find_flare_ranges(&lc, &exposure).unwrap();
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_censoring_flags() {
        let mut cps = vec![1.0; 20];
        cps[0] = 6.0;
        cps[1] = 5.0;
        let lc = curve(cps, vec![0.1; 20]);
        let exposure = ExposureTable::uniform(0.0, 30.0, 29.0, 20).unwrap();
        let result = FlareCharacterizer::default().find_flares(&lc, &exposure).unwrap();
        assert_eq!(result.flares.len(), 1);
        let flare = &result.flares[0];
        assert!(flare.is_left_censored);
        assert!(!flare.is_right_censored);
        assert_eq!(flare.peak_index, 0);
        assert!(flare.peak_is_censored);
        assert!(flare.is_censored());
    }

    #[test]
    fn test_energy_requires_aperture_correction() {
        let exposure = ExposureTable::uniform(0.0, 30.0, 29.0, 40).unwrap();
        let result = FlareCharacterizer::default().characterize(&flare_curve(), &exposure, Some(10.0));
        assert!(matches!(result, Err(PipelineError::MissingApertureCorrection)));
    }

    #[test]
    fn test_energy_never_negative() {
        let lc = curve(vec![1.0, 0.2, 3.0], vec![0.1; 3])
            .with_apcorrected(vec![1.0, 0.2, 3.0])
            .unwrap();
        let characterizer = FlareCharacterizer::default();
        let energy = characterizer.flare_energy(&lc, 0..=2, 1.0, None).unwrap();
        let constants = PhotometryConfig::default().nuv;
        let expected = constants.flux_scale * 2.0 * 30.0 * constants.effective_width;
        assert!((energy.fluence - expected).abs() < expected * 1e-12);
        assert!(energy.energy.is_none());

        let quiet = characterizer.flare_energy(&lc, 0..=1, 1.0, Some(5.0)).unwrap();
        assert_eq!(quiet.fluence, 0.0);
        assert_eq!(quiet.energy, Some(0.0));
    }

    #[test]
    fn test_energy_distance_scaling() {
        let lc = curve(vec![2.0, 2.0], vec![0.1; 2]).with_apcorrected(vec![2.0, 2.0]).unwrap();
        let energy = FlareCharacterizer::default()
            .flare_energy(&lc, 0..=1, 1.0, Some(10.0))
            .unwrap();
        let sphere = 4.0 * std::f64::consts::PI * (10.0 * PARSEC_CM).powi(2);
        let ratio = energy.energy.unwrap() / energy.fluence;
        assert!((ratio / sphere - 1.0).abs() < 1e-12);
        assert!(energy.energy_err.unwrap() > 0.0);
    }

    #[test]
    fn test_energy_non_finite_bins() {
        let characterizer = FlareCharacterizer::default();
        let trailing = curve(vec![2.0, 2.0, f64::NAN], vec![0.1; 3])
            .with_apcorrected(vec![2.0, 2.0, f64::NAN])
            .unwrap();
        assert!(characterizer.flare_energy(&trailing, 0..=2, 1.0, None).unwrap().fluence.is_finite());

        let interior = curve(vec![2.0, f64::NAN, 2.0], vec![0.1; 3])
            .with_apcorrected(vec![2.0, f64::NAN, 2.0])
            .unwrap();
        assert!(characterizer.flare_energy(&interior, 0..=2, 1.0, None).unwrap().fluence.is_nan());
    }

    #[test]
    fn test_characterize_with_aperture_correction() {
        let exposure = ExposureTable::uniform(0.0, 30.0, 29.0, 40).unwrap();
        let lc = flare_curve();
        let corrected: Vec<f64> = lc.cps().iter().map(|c| c * 1.2).collect();
        let lc = lc.with_apcorrected(corrected).unwrap();
        let result = FlareCharacterizer::default()
            .characterize(&lc, &exposure, Some(10.0))
            .unwrap();
        let energy = result.flares[0].energy.unwrap();
        assert!(energy.fluence > 0.0);
        assert!(energy.energy.unwrap() > 0.0);
    }

    #[test]
    fn test_peak_time() {
        let exposure = ExposureTable::uniform(1.0e9, 30.0, 29.0, 40).unwrap();
        let lc = flare_curve();
        let characterizer = FlareCharacterizer::default();
        let result = characterizer.find_flares(&lc, &exposure).unwrap();
        let peak = characterizer.peak(&lc, &exposure, &result.flares[0]).unwrap();
        assert_eq!(peak.cps, 5.0);
        assert_eq!(peak.time, 1.0e9 + 20.0 * 30.0 + 15.0);
        assert!(peak.time_utc.is_some());
    }

    #[test]
    fn test_contiguous_runs_and_merge() {
        assert_eq!(contiguous_runs(&[1, 2, 3, 7, 9, 10]), vec![1..=3, 7..=7, 9..=10]);
        assert!(contiguous_runs(&[]).is_empty());
        assert_eq!(merge_ranges(vec![5..=8, 0..=2, 3..=4, 10..=12]), vec![0..=8, 10..=12]);
    }

    #[test]
    fn test_argmax_first_maximum() {
        assert_eq!(argmax(&[1.0, 5.0, 5.0, 2.0]), Some(1));
        assert_eq!(argmax(&[f64::NAN, 1.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
