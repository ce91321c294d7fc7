//! Crude artifact filter for narrow, high-significance excursions.
//!
//! Hot pixels and cosmic-ray-like hits produce isolated bins whose error bars
//! clear their neighbours on both sides. Each [`SpikeTest`] counts such
//! locations; a light curve is spiky when any test reaches its threshold.

use crate::config::SpikeTest;
use crate::core::domain::LightCurve;

/// Outcome of one spike test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeCount {
    pub test: SpikeTest,
    /// Number of qualifying excursion locations.
    pub count: usize,
    /// True if any qualifying bin is mask-flagged.
    pub touches_mask: bool,
}

impl SpikeCount {
    /// Flagged excursions lower the required count by one.
    pub fn fires(&self) -> bool {
        let required = if self.touches_mask {
            self.test.min_count.saturating_sub(1)
        } else {
            self.test.min_count
        };
        self.count >= required
    }
}

/// Counts locations `c` in `[bunch, len - bunch)` whose lower bound
/// `cps - sigma * err` exceeds the upper bound `cps + sigma * err` of both
/// the bin `bunch` before and the bin `bunch` after.
pub fn count_spikes(cps: &[f64], cps_err: &[f64], mask_flag: &[bool], test: SpikeTest) -> SpikeCount {
    let n = test.bunch;
    let len = cps.len().min(cps_err.len());
    let mut count = 0;
    let mut touches_mask = false;
    if n > 0 && len > 2 * n {
        let upper = |i: usize| cps[i] + test.sigma * cps_err[i];
        let lower = |i: usize| cps[i] - test.sigma * cps_err[i];
        for c in n..len - n {
            let lo = lower(c);
            if lo - upper(c - n) > 0.0 && lo - upper(c + n) > 0.0 {
                count += 1;
                if mask_flag.get(c).copied().unwrap_or(false) {
                    touches_mask = true;
                }
            }
        }
    }
    SpikeCount {
        test,
        count,
        touches_mask,
    }
}

/// True if any of `tests` fires on the light curve.
pub fn is_spiky(lc: &LightCurve, tests: &[SpikeTest]) -> bool {
    tests
        .iter()
        .any(|&test| count_spikes(lc.cps(), lc.cps_err(), lc.mask_flag(), test).fires())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreeningConfig;
    use crate::core::domain::{ObjectId, SourcePosition};

    fn curve(cps: Vec<f64>, err: f64) -> LightCurve {
        let n = cps.len();
        LightCurve::new(ObjectId(1), SourcePosition::default(), cps, vec![err; n]).unwrap()
    }

    fn single_bin_spikes(positions: &[usize], n: usize) -> Vec<f64> {
        let mut cps = vec![1.0; n];
        for &p in positions {
            cps[p] = 10.0;
        }
        cps
    }

    #[test]
    fn test_flat_curve_not_spiky() {
        let lc = curve(vec![1.0; 40], 0.1);
        assert!(!is_spiky(&lc, &ScreeningConfig::default().spike_tests));
    }

    #[test]
    fn test_three_isolated_spikes_fire() {
        let lc = curve(single_bin_spikes(&[5, 15, 25], 40), 0.1);
        assert!(is_spiky(&lc, &ScreeningConfig::default().spike_tests));
    }

    #[test]
    fn test_two_spikes_need_mask_flag() {
        let tests = ScreeningConfig::default().spike_tests;
        let lc = curve(single_bin_spikes(&[5, 15], 40), 0.1);
        assert!(!is_spiky(&lc, &tests));

        let mut mask = vec![false; 40];
        mask[15] = true;
        let flagged = lc.with_flags(mask, vec![false; 40]).unwrap();
        assert!(is_spiky(&flagged, &tests));
    }

    #[test]
    fn test_broad_bump_is_not_spiky() {
        // Three-bin plateau: the middle bin does not clear its 1-bin neighbours
        let mut cps = vec![1.0; 40];
        cps[20] = 5.0;
        cps[21] = 5.0;
        cps[22] = 5.0;
        let lc = curve(cps, 0.3);
        let tests = ScreeningConfig::default().spike_tests;
        let counts: Vec<usize> = tests
            .iter()
            .map(|&t| count_spikes(lc.cps(), lc.cps_err(), lc.mask_flag(), t).count)
            .collect();
        assert_eq!(counts, vec![0, 1]);
        assert!(!is_spiky(&lc, &tests));
    }

    #[test]
    fn test_short_curve_has_no_spikes() {
        let test = SpikeTest {
            sigma: 2.0,
            bunch: 2,
            min_count: 5,
        };
        let count = count_spikes(&[1.0, 9.0, 1.0, 1.0], &[0.1; 4], &[false; 4], test);
        assert_eq!(count.count, 0);
    }

    #[test]
    fn test_nan_bins_never_count() {
        let mut cps = single_bin_spikes(&[5, 15, 25], 40);
        cps[4] = f64::NAN;
        let lc = curve(cps, 0.1);
        let test = ScreeningConfig::default().spike_tests[0];
        assert_eq!(count_spikes(lc.cps(), lc.cps_err(), lc.mask_flag(), test).count, 2);
    }
}
