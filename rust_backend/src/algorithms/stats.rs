//! Statistical primitives shared by screening and flare characterization.
//!
//! All functions are pure and operate on slices. NaN values are treated as
//! missing data: they are skipped by the robust estimators and never compare
//! as peaks or outliers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::f64::consts::{PI, SQRT_2};

use crate::core::domain::QuiescenceEstimate;

/// Median of the finite values in `values`.
///
/// For even-length data, returns the average of the two middle values.
/// Returns `None` when no finite value remains.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    } else {
        Some(finite[mid])
    }
}

/// Arithmetic mean of the finite values.
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Standard deviation of the finite values with `ddof` delta degrees of freedom.
pub fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() <= ddof {
        return None;
    }
    let m = finite.iter().sum::<f64>() / finite.len() as f64;
    let ss: f64 = finite.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (finite.len() - ddof) as f64).sqrt())
}

/// Iterative sigma clipping about the median.
///
/// Returns a keep-mask the length of `values`. Non-finite values are always
/// masked. Each iteration masks values further than `sigma` population
/// standard deviations from the median of the values still kept; iteration
/// stops when nothing changes or after `max_iters` passes.
pub fn sigma_clip(values: &[f64], sigma: f64, max_iters: usize) -> Vec<bool> {
    let mut keep: Vec<bool> = values.iter().map(|v| v.is_finite()).collect();
    for _ in 0..max_iters {
        let kept: Vec<f64> = values
            .iter()
            .zip(&keep)
            .filter(|(_, &k)| k)
            .map(|(v, _)| *v)
            .collect();
        let (Some(center), Some(std)) = (median(&kept), std_dev(&kept, 0)) else {
            break;
        };
        let mut changed = false;
        for (k, v) in keep.iter_mut().zip(values) {
            if *k && (v - center).abs() > sigma * std {
                *k = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    keep
}

/// Robust non-flaring count rate of a light curve.
///
/// The estimate is the median of the sigma-clipped sample; its uncertainty
/// assumes Poisson counting statistics over the clipped sample's total
/// nominal exposure: `sqrt(q * N * bin_width) / (N * bin_width)`.
pub fn robust_quiescence(
    cps: &[f64],
    clip_sigma: f64,
    max_iters: usize,
    bin_width: f64,
) -> Option<QuiescenceEstimate> {
    let keep = sigma_clip(cps, clip_sigma, max_iters);
    let clipped: Vec<f64> = cps
        .iter()
        .zip(&keep)
        .filter(|(_, &k)| k)
        .map(|(v, _)| *v)
        .collect();
    let flux = median(&clipped)?;
    let total = clipped.len() as f64 * bin_width;
    Some(QuiescenceEstimate {
        flux,
        flux_err: (flux * total).sqrt() / total,
    })
}

/// Significance levels tabulated for the Anderson-Darling normality test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignificanceLevel {
    #[serde(rename = "15%")]
    Fifteen,
    #[serde(rename = "10%")]
    Ten,
    #[serde(rename = "5%")]
    Five,
    #[serde(rename = "2.5%")]
    TwoAndHalf,
    #[serde(rename = "1%")]
    One,
}

impl SignificanceLevel {
    pub const ALL: [SignificanceLevel; 5] = [
        SignificanceLevel::Fifteen,
        SignificanceLevel::Ten,
        SignificanceLevel::Five,
        SignificanceLevel::TwoAndHalf,
        SignificanceLevel::One,
    ];

    fn index(&self) -> usize {
        match self {
            SignificanceLevel::Fifteen => 0,
            SignificanceLevel::Ten => 1,
            SignificanceLevel::Five => 2,
            SignificanceLevel::TwoAndHalf => 3,
            SignificanceLevel::One => 4,
        }
    }

    /// Significance as a percentage.
    pub fn percent(&self) -> f64 {
        [15.0, 10.0, 5.0, 2.5, 1.0][self.index()]
    }
}

// Asymptotic critical values for a normal reference with estimated mean and variance.
const AD_NORMAL_CRITICAL: [f64; 5] = [0.576, 0.656, 0.787, 0.918, 1.092];

/// Anderson-Darling statistic of a sample against a fitted normal distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AndersonDarling {
    pub statistic: f64,
    /// Critical values at 15, 10, 5, 2.5 and 1 % significance.
    pub critical_values: [f64; 5],
}

impl AndersonDarling {
    pub fn critical_value(&self, level: SignificanceLevel) -> f64 {
        self.critical_values[level.index()]
    }

    /// True when normality is rejected at `level`, i.e. the sample looks variable.
    pub fn is_variable(&self, level: SignificanceLevel) -> bool {
        self.statistic.is_finite() && self.statistic > self.critical_value(level)
    }
}

/// Anderson-Darling test of the finite values of `sample` for normality.
///
/// Mean and variance are estimated from the sample (ddof = 1). The statistic
/// is uncorrected; the small-sample correction is applied to the critical
/// values instead (see [`normal_critical_values`]). Returns `None` for fewer
/// than two finite values or a sample without scatter.
pub fn anderson_darling(sample: &[f64]) -> Option<AndersonDarling> {
    let mut y: Vec<f64> = sample.iter().copied().filter(|v| v.is_finite()).collect();
    let n = y.len();
    if n < 2 {
        return None;
    }
    y.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let xbar = y.iter().sum::<f64>() / n as f64;
    let s = std_dev(&y, 1)?;
    if !(s > 0.0) {
        return None;
    }
    let w: Vec<f64> = y.iter().map(|v| (v - xbar) / s).collect();
    let nf = n as f64;
    let sum: f64 = (0..n)
        .map(|i| {
            let weight = (2.0 * (i + 1) as f64 - 1.0) / nf;
            weight * (norm_logcdf(w[i]) + norm_logsf(w[n - 1 - i]))
        })
        .sum();
    let statistic = -nf - sum;
    Some(AndersonDarling {
        statistic,
        critical_values: normal_critical_values(n),
    })
}

/// Critical values for a sample of `n` values, rounded to three decimals.
///
/// Asymptotic values scaled by `1 / (1 + 4/n - 25/n²)`.
pub fn normal_critical_values(n: usize) -> [f64; 5] {
    let nf = n as f64;
    let correction = 1.0 + 4.0 / nf - 25.0 / (nf * nf);
    let mut critical_values = [0.0; 5];
    for (c, a) in critical_values.iter_mut().zip(AD_NORMAL_CRITICAL) {
        *c = (a / correction * 1000.0).round() / 1000.0;
    }
    critical_values
}

/// Cumulative distribution function of the standard normal distribution.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * libm::erfc(-x / SQRT_2)
}

/// Natural log of the standard normal CDF, accurate far into the lower tail.
pub fn norm_logcdf(x: f64) -> f64 {
    let p = normal_cdf(x);
    if p > 0.0 {
        p.ln()
    } else {
        // Mills-ratio asymptote once erfc underflows
        let x2 = x * x;
        -0.5 * x2 - (-x).ln() - 0.5 * (2.0 * PI).ln() + (1.0 - 1.0 / x2 + 3.0 / (x2 * x2)).ln()
    }
}

/// Natural log of the standard normal survival function.
pub fn norm_logsf(x: f64) -> f64 {
    norm_logcdf(-x)
}

/// Indices of local maxima, including the midpoint of flat-topped plateaus.
///
/// The first and last samples are never maxima. Comparisons involving NaN
/// are false, so NaN neither forms nor extends a peak.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let i_max = x.len() - 1;
    let mut i = 1;
    while i < i_max {
        if x[i - 1] < x[i] {
            let mut i_ahead = i + 1;
            while i_ahead < i_max && x[i_ahead] == x[i] {
                i_ahead += 1;
            }
            if x[i_ahead] < x[i] {
                let left = i;
                let right = i_ahead - 1;
                peaks.push((left + right) / 2);
                i = i_ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Prominence of each peak: its height above the higher of the two lowest
/// points reachable on either side before meeting higher ground.
pub fn peak_prominences(x: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&peak| {
            let height = x[peak];

            let mut left_min = height;
            let mut i = peak as isize;
            while i >= 0 && x[i as usize] <= height {
                if x[i as usize] < left_min {
                    left_min = x[i as usize];
                }
                i -= 1;
            }

            let mut right_min = height;
            let mut j = peak;
            while j < x.len() && x[j] <= height {
                if x[j] < right_min {
                    right_min = x[j];
                }
                j += 1;
            }

            height - left_min.max(right_min)
        })
        .collect()
}

/// Drop peaks closer than `distance` samples to a higher peak.
///
/// Peaks are visited from highest to lowest; each surviving peak removes
/// its lower neighbours within the window.
fn select_by_peak_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        x[peaks[a]]
            .partial_cmp(&x[peaks[b]])
            .unwrap_or(Ordering::Equal)
    });
    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter(|(_, k)| *k)
        .map(|(p, _)| *p)
        .collect()
}

/// Local maxima separated by at least `distance` samples whose prominence
/// reaches the per-sample threshold `min_prominence[peak]`.
///
/// `min_prominence` must be the same length as `x`. A NaN threshold never
/// passes.
pub fn find_peaks(x: &[f64], min_prominence: &[f64], distance: usize) -> Vec<usize> {
    debug_assert_eq!(x.len(), min_prominence.len());
    let mut peaks = local_maxima(x);
    if distance > 1 && peaks.len() > 1 {
        peaks = select_by_peak_distance(x, &peaks, distance);
    }
    let prominences = peak_prominences(x, &peaks);
    peaks
        .into_iter()
        .zip(prominences)
        .filter(|(p, prom)| {
            min_prominence
                .get(*p)
                .map(|threshold| *prom >= *threshold)
                .unwrap_or(false)
        })
        .map(|(p, _)| p)
        .collect()
}
