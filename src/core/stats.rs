//! core/stats.rs: Descriptive statistics and two-sample tests.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::StudyError;

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Population variance (ddof = 0).
pub fn variance(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / x.len() as f64
}

/// Sample variance (ddof = 1).
pub fn sample_variance(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return f64::NAN;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (x.len() - 1) as f64
}

/// Population standard deviation (ddof = 0).
pub fn std_dev(x: &[f64]) -> f64 {
    variance(x).sqrt()
}

pub fn median(x: &[f64]) -> f64 {
    if x.is_empty() {
        return f64::NAN;
    }
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

pub fn max(x: &[f64]) -> f64 {
    x.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn min(x: &[f64]) -> f64 {
    x.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Trapezoidal integral of `y` over the sample points `x`.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    y.windows(2)
        .zip(x.windows(2))
        .map(|(yy, xx)| 0.5 * (yy[0] + yy[1]) * (xx[1] - xx[0]))
        .sum()
}

/// Shannon entropy (bits) of `values` binned into `bins` equal-width bins
/// spanning [min, max]. The last bin is closed on the right.
pub fn histogram_entropy(values: &[f64], bins: usize) -> f64 {
    if values.is_empty() || bins == 0 {
        return 0.0;
    }
    let lo = min(values);
    let hi = max(values);
    if !(hi > lo) {
        return 0.0;
    }
    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &v in values {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    let total = values.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct TTest {
    pub t: f64,
    pub p: f64,
    pub df: f64,
}

/// Independent two-sample Student t-test with pooled variance, two-sided.
pub fn ttest_ind(a: &[f64], b: &[f64]) -> Result<TTest, StudyError> {
    if a.len() < 2 || b.len() < 2 {
        return Err(StudyError::invalid(
            "samples",
            format!("need at least two values per group, got {} and {}", a.len(), b.len()),
        ));
    }
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let df = n1 + n2 - 2.0;
    let pooled = ((n1 - 1.0) * sample_variance(a) + (n2 - 1.0) * sample_variance(b)) / df;
    let se = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    let t = (mean(a) - mean(b)) / se;

    let p = if t.is_finite() {
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| StudyError::invalid("df", e.to_string()))?;
        (2.0 * dist.sf(t.abs())).min(1.0)
    } else if t.is_nan() {
        f64::NAN
    } else {
        0.0
    };
    Ok(TTest { t, p, df })
}

/// Cohen's d using the mean of the two population variances as pooled
/// spread. Zero when both groups are constant.
pub fn cohens_d(a: &[f64], b: &[f64]) -> f64 {
    let pooled = ((variance(a) + variance(b)) / 2.0).sqrt();
    if pooled > 0.0 {
        (mean(a) - mean(b)) / pooled
    } else {
        0.0
    }
}
