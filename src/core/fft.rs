use rustfft::{FftPlanner, num_complex::Complex64};

use crate::error::StudyError;

/// Symmetric Hann window (offline/filter design)
/// w[i] = 0.5 * (1 - cos(2πi/(N-1)))
#[inline]
pub fn hann_window_symmetric(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let two_pi = std::f64::consts::PI * 2.0;
            let denom = (n - 1) as f64;
            (0..n)
                .map(|i| 0.5 * (1.0 - (two_pi * i as f64 / denom).cos()))
                .collect()
        }
    }
}

/// Periodic Hann window (for FFT/STFT, COLA)
/// w[i] = 0.5 * (1 - cos(2πi/N))
#[inline]
pub fn hann_window_periodic(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let two_pi = std::f64::consts::PI * 2.0;
            let n_f = n as f64;
            (0..n)
                .map(|i| 0.5 * (1.0 - (two_pi * i as f64 / n_f).cos()))
                .collect()
        }
    }
}

/// Periodic Hamming window.
/// w[i] = 0.54 - 0.46 * cos(2πi/N)
#[inline]
pub fn hamming_window_periodic(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let two_pi = std::f64::consts::PI * 2.0;
            let n_f = n as f64;
            (0..n)
                .map(|i| 0.54 - 0.46 * (two_pi * i as f64 / n_f).cos())
                .collect()
        }
    }
}

/// Symmetric Tukey (tapered cosine) window.
/// `alpha <= 0` is rectangular, `alpha >= 1` is a symmetric Hann.
pub fn tukey_window(n: usize, alpha: f64) -> Vec<f64> {
    match n {
        0 => return Vec::new(),
        1 => return vec![1.0],
        _ => {}
    }
    if alpha <= 0.0 {
        return vec![1.0; n];
    }
    if alpha >= 1.0 {
        return hann_window_symmetric(n);
    }

    let pi = std::f64::consts::PI;
    let m = (n - 1) as f64;
    let width = (alpha * m / 2.0).floor() as usize;
    let mut w = vec![1.0; n];
    for (i, v) in w.iter_mut().enumerate().take(width + 1) {
        let x = i as f64;
        *v = 0.5 * (1.0 + (pi * (-1.0 + 2.0 * x / (alpha * m))).cos());
    }
    for (i, v) in w.iter_mut().enumerate().skip(n - width - 1) {
        let x = i as f64;
        *v = 0.5 * (1.0 + (pi * (-2.0 / alpha + 1.0 + 2.0 * x / (alpha * m))).cos());
    }
    w
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WindowKind {
    #[default]
    Hann,
    Hamming,
}

impl WindowKind {
    pub fn periodic(self, n: usize) -> Vec<f64> {
        match self {
            WindowKind::Hann => hann_window_periodic(n),
            WindowKind::Hamming => hamming_window_periodic(n),
        }
    }
}

// ======================================================================
// Spectra
// ======================================================================

fn forward_fft(x: &[f64]) -> Vec<Complex64> {
    let mut buf: Vec<Complex64> = x.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    if buf.is_empty() {
        return buf;
    }
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(buf.len()).process(&mut buf);
    buf
}

/// Full-length |X[k]| in NumPy `fft` bin order.
pub fn fft_magnitude(x: &[f64]) -> Vec<f64> {
    forward_fft(x).iter().map(|c| c.norm()).collect()
}

/// One-sided |X[k]| for k = 0..=N/2.
pub fn rfft_magnitude(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    forward_fft(x)
        .iter()
        .take(n / 2 + 1)
        .map(|c| c.norm())
        .collect()
}

/// Bin frequencies for a full FFT of length `n` with sample spacing `d`
/// (positive bins first, then negative).
pub fn fft_freqs(n: usize, d: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * d);
    (0..n)
        .map(|k| {
            if k < n.div_ceil(2) {
                k as f64 * scale
            } else {
                (k as f64 - n as f64) * scale
            }
        })
        .collect()
}

/// Bin frequencies for a one-sided FFT of length `n` with sample spacing `d`.
pub fn rfft_freqs(n: usize, d: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * d);
    (0..=n / 2).map(|k| k as f64 * scale).collect()
}

// ======================================================================
// Welch PSD
// ======================================================================

#[derive(Clone, Debug)]
pub struct WelchParams {
    pub nperseg: usize,
    /// Defaults to `nperseg / 2`.
    pub noverlap: Option<usize>,
    pub window: WindowKind,
}

impl WelchParams {
    pub fn hann(nperseg: usize) -> Self {
        Self {
            nperseg,
            noverlap: None,
            window: WindowKind::Hann,
        }
    }
}

/// One-sided power spectral density.
#[derive(Clone, Debug, Default)]
pub struct Psd {
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
}

impl Psd {
    /// Indices whose frequency lies in `[lo, hi]`.
    pub fn band_indices(&self, lo: f64, hi: f64) -> impl Iterator<Item = usize> + '_ {
        self.freqs
            .iter()
            .enumerate()
            .filter(move |&(_, &f)| f >= lo && f <= hi)
            .map(|(i, _)| i)
    }

    /// Max power in `[lo, hi]`, `None` if no bin falls inside.
    pub fn band_max(&self, lo: f64, hi: f64) -> Option<f64> {
        self.band_indices(lo, hi)
            .map(|i| self.power[i])
            .reduce(f64::max)
    }
}

/// Welch averaged periodogram with density scaling.
///
/// Segments are mean-detrended and windowed; the segment length is clamped to
/// the signal length. Interior bins are doubled for the one-sided estimate.
pub fn welch(x: &[f64], fs: f64, params: &WelchParams) -> Result<Psd, StudyError> {
    if x.is_empty() {
        return Err(StudyError::invalid("x", "signal is empty"));
    }
    if !(fs > 0.0) {
        return Err(StudyError::invalid("fs", format!("must be positive, got {fs}")));
    }
    if params.nperseg == 0 {
        return Err(StudyError::invalid("nperseg", "must be non-zero"));
    }

    let nperseg = params.nperseg.min(x.len());
    let noverlap = params.noverlap.unwrap_or(nperseg / 2);
    if noverlap >= nperseg {
        return Err(StudyError::invalid(
            "noverlap",
            format!("{noverlap} must be smaller than nperseg {nperseg}"),
        ));
    }
    let step = nperseg - noverlap;
    let n_seg = (x.len() - noverlap) / step;

    let win = params.window.periodic(nperseg);
    let win_sq: f64 = win.iter().map(|w| w * w).sum();
    let scale = 1.0 / (fs * win_sq);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);
    let n_bins = nperseg / 2 + 1;
    let mut acc = vec![0.0f64; n_bins];
    let mut buf = vec![Complex64::new(0.0, 0.0); nperseg];

    for s in 0..n_seg {
        let seg = &x[s * step..s * step + nperseg];
        let mean = seg.iter().sum::<f64>() / nperseg as f64;
        for ((b, &v), &w) in buf.iter_mut().zip(seg).zip(&win) {
            *b = Complex64::new((v - mean) * w, 0.0);
        }
        fft.process(&mut buf);
        for (a, c) in acc.iter_mut().zip(&buf) {
            *a += c.norm_sqr();
        }
    }

    let nyquist_bin = (nperseg % 2 == 0).then_some(n_bins - 1);
    let power = acc
        .iter()
        .enumerate()
        .map(|(k, &a)| {
            let p = a * scale / n_seg as f64;
            if k == 0 || Some(k) == nyquist_bin { p } else { 2.0 * p }
        })
        .collect();
    let freqs = (0..n_bins)
        .map(|k| k as f64 * fs / nperseg as f64)
        .collect();

    Ok(Psd { freqs, power })
}

// ======================================================================
// FFT-domain band filter
// ======================================================================

/// Zero-phase brick-wall band-pass with notches, applied in the frequency
/// domain. Bins below `low_hz`, above `high_hz`, or within `notch_width_hz / 2`
/// of any notch are zeroed.
pub fn band_filter(
    x: &[f64],
    fs: f64,
    low_hz: f64,
    high_hz: f64,
    notches_hz: &[f64],
    notch_width_hz: f64,
) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let mut spec = forward_fft(x);
    let freqs = fft_freqs(n, 1.0 / fs);
    for (c, &f) in spec.iter_mut().zip(&freqs) {
        let af = f.abs();
        let outside = af < low_hz || af > high_hz;
        let notched = notches_hz
            .iter()
            .any(|&nf| (af - nf).abs() <= notch_width_hz / 2.0);
        if outside || notched {
            *c = Complex64::new(0.0, 0.0);
        }
    }
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_inverse(n).process(&mut spec);
    let inv_n = 1.0 / n as f64;
    spec.iter().map(|c| c.re * inv_n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine(fs: f64, f: f64, n: usize, amp: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * std::f64::consts::PI * f * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn test_hann_window_symmetric_sum() {
        let n = 1024;
        let w = hann_window_symmetric(n);
        assert!(w.iter().all(|&v| v >= 0.0));
        assert!(w.first().unwrap().abs() < 1e-12, "first sample not ~0");
        assert!(w.last().unwrap().abs() < 1e-12, "last sample not ~0");

        // Energy check: mean(w^2) ≈ 3/8
        let u: f64 = w.iter().map(|&x| x * x).sum::<f64>() / n as f64;
        assert!((u - 0.375).abs() < 1e-3, "mean-square mismatch: {u}");
    }

    #[test]
    fn hann_window_periodic_is_cola_at_half_hop() {
        let n = 1024;
        let w = hann_window_periodic(n);
        assert!(w[0].abs() < 1e-12);
        let hop = n / 2;
        let mut sum = vec![0.0f64; n + hop];
        for i in 0..n {
            sum[i] += w[i];
            sum[i + hop] += w[i];
        }
        let mid = n / 2;
        let avg = sum[mid - 32..mid + 32].iter().sum::<f64>() / 64.0;
        assert!((avg - 1.0).abs() < 1e-9, "OLA not flat: avg={avg}");
    }

    #[test]
    fn hamming_endpoints() {
        let w = hamming_window_periodic(8);
        assert_relative_eq!(w[0], 0.08, epsilon = 1e-12);
        assert_relative_eq!(w[4], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn tukey_limits_and_shape() {
        assert_eq!(tukey_window(5, 0.0), vec![1.0; 5]);
        let h = tukey_window(9, 1.0);
        let hs = hann_window_symmetric(9);
        for (a, b) in h.iter().zip(&hs) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }

        let w = tukey_window(101, 0.3);
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(w[100], 0.0, epsilon = 1e-12);
        assert_relative_eq!(w[50], 1.0, epsilon = 1e-12);
        // symmetric
        for i in 0..101 {
            assert_relative_eq!(w[i], w[100 - i], epsilon = 1e-9);
        }
    }

    #[test]
    fn fft_freqs_matches_numpy_ordering() {
        let f = fft_freqs(5, 0.1);
        let expected = [0.0, 2.0, 4.0, -4.0, -2.0];
        for (a, b) in f.iter().zip(expected) {
            assert_relative_eq!(*a, b, epsilon = 1e-12);
        }
        let f = fft_freqs(4, 1.0);
        assert_eq!(f, vec![0.0, 0.25, -0.5, -0.25]);
    }

    #[test]
    fn rfft_magnitude_peaks_at_tone_bin() {
        let fs = 1000.0;
        let n = 1000;
        let x = sine(fs, 50.0, n, 1.0);
        let mag = rfft_magnitude(&x);
        assert_eq!(mag.len(), n / 2 + 1);
        let (k, peak) = mag
            .iter()
            .enumerate()
            .fold((0, 0.0), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
        assert_eq!(k, 50);
        assert_relative_eq!(peak, n as f64 / 2.0, max_relative = 1e-9);
    }

    #[test]
    fn welch_preserves_sine_power() {
        // A sine of amplitude A carries A²/2 of power.
        let fs = 1000.0;
        let x = sine(fs, 125.0, 8000, 2.0);
        let psd = welch(&x, fs, &WelchParams::hann(1000)).unwrap();
        assert_eq!(psd.freqs.len(), 501);
        let df = psd.freqs[1] - psd.freqs[0];
        let total: f64 = psd.power.iter().sum::<f64>() * df;
        // Hann density scaling spreads the tone over 1.5 bins of ENBW.
        assert_relative_eq!(total, 2.0, max_relative = 0.02);
        let peak_bin = psd
            .power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_relative_eq!(psd.freqs[peak_bin], 125.0);
    }

    #[test]
    fn welch_white_noise_density_is_flat() {
        use rand::{SeedableRng, rngs::StdRng};
        use rand_distr::{Distribution, StandardNormal};

        let mut rng = StdRng::seed_from_u64(7);
        let fs = 200.0;
        let x: Vec<f64> = (0..40_000).map(|_| StandardNormal.sample(&mut rng)).collect();
        let psd = welch(&x, fs, &WelchParams::hann(256)).unwrap();
        // Unit variance white noise: one-sided density 2/fs.
        let interior = &psd.power[5..psd.power.len() - 5];
        let mean = interior.iter().sum::<f64>() / interior.len() as f64;
        assert_relative_eq!(mean, 2.0 / fs, max_relative = 0.05);
    }

    #[test]
    fn welch_clamps_segment_and_rejects_bad_input() {
        let x = vec![1.0, -1.0, 1.0, -1.0];
        let psd = welch(&x, 4.0, &WelchParams::hann(64)).unwrap();
        assert_eq!(psd.freqs.len(), 3);
        assert!(welch(&[], 1.0, &WelchParams::hann(4)).is_err());
        assert!(welch(&x, 0.0, &WelchParams::hann(4)).is_err());
        let bad = WelchParams {
            nperseg: 4,
            noverlap: Some(4),
            window: WindowKind::Hann,
        };
        assert!(welch(&x, 1.0, &bad).is_err());
    }

    #[test]
    fn band_filter_removes_out_of_band_and_notched_tones() {
        let fs = 1000.0;
        let n = 2000;
        let keep = sine(fs, 40.0, n, 1.0);
        let x: Vec<f64> = keep
            .iter()
            .zip(sine(fs, 300.0, n, 1.0))
            .zip(sine(fs, 50.0, n, 1.0))
            .map(|((a, b), c)| a + b + c)
            .collect();
        let y = band_filter(&x, fs, 1.0, 200.0, &[50.0], 2.0);
        for (a, b) in y.iter().zip(&keep) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
