use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rustfft::{FftPlanner, num_complex::Complex64};

use crate::core::fft::fft_freqs;
use crate::core::stats::std_dev;

// --- noise generators ---

/// Standard normal white noise.
pub fn white_noise<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    (0..n).map(|_| StandardNormal.sample(&mut *rng)).collect()
}

/// Gaussian noise with the given mean and standard deviation.
pub fn gaussian_noise<R: Rng + ?Sized>(n: usize, mean: f64, sigma: f64, rng: &mut R) -> Vec<f64> {
    (0..n)
        .map(|_| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            mean + sigma * z
        })
        .collect()
}

/// 1/f noise by spectral shaping of white noise, scaled to unit standard
/// deviation. The DC bin is left untouched.
pub fn pink_noise<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let mut spec: Vec<Complex64> = white_noise(n, rng)
        .into_iter()
        .map(|v| Complex64::new(v, 0.0))
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut spec);

    let freqs = fft_freqs(n, 1.0);
    for (c, f) in spec.iter_mut().zip(freqs).skip(1) {
        *c /= f.abs().sqrt();
    }

    planner.plan_fft_inverse(n).process(&mut spec);
    let pink: Vec<f64> = spec.iter().map(|c| c.re / n as f64).collect();
    let sd = std_dev(&pink);
    if sd > 0.0 {
        pink.into_iter().map(|v| v / sd).collect()
    } else {
        pink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fft::{WelchParams, welch};
    use crate::core::stats::mean;
    use approx::assert_relative_eq;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn pink_noise_has_unit_std() {
        let mut rng = StdRng::seed_from_u64(1);
        let x = pink_noise(10_000, &mut rng);
        assert_eq!(x.len(), 10_000);
        assert_relative_eq!(std_dev(&x), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn pink_noise_power_falls_with_frequency() {
        let mut rng = StdRng::seed_from_u64(2);
        let fs = 1000.0;
        let x = pink_noise(60_000, &mut rng);
        let psd = welch(&x, fs, &WelchParams::hann(1000)).unwrap();
        let low: f64 = psd.band_indices(5.0, 15.0).map(|i| psd.power[i]).sum();
        let high: f64 = psd.band_indices(305.0, 315.0).map(|i| psd.power[i]).sum();
        // 1/f: roughly a factor 30 between 10 Hz and 310 Hz.
        assert!(low / high > 10.0, "ratio {}", low / high);
    }

    #[test]
    fn gaussian_noise_moments() {
        let mut rng = StdRng::seed_from_u64(3);
        let x = gaussian_noise(50_000, 668.0, 10.0, &mut rng);
        assert_relative_eq!(mean(&x), 668.0, epsilon = 0.2);
        assert_relative_eq!(std_dev(&x), 10.0, epsilon = 0.2);
    }

    #[test]
    fn empty_lengths() {
        let mut rng = StdRng::seed_from_u64(4);
        assert!(pink_noise(0, &mut rng).is_empty());
        assert!(white_noise(0, &mut rng).is_empty());
    }
}
