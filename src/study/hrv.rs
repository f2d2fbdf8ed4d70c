//! study/hrv.rs: RR-interval parameters near 668 ms, a synthetic HRV trace
//! and the octave divisions of 668 Hz.

use rand::Rng;
use serde::Serialize;

use crate::core::fft::{rfft_freqs, rfft_magnitude};
use crate::core::noise::gaussian_noise;
use crate::core::number::golden_division;
use crate::core::stats::mean;
use crate::core::util::add_sine;

pub const BASELINE_MS: f64 = 668.0;

const RESPIRATORY_HZ: f64 = 0.25;
const RESPIRATORY_MS: f64 = 50.0;
const AUTONOMIC_HZ: f64 = 0.1;
const AUTONOMIC_MS: f64 = 30.0;
const NOISE_MS: f64 = 10.0;

#[derive(Clone, Debug, Serialize)]
pub struct HrvParameter {
    pub name: &'static str,
    pub value_ms: i64,
    pub diff_ms: i64,
    pub ratio: f64,
}

/// Typical HRV landmarks and how far each sits from 668 ms.
pub fn hrv_parameters() -> Vec<HrvParameter> {
    [("RMSSD", 667), ("pNN50", 668), ("HF", 666), ("LF", 669)]
        .into_iter()
        .map(|(name, value_ms)| HrvParameter {
            name,
            value_ms,
            diff_ms: value_ms - BASELINE_MS as i64,
            ratio: value_ms as f64 / BASELINE_MS,
        })
        .collect()
}

/// `(668 / φ, 668 · φ)` in milliseconds.
pub fn golden_intervals() -> (f64, f64) {
    golden_division(BASELINE_MS)
}

pub fn heart_rate_bpm(interval_ms: f64) -> f64 {
    60_000.0 / interval_ms
}

#[derive(Clone, Debug)]
pub struct HrvSignal {
    /// Milliseconds.
    pub t_ms: Vec<f64>,
    pub rr_ms: Vec<f64>,
}

/// RR interval on a 1 ms grid: baseline plus respiratory (0.25 Hz) and
/// autonomic (0.1 Hz) modulation and N(0, 10 ms) jitter.
pub fn generate_hrv_signal<R: Rng + ?Sized>(duration_s: f64, base_ms: f64, rng: &mut R) -> HrvSignal {
    let n = (duration_s.max(0.0) * 1000.0).ceil() as usize;
    let t_ms: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let t_s: Vec<f64> = t_ms.iter().map(|t| t / 1000.0).collect();
    let mut rr_ms = gaussian_noise(n, base_ms, NOISE_MS, rng);
    add_sine(&mut rr_ms, &t_s, RESPIRATORY_HZ, RESPIRATORY_MS);
    add_sine(&mut rr_ms, &t_s, AUTONOMIC_HZ, AUTONOMIC_MS);
    HrvSignal { t_ms, rr_ms }
}

#[derive(Clone, Debug)]
pub struct HrvSpectrum {
    pub freqs: Vec<f64>,
    pub magnitude: Vec<f64>,
}

impl HrvSpectrum {
    /// Frequency of the largest non-DC bin.
    pub fn dominant_hz(&self) -> Option<f64> {
        self.magnitude
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| self.freqs[i])
    }
}

/// One-sided magnitude spectrum of the mean-removed RR trace (1 ms spacing).
pub fn hrv_spectrum(signal: &HrvSignal) -> HrvSpectrum {
    let m = mean(&signal.rr_ms);
    let centred: Vec<f64> = signal.rr_ms.iter().map(|v| v - m).collect();
    HrvSpectrum {
        freqs: rfft_freqs(centred.len(), 0.001),
        magnitude: rfft_magnitude(&centred),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BrainWaveDivision {
    pub band: &'static str,
    pub divisor: u32,
    pub freq: f64,
}

/// `668 / 2^k` for k = 4..=8, paired with the conventional band names.
pub fn brain_wave_divisions() -> Vec<BrainWaveDivision> {
    ["Gamma", "Beta", "Alpha", "Theta", "Delta"]
        .into_iter()
        .zip(4..=8u32)
        .map(|(band, k)| {
            let divisor = 1u32 << k;
            BrainWaveDivision {
                band,
                divisor,
                freq: BASELINE_MS / divisor as f64,
            }
        })
        .collect()
}
