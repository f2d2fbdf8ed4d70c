//! study/rivalry.rs: Dominant vs suppressed perception trials compared by
//! sub-harmonic FFT magnitude inside fixed post-stimulus windows.

use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::core::fft::{fft_freqs, fft_magnitude};
use crate::core::noise::gaussian_noise;
use crate::core::stats::{TTest, cohens_d, ttest_ind};
use crate::error::StudyError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub name: &'static str,
    pub start_ms: u32,
    pub end_ms: u32,
}

pub const TIME_WINDOWS: [TimeWindow; 4] = [
    TimeWindow { name: "VAN", start_ms: 130, end_ms: 320 },
    TimeWindow { name: "P3a", start_ms: 300, end_ms: 500 },
    TimeWindow { name: "late", start_ms: 400, end_ms: 600 },
    TimeWindow { name: "ultra_late", start_ms: 600, end_ms: 800 },
];

pub const RIVALRY_HARMONICS: [(&str, f64); 5] = [
    ("334Hz", 334.0),
    ("223Hz", 222.7),
    ("167Hz", 167.0),
    ("134Hz", 133.6),
    ("111Hz", 111.3),
];

/// Bursts injected into dominant trials: window, frequency, amplitude.
const DOMINANT_BURSTS: [(usize, f64, f64); 3] = [(0, 334.0, 0.5), (1, 167.0, 0.3), (2, 111.0, 0.2)];
const DOMINANT_NOISE: f64 = 0.2;
const SUPPRESSED_NOISE: f64 = 0.3;
const HALF_BAND_HZ: f64 = 2.0;
pub const SIGNIFICANCE: f64 = 0.05;

#[derive(Clone, Debug)]
pub struct RivalryData {
    pub dominant: Vec<Vec<f64>>,
    pub suppressed: Vec<Vec<f64>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HarmonicComparison {
    pub harmonic: &'static str,
    pub freq: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub cohens_d: f64,
    pub significant: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct WindowResult {
    pub window: TimeWindow,
    pub comparisons: Vec<HarmonicComparison>,
}

impl WindowResult {
    pub fn significant(&self) -> impl Iterator<Item = &HarmonicComparison> {
        self.comparisons.iter().filter(|c| c.significant)
    }
}

/// Per harmonic, one magnitude per trial.
pub type HarmonicPowers = Vec<(&'static str, f64, Vec<f64>)>;

pub struct RivalryProtocol {
    pub sample_rate: f64,
}

impl RivalryProtocol {
    pub fn new(sample_rate: f64) -> Result<Self, StudyError> {
        if !(sample_rate > 0.0) {
            return Err(StudyError::invalid("sample_rate", "must be positive"));
        }
        Ok(Self { sample_rate })
    }

    fn index(&self, ms: u32) -> usize {
        (ms as f64 * self.sample_rate / 1000.0) as usize
    }

    pub fn window_range(&self, w: &TimeWindow) -> std::ops::Range<usize> {
        self.index(w.start_ms)..self.index(w.end_ms)
    }

    /// `n_trials / 2` dominant trials with windowed bursts over N(0, 0.2)
    /// and as many suppressed trials of N(0, 0.3) noise.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        n_trials: usize,
        trial_seconds: f64,
        rng: &mut R,
    ) -> RivalryData {
        let n = (trial_seconds.max(0.0) * self.sample_rate) as usize;
        let half = n_trials / 2;
        let mut dominant = Vec::with_capacity(half);
        for _ in 0..half {
            let mut trial = vec![0.0; n];
            for (w, freq, amp) in DOMINANT_BURSTS {
                let r = self.window_range(&TIME_WINDOWS[w]);
                let r = r.start.min(n)..r.end.min(n);
                for i in r {
                    let t = i as f64 / self.sample_rate;
                    trial[i] += amp * (2.0 * std::f64::consts::PI * freq * t).sin();
                }
            }
            for (x, z) in trial.iter_mut().zip(gaussian_noise(n, 0.0, DOMINANT_NOISE, rng)) {
                *x += z;
            }
            dominant.push(trial);
        }
        let suppressed = (0..half)
            .map(|_| gaussian_noise(n, 0.0, SUPPRESSED_NOISE, rng))
            .collect();
        info!(dominant = half, suppressed = half, "simulated rivalry trials");
        RivalryData {
            dominant,
            suppressed,
        }
    }

    /// Max FFT magnitude within ±2 Hz of each harmonic, for every trial's
    /// slice of `window`. Harmonics with no bin inside the band are left out.
    pub fn analyze_window(&self, trials: &[Vec<f64>], window: &TimeWindow) -> HarmonicPowers {
        let range = self.window_range(window);
        let mut out: HarmonicPowers = RIVALRY_HARMONICS
            .iter()
            .map(|&(name, f)| (name, f, Vec::with_capacity(trials.len())))
            .collect();
        for trial in trials {
            let end = range.end.min(trial.len());
            let start = range.start.min(end);
            let slice = &trial[start..end];
            if slice.is_empty() {
                continue;
            }
            let freqs = fft_freqs(slice.len(), 1.0 / self.sample_rate);
            let mag = fft_magnitude(slice);
            for (_, f, powers) in out.iter_mut() {
                let peak = freqs
                    .iter()
                    .zip(&mag)
                    .filter(|&(&fr, _)| fr >= *f - HALF_BAND_HZ && fr <= *f + HALF_BAND_HZ)
                    .map(|(_, &m)| m)
                    .reduce(f64::max);
                if let Some(p) = peak {
                    powers.push(p);
                }
            }
        }
        out.retain(|(_, _, p)| !p.is_empty());
        out
    }

    pub fn compare(
        &self,
        dominant: &HarmonicPowers,
        suppressed: &HarmonicPowers,
    ) -> Result<Vec<HarmonicComparison>, StudyError> {
        let mut out = Vec::new();
        for (name, freq, dom) in dominant {
            let Some((_, _, sup)) = suppressed.iter().find(|(n, _, _)| n == name) else {
                continue;
            };
            let TTest { t, p, .. } = ttest_ind(dom, sup)?;
            out.push(HarmonicComparison {
                harmonic: name,
                freq: *freq,
                t_statistic: t,
                p_value: p,
                cohens_d: cohens_d(dom, sup),
                significant: p < SIGNIFICANCE,
            });
        }
        Ok(out)
    }

    pub fn run(&self, data: &RivalryData) -> Result<Vec<WindowResult>, StudyError> {
        TIME_WINDOWS
            .iter()
            .map(|w| {
                let dom = self.analyze_window(&data.dominant, w);
                let sup = self.analyze_window(&data.suppressed, w);
                Ok(WindowResult {
                    window: *w,
                    comparisons: self.compare(&dom, &sup)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn window_indices_at_1khz() {
        let p = RivalryProtocol::new(1000.0).unwrap();
        assert_eq!(p.window_range(&TIME_WINDOWS[0]), 130..320);
        assert_eq!(p.window_range(&TIME_WINDOWS[3]), 600..800);
    }

    #[test]
    fn simulate_shapes() {
        let p = RivalryProtocol::new(1000.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let d = p.simulate(10, 1.5, &mut rng);
        assert_eq!(d.dominant.len(), 5);
        assert_eq!(d.suppressed.len(), 5);
        assert!(d.dominant.iter().all(|t| t.len() == 1500));
    }

    #[test]
    fn p3a_window_separates_167hz() {
        let p = RivalryProtocol::new(1000.0).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let d = p.simulate(100, 1.5, &mut rng);
        let results = p.run(&d).unwrap();
        assert_eq!(results.len(), 4);
        let p3a = &results[1];
        let c167 = p3a
            .comparisons
            .iter()
            .find(|c| c.harmonic == "167Hz")
            .expect("167 Hz has a bin in the P3a window");
        assert!(c167.significant);
        assert!(c167.t_statistic > 0.0);
        assert!(c167.cohens_d > 1.0);
        assert!(p3a.significant().count() >= 1);
    }

    #[test]
    fn harmonics_without_bins_are_omitted() {
        // 190-sample window at 1 kHz: 5.26 Hz bins, neither 334 Hz nor
        // 133.6 Hz has one within ±2 Hz.
        let p = RivalryProtocol::new(1000.0).unwrap();
        let trials = vec![vec![0.0; 1500]; 3];
        let powers = p.analyze_window(&trials, &TIME_WINDOWS[0]);
        let names: Vec<&str> = powers.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(names, vec!["223Hz", "167Hz", "111Hz"]);
    }
}
