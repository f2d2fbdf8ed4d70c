//! study/harmonics.rs: Indirect detection of a fundamental through its
//! sub-harmonics `f/n` that survive below Nyquist.
//!
//! A fundamental of 668 Hz cannot be observed at a 1 kHz sampling rate, but
//! 334 Hz (n = 2), 167 Hz (n = 4) and 111.3 Hz (n = 6) can. Detection is a
//! Welch PSD followed by a peak/noise-floor SNR test per harmonic.

use std::ops::Range;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::core::fft::{Psd, WelchParams, welch};
use crate::core::noise::pink_noise;
use crate::core::stats::median;
use crate::error::StudyError;

/// Divisors injected by [`HarmonicDetector::generate_test_signal`] by default.
pub const DEFAULT_TEST_DIVISORS: [u32; 3] = [2, 4, 6];

/// Weight of the unit pink noise added to the noisy test signal.
const TEST_NOISE_LEVEL: f64 = 0.5;
/// Scale of the baseline-only channels in the channel simulation.
const BASELINE_NOISE_LEVEL: f64 = 0.3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Harmonic {
    pub n: u32,
    pub freq: f64,
    pub name: String,
}

/// The sub-harmonic ladder `f/n`, `n = 1..=max_divisor`, restricted to
/// frequencies below Nyquist.
#[derive(Clone, Debug)]
pub struct HarmonicSeries {
    pub fundamental: f64,
    pub sample_rate: f64,
    pub harmonics: Vec<Harmonic>,
}

impl HarmonicSeries {
    pub fn new(fundamental: f64, sample_rate: f64, max_divisor: u32) -> Result<Self, StudyError> {
        if !(fundamental > 0.0) {
            return Err(StudyError::invalid("fundamental_hz", "must be positive"));
        }
        if !(sample_rate > 0.0) {
            return Err(StudyError::invalid("sample_rate", "must be positive"));
        }
        let nyquist = sample_rate / 2.0;
        let f_label = format_hz_label(fundamental);
        let harmonics = (1..=max_divisor)
            .filter_map(|n| {
                let freq = fundamental / n as f64;
                (freq < nyquist).then(|| Harmonic {
                    n,
                    freq,
                    name: format!("{f_label}/{n} = {freq:.1}Hz"),
                })
            })
            .collect();
        Ok(Self {
            fundamental,
            sample_rate,
            harmonics,
        })
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    pub fn get(&self, n: u32) -> Option<&Harmonic> {
        self.harmonics.iter().find(|h| h.n == n)
    }
}

fn format_hz_label(f: f64) -> String {
    if f.fract() == 0.0 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

#[derive(Clone, Debug)]
pub struct TestSignal {
    pub t: Vec<f64>,
    pub clean: Vec<f64>,
    pub noisy: Vec<f64>,
}

/// One detected harmonic.
#[derive(Clone, Debug, Serialize)]
pub struct HarmonicHit {
    pub n: u32,
    pub freq: f64,
    pub name: String,
    pub peak_power: f64,
    pub snr: f64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Detection {
    pub detected: Vec<HarmonicHit>,
    pub activity_score: f64,
    #[serde(skip)]
    pub psd: Psd,
}

impl Detection {
    pub fn detected_names(&self) -> Vec<&str> {
        self.detected.iter().map(|h| h.name.as_str()).collect()
    }

    pub fn is_detected(&self, n: u32) -> bool {
        self.detected.iter().any(|h| h.n == n)
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ChannelScore {
    pub channel: usize,
    pub score: f64,
    pub detected: usize,
}

/// Row-major multichannel recording.
#[derive(Clone, Debug)]
pub struct ChannelData {
    pub channels: Vec<Vec<f64>>,
}

impl ChannelData {
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }
}

/// Channels carrying sub-harmonic activity in the default simulation
/// (frontal and parietal rows of a 10 × 10 layout).
pub fn default_active_channels() -> Vec<usize> {
    (10..30).chain(60..80).collect()
}

pub struct HarmonicDetector {
    pub series: HarmonicSeries,
    cfg: DetectorConfig,
}

impl HarmonicDetector {
    pub fn new(cfg: &DetectorConfig) -> Result<Self, StudyError> {
        if !(cfg.window_seconds > 0.0) {
            return Err(StudyError::invalid("window_seconds", "must be positive"));
        }
        let series = HarmonicSeries::new(cfg.fundamental_hz, cfg.sample_rate, cfg.max_divisor)?;
        info!(
            fs = cfg.sample_rate,
            nyquist = series.nyquist(),
            harmonics = series.harmonics.len(),
            "harmonic detector ready"
        );
        Ok(Self {
            series,
            cfg: cfg.clone(),
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.cfg.sample_rate
    }

    pub fn snr_threshold(&self) -> f64 {
        self.cfg.snr_threshold
    }

    /// Sum of `(1/n) sin(2π f_n t)` over the included divisors, plus a copy
    /// with half-unit pink noise added. Divisors not in the series are
    /// ignored.
    pub fn generate_test_signal<R: Rng + ?Sized>(
        &self,
        duration: f64,
        include: &[u32],
        rng: &mut R,
    ) -> TestSignal {
        let fs = self.cfg.sample_rate;
        let n = (duration.max(0.0) * fs).ceil() as usize;
        let t: Vec<f64> = (0..n).map(|i| i as f64 / fs).collect();
        let mut clean = vec![0.0; n];
        for h in self.series.harmonics.iter().filter(|h| include.contains(&h.n)) {
            let amp = 1.0 / h.n as f64;
            debug!(name = %h.name, amp, "adding harmonic");
            crate::core::util::add_sine(&mut clean, &t, h.freq, amp);
        }
        let noise = pink_noise(n, rng);
        let noisy = clean
            .iter()
            .zip(&noise)
            .map(|(c, z)| c + TEST_NOISE_LEVEL * z)
            .collect();
        TestSignal { t, clean, noisy }
    }

    /// Flanking PSD bins for the noise floor. A guard gap of one band
    /// half-width separates them from the detection band.
    fn noise_bins(&self, psd: &Psd, f: f64) -> Vec<f64> {
        let band = self.cfg.band_half_width_hz;
        let (lo, hi) = (f - band, f + band);
        let flank = self.cfg.noise_flank_hz;
        psd.freqs
            .iter()
            .zip(&psd.power)
            .filter(|&(&fr, _)| {
                (fr >= lo - flank && fr < lo - band) || (fr > hi + band && fr <= hi + flank)
            })
            .map(|(_, &p)| p)
            .collect()
    }

    pub fn detect(&self, signal: &[f64]) -> Result<Detection, StudyError> {
        let nperseg = (self.cfg.window_seconds * self.cfg.sample_rate) as usize;
        let psd = welch(signal, self.cfg.sample_rate, &WelchParams::hann(nperseg))?;
        let whole_median = median(&psd.power);

        let mut detected = Vec::new();
        for h in &self.series.harmonics {
            let half = self.cfg.band_half_width_hz;
            let Some(peak) = psd.band_max(h.freq - half, h.freq + half) else {
                continue;
            };
            let flanks = self.noise_bins(&psd, h.freq);
            let noise = if flanks.is_empty() {
                whole_median
            } else {
                median(&flanks)
            };
            let snr = if noise > 0.0 { peak / noise } else { 0.0 };
            if snr > self.cfg.snr_threshold {
                detected.push(HarmonicHit {
                    n: h.n,
                    freq: h.freq,
                    name: h.name.clone(),
                    peak_power: peak,
                    snr,
                });
            }
        }

        let activity_score = activity_score(&detected);
        Ok(Detection {
            detected,
            activity_score,
            psd,
        })
    }

    /// Channels listed in `active` carry the noisy test signal scaled by a
    /// uniform gain in [0.5, 1.5); all others carry baseline pink noise.
    pub fn simulate_channels<R: Rng + ?Sized>(
        &self,
        n_channels: usize,
        duration: f64,
        active: &[usize],
        rng: &mut R,
    ) -> ChannelData {
        let n_samples = (duration.max(0.0) * self.cfg.sample_rate) as usize;
        info!(
            n_channels,
            duration,
            active = active.iter().filter(|&&c| c < n_channels).count(),
            "simulating channels"
        );
        let channels = (0..n_channels)
            .map(|ch| {
                if active.contains(&ch) {
                    let sig = self.generate_test_signal(duration, &DEFAULT_TEST_DIVISORS, rng);
                    let gain: f64 = rng.random_range(0.5..1.5);
                    sig.noisy.into_iter().take(n_samples).map(|v| v * gain).collect()
                } else {
                    pink_noise(n_samples, rng)
                        .into_iter()
                        .map(|v| v * BASELINE_NOISE_LEVEL)
                        .collect()
                }
            })
            .collect();
        ChannelData { channels }
    }

    pub fn analyze_channels(&self, data: &ChannelData) -> Result<Vec<ChannelScore>, StudyError> {
        let mut scores = Vec::with_capacity(data.n_channels());
        for (channel, x) in data.channels.iter().enumerate() {
            let det = self.detect(x)?;
            if det.activity_score > 5.0 {
                info!(
                    "Ch{channel:03}: activity score = {:.2} *",
                    det.activity_score
                );
            }
            scores.push(ChannelScore {
                channel,
                score: det.activity_score,
                detected: det.detected.len(),
            });
        }
        Ok(scores)
    }
}

/// Mean SNR of the detected harmonics weighted by `1/n`; zero if none.
pub fn activity_score(hits: &[HarmonicHit]) -> f64 {
    let (weighted, weights) = hits.iter().fold((0.0, 0.0), |(ws, w), h| {
        let weight = 1.0 / h.n as f64;
        (ws + h.snr * weight, w + weight)
    });
    if weights > 0.0 { weighted / weights } else { 0.0 }
}

/// Channels with a score above `threshold`.
pub fn high_activity(scores: &[ChannelScore], threshold: f64) -> Vec<ChannelScore> {
    scores.iter().copied().filter(|s| s.score > threshold).collect()
}

/// Rows `rows` of a `width`-wide grid, as a channel index range.
pub fn grid_rows(rows: Range<usize>, width: usize) -> Range<usize> {
    rows.start * width..rows.end * width
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{SeedableRng, rngs::StdRng};

    fn detector() -> HarmonicDetector {
        HarmonicDetector::new(&DetectorConfig::default()).unwrap()
    }

    #[test]
    fn series_below_nyquist_at_1khz() {
        let s = HarmonicSeries::new(668.0, 1000.0, 9).unwrap();
        let ns: Vec<u32> = s.harmonics.iter().map(|h| h.n).collect();
        assert_eq!(ns, vec![2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(s.get(2).unwrap().name, "668/2 = 334.0Hz");
        assert_eq!(s.get(6).unwrap().name, "668/6 = 111.3Hz");
        assert!(s.get(1).is_none());
    }

    #[test]
    fn series_keeps_fundamental_when_fast_enough() {
        let s = HarmonicSeries::new(668.0, 2000.0, 9).unwrap();
        assert_eq!(s.harmonics.len(), 9);
        assert_relative_eq!(s.harmonics[0].freq, 668.0);
    }

    #[test]
    fn noise_flanks_skip_guard_gap() {
        let d = detector();
        let freqs: Vec<f64> = (0..=1000).map(|k| k as f64 * 0.5).collect();
        let psd = Psd {
            power: vec![1.0; freqs.len()],
            freqs,
        };
        // [656, 664) and (672, 680] on a 0.5 Hz grid.
        assert_eq!(d.noise_bins(&psd, 668.0).len(), 32);

        let ramp = Psd {
            power: psd.freqs.clone(),
            freqs: psd.freqs.clone(),
        };
        let bins = d.noise_bins(&ramp, 668.0);
        let (lower, upper): (Vec<f64>, Vec<f64>) = bins.iter().partition(|&&f| f < 668.0);
        assert_relative_eq!(lower[0], 656.0);
        assert_relative_eq!(*lower.last().unwrap(), 663.5);
        assert_relative_eq!(upper[0], 672.5);
        assert_relative_eq!(*upper.last().unwrap(), 680.0);
    }

    #[test]
    fn test_signal_shapes() {
        let d = detector();
        let mut rng = StdRng::seed_from_u64(11);
        let sig = d.generate_test_signal(1.0, &DEFAULT_TEST_DIVISORS, &mut rng);
        assert_eq!(sig.t.len(), 1000);
        assert_eq!(sig.clean.len(), 1000);
        assert_eq!(sig.noisy.len(), 1000);
        // Sum of amplitudes bounds the clean signal.
        let bound = 0.5 + 0.25 + 1.0 / 6.0;
        assert!(sig.clean.iter().all(|v| v.abs() <= bound + 1e-12));
    }

    #[test]
    fn detects_injected_harmonics_in_noise() {
        let d = detector();
        let mut rng = StdRng::seed_from_u64(7);
        let sig = d.generate_test_signal(5.0, &DEFAULT_TEST_DIVISORS, &mut rng);
        let det = d.detect(&sig.noisy).unwrap();
        for n in DEFAULT_TEST_DIVISORS {
            assert!(det.is_detected(n), "harmonic {n} missed: {:?}", det.detected_names());
        }
        assert!(det.activity_score > 3.0);
    }

    #[test]
    fn white_noise_has_no_activity() {
        let d = detector();
        let mut rng = StdRng::seed_from_u64(5);
        let x = crate::core::noise::white_noise(20_000, &mut rng);
        let det = d.detect(&x).unwrap();
        assert!(det.detected.is_empty(), "{:?}", det.detected_names());
        assert_eq!(det.activity_score, 0.0);
    }

    #[test]
    fn activity_score_weights_low_divisors() {
        let hit = |n: u32, snr: f64| HarmonicHit {
            n,
            freq: 668.0 / n as f64,
            name: String::new(),
            peak_power: 1.0,
            snr,
        };
        // (10·1/2 + 4·1/4) / (1/2 + 1/4) = 6 / 0.75 = 8
        assert_relative_eq!(activity_score(&[hit(2, 10.0), hit(4, 4.0)]), 8.0);
        assert_eq!(activity_score(&[]), 0.0);
    }

    #[test]
    fn active_channels_score_higher() {
        let d = detector();
        let mut rng = StdRng::seed_from_u64(3);
        let data = d.simulate_channels(4, 4.0, &[1, 2], &mut rng);
        assert_eq!(data.n_channels(), 4);
        assert!(data.channels.iter().all(|c| c.len() == 4000));
        let scores = d.analyze_channels(&data).unwrap();
        assert!(scores[1].score > 50.0 && scores[2].score > 50.0);
        assert!(scores[0].score < 50.0 && scores[3].score < 50.0);
    }

    #[test]
    fn default_layout() {
        let active = default_active_channels();
        assert_eq!(active.len(), 40);
        assert_eq!(grid_rows(1..3, 10), 10..30);
        assert_eq!(grid_rows(6..8, 10), 60..80);
    }

    #[test]
    fn rejects_empty_signal() {
        assert!(detector().detect(&[]).is_err());
    }
}
