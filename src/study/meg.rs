//! study/meg.rs: Resting-state MEG simulation with intermittent sub-harmonic
//! bursts, followed by segment-wise harmonic power analysis.
//!
//! Channels are generated, filtered and analysed one at a time; only the
//! plotted excerpts and running sums survive between channels.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::MegConfig;
use crate::core::fft::{
    Psd, WelchParams, WindowKind, band_filter, hann_window_symmetric, tukey_window, welch,
};
use crate::core::noise::pink_noise;
use crate::core::stats::{max, mean};
use crate::core::util::{add_sine, time_axis};
use crate::error::StudyError;

/// Harmonics embedded during conscious periods: label, frequency, relative
/// amplitude.
pub const MEG_HARMONICS: [(&str, f64, f64); 3] = [
    ("334Hz", 334.0, 0.01),
    ("167Hz", 167.0, 0.008),
    ("111Hz", 111.0, 0.005),
];

const MAG_SCALE: f64 = 1e-12;
const GRAD_SCALE: f64 = 1e-13;
const NOTCH_WIDTH_HZ: f64 = 1.0;
const SEGMENT_NPERSEG: usize = 2048;
const SEGMENT_NOVERLAP: usize = 1024;
const OVERVIEW_NPERSEG: usize = 4096;
const BLINK_LEN: usize = 100;
const HARMONIC_HALF_BAND_HZ: f64 = 2.0;
/// Channels shown in the raw-data excerpt.
pub const EXCERPT_CHANNELS: [usize; 3] = [0, 10, 20];
const EXCERPT_SECONDS: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Magnetometer,
    Gradiometer,
}

#[derive(Clone, Debug, Serialize)]
pub struct Sensor {
    pub name: String,
    pub kind: SensorKind,
}

impl Sensor {
    pub fn scale(&self) -> f64 {
        match self.kind {
            SensorKind::Magnetometer => MAG_SCALE,
            SensorKind::Gradiometer => GRAD_SCALE,
        }
    }
}

/// Sensor layout: every third channel (starting at 0) is a magnetometer.
pub fn sensor_layout(n_channels: usize) -> Vec<Sensor> {
    (0..n_channels)
        .map(|i| Sensor {
            name: format!("MEG{:04}", i + 1),
            kind: if i % 3 == 0 {
                SensorKind::Magnetometer
            } else {
                SensorKind::Gradiometer
            },
        })
        .collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct HarmonicStats {
    pub name: String,
    pub freq: f64,
    pub mean_power: f64,
    pub max_power: f64,
    /// Percentage of segments above twice the mean.
    pub detection_rate: f64,
    pub segment_powers: Vec<f64>,
}

impl HarmonicStats {
    fn from_powers(name: &str, freq: f64, powers: Vec<f64>) -> Self {
        let mean_power = mean(&powers);
        let max_power = max(&powers);
        let above = powers.iter().filter(|&&p| p > 2.0 * mean_power).count();
        let detection_rate = if powers.is_empty() {
            0.0
        } else {
            above as f64 / powers.len() as f64 * 100.0
        };
        Self {
            name: name.to_string(),
            freq,
            mean_power,
            max_power,
            detection_rate,
            segment_powers: powers,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MegSummary {
    pub n_channels: usize,
    pub magnetometers: usize,
    pub gradiometers: usize,
    pub sample_rate: f64,
    pub duration_seconds: f64,
    pub segment_seconds: f64,
    pub n_segments: usize,
    pub passband_hz: [f64; 2],
    pub notch_hz: Vec<f64>,
    pub harmonics: Vec<HarmonicStats>,
}

/// Filtered excerpt of one channel, in tesla.
#[derive(Clone, Debug)]
pub struct Excerpt {
    pub channel: usize,
    pub samples: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct MegAnalysis {
    pub summary: MegSummary,
    pub excerpt_times: Vec<f64>,
    pub excerpts: Vec<Excerpt>,
    /// Channel-mean PSD of the filtered recording.
    pub mean_psd: Psd,
}

pub struct MegSimulator {
    cfg: MegConfig,
    sensors: Vec<Sensor>,
}

impl MegSimulator {
    pub fn new(cfg: &MegConfig) -> Result<Self, StudyError> {
        if !(cfg.sample_rate > 0.0) {
            return Err(StudyError::invalid("sample_rate", "must be positive"));
        }
        if cfg.n_channels == 0 {
            return Err(StudyError::invalid("n_channels", "must be non-zero"));
        }
        if !(cfg.segment_seconds > 0.0) {
            return Err(StudyError::invalid("segment_seconds", "must be positive"));
        }
        if !(cfg.highpass_hz < cfg.lowpass_hz) {
            return Err(StudyError::invalid(
                "lowpass_hz",
                format!(
                    "passband [{}, {}] is empty",
                    cfg.highpass_hz, cfg.lowpass_hz
                ),
            ));
        }
        let sensors = sensor_layout(cfg.n_channels);
        info!(
            channels = cfg.n_channels,
            mags = sensors.iter().filter(|s| s.kind == SensorKind::Magnetometer).count(),
            fs = cfg.sample_rate,
            "MEG simulator ready"
        );
        Ok(Self {
            cfg: cfg.clone(),
            sensors,
        })
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn n_samples(&self) -> usize {
        (self.cfg.duration_seconds.max(0.0) * self.cfg.sample_rate) as usize
    }

    /// Number of whole segments up to the last sample time.
    pub fn n_segments(&self) -> usize {
        let n = self.n_samples();
        if n == 0 {
            return 0;
        }
        let last_time = (n - 1) as f64 / self.cfg.sample_rate;
        (last_time / self.cfg.segment_seconds).floor() as usize
    }

    /// Gate for the harmonic bursts: rests of 5–10 s alternate with active
    /// stretches of 1–3 s shaped by a Tukey(0.3) envelope.
    pub fn conscious_periods<R: Rng + ?Sized>(&self, n_samples: usize, rng: &mut R) -> Vec<f64> {
        let fs = self.cfg.sample_rate;
        let mut gate = vec![0.0; n_samples];
        let mut pos = 0usize;
        while pos < n_samples {
            pos += (rng.random_range(5.0..10.0) * fs) as usize;
            if pos < n_samples {
                let active = (rng.random_range(1.0..3.0) * fs) as usize;
                let end = (pos + active).min(n_samples);
                let env = tukey_window(end - pos, 0.3);
                gate[pos..end].copy_from_slice(&env);
                pos = end;
            }
        }
        gate
    }

    /// Raw (unfiltered) signal of channel `idx`, in tesla.
    pub fn simulate_channel<R: Rng + ?Sized>(&self, idx: usize, rng: &mut R) -> Vec<f64> {
        let n = self.n_samples();
        let n_ch = self.cfg.n_channels as f64;
        let scale = self
            .sensors
            .get(idx)
            .map(Sensor::scale)
            .unwrap_or(GRAD_SCALE);
        let t = time_axis(n, self.cfg.sample_rate);

        let mut x: Vec<f64> = pink_noise(n, rng).into_iter().map(|v| v * scale).collect();

        // Occipital alpha.
        if idx as f64 > n_ch * 0.7 {
            let f = rng.random_range(9.0..11.0);
            let a: f64 = rng.random_range(0.3..0.5);
            add_sine(&mut x, &t, f, a * scale);
        }
        // Central beta.
        let rel = idx as f64 / n_ch;
        if rel > 0.3 && rel < 0.5 {
            let f = rng.random_range(18.0..22.0);
            let a: f64 = rng.random_range(0.1..0.2);
            add_sine(&mut x, &t, f, a * scale);
        }
        let f = rng.random_range(40.0..60.0);
        let a: f64 = rng.random_range(0.02..0.05);
        add_sine(&mut x, &t, f, a * scale);

        let gate = self.conscious_periods(n, rng);
        for (_, freq, amp) in MEG_HARMONICS {
            let w = 2.0 * std::f64::consts::PI * freq;
            for ((xi, &ti), &g) in x.iter_mut().zip(&t).zip(&gate) {
                *xi += amp * scale * (w * ti).sin() * g;
            }
        }

        // Frontal blinks.
        if idx < 10 && rng.random::<f64>() < 0.1 && n > 0 {
            let n_blinks = (self.cfg.duration_seconds / 5.0) as usize;
            let bump = hann_window_symmetric(BLINK_LEN);
            debug!(channel = idx, n_blinks, "adding blink artifacts");
            for _ in 0..n_blinks {
                let start = rng.random_range(0..n);
                if start + BLINK_LEN < n {
                    for (xi, &b) in x[start..start + BLINK_LEN].iter_mut().zip(&bump) {
                        *xi += b * scale * 100.0;
                    }
                }
            }
        }
        x
    }

    /// Band-pass plus power-line notches.
    pub fn preprocess(&self, x: &[f64]) -> Vec<f64> {
        band_filter(
            x,
            self.cfg.sample_rate,
            self.cfg.highpass_hz,
            self.cfg.lowpass_hz,
            &self.cfg.notch_hz,
            NOTCH_WIDTH_HZ,
        )
    }

    /// Per segment, the max PSD within ±2 Hz of each harmonic. Segments are
    /// cropped inclusively, so each spans one extra sample when available.
    pub fn segment_harmonic_power(&self, x: &[f64]) -> Result<Vec<[f64; 3]>, StudyError> {
        let fs = self.cfg.sample_rate;
        let params = WelchParams {
            nperseg: SEGMENT_NPERSEG,
            noverlap: Some(SEGMENT_NOVERLAP),
            window: WindowKind::Hamming,
        };
        let seg_len = (self.cfg.segment_seconds * fs).round() as usize;
        let mut out = Vec::with_capacity(self.n_segments());
        for s in 0..self.n_segments() {
            let start = s * seg_len;
            let end = (start + seg_len + 1).min(x.len());
            let seg = &x[start..end];
            // Short segments get an overlap that fits.
            let mut p = params.clone();
            if seg.len() <= SEGMENT_NOVERLAP {
                p.noverlap = None;
            }
            let psd = welch(seg, fs, &p)?;
            let mut row = [0.0; 3];
            for (slot, (_, freq, _)) in row.iter_mut().zip(MEG_HARMONICS) {
                *slot = psd
                    .band_max(freq - HARMONIC_HALF_BAND_HZ, freq + HARMONIC_HALF_BAND_HZ)
                    .unwrap_or(0.0);
            }
            out.push(row);
        }
        Ok(out)
    }

    pub fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<MegAnalysis, StudyError> {
        let n_segments = self.n_segments();
        if n_segments == 0 {
            return Err(StudyError::invalid(
                "duration_seconds",
                format!(
                    "{} s holds no full {} s segment",
                    self.cfg.duration_seconds, self.cfg.segment_seconds
                ),
            ));
        }
        let fs = self.cfg.sample_rate;
        let n_ch = self.cfg.n_channels;
        let excerpt_len = ((EXCERPT_SECONDS * fs) as usize + 1).min(self.n_samples());
        let overview = WelchParams {
            nperseg: OVERVIEW_NPERSEG,
            noverlap: Some(0),
            window: WindowKind::Hamming,
        };

        let mut seg_sums = vec![[0.0f64; 3]; n_segments];
        let mut psd_sum: Option<Psd> = None;
        let mut excerpts = Vec::new();

        info!(duration = self.cfg.duration_seconds, "generating resting-state MEG");
        for idx in 0..n_ch {
            let raw = self.simulate_channel(idx, rng);
            let filtered = self.preprocess(&raw);

            for (acc, row) in seg_sums.iter_mut().zip(self.segment_harmonic_power(&filtered)?) {
                for (a, v) in acc.iter_mut().zip(row) {
                    *a += v;
                }
            }

            let psd = welch(&filtered, fs, &overview)?;
            match psd_sum.as_mut() {
                Some(sum) => {
                    for (a, v) in sum.power.iter_mut().zip(&psd.power) {
                        *a += v;
                    }
                }
                None => psd_sum = Some(psd),
            }

            if EXCERPT_CHANNELS.contains(&idx) {
                excerpts.push(Excerpt {
                    channel: idx,
                    samples: filtered[..excerpt_len].to_vec(),
                });
            }
            if (idx + 1) % 50 == 0 || idx + 1 == n_ch {
                info!("channel {}/{}", idx + 1, n_ch);
            }
        }

        let mut mean_psd = psd_sum.unwrap_or_default();
        for p in mean_psd.power.iter_mut() {
            *p /= n_ch as f64;
        }

        let harmonics = MEG_HARMONICS
            .iter()
            .enumerate()
            .map(|(k, (name, freq, _))| {
                let powers = seg_sums.iter().map(|row| row[k] / n_ch as f64).collect();
                HarmonicStats::from_powers(name, *freq, powers)
            })
            .collect();

        let mags = self
            .sensors
            .iter()
            .filter(|s| s.kind == SensorKind::Magnetometer)
            .count();
        let summary = MegSummary {
            n_channels: n_ch,
            magnetometers: mags,
            gradiometers: n_ch - mags,
            sample_rate: fs,
            duration_seconds: self.cfg.duration_seconds,
            segment_seconds: self.cfg.segment_seconds,
            n_segments,
            passband_hz: [self.cfg.highpass_hz, self.cfg.lowpass_hz],
            notch_hz: self.cfg.notch_hz.clone(),
            harmonics,
        };
        info!(n_segments, "MEG analysis complete");

        Ok(MegAnalysis {
            summary,
            excerpt_times: time_axis(excerpt_len, fs),
            excerpts,
            mean_psd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stats::std_dev;
    use rand::{SeedableRng, rngs::StdRng};

    fn small_cfg() -> MegConfig {
        MegConfig {
            n_channels: 12,
            duration_seconds: 25.0,
            ..MegConfig::default()
        }
    }

    #[test]
    fn layout_matches_vectorview_counts() {
        let sensors = sensor_layout(306);
        let mags = sensors
            .iter()
            .filter(|s| s.kind == SensorKind::Magnetometer)
            .count();
        assert_eq!(mags, 102);
        assert_eq!(sensors[0].name, "MEG0001");
        assert_eq!(sensors[305].name, "MEG0306");
        assert_eq!(sensors[0].scale(), 1e-12);
        assert_eq!(sensors[1].scale(), 1e-13);
    }

    #[test]
    fn segment_count_uses_last_sample_time() {
        let sim = MegSimulator::new(&MegConfig::default()).unwrap();
        assert_eq!(sim.n_segments(), 29);
        let sim = MegSimulator::new(&small_cfg()).unwrap();
        assert_eq!(sim.n_segments(), 2);
    }

    #[test]
    fn conscious_periods_start_at_rest_and_stay_in_unit_range() {
        let sim = MegSimulator::new(&small_cfg()).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let gate = sim.conscious_periods(60_000, &mut rng);
        assert!(gate[..5_000].iter().all(|&g| g == 0.0));
        assert!(gate.iter().all(|&g| (0.0..=1.0).contains(&g)));
        assert!(gate.iter().any(|&g| g > 0.9));
    }

    #[test]
    fn channel_scale_follows_sensor_kind() {
        let sim = MegSimulator::new(&small_cfg()).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let mag = sim.simulate_channel(3, &mut rng);
        let grad = sim.simulate_channel(4, &mut rng);
        assert_eq!(mag.len(), 25_000);
        assert!(std_dev(&mag) > 5.0 * std_dev(&grad));
    }

    #[test]
    fn default_lowpass_removes_334hz() {
        let sim = MegSimulator::new(&small_cfg()).unwrap();
        let t = time_axis(10_000, 1000.0);
        let x = crate::core::util::sine(&t, 334.0, 1.0);
        let y = sim.preprocess(&x);
        assert!(std_dev(&y) < 1e-6);
    }

    #[test]
    fn run_produces_per_segment_statistics() {
        let sim = MegSimulator::new(&small_cfg()).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let res = sim.run(&mut rng).unwrap();
        assert_eq!(res.summary.n_segments, 2);
        assert_eq!(res.summary.harmonics.len(), 3);
        for h in &res.summary.harmonics {
            assert_eq!(h.segment_powers.len(), 2);
            assert!(h.mean_power >= 0.0);
            assert!((0.0..=100.0).contains(&h.detection_rate));
        }
        assert_eq!(res.excerpts.len(), 2);
        assert_eq!(res.excerpt_times.len(), 10_001);
        assert!(!res.mean_psd.power.is_empty());
    }

    #[test]
    fn rejects_short_recordings() {
        let cfg = MegConfig {
            duration_seconds: 5.0,
            ..small_cfg()
        };
        let sim = MegSimulator::new(&cfg).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sim.run(&mut rng).is_err());
    }
}
