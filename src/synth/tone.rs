use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::audio::writer::{write_wav_mono, write_wav_stereo};
use crate::error::StudyError;

/// Fixed amplitude of each binaural channel.
pub const BINAURAL_AMPLITUDE: f64 = 0.3;

#[derive(Clone, Debug)]
pub struct ToneGenerator {
    pub frequency_hz: f64,
    pub sample_rate: u32,
}

/// Left/right channels of a binaural beat.
#[derive(Clone, Debug)]
pub struct Binaural {
    pub left_hz: f64,
    pub right_hz: f64,
    pub left: Vec<f64>,
    pub right: Vec<f64>,
}

impl ToneGenerator {
    pub fn new(frequency_hz: f64, sample_rate: u32) -> Result<Self, StudyError> {
        if !(frequency_hz > 0.0) {
            return Err(StudyError::invalid("frequency_hz", "must be positive"));
        }
        if sample_rate == 0 {
            return Err(StudyError::invalid("sample_rate", "must be non-zero"));
        }
        Ok(Self {
            frequency_hz,
            sample_rate,
        })
    }

    fn n_samples(&self, seconds: f64) -> usize {
        (self.sample_rate as f64 * seconds.max(0.0)).round() as usize
    }

    fn sine(&self, freq: f64, seconds: f64, amplitude: f64) -> Vec<f64> {
        let fs = self.sample_rate as f64;
        (0..self.n_samples(seconds))
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / fs).sin())
            .collect()
    }

    pub fn pure_tone(&self, seconds: f64, amplitude: f64) -> Vec<f64> {
        info!(freq = self.frequency_hz, seconds, "generating pure tone");
        self.sine(self.frequency_hz, seconds, amplitude)
    }

    /// Two tones `beat_hz` apart, centred on `base_hz`.
    pub fn binaural_beat(&self, base_hz: f64, beat_hz: f64, seconds: f64) -> Binaural {
        let left_hz = base_hz - beat_hz / 2.0;
        let right_hz = base_hz + beat_hz / 2.0;
        info!(left_hz, right_hz, seconds, "generating binaural beat");
        Binaural {
            left_hz,
            right_hz,
            left: self.sine(left_hz, seconds, BINAURAL_AMPLITUDE),
            right: self.sine(right_hz, seconds, BINAURAL_AMPLITUDE),
        }
    }

    /// Writes the session tone, the binaural session and the short test tone
    /// into `dir`. File names carry `stamp`.
    pub fn meditation_set(
        &self,
        dir: &Path,
        stamp: &str,
        plan: &SessionPlan,
    ) -> Result<Vec<PathBuf>, StudyError> {
        std::fs::create_dir_all(dir)?;
        let f = self.frequency_hz.round() as i64;
        let session_min = (plan.session_seconds / 60.0).round() as i64;
        let beat = plan.beat_hz.round() as i64;

        let pure = dir.join(format!("{f}Hz_pure_{session_min}min_{stamp}.wav"));
        write_wav_mono(
            &pure,
            &self.pure_tone(plan.session_seconds, plan.amplitude),
            self.sample_rate,
        )?;

        let binaural = dir.join(format!("{f}Hz_binaural_{beat}Hz_{session_min}min_{stamp}.wav"));
        let beat_pair = self.binaural_beat(self.frequency_hz, plan.beat_hz, plan.session_seconds);
        write_wav_stereo(&binaural, &beat_pair.left, &beat_pair.right, self.sample_rate)?;

        let test = dir.join(format!(
            "{f}Hz_test_{}sec_{stamp}.wav",
            plan.test_seconds.round() as i64
        ));
        write_wav_mono(
            &test,
            &self.pure_tone(plan.test_seconds, plan.amplitude),
            self.sample_rate,
        )?;

        Ok(vec![pure, binaural, test])
    }
}

#[derive(Clone, Debug)]
pub struct SessionPlan {
    pub session_seconds: f64,
    pub test_seconds: f64,
    pub beat_hz: f64,
    pub amplitude: f64,
}

impl Default for SessionPlan {
    fn default() -> Self {
        Self {
            session_seconds: 300.0,
            test_seconds: 30.0,
            beat_hz: 10.0,
            amplitude: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pure_tone_length_and_peak() {
        let g = ToneGenerator::new(668.0, 44_100).unwrap();
        let x = g.pure_tone(0.5, 0.3);
        assert_eq!(x.len(), 22_050);
        let peak = x.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak <= 0.3 + 1e-12);
        assert!(peak > 0.299);
        assert_eq!(x[0], 0.0);
    }

    #[test]
    fn sample_count_rounds_fractional_products() {
        let g = ToneGenerator::new(10.0, 100).unwrap();
        // 100 × 0.29 is 28.999… in binary floating point.
        assert_eq!(g.pure_tone(0.29, 1.0).len(), 29);
        assert_eq!(g.pure_tone(0.004, 1.0).len(), 0);
        assert_eq!(g.pure_tone(0.006, 1.0).len(), 1);
        assert_eq!(g.binaural_beat(10.0, 2.0, 0.29).right.len(), 29);
    }

    #[test]
    fn binaural_channels_straddle_base() {
        let g = ToneGenerator::new(668.0, 8_000).unwrap();
        let b = g.binaural_beat(668.0, 10.0, 0.25);
        assert_relative_eq!(b.left_hz, 663.0);
        assert_relative_eq!(b.right_hz, 673.0);
        assert_eq!(b.left.len(), 2_000);
        assert_eq!(b.left.len(), b.right.len());
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(ToneGenerator::new(0.0, 44_100).is_err());
        assert!(ToneGenerator::new(668.0, 0).is_err());
    }
}
