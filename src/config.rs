use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_dir")]
    pub dir: PathBuf,
    #[serde(default = "OutputConfig::default_width")]
    pub width: u32,
    #[serde(default = "OutputConfig::default_height")]
    pub height: u32,
}

impl OutputConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from("out")
    }
    fn default_width() -> u32 {
        1400
    }
    fn default_height() -> u32 {
        1000
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RngConfig {
    /// Absent means a fresh OS-seeded generator per run.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "DetectorConfig::default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default = "DetectorConfig::default_fundamental_hz")]
    pub fundamental_hz: f64,
    #[serde(default = "DetectorConfig::default_max_divisor")]
    pub max_divisor: u32,
    #[serde(default = "DetectorConfig::default_window_seconds")]
    pub window_seconds: f64,
    #[serde(default = "DetectorConfig::default_band_half_width_hz")]
    pub band_half_width_hz: f64,
    #[serde(default = "DetectorConfig::default_noise_flank_hz")]
    pub noise_flank_hz: f64,
    #[serde(default = "DetectorConfig::default_snr_threshold")]
    pub snr_threshold: f64,
}

impl DetectorConfig {
    fn default_sample_rate() -> f64 {
        1000.0
    }
    fn default_fundamental_hz() -> f64 {
        668.0
    }
    fn default_max_divisor() -> u32 {
        9
    }
    fn default_window_seconds() -> f64 {
        2.0
    }
    fn default_band_half_width_hz() -> f64 {
        2.0
    }
    fn default_noise_flank_hz() -> f64 {
        10.0
    }
    fn default_snr_threshold() -> f64 {
        3.0
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::default_sample_rate(),
            fundamental_hz: Self::default_fundamental_hz(),
            max_divisor: Self::default_max_divisor(),
            window_seconds: Self::default_window_seconds(),
            band_half_width_hz: Self::default_band_half_width_hz(),
            noise_flank_hz: Self::default_noise_flank_hz(),
            snr_threshold: Self::default_snr_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToneConfig {
    #[serde(default = "ToneConfig::default_frequency_hz")]
    pub frequency_hz: f64,
    #[serde(default = "ToneConfig::default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "ToneConfig::default_amplitude")]
    pub amplitude: f64,
    #[serde(default = "ToneConfig::default_beat_hz")]
    pub beat_hz: f64,
    #[serde(default = "ToneConfig::default_session_seconds")]
    pub session_seconds: f64,
    #[serde(default = "ToneConfig::default_test_seconds")]
    pub test_seconds: f64,
}

impl ToneConfig {
    fn default_frequency_hz() -> f64 {
        668.0
    }
    fn default_sample_rate() -> u32 {
        44_100
    }
    fn default_amplitude() -> f64 {
        0.3
    }
    fn default_beat_hz() -> f64 {
        10.0
    }
    fn default_session_seconds() -> f64 {
        300.0
    }
    fn default_test_seconds() -> f64 {
        30.0
    }
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency_hz: Self::default_frequency_hz(),
            sample_rate: Self::default_sample_rate(),
            amplitude: Self::default_amplitude(),
            beat_hz: Self::default_beat_hz(),
            session_seconds: Self::default_session_seconds(),
            test_seconds: Self::default_test_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MegConfig {
    #[serde(default = "MegConfig::default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default = "MegConfig::default_n_channels")]
    pub n_channels: usize,
    #[serde(default = "MegConfig::default_duration_seconds")]
    pub duration_seconds: f64,
    #[serde(default = "MegConfig::default_segment_seconds")]
    pub segment_seconds: f64,
    #[serde(default = "MegConfig::default_highpass_hz")]
    pub highpass_hz: f64,
    #[serde(default = "MegConfig::default_lowpass_hz")]
    pub lowpass_hz: f64,
    #[serde(default = "MegConfig::default_notch_hz")]
    pub notch_hz: Vec<f64>,
}

impl MegConfig {
    fn default_sample_rate() -> f64 {
        1000.0
    }
    fn default_n_channels() -> usize {
        306
    }
    fn default_duration_seconds() -> f64 {
        300.0
    }
    fn default_segment_seconds() -> f64 {
        10.0
    }
    fn default_highpass_hz() -> f64 {
        1.0
    }
    fn default_lowpass_hz() -> f64 {
        200.0
    }
    fn default_notch_hz() -> Vec<f64> {
        vec![50.0, 100.0, 150.0]
    }
}

impl Default for MegConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::default_sample_rate(),
            n_channels: Self::default_n_channels(),
            duration_seconds: Self::default_duration_seconds(),
            segment_seconds: Self::default_segment_seconds(),
            highpass_hz: Self::default_highpass_hz(),
            lowpass_hz: Self::default_lowpass_hz(),
            notch_hz: Self::default_notch_hz(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub rng: RngConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub tone: ToneConfig,
    #[serde(default)]
    pub meg: MegConfig,
}

impl AppConfig {
    fn round_f64(x: f64) -> f64 {
        (x * 1_000_000.0).round() / 1_000_000.0
    }

    fn format_f64_compact(x: f64) -> String {
        let mut s = format!("{:.6}", x);
        while s.contains('.') && s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        if s.is_empty() { "0".to_string() } else { s }
    }

    fn rounded(mut self) -> Self {
        let d = &mut self.detector;
        d.sample_rate = Self::round_f64(d.sample_rate);
        d.fundamental_hz = Self::round_f64(d.fundamental_hz);
        d.window_seconds = Self::round_f64(d.window_seconds);
        d.band_half_width_hz = Self::round_f64(d.band_half_width_hz);
        d.noise_flank_hz = Self::round_f64(d.noise_flank_hz);
        d.snr_threshold = Self::round_f64(d.snr_threshold);
        let t = &mut self.tone;
        t.frequency_hz = Self::round_f64(t.frequency_hz);
        t.amplitude = Self::round_f64(t.amplitude);
        t.beat_hz = Self::round_f64(t.beat_hz);
        t.session_seconds = Self::round_f64(t.session_seconds);
        t.test_seconds = Self::round_f64(t.test_seconds);
        let m = &mut self.meg;
        m.sample_rate = Self::round_f64(m.sample_rate);
        m.duration_seconds = Self::round_f64(m.duration_seconds);
        m.segment_seconds = Self::round_f64(m.segment_seconds);
        m.highpass_hz = Self::round_f64(m.highpass_hz);
        m.lowpass_hz = Self::round_f64(m.lowpass_hz);
        self
    }

    /// Commented-out rendering of `self`: section headers stay active, every
    /// key line is prefixed with `# `.
    fn commented_toml(&self) -> Option<String> {
        let text = toml::to_string_pretty(self).ok()?;
        let mut commented = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                commented.push('\n');
            } else if trimmed.starts_with('[') && trimmed.ends_with(']') && !line.contains('=') {
                commented.push_str(line);
                commented.push('\n');
            } else {
                let mut out_line = line.to_string();
                if let Some((lhs, rhs)) = line.split_once('=') {
                    let rhs_trim = rhs.trim();
                    let has_decimal = rhs_trim.contains('.');
                    if (has_decimal || rhs_trim.contains('e') || rhs_trim.contains('E'))
                        && !rhs_trim.contains('"')
                        && rhs_trim != "true"
                        && rhs_trim != "false"
                    {
                        if let Ok(val) = rhs_trim.parse::<f64>() {
                            let mut formatted = Self::format_f64_compact(val);
                            if has_decimal && !formatted.contains('.') {
                                formatted.push_str(".0");
                            }
                            out_line = format!("{} = {}", lhs.trim(), formatted);
                        }
                    }
                }
                commented.push_str("# ");
                commented.push_str(&out_line);
                commented.push('\n');
            }
        }
        Some(commented)
    }

    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            match fs::read_to_string(path_obj) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(err) => {
                        warn!("Failed to parse config {path}: {err}. Using defaults.");
                    }
                },
                Err(err) => {
                    warn!("Failed to read config {path}: {err}. Using defaults.");
                }
            }
            return Self::default();
        }

        // File does not exist: write defaults and return them.
        let default_cfg = Self::default().rounded();
        match default_cfg.commented_toml() {
            Some(commented) => {
                if let Err(err) = fs::write(path_obj, commented) {
                    warn!("Failed to write default config to {path}: {err}");
                } else {
                    info!("Wrote default config to {path}");
                }
            }
            None => warn!("Failed to serialize default config; continuing with defaults"),
        }
        default_cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn unique_path(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "harmonic668_config_test_{}_{}",
            name,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        p
    }

    #[test]
    fn load_or_default_writes_defaults_cleanly() {
        let path = unique_path("defaults.toml");
        let path_str = path.to_string_lossy().to_string();
        let _ = fs::remove_file(&path);

        let cfg = AppConfig::load_or_default(&path_str);
        assert!(path.exists(), "config file should be created");
        assert_eq!(cfg.output.dir, PathBuf::from("out"));
        assert_eq!(cfg.rng.seed, None);
        assert_eq!(cfg.detector.fundamental_hz, 668.0);
        assert_eq!(cfg.detector.max_divisor, 9);
        assert_eq!(cfg.tone.sample_rate, 44_100);
        assert_eq!(cfg.meg.n_channels, 306);
        assert_eq!(cfg.meg.notch_hz, vec![50.0, 100.0, 150.0]);

        let contents = fs::read_to_string(&path).expect("read written config");
        assert!(contents.contains("[detector]"), "section headers stay active");
        assert!(
            contents.contains("# snr_threshold = 3.0"),
            "should write commented snr_threshold"
        );
        assert!(
            contents.contains("# amplitude = 0.3"),
            "should write commented amplitude"
        );
        assert!(
            contents.contains("# dir = \"out\""),
            "should write commented output dir"
        );
        assert!(!contents.contains("seed"), "absent seed is not written");

        // The commented file parses back to the defaults.
        let reread = AppConfig::load_or_default(&path_str);
        assert_eq!(reread.detector.snr_threshold, 3.0);
        assert_eq!(reread.meg.lowpass_hz, 200.0);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_or_default_reads_existing() {
        let path = unique_path("custom.toml");
        let path_str = path.to_string_lossy().to_string();
        fs::write(
            &path,
            "[rng]\nseed = 42\n\n[detector]\nsample_rate = 2000.0\nsnr_threshold = 5.0\n\n[meg]\nlowpass_hz = 400.0\n",
        )
        .unwrap();

        let cfg = AppConfig::load_or_default(&path_str);
        assert_eq!(cfg.rng.seed, Some(42));
        assert_eq!(cfg.detector.sample_rate, 2000.0);
        assert_eq!(cfg.detector.snr_threshold, 5.0);
        assert_eq!(cfg.detector.window_seconds, 2.0);
        assert_eq!(cfg.meg.lowpass_hz, 400.0);
        assert_eq!(cfg.tone.beat_hz, 10.0);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let path = unique_path("broken.toml");
        let path_str = path.to_string_lossy().to_string();
        fs::write(&path, "[detector\nsample_rate = ").unwrap();

        let cfg = AppConfig::load_or_default(&path_str);
        assert_eq!(cfg.detector.sample_rate, 1000.0);
        // A broken file is left untouched.
        assert_eq!(fs::read_to_string(&path).unwrap(), "[detector\nsample_rate = ");

        let _ = fs::remove_file(&path);
    }
}
