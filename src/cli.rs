use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Path to config TOML (written with commented defaults if missing)
    #[arg(long, default_value = "config.toml")]
    pub config: String,

    /// Directory for PNG / WAV / JSON output (overrides config)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// RNG seed for reproducible runs (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write pure, binaural and short test tones as WAV
    Tone {
        /// Carrier frequency in Hz (overrides config)
        #[arg(long)]
        frequency: Option<f64>,
        /// Session length in minutes (overrides config)
        #[arg(long)]
        minutes: Option<f64>,
    },
    /// Detect 668/n harmonics in synthetic signals and a simulated array
    Detect {
        /// Test signal length in seconds
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Simulated channel count
        #[arg(long, default_value_t = 100)]
        channels: usize,
    },
    /// Simulate and analyse a multi-channel MEG recording
    Meg {
        /// Recording length in seconds (overrides config)
        #[arg(long)]
        duration: Option<f64>,
        /// Channel count (overrides config)
        #[arg(long)]
        channels: Option<usize>,
    },
    /// HRV parameters, a synthetic RR trace and its spectrum
    Hrv {
        /// Trace length in seconds
        #[arg(long, default_value_t = 60.0)]
        duration: f64,
    },
    /// Binocular rivalry protocol: dominant vs suppressed trials
    Rivalry {
        /// Total trials, split evenly; each group needs two for the t-test
        #[arg(
            long,
            default_value_t = 100,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(4..)
        )]
        trials: usize,
        /// Trial length in seconds
        #[arg(long, default_value_t = 1.5)]
        trial_seconds: f64,
        /// Sampling rate in Hz
        #[arg(long, default_value_t = 1000.0)]
        sample_rate: f64,
    },
    /// Number-theoretic facts about 668 and the emergence figure
    Emergence,
    /// Emergence potential scan around 668
    Tolerance,
    /// Superposition, collapse and decoherence numbers
    Quantum,
    /// Genus-4 coupling equation and its printed proof
    Equation {
        /// Time at which C(t) is evaluated
        #[arg(long, default_value_t = 0.0)]
        time: f64,
    },
    /// Real-valued Morse proof engine and genus boundary table
    Proof {
        #[arg(long, default_value_t = 4)]
        genus: usize,
        #[arg(long, default_value_t = 50)]
        steps: usize,
    },
    /// Complex torus simulator with JSON export
    Torus {
        #[arg(long, default_value_t = 4)]
        genus: usize,
        /// Simulated seconds
        #[arg(long, default_value_t = 10.0)]
        duration: f64,
        /// Step in seconds
        #[arg(long, default_value_t = 0.001)]
        dt: f64,
    },
    /// Coupling-flow critical points, periodicity and insights
    Flow {
        #[arg(long, default_value_t = 4)]
        genus: usize,
        /// Simulated seconds
        #[arg(long, default_value_t = 60.0)]
        duration: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_and_subcommand() {
        let args = Args::try_parse_from([
            "harmonic668",
            "--seed",
            "7",
            "--out-dir",
            "plots",
            "torus",
            "--duration",
            "2",
        ])
        .unwrap();
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.out_dir, Some(PathBuf::from("plots")));
        assert_eq!(args.config, "config.toml");
        match args.command {
            Command::Torus { genus, duration, dt } => {
                assert_eq!(genus, 4);
                assert_eq!(duration, 2.0);
                assert_eq!(dt, 0.001);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rivalry_defaults_and_trial_floor() {
        let args = Args::try_parse_from(["harmonic668", "rivalry"]).unwrap();
        match args.command {
            Command::Rivalry {
                trials,
                trial_seconds,
                sample_rate,
            } => {
                assert_eq!(trials, 100);
                assert_eq!(trial_seconds, 1.5);
                assert_eq!(sample_rate, 1000.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Args::try_parse_from(["harmonic668", "rivalry", "--trials", "3"]).is_err());
        assert!(Args::try_parse_from(["harmonic668", "rivalry", "--trials", "4"]).is_ok());
    }

    #[test]
    fn hrv_defaults_to_one_minute() {
        let args = Args::try_parse_from(["harmonic668", "hrv"]).unwrap();
        assert!(matches!(args.command, Command::Hrv { duration } if duration == 60.0));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Args::try_parse_from(["harmonic668"]).is_err());
    }
}
