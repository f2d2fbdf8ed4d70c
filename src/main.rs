// Entry point: parse args, load config, seed the RNG and run one study.
use std::error::Error;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use harmonic668::cli::Args;
use harmonic668::commands::{self, Context};
use harmonic668::config::AppConfig;

fn main() -> Result<(), Box<dyn Error>> {
    // Logs on stderr so stdout carries only the study report.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut cfg = AppConfig::load_or_default(&args.config);
    if let Some(dir) = &args.out_dir {
        cfg.output.dir = dir.clone();
    }
    if let Some(seed) = args.seed {
        cfg.rng.seed = Some(seed);
    }

    let rng = match cfg.rng.seed {
        Some(seed) => {
            info!(seed, "seeded RNG");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    };

    let mut ctx = Context::new(cfg, rng);
    commands::run(&mut ctx, &args.command)
}
