//! commands.rs: One runner per CLI subcommand. Each runs its study, prints the
//! narrative report to stdout and writes its figure / WAV / JSON artifacts.

use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use serde::Serialize;
use tracing::info;

use crate::cli::Command;
use crate::config::AppConfig;
use crate::core::number::PHI;
use crate::error::StudyError;
use crate::plot::figures;
use crate::study::emergence::{CENTER, emergence_facts};
use crate::study::equation::ConsciousnessEquation;
use crate::study::flow::CouplingFlow;
use crate::study::harmonics::{
    ChannelScore, DEFAULT_TEST_DIVISORS, Detection, Harmonic, HarmonicDetector, default_active_channels,
    high_activity,
};
use crate::study::hrv::{
    BASELINE_MS, brain_wave_divisions, generate_hrv_signal, golden_intervals, heart_rate_bpm, hrv_parameters,
    hrv_spectrum,
};
use crate::study::meg::{MegSimulator, MegSummary};
use crate::study::quantum::{BODY_TEMPERATURE_K, quantum_metrics};
use crate::study::rivalry::{RivalryProtocol, WindowResult};
use crate::study::tolerance::{IDEAL, boundary_scan, emergence_potential};
use crate::study::torus::{
    BASE_FREQUENCY, ProofEngine, TorusSimulator, boundary_table, coupling_constant, critical_genus, demo_state,
    phase_space_capacity,
};
use crate::synth::tone::{SessionPlan, ToneGenerator};

const RULE: &str = "============================================================";

/// Resolved config plus the shared RNG. `stamp` goes into file names.
pub struct Context {
    pub cfg: AppConfig,
    pub rng: StdRng,
    pub stamp: String,
}

impl Context {
    pub fn new(cfg: AppConfig, rng: StdRng) -> Self {
        Self {
            cfg,
            rng,
            stamp: chrono::Local::now().format("%Y%m%d_%H%M%S").to_string(),
        }
    }

    fn out_dir(&self) -> &Path {
        &self.cfg.output.dir
    }

    fn size(&self) -> (u32, u32) {
        (self.cfg.output.width, self.cfg.output.height)
    }

    /// Path inside the output directory, creating the directory on demand.
    fn artifact(&self, name: &str) -> Result<PathBuf, StudyError> {
        fs::create_dir_all(self.out_dir())?;
        Ok(self.out_dir().join(name))
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StudyError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    info!("Saved {}", path.display());
    Ok(())
}

fn saved(path: &Path) {
    info!("Saved {}", path.display());
}

pub fn run(ctx: &mut Context, command: &Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Tone { frequency, minutes } => run_tone(ctx, *frequency, *minutes),
        Command::Detect { duration, channels } => run_detect(ctx, *duration, *channels),
        Command::Meg { duration, channels } => run_meg(ctx, *duration, *channels),
        Command::Hrv { duration } => run_hrv(ctx, *duration),
        Command::Rivalry {
            trials,
            trial_seconds,
            sample_rate,
        } => run_rivalry(ctx, *trials, *trial_seconds, *sample_rate),
        Command::Emergence => run_emergence(ctx),
        Command::Tolerance => run_tolerance(ctx),
        Command::Quantum => run_quantum(ctx),
        Command::Equation { time } => run_equation(*time),
        Command::Proof { genus, steps } => run_proof(*genus, *steps),
        Command::Torus { genus, duration, dt } => run_torus(ctx, *genus, *duration, *dt),
        Command::Flow { genus, duration } => run_flow(ctx, *genus, *duration),
    }
}

fn run_tone(ctx: &mut Context, frequency: Option<f64>, minutes: Option<f64>) -> Result<(), Box<dyn Error>> {
    let tone = &ctx.cfg.tone;
    let generator = ToneGenerator::new(frequency.unwrap_or(tone.frequency_hz), tone.sample_rate)?;
    let plan = SessionPlan {
        session_seconds: minutes.map_or(tone.session_seconds, |m| m * 60.0),
        test_seconds: tone.test_seconds,
        beat_hz: tone.beat_hz,
        amplitude: tone.amplitude,
    };

    println!("{} Hz tone generator", generator.frequency_hz);
    println!("{RULE}");
    let files = generator.meditation_set(&ctx.cfg.output.dir, &ctx.stamp, &plan)?;
    for f in &files {
        println!("  wrote {}", f.display());
    }
    println!();
    println!("Usage:");
    println!("  1. Use headphones for the binaural file (left / right differ by {} Hz).", plan.beat_hz);
    println!("  2. Keep the volume low; the carrier is a pure sine.");
    println!("  3. Start with the {}-second test file.", plan.test_seconds);
    Ok(())
}

#[derive(Serialize)]
struct DetectionReport<'a> {
    fundamental_hz: f64,
    sample_rate: f64,
    snr_threshold: f64,
    harmonics: &'a [Harmonic],
    clean: &'a Detection,
    noisy: &'a Detection,
    high_activity_channels: Vec<ChannelScore>,
}

fn run_detect(ctx: &mut Context, duration: f64, n_channels: usize) -> Result<(), Box<dyn Error>> {
    let detector = HarmonicDetector::new(&ctx.cfg.detector)?;
    println!("668 Hz harmonic detection");
    println!("{RULE}");
    for h in &detector.series.harmonics {
        println!("  {}", h.name);
    }

    let signal = detector.generate_test_signal(duration, &DEFAULT_TEST_DIVISORS, &mut ctx.rng);
    let clean = detector.detect(&signal.clean)?;
    let noisy = detector.detect(&signal.noisy)?;
    for (label, det) in [("clean", &clean), ("noisy", &noisy)] {
        println!();
        println!("{label} signal: activity score {:.2}", det.activity_score);
        for hit in &det.detected {
            println!("  {:<22} SNR {:8.2}  peak {:.3e}", hit.name, hit.snr, hit.peak_power);
        }
    }

    let path = ctx.artifact("harmonic_detection.png")?;
    figures::render_detection(
        &path,
        ctx.size(),
        &detector.series,
        &signal,
        &clean,
        &noisy,
        detector.snr_threshold(),
    )?;
    saved(&path);

    let active: Vec<usize> = default_active_channels()
        .into_iter()
        .filter(|&c| c < n_channels)
        .collect();
    let data = detector.simulate_channels(n_channels, duration, &active, &mut ctx.rng);
    let scores = detector.analyze_channels(&data)?;
    let strong = high_activity(&scores, 5.0);
    println!();
    println!("{} of {} channels show high 668 Hz harmonic activity", strong.len(), scores.len());

    let path = ctx.artifact("channel_activity.png")?;
    figures::render_activity_map(&path, ctx.size(), &scores, 10)?;
    saved(&path);

    let report = DetectionReport {
        fundamental_hz: detector.series.fundamental,
        sample_rate: detector.sample_rate(),
        snr_threshold: detector.snr_threshold(),
        harmonics: &detector.series.harmonics,
        clean: &clean,
        noisy: &noisy,
        high_activity_channels: strong,
    };
    write_json(&ctx.artifact("harmonic_detection.json")?, &report)?;
    Ok(())
}

fn run_meg(ctx: &mut Context, duration: Option<f64>, channels: Option<usize>) -> Result<(), Box<dyn Error>> {
    let mut cfg = ctx.cfg.meg.clone();
    if let Some(d) = duration {
        cfg.duration_seconds = d;
    }
    if let Some(c) = channels {
        cfg.n_channels = c;
    }
    let sim = MegSimulator::new(&cfg)?;
    let analysis = sim.run(&mut ctx.rng)?;
    print_meg_summary(&analysis.summary);

    let path = ctx.artifact("meg_analysis.png")?;
    figures::render_meg(&path, ctx.size(), &analysis)?;
    saved(&path);
    write_json(&ctx.artifact("meg_summary.json")?, &analysis.summary)?;
    Ok(())
}

fn print_meg_summary(s: &MegSummary) {
    println!("Simulated MEG recording");
    println!("{RULE}");
    println!(
        "  {} channels ({} magnetometers, {} gradiometers) at {} Hz",
        s.n_channels, s.magnetometers, s.gradiometers, s.sample_rate
    );
    println!(
        "  {:.0} s, {} segments of {} s, passband {}-{} Hz, notches {:?}",
        s.duration_seconds, s.n_segments, s.segment_seconds, s.passband_hz[0], s.passband_hz[1], s.notch_hz
    );
    println!();
    for h in &s.harmonics {
        println!(
            "  {:<6} mean {:.3e}  max {:.3e}  detected in {:5.1}% of segments",
            h.name, h.mean_power, h.max_power, h.detection_rate
        );
    }
}

fn run_hrv(ctx: &mut Context, duration: f64) -> Result<(), Box<dyn Error>> {
    println!("HRV and the 668 ms interval");
    println!("{RULE}");
    let params = hrv_parameters();
    for p in &params {
        println!(
            "  {:<6} {} ms  diff {:+} ms  ratio {:.4}",
            p.name, p.value_ms, p.diff_ms, p.ratio
        );
    }
    let (lo, hi) = golden_intervals();
    println!();
    println!("  668 / φ = {lo:.1} ms, 668 × φ = {hi:.1} ms (φ = {PHI:.6})");
    println!("  668 ms between beats is {:.1} bpm", heart_rate_bpm(BASELINE_MS));
    println!();
    println!("Octave divisions of 668 Hz:");
    for d in brain_wave_divisions() {
        println!("  {:<6} 668/{:<3} = {:.2} Hz", d.band, d.divisor, d.freq);
    }

    let signal = generate_hrv_signal(duration, BASELINE_MS, &mut ctx.rng);
    let spectrum = hrv_spectrum(&signal);
    if let Some(f) = spectrum.dominant_hz() {
        println!();
        println!("  dominant HRV modulation: {f:.3} Hz");
    }

    let path = ctx.artifact("hrv_analysis.png")?;
    figures::render_hrv(&path, ctx.size(), &signal, &spectrum, &params)?;
    saved(&path);
    Ok(())
}

fn run_rivalry(ctx: &mut Context, trials: usize, trial_seconds: f64, fs: f64) -> Result<(), Box<dyn Error>> {
    let protocol = RivalryProtocol::new(fs)?;
    let data = protocol.simulate(trials, trial_seconds, &mut ctx.rng);
    let results = protocol.run(&data)?;

    println!("Binocular rivalry: dominant vs suppressed");
    println!("{RULE}");
    for r in &results {
        print_window(r);
    }

    let path = ctx.artifact("rivalry_analysis.png")?;
    figures::render_rivalry(&path, ctx.size(), &results)?;
    saved(&path);
    write_json(&ctx.artifact("rivalry_results.json")?, &results)?;
    Ok(())
}

fn print_window(r: &WindowResult) {
    println!();
    println!("{} ({}-{} ms)", r.window.name, r.window.start_ms, r.window.end_ms);
    for c in &r.comparisons {
        println!(
            "  {:<6} t = {:7.3}  p = {:.4}  d = {:6.3}{}",
            c.harmonic,
            c.t_statistic,
            c.p_value,
            c.cohens_d,
            if c.significant { "  *" } else { "" }
        );
    }
}

fn run_emergence(ctx: &mut Context) -> Result<(), Box<dyn Error>> {
    let facts = emergence_facts();
    println!("The mathematics of 668");
    println!("{RULE}");
    if let Some(fib) = &facts.fibonacci {
        println!(
            "  Fibonacci bracket: F({}) = {} < 668 < F({}) = {}",
            fib.index - 1,
            fib.lower,
            fib.index,
            fib.upper
        );
        println!("  ratio {:.6} vs φ = {PHI:.6}", fib.ratio);
    }
    println!("  668 / φ = {:.2}, 668 × φ = {:.2}", facts.golden_lower, facts.golden_upper);
    println!();
    let f = &facts.factorization;
    println!(
        "  668 = {}  (product check {}, 167 prime: {})",
        f.rendered, f.product, f.largest_is_prime
    );
    println!(
        "  binary {}  octal {}  hex {}",
        facts.radix.binary, facts.radix.octal, facts.radix.hex
    );
    println!("  bit entropy {:.4}", facts.bit_entropy);
    println!();
    let c = &facts.curiosities;
    for (p, ratio) in &c.perfect_ratios {
        println!("  668 / {p} = {ratio:.4}");
    }
    println!("  triangular root {:.4}", c.triangular_root);
    println!("  668 / 212.7 = {:.5}", c.pi_estimate);
    println!("  ln 668 = {:.5}", c.ln);
    println!("  center {CENTER}");

    let path = ctx.artifact("emergence_analysis.png")?;
    figures::render_emergence(&path, ctx.size())?;
    saved(&path);
    Ok(())
}

fn run_tolerance(ctx: &mut Context) -> Result<(), Box<dyn Error>> {
    println!("Tolerance: emergence around {IDEAL}");
    println!("{RULE}");
    for v in [667.0, 668.0, 669.0] {
        println!("  {v} ms: potential {:.3}", emergence_potential(v, IDEAL));
    }
    let scan = boundary_scan();
    let path = ctx.artifact("tolerance_boundary.png")?;
    figures::render_tolerance(&path, ctx.size(), &scan)?;
    saved(&path);
    println!();
    println!("  Exact agreement scores zero; a one-unit deviation scores highest.");
    Ok(())
}

fn run_quantum(ctx: &mut Context) -> Result<(), Box<dyn Error>> {
    let m = quantum_metrics();
    println!("Quantum metrics");
    println!("{RULE}");
    println!("  decoherence time at {BODY_TEMPERATURE_K} K: ~{:.3} ms", m.decoherence_time);
    println!("  Δt = {} ms, ΔE ∝ {:.3}", m.delta_t_ms, m.delta_e);
    println!("  667 → 669 tunnelling probability: {:.3}%", m.tunnelling_probability * 100.0);

    let path = ctx.artifact("quantum_analysis.png")?;
    figures::render_quantum(&path, ctx.size())?;
    saved(&path);
    Ok(())
}

fn run_equation(time: f64) -> Result<(), Box<dyn Error>> {
    let eq = ConsciousnessEquation::default();
    println!("Genus-{} coupling equation at {} Hz", eq.genus, eq.frequency);
    println!("{RULE}");
    for line in eq.proof() {
        println!("{line}");
    }
    let c = eq.compute(time);
    println!();
    println!("C({time}) = {:.4} {:+.4}i, |C| = {:.4}", c.re, c.im, c.norm());
    Ok(())
}

fn run_proof(genus: usize, steps: usize) -> Result<(), Box<dyn Error>> {
    if genus == 0 {
        return Err(StudyError::invalid("genus", "must be at least one").into());
    }
    println!("{RULE}");
    println!("668 as a coupling constant");
    println!("{RULE}");

    println!();
    println!("1. TOPOLOGICAL OPTIMALITY");
    for row in boundary_table() {
        println!(
            "  g={}: χ={:3}, interactions={:2}, Φ={:.2}",
            row.genus, row.euler_characteristic, row.interactions, row.phi
        );
    }

    let gs = coupling_constant(BASE_FREQUENCY);
    println!();
    println!("2. COUPLING");
    println!("  g_s = 1/√668 = {gs:.6}, g_s² = {:.6}", gs * gs);

    let gc = critical_genus();
    println!();
    println!("3. CRITICAL GENUS");
    println!("  g_c = log₂ 668 = {gc:.2}: convergent below {}, divergent above {}", gc as usize, gc as usize + 1);

    println!();
    println!("4. RESONANCES");
    println!("  668 hours = {:.2} days", BASE_FREQUENCY / 24.0);
    for n in 1..=5 {
        println!("  668/{} = {:.1} Hz", 1 << n, BASE_FREQUENCY / f64::from(1u32 << n));
    }

    println!();
    println!("5. PHASE SPACE CAPACITY");
    for g in 1..=7 {
        println!("  g={g}: {:.2e} states", phase_space_capacity(g));
    }

    let engine = ProofEngine::new(genus);
    println!();
    println!("Live demonstration: genus {genus}, coupling {:.6}", engine.coupling);
    let states = engine.evolve(&demo_state(genus), steps);
    for s in states.iter().filter(|s| s.is_critical) {
        println!("  critical point at step {}", s.step);
        for line in engine.firing_report(&s.loops) {
            println!("    {line}");
        }
    }
    let mean_v = states.iter().map(|s| s.morse_potential).sum::<f64>() / states.len().max(1) as f64;
    println!("  {} steps, mean Morse potential {mean_v:.3}", states.len());
    Ok(())
}

fn run_torus(ctx: &mut Context, genus: usize, duration: f64, dt: f64) -> Result<(), Box<dyn Error>> {
    let mut sim = TorusSimulator::new(genus, BASE_FREQUENCY)?;
    sim.simulate(duration, dt)?;
    let export = sim.export();

    println!("Genus-{genus} torus simulation");
    println!("{RULE}");
    println!("  Φ = {:.3}, coupling {:.6}", export.integrated_phi, export.coupling);
    println!("  {} states, {} critical points", export.num_states, export.critical_points.len());
    for insight in export.insights.iter().take(10) {
        println!("  insight: {insight}");
    }

    let path = ctx.artifact("torus_dynamics.png")?;
    figures::render_torus(&path, ctx.size(), &sim)?;
    saved(&path);
    sim.export_json(&ctx.artifact(&format!("torus_state_{}.json", ctx.stamp))?)?;
    Ok(())
}

fn run_flow(ctx: &mut Context, genus: usize, duration: f64) -> Result<(), Box<dyn Error>> {
    if genus < 2 {
        return Err(StudyError::invalid("genus", "need at least two loops to couple").into());
    }
    let flow = CouplingFlow::new(genus, BASE_FREQUENCY);
    let (trace, report) = flow.run(duration, &mut ctx.rng)?;

    let s = &report.statistics;
    println!("Coupling flow, genus {genus}, {duration} s");
    println!("{RULE}");
    println!("  Φ = {:.2}, coherence {:.3}, variance {:.3}", s.phi, s.coherence, s.variance);
    println!("  entropy {:.3} bits, peak {:.3}, trough {:.3}", s.entropy, s.peak, s.trough);
    println!();
    for t in &report.transitions {
        println!("  {:?}: {} points, mean intensity {:.3}", t.kind, t.count, t.mean_intensity);
    }
    println!();
    for p in &report.pairs {
        println!("  {:<28} mean {:.3}  max {:.3}  resonance {:.3}", p.pair, p.mean, p.max, p.resonance);
    }
    println!();
    for (f, mag) in &report.dominant_frequencies {
        println!("  period {:.3} s ({f:.3} Hz), magnitude {mag:.1}", 1.0 / f);
    }
    println!();
    for i in report.insights.iter().take(10) {
        println!("  t={:.2}s [{:.2}] {}", i.time, i.intensity, i.insight);
    }

    let path = ctx.artifact("coupling_flow.png")?;
    figures::render_flow(&path, ctx.size(), &trace, &report)?;
    saved(&path);
    write_json(&ctx.artifact(&format!("coupling_flow_{}.json", ctx.stamp))?, &report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn context(dir: &Path) -> Context {
        let mut cfg = AppConfig::default();
        cfg.output.dir = dir.to_path_buf();
        cfg.output.width = 400;
        cfg.output.height = 300;
        Context::new(cfg, StdRng::seed_from_u64(5))
    }

    #[test]
    fn artifact_creates_output_dir() {
        let dir = std::env::temp_dir().join(format!("harmonic668_cmd_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let ctx = context(&dir);
        let path = ctx.artifact("x.json").unwrap();
        assert!(dir.is_dir());
        assert_eq!(path, dir.join("x.json"));
        assert_eq!(ctx.stamp.len(), "20260101_000000".len());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_json_round_trips() {
        let dir = std::env::temp_dir().join(format!("harmonic668_json_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("v.json");
        write_json(&path, &vec![1.0, 2.5]).unwrap();
        let back: Vec<f64> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, vec![1.0, 2.5]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn flow_rejects_single_loop() {
        let dir = std::env::temp_dir().join(format!("harmonic668_flow_{}", std::process::id()));
        let mut ctx = context(&dir);
        let err = run(&mut ctx, &Command::Flow { genus: 1, duration: 1.0 });
        assert!(err.is_err());
    }
}
