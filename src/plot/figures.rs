//! plot/figures.rs: One function per study figure. Each renders a PNG at
//! `path` with the given pixel size.

use std::error::Error;
use std::path::Path;

use plotters::prelude::*;

use crate::core::util::linspace;
use crate::plot::{Line, bar_panel, heatmap_panel, line_panel, semilogy_panel};
use crate::study::emergence::{PhaseField, emergence_function, golden_spiral, harmonic_series};
use crate::study::flow::{CriticalKind, FlowReport, FlowTrace};
use crate::study::harmonics::{ChannelScore, Detection, HarmonicSeries, TestSignal};
use crate::study::hrv::{HrvParameter, HrvSignal, HrvSpectrum};
use crate::study::meg::{MEG_HARMONICS, MegAnalysis};
use crate::study::quantum::{collapse_probability, double_well, stability_map, superposition_state};
use crate::study::rivalry::WindowResult;
use crate::study::tolerance::{IDEAL, ToleranceScan};
use crate::study::torus::TorusSimulator;

const PALETTE: [RGBColor; 6] = [
    BLUE,
    RED,
    RGBColor(0, 140, 70),
    RGBColor(200, 120, 0),
    MAGENTA,
    RGBColor(90, 90, 90),
];

fn color(i: usize) -> RGBColor {
    PALETTE[i % PALETTE.len()]
}

fn pairs(x: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    x.iter().copied().zip(y.iter().copied()).collect()
}

/// Every `stride`-th point, so long traces stay light.
fn thinned(x: &[f64], y: &[f64], stride: usize) -> Vec<(f64, f64)> {
    x.iter()
        .zip(y)
        .step_by(stride.max(1))
        .map(|(&a, &b)| (a, b))
        .collect()
}

/// Time excerpt, PSD and per-harmonic SNR for the clean (left) and noisy
/// (right) test signal.
pub fn render_detection(
    path: &Path,
    size: (u32, u32),
    series: &HarmonicSeries,
    signal: &TestSignal,
    clean: &Detection,
    noisy: &Detection,
    snr_threshold: f64,
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((3, 2));

    let excerpt = signal.t.iter().take_while(|&&t| t < 0.05).count();
    let markers: Vec<f64> = series.harmonics.iter().map(|h| h.freq).collect();

    for (col, (label, samples, det)) in [
        ("clean", &signal.clean, clean),
        ("noisy", &signal.noisy, noisy),
    ]
    .into_iter()
    .enumerate()
    {
        line_panel(
            &panels[col],
            &format!("Test signal ({label}), first 50 ms"),
            ("time (s)", "amplitude"),
            &[Line::new(pairs(&signal.t[..excerpt], &samples[..excerpt]), color(col))],
        )?;

        semilogy_panel(
            &panels[2 + col],
            &format!("Welch PSD ({label})"),
            ("frequency (Hz)", "PSD"),
            &[Line::new(pairs(&det.psd.freqs, &det.psd.power), color(col))],
            &markers,
        )?;

        let bars: Vec<(String, f64)> = det
            .detected
            .iter()
            .map(|h| (format!("{:.0}Hz", h.freq), h.snr))
            .collect();
        bar_panel(
            &panels[4 + col],
            &format!("Detected harmonics ({label}), score {:.1}", det.activity_score),
            "SNR",
            &bars,
            color(col),
            Some(snr_threshold),
        )?;
    }

    root.present()?;
    Ok(())
}

/// Channel scores laid out on a `width`-wide grid, channel 0 bottom-left.
pub fn render_activity_map(
    path: &Path,
    size: (u32, u32),
    scores: &[ChannelScore],
    width: usize,
) -> Result<(), Box<dyn Error>> {
    let width = width.max(1);
    let rows = scores.len().div_ceil(width);
    let mut grid = vec![vec![0.0; width]; rows];
    for s in scores {
        grid[s.channel / width][s.channel % width] = s.score;
    }

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    heatmap_panel(
        &root,
        "668 Hz harmonic activity by channel",
        ("channel % 10", "channel / 10"),
        &grid,
        0.0..width as f64,
        0.0..rows as f64,
    )?;
    root.present()?;
    Ok(())
}

pub fn render_meg(path: &Path, size: (u32, u32), analysis: &MegAnalysis) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((3, 1));

    let names: Vec<String> = analysis
        .excerpts
        .iter()
        .map(|e| format!("MEG{:04}", e.channel + 1))
        .collect();
    // Femtotesla, stacked so the traces do not overlap.
    let spread = analysis
        .excerpts
        .iter()
        .flat_map(|e| e.samples.iter())
        .fold(0.0f64, |m, v| m.max(v.abs()))
        * 1e15
        * 2.5;
    let excerpts: Vec<Line<'_>> = analysis
        .excerpts
        .iter()
        .zip(&names)
        .enumerate()
        .map(|(i, (e, name))| {
            let offset = i as f64 * spread;
            let y: Vec<f64> = e.samples.iter().map(|v| v * 1e15 + offset).collect();
            Line::labelled(thinned(&analysis.excerpt_times, &y, 2), color(i), name.as_str())
        })
        .collect();
    line_panel(&panels[0], "Filtered MEG excerpt", ("time (s)", "field (fT, offset)"), &excerpts)?;

    let psd = &analysis.mean_psd;
    let shown: Vec<(f64, f64)> = pairs(&psd.freqs, &psd.power)
        .into_iter()
        .filter(|p| p.0 <= 400.0)
        .collect();
    let markers: Vec<f64> = MEG_HARMONICS.iter().map(|h| h.1).collect();
    semilogy_panel(
        &panels[1],
        "Channel-mean PSD",
        ("frequency (Hz)", "PSD (T²/Hz)"),
        &[Line::new(shown, BLACK)],
        &markers,
    )?;

    let seg = analysis.summary.segment_seconds;
    let powers: Vec<Line<'_>> = analysis
        .summary
        .harmonics
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let pts = h
                .segment_powers
                .iter()
                .enumerate()
                .map(|(k, p)| (k as f64 * seg, *p))
                .collect();
            Line::labelled(pts, color(i), h.name.as_str())
        })
        .collect();
    semilogy_panel(
        &panels[2],
        "Harmonic power per segment",
        ("segment start (s)", "PSD (T²/Hz)"),
        &powers,
        &[],
    )?;

    root.present()?;
    Ok(())
}

pub fn render_hrv(
    path: &Path,
    size: (u32, u32),
    signal: &HrvSignal,
    spectrum: &HrvSpectrum,
    params: &[HrvParameter],
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((3, 1));

    let t_s: Vec<f64> = signal.t_ms.iter().map(|t| t / 1000.0).collect();
    let window = t_s.iter().take_while(|&&t| t < 30.0).count();
    line_panel(
        &panels[0],
        "RR interval, first 30 s",
        ("time (s)", "RR (ms)"),
        &[
            Line::labelled(thinned(&t_s[..window], &signal.rr_ms[..window], 10), BLUE, "RR"),
            Line::labelled(vec![(0.0, 668.0), (30.0, 668.0)], RED, "668 ms"),
        ],
    )?;

    let band: Vec<(f64, f64)> = pairs(&spectrum.freqs, &spectrum.magnitude)
        .into_iter()
        .filter(|p| p.0 > 0.0 && p.0 <= 0.5)
        .collect();
    line_panel(&panels[1], "HRV spectrum", ("frequency (Hz)", "|X(f)|"), &[Line::new(band, BLACK)])?;

    let bars: Vec<(String, f64)> = params.iter().map(|p| (p.name.to_string(), p.value_ms as f64)).collect();
    bar_panel(&panels[2], "HRV parameters vs 668 ms", "ms", &bars, BLUE, Some(668.0))?;

    root.present()?;
    Ok(())
}

pub fn render_rivalry(path: &Path, size: (u32, u32), results: &[WindowResult]) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    for (i, (panel, res)) in panels.iter().zip(results).enumerate() {
        let bars: Vec<(String, f64)> = res
            .comparisons
            .iter()
            .map(|c| {
                let mark = if c.significant { "*" } else { "" };
                (format!("{}{mark}", c.harmonic), c.t_statistic)
            })
            .collect();
        bar_panel(
            panel,
            &format!("{} ({}-{} ms)", res.window.name, res.window.start_ms, res.window.end_ms),
            "t (dominant - suppressed)",
            &bars,
            color(i),
            None,
        )?;
    }

    root.present()?;
    Ok(())
}

pub fn render_emergence(path: &Path, size: (u32, u32)) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    let t = linspace(664.0, 672.0, 1000);
    let prob: Vec<f64> = emergence_function(&t).iter().map(|p| p * p).collect();
    line_panel(
        &panels[0],
        "Emergence probability |ψ|²",
        ("value", "probability density"),
        &[Line::new(pairs(&t, &prob), BLUE)],
    )?;

    line_panel(
        &panels[1],
        "Golden spiral r = 668·φ^(θ/2π)",
        ("x", "y"),
        &[Line::new(golden_spiral(1000), RGBColor(200, 120, 0))],
    )?;

    let harmonics: Vec<(String, f64)> = harmonic_series(20)
        .into_iter()
        .map(|(n, f)| (n.to_string(), f))
        .collect();
    bar_panel(&panels[2], "Harmonic series 668/n", "Hz", &harmonics, RGBColor(0, 140, 70), None)?;

    let field = PhaseField::new(100);
    let n = field.axis.len();
    let grid: Vec<Vec<f64>> = (0..n).map(|r| (0..n).map(|c| field.at(r, c)).collect()).collect();
    heatmap_panel(&panels[3], "Phase field (100·|r|) mod 668", ("x", "y"), &grid, -10.0..10.0, -10.0..10.0)?;

    root.present()?;
    Ok(())
}

pub fn render_tolerance(path: &Path, size: (u32, u32), scan: &ToleranceScan) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    line_panel(
        &root,
        "Emergence potential around 668",
        ("value", "potential"),
        &[
            Line::labelled(pairs(&scan.values, &scan.potentials), BLUE, "potential"),
            Line::labelled(vec![(IDEAL, 0.0), (IDEAL, 1.0)], RED, "668"),
        ],
    )?;
    root.present()?;
    Ok(())
}

pub fn render_quantum(path: &Path, size: (u32, u32)) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    let t = linspace(665.0, 671.0, 1000);
    let density: Vec<f64> = superposition_state(&t).iter().map(|p| p * p).collect();
    line_panel(&panels[0], "Superposition |ψ|²", ("time (ms)", "density"), &[Line::new(pairs(&t, &density), BLUE)])?;

    let collapse: Vec<f64> = t.iter().map(|&m| collapse_probability(m)).collect();
    line_panel(
        &panels[1],
        "Collapse probability",
        ("measurement (ms)", "P"),
        &[Line::new(pairs(&t, &collapse), RED)],
    )?;

    let x = linspace(665.0, 671.0, 601);
    let well = double_well(&x);
    line_panel(&panels[2], "Double-well potential", ("x", "V(x)"), &[Line::new(pairs(&x, &well), RGBColor(0, 140, 70))])?;

    let temps = linspace(300.0, 320.0, 50);
    let times = linspace(665.0, 671.0, 50);
    heatmap_panel(
        &panels[3],
        "Stability map",
        ("temperature (K)", "time (ms)"),
        &stability_map(&temps, &times),
        300.0..320.0,
        665.0..671.0,
    )?;

    root.present()?;
    Ok(())
}

pub fn render_torus(path: &Path, size: (u32, u32), sim: &TorusSimulator) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    let times: Vec<f64> = sim.history.iter().map(|s| s.timestamp).collect();
    let loops: Vec<Line<'_>> = sim
        .loop_names
        .iter()
        .enumerate()
        .map(|(k, name)| {
            let re: Vec<f64> = sim.history.iter().map(|s| s.loops.get(k).map_or(0.0, |z| z.re)).collect();
            Line::labelled(pairs(&times, &re), color(k), name.as_str())
        })
        .collect();
    line_panel(&panels[0], "Loop states (real part)", ("time (s)", "Re z"), &loops)?;

    let potential: Vec<f64> = sim.history.iter().map(|s| s.morse_potential).collect();
    let critical: Vec<(f64, f64)> = sim
        .history
        .iter()
        .filter(|s| s.is_critical)
        .map(|s| (s.timestamp, s.morse_potential))
        .collect();
    line_panel(
        &panels[1],
        "Morse potential",
        ("time (s)", "V"),
        &[
            Line::labelled(pairs(&times, &potential), BLACK, "V"),
            Line::scatter(critical, RED, "critical"),
        ],
    )?;

    let total: Vec<f64> = sim
        .history
        .iter()
        .map(|s| s.interactions.iter().map(|z| z.norm()).sum::<f64>())
        .collect();
    line_panel(
        &panels[2],
        format!("Total interaction strength, Φ = {:.3}", sim.phi()).as_str(),
        ("time (s)", "Σ|z_i z_j|"),
        &[Line::new(pairs(&times, &total), RGBColor(0, 140, 70))],
    )?;

    let g = sim.genus as f64;
    heatmap_panel(
        &panels[3],
        "Interaction matrix (last 100 states)",
        ("loop j", "loop i"),
        &sim.interaction_matrix(100),
        0.0..g,
        0.0..g,
    )?;

    root.present()?;
    Ok(())
}

pub fn render_flow(path: &Path, size: (u32, u32), trace: &FlowTrace, report: &FlowReport) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 1));

    let pick = |kind: CriticalKind| -> Vec<(f64, f64)> {
        report.insights.iter().filter(|i| i.kind == kind).map(|i| (i.time, i.intensity)).collect()
    };
    line_panel(
        &panels[0],
        &format!("Coupling flow C(t), Φ = {:.2}", report.statistics.phi),
        ("time (s)", "|C|"),
        &[
            Line::labelled(pairs(&trace.times, &trace.values), BLUE, "C(t)"),
            Line::scatter(pick(CriticalKind::Insight), RED, "insight"),
            Line::scatter(pick(CriticalKind::Transition), RGBColor(0, 140, 70), "transition"),
        ],
    )?;

    let pair_lines: Vec<Line<'_>> = trace
        .pair_names
        .iter()
        .zip(&trace.pair_strengths)
        .enumerate()
        .map(|(i, (name, s))| Line::labelled(thinned(&trace.times, s, 5), color(i), name.as_str()))
        .collect();
    line_panel(&panels[1], "Pair coupling strength", ("time (s)", "|coupling|"), &pair_lines)?;

    root.present()?;
    Ok(())
}

