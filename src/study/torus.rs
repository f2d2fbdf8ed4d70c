//! study/torus.rs: Genus-g torus bookkeeping, a real-valued gradient
//! "proof engine" and a complex loop simulator with critical-point
//! detection and JSON export.

use std::f64::consts::PI;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use rustfft::num_complex::Complex64;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::StudyError;
use crate::study::equation::integrated_information;

pub const BASE_FREQUENCY: f64 = 668.0;

const LOOP_NAMES: [&str; 4] = ["Memory", "Meaning", "Interaction", "Introspection"];

/// Display names for `genus` loops; loops past the fourth are numbered.
pub fn loop_names(genus: usize) -> Vec<String> {
    (0..genus)
        .map(|i| match LOOP_NAMES.get(i) {
            Some(name) => name.to_string(),
            None => format!("Loop{}", i + 1),
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MorseCriticalPoints {
    pub minima: usize,
    pub saddles: usize,
    pub maxima: usize,
    pub total: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenusTorus {
    pub genus: usize,
}

impl GenusTorus {
    pub fn new(genus: usize) -> Self {
        Self { genus }
    }

    pub fn euler_characteristic(&self) -> i64 {
        2 - 2 * self.genus as i64
    }

    /// `(b0, b1, b2)`
    pub fn betti_numbers(&self) -> [usize; 3] {
        [1, 2 * self.genus, 1]
    }

    pub fn interactions(&self) -> usize {
        self.genus * self.genus.saturating_sub(1) / 2
    }

    pub fn critical_points(&self) -> MorseCriticalPoints {
        MorseCriticalPoints {
            minima: 1,
            saddles: 2 * self.genus,
            maxima: 1,
            total: 2 + 2 * self.genus,
        }
    }

    /// Point on the standard torus for loop `loop_idx`; the major radius
    /// shrinks by 0.2 per loop, the minor radius is 0.5.
    pub fn coordinates(&self, u: f64, v: f64, loop_idx: usize) -> (f64, f64, f64) {
        let major = 2.0 - 0.2 * loop_idx as f64;
        let minor = 0.5;
        (
            (major + minor * v.cos()) * u.cos(),
            (major + minor * v.cos()) * u.sin(),
            minor * v.sin(),
        )
    }
}

pub fn coupling_constant(base_freq: f64) -> f64 {
    1.0 / base_freq.sqrt()
}

// ======================================================================
// Real-valued proof engine
// ======================================================================

/// Starting loop state for the proof demonstration; repeats for genera
/// above four.
pub const DEMO_STATE: [f64; 4] = [0.1, 0.2, -0.15, 0.25];

pub fn demo_state(genus: usize) -> Vec<f64> {
    DEMO_STATE.iter().copied().cycle().take(genus).collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct ProofState {
    pub step: usize,
    pub loops: Vec<f64>,
    pub morse_potential: f64,
    pub integrated_information: f64,
    pub is_critical: bool,
}

pub struct ProofEngine {
    pub genus: usize,
    pub torus: GenusTorus,
    pub base_frequency: f64,
    pub coupling: f64,
}

impl ProofEngine {
    pub fn new(genus: usize) -> Self {
        Self {
            genus,
            torus: GenusTorus::new(genus),
            base_frequency: BASE_FREQUENCY,
            coupling: coupling_constant(BASE_FREQUENCY),
        }
    }

    /// `668 / 2^n` for n = 0..=genus.
    pub fn resonance_frequencies(&self) -> Vec<f64> {
        (0..=self.genus)
            .map(|n| self.base_frequency / f64::powi(2.0, n as i32))
            .collect()
    }

    /// `coupling^(2k − 2)`, one at k = 0.
    pub fn loop_amplitude(&self, k: usize) -> f64 {
        if k == 0 {
            1.0
        } else {
            self.coupling.powi(2 * k as i32 - 2)
        }
    }

    /// Simplified Morse gradient `2x − c Σx`.
    pub fn gradient(&self, state: &[f64]) -> Vec<f64> {
        let coupling_term = if state.len() > 1 {
            self.coupling * state.iter().sum::<f64>()
        } else {
            0.0
        };
        state.iter().map(|x| 2.0 * x - coupling_term).collect()
    }

    pub fn is_critical(&self, state: &[f64], threshold: f64) -> bool {
        norm(&self.gradient(state)) < threshold
    }

    pub fn morse_potential(&self, state: &[f64]) -> f64 {
        let sum: f64 = state.iter().sum();
        state.iter().map(|x| x * x).sum::<f64>() - self.coupling * sum * sum
    }

    /// Loop forcing at `sin(2π (668 / 2^(k+1)) t / 1000)` followed by a
    /// gradient step of 0.01, recorded after each forcing.
    pub fn evolve(&self, initial: &[f64], steps: usize) -> Vec<ProofState> {
        let phi = integrated_information(self.genus);
        let mut state = initial.to_vec();
        let mut out = Vec::with_capacity(steps);
        for step in 0..steps {
            for k in 0..self.genus.min(state.len()) {
                let freq = self.base_frequency / f64::powi(2.0, k as i32 + 1);
                let phase = 2.0 * PI * freq * step as f64 / 1000.0;
                state[k] += self.loop_amplitude(k) * phase.sin();
            }
            let is_critical = self.is_critical(&state, 0.01);
            if is_critical {
                info!(step, "critical point: insight firing");
            }
            out.push(ProofState {
                step,
                loops: state.clone(),
                morse_potential: self.morse_potential(&state),
                integrated_information: phi,
                is_critical,
            });
            let grad = self.gradient(&state);
            for (x, g) in state.iter_mut().zip(grad) {
                *x -= 0.01 * g;
            }
        }
        out
    }

    pub fn firing_report(&self, state: &[f64]) -> Vec<String> {
        vec![
            "=== CONSCIOUSNESS FIRING ===".to_string(),
            format!("Genus: {}", self.genus),
            format!("Topology: {} interactions", self.torus.interactions()),
            format!(
                "Integrated Information Φ: {:.2}",
                integrated_information(self.genus)
            ),
            format!("Critical Points: {}", self.torus.critical_points().total),
            format!("Resonance: {} Hz", self.base_frequency),
            format!("State Energy: {:.3}", norm(state)),
        ]
    }
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[derive(Clone, Debug, Serialize)]
pub struct GenusRow {
    pub genus: usize,
    pub euler_characteristic: i64,
    pub interactions: usize,
    pub phi: f64,
}

/// Topology table for genus 1 through 7.
pub fn boundary_table() -> Vec<GenusRow> {
    (1..=7)
        .map(|g| {
            let torus = GenusTorus::new(g);
            GenusRow {
                genus: g,
                euler_characteristic: torus.euler_characteristic(),
                interactions: torus.interactions(),
                phi: integrated_information(g),
            }
        })
        .collect()
}

/// `log₂ 668`
pub fn critical_genus() -> f64 {
    BASE_FREQUENCY.log2()
}

/// `668^(2g / 4)` states for a 2g-dimensional phase space.
pub fn phase_space_capacity(genus: usize) -> f64 {
    BASE_FREQUENCY.powf(2.0 * genus as f64 / 4.0)
}

// ======================================================================
// Complex loop simulator
// ======================================================================

const INSIGHTS: [&str; 5] = [
    "Pattern recognized in memory-meaning interaction",
    "New connection formed between introspection and interaction",
    "Emergent understanding of self-reference",
    "Topological transformation detected",
    "Resonance achieved across all loops",
];

const CRITICAL_THRESHOLD: f64 = 0.05;
const DEBOUNCE_S: f64 = 0.1;
const GRADIENT_EPS: f64 = 1e-6;

#[derive(Clone, Debug)]
pub struct TorusState {
    pub timestamp: f64,
    pub loops: Vec<Complex64>,
    /// `z_i · conj(z_j)` for i < j.
    pub interactions: Vec<Complex64>,
    pub morse_potential: f64,
    pub integrated_phi: f64,
    pub is_critical: bool,
    pub insight: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TorusExport {
    pub genus: usize,
    pub base_frequency: f64,
    pub coupling: f64,
    pub integrated_phi: f64,
    pub num_interactions: usize,
    pub critical_points: Vec<f64>,
    pub num_states: usize,
    pub insights: Vec<String>,
}

pub struct TorusSimulator {
    pub genus: usize,
    pub torus: GenusTorus,
    pub base_freq: f64,
    pub coupling: f64,
    pub loop_names: Vec<String>,
    loop_phases: Vec<f64>,
    loop_states: Vec<Complex64>,
    pub history: Vec<TorusState>,
    pub critical_points: Vec<f64>,
}

impl TorusSimulator {
    pub fn new(genus: usize, base_freq: f64) -> Result<Self, StudyError> {
        if genus == 0 {
            return Err(StudyError::invalid("genus", "must be at least one"));
        }
        if !(base_freq > 0.0) {
            return Err(StudyError::invalid("base_freq", "must be positive"));
        }
        Ok(Self {
            genus,
            torus: GenusTorus::new(genus),
            base_freq,
            coupling: coupling_constant(base_freq),
            loop_names: loop_names(genus),
            loop_phases: (0..genus).map(|k| 2.0 * PI * k as f64 / genus as f64).collect(),
            loop_states: vec![Complex64::new(0.0, 0.0); genus],
            history: Vec::new(),
            critical_points: Vec::new(),
        })
    }

    pub fn phi(&self) -> f64 {
        integrated_information(self.genus)
    }

    /// `Σ|z|² − c |Σz|²`
    pub fn morse_potential(&self, state: &[Complex64]) -> f64 {
        let individual: f64 = state.iter().map(|z| z.norm_sqr()).sum();
        let total: Complex64 = state.iter().sum();
        individual - self.coupling * total.norm_sqr()
    }

    /// Forward-difference gradient along the real axis of each loop.
    pub fn is_critical(&self, state: &[Complex64], threshold: f64) -> bool {
        let v0 = self.morse_potential(state);
        let mut probe = state.to_vec();
        let mut sq = 0.0;
        for i in 0..probe.len() {
            probe[i].re += GRADIENT_EPS;
            let g = (self.morse_potential(&probe) - v0) / GRADIENT_EPS;
            probe[i].re -= GRADIENT_EPS;
            sq += g * g;
        }
        sq.sqrt() < threshold
    }

    fn insight_at(t: f64) -> &'static str {
        INSIGHTS[(t * 10.0) as usize % INSIGHTS.len()]
    }

    /// Loop k sits at `(1/(k+1)) exp(i(φ_k + 2π (f / 2^k) t))`.
    pub fn evolve_step(&mut self, t: f64) -> &TorusState {
        for (k, z) in self.loop_states.iter_mut().enumerate() {
            let freq = self.base_freq / f64::powi(2.0, k as i32);
            let phase = self.loop_phases[k] + 2.0 * PI * freq * t;
            *z = Complex64::from_polar(1.0 / (k + 1) as f64, phase);
        }
        let mut interactions = Vec::with_capacity(self.torus.interactions());
        for i in 0..self.genus {
            for j in i + 1..self.genus {
                interactions.push(self.loop_states[i] * self.loop_states[j].conj());
            }
        }

        let is_critical = self.is_critical(&self.loop_states, CRITICAL_THRESHOLD);
        let debounced = self
            .critical_points
            .last()
            .is_none_or(|&last| t - last > DEBOUNCE_S);
        let insight = (is_critical && debounced).then(|| {
            self.critical_points.push(t);
            let text = Self::insight_at(t);
            info!("insight at t={t:.3}s: {text}");
            text.to_string()
        });

        let state = TorusState {
            timestamp: t,
            loops: self.loop_states.clone(),
            interactions,
            morse_potential: self.morse_potential(&self.loop_states),
            integrated_phi: self.phi(),
            is_critical,
            insight,
        };
        self.history.push(state);
        &self.history[self.history.len() - 1]
    }

    pub fn simulate(&mut self, duration: f64, dt: f64) -> Result<(), StudyError> {
        if !(dt > 0.0) {
            return Err(StudyError::invalid("dt", "must be positive"));
        }
        let steps = (duration.max(0.0) / dt).round() as usize;
        info!(
            genus = self.genus,
            base_freq = self.base_freq,
            phi = self.phi(),
            steps,
            "starting torus simulation"
        );
        for step in 0..steps {
            let t = step as f64 * dt;
            let state = self.evolve_step(t);
            if step % 100 == 0 {
                let mean: Complex64 =
                    state.loops.iter().sum::<Complex64>() / state.loops.len() as f64;
                debug!("t={t:.3}s: V={:.3}, |ψ|={:.3}", state.morse_potential, mean.norm());
            }
        }
        info!(insights = self.critical_points.len(), "torus simulation complete");
        Ok(())
    }

    /// Mean |z_i conj(z_j)| over the last `window` states, symmetric,
    /// zero diagonal.
    pub fn interaction_matrix(&self, window: usize) -> Vec<Vec<f64>> {
        let g = self.genus;
        let mut m = vec![vec![0.0; g]; g];
        let start = self.history.len().saturating_sub(window);
        let recent = &self.history[start..];
        for s in recent {
            let mut idx = 0;
            for i in 0..g {
                for j in i + 1..g {
                    let strength = s.interactions[idx].norm();
                    m[i][j] += strength;
                    m[j][i] += strength;
                    idx += 1;
                }
            }
        }
        let count = recent.len().max(1) as f64;
        m.iter_mut().flatten().for_each(|v| *v /= count);
        m
    }

    pub fn export(&self) -> TorusExport {
        TorusExport {
            genus: self.genus,
            base_frequency: self.base_freq,
            coupling: self.coupling,
            integrated_phi: self.phi(),
            num_interactions: self.torus.interactions(),
            critical_points: self.critical_points.clone(),
            num_states: self.history.len(),
            insights: self
                .history
                .iter()
                .filter_map(|s| s.insight.clone())
                .collect(),
        }
    }

    pub fn export_json(&self, path: &Path) -> Result<(), StudyError> {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, &self.export())?;
        info!(path = %path.display(), "exported torus data");
        Ok(())
    }
}
