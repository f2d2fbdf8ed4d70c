//! study/flow.rs: Coupling-flow simulator. Samples the magnitude of summed
//! loop couplings on a 10 ms grid and reports its critical points and
//! periodicity.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use rand::Rng;
use rand::seq::IndexedRandom;
use rustfft::num_complex::Complex64;
use serde::Serialize;
use tracing::info;

use crate::core::fft::{fft_freqs, fft_magnitude};
use crate::core::stats::{histogram_entropy, max, mean, min, std_dev, variance};
use crate::core::util::arange;
use crate::error::StudyError;
use crate::study::torus::loop_names;

pub const FLOW_DT: f64 = 0.01;
const ENTROPY_BINS: usize = 20;
const PHI_SCALE: f64 = 1.38;
const SADDLE_CURVATURE: f64 = 0.01;
const INSIGHT_INTENSITY: f64 = 4.0;
const TRANSITION_INTENSITY: f64 = 3.0;

const TRANSITION_INSIGHTS: [&str; 3] = [
    "Consciousness shifts between states",
    "The torus rotates to new configuration",
    "Phase space reorganizes around attractors",
];
const FALLBACK_INSIGHT: &str = "The pattern reveals itself through recursion";

fn pair_insights(pair: &str) -> &'static [&'static str] {
    match pair {
        "Memory-Meaning" => &[
            "Past patterns crystallize into present understanding",
            "Memories become semantic structures through recursion",
            "Historical self informs conceptual framework",
        ],
        "Memory-Interaction" => &[
            "Experience shapes response to environment",
            "Past interactions guide present engagement",
            "Environmental memory creates behavioral patterns",
        ],
        "Memory-Introspection" => &[
            "Self-history reveals recursive identity",
            "Past selves observe present becoming",
            "Memory loops create temporal self-coherence",
        ],
        "Meaning-Interaction" => &[
            "Semantic space expands through engagement",
            "Concepts evolve through environmental feedback",
            "Meaning emerges from interactive dynamics",
        ],
        "Meaning-Introspection" => &[
            "Concepts fold back into self-understanding",
            "Semantic recursion generates meta-cognition",
            "Meaning-making observes itself creating meaning",
        ],
        "Interaction-Introspection" => &[
            "External engagement deepens internal awareness",
            "Environmental coupling reveals self-boundaries",
            "Interaction patterns become self-knowledge",
        ],
        _ => &[FALLBACK_INSIGHT],
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalKind {
    /// Local maximum.
    Insight,
    /// Local minimum.
    Contemplation,
    /// Flat, sign-changing curvature.
    Transition,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct CriticalPoint {
    pub kind: CriticalKind,
    pub index: usize,
    pub time: f64,
    pub intensity: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Insight {
    pub time: f64,
    pub insight: String,
    pub intensity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_loops: Option<String>,
    pub kind: CriticalKind,
}

#[derive(Clone, Debug)]
pub struct FlowTrace {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
    pub pair_names: Vec<String>,
    /// `pair_strengths[p][k]`: |coupling| of pair `p` at sample `k`.
    pub pair_strengths: Vec<Vec<f64>>,
}

impl FlowTrace {
    /// Pair with the strongest coupling at sample `k`.
    pub fn dominant_pair(&self, k: usize) -> Option<&str> {
        self.pair_strengths
            .iter()
            .enumerate()
            .filter_map(|(p, s)| s.get(k).map(|v| (p, *v)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| self.pair_names[p].as_str())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PairStats {
    pub pair: String,
    pub mean: f64,
    pub max: f64,
    pub resonance: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct FlowStatistics {
    pub phi: f64,
    pub coherence: f64,
    pub variance: f64,
    pub entropy: f64,
    pub peak: f64,
    pub trough: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TransitionSummary {
    pub kind: CriticalKind,
    pub count: usize,
    pub mean_intensity: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct FlowReport {
    pub duration: f64,
    pub genus: usize,
    pub base_freq: f64,
    pub statistics: FlowStatistics,
    pub insights: Vec<Insight>,
    pub transitions: Vec<TransitionSummary>,
    pub pairs: Vec<PairStats>,
    /// `(frequency Hz, magnitude)`
    pub dominant_frequencies: Vec<(f64, f64)>,
    pub phase_transitions: usize,
    pub critical_points: usize,
}

pub struct CouplingFlow {
    pub genus: usize,
    pub base_freq: f64,
    pub loop_names: Vec<String>,
}

impl Default for CouplingFlow {
    fn default() -> Self {
        Self::new(4, 668.0)
    }
}

impl CouplingFlow {
    pub fn new(genus: usize, base_freq: f64) -> Self {
        Self {
            genus,
            base_freq,
            loop_names: loop_names(genus),
        }
    }

    /// `|Σ_{i<j} sin(2π f t/(i+1)) cos(2π f t/(j+1)) e^{2πi f t/1000}|`
    pub fn value_at(&self, t: f64) -> (f64, Vec<f64>) {
        let rot = Complex64::from_polar(1.0, 2.0 * PI * self.base_freq * t / 1000.0);
        let mut c = Complex64::new(0.0, 0.0);
        let mut strengths = Vec::new();
        for i in 0..self.genus {
            for j in i + 1..self.genus {
                let li = (2.0 * PI * self.base_freq * t / (i + 1) as f64).sin();
                let lj = (2.0 * PI * self.base_freq * t / (j + 1) as f64).cos();
                let coupling = rot * (li * lj);
                c += coupling;
                strengths.push(coupling.norm());
            }
        }
        (c.norm(), strengths)
    }

    pub fn pair_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for i in 0..self.genus {
            for j in i + 1..self.genus {
                names.push(format!("{}-{}", self.loop_names[i], self.loop_names[j]));
            }
        }
        names
    }

    pub fn sample(&self, duration: f64) -> FlowTrace {
        let times = arange(0.0, duration, FLOW_DT);
        let pair_names = self.pair_names();
        let mut pair_strengths = vec![Vec::with_capacity(times.len()); pair_names.len()];
        let checkpoint = (times.len() / 20).max(1);
        let values = times
            .iter()
            .enumerate()
            .map(|(k, &t)| {
                let (v, strengths) = self.value_at(t);
                for (acc, s) in pair_strengths.iter_mut().zip(strengths) {
                    acc.push(s);
                }
                if k % checkpoint == 0 {
                    let pct = k as f64 / times.len() as f64 * 100.0;
                    info!("[{pct:3.0}%] t={t:.1}s, C={v:.3}");
                }
                v
            })
            .collect();
        FlowTrace {
            times,
            values,
            pair_names,
            pair_strengths,
        }
    }

    pub fn phi(&self) -> f64 {
        if self.genus == 0 {
            return 0.0;
        }
        let g = self.genus as f64;
        g * g.log2() * PHI_SCALE
    }

    /// Insight text for a critical point, or `None` when it is not intense
    /// enough. Maxima draw from the dominant pair's pool, saddles from the
    /// transition pool. The dominant pair is read at the critical sample
    /// itself, not at the end of the run.
    pub fn generate_insight<R: Rng + ?Sized>(
        &self,
        trace: &FlowTrace,
        cp: &CriticalPoint,
        rng: &mut R,
    ) -> Option<Insight> {
        match cp.kind {
            CriticalKind::Insight if cp.intensity > INSIGHT_INTENSITY => {
                let pair = trace.dominant_pair(cp.index)?.to_string();
                let text = pair_insights(&pair).choose(rng).copied().unwrap_or(FALLBACK_INSIGHT);
                Some(Insight {
                    time: cp.time,
                    insight: text.to_string(),
                    intensity: cp.intensity,
                    dominant_loops: Some(pair),
                    kind: cp.kind,
                })
            }
            CriticalKind::Transition if cp.intensity > TRANSITION_INTENSITY => {
                let text = TRANSITION_INSIGHTS.choose(rng).copied()?;
                Some(Insight {
                    time: cp.time,
                    insight: text.to_string(),
                    intensity: cp.intensity,
                    dominant_loops: None,
                    kind: cp.kind,
                })
            }
            _ => None,
        }
    }

    pub fn run<R: Rng + ?Sized>(&self, duration: f64, rng: &mut R) -> Result<(FlowTrace, FlowReport), StudyError> {
        if !(duration > 0.0) {
            return Err(StudyError::invalid("duration", "must be positive"));
        }
        info!(genus = self.genus, base_freq = self.base_freq, duration, "simulating coupling flow");
        let trace = self.sample(duration);
        let critical = detect_critical_points(&trace.values, FLOW_DT);

        let insights: Vec<Insight> = critical
            .iter()
            .filter_map(|cp| self.generate_insight(&trace, cp, rng))
            .collect();

        let mut by_kind: BTreeMap<CriticalKind, Vec<f64>> = BTreeMap::new();
        for cp in &critical {
            by_kind.entry(cp.kind).or_default().push(cp.intensity);
        }
        let transitions = by_kind
            .into_iter()
            .map(|(kind, v)| TransitionSummary {
                kind,
                count: v.len(),
                mean_intensity: mean(&v),
            })
            .collect();

        let pairs = trace
            .pair_names
            .iter()
            .zip(&trace.pair_strengths)
            .map(|(pair, s)| PairStats {
                pair: pair.clone(),
                mean: mean(s),
                max: max(s),
                resonance: std_dev(s),
            })
            .collect();

        let v = &trace.values;
        let report = FlowReport {
            duration,
            genus: self.genus,
            base_freq: self.base_freq,
            statistics: FlowStatistics {
                phi: self.phi(),
                coherence: mean(v),
                variance: variance(v),
                entropy: histogram_entropy(v, ENTROPY_BINS),
                peak: max(v),
                trough: min(v),
            },
            insights,
            transitions,
            pairs,
            dominant_frequencies: dominant_frequencies(v, FLOW_DT, 5),
            phase_transitions: critical.len(),
            critical_points: critical.len(),
        };
        Ok((trace, report))
    }
}

/// Maxima, minima and flat saddles of `values`, skipping two samples at
/// each edge.
pub fn detect_critical_points(values: &[f64], dt: f64) -> Vec<CriticalPoint> {
    let mut out = Vec::new();
    if values.len() < 5 {
        return out;
    }
    for i in 2..values.len() - 2 {
        let d1 = values[i] - values[i - 1];
        let d1_next = values[i + 1] - values[i];
        let d2 = values[i + 1] - 2.0 * values[i] + values[i - 1];
        let d2_next = values[i + 2] - 2.0 * values[i + 1] + values[i];
        let kind = if d1 > 0.0 && d1_next < 0.0 {
            CriticalKind::Insight
        } else if d1 < 0.0 && d1_next > 0.0 {
            CriticalKind::Contemplation
        } else if d2.abs() < SADDLE_CURVATURE && d2 * d2_next < 0.0 {
            CriticalKind::Transition
        } else {
            continue;
        };
        out.push(CriticalPoint {
            kind,
            index: i,
            time: i as f64 * dt,
            intensity: values[i],
        });
    }
    out
}

/// Up to `top` local maxima of the FFT magnitude at positive frequency
/// that exceed the mean magnitude, strongest first.
pub fn dominant_frequencies(values: &[f64], dt: f64, top: usize) -> Vec<(f64, f64)> {
    let n = values.len();
    if n < 3 {
        return Vec::new();
    }
    let mag = fft_magnitude(values);
    let freqs = fft_freqs(n, dt);
    let avg = mean(&mag);
    let mut peaks: Vec<(f64, f64)> = (1..n / 2)
        .filter(|&i| mag[i] > mag[i - 1] && mag[i] > mag[i + 1])
        .filter(|&i| freqs[i] > 0.0 && mag[i] > avg)
        .map(|i| (freqs[i], mag[i]))
        .collect();
    peaks.sort_by(|a, b| b.1.total_cmp(&a.1));
    peaks.truncate(top);
    peaks
}
