//! study/quantum.rs: Superposition, collapse and stability toys centred on
//! the 667/668/669 ms triple.

use std::f64::consts::SQRT_2;

use serde::Serialize;
use statrs::function::erf::erf;

use crate::core::number::PHI;

pub const CENTER: f64 = 668.0;
pub const BODY_TEMPERATURE_K: f64 = 310.0;

const STATE_SIGMA: f64 = 0.5;
const COLLAPSE_UNCERTAINTY: f64 = 0.5;
const COLLAPSE_GAIN: f64 = 1.5;
const HBAR: f64 = 1.054_571_817e-34;
const K_B: f64 = 1.380_649e-23;

fn state(t: f64, mu: f64) -> f64 {
    (-(t - mu).powi(2) / (2.0 * STATE_SIGMA * STATE_SIGMA)).exp()
}

/// Golden-ratio weighted superposition of three narrow Gaussians, scaled
/// to unit L2 norm over the given samples.
pub fn superposition_state(t: &[f64]) -> Vec<f64> {
    let total = 1.0 / PHI + 1.0 + PHI;
    let w = [1.0 / PHI / total, 1.0 / total, PHI / total];
    let mut psi: Vec<f64> = t
        .iter()
        .map(|&ti| {
            w[0] * state(ti, CENTER - 1.0) + w[1] * state(ti, CENTER) + w[2] * state(ti, CENTER + 1.0)
        })
        .collect();
    let norm = psi.iter().map(|p| p * p).sum::<f64>().sqrt();
    if norm > 0.0 {
        psi.iter_mut().for_each(|p| *p /= norm);
    }
    psi
}

/// Normal CDF around 668 (σ = 0.5), boosted ×1.5 inside [667, 669] and
/// capped at one.
pub fn collapse_probability(measurement: f64) -> f64 {
    let p = 0.5 * (1.0 + erf((measurement - CENTER) / (COLLAPSE_UNCERTAINTY * SQRT_2)));
    if (CENTER - 1.0..=CENTER + 1.0).contains(&measurement) {
        (p * COLLAPSE_GAIN).min(1.0)
    } else {
        p
    }
}

/// `ħ / (k_B T)` scaled by 1e15.
pub fn decoherence_time(temperature_k: f64) -> f64 {
    HBAR / (K_B * temperature_k) * 1e15
}

/// `0.5 (x − 668)^4 − 2 (x − 668)^2`, shifted so its minimum over `x` is 0.
pub fn double_well(x: &[f64]) -> Vec<f64> {
    let v: Vec<f64> = x
        .iter()
        .map(|&xi| {
            let d = xi - CENTER;
            0.5 * d.powi(4) - 2.0 * d * d
        })
        .collect();
    let floor = v.iter().copied().fold(f64::INFINITY, f64::min);
    v.into_iter().map(|e| e - floor).collect()
}

pub fn stability(time_ms: f64, temperature_k: f64) -> f64 {
    (-(time_ms - CENTER).abs() / 2.0).exp() * (-(temperature_k - BODY_TEMPERATURE_K) / 50.0).exp()
}

/// Row-major stability grid, rows over `times`, columns over `temps`.
pub fn stability_map(temps: &[f64], times: &[f64]) -> Vec<Vec<f64>> {
    times
        .iter()
        .map(|&tm| temps.iter().map(|&tk| stability(tm, tk)).collect())
        .collect()
}

/// `e^(−2 · barrier)` for a barrier of `barrier_ms`.
pub fn tunnelling_probability(barrier_ms: f64) -> f64 {
    (-2.0 * barrier_ms).exp()
}

#[derive(Clone, Debug, Serialize)]
pub struct QuantumMetrics {
    pub decoherence_time: f64,
    pub delta_t_ms: f64,
    pub delta_e: f64,
    pub tunnelling_probability: f64,
}

pub fn quantum_metrics() -> QuantumMetrics {
    let delta_t_ms = 1.0;
    QuantumMetrics {
        decoherence_time: decoherence_time(BODY_TEMPERATURE_K),
        delta_t_ms,
        delta_e: 1.0 / delta_t_ms,
        tunnelling_probability: tunnelling_probability(CENTER - (CENTER - 1.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::util::linspace;
    use approx::assert_relative_eq;

    #[test]
    fn superposition_is_unit_norm_and_leans_to_669() {
        let t = linspace(665.0, 671.0, 1000);
        let psi = superposition_state(&t);
        let norm: f64 = psi.iter().map(|p| p * p).sum();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
        let (imax, _) = psi
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!(t[imax] > 668.5, "heaviest weight sits at 669, got {}", t[imax]);
    }

    #[test]
    fn collapse_probability_shape() {
        assert_relative_eq!(collapse_probability(668.0), 0.75, epsilon = 1e-12);
        assert_eq!(collapse_probability(669.0), 1.0);
        assert!(collapse_probability(665.0) < 1e-6);
        // Just outside the boosted zone the plain CDF applies.
        let p = collapse_probability(669.1);
        assert!(p < 1.0 && p > 0.99);
    }

    #[test]
    fn decoherence_at_body_temperature() {
        assert_relative_eq!(decoherence_time(310.0), 24.639_46, epsilon = 1e-4);
    }

    #[test]
    fn double_well_minima() {
        let x = linspace(665.0, 671.0, 601);
        let v = double_well(&x);
        let min = v.iter().copied().fold(f64::INFINITY, f64::min);
        assert_eq!(min, 0.0);
        // Minima at 668 ± √2, barrier of 2 at the centre.
        assert_relative_eq!(v[441], 0.0, epsilon = 1e-3);
        assert_relative_eq!(v[300], 2.0, epsilon = 1e-3);
    }

    #[test]
    fn stability_and_tunnelling() {
        assert_relative_eq!(stability(668.0, 310.0), 1.0);
        let map = stability_map(&[300.0, 310.0], &[667.0, 668.0, 669.0]);
        assert_eq!(map.len(), 3);
        assert_eq!(map[0].len(), 2);
        assert_relative_eq!(map[1][1], 1.0);
        assert_relative_eq!(quantum_metrics().tunnelling_probability, (-2.0f64).exp());
    }
}
