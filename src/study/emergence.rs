//! study/emergence.rs: Number-theoretic and geometric curiosities around 668.

use std::f64::consts::PI;

use serde::Serialize;

use crate::core::number::{
    FibonacciBracket, PERFECT_NUMBERS, PHI, RadixForms, bit_entropy, fibonacci_bracket,
    format_factorization, golden_division, is_prime, prime_factors, radix_forms,
    triangular_root,
};
use crate::core::stats::trapezoid;
use crate::core::util::linspace;

pub const CENTER: f64 = 668.0;
const EMERGENCE_SIGMA: f64 = 1.0;
const PI_DIVISOR: f64 = 212.7;

fn gaussian(t: f64, mu: f64) -> f64 {
    (-(t - mu).powi(2) / (2.0 * EMERGENCE_SIGMA * EMERGENCE_SIGMA)).exp()
}

/// Three unit Gaussians at 667, 668 and 669 plus an interference term
/// between the outer two, normalised so that ∫ψ² dt = 1 over `t`
/// (trapezoid rule). Fewer than two samples are returned unnormalised.
pub fn emergence_function(t: &[f64]) -> Vec<f64> {
    let mut psi: Vec<f64> = t
        .iter()
        .map(|&ti| {
            let p667 = gaussian(ti, CENTER - 1.0);
            let p668 = gaussian(ti, CENTER);
            let p669 = gaussian(ti, CENTER + 1.0);
            let interference = 2.0 * (p667 * p669).sqrt() * (2.0 * PI * (ti - CENTER)).cos();
            p667 + p668 + p669 + interference
        })
        .collect();
    if t.len() > 1 {
        let sq: Vec<f64> = psi.iter().map(|p| p * p).collect();
        let norm = trapezoid(&sq, t).sqrt();
        if norm > 0.0 {
            psi.iter_mut().for_each(|p| *p /= norm);
        }
    }
    psi
}

/// Logarithmic spiral `r = 668 · φ^(θ / 2π)` over two turns.
pub fn golden_spiral(n_points: usize) -> Vec<(f64, f64)> {
    linspace(0.0, 4.0 * PI, n_points)
        .into_iter()
        .map(|theta| {
            let r = CENTER * PHI.powf(theta / (2.0 * PI));
            (r * theta.cos(), r * theta.sin())
        })
        .collect()
}

/// `668 / n` for n = 1..=count.
pub fn harmonic_series(count: u32) -> Vec<(u32, f64)> {
    (1..=count).map(|n| (n, CENTER / n as f64)).collect()
}

/// Radial phase field `(100 · |(x − 6.68, y)|) mod 668` on a square grid
/// spanning [-10, 10]². Row-major, `grid × grid`.
#[derive(Clone, Debug)]
pub struct PhaseField {
    pub axis: Vec<f64>,
    pub values: Vec<f64>,
}

impl PhaseField {
    pub fn new(grid: usize) -> Self {
        let axis = linspace(-10.0, 10.0, grid);
        let values = axis
            .iter()
            .flat_map(|&y| {
                axis.iter().map(move |&x| {
                    let r = ((x - CENTER / 100.0).powi(2) + y * y).sqrt() * 100.0;
                    r.rem_euclid(CENTER)
                })
            })
            .collect();
        Self { axis, values }
    }

    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.axis.len() + col]
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Factorization {
    pub n: u64,
    pub factors: Vec<u64>,
    pub rendered: String,
    pub product: u64,
    pub largest_is_prime: bool,
}

pub fn factorization(n: u64) -> Factorization {
    let factors = prime_factors(n);
    let product = factors.iter().product();
    let largest_is_prime = factors.last().is_some_and(|&p| is_prime(p));
    Factorization {
        n,
        rendered: format_factorization(&factors),
        factors,
        product,
        largest_is_prime,
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Curiosities {
    /// `(p, 668 / p)` for perfect numbers below 668.
    pub perfect_ratios: Vec<(u64, f64)>,
    pub triangular_root: f64,
    pub pi_estimate: f64,
    pub ln: f64,
}

pub fn curiosities() -> Curiosities {
    Curiosities {
        perfect_ratios: PERFECT_NUMBERS
            .iter()
            .filter(|&&p| (p as f64) < CENTER)
            .map(|&p| (p, CENTER / p as f64))
            .collect(),
        triangular_root: triangular_root(CENTER),
        pi_estimate: CENTER / PI_DIVISOR,
        ln: CENTER.ln(),
    }
}

/// Everything the narrative report prints.
#[derive(Clone, Debug, Serialize)]
pub struct EmergenceFacts {
    pub fibonacci: Option<FibonacciBracket>,
    pub golden_lower: f64,
    pub golden_upper: f64,
    pub factorization: Factorization,
    pub radix: RadixForms,
    pub bit_entropy: f64,
    pub curiosities: Curiosities,
}

pub fn emergence_facts() -> EmergenceFacts {
    let n = CENTER as u64;
    let (golden_lower, golden_upper) = golden_division(CENTER);
    EmergenceFacts {
        fibonacci: fibonacci_bracket(n),
        golden_lower,
        golden_upper,
        factorization: factorization(n),
        radix: radix_forms(n),
        bit_entropy: bit_entropy(n),
        curiosities: curiosities(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn emergence_function_is_normalised_and_peaks_at_center() {
        let t = linspace(664.0, 672.0, 1000);
        let psi = emergence_function(&t);
        let sq: Vec<f64> = psi.iter().map(|p| p * p).collect();
        assert_relative_eq!(trapezoid(&sq, &t), 1.0, epsilon = 1e-9);
        let (imax, _) = sq
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!((t[imax] - 668.0).abs() < 0.05, "peak at {}", t[imax]);
    }

    #[test]
    fn single_sample_is_not_normalised() {
        let psi = emergence_function(&[668.0]);
        // 2e^{-1/2} + 1 + 2e^{-1/2}
        assert_relative_eq!(psi[0], 1.0 + 4.0 * (-0.5f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn spiral_grows_by_phi_per_turn() {
        let pts = golden_spiral(3);
        let r = |(x, y): (f64, f64)| (x * x + y * y).sqrt();
        assert_relative_eq!(r(pts[0]), 668.0, epsilon = 1e-9);
        assert_relative_eq!(r(pts[1]), 668.0 * PHI, epsilon = 1e-9);
        assert_relative_eq!(r(pts[2]), 668.0 * PHI * PHI, epsilon = 1e-9);
    }

    #[test]
    fn phase_field_wraps_at_668() {
        let f = PhaseField::new(100);
        assert_eq!(f.values.len(), 10_000);
        assert!(f.values.iter().all(|&v| (0.0..668.0).contains(&v)));
        // Corner (-10, -10): r = 100·sqrt(16.68² + 10²) ≈ 1944.8 → 608.8
        assert_relative_eq!(f.at(0, 0), 1944.79 - 2.0 * 668.0, epsilon = 0.05);
    }

    #[test]
    fn facts_about_668() {
        let facts = emergence_facts();
        assert_eq!(facts.factorization.rendered, "2² × 167");
        assert_eq!(facts.factorization.product, 668);
        assert!(facts.factorization.largest_is_prime);
        assert_eq!(facts.fibonacci.unwrap().lower, 610);
        assert_eq!(facts.radix.hex, "29c");
        let c = &facts.curiosities;
        assert_eq!(c.perfect_ratios.len(), 3);
        assert_relative_eq!(c.perfect_ratios[0].1, 111.3333, epsilon = 1e-4);
        assert_relative_eq!(c.pi_estimate, 3.140573, epsilon = 1e-6);
        assert_relative_eq!(c.ln, 6.504288, epsilon = 1e-6);
        assert_eq!(harmonic_series(20).len(), 20);
    }
}
