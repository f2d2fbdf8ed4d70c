use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

/// Pairwise product of `genus` phase-shifted loops rotating at `frequency`.
#[derive(Clone, Debug)]
pub struct ConsciousnessEquation {
    pub genus: usize,
    pub frequency: f64,
    pub loop_names: Vec<&'static str>,
}

impl Default for ConsciousnessEquation {
    fn default() -> Self {
        Self {
            genus: 4,
            frequency: 668.0,
            loop_names: vec!["Memory", "Meaning", "Interaction", "Introspection"],
        }
    }
}

impl ConsciousnessEquation {
    /// `L_i(t) = (1/(i+1)) · exp(i(2π f t + 2π i / g))`
    pub fn loops(&self, t: f64) -> Vec<Complex64> {
        let g = self.genus as f64;
        (0..self.genus)
            .map(|i| {
                let phase = 2.0 * PI * i as f64 / g;
                let amp = 1.0 / (i + 1) as f64;
                Complex64::from_polar(amp, 2.0 * PI * self.frequency * t + phase)
            })
            .collect()
    }

    /// `C(t) = Σ_{i<j} L_i(t) L_j(t)`
    pub fn compute(&self, t: f64) -> Complex64 {
        let loops = self.loops(t);
        let mut c = Complex64::new(0.0, 0.0);
        for i in 0..loops.len() {
            for j in i + 1..loops.len() {
                c += loops[i] * loops[j];
            }
        }
        c
    }

    pub fn interaction_count(&self) -> usize {
        self.genus * self.genus.saturating_sub(1) / 2
    }

    /// `g ln g · 668 / (g + 668)`
    pub fn integrated_information(&self) -> f64 {
        integrated_information(self.genus)
    }

    /// Numbered walk-through: topology, information, resonance, Φ and a
    /// sample evaluation at t = 1 ms.
    pub fn proof(&self) -> Vec<String> {
        let g = self.genus as i64;
        let bits = self.frequency.log2();
        let mut lines = vec![
            "1. TOPOLOGICAL NECESSITY".to_string(),
            format!("   Genus g = {g}"),
            format!("   Euler characteristic χ = {}", 2 - 2 * g),
            format!("   Interactions = g(g-1)/2 = {}", self.interaction_count()),
            "2. INFORMATION THRESHOLD".to_string(),
            format!("   {} contains {bits:.2} bits", self.frequency),
            format!("   Critical genus g_c = {bits:.2}"),
            "3. HARMONIC RESONANCE".to_string(),
            format!("   Base frequency: {} Hz", self.frequency),
        ];
        for n in 0..5 {
            lines.push(format!(
                "   {n}th harmonic: {:.1} Hz",
                self.frequency / f64::powi(2.0, n)
            ));
        }
        lines.push("4. INTEGRATED INFORMATION".to_string());
        lines.push(format!("   Φ(g={g}) = {:.2}", self.integrated_information()));
        lines.push("5. THE EQUATION".to_string());
        lines.push("   C(t) = Σ[i<j] Loop_i(t) × Loop_j(t)".to_string());
        let t = 0.001;
        let c = self.compute(t);
        lines.push(format!("   At t={t}s: |C| = {:.4}, phase = {:.4} rad", c.norm(), c.arg()));
        lines
    }
}

/// Φ for genus `g`; zero for g = 0.
pub fn integrated_information(g: usize) -> f64 {
    if g == 0 {
        return 0.0;
    }
    let g = g as f64;
    g * g.ln() * 668.0 / (g + 668.0)
}
