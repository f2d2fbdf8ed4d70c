//! study/tolerance.rs: Emergence potential as a function of the deviation
//! from an ideal value.

use serde::Serialize;

use crate::core::util::arange;

pub const IDEAL: f64 = 668.0;

/// Zero at exact agreement, one within a unit deviation, then two
/// exponential tails.
pub fn emergence_potential(value: f64, ideal: f64) -> f64 {
    let d = (value - ideal).abs();
    if d == 0.0 {
        0.0
    } else if d <= 1.0 {
        1.0
    } else if d <= 5.0 {
        (-d / 2.0).exp()
    } else {
        0.5 * (-d / 5.0).exp()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ToleranceScan {
    pub values: Vec<f64>,
    pub potentials: Vec<f64>,
}

/// Potential over `[start, stop)` in steps of `step`.
pub fn scan(start: f64, stop: f64, step: f64) -> ToleranceScan {
    let values = arange(start, stop, step);
    let potentials = values.iter().map(|&v| emergence_potential(v, IDEAL)).collect();
    ToleranceScan { values, potentials }
}

/// The default 665–671 ms scan at 0.1 ms resolution.
pub fn boundary_scan() -> ToleranceScan {
    scan(665.0, 671.0, 0.1)
}
