//! Simulated studies around the 668 Hz fundamental.

pub mod emergence;
pub mod equation;
pub mod flow;
pub mod harmonics;
pub mod hrv;
pub mod meg;
pub mod quantum;
pub mod rivalry;
pub mod tolerance;
pub mod torus;
