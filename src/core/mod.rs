pub mod fft;
pub mod noise;
pub mod number;
pub mod stats;
pub mod util;
