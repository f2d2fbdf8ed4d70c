pub mod audio;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod plot;
pub mod study;
pub mod synth;

pub use error::StudyError;
