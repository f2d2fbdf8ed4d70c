//! Sine tone synthesis for the WAV outputs.

pub mod tone;
