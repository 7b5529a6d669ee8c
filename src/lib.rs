//! Fixed-point voice activity detection.
//!
//! [`Vad`] reduces a frame of 16-bit PCM audio, sampled at 8/16/32/48 kHz,
//! to a single speech/non-speech decision, using a bank of six sub-band
//! Gaussian mixture models and a likelihood-ratio test. Everything here
//! runs in integer arithmetic — no floating point, no heap allocation in
//! the steady state beyond what the resampling stages need per call.

pub mod engine;
pub mod error;
pub mod filterbank;
pub mod fixed_math;
pub mod gaussian;
pub mod gmm;
pub mod min_tracker;
pub mod resample;

pub use engine::Vad;
pub use error::VadError;
