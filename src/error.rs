//! Typed error surface for the VAD engine.
//!
//! The original C API reports every failure as a single `-1`; a reusable
//! Rust library gives callers something they can match on instead.

/// Failure modes reachable through the public `Vad` API.
///
/// `OutOfMemory` and `NotInitialized` from the source's error taxonomy have
/// no Rust counterpart: `Vad::new` never allocates on the heap and always
/// returns an initialized instance, so neither state is constructible.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum VadError {
    #[error("unsupported sample rate {rate} Hz")]
    UnsupportedRate { rate: u32 },

    #[error("frame length {length} is not a valid 10/20/30 ms block for {rate} Hz")]
    UnsupportedRateOrLength { rate: u32, length: usize },

    #[error("aggressiveness mode {mode} is out of range 0..=3")]
    InvalidMode { mode: i32 },
}
