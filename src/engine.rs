//! The public engine: validates sample rate / frame length, dispatches to
//! the right downsampling chain for the input rate, and folds the result
//! into a single per-frame voice-activity decision.

use crate::error::VadError;
use crate::filterbank::Filterbank;
use crate::gmm::GmmDecision;
use crate::resample::{downsample_by_2, resample_48khz_to_8khz_block, State48To8};

const VALID_RATES: [u32; 4] = [8000, 16000, 32000, 48000];
const MAX_FRAME_LENGTH_MS: usize = 30;

fn validate_rate_and_length(rate: u32, length: usize) -> Result<(), VadError> {
    if !VALID_RATES.contains(&rate) {
        return Err(VadError::UnsupportedRate { rate });
    }

    let mut ms = 10;
    while ms <= MAX_FRAME_LENGTH_MS {
        if length == (rate as usize / 1000) * ms {
            return Ok(());
        }
        ms += 10;
    }

    Err(VadError::UnsupportedRateOrLength { rate, length })
}

/// A fixed-point, stateful voice activity detector.
///
/// One instance processes a single continuous stream at a fixed sample
/// rate; feed it consecutive, non-overlapping 10/20/30 ms frames via
/// [`Vad::process`]. Cloning is intentionally not provided — the model
/// state this struct owns is specific to the audio it has already seen.
pub struct Vad {
    filterbank: Filterbank,
    gmm: GmmDecision,
    downsampling_filter_states: [i32; 4],
    state_48_to_8: State48To8,
}

impl Default for Vad {
    fn default() -> Self {
        Self::new()
    }
}

impl Vad {
    /// Creates a detector at the default aggressiveness mode (0, "quality").
    /// Unlike the reference API this never fails: there is no separate
    /// allocate-then-initialize step, and no heap allocation to fail on.
    pub fn new() -> Self {
        Self {
            filterbank: Filterbank::new(),
            gmm: GmmDecision::new(0),
            downsampling_filter_states: [0; 4],
            state_48_to_8: State48To8::default(),
        }
    }

    /// Changes the aggressiveness mode (0 = quality .. 3 = very aggressive,
    /// trading missed speech against false positives on noise). Only the
    /// decision thresholds change; the adaptive noise/speech model and
    /// resampler state carry on unaffected.
    pub fn set_mode(&mut self, mode: i32) -> Result<(), VadError> {
        if !(0..=3).contains(&mode) {
            return Err(VadError::InvalidMode { mode });
        }
        self.gmm.set_mode(mode);
        Ok(())
    }

    /// Processes one frame and returns `true` if it was classified as
    /// speech (including frames kept as speech by the hang-over window
    /// after a recent burst of genuine speech frames).
    ///
    /// `frame` must be a 10, 20 or 30 ms block at `sample_rate`, one of
    /// 8000 / 16000 / 32000 / 48000 Hz.
    pub fn process(&mut self, sample_rate: u32, frame: &[i16]) -> Result<bool, VadError> {
        validate_rate_and_length(sample_rate, frame.len())?;

        let vad = match sample_rate {
            8000 => self.calc_vad_8khz(frame),
            16000 => self.calc_vad_16khz(frame),
            32000 => self.calc_vad_32khz(frame),
            48000 => self.calc_vad_48khz(frame),
            _ => unreachable!("validate_rate_and_length rejects every other rate"),
        };

        Ok(vad > 0)
    }

    fn calc_vad_8khz(&mut self, frame: &[i16]) -> u8 {
        let (features, total_energy) = self.filterbank.analyze(frame);
        self.gmm.decide(features, total_energy, frame.len())
    }

    fn calc_vad_16khz(&mut self, frame: &[i16]) -> u8 {
        let mut state = [self.downsampling_filter_states[0], self.downsampling_filter_states[1]];
        let speech_nb = downsample_by_2(frame, &mut state);
        self.downsampling_filter_states[0] = state[0];
        self.downsampling_filter_states[1] = state[1];
        self.calc_vad_8khz(&speech_nb)
    }

    fn calc_vad_32khz(&mut self, frame: &[i16]) -> u8 {
        let mut state_hi = [self.downsampling_filter_states[2], self.downsampling_filter_states[3]];
        let speech_wb = downsample_by_2(frame, &mut state_hi);
        self.downsampling_filter_states[2] = state_hi[0];
        self.downsampling_filter_states[3] = state_hi[1];

        let mut state_lo = [self.downsampling_filter_states[0], self.downsampling_filter_states[1]];
        let speech_nb = downsample_by_2(&speech_wb, &mut state_lo);
        self.downsampling_filter_states[0] = state_lo[0];
        self.downsampling_filter_states[1] = state_lo[1];

        self.calc_vad_8khz(&speech_nb)
    }

    fn calc_vad_48khz(&mut self, frame: &[i16]) -> u8 {
        let num_10ms_frames = frame.len() / 480;
        let mut speech_nb = Vec::with_capacity(num_10ms_frames * 80);

        for chunk in frame.chunks_exact(480) {
            let block: [i16; 480] = chunk.try_into().expect("chunks_exact(480) yields 480-sample slices");
            speech_nb.extend_from_slice(&resample_48khz_to_8khz_block(&block, &mut self.state_48_to_8));
        }

        self.calc_vad_8khz(&speech_nb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_sample_rate() {
        let mut vad = Vad::new();
        let frame = vec![0i16; 160];
        assert_eq!(vad.process(44100, &frame), Err(VadError::UnsupportedRate { rate: 44100 }));
    }

    #[test]
    fn rejects_mismatched_frame_length() {
        let mut vad = Vad::new();
        let frame = vec![0i16; 100];
        assert_eq!(
            vad.process(8000, &frame),
            Err(VadError::UnsupportedRateOrLength { rate: 8000, length: 100 })
        );
    }

    #[test]
    fn rejects_out_of_range_mode() {
        let mut vad = Vad::new();
        assert_eq!(vad.set_mode(4), Err(VadError::InvalidMode { mode: 4 }));
        assert_eq!(vad.set_mode(-1), Err(VadError::InvalidMode { mode: -1 }));
        assert!(vad.set_mode(3).is_ok());
    }

    #[test]
    fn accepts_every_valid_rate_and_frame_length() {
        for &rate in &VALID_RATES {
            for ms in [10usize, 20, 30] {
                let mut vad = Vad::new();
                let frame = vec![0i16; (rate as usize / 1000) * ms];
                assert!(vad.process(rate, &frame).is_ok(), "{rate} Hz / {ms} ms should be valid");
            }
        }
    }

    #[test]
    fn silence_is_never_classified_as_speech() {
        let mut vad = Vad::new();
        let frame = vec![0i16; 160];
        for _ in 0..20 {
            assert_eq!(vad.process(16000, &frame).unwrap(), false);
        }
    }
}
