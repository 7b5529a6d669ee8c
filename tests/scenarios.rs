//! End-to-end scenarios against the public `Vad` surface.

use vadcore::{Vad, VadError};

fn sine_frame(len: usize, sample_rate: u32, freq_hz: f64, amplitude: f64) -> Vec<i16> {
    (0..len)
        .map(|n| {
            let t = n as f64 / sample_rate as f64;
            (amplitude * (2.0 * std::f64::consts::PI * freq_hz * t).sin()) as i16
        })
        .collect()
}

#[test]
fn s1_silence_returns_false() {
    let mut vad = Vad::new();
    let frame = vec![0i16; 480];
    assert_eq!(vad.process(16000, &frame).unwrap(), false);
}

#[test]
fn s2_dc_offset_returns_false() {
    let mut vad = Vad::new();
    let frame = vec![1000i16; 480];
    // The high-pass filter removes DC; a constant input should never read as speech.
    for _ in 0..10 {
        assert_eq!(vad.process(16000, &frame).unwrap(), false);
    }
}

#[test]
fn s3_strong_tone_eventually_triggers_speech() {
    for mode in [0, 3] {
        let mut vad = Vad::new();
        vad.set_mode(mode).unwrap();
        let frame = sine_frame(480, 16000, 1000.0, 10000.0);

        let mut triggered = false;
        for _ in 0..10 {
            if vad.process(16000, &frame).unwrap() {
                triggered = true;
                break;
            }
        }
        assert!(triggered, "mode {mode} never flagged a loud 1 kHz tone as speech");
    }
}

#[test]
fn s4_hang_over_holds_speech_flag_briefly_after_the_tone_stops() {
    let mut vad = Vad::new();
    vad.set_mode(0).unwrap();

    let speech = sine_frame(240, 8000, 1000.0, 10000.0);
    let silence = vec![0i16; 240];

    for _ in 0..10 {
        vad.process(8000, &speech).unwrap();
    }

    let mut trailing_speech_flags = 0;
    let mut results = Vec::new();
    for _ in 0..10 {
        results.push(vad.process(8000, &silence).unwrap());
    }
    for &r in &results {
        if r {
            trailing_speech_flags += 1;
        } else {
            break;
        }
    }

    assert!(
        trailing_speech_flags <= 5,
        "hang-over held the speech flag for {trailing_speech_flags} silence frames, expected at most 5"
    );
    assert!(
        results.iter().rev().take(3).all(|&r| !r),
        "the tail of the silence run should have settled back to non-speech"
    );
}

#[test]
fn s5_more_aggressive_modes_flag_no_more_frames_than_gentler_ones() {
    let clip: Vec<Vec<i16>> = (0..40)
        .map(|i| {
            if i % 3 == 0 {
                sine_frame(240, 8000, 300.0, 600.0)
            } else {
                vec![0i16; 240]
            }
        })
        .collect();

    let mut counts = Vec::new();
    for mode in [0, 1, 2, 3] {
        let mut vad = Vad::new();
        vad.set_mode(mode).unwrap();
        let count = clip.iter().filter(|frame| vad.process(8000, frame).unwrap()).count();
        counts.push(count);
    }

    for pair in counts.windows(2) {
        assert!(
            pair[1] <= pair[0] + 2,
            "mode got more aggressive but flagged far more frames: {counts:?}"
        );
    }
}

#[test]
fn s6_invalid_args_are_reported_as_typed_errors() {
    let mut vad = Vad::new();
    let frame = vec![0i16; 441];
    assert_eq!(
        vad.process(44100, &frame),
        Err(VadError::UnsupportedRate { rate: 44100 })
    );
    assert_eq!(vad.set_mode(4), Err(VadError::InvalidMode { mode: 4 }));
}
