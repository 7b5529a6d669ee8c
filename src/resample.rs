//! Factor-of-two allpass resamplers and the multirate downsampling chains
//! built from them.
//!
//! Every frame coming in at 16/32/48 kHz is reduced to 8 kHz before the
//! filterbank ever sees it; the allpass lattices here carry state across
//! calls, so unlike [`crate::fixed_math`] these functions are stateful and
//! the caller must thread the same state array through consecutive frames.

use crate::fixed_math::sat_w32_to_w16;

/// Three-tap allpass coefficients, Q13, shared by every factor-of-two stage.
/// Row 0 filters odd-indexed samples, row 1 filters even-indexed samples.
const RESAMPLE_ALLPASS: [[i32; 3]; 2] = [[821, 6110, 12382], [3050, 9368, 15063]];

/// Coefficients for the 3:2 fractional FIR used inside the 48 kHz chain
/// (reused here for the 24 kHz -> 16 kHz stage, the same ratio).
const COEFFICIENTS_3_TO_2: [[i32; 8]; 2] = [
    [778, -2050, 1087, 23285, 12903, -3783, 441, 222],
    [222, 441, -3783, 12903, 23285, 1087, -2050, 778],
];

/// Single-stage allpass coefficients (Q13) used by [`downsample_by_2`], the
/// simpler decimator used directly in the 16 kHz and 32 kHz paths.
const SINGLE_STAGE_ALLPASS: [i32; 2] = [5243, 1392];

/// One first-order allpass section: `y = s_in + coeff*round_or_trunc(x -
/// s_out)`, then `s_in, s_out <- x, y`. Every three-stage cascade below
/// chains three of these with `s_out` of stage `k` doubling as `s_in` of
/// stage `k+1` (see [`allpass_cascade`]), which is why the state words are
/// threaded one at a time rather than passed as a clean 3-tuple of delays.
#[inline]
fn allpass_section(x: i32, s_in: i32, s_out: i32, coeff: i32, rounding: bool) -> i32 {
    let mut diff = x - s_out;
    if rounding {
        diff = (diff + (1 << 13)) >> 14;
    } else {
        diff >>= 14;
        if diff < 0 {
            diff += 1;
        }
    }
    s_in + diff * coeff
}

/// Three-stage allpass cascade applied to one branch (even or odd samples).
/// `state[0]` is stage 0's `s_in`; `state[1..=3]` each double as one stage's
/// `s_out` and the next stage's `s_in`, updated only after both stages that
/// read the old value have done so — matching the source's in-place reuse
/// of a 4-word array for a 3-section lattice.
fn allpass_cascade(x: i32, state: &mut [i32; 4], row: usize) -> i32 {
    let coeffs = RESAMPLE_ALLPASS[row];

    let y0 = allpass_section(x, state[0], state[1], coeffs[0], true);
    state[0] = x;

    let y1 = allpass_section(y0, state[1], state[2], coeffs[1], false);
    state[1] = y0;

    let y2 = allpass_section(y1, state[2], state[3], coeffs[2], false);
    state[2] = y1;
    state[3] = y2;

    y2
}

/// Decimator: `int32` input (already pre-scaled) to saturated `int16`
/// output, halving the sample count. `state` has length 8: `[0..4)` for the
/// even-sample branch, `[4..8)` for the odd-sample branch.
pub fn down_by_2_int_to_short(input: &[i32], state: &mut [i32; 8]) -> Vec<i16> {
    let half = input.len() / 2;
    let mut lower = [state[0], state[1], state[2], state[3]];
    let mut upper = [state[4], state[5], state[6], state[7]];
    let mut combined = vec![0i32; half];

    for i in 0..half {
        combined[i] = allpass_cascade(input[i << 1], &mut lower, 1) >> 1;
    }
    for i in 0..half {
        combined[i] += allpass_cascade(input[(i << 1) + 1], &mut upper, 0) >> 1;
    }

    state[0..4].copy_from_slice(&lower);
    state[4..8].copy_from_slice(&upper);

    combined
        .into_iter()
        .map(|v| sat_w32_to_w16(v >> 15))
        .collect()
}

/// Decimator: `int16` input to `int32` output (pre-scaled, un-saturated),
/// halving the sample count.
pub fn down_by_2_short_to_int(input: &[i16], state: &mut [i32; 8]) -> Vec<i32> {
    let half = input.len() / 2;
    let mut lower = [state[0], state[1], state[2], state[3]];
    let mut upper = [state[4], state[5], state[6], state[7]];
    let mut out = vec![0i32; half];

    for i in 0..half {
        let x = ((input[i << 1] as i32) << 15) + (1 << 14);
        out[i] = allpass_cascade(x, &mut lower, 1) >> 1;
    }
    for i in 0..half {
        let x = ((input[(i << 1) + 1] as i32) << 15) + (1 << 14);
        out[i] += allpass_cascade(x, &mut upper, 0) >> 1;
    }

    state[0..4].copy_from_slice(&lower);
    state[4..8].copy_from_slice(&upper);
    out
}

/// Lowpass-by-2: halves bandwidth but keeps both the sample rate and the
/// `int32` dynamic range (no decimation, no short-to-int rescale), built
/// from four interleaved polyphase branches. `state` has length 16, four
/// 4-word allpass branches.
///
/// The even- and odd-output paths each sum a "direct" branch and a
/// "one-sample-delayed" branch. The delay for the odd-output path is free
/// (it reads the even input one index behind); the delay for the
/// even-output path has nothing to read from inside this call, so it is
/// smuggled across calls through branch 3's own `s_in` memory — whatever
/// odd input branch 3 last saw becomes this call's delayed seed before
/// branch 3 is overwritten with this call's odd inputs.
pub fn lp_by_2_int_to_int(input: &[i32], state: &mut [i32; 16]) -> Vec<i32> {
    let half = input.len() / 2;
    let mut branch = [
        [state[0], state[1], state[2], state[3]],
        [state[4], state[5], state[6], state[7]],
        [state[8], state[9], state[10], state[11]],
        [state[12], state[13], state[14], state[15]],
    ];
    let mut out = vec![0i32; input.len()];

    // Even outputs: branch 0 carries the delayed odd input, branch 1 the
    // direct even input.
    let mut delayed_odd = branch[3][0];
    for i in 0..half {
        out[i << 1] = allpass_cascade(delayed_odd, &mut branch[0], 1) >> 1;
        delayed_odd = input[(i << 1) + 1];
    }
    for i in 0..half {
        let even = allpass_cascade(input[i << 1], &mut branch[1], 0) >> 1;
        out[i << 1] = (out[i << 1] + even) >> 15;
    }

    // Odd outputs: branch 2 carries the direct odd input, branch 3 the
    // even input (which also seeds the next call's `delayed_odd` above).
    for i in 0..half {
        out[(i << 1) + 1] = allpass_cascade(input[(i << 1) + 1], &mut branch[2], 1) >> 1;
    }
    for i in 0..half {
        let odd = allpass_cascade(input[i << 1], &mut branch[3], 0) >> 1;
        out[(i << 1) + 1] = (out[(i << 1) + 1] + odd) >> 15;
    }

    for (dst, src) in state.chunks_mut(4).zip(branch.iter()) {
        dst.copy_from_slice(src);
    }
    out
}

/// 3:2 fractional FIR resample. `input` must hold `3*k + 8` samples: the
/// first 8 are history carried from the previous call, prepended so the
/// 8-tap filter has lookahead for the final block.
pub fn resample_3to2(input: &[i32], k: usize) -> Vec<i32> {
    let mut out = Vec::with_capacity(2 * k);
    for m in 0..k {
        let base = m * 3;
        let mut acc0 = 1i32 << 14;
        let mut acc1 = 1i32 << 14;
        for t in 0..8 {
            acc0 += COEFFICIENTS_3_TO_2[0][t] * input[base + t];
            acc1 += COEFFICIENTS_3_TO_2[1][t] * input[base + 1 + t];
        }
        out.push(acc0);
        out.push(acc1);
    }
    out
}

/// Single-stage allpass decimator used directly by the 16 kHz and 32 kHz
/// paths (as opposed to the three-stage cascade the 48 kHz chain needs).
pub fn downsample_by_2(input: &[i16], state: &mut [i32; 2]) -> Vec<i16> {
    let half = input.len() / 2;
    let mut out = vec![0i16; half];
    let mut upper = state[0];
    let mut lower = state[1];

    for n in 0..half {
        let x0 = input[2 * n] as i32;
        let x1 = input[2 * n + 1] as i32;

        let upper_out = ((upper >> 1) + ((SINGLE_STAGE_ALLPASS[0] * x0) >> 14)) as i16;
        upper = x0 - ((SINGLE_STAGE_ALLPASS[0] * upper_out as i32) >> 12);

        let lower_out = ((lower >> 1) + ((SINGLE_STAGE_ALLPASS[1] * x1) >> 14)) as i16;
        lower = x1 - ((SINGLE_STAGE_ALLPASS[1] * lower_out as i32) >> 12);

        out[n] = upper_out.wrapping_add(lower_out);
    }

    state[0] = upper;
    state[1] = lower;
    out
}

/// Filter state for the full 48 kHz -> 8 kHz chain (40 `i32` words total,
/// per §3's `state_48_to_8`).
#[derive(Debug, Clone, Copy)]
pub struct State48To8 {
    s_48_24: [i32; 8],
    s_24_24: [i32; 16],
    history_24_to_16: [i32; 8],
    s_16_8: [i32; 8],
}

impl Default for State48To8 {
    fn default() -> Self {
        Self {
            s_48_24: [0; 8],
            s_24_24: [0; 16],
            history_24_to_16: [0; 8],
            s_16_8: [0; 8],
        }
    }
}

/// 48 kHz -> 8 kHz, one 10 ms (480-sample) block at a time. The only path
/// that divides its decision frame length by 6 rather than by 2 per stage
/// (§9, "Open questions" — treated as canonical).
pub fn resample_48khz_to_8khz_block(input: &[i16; 480], state: &mut State48To8) -> [i16; 80] {
    let stage1 = down_by_2_short_to_int(input, &mut state.s_48_24); // 240
    let stage2 = lp_by_2_int_to_int(&stage1, &mut state.s_24_24); // 240

    let mut with_history = Vec::with_capacity(8 + stage2.len());
    with_history.extend_from_slice(&state.history_24_to_16);
    with_history.extend_from_slice(&stage2);
    state
        .history_24_to_16
        .copy_from_slice(&stage2[stage2.len() - 8..]);

    let stage3 = resample_3to2(&with_history, 80); // 160
    let stage4 = down_by_2_int_to_short(&stage3, &mut state.s_16_8); // 80

    let mut out = [0i16; 80];
    out.copy_from_slice(&stage4);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn down_by_2_halves_length() {
        let mut state = [0i32; 8];
        let input: Vec<i16> = (0..160).map(|i| (i % 100) as i16).collect();
        let out = down_by_2_short_to_int(&input, &mut state);
        assert_eq!(out.len(), 80);
    }

    #[test]
    fn downsample_by_2_halves_length_and_is_stateful() {
        let mut state = [0i32; 2];
        let input = vec![1000i16; 320];
        let out = downsample_by_2(&input, &mut state);
        assert_eq!(out.len(), 160);
        assert_ne!(state, [0, 0], "filter state should evolve from a nonzero input");
    }

    #[test]
    fn lp_by_2_preserves_length() {
        let mut state = [0i32; 16];
        let input: Vec<i32> = (0..240).map(|i| (i * 37) % 1000).collect();
        let out = lp_by_2_int_to_int(&input, &mut state);
        assert_eq!(out.len(), 240);
    }

    #[test]
    fn resample_48khz_block_produces_80_samples() {
        let mut state = State48To8::default();
        let input = [0i16; 480];
        let out = resample_48khz_to_8khz_block(&input, &mut state);
        assert_eq!(out.len(), 80);
        // Silence in must stay silence (or near-silence) out once warmed up.
        for _ in 0..5 {
            let out = resample_48khz_to_8khz_block(&input, &mut state);
            assert!(out.iter().all(|&s| s.abs() < 10));
        }
    }
}
