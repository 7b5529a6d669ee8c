//! Per-channel running minimum tracker: keeps the 16 smallest feature
//! values seen in roughly the last 100 frames and smooths their median
//! into a long-term noise floor estimate.
//!
//! The source locates the insertion position with a hand-unrolled binary
//! decision tree over the 16 slots; a linear scan is clearer in Rust and
//! touches the same data in the same order, so it produces the identical
//! position for every input.

const NUM_SLOTS: usize = 16;
const MAX_AGE: i16 = 100;
const SMOOTHING_DOWN: i16 = 6553; // 0.2, Q15
const SMOOTHING_UP: i16 = 32439; // 0.99, Q15

/// One channel's 16 smallest-value slots plus their ages and the smoothed
/// mean derived from their median.
#[derive(Debug, Clone, Copy)]
pub struct MinTracker {
    values: [i16; NUM_SLOTS],
    ages: [i16; NUM_SLOTS],
    mean_value: i16,
}

impl Default for MinTracker {
    fn default() -> Self {
        Self {
            values: [10_000; NUM_SLOTS],
            ages: [101; NUM_SLOTS],
            mean_value: 1600,
        }
    }
}

impl MinTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ages every slot by one frame, evicting (and shifting down) any slot
    /// that has reached [`MAX_AGE`].
    fn age_slots(&mut self) {
        for i in 0..NUM_SLOTS {
            if self.ages[i] != MAX_AGE {
                self.ages[i] += 1;
            } else {
                for j in i..NUM_SLOTS - 1 {
                    self.values[j] = self.values[j + 1];
                    self.ages[j] = self.ages[j + 1];
                }
                self.ages[NUM_SLOTS - 1] = 101;
                self.values[NUM_SLOTS - 1] = 10_000;
            }
        }
    }

    /// Feeds one frame's feature value (Q4) for this channel, returning the
    /// updated smoothed mean (the long-term noise-floor estimate for this
    /// band) in the same Q4 domain.
    ///
    /// `frame_counter` is the engine's running frame count since `Vad::new`
    /// (or the last `set_mode`): the median is read from slot 0 until three
    /// frames have been observed, then from slot 2, matching the source's
    /// warm-up behavior.
    pub fn observe(&mut self, feature_value: i16, frame_counter: u32) -> i16 {
        self.age_slots();

        let position = self.values[..NUM_SLOTS].iter().position(|&v| feature_value < v);
        if let Some(position) = position {
            for i in (position + 1..NUM_SLOTS).rev() {
                self.values[i] = self.values[i - 1];
                self.ages[i] = self.ages[i - 1];
            }
            self.values[position] = feature_value;
            self.ages[position] = 1;
        }

        let current_median = if frame_counter > 2 {
            self.values[2]
        } else if frame_counter > 0 {
            self.values[0]
        } else {
            1600
        };

        let alpha = if frame_counter == 0 {
            0
        } else if current_median < self.mean_value {
            SMOOTHING_DOWN
        } else {
            SMOOTHING_UP
        };

        let mut tmp32 = (alpha as i32 + 1) * self.mean_value as i32;
        tmp32 += (i16::MAX as i32 - alpha as i32) * current_median as i32;
        tmp32 += 16384;
        self.mean_value = (tmp32 >> 15) as i16;
        self.mean_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_the_documented_warm_up_mean() {
        let t = MinTracker::new();
        assert_eq!(t.mean_value, 1600);
    }

    #[test]
    fn tracks_a_falling_feature_downward() {
        let mut t = MinTracker::new();
        let mut last = i16::MAX;
        for frame in 0..40u32 {
            let v = 200i16;
            last = t.observe(v, frame);
        }
        assert!(last < 1600);
    }

    #[test]
    fn ignores_a_single_upward_spike() {
        let mut t = MinTracker::new();
        for frame in 0..20u32 {
            t.observe(100, frame);
        }
        let before = t.mean_value;
        let after = t.observe(9000, 20);
        // One spike shouldn't drag the long-term floor far.
        assert!((after - before).abs() < 500);
    }
}
