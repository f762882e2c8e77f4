//! Classic limiter: adaptive per-channel clip ceiling plus a fixed delay
//!
//! Each channel keeps a "refclip" level. Peaks above it pull it down quickly,
//! quiet passages let it creep back up. The signal is clamped to the refclip
//! and then delayed; the delay only aligns latency with the modern engine,
//! no gain is computed ahead of time.

use super::delay::{lookahead_capacity, DelayLine};
use crate::error::{validate_sample_rate, Result};
use crate::math::{reduction, sanitize};
use crate::meter::GainReduction;

const INITIAL_REFCLIP: f64 = 0.99;
const MIN_REFCLIP: f64 = 0.5;
const MAX_REFCLIP: f64 = 1.0;
/// Refclip only ratchets down while it is above this level
const RATCHET_FLOOR: f64 = 0.9;
/// Inputs quieter than this never report gain reduction
const METER_FLOOR: f32 = 1.0e-4;

/// Stereo adaptive-ceiling limiter
pub struct LimiterClassic {
    sample_rate: f64,
    ceiling: f32,
    character: f32,
    down_step: f64,
    up_step: f64,
    link_amount: f64,
    lookahead_ms: f32,
    refclip: [f64; 2],
    delay: DelayLine,
    gain_reduction: GainReduction,
}

impl LimiterClassic {
    /// Create a new classic limiter sized for 44.1 kHz
    pub fn new() -> Self {
        let mut limiter = Self {
            sample_rate: 44_100.0,
            ceiling: 1.0,
            character: 0.0,
            down_step: 0.0,
            up_step: 0.0,
            link_amount: 1.0,
            lookahead_ms: 2.0,
            refclip: [INITIAL_REFCLIP; 2],
            delay: DelayLine::default(),
            gain_reduction: GainReduction::NONE,
        };
        limiter.update_steps();
        limiter.delay.allocate(lookahead_capacity(limiter.sample_rate));
        limiter.delay.set_delay(limiter.delay_frames());
        limiter
    }

    /// Allocate the delay for the maximum lookahead and reset all state
    pub fn prepare(&mut self, sample_rate: f64) -> Result<()> {
        self.sample_rate = validate_sample_rate(sample_rate)?;
        self.delay.allocate(lookahead_capacity(self.sample_rate));
        self.delay.set_delay(self.delay_frames());
        self.reset();
        Ok(())
    }

    /// Restore the initial refclip and clear the delay line
    pub fn reset(&mut self) {
        self.refclip = [INITIAL_REFCLIP; 2];
        self.delay.clear();
        self.gain_reduction = GainReduction::NONE;
    }

    /// Update ceiling (linear), character and lookahead
    ///
    /// A lookahead change clears the delay line; it never reallocates.
    pub fn set_parameters(&mut self, ceiling: f32, character: f32, lookahead_ms: f32) {
        self.ceiling = sanitize(ceiling, 0.0, 1.0, 1.0);
        self.character = sanitize(character, 0.0, 1.0, 0.0);
        self.lookahead_ms = sanitize(lookahead_ms, 0.0, crate::MAX_LOOKAHEAD_MS, 0.0);
        self.update_steps();

        let frames = self.delay_frames();
        if frames != self.delay.delay() {
            self.delay.set_delay(frames);
            self.delay.clear();
        }
    }

    fn update_steps(&mut self) {
        let t = f64::from(self.character);
        self.down_step = 0.002 + 0.018 * t;
        self.up_step = 0.000_02 - 0.000_018 * t;
        self.link_amount = 1.0 - t;
    }

    fn delay_frames(&self) -> usize {
        (f64::from(self.lookahead_ms) * self.sample_rate / 1000.0).ceil() as usize
    }

    /// Delay in samples
    pub fn latency_samples(&self) -> usize {
        self.delay.delay()
    }

    /// Current adaptive ceiling per channel
    pub fn refclip(&self) -> [f64; 2] {
        self.refclip
    }

    /// Get linear output ceiling
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Process one stereo frame in place
    pub fn process(&mut self, left: &mut f32, right: &mut f32) {
        let input = [finite_or_zero(*left), finite_or_zero(*right)];

        for (refclip, &x) in self.refclip.iter_mut().zip(&input) {
            let x = f64::from(x);
            if x.abs() > *refclip && *refclip > RATCHET_FLOOR {
                *refclip -= self.down_step;
            } else {
                *refclip += self.up_step;
            }
            *refclip = refclip.clamp(MIN_REFCLIP, MAX_REFCLIP);
        }

        let linked = self.refclip[0].min(self.refclip[1]);
        for refclip in &mut self.refclip {
            *refclip += (linked - *refclip) * self.link_amount;
        }

        let mut clamped = [0.0f32; 2];
        let mut reductions = [0.0f32; 2];
        for ch in 0..2 {
            let limit = self.refclip[ch];
            let y = f64::from(input[ch]).clamp(-limit, limit) as f32;
            if input[ch].abs() > METER_FLOOR {
                reductions[ch] = reduction(input[ch].abs(), y.abs());
            }
            clamped[ch] = y * self.ceiling;
        }
        self.gain_reduction = GainReduction::from_channels(reductions[0], reductions[1]);

        let [l, r] = self.delay.push(clamped);
        *left = l;
        *right = r;
    }

    /// Get combined gain reduction
    pub fn gain_reduction(&self) -> f32 {
        self.gain_reduction.combined
    }

    /// Get left channel gain reduction
    pub fn gain_reduction_left(&self) -> f32 {
        self.gain_reduction.left
    }

    /// Get right channel gain reduction
    pub fn gain_reduction_right(&self) -> f32 {
        self.gain_reduction.right
    }

    /// Get all gain reduction readouts of the last frame
    pub fn meter(&self) -> GainReduction {
        self.gain_reduction
    }
}

impl Default for LimiterClassic {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}
