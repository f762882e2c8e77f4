//! Soft clipper with first-order antiderivative anti-aliasing (ADAA)
//!
//! The static curve is linear up to `1 - knee`, bends through a smooth knee
//! and saturates at exactly 1.0. Rather than evaluating that curve directly
//! (which aliases badly at high drive), each output sample is the average of
//! the curve over the segment between the previous and current input,
//! computed from the closed-form antiderivative:
//!
//! ```text
//! y[n] = (F(x[n]) - F(x[n-1])) / (x[n] - x[n-1])
//! ```
//!
//! When consecutive inputs are (nearly) identical the quotient degenerates to
//! 0/0 and the curve is evaluated directly instead.

use super::{is_bypass, MAX_DRIVE_DB, MIN_DRIVE_DB};
use crate::error::{validate_sample_rate, Result};
use crate::math::{db_to_linear, reduction, sanitize};
use crate::meter::GainReduction;

/// Below this input delta the ADAA quotient is replaced by a direct curve evaluation
const ADAA_EPSILON: f64 = 1.0e-9;

/// Curve and antiderivative parameters derived from the knee width.
///
/// Inside the knee, with `dx = |x| - start`, the curve is the product of
/// `y0 = start + dx - dx^2 / 2k` and the makeup blend
/// `m = 1 + b2 dx^2 + b3 dx^3`. The product is a quintic in `dx`; its
/// coefficients `n2..n5` and the integral over the whole knee are cached so
/// the antiderivative is a single polynomial evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AdaaCoefficients {
    knee: f64,
    start: f64,
    makeup: f64,
    n2: f64,
    n3: f64,
    n4: f64,
    n5: f64,
    knee_integral: f64,
}

impl AdaaCoefficients {
    fn for_knee(knee: f32) -> Self {
        let k = f64::from(knee);
        if k <= 0.0 {
            return Self {
                knee: 0.0,
                start: 1.0,
                makeup: 1.0,
                n2: 0.0,
                n3: 0.0,
                n4: 0.0,
                n5: 0.0,
                knee_integral: 0.0,
            };
        }

        let start = 1.0 - k;
        // The quadratic approach alone lands on 1 - k/2 at |x| = 1.
        let makeup = 1.0 / (1.0 - 0.5 * k);
        let a = makeup - 1.0;

        let inv_k = 1.0 / k;
        let b2 = 3.0 * a * inv_k * inv_k;
        let b3 = -2.0 * a * inv_k * inv_k * inv_k;
        let c2 = -0.5 * inv_k;

        let mut coeffs = Self {
            knee: k,
            start,
            makeup,
            n2: c2 + start * b2,
            n3: b2 + start * b3,
            n4: c2 * b2 + b3,
            n5: c2 * b3,
            knee_integral: 0.0,
        };
        coeffs.knee_integral = coeffs.knee_polynomial_integral(k);
        coeffs
    }

    /// Integral of the knee polynomial from `start` to `start + dx`
    #[inline]
    fn knee_polynomial_integral(&self, dx: f64) -> f64 {
        dx * (self.start
            + dx * (0.5
                + dx * (self.n2 / 3.0
                    + dx * (self.n3 / 4.0 + dx * (self.n4 / 5.0 + dx * self.n5 / 6.0)))))
    }

    /// Static curve for a non-negative input magnitude
    #[inline]
    fn curve(&self, u: f64) -> f64 {
        if u <= 0.0 {
            return 0.0;
        }
        if self.knee <= 0.0 {
            return u.min(1.0);
        }
        if u <= self.start {
            return u;
        }
        if u >= 1.0 {
            return 1.0;
        }

        let dx = u - self.start;
        let y0 = u - (dx * dx) / (2.0 * self.knee);
        let t = dx / self.knee;
        let s = t * t * (3.0 - 2.0 * t);
        let m = 1.0 + (self.makeup - 1.0) * s;
        (y0 * m).clamp(0.0, 1.0)
    }

    /// Antiderivative of the odd curve. It is even, so only |x| matters.
    #[inline]
    fn antiderivative(&self, u: f64) -> f64 {
        if u <= self.start {
            return 0.5 * u * u;
        }

        let base = 0.5 * self.start * self.start;
        if u >= 1.0 {
            base + self.knee_integral + (u - 1.0)
        } else {
            base + self.knee_polynomial_integral(u - self.start)
        }
    }
}

/// Stereo soft clipper
///
/// # Real-Time Safety
/// - No allocations anywhere
/// - Non-finite input produces silence for that channel and clears its history
#[derive(Debug, Clone)]
pub struct SoftClipper {
    drive_db: f32,
    knee: f32,
    input_gain: f32,
    /// Previous driven input per channel (left, right)
    last_input: [f32; 2],
    adaa: AdaaCoefficients,
    gain_reduction: GainReduction,
}

impl SoftClipper {
    /// Create a new soft clipper (unity drive, bypassed)
    pub fn new() -> Self {
        Self {
            drive_db: 0.0,
            knee: 0.0,
            input_gain: 1.0,
            last_input: [0.0; 2],
            adaa: AdaaCoefficients::for_knee(0.0),
            gain_reduction: GainReduction::NONE,
        }
    }

    /// Validate the sample rate and clear all history
    ///
    /// The curve itself is rate-independent; only the history is reset.
    pub fn prepare(&mut self, sample_rate: f64) -> Result<()> {
        validate_sample_rate(sample_rate)?;
        self.reset();
        Ok(())
    }

    /// Clear the ADAA history and meters
    pub fn reset(&mut self) {
        self.last_input = [0.0; 2];
        self.gain_reduction = GainReduction::NONE;
    }

    /// Set drive (dB) and knee width (0..1). The ADAA cache is rebuilt immediately.
    pub fn set_parameters(&mut self, drive_db: f32, knee: f32) {
        self.drive_db = sanitize(drive_db, MIN_DRIVE_DB, MAX_DRIVE_DB, 0.0);
        self.knee = sanitize(knee, 0.0, 1.0, 0.0);
        self.input_gain = db_to_linear(self.drive_db);
        self.adaa = AdaaCoefficients::for_knee(self.knee);
    }

    /// Get drive in dB
    pub fn drive_db(&self) -> f32 {
        self.drive_db
    }

    /// Get knee width
    pub fn knee(&self) -> f32 {
        self.knee
    }

    /// Linear gain applied before the curve
    pub fn input_gain(&self) -> f32 {
        self.input_gain
    }

    /// True when drive and knee are both effectively zero
    pub fn is_bypassed(&self) -> bool {
        is_bypass(self.drive_db, self.knee)
    }

    /// The static (non anti-aliased) curve for the current knee
    pub fn clip_curve(&self, x: f32) -> f32 {
        (self.adaa.curve(f64::from(x.abs())) as f32).copysign(x)
    }

    /// Process one stereo frame in place
    pub fn process(&mut self, left: &mut f32, right: &mut f32) {
        let bypass = self.is_bypassed();
        let mut reductions = [0.0f32; 2];

        for (ch, sample) in [left, right].into_iter().enumerate() {
            let x = *sample;
            if bypass && x.is_finite() {
                self.last_input[ch] = x;
                continue;
            }

            let driven = x * self.input_gain;
            if !driven.is_finite() {
                self.last_input[ch] = 0.0;
                *sample = 0.0;
                continue;
            }

            *sample = self.adaa_sample(driven, self.last_input[ch]);
            self.last_input[ch] = driven;

            // Metering reads the static curve so the display doesn't jitter
            // with the sample-to-sample ADAA averaging.
            let abs_in = driven.abs();
            reductions[ch] = reduction(abs_in, self.clip_curve(abs_in));
        }

        self.gain_reduction = GainReduction::from_channels(reductions[0], reductions[1]);
    }

    fn adaa_sample(&self, x: f32, prev: f32) -> f32 {
        if self.knee <= 0.0 {
            return x.clamp(-1.0, 1.0);
        }

        let start = self.adaa.start;
        let (x, prev) = (f64::from(x), f64::from(prev));
        if x.abs() <= start && prev.abs() <= start {
            return x as f32;
        }

        let dx = x - prev;
        let y = if dx.abs() < ADAA_EPSILON {
            self.adaa.curve(x.abs()).copysign(x)
        } else {
            (self.adaa.antiderivative(x.abs()) - self.adaa.antiderivative(prev.abs())) / dx
        };

        (y as f32).clamp(-1.0, 1.0)
    }

    /// Get combined gain reduction (0 = none, 1 = full)
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

impl Default for SoftClipper {
    fn default() -> Self {
        Self::new()
    }
}
