//! Hard clipper: drive followed by a clamp to full scale

use super::{is_bypass, MAX_DRIVE_DB, MIN_DRIVE_DB};
use crate::error::{validate_sample_rate, Result};
use crate::math::{db_to_linear, reduction, sanitize};
use crate::meter::GainReduction;

/// Stereo hard clipper
///
/// The knee parameter has no effect on the curve; it only takes part in the
/// bypass decision so both clipper engines agree on when they are idle.
#[derive(Debug, Clone)]
pub struct HardClipper {
    drive_db: f32,
    knee: f32,
    input_gain: f32,
    gain_reduction: GainReduction,
}

impl HardClipper {
    /// Create a new hard clipper (unity drive, bypassed)
    pub fn new() -> Self {
        Self {
            drive_db: 0.0,
            knee: 0.0,
            input_gain: 1.0,
            gain_reduction: GainReduction::NONE,
        }
    }

    /// Validate the sample rate and clear the meters
    pub fn prepare(&mut self, sample_rate: f64) -> Result<()> {
        validate_sample_rate(sample_rate)?;
        self.reset();
        Ok(())
    }

    /// Reset the latched meters
    pub fn reset(&mut self) {
        self.gain_reduction = GainReduction::NONE;
    }

    /// Set drive (dB) and knee; both are clamped to their ranges
    pub fn set_parameters(&mut self, drive_db: f32, knee: f32) {
        self.drive_db = sanitize(drive_db, MIN_DRIVE_DB, MAX_DRIVE_DB, 0.0);
        self.knee = sanitize(knee, 0.0, 1.0, 0.0);
        self.input_gain = db_to_linear(self.drive_db);
    }

    /// Get drive in dB
    pub fn drive_db(&self) -> f32 {
        self.drive_db
    }

    /// Get knee width
    pub fn knee(&self) -> f32 {
        self.knee
    }

    /// Get linear input gain derived from the drive
    pub fn input_gain(&self) -> f32 {
        self.input_gain
    }

    /// True when drive and knee are both effectively zero
    pub fn is_bypassed(&self) -> bool {
        is_bypass(self.drive_db, self.knee)
    }

    /// Process one stereo frame in place
    pub fn process(&mut self, left: &mut f32, right: &mut f32) {
        let bypass = self.is_bypassed();
        let mut reductions = [0.0f32; 2];

        for (ch, sample) in [left, right].into_iter().enumerate() {
            let x = *sample;
            if bypass && x.is_finite() {
                continue;
            }

            let driven = x * self.input_gain;
            if !driven.is_finite() {
                *sample = 0.0;
                continue;
            }

            let clipped = driven.clamp(-1.0, 1.0);
            reductions[ch] = reduction(driven.abs(), clipped.abs());
            *sample = clipped;
        }

        self.gain_reduction = GainReduction::from_channels(reductions[0], reductions[1]);
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

impl Default for HardClipper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clipper(drive_db: f32) -> HardClipper {
        let mut clipper = HardClipper::new();
        clipper.prepare(44_100.0).unwrap();
        clipper.set_parameters(drive_db, 0.0);
        clipper
    }

    #[test]
    fn clamps_driven_signal() {
        let mut c = clipper(6.0);
        let (mut l, mut r) = (0.9_f32, -0.2_f32);
        c.process(&mut l, &mut r);
        assert_eq!(l, 1.0);
        assert!((r - (-0.2 * c.input_gain())).abs() < 1e-6);
    }

    #[test]
    fn gain_reduction_per_channel() {
        let mut c = clipper(0.0);
        // knee 0 and drive 0 is bypass, so use a tiny drive
        c.set_parameters(1.0e-3, 0.0);
        let (mut l, mut r) = (4.0_f32, 0.5_f32);
        c.process(&mut l, &mut r);
        assert!((c.gain_reduction_left() - 0.75).abs() < 1e-3);
        assert_eq!(c.gain_reduction_right(), 0.0);
        assert_eq!(c.gain_reduction(), c.gain_reduction_left());
    }

    #[test]
    fn bypass_resets_meters() {
        let mut c = clipper(12.0);
        let (mut l, mut r) = (1.0_f32, 1.0_f32);
        c.process(&mut l, &mut r);
        assert!(c.gain_reduction() > 0.0);

        c.set_parameters(0.0, 0.0);
        let (mut l, mut r) = (3.0_f32, -3.0_f32);
        c.process(&mut l, &mut r);
        assert_eq!((l, r), (3.0, -3.0));
        assert_eq!(c.meter(), GainReduction::NONE);
    }

    #[test]
    fn non_finite_input_is_silenced() {
        let mut c = clipper(3.0);
        let (mut l, mut r) = (f32::NEG_INFINITY, f32::NAN);
        c.process(&mut l, &mut r);
        assert_eq!((l, r), (0.0, 0.0));

        let (mut l, mut r) = (0.5_f32, 0.5_f32);
        c.process(&mut l, &mut r);
        assert!(l.is_finite() && r.is_finite());
    }

    #[test]
    fn output_does_not_depend_on_history() {
        let mut fresh = clipper(6.0);
        let mut used = clipper(6.0);
        for x in [0.9_f32, -3.0, f32::NAN, 0.1] {
            let (mut l, mut r) = (x, -x);
            used.process(&mut l, &mut r);
        }

        for x in [0.3_f32, -0.7, 2.5] {
            let (mut a, mut b) = (x, -x);
            let (mut c, mut d) = (x, -x);
            fresh.process(&mut a, &mut b);
            used.process(&mut c, &mut d);
            assert_eq!((a, b), (c, d));
            assert_eq!(fresh.meter(), used.meter());
        }
    }
}
