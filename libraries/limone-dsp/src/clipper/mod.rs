//! Clipper stage
//!
//! Two engines share one contract:
//! - **SoftClipper**: knee-shaped curve with antiderivative anti-aliasing
//! - **HardClipper**: plain clamp to full scale
//!
//! [`Clipper`] owns both and forwards every parameter change to each of
//! them, so switching modes mid-stream never runs an engine with stale
//! settings.

mod hard;
mod soft;

pub use hard::HardClipper;
pub use soft::SoftClipper;

use crate::effect::{sample_rate_changed, AudioEffect, RejectedRate};
use crate::error::{validate_sample_rate, Result};
use crate::math::sanitize;
use crate::meter::GainReduction;

/// Lowest accepted clipper drive in dB
pub const MIN_DRIVE_DB: f32 = -24.0;

/// Highest accepted clipper drive in dB
pub const MAX_DRIVE_DB: f32 = 24.0;

/// Drive and knee below this magnitude put an engine into exact bypass
const BYPASS_EPSILON: f32 = 1.0e-7;

#[inline]
fn is_bypass(drive_db: f32, knee: f32) -> bool {
    drive_db.abs() < BYPASS_EPSILON && knee < BYPASS_EPSILON
}

/// Clipper algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipperMode {
    #[default]
    Soft,
    Hard,
}

impl ClipperMode {
    /// Map a host choice index to a mode, clamping out-of-range values
    pub fn from_index(index: i32) -> Self {
        if index >= 1 {
            Self::Hard
        } else {
            Self::Soft
        }
    }

    pub fn index(self) -> i32 {
        match self {
            Self::Soft => 0,
            Self::Hard => 1,
        }
    }
}

/// Clipper settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipperSettings {
    /// Input drive in dB (-24 to 24)
    pub drive_db: f32,
    /// Knee width (0 = hard corner, 1 = knee spans the whole range)
    pub knee: f32,
    pub mode: ClipperMode,
}

impl ClipperSettings {
    /// Transparent settings: no drive, no knee (exact bypass)
    pub fn new() -> Self {
        Self {
            drive_db: 0.0,
            knee: 0.0,
            mode: ClipperMode::Soft,
        }
    }

    /// Gentle saturation with a wide knee
    pub fn warm() -> Self {
        Self {
            drive_db: 4.0,
            knee: 0.6,
            mode: ClipperMode::Soft,
        }
    }

    /// Hard clipping with a few dB of push
    pub fn loud() -> Self {
        Self {
            drive_db: 6.0,
            knee: 0.0,
            mode: ClipperMode::Hard,
        }
    }

    /// Clamp settings to safe ranges
    pub fn validate(&mut self) {
        self.drive_db = sanitize(self.drive_db, MIN_DRIVE_DB, MAX_DRIVE_DB, 0.0);
        self.knee = sanitize(self.knee, 0.0, 1.0, 0.0);
    }
}

impl Default for ClipperSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Clipper dispatcher
///
/// # Real-Time Safety
/// - `process()` never allocates and never fails
/// - Only the active engine runs; the inactive one keeps its parameters
pub struct Clipper {
    mode: ClipperMode,
    soft: SoftClipper,
    hard: HardClipper,
    sample_rate: f64,
    rejected_rate: RejectedRate,
    enabled: bool,
}

impl Clipper {
    pub fn new() -> Self {
        Self {
            mode: ClipperMode::Soft,
            soft: SoftClipper::new(),
            hard: HardClipper::new(),
            sample_rate: 0.0,
            rejected_rate: RejectedRate::default(),
            enabled: true,
        }
    }

    pub fn with_settings(settings: ClipperSettings) -> Self {
        let mut clipper = Self::new();
        clipper.apply_settings(settings);
        clipper
    }

    /// Prepare both engines for a new sample rate
    pub fn prepare(&mut self, sample_rate: f64) -> Result<()> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        self.soft.prepare(sample_rate)?;
        self.hard.prepare(sample_rate)?;
        self.sample_rate = sample_rate;
        tracing::debug!("Clipper prepared at {} Hz", sample_rate);
        Ok(())
    }

    pub fn set_mode(&mut self, mode: ClipperMode) {
        self.mode = mode;
    }

    /// Select the algorithm from a host choice index (clamped to 0..=1)
    pub fn set_mode_index(&mut self, index: i32) {
        self.mode = ClipperMode::from_index(index);
    }

    pub fn mode(&self) -> ClipperMode {
        self.mode
    }

    /// Forward drive and knee to both engines
    pub fn set_parameters(&mut self, drive_db: f32, knee: f32) {
        self.soft.set_parameters(drive_db, knee);
        self.hard.set_parameters(drive_db, knee);
    }

    pub fn apply_settings(&mut self, mut settings: ClipperSettings) {
        settings.validate();
        self.set_mode(settings.mode);
        self.set_parameters(settings.drive_db, settings.knee);
    }

    /// True when the active engine passes audio through untouched
    pub fn is_bypassed(&self) -> bool {
        match self.mode {
            ClipperMode::Soft => self.soft.is_bypassed(),
            ClipperMode::Hard => self.hard.is_bypassed(),
        }
    }

    /// Process one stereo frame in place through the active engine
    #[inline]
    pub fn process(&mut self, left: &mut f32, right: &mut f32) {
        match self.mode {
            ClipperMode::Soft => self.soft.process(left, right),
            ClipperMode::Hard => self.hard.process(left, right),
        }
    }

    pub fn meter(&self) -> GainReduction {
        match self.mode {
            ClipperMode::Soft => self.soft.meter(),
            ClipperMode::Hard => self.hard.meter(),
        }
    }

    pub fn gain_reduction(&self) -> f32 {
        self.meter().combined
    }

    pub fn gain_reduction_left(&self) -> f32 {
        self.meter().left
    }

    pub fn gain_reduction_right(&self) -> f32 {
        self.meter().right
    }

    pub fn soft(&self) -> &SoftClipper {
        &self.soft
    }

    pub fn hard(&self) -> &HardClipper {
        &self.hard
    }
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for Clipper {
    fn process_interleaved(&mut self, buffer: &mut [f32], sample_rate: u32) {
        if !self.enabled {
            return;
        }

        if sample_rate_changed(self.sample_rate, sample_rate) {
            match self.prepare(f64::from(sample_rate)) {
                Ok(()) => self.rejected_rate.clear(),
                Err(e) => {
                    if self.rejected_rate.record(sample_rate) {
                        tracing::warn!("Clipper muted: {}", e);
                    }
                    buffer.fill(0.0);
                    return;
                }
            }
        }

        for frame in buffer.chunks_exact_mut(2) {
            if let [left, right] = frame {
                self.process(left, right);
            }
        }
    }

    fn reset(&mut self) {
        self.soft.reset();
        self.hard.reset();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Clipper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_index_is_clamped() {
        assert_eq!(ClipperMode::from_index(-3), ClipperMode::Soft);
        assert_eq!(ClipperMode::from_index(0), ClipperMode::Soft);
        assert_eq!(ClipperMode::from_index(1), ClipperMode::Hard);
        assert_eq!(ClipperMode::from_index(7), ClipperMode::Hard);

        let mut clipper = Clipper::new();
        clipper.set_mode_index(42);
        assert_eq!(clipper.mode(), ClipperMode::Hard);
        assert_eq!(clipper.mode().index(), 1);
    }

    #[test]
    fn parameters_reach_inactive_engine() {
        let mut clipper = Clipper::new();
        clipper.set_mode(ClipperMode::Soft);
        clipper.set_parameters(9.0, 0.3);

        assert_eq!(clipper.hard().drive_db(), 9.0);
        assert_eq!(clipper.hard().knee(), 0.3);
        assert_eq!(clipper.soft().drive_db(), 9.0);
    }

    #[test]
    fn meter_follows_active_engine() {
        let mut clipper = Clipper::new();
        clipper.prepare(48_000.0).unwrap();
        clipper.set_parameters(12.0, 0.5);

        clipper.set_mode(ClipperMode::Hard);
        let (mut l, mut r) = (0.9_f32, 0.9_f32);
        clipper.process(&mut l, &mut r);
        let hard_gr = clipper.gain_reduction();
        assert!(hard_gr > 0.0);

        // The soft engine has not processed anything yet
        clipper.set_mode(ClipperMode::Soft);
        assert_eq!(clipper.gain_reduction(), 0.0);

        clipper.set_mode(ClipperMode::Hard);
        assert_eq!(clipper.gain_reduction(), hard_gr);
    }

    #[test]
    fn settings_validation_clamps() {
        let mut settings = ClipperSettings {
            drive_db: 60.0,
            knee: 2.0,
            mode: ClipperMode::Hard,
        };
        settings.validate();
        assert_eq!(settings.drive_db, MAX_DRIVE_DB);
        assert_eq!(settings.knee, 1.0);
    }

    #[test]
    fn presets_are_valid() {
        for preset in [ClipperSettings::new(), ClipperSettings::warm(), ClipperSettings::loud()] {
            let mut validated = preset;
            validated.validate();
            assert_eq!(validated, preset);
        }
    }

    #[test]
    fn default_settings_bypass() {
        let clipper = Clipper::with_settings(ClipperSettings::default());
        assert!(clipper.is_bypassed());
    }

    #[test]
    fn interleaved_processing_clips_every_frame() {
        let mut clipper = Clipper::with_settings(ClipperSettings::loud());
        let mut buffer = vec![0.9, -0.9, 0.1, -0.1, 2.0, -2.0];
        clipper.process_interleaved(&mut buffer, 48_000);
        for sample in &buffer {
            assert!(sample.abs() <= 1.0);
        }
        assert_eq!(buffer[0], 1.0);
        assert_eq!(buffer[1], -1.0);
    }

    #[test]
    fn disabled_clipper_is_bypassed() {
        let mut clipper = Clipper::with_settings(ClipperSettings::loud());
        clipper.set_enabled(false);
        let original = vec![1.5, -1.5, 3.0, 3.0];
        let mut buffer = original.clone();
        clipper.process_interleaved(&mut buffer, 44_100);
        assert_eq!(buffer, original);
    }

    #[test]
    fn unsupported_rate_outputs_silence() {
        let mut clipper = Clipper::with_settings(ClipperSettings::default());
        let mut buffer = vec![3.0, -3.0, 0.5, 0.5];
        clipper.process_interleaved(&mut buffer, 0);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }
}
