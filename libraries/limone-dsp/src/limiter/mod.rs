//! Limiter stage
//!
//! Two engines behind one dispatcher:
//! - **Classic**: adaptive per-channel clip ceiling with a fixed delay
//! - **Modern**: lookahead gain computer with adaptive release and transient patching
//!
//! Like the clipper, the dispatcher forwards every parameter change to both
//! engines so a mode switch is seamless.

mod classic;
mod delay;
mod modern;
mod sliding_max;
mod tuning;

pub use classic::LimiterClassic;
pub use modern::LimiterModern;
pub use sliding_max::SlidingWindowMax;
pub use tuning::{CharacterCurve, ModernTuning};

use crate::effect::{sample_rate_changed, AudioEffect, RejectedRate};
use crate::error::{validate_sample_rate, Result};
use crate::math::{db_to_linear, sanitize};
use crate::meter::GainReduction;

/// Ceiling reduction applied when true-peak mode is on
pub const TRUE_PEAK_MARGIN_DB: f32 = 0.2;

/// Limiter algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimiterMode {
    Classic,
    #[default]
    Modern,
}

impl LimiterMode {
    /// Map a host choice index to a mode, clamping out-of-range values
    pub fn from_index(index: i32) -> Self {
        if index >= 1 {
            Self::Modern
        } else {
            Self::Classic
        }
    }

    pub fn index(self) -> i32 {
        match self {
            Self::Classic => 0,
            Self::Modern => 1,
        }
    }
}

/// Limiter settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimiterSettings {
    /// Input drive in dB (-24 to 24)
    pub drive_db: f32,

    /// Output ceiling in dBFS (-24 to 0)
    pub ceiling_db: f32,

    /// Character (0 to 1)
    /// Low values favour slow, glued release; high values react fast and stay transparent
    pub character: f32,

    pub mode: LimiterMode,

    /// Lower the ceiling by 0.2 dB to leave room for inter-sample peaks
    pub true_peak: bool,

    /// Lookahead in milliseconds (0 to 5)
    pub lookahead_ms: f32,
}

impl LimiterSettings {
    /// Create default limiter settings
    /// - Drive: 0 dB
    /// - Ceiling: -0.1 dBFS, true peak on
    /// - Character: 0.5
    /// - Lookahead: 2 ms
    pub fn new() -> Self {
        Self {
            drive_db: 0.0,
            ceiling_db: -0.1,
            character: 0.5,
            mode: LimiterMode::Modern,
            true_peak: true,
            lookahead_ms: 2.0,
        }
    }

    /// Safety limiting that should rarely engage
    pub fn transparent() -> Self {
        Self {
            drive_db: 0.0,
            ceiling_db: -1.0,
            character: 0.9,
            mode: LimiterMode::Modern,
            true_peak: true,
            lookahead_ms: 5.0,
        }
    }

    /// Loud mastering-style limiting
    pub fn aggressive() -> Self {
        Self {
            drive_db: 6.0,
            ceiling_db: -0.3,
            character: 0.2,
            mode: LimiterMode::Modern,
            true_peak: true,
            lookahead_ms: 1.5,
        }
    }

    /// Validate and clamp settings to safe ranges
    pub fn validate(&mut self) {
        self.drive_db = sanitize(self.drive_db, -24.0, 24.0, 0.0);
        self.ceiling_db = sanitize(self.ceiling_db, -24.0, 0.0, -0.1);
        self.character = sanitize(self.character, 0.0, 1.0, 0.5);
        self.lookahead_ms = sanitize(self.lookahead_ms, 0.0, crate::MAX_LOOKAHEAD_MS, 2.0);
    }

    /// Linear output ceiling, including the true-peak margin
    pub fn ceiling_linear(&self) -> f32 {
        let margin = if self.true_peak { TRUE_PEAK_MARGIN_DB } else { 0.0 };
        db_to_linear(self.ceiling_db - margin)
    }
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Limiter dispatcher
///
/// Owns the input drive and the modern engine's tuning on top of the two
/// engines.
pub struct Limiter {
    settings: LimiterSettings,
    drive: f32,
    classic: LimiterClassic,
    modern: LimiterModern,
    sample_rate: f64,
    rejected_rate: RejectedRate,
    enabled: bool,
}

impl Limiter {
    pub fn new() -> Self {
        Self::with_settings(LimiterSettings::new())
    }

    pub fn with_settings(settings: LimiterSettings) -> Self {
        let mut limiter = Self {
            settings,
            drive: 1.0,
            classic: LimiterClassic::new(),
            modern: LimiterModern::new(),
            sample_rate: 0.0,
            rejected_rate: RejectedRate::default(),
            enabled: true,
        };
        limiter.set_parameters(&settings);
        limiter
    }

    /// Prepare both engines for a new sample rate
    pub fn prepare(&mut self, sample_rate: f64) -> Result<()> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        self.classic.prepare(sample_rate)?;
        self.modern.prepare(sample_rate)?;
        self.sample_rate = sample_rate;

        // Lookahead in samples depends on the rate
        let settings = self.settings;
        self.set_parameters(&settings);

        tracing::debug!(
            "Limiter prepared at {} Hz, latency {} samples",
            sample_rate,
            self.latency_samples()
        );
        Ok(())
    }

    /// Apply settings to both engines
    pub fn set_parameters(&mut self, settings: &LimiterSettings) {
        let mut settings = *settings;
        settings.validate();

        let ceiling = settings.ceiling_linear();
        self.drive = db_to_linear(settings.drive_db);
        self.classic
            .set_parameters(ceiling, settings.character, settings.lookahead_ms);
        self.modern
            .set_parameters(ceiling, settings.character, settings.lookahead_ms);
        self.settings = settings;
    }

    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }

    /// Forward the advanced tuning set to the modern engine
    pub fn set_tuning(&mut self, tuning: ModernTuning) {
        self.modern.set_tuning(tuning);
    }

    pub fn tuning(&self) -> &ModernTuning {
        self.modern.tuning()
    }

    pub fn set_mode(&mut self, mode: LimiterMode) {
        self.settings.mode = mode;
    }

    /// Select the algorithm from a host choice index (clamped to 0..=1)
    pub fn set_mode_index(&mut self, index: i32) {
        self.set_mode(LimiterMode::from_index(index));
    }

    pub fn mode(&self) -> LimiterMode {
        self.settings.mode
    }

    /// Linear output ceiling currently applied
    pub fn ceiling(&self) -> f32 {
        self.settings.ceiling_linear()
    }

    /// Delay of the active engine in samples
    pub fn latency_samples(&self) -> usize {
        match self.settings.mode {
            LimiterMode::Classic => self.classic.latency_samples(),
            LimiterMode::Modern => self.modern.latency_samples(),
        }
    }

    /// Process one stereo frame in place through the active engine
    #[inline]
    pub fn process(&mut self, left: &mut f32, right: &mut f32) {
        if self.drive != 1.0 {
            *left *= self.drive;
            *right *= self.drive;
        }

        match self.settings.mode {
            LimiterMode::Classic => self.classic.process(left, right),
            LimiterMode::Modern => self.modern.process(left, right),
        }
    }

    pub fn meter(&self) -> GainReduction {
        match self.settings.mode {
            LimiterMode::Classic => self.classic.meter(),
            LimiterMode::Modern => self.modern.meter(),
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

    pub fn classic(&self) -> &LimiterClassic {
        &self.classic
    }

    pub fn modern(&self) -> &LimiterModern {
        &self.modern
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for Limiter {
    fn process_interleaved(&mut self, buffer: &mut [f32], sample_rate: u32) {
        if !self.enabled {
            return;
        }

        if sample_rate_changed(self.sample_rate, sample_rate) {
            match self.prepare(f64::from(sample_rate)) {
                Ok(()) => self.rejected_rate.clear(),
                Err(e) => {
                    if self.rejected_rate.record(sample_rate) {
                        tracing::warn!("Limiter muted: {}", e);
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
        self.classic.reset();
        self.modern.reset();
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Limiter"
    }

    fn latency_samples(&self) -> usize {
        Limiter::latency_samples(self)
    }
}
