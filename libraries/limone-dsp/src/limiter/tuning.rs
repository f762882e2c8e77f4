//! Advanced tuning for the modern limiter
//!
//! Most hosts expose only the Character control. [`ModernTuning::for_character`]
//! maps it onto the full tuning set; hosts with an "advanced" page can edit
//! the individual fields instead.

use crate::math::{exp_lerp, sanitize};

/// Interpolation of one tuning value across the Character range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterCurve {
    /// Value at character 0
    pub start: f32,
    /// Value at character 1
    pub end: f32,
    /// Interpolate geometrically instead of linearly
    pub exponential: bool,
    pub min: f32,
    pub max: f32,
}

impl CharacterCurve {
    const fn linear(start: f32, end: f32, min: f32, max: f32) -> Self {
        Self {
            start,
            end,
            exponential: false,
            min,
            max,
        }
    }

    const fn exponential(start: f32, end: f32, min: f32, max: f32) -> Self {
        Self {
            start,
            end,
            exponential: true,
            min,
            max,
        }
    }

    /// Evaluate the curve; character is clamped to [0, 1]
    pub fn at(&self, character: f32) -> f32 {
        let t = sanitize(character, 0.0, 1.0, 0.0);
        let value = if self.exponential {
            exp_lerp(self.start, self.end, t)
        } else {
            self.start + (self.end - self.start) * t
        };
        value.clamp(self.min, self.max)
    }
}

pub const HOLD_CURVE: CharacterCurve = CharacterCurve::linear(8.0, 0.8, 0.0, 10.0);
pub const HOLD_RELEASE_CURVE: CharacterCurve = CharacterCurve::exponential(4.0, 0.35, 0.05, 10.0);
pub const ATTACK_TAU_DIV_CURVE: CharacterCurve = CharacterCurve::linear(3.2, 1.6, 0.25, 8.0);
pub const RELEASE_SMOOTH_BASE_CURVE: CharacterCurve = CharacterCurve::linear(4.0, 0.6, 0.0, 20.0);
pub const RELEASE_SMOOTH_RANGE_CURVE: CharacterCurve = CharacterCurve::linear(18.0, 4.0, 0.0, 50.0);
pub const ADAPT_FAST_STRENGTH_CURVE: CharacterCurve = CharacterCurve::linear(2.2, 1.2, 0.0, 8.0);
pub const ADAPT_SLOW_STRENGTH_CURVE: CharacterCurve = CharacterCurve::linear(4.5, 2.0, 0.0, 16.0);
pub const SIDECHAIN_HPF_CURVE: CharacterCurve = CharacterCurve::linear(80.0, 180.0, 20.0, 400.0);
pub const TRANSIENT_MIX_CURVE: CharacterCurve = CharacterCurve::linear(0.15, 0.75, 0.0, 1.0);
pub const RELEASE_FAST_CURVE: CharacterCurve = CharacterCurve::exponential(6.0, 0.7, 0.05, 20.0);
pub const RELEASE_SLOW_CURVE: CharacterCurve = CharacterCurve::exponential(90.0, 18.0, 0.1, 200.0);
pub const LINK_TRANSIENTS_CURVE: CharacterCurve = CharacterCurve::linear(0.95, 0.35, 0.0, 1.0);
pub const LINK_RELEASE_CURVE: CharacterCurve = CharacterCurve::linear(0.99, 0.75, 0.0, 1.0);

/// Modern limiter tuning
///
/// Times are in milliseconds. Every field is clamped by [`validate`](Self::validate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModernTuning {
    /// Peak hold before the attenuation starts releasing (0 to 10 ms)
    pub hold_ms: f32,
    /// Release of the held attenuation (0.05 to 10 ms)
    pub hold_release_ms: f32,
    /// Smoothing attack = lookahead / divisor (0.25 to 8)
    pub attack_tau_div: f32,
    /// Smoothing release floor (0 to 20 ms)
    pub release_smooth_base_ms: f32,
    /// Smoothing release added for deep, bass-heavy reduction (0 to 50 ms)
    pub release_smooth_range_ms: f32,
    /// Fast envelope release stretch (0 to 8)
    pub adapt_fast_strength: f32,
    /// Slow envelope release stretch (0 to 16)
    pub adapt_slow_strength: f32,
    /// Sidechain highpass corner (20 to 400 Hz)
    pub sidechain_hpf_hz: f32,
    /// Fast/slow ratio above which a sample counts as a transient (0.1 to 3)
    pub ratio_base: f32,
    /// How much Character lowers the transient threshold (0 to 1.5)
    pub ratio_slope: f32,
    /// Share of the slow envelope kept on transients (0 to 1)
    pub transient_mix: f32,
    /// Safety saturator strength (0 to 20)
    pub soft_safety_strength: f32,
    /// Fast envelope release (0.05 to 20 ms)
    pub release_fast_ms: f32,
    /// Slow envelope release (0.1 to 200 ms)
    pub release_slow_ms: f32,
    /// Stereo link of the fast envelopes (0 to 1)
    pub link_transients: f32,
    /// Stereo link of the slow envelopes (0 to 1)
    pub link_release: f32,
}

impl ModernTuning {
    pub fn new() -> Self {
        Self {
            hold_ms: 4.0,
            hold_release_ms: 1.5,
            attack_tau_div: 2.5,
            release_smooth_base_ms: 1.5,
            release_smooth_range_ms: 6.0,
            adapt_fast_strength: 1.5,
            adapt_slow_strength: 3.0,
            sidechain_hpf_hz: 120.0,
            ratio_base: 1.5,
            ratio_slope: 0.9,
            transient_mix: 0.3,
            soft_safety_strength: 6.0,
            release_fast_ms: 2.0,
            release_slow_ms: 30.0,
            link_transients: 0.5,
            link_release: 0.95,
        }
    }

    /// Tuning derived from the Character control
    ///
    /// `ratio_base`, `ratio_slope` and `soft_safety_strength` have no curve
    /// and keep their defaults.
    pub fn for_character(character: f32) -> Self {
        Self {
            hold_ms: HOLD_CURVE.at(character),
            hold_release_ms: HOLD_RELEASE_CURVE.at(character),
            attack_tau_div: ATTACK_TAU_DIV_CURVE.at(character),
            release_smooth_base_ms: RELEASE_SMOOTH_BASE_CURVE.at(character),
            release_smooth_range_ms: RELEASE_SMOOTH_RANGE_CURVE.at(character),
            adapt_fast_strength: ADAPT_FAST_STRENGTH_CURVE.at(character),
            adapt_slow_strength: ADAPT_SLOW_STRENGTH_CURVE.at(character),
            sidechain_hpf_hz: SIDECHAIN_HPF_CURVE.at(character),
            transient_mix: TRANSIENT_MIX_CURVE.at(character),
            release_fast_ms: RELEASE_FAST_CURVE.at(character),
            release_slow_ms: RELEASE_SLOW_CURVE.at(character),
            link_transients: LINK_TRANSIENTS_CURVE.at(character),
            link_release: LINK_RELEASE_CURVE.at(character),
            ..Self::new()
        }
    }

    /// Clamp every field to its range; non-finite values fall back to the default
    pub fn validate(&mut self) {
        let d = Self::new();
        self.hold_ms = sanitize(self.hold_ms, 0.0, 10.0, d.hold_ms);
        self.hold_release_ms = sanitize(self.hold_release_ms, 0.05, 10.0, d.hold_release_ms);
        self.attack_tau_div = sanitize(self.attack_tau_div, 0.25, 8.0, d.attack_tau_div);
        self.release_smooth_base_ms =
            sanitize(self.release_smooth_base_ms, 0.0, 20.0, d.release_smooth_base_ms);
        self.release_smooth_range_ms =
            sanitize(self.release_smooth_range_ms, 0.0, 50.0, d.release_smooth_range_ms);
        self.adapt_fast_strength = sanitize(self.adapt_fast_strength, 0.0, 8.0, d.adapt_fast_strength);
        self.adapt_slow_strength = sanitize(self.adapt_slow_strength, 0.0, 16.0, d.adapt_slow_strength);
        self.sidechain_hpf_hz = sanitize(self.sidechain_hpf_hz, 20.0, 400.0, d.sidechain_hpf_hz);
        self.ratio_base = sanitize(self.ratio_base, 0.1, 3.0, d.ratio_base);
        self.ratio_slope = sanitize(self.ratio_slope, 0.0, 1.5, d.ratio_slope);
        self.transient_mix = sanitize(self.transient_mix, 0.0, 1.0, d.transient_mix);
        self.soft_safety_strength =
            sanitize(self.soft_safety_strength, 0.0, 20.0, d.soft_safety_strength);
        self.release_fast_ms = sanitize(self.release_fast_ms, 0.05, 20.0, d.release_fast_ms);
        self.release_slow_ms = sanitize(self.release_slow_ms, 0.1, 200.0, d.release_slow_ms);
        self.link_transients = sanitize(self.link_transients, 0.0, 1.0, d.link_transients);
        self.link_release = sanitize(self.link_release, 0.0, 1.0, d.link_release);
    }
}

impl Default for ModernTuning {
    fn default() -> Self {
        Self::new()
    }
}
