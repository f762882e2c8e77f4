//! Modern limiter: adaptive lookahead gain computer
//!
//! Per sample, in order:
//! 1. Sidechain highpass estimates how bass-heavy the input is
//! 2. Fast and slow dB envelopes follow the overshoot above full scale
//! 3. Both envelope pairs are stereo-linked
//! 4. A sliding-window maximum over the lookahead guarantees the delayed peak is seen
//! 5. Peak hold keeps the attenuation up between close peaks
//! 6. Two cascaded one-pole smoothers shape the gain
//! 7. A transient patch adds short extra attenuation when smoothing is predicted to be too slow
//! 8. Ceiling, soft safety saturation and a final hard clamp
//!
//! Attenuation is tracked in positive dB (0 = unity gain) throughout.

use std::f32::consts::PI;

use super::delay::{lookahead_capacity, DelayLine};
use super::sliding_max::SlidingWindowMax;
use super::tuning::ModernTuning;
use crate::error::{validate_sample_rate, Result};
use crate::math::{
    db_to_linear, decay_coeff, exp_lerp, one_pole_coeff, overshoot_db, sanitize, smoothstep,
};
use crate::meter::GainReduction;

/// Fast minus slow envelope (dB) above which a sample counts as a transient
const TRANSIENT_THRESHOLD_DB: f32 = 0.35;
/// Peaks are tracked only above full scale plus this margin
const PATCH_MARGIN_DB: f32 = 0.2;
/// Patches whose target gain is this close to unity are skipped
const PATCH_MIN_DEPTH: f32 = 0.9995;
const PATCH_RELEASE_MS: f32 = 4.0;
const PATCH_COOLDOWN_MS: f32 = 10.0;
/// Envelope/overshoot level (dB) at which release stretching reaches full strength
const GR_NORM_RANGE_DB: f32 = 24.0;
/// Lowest linear ceiling accepted
const MIN_CEILING: f32 = 1.0e-4;

/// Values that depend only on parameters and sample rate
#[derive(Debug, Clone, Copy, Default)]
struct Derived {
    hpf_coeff: f32,
    fast_strength: f32,
    slow_strength: f32,
    release_fast_ms: f32,
    release_slow_ms: f32,
    ratio_threshold: f32,
    transient_mix: f32,
    link_transients: f32,
    link_release: f32,
    hold_samples: u32,
    hold_release_coeff: f32,
    smooth_attack_coeff: f32,
    smooth_release_base_ms: f32,
    smooth_release_range_ms: f32,
    patch_margin: f32,
    patch_release_samples: u32,
    patch_cooldown_samples: u32,
    soft_safety_strength: f32,
}

/// One-pole highpass on the sidechain
#[derive(Debug, Clone, Copy, Default)]
struct OnePoleHighpass {
    state: f32,
    last_input: f32,
}

impl OnePoleHighpass {
    #[inline]
    fn process(&mut self, input: f32, coeff: f32) -> f32 {
        self.state = coeff * (self.state + input - self.last_input);
        self.last_input = input;
        self.state
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PeakHold {
    value: f32,
    timer: u32,
}

impl PeakHold {
    #[inline]
    fn process(&mut self, input: f32, hold_samples: u32, release_coeff: f32) -> f32 {
        if input > self.value {
            self.value = input;
            self.timer = hold_samples;
        } else if self.timer > 0 {
            self.timer -= 1;
        } else {
            self.value += (input - self.value) * release_coeff;
        }
        self.value
    }
}

/// Attack/release coefficients of one smoothing step
#[derive(Debug, Clone, Copy)]
struct Smoother {
    attack: f32,
    release: f32,
}

impl Smoother {
    #[inline]
    fn step(self, current: f32, target: f32) -> f32 {
        let coeff = if target > current {
            self.attack
        } else {
            self.release
        };
        current + coeff * (target - current)
    }

    /// Run both cascaded stages `steps` times toward `target_db`
    fn predict(self, stage1: f32, stage2: f32, target_db: f32, steps: usize) -> f32 {
        let target = target_db.max(0.0);
        let (mut a1, mut a2) = (stage1, stage2);
        for _ in 0..steps {
            a1 = self.step(a1, target);
            a2 = self.step(a2, a1);
        }
        a2
    }
}

/// Tracks the local input peak above the patch margin
#[derive(Debug, Clone, Copy, Default)]
struct PeakTracker {
    active: bool,
    max: f32,
    max_channels: [f32; 2],
    last: f32,
}

impl PeakTracker {
    /// Feed one detector frame. Returns true on a falling edge inside a tracked peak.
    #[inline]
    fn update(&mut self, detector: [f32; 2], margin: f32) -> bool {
        let level = detector[0].max(detector[1]);
        if level <= margin {
            self.active = false;
            return false;
        }

        if !self.active {
            self.active = true;
            self.max = level;
            self.max_channels = detector;
            self.last = level;
            return false;
        }

        if level > self.max {
            self.max = level;
            self.max_channels = detector;
        }
        let falling = level < self.last;
        self.last = level;
        falling
    }

    fn release(&mut self) {
        self.active = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PatchPhase {
    #[default]
    Idle,
    Attack,
    Release,
}

/// Short multiplicative gain correction for transients
#[derive(Debug, Clone, Copy)]
struct TransientPatch {
    phase: PatchPhase,
    target: f32,
    position: u32,
    attack_samples: u32,
    release_samples: u32,
    cooldown: u32,
}

impl Default for TransientPatch {
    fn default() -> Self {
        Self {
            phase: PatchPhase::Idle,
            target: 1.0,
            position: 0,
            attack_samples: 0,
            release_samples: 0,
            cooldown: 0,
        }
    }
}

impl TransientPatch {
    fn tick_cooldown(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
    }

    fn can_trigger(&self) -> bool {
        self.cooldown == 0 && self.phase == PatchPhase::Idle
    }

    fn trigger(&mut self, target: f32, attack_samples: u32, release_samples: u32, cooldown: u32) {
        self.phase = PatchPhase::Attack;
        self.target = target;
        self.position = 0;
        self.attack_samples = attack_samples;
        self.release_samples = release_samples;
        self.cooldown = cooldown;
    }

    /// Gain for the current sample, then advance
    #[inline]
    fn next_gain(&mut self) -> f32 {
        match self.phase {
            PatchPhase::Idle => 1.0,
            PatchPhase::Attack => {
                let u = smoothstep(progress(self.position, self.attack_samples)).powi(4);
                self.position += 1;
                if self.position >= self.attack_samples {
                    self.phase = PatchPhase::Release;
                    self.position = 0;
                    self.target
                } else {
                    1.0 + (self.target - 1.0) * u
                }
            }
            PatchPhase::Release => {
                let u = 1.0 - (1.0 - smoothstep(progress(self.position, self.release_samples))).powi(4);
                self.position += 1;
                if self.position >= self.release_samples {
                    self.phase = PatchPhase::Idle;
                    self.position = 0;
                    self.target = 1.0;
                    1.0
                } else {
                    self.target + (1.0 - self.target) * u
                }
            }
        }
    }
}

#[inline]
fn progress(position: u32, length: u32) -> f32 {
    if length > 0 {
        position as f32 / length as f32
    } else {
        1.0
    }
}

/// Pull both channels toward their maximum by `amount`
#[inline]
fn link(pair: &mut [f32; 2], amount: f32) {
    let max = pair[0].max(pair[1]);
    for value in pair.iter_mut() {
        *value += (max - *value) * amount;
    }
}

/// Instant attack, exponential release
#[inline]
fn follow(envelope: f32, input: f32, release_coeff: f32) -> f32 {
    if input > envelope {
        input
    } else {
        envelope * release_coeff
    }
}

/// Compress anything above the ceiling; below it the signal is untouched
#[inline]
fn soft_safety(x: f32, ceiling: f32, strength: f32) -> f32 {
    let a = x.abs();
    if a <= ceiling {
        return x;
    }
    let over = (a - ceiling) / ceiling;
    let alpha = 1.0 + strength * over;
    (a / (1.0 + alpha * over)).copysign(x)
}

#[inline]
fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Adaptive lookahead limiter
///
/// # Real-Time Safety
/// Buffers are sized for the maximum lookahead in `prepare()`. Neither
/// `set_parameters()` nor `process()` allocates.
pub struct LimiterModern {
    sample_rate: f64,
    ceiling: f32,
    character: f32,
    lookahead_ms: f32,
    tuning: ModernTuning,
    derived: Derived,

    delay: DelayLine,
    window_max: SlidingWindowMax,
    sidechain: [OnePoleHighpass; 2],
    fast_env: [f32; 2],
    slow_env: [f32; 2],
    hold: [PeakHold; 2],
    stage1: [f32; 2],
    smoothed: [f32; 2],
    tracker: PeakTracker,
    patch: TransientPatch,

    gain_reduction: GainReduction,
}

impl LimiterModern {
    /// Create a new modern limiter sized for 44.1 kHz
    pub fn new() -> Self {
        let mut limiter = Self {
            sample_rate: 44_100.0,
            ceiling: 1.0,
            character: 0.0,
            lookahead_ms: 2.0,
            tuning: ModernTuning::new(),
            derived: Derived::default(),
            delay: DelayLine::default(),
            window_max: SlidingWindowMax::default(),
            sidechain: [OnePoleHighpass::default(); 2],
            fast_env: [0.0; 2],
            slow_env: [0.0; 2],
            hold: [PeakHold::default(); 2],
            stage1: [0.0; 2],
            smoothed: [0.0; 2],
            tracker: PeakTracker::default(),
            patch: TransientPatch::default(),
            gain_reduction: GainReduction::NONE,
        };
        limiter.allocate();
        limiter.update_derived();
        limiter
    }

    /// Size the lookahead buffers for `sample_rate` and reset all state
    pub fn prepare(&mut self, sample_rate: f64) -> Result<()> {
        self.sample_rate = validate_sample_rate(sample_rate)?;
        self.allocate();
        self.update_derived();
        self.reset();
        Ok(())
    }

    fn allocate(&mut self) {
        let capacity = lookahead_capacity(self.sample_rate);
        self.delay.allocate(capacity);
        self.window_max = SlidingWindowMax::with_capacity(capacity);
        self.apply_lookahead();
    }

    /// Clear delay line, envelopes, smoothers and patch state
    pub fn reset(&mut self) {
        self.delay.clear();
        self.window_max.clear();
        self.sidechain = [OnePoleHighpass::default(); 2];
        self.fast_env = [0.0; 2];
        self.slow_env = [0.0; 2];
        self.hold = [PeakHold::default(); 2];
        self.stage1 = [0.0; 2];
        self.smoothed = [0.0; 2];
        self.tracker = PeakTracker::default();
        self.patch = TransientPatch::default();
        self.gain_reduction = GainReduction::NONE;
    }

    /// Update ceiling (linear), character and lookahead. Never allocates.
    pub fn set_parameters(&mut self, ceiling: f32, character: f32, lookahead_ms: f32) {
        self.ceiling = sanitize(ceiling, MIN_CEILING, 1.0, 1.0);
        self.character = sanitize(character, 0.0, 1.0, 0.0);
        self.lookahead_ms = sanitize(lookahead_ms, 0.0, crate::MAX_LOOKAHEAD_MS, 0.0);
        self.apply_lookahead();
        self.update_derived();
    }

    /// Replace the advanced tuning; invalid fields fall back to defaults
    pub fn set_tuning(&mut self, mut tuning: ModernTuning) {
        tuning.validate();
        self.tuning = tuning;
        self.update_derived();
    }

    /// Get current tuning
    pub fn tuning(&self) -> &ModernTuning {
        &self.tuning
    }

    /// Get linear output ceiling
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Delay in samples
    pub fn latency_samples(&self) -> usize {
        self.delay.delay()
    }

    fn apply_lookahead(&mut self) {
        let frames = (f64::from(self.lookahead_ms) * self.sample_rate / 1000.0) as usize;
        let applied = self.delay.set_delay(frames);
        self.window_max.set_window(applied);
    }

    fn update_derived(&mut self) {
        let sr = self.sample_rate as f32;
        let t = self.character;
        let tuning = &self.tuning;

        let release_fast_ms = tuning.release_fast_ms;
        let release_slow_ms = tuning.release_slow_ms.max(release_fast_ms);
        let tau_div = (tuning.attack_tau_div * exp_lerp(0.85, 1.35, t)).clamp(0.25, 8.0);

        self.derived = Derived {
            hpf_coeff: (-2.0 * PI * tuning.sidechain_hpf_hz / sr).exp(),
            fast_strength: tuning.adapt_fast_strength * exp_lerp(0.85, 1.35, t),
            slow_strength: tuning.adapt_slow_strength * exp_lerp(0.9, 1.25, t),
            release_fast_ms: release_fast_ms * exp_lerp(1.25, 0.65, t),
            release_slow_ms: release_slow_ms * exp_lerp(1.2, 0.7, t),
            ratio_threshold: (tuning.ratio_base * (1.0 - t * tuning.ratio_slope)).max(0.05),
            transient_mix: (tuning.transient_mix * (1.0 - 0.65 * t)).clamp(0.0, 1.0),
            link_transients: (tuning.link_transients * (1.0 - 0.6 * t)).clamp(0.0, 1.0),
            link_release: (tuning.link_release * (1.0 - 0.35 * t)).clamp(0.0, 1.0),
            hold_samples: (tuning.hold_ms * 0.001 * sr) as u32,
            hold_release_coeff: one_pole_coeff(tuning.hold_release_ms, sr),
            smooth_attack_coeff: one_pole_coeff(self.lookahead_ms / tau_div, sr),
            smooth_release_base_ms: (tuning.release_smooth_base_ms * exp_lerp(1.25, 0.7, t))
                .clamp(0.0, 20.0),
            smooth_release_range_ms: (tuning.release_smooth_range_ms * exp_lerp(1.2, 0.75, t))
                .clamp(0.0, 50.0),
            patch_margin: db_to_linear(PATCH_MARGIN_DB),
            patch_release_samples: ((PATCH_RELEASE_MS * 0.001 * sr).round() as u32).max(1),
            patch_cooldown_samples: ((PATCH_COOLDOWN_MS * 0.001 * sr).round() as u32).max(1),
            soft_safety_strength: tuning.soft_safety_strength,
        };
    }

    /// Attenuation (dB) for one channel from its envelope pair
    #[inline]
    fn adaptive_atten(&self, fast: f32, slow: f32) -> f32 {
        let ratio = if slow > 0.001 { fast / slow } else { 2.0 };
        if ratio > self.derived.ratio_threshold {
            fast.max(slow * self.derived.transient_mix)
        } else {
            fast.max(slow)
        }
    }

    /// Extra gain needed on top of the predicted smoother output to bring
    /// the tracked peak down to full scale
    fn patch_target(&self, smoother: Smoother, steps: usize) -> f32 {
        let mut target = 1.0f32;
        for ch in 0..2 {
            let peak = self.tracker.max_channels[ch].max(1.0e-9);
            let predicted_db =
                smoother.predict(self.stage1[ch], self.smoothed[ch], overshoot_db(peak), steps);
            let predicted_gain = db_to_linear(-predicted_db);
            let required_gain = if peak > 1.0 { 1.0 / peak } else { 1.0 };
            target = target.min(required_gain / predicted_gain.max(1.0e-9));
        }
        target.clamp(0.0, 1.0)
    }

    /// Process one stereo frame in place
    pub fn process(&mut self, left: &mut f32, right: &mut f32) {
        let d = self.derived;
        let sr = self.sample_rate as f32;
        let input = [finite_or_zero(*left), finite_or_zero(*right)];
        let delayed = self.delay.push(input);

        let hpf = [
            self.sidechain[0].process(input[0], d.hpf_coeff),
            self.sidechain[1].process(input[1], d.hpf_coeff),
        ];
        let detector = [input[0].abs(), input[1].abs()];
        let lookahead_db = overshoot_db(self.window_max.push(detector[0].max(detector[1])));
        let overshoot = [overshoot_db(detector[0]), overshoot_db(detector[1])];

        let abs_wide = 0.5 * (detector[0] + detector[1]);
        let abs_hpf = 0.5 * (hpf[0].abs() + hpf[1].abs());
        let hf_ratio = if abs_wide > 1.0e-6 {
            (abs_hpf / abs_wide).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let low_bias = 1.0 - hf_ratio;

        let gr_proxy = self
            .fast_env
            .iter()
            .chain(&self.slow_env)
            .chain(&overshoot)
            .fold(0.0f32, |acc, &v| acc.max(v));
        let stretch = low_bias * (gr_proxy / GR_NORM_RANGE_DB).clamp(0.0, 1.0);

        let fast_ms = (d.release_fast_ms * (1.0 + d.fast_strength * stretch)).max(0.05);
        let slow_ms = (d.release_slow_ms * (1.0 + d.slow_strength * stretch)).max(fast_ms);
        let fast_coeff = decay_coeff(fast_ms, sr);
        let slow_coeff = decay_coeff(slow_ms, sr);

        for ch in 0..2 {
            self.fast_env[ch] = follow(self.fast_env[ch], overshoot[ch], fast_coeff);
            self.slow_env[ch] = follow(self.slow_env[ch], overshoot[ch], slow_coeff);
        }
        link(&mut self.fast_env, d.link_transients);
        link(&mut self.slow_env, d.link_release);

        let required_db = lookahead_db.max(0.0);
        let mut held = [0.0f32; 2];
        for ch in 0..2 {
            let atten = self
                .adaptive_atten(self.fast_env[ch], self.slow_env[ch])
                .max(required_db);
            held[ch] = self.hold[ch].process(atten, d.hold_samples, d.hold_release_coeff);
        }

        let smoother = Smoother {
            attack: d.smooth_attack_coeff,
            release: one_pole_coeff(
                d.smooth_release_base_ms + d.smooth_release_range_ms * stretch,
                sr,
            ),
        };
        for ch in 0..2 {
            self.stage1[ch] = smoother.step(self.stage1[ch], held[ch]);
            self.smoothed[ch] = smoother.step(self.smoothed[ch], self.stage1[ch]);
        }

        self.patch.tick_cooldown();
        let transient_db = (self.fast_env[0] - self.slow_env[0])
            .max(self.fast_env[1] - self.slow_env[1])
            .max(0.0);
        let is_transient = transient_db > TRANSIENT_THRESHOLD_DB;

        let falling = self.tracker.update(detector, d.patch_margin);
        if falling && is_transient && self.patch.can_trigger() {
            let attack_samples = self.delay.delay().max(1);
            let target = self.patch_target(smoother, attack_samples);
            if target < PATCH_MIN_DEPTH {
                self.patch.trigger(
                    target,
                    attack_samples as u32,
                    d.patch_release_samples,
                    d.patch_cooldown_samples,
                );
            }
            self.tracker.release();
        }
        let patch_gain = self.patch.next_gain();

        let mut effective = [1.0f32; 2];
        let mut output = [0.0f32; 2];
        for ch in 0..2 {
            effective[ch] = db_to_linear(-self.smoothed[ch]) * patch_gain;
            let y = delayed[ch] * effective[ch] * self.ceiling;
            output[ch] = soft_safety(y, self.ceiling, d.soft_safety_strength)
                .clamp(-self.ceiling, self.ceiling);
        }

        self.gain_reduction = GainReduction::from_channels(1.0 - effective[0], 1.0 - effective[1]);
        *left = output[0];
        *right = output[1];
    }

    /// Get combined gain reduction (1 - lowest channel gain)
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

impl Default for LimiterModern {
    fn default() -> Self {
        Self::new()
    }
}
