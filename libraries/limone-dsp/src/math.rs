//! Small DSP helpers shared by the clipper and limiter engines.
//!
//! Everything here is allocation-free and safe to call on the audio thread.

/// Convert decibels to linear gain
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Convert linear gain to decibels (floored at -120 dB for silence)
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 1.0e-6 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}

/// Amount in dB by which a detector value exceeds full scale, 0 when it doesn't
#[inline]
pub(crate) fn overshoot_db(detector: f32) -> f32 {
    if detector > 1.0 {
        20.0 * detector.log10()
    } else {
        0.0
    }
}

/// Cubic smoothstep on [0, 1]; inputs outside the range are clamped
#[inline]
pub(crate) fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Exponential interpolation from `a` to `b`, linear when either end is not positive
#[inline]
pub(crate) fn exp_lerp(a: f32, b: f32, t: f32) -> f32 {
    if a <= 0.0 || b <= 0.0 {
        a + (b - a) * t
    } else {
        a * (b / a).powf(t)
    }
}

/// One-pole smoothing coefficient (`1 - e^(-1/n)`) for a time constant in ms.
///
/// A zero time constant yields 1.0, i.e. the filter jumps straight to its target.
#[inline]
pub(crate) fn one_pole_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = time_ms * 0.001 * sample_rate;
    if samples <= 0.0 {
        1.0
    } else {
        1.0 - (-1.0 / samples).exp()
    }
}

/// Exponential decay multiplier (`e^(-1/n)`) for a release time in ms
#[inline]
pub(crate) fn decay_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = time_ms * 0.001 * sample_rate;
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}

/// Clamp a control value into `[min, max]`, replacing NaN/Inf with `fallback`
#[inline]
pub(crate) fn sanitize(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Gain reduction implied by an input/output magnitude pair, in [0, 1]
#[inline]
pub(crate) fn reduction(abs_in: f32, abs_out: f32) -> f32 {
    if abs_in > 0.0 && abs_out < abs_in {
        1.0 - abs_out / abs_in
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_conversions() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-3);
        assert!((linear_to_db(1.0)).abs() < 1e-6);
        assert_eq!(linear_to_db(0.0), -120.0);
    }

    #[test]
    fn overshoot_only_above_full_scale() {
        assert_eq!(overshoot_db(0.7), 0.0);
        assert_eq!(overshoot_db(1.0), 0.0);
        assert!((overshoot_db(2.0) - 6.0206).abs() < 1e-3);
    }

    #[test]
    fn smoothstep_endpoints() {
        assert_eq!(smoothstep(-1.0), 0.0);
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(0.5), 0.5);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(2.0), 1.0);
    }

    #[test]
    fn exp_lerp_hits_both_ends() {
        assert!((exp_lerp(0.85, 1.35, 0.0) - 0.85).abs() < 1e-6);
        assert!((exp_lerp(0.85, 1.35, 1.0) - 1.35).abs() < 1e-6);
        // geometric mean at the midpoint
        assert!((exp_lerp(1.0, 4.0, 0.5) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn zero_time_constant_is_instant() {
        assert_eq!(one_pole_coeff(0.0, 48000.0), 1.0);
        assert_eq!(decay_coeff(0.0, 48000.0), 0.0);
        let c = one_pole_coeff(10.0, 48000.0);
        assert!(c > 0.0 && c < 0.01);
    }

    #[test]
    fn sanitize_rejects_non_finite() {
        assert_eq!(sanitize(f32::NAN, 0.0, 1.0, 0.25), 0.25);
        assert_eq!(sanitize(f32::INFINITY, 0.0, 1.0, 0.25), 0.25);
        assert_eq!(sanitize(3.0, 0.0, 1.0, 0.25), 1.0);
    }

    #[test]
    fn reduction_is_zero_without_attenuation() {
        assert_eq!(reduction(0.0, 0.0), 0.0);
        assert_eq!(reduction(0.5, 0.5), 0.0);
        assert!((reduction(2.0, 1.0) - 0.5).abs() < 1e-6);
    }
}
