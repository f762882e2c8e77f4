//! Block-level effect interface
//!
//! The engines in this crate process one stereo frame at a time. This trait
//! lets hosts and tests drive them over interleaved stereo buffers instead.

/// Trait for effects that process interleaved stereo buffers
///
/// # Safety
/// - Must NOT allocate memory in `process_interleaved()` while the sample rate
///   stays the same (real-time constraint)
/// - Must be Send so the effect can be handed to the audio thread
pub trait AudioEffect: Send {
    /// Process audio buffer in-place
    ///
    /// # Arguments
    /// * `buffer` - Interleaved stereo samples (L, R, L, R, ...)
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// A change of sample rate re-prepares the effect before processing.
    /// A trailing odd sample is left untouched.
    fn process_interleaved(&mut self, buffer: &mut [f32], sample_rate: u32);

    /// Reset effect state (e.g., when seeking or changing tracks)
    fn reset(&mut self);

    /// Enable/disable the effect
    fn set_enabled(&mut self, enabled: bool);

    /// Check if effect is enabled
    fn is_enabled(&self) -> bool;

    /// Get effect name (for debugging)
    fn name(&self) -> &str;

    /// Delay introduced by the effect, in samples per channel
    fn latency_samples(&self) -> usize {
        0
    }
}

/// True when `sample_rate` differs from the rate an effect was prepared with
#[inline]
pub(crate) fn sample_rate_changed(prepared: f64, sample_rate: u32) -> bool {
    (prepared - f64::from(sample_rate)).abs() > 0.5
}

/// Last sample rate an effect failed to prepare for
///
/// While the host keeps presenting that rate the effect outputs silence and
/// only the first failure is logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RejectedRate(Option<u32>);

impl RejectedRate {
    /// Remember a failed rate. Returns true when it differs from the last one.
    pub fn record(&mut self, sample_rate: u32) -> bool {
        let first = self.0 != Some(sample_rate);
        self.0 = Some(sample_rate);
        first
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}
