//! Block processor: clipper into limiter, with parameter pickup and metering

use std::sync::Arc;

use crate::clipper::Clipper;
use crate::effect::{sample_rate_changed, AudioEffect, RejectedRate};
use crate::error::{validate_sample_rate, Result};
use crate::limiter::Limiter;
use crate::meter::{DynamicsMeters, GainReduction, MeterReading};
use crate::params::{DynamicsParams, ParamReceiver};

/// Stereo dynamics chain for the audio thread
///
/// Each block:
/// 1. Applies the newest queued [`DynamicsParams`] snapshot, if any
/// 2. Runs every frame through the clipper and then the limiter
/// 3. Publishes block maxima of gain reduction and output peak
///
/// # Example
///
/// ```
/// use limone_dsp::{parameter_channel, DynamicsParams, DynamicsProcessor};
///
/// let (tx, rx) = parameter_channel();
/// let mut processor = DynamicsProcessor::with_parameter_receiver(rx);
/// processor.prepare(48_000.0).unwrap();
/// let meters = processor.meters();
///
/// tx.send(DynamicsParams::default()).unwrap();
/// let mut block = vec![0.5f32; 512];
/// processor.process_block(&mut block);
///
/// let reading = meters.take();
/// assert!(reading.output_peak[0] <= 1.0);
/// ```
pub struct DynamicsProcessor {
    clipper: Clipper,
    limiter: Limiter,
    params: DynamicsParams,
    receiver: Option<ParamReceiver>,
    meters: Arc<DynamicsMeters>,
    sample_rate: f64,
    rejected_rate: RejectedRate,
    enabled: bool,
}

impl DynamicsProcessor {
    pub fn new() -> Self {
        let params = DynamicsParams::default();
        let mut processor = Self {
            clipper: Clipper::new(),
            limiter: Limiter::new(),
            params,
            receiver: None,
            meters: Arc::new(DynamicsMeters::new()),
            sample_rate: 0.0,
            rejected_rate: RejectedRate::default(),
            enabled: true,
        };
        processor.apply_params(&params);
        processor
    }

    /// Create a processor that picks up snapshots from `receiver` at block start
    pub fn with_parameter_receiver(receiver: ParamReceiver) -> Self {
        let mut processor = Self::new();
        processor.receiver = Some(receiver);
        processor
    }

    /// Prepare both stages for a new sample rate
    pub fn prepare(&mut self, sample_rate: f64) -> Result<()> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        self.clipper.prepare(sample_rate)?;
        self.limiter.prepare(sample_rate)?;
        self.sample_rate = sample_rate;

        tracing::info!(
            "Dynamics processor prepared: {} Hz, latency {} samples",
            sample_rate,
            self.latency_samples()
        );
        Ok(())
    }

    /// Validate and apply a parameter snapshot
    pub fn apply_params(&mut self, params: &DynamicsParams) {
        let mut params = *params;
        params.validate();

        self.clipper.apply_settings(params.clipper);
        self.limiter.set_tuning(params.tuning);
        self.limiter.set_parameters(&params.limiter);
        self.params = params;
    }

    /// Parameters currently in effect
    pub fn params(&self) -> &DynamicsParams {
        &self.params
    }

    /// Shared meter cells for a UI thread
    pub fn meters(&self) -> Arc<DynamicsMeters> {
        Arc::clone(&self.meters)
    }

    /// Total delay of the chain in samples
    pub fn latency_samples(&self) -> usize {
        self.limiter.latency_samples()
    }

    pub fn clipper(&self) -> &Clipper {
        &self.clipper
    }

    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    /// Process an interleaved stereo block in place
    ///
    /// A trailing odd sample is left untouched.
    pub fn process_block(&mut self, buffer: &mut [f32]) {
        if let Some(params) = self.receiver.as_ref().and_then(ParamReceiver::latest) {
            self.apply_params(&params);
        }

        let mut reading = MeterReading::default();
        for frame in buffer.chunks_exact_mut(2) {
            if let [left, right] = frame {
                self.clipper.process(left, right);
                reading.clipper = reading.clipper.max(self.clipper.meter());

                self.limiter.process(left, right);
                reading.limiter = reading.limiter.max(self.limiter.meter());

                reading.output_peak[0] = reading.output_peak[0].max(left.abs());
                reading.output_peak[1] = reading.output_peak[1].max(right.abs());
            }
        }

        self.meters.publish(&reading);
    }

    /// Gain reduction latched by the last processed frame
    pub fn gain_reduction(&self) -> (GainReduction, GainReduction) {
        (self.clipper.meter(), self.limiter.meter())
    }
}

impl Default for DynamicsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for DynamicsProcessor {
    fn process_interleaved(&mut self, buffer: &mut [f32], sample_rate: u32) {
        if !self.enabled {
            return;
        }

        if sample_rate_changed(self.sample_rate, sample_rate) {
            match self.prepare(f64::from(sample_rate)) {
                Ok(()) => self.rejected_rate.clear(),
                Err(e) => {
                    if self.rejected_rate.record(sample_rate) {
                        tracing::warn!("Dynamics processor muted: {}", e);
                    }
                    buffer.fill(0.0);
                    return;
                }
            }
        }

        self.process_block(buffer);
    }

    fn reset(&mut self) {
        AudioEffect::reset(&mut self.clipper);
        AudioEffect::reset(&mut self.limiter);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "Dynamics"
    }

    fn latency_samples(&self) -> usize {
        DynamicsProcessor::latency_samples(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipper::{ClipperMode, ClipperSettings};
    use crate::limiter::LimiterSettings;
    use crate::params::parameter_channel;

    #[test]
    fn default_chain_respects_ceiling() {
        let mut processor = DynamicsProcessor::new();
        processor.prepare(44_100.0).unwrap();
        let ceiling = processor.limiter().ceiling();

        let mut block: Vec<f32> = (0..4_096).map(|i| 1.5 * (i as f32 * 0.01).sin()).collect();
        processor.process_block(&mut block);
        assert!(block.iter().all(|s| s.abs() <= ceiling + 1e-6));
    }

    #[test]
    fn snapshot_is_applied_at_block_start() {
        let (tx, rx) = parameter_channel();
        let mut processor = DynamicsProcessor::with_parameter_receiver(rx);
        processor.prepare(48_000.0).unwrap();

        let params = DynamicsParams {
            clipper: ClipperSettings {
                drive_db: 6.0,
                knee: 0.2,
                mode: ClipperMode::Hard,
            },
            ..DynamicsParams::default()
        };
        tx.send(params).unwrap();

        let mut block = vec![0.0f32; 64];
        processor.process_block(&mut block);
        assert_eq!(processor.params().clipper, params.clipper);
        assert_eq!(processor.clipper().mode(), ClipperMode::Hard);
    }

    #[test]
    fn block_meters_are_published() {
        let mut processor = DynamicsProcessor::new();
        processor.prepare(48_000.0).unwrap();
        processor.apply_params(&DynamicsParams {
            clipper: ClipperSettings::loud(),
            limiter: LimiterSettings {
                lookahead_ms: 0.0,
                ..LimiterSettings::new()
            },
            ..DynamicsParams::default()
        });

        let meters = processor.meters();
        let mut block = vec![0.9f32; 256];
        processor.process_block(&mut block);

        let reading = meters.take();
        assert!(reading.clipper.combined > 0.0);
        assert!(reading.output_peak[0] > 0.0);
        assert!(reading.output_peak[0] <= processor.limiter().ceiling() + 1e-6);
        assert_eq!(meters.take(), MeterReading::default());
    }

    #[test]
    fn latency_matches_limiter() {
        let mut processor = DynamicsProcessor::new();
        processor.prepare(48_000.0).unwrap();
        assert_eq!(processor.latency_samples(), 96);
        assert_eq!(AudioEffect::latency_samples(&processor), 96);
    }

    #[test]
    fn invalid_sample_rate_is_rejected() {
        let mut processor = DynamicsProcessor::new();
        assert!(processor.prepare(0.0).is_err());
        assert!(processor.prepare(f64::NAN).is_err());
    }

    #[test]
    fn unsupported_rate_outputs_silence() {
        let mut processor = DynamicsProcessor::new();
        let meters = processor.meters();
        let mut block = vec![2.0f32; 128];
        processor.process_interleaved(&mut block, 500);
        assert!(block.iter().all(|&s| s == 0.0));
        assert_eq!(meters.take(), MeterReading::default());
    }
}
