//! Gain-reduction readouts and lock-free meter publication
//!
//! Every engine latches a [`GainReduction`] on each `process` call. The block
//! processor folds those into block maxima and publishes them to
//! [`DynamicsMeters`], which a UI thread polls with [`DynamicsMeters::take`].
//!
//! Polling is lossy by nature, so publication keeps the most extreme value
//! since the last read and the read resets it.

use std::sync::atomic::{AtomicU32, Ordering};

/// Combined and per-channel gain reduction, each in [0, 1]
///
/// 0.0 means no reduction, 1.0 means the channel was silenced.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GainReduction {
    pub combined: f32,
    pub left: f32,
    pub right: f32,
}

impl GainReduction {
    /// No gain reduction on either channel
    pub const NONE: Self = Self {
        combined: 0.0,
        left: 0.0,
        right: 0.0,
    };

    /// Build a readout whose combined value is the larger channel reduction
    pub fn from_channels(left: f32, right: f32) -> Self {
        Self {
            combined: left.max(right),
            left,
            right,
        }
    }

    /// Element-wise maximum of two readouts
    pub fn max(self, other: Self) -> Self {
        Self {
            combined: self.combined.max(other.combined),
            left: self.left.max(other.left),
            right: self.right.max(other.right),
        }
    }
}

/// An `f32` peak cell shared between threads.
///
/// Values are stored as IEEE-754 bit patterns. For non-negative floats the
/// bit pattern orders the same way as the value, so `fetch_max` on the
/// integer is a lock-free float maximum.
#[derive(Debug, Default)]
pub struct AtomicPeak(AtomicU32);

impl AtomicPeak {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Raise the stored peak to `value` if it is larger. Negative and NaN values count as 0.
    ///
    /// `-0.0` is rejected too: its sign bit would make it the largest pattern.
    #[inline]
    pub fn publish(&self, value: f32) {
        if value > 0.0 && value.is_finite() {
            self.0.fetch_max(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Current peak without resetting it
    pub fn peek(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Read the peak and reset it to zero
    pub fn take(&self) -> f32 {
        f32::from_bits(self.0.swap(0, Ordering::Relaxed))
    }
}

/// Atomic counterpart of [`GainReduction`]
#[derive(Debug, Default)]
pub struct GainReductionMeter {
    combined: AtomicPeak,
    left: AtomicPeak,
    right: AtomicPeak,
}

impl GainReductionMeter {
    pub fn publish(&self, gr: GainReduction) {
        self.combined.publish(gr.combined);
        self.left.publish(gr.left);
        self.right.publish(gr.right);
    }

    pub fn take(&self) -> GainReduction {
        GainReduction {
            combined: self.combined.take(),
            left: self.left.take(),
            right: self.right.take(),
        }
    }
}

/// Everything a UI polls from the audio thread
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterReading {
    pub clipper: GainReduction,
    pub limiter: GainReduction,
    /// Absolute output peak per channel (left, right)
    pub output_peak: [f32; 2],
}

/// Meter cells written by the audio thread and drained by a UI thread
#[derive(Debug, Default)]
pub struct DynamicsMeters {
    clipper: GainReductionMeter,
    limiter: GainReductionMeter,
    output_left: AtomicPeak,
    output_right: AtomicPeak,
}

impl DynamicsMeters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish block maxima (audio thread)
    pub fn publish(&self, reading: &MeterReading) {
        self.clipper.publish(reading.clipper);
        self.limiter.publish(reading.limiter);
        self.output_left.publish(reading.output_peak[0]);
        self.output_right.publish(reading.output_peak[1]);
    }

    /// Take the maxima accumulated since the previous call (UI thread)
    pub fn take(&self) -> MeterReading {
        MeterReading {
            clipper: self.clipper.take(),
            limiter: self.limiter.take(),
            output_peak: [self.output_left.take(), self.output_right.take()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn combined_is_channel_maximum() {
        let gr = GainReduction::from_channels(0.2, 0.5);
        assert_eq!(gr.combined, 0.5);
        assert_eq!(gr.left, 0.2);
        assert_eq!(gr.right, 0.5);
    }

    #[test]
    fn peak_keeps_maximum_until_taken() {
        let peak = AtomicPeak::new();
        peak.publish(0.3);
        peak.publish(0.7);
        peak.publish(0.1);
        assert_eq!(peak.peek(), 0.7);
        assert_eq!(peak.take(), 0.7);
        assert_eq!(peak.take(), 0.0);
    }

    #[test]
    fn peak_ignores_negative_and_nan() {
        let peak = AtomicPeak::new();
        peak.publish(-1.0);
        peak.publish(f32::NAN);
        peak.publish(f32::INFINITY);
        assert_eq!(peak.take(), 0.0);

        peak.publish(-0.0);
        peak.publish(0.5);
        assert_eq!(peak.take(), 0.5);
        assert_eq!(peak.take().to_bits(), 0);
    }

    #[test]
    fn meters_reset_on_read() {
        let meters = DynamicsMeters::new();
        meters.publish(&MeterReading {
            clipper: GainReduction::from_channels(0.1, 0.2),
            limiter: GainReduction::from_channels(0.4, 0.3),
            output_peak: [0.9, 0.8],
        });

        let reading = meters.take();
        assert_eq!(reading.clipper.combined, 0.2);
        assert_eq!(reading.limiter.left, 0.4);
        assert_eq!(reading.output_peak, [0.9, 0.8]);

        assert_eq!(meters.take(), MeterReading::default());
    }

    #[test]
    fn concurrent_publishers_keep_the_largest_value() {
        let meters = Arc::new(DynamicsMeters::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let meters = Arc::clone(&meters);
                thread::spawn(move || {
                    for i in 0..1000 {
                        let v = (t * 1000 + i) as f32 / 4000.0;
                        meters.publish(&MeterReading {
                            limiter: GainReduction::from_channels(v, v),
                            ..MeterReading::default()
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let reading = meters.take();
        assert_eq!(reading.limiter.combined, 3999.0 / 4000.0);
    }
}
