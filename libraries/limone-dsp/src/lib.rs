//! Limone DSP
//!
//! Real-time dynamics core of the Limone clipper/limiter.
//!
//! This crate provides:
//! - A clipper stage with a hard clamp and an anti-aliased soft-knee curve
//! - A limiter stage with a classic adaptive-ceiling engine and a modern
//!   lookahead engine
//! - A block processor that chains both, picks up parameter snapshots from a
//!   control thread and publishes lock-free meters
//!
//! Everything on the audio path is allocation-free and total: bad input is
//! silenced, bad parameters are clamped.
//!
//! # Example: Frame-by-frame
//!
//! ```rust
//! use limone_dsp::{Clipper, ClipperSettings, Limiter, LimiterSettings};
//!
//! let mut clipper = Clipper::with_settings(ClipperSettings::warm());
//! let mut limiter = Limiter::with_settings(LimiterSettings::default());
//! clipper.prepare(48_000.0).unwrap();
//! limiter.prepare(48_000.0).unwrap();
//!
//! let (mut left, mut right) = (1.4f32, -0.7f32);
//! clipper.process(&mut left, &mut right);
//! limiter.process(&mut left, &mut right);
//! assert!(left.abs() <= limiter.ceiling());
//! ```
//!
//! # Example: Block processing with a control thread
//!
//! ```rust
//! use limone_dsp::{parameter_channel, DynamicsParams, DynamicsProcessor, LimiterSettings};
//!
//! let (tx, rx) = parameter_channel();
//! let mut processor = DynamicsProcessor::with_parameter_receiver(rx);
//! processor.prepare(44_100.0).unwrap();
//!
//! let mut params = DynamicsParams::default();
//! params.limiter = LimiterSettings::aggressive();
//! tx.send(params).unwrap();
//!
//! let mut buffer = vec![0.8f32; 1024]; // interleaved stereo
//! processor.process_block(&mut buffer);
//! println!("latency: {} samples", processor.latency_samples());
//! ```

pub mod clipper;
mod effect;
mod error;
pub mod limiter;
mod math;
mod meter;
mod params;
mod processor;

/// Longest supported lookahead in milliseconds
///
/// Delay buffers are sized for this in `prepare`, so changing the lookahead
/// afterwards never allocates.
pub const MAX_LOOKAHEAD_MS: f32 = 5.0;

pub use clipper::{Clipper, ClipperMode, ClipperSettings, HardClipper, SoftClipper};
pub use effect::AudioEffect;
pub use error::{DynamicsError, Result, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
pub use limiter::{
    CharacterCurve, Limiter, LimiterClassic, LimiterMode, LimiterModern, LimiterSettings,
    ModernTuning, SlidingWindowMax,
};
pub use math::{db_to_linear, linear_to_db};
pub use meter::{AtomicPeak, DynamicsMeters, GainReduction, GainReductionMeter, MeterReading};
pub use params::{parameter_channel, DynamicsParams, ParamReceiver, ParamSender};
pub use processor::DynamicsProcessor;
