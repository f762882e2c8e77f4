//! Error types for the dynamics core
//!
//! Only the setup and control paths can fail. Per-sample processing is total
//! and never returns an error.

use thiserror::Error;

/// Lowest sample rate accepted by `prepare`
pub const MIN_SAMPLE_RATE: f64 = 1_000.0;

/// Highest sample rate accepted by `prepare` (192 kHz at 16x oversampling)
pub const MAX_SAMPLE_RATE: f64 = 3_072_000.0;

/// Result type for dynamics operations
pub type Result<T> = std::result::Result<T, DynamicsError>;

/// Errors that can occur while configuring the dynamics core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DynamicsError {
    /// Sample rate outside the supported range (or not finite)
    #[error("Invalid sample rate: {0} Hz (must be between 1000 and 3072000)")]
    InvalidSampleRate(f64),

    /// The audio side of the parameter channel has been dropped
    #[error("Parameter channel disconnected")]
    Disconnected,
}

/// Check that a sample rate can be used to size buffers and derive coefficients
pub(crate) fn validate_sample_rate(sample_rate: f64) -> Result<f64> {
    if sample_rate.is_finite() && (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
        Ok(sample_rate)
    } else {
        Err(DynamicsError::InvalidSampleRate(sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_and_oversampled_rates() {
        for rate in [44_100.0, 48_000.0, 96_000.0, 192_000.0, 768_000.0, 3_072_000.0] {
            assert_eq!(validate_sample_rate(rate), Ok(rate));
        }
    }

    #[test]
    fn rejects_invalid_rates() {
        for rate in [0.0, -44_100.0, 500.0, 4_000_000.0, f64::NAN, f64::INFINITY] {
            assert!(validate_sample_rate(rate).is_err(), "{} should be rejected", rate);
        }
    }

    #[test]
    fn error_message_names_the_rate() {
        let err = DynamicsError::InvalidSampleRate(12.0);
        assert!(err.to_string().contains("12"));
    }
}
