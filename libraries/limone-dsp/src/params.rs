//! Parameter snapshots from a control thread to the audio thread
//!
//! The control side sends whole [`DynamicsParams`] snapshots; the audio side
//! picks up only the newest one at the start of each block, so it never sees
//! a half-applied update.

use std::sync::{Arc, Weak};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::clipper::ClipperSettings;
use crate::error::{DynamicsError, Result};
use crate::limiter::{LimiterSettings, ModernTuning};

/// Queue depth of the parameter channel
pub const PARAM_QUEUE_CAPACITY: usize = 32;

/// Complete parameter set for one [`DynamicsProcessor`](crate::DynamicsProcessor)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DynamicsParams {
    pub clipper: ClipperSettings,
    pub limiter: LimiterSettings,
    pub tuning: ModernTuning,
}

impl DynamicsParams {
    /// Snapshot whose modern tuning follows the limiter's Character control
    pub fn linked(clipper: ClipperSettings, limiter: LimiterSettings) -> Self {
        Self {
            clipper,
            limiter,
            tuning: ModernTuning::for_character(limiter.character),
        }
    }

    /// Clamp every field to its valid range
    pub fn validate(&mut self) {
        self.clipper.validate();
        self.limiter.validate();
        self.tuning.validate();
    }
}

/// Create a connected sender/receiver pair
///
/// # Example
///
/// ```
/// use limone_dsp::{parameter_channel, DynamicsParams};
///
/// let (tx, rx) = parameter_channel();
/// tx.send(DynamicsParams::default()).unwrap();
/// assert!(rx.latest().is_some());
/// assert!(rx.latest().is_none());
/// ```
pub fn parameter_channel() -> (ParamSender, ParamReceiver) {
    let (tx, rx) = bounded(PARAM_QUEUE_CAPACITY);
    let alive = Arc::new(());

    let sender = ParamSender {
        tx,
        overflow: rx.clone(),
        receiver_alive: Arc::downgrade(&alive),
    };
    let receiver = ParamReceiver { rx, _alive: alive };
    (sender, receiver)
}

/// Control-thread end of the parameter channel
pub struct ParamSender {
    tx: Sender<DynamicsParams>,
    /// Used only to drop the oldest snapshot when the queue is full
    overflow: Receiver<DynamicsParams>,
    receiver_alive: Weak<()>,
}

impl ParamSender {
    /// Queue a snapshot without blocking
    ///
    /// When the queue is full the oldest queued snapshot is discarded.
    /// Fails with [`DynamicsError::Disconnected`] once the receiver is gone.
    pub fn send(&self, params: DynamicsParams) -> Result<()> {
        if self.receiver_alive.strong_count() == 0 {
            return Err(DynamicsError::Disconnected);
        }

        let mut pending = params;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(params)) => {
                    if self.overflow.try_recv().is_ok() {
                        tracing::warn!("Parameter queue full, dropping oldest snapshot");
                    }
                    pending = params;
                }
                Err(TrySendError::Disconnected(_)) => return Err(DynamicsError::Disconnected),
            }
        }
    }

    /// Number of snapshots waiting to be picked up
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    pub fn is_connected(&self) -> bool {
        self.receiver_alive.strong_count() > 0
    }
}

/// Audio-thread end of the parameter channel
pub struct ParamReceiver {
    rx: Receiver<DynamicsParams>,
    _alive: Arc<()>,
}

impl ParamReceiver {
    /// Drain the queue and return the newest snapshot, if any (non-blocking)
    pub fn latest(&self) -> Option<DynamicsParams> {
        self.rx.try_iter().last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with_drive(drive_db: f32) -> DynamicsParams {
        let mut params = DynamicsParams::default();
        params.clipper.drive_db = drive_db;
        params
    }

    #[test]
    fn latest_returns_newest_snapshot() {
        let (tx, rx) = parameter_channel();
        for drive in [1.0, 2.0, 3.0] {
            tx.send(params_with_drive(drive)).unwrap();
        }
        assert_eq!(tx.pending(), 3);

        let latest = rx.latest().unwrap();
        assert_eq!(latest.clipper.drive_db, 3.0);
        assert_eq!(tx.pending(), 0);
        assert!(rx.latest().is_none());
    }

    #[test]
    fn full_queue_drops_oldest() {
        let (tx, rx) = parameter_channel();
        for i in 0..(PARAM_QUEUE_CAPACITY + 10) {
            tx.send(params_with_drive(i as f32 * 0.1)).unwrap();
        }
        assert_eq!(tx.pending(), PARAM_QUEUE_CAPACITY);

        let latest = rx.latest().unwrap();
        let expected = (PARAM_QUEUE_CAPACITY + 9) as f32 * 0.1;
        assert_eq!(latest.clipper.drive_db, expected);
    }

    #[test]
    fn dropped_receiver_disconnects() {
        let (tx, rx) = parameter_channel();
        assert!(tx.is_connected());
        drop(rx);
        assert!(!tx.is_connected());
        assert_eq!(
            tx.send(DynamicsParams::default()),
            Err(DynamicsError::Disconnected)
        );
    }

    #[test]
    fn linked_tuning_follows_character() {
        let limiter = LimiterSettings {
            character: 1.0,
            ..LimiterSettings::new()
        };
        let params = DynamicsParams::linked(ClipperSettings::default(), limiter);
        assert_eq!(params.tuning, ModernTuning::for_character(1.0));
    }

    #[test]
    fn sender_works_across_threads() {
        let (tx, rx) = parameter_channel();
        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                tx.send(params_with_drive(i as f32 * 0.1)).unwrap();
            }
        });
        handle.join().unwrap();

        let latest = rx.latest().unwrap();
        assert_eq!(latest.clipper.drive_db, 99.0 * 0.1);
    }
}
