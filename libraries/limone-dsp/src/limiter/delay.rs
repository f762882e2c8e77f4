//! Stereo lookahead delay line

use crate::MAX_LOOKAHEAD_MS;

/// Extra frames on top of the maximum lookahead
const CAPACITY_MARGIN: usize = 64;

/// Frame capacity needed to hold the maximum lookahead at `sample_rate`
pub(crate) fn lookahead_capacity(sample_rate: f64) -> usize {
    (f64::from(MAX_LOOKAHEAD_MS) * sample_rate / 1000.0).ceil() as usize + CAPACITY_MARGIN
}

/// Fixed-capacity ring buffer of stereo frames
///
/// The buffer is sized once in [`DelayLine::allocate`]; changing the delay
/// afterwards never allocates.
#[derive(Debug, Clone, Default)]
pub(crate) struct DelayLine {
    buffer: Vec<[f32; 2]>,
    write_pos: usize,
    delay: usize,
}

impl DelayLine {
    /// (Re)allocate for `capacity` frames and clear the contents
    pub fn allocate(&mut self, capacity: usize) {
        self.buffer.clear();
        self.buffer.resize(capacity.max(1), [0.0; 2]);
        self.write_pos = 0;
        self.delay = self.delay.min(self.max_delay());
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn max_delay(&self) -> usize {
        self.buffer.len().saturating_sub(1)
    }

    /// Set the delay in frames, clamped to the capacity
    ///
    /// Returns the delay actually applied.
    pub fn set_delay(&mut self, frames: usize) -> usize {
        self.delay = frames.min(self.max_delay());
        self.delay
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn clear(&mut self) {
        self.buffer.fill([0.0; 2]);
        self.write_pos = 0;
    }

    /// Write one frame and return the frame written `delay` frames earlier
    #[inline]
    pub fn push(&mut self, frame: [f32; 2]) -> [f32; 2] {
        let capacity = self.buffer.len();
        if capacity == 0 {
            return frame;
        }

        self.buffer[self.write_pos] = frame;
        let read_pos = (self.write_pos + capacity - self.delay) % capacity;
        let delayed = self.buffer[read_pos];
        self.write_pos = (self.write_pos + 1) % capacity;
        delayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_delay_passes_through() {
        let mut line = DelayLine::default();
        line.allocate(8);
        assert_eq!(line.push([0.5, -0.5]), [0.5, -0.5]);
    }

    #[test]
    fn delays_by_requested_frames() {
        let mut line = DelayLine::default();
        line.allocate(16);
        line.set_delay(3);

        let outputs: Vec<f32> = (1..=6).map(|i| line.push([i as f32, 0.0])[0]).collect();
        assert_eq!(outputs, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn delay_is_clamped_to_capacity() {
        let mut line = DelayLine::default();
        line.allocate(4);
        assert_eq!(line.set_delay(100), 3);
    }

    #[test]
    fn capacity_covers_max_lookahead() {
        let capacity = lookahead_capacity(48_000.0);
        assert!(capacity > 240);
        assert_eq!(capacity, 240 + CAPACITY_MARGIN);
    }

    #[test]
    fn unallocated_line_is_transparent() {
        let mut line = DelayLine::default();
        assert_eq!(line.push([0.25, 0.75]), [0.25, 0.75]);
    }
}
