//! Sliding-window maximum over a detector stream
//!
//! Monotonic deque of `(sample index, value)` pairs. Values are non-increasing
//! from front to back, so the front always holds the maximum of the window.
//! Each value is pushed and popped at most once, giving O(1) amortized cost
//! per sample.

use std::collections::VecDeque;

/// Running maximum over the trailing `window + 1` samples
///
/// A sample pushed at index `i` stays visible while the newest index is in
/// `[i, i + window]`.
///
/// # Example
///
/// ```
/// use limone_dsp::SlidingWindowMax;
///
/// let mut max = SlidingWindowMax::with_capacity(8);
/// max.set_window(2);
/// assert_eq!(max.push(0.5), 0.5);
/// assert_eq!(max.push(0.2), 0.5);
/// assert_eq!(max.push(0.1), 0.5);
/// assert_eq!(max.push(0.1), 0.2);
/// ```
#[derive(Debug, Clone)]
pub struct SlidingWindowMax {
    entries: VecDeque<(u64, f32)>,
    next_index: u64,
    window: usize,
}

impl SlidingWindowMax {
    /// Create a tracker able to hold a window of up to `max_window` samples
    /// without reallocating
    pub fn with_capacity(max_window: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_window + 2),
            next_index: 0,
            window: 0,
        }
    }

    /// Set the number of past samples kept in view alongside the newest one
    pub fn set_window(&mut self, window: usize) {
        self.window = window;
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Entries the deque holds before it has to grow
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Drop all history; the window length is kept
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_index = 0;
    }

    /// Push the next detector value and return the maximum over the window
    #[inline]
    pub fn push(&mut self, value: f32) -> f32 {
        let index = self.next_index;
        self.next_index += 1;

        // Evict before pushing so the deque never exceeds window + 1 entries
        let oldest = index.saturating_sub(self.window as u64);
        while let Some(&(front_index, _)) = self.entries.front() {
            if front_index >= oldest {
                break;
            }
            self.entries.pop_front();
        }

        while let Some(&(_, back_value)) = self.entries.back() {
            if back_value >= value {
                break;
            }
            self.entries.pop_back();
        }
        self.entries.push_back((index, value));

        self.entries.front().map_or(value, |&(_, max)| max)
    }

    /// Maximum of the current window, or 0 before the first push
    pub fn max(&self) -> f32 {
        self.entries.front().map_or(0.0, |&(_, max)| max)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SlidingWindowMax {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
