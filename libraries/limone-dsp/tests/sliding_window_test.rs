//! Sliding-window maximum against a brute-force reference

use limone_dsp::SlidingWindowMax;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Maximum of the last `window + 1` values ending at each index
fn brute_force(values: &[f32], window: usize) -> Vec<f32> {
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(window);
            values[start..=i].iter().copied().fold(f32::MIN, f32::max)
        })
        .collect()
}

#[test]
fn reference_sequence() {
    let values = [0.1, 0.9, 0.3, 0.2, 1.2, 0.4];
    let mut max = SlidingWindowMax::with_capacity(3);
    max.set_window(3);

    let maxima: Vec<f32> = values.iter().map(|&v| max.push(v)).collect();
    assert_eq!(maxima, vec![0.1, 0.9, 0.9, 0.9, 1.2, 1.2]);
}

#[test]
fn matches_brute_force_on_random_sequences() {
    let mut rng = StdRng::seed_from_u64(0x11_30_4e);

    for window in [0, 1, 2, 7, 64, 480] {
        let values: Vec<f32> = (0..12_000).map(|_| rng.gen_range(0.0..2.0)).collect();

        let mut max = SlidingWindowMax::with_capacity(window);
        max.set_window(window);
        let fast: Vec<f32> = values.iter().map(|&v| max.push(v)).collect();

        assert_eq!(fast, brute_force(&values, window), "window {}", window);
        assert!(max.len() <= window + 1);
    }
}

#[test]
fn matches_brute_force_on_monotonic_runs() {
    // Long rising and falling ramps stress both ends of the deque
    let values: Vec<f32> = (0..10_000)
        .map(|i| {
            let phase = i % 400;
            if phase < 200 {
                phase as f32
            } else {
                (400 - phase) as f32
            }
        })
        .collect();

    let window = 150;
    let mut max = SlidingWindowMax::with_capacity(window);
    max.set_window(window);
    let fast: Vec<f32> = values.iter().map(|&v| max.push(v)).collect();
    assert_eq!(fast, brute_force(&values, window));
}

#[test]
fn window_change_keeps_results_exact() {
    let mut rng = StdRng::seed_from_u64(7);
    let values: Vec<f32> = (0..5_000).map(|_| rng.gen_range(0.0..1.0)).collect();

    let mut max = SlidingWindowMax::with_capacity(100);
    max.set_window(100);
    for &v in &values[..2_500] {
        max.push(v);
    }

    // After shrinking, entries older than the new window are evicted lazily
    max.set_window(10);
    for (offset, &v) in values[2_500..].iter().enumerate() {
        let i = 2_500 + offset;
        let expected = values[i - 10..=i].iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(max.push(v), expected);
    }
}
