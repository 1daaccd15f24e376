//! Random non-overlapping windows inside a longer clip.

use rand::Rng;
use tracing::debug;

/// Upper bound on draws before giving up.
pub const MAX_SAMPLING_ATTEMPTS: usize = 10_000;

/// Start and end of the interior band, as fractions of the clip duration.
const BAND_START: f64 = 0.1;
const BAND_END: f64 = 0.9;

/// Draw `count` sorted start times for `window`-second windows in a
/// `clip_duration`-second clip.
///
/// Starts are whole seconds within `[0.1 * d, 0.9 * d - window]` and
/// consecutive windows never overlap. Returns an empty vector when the band
/// cannot hold `count` windows or no draw succeeds within
/// [`MAX_SAMPLING_ATTEMPTS`].
pub fn sample_windows<R: Rng + ?Sized>(
    rng: &mut R,
    clip_duration: f64,
    count: usize,
    window: f64,
) -> Vec<f64> {
    if count == 0 || window <= 0.0 || !clip_duration.is_finite() {
        return Vec::new();
    }

    let usable = (BAND_END - BAND_START) * clip_duration;
    if count as f64 * window > usable {
        debug!(
            clip_duration = clip_duration,
            count = count,
            window = window,
            "Band too small for requested windows"
        );
        return Vec::new();
    }

    let low = (BAND_START * clip_duration).floor() as i64;
    let high = (BAND_END * clip_duration - window).floor() as i64;
    if high < low {
        return Vec::new();
    }

    let mut starts = vec![0i64; count];
    for attempt in 0..MAX_SAMPLING_ATTEMPTS {
        for start in starts.iter_mut() {
            *start = rng.random_range(low..=high);
        }
        starts.sort_unstable();

        let fits = starts
            .windows(2)
            .all(|pair| pair[0] as f64 + window <= pair[1] as f64);
        if fits {
            debug!(attempts = attempt + 1, "Accepted window draw");
            return starts.into_iter().map(|s| s as f64).collect();
        }
    }

    debug!(
        clip_duration = clip_duration,
        count = count,
        "No non-overlapping draw within attempt limit"
    );
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn assert_valid(starts: &[f64], low: f64, high: f64, window: f64) {
        for s in starts {
            assert!(*s >= low && *s <= high, "start {} outside [{}, {}]", s, low, high);
        }
        for pair in starts.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0] + window <= pair[1]);
        }
    }

    #[test]
    fn test_five_windows_in_hundred_seconds() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let starts = sample_windows(&mut rng, 100.0, 5, 7.0);
            if !starts.is_empty() {
                assert_eq!(starts.len(), 5);
                assert_valid(&starts, 10.0, 83.0, 7.0);
            }
        }
    }

    #[test]
    fn test_usually_succeeds() {
        let successes = (0..20)
            .filter(|seed| {
                let mut rng = StdRng::seed_from_u64(*seed);
                !sample_windows(&mut rng, 100.0, 5, 7.0).is_empty()
            })
            .count();
        assert_eq!(successes, 20);
    }

    #[test]
    fn test_band_too_small_returns_empty() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(sample_windows(&mut rng, 10.0, 5, 7.0).is_empty());
    }

    /// Counts the words drawn from the wrapped generator.
    struct CountingRng {
        inner: StdRng,
        draws: usize,
    }

    impl rand::RngCore for CountingRng {
        fn next_u32(&mut self) -> u32 {
            self.draws += 1;
            self.inner.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.draws += 1;
            self.inner.next_u64()
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            self.draws += 1;
            self.inner.fill_bytes(dst)
        }
    }

    #[test]
    fn test_tight_band_gives_up_after_attempt_limit() {
        // Ten 7 s windows fit the 72 s band of a 90 s clip, but only a
        // vanishing share of random draws leaves them all apart.
        for seed in 0..3 {
            let mut rng = CountingRng {
                inner: StdRng::seed_from_u64(seed),
                draws: 0,
            };
            assert!(sample_windows(&mut rng, 90.0, 10, 7.0).is_empty());
            assert!(rng.draws >= MAX_SAMPLING_ATTEMPTS * 10);
        }
    }

    #[test]
    fn test_single_window() {
        let mut rng = StdRng::seed_from_u64(1);
        let starts = sample_windows(&mut rng, 60.0, 1, 7.0);
        assert_eq!(starts.len(), 1);
        assert_valid(&starts, 6.0, 47.0, 7.0);
    }

    #[test]
    fn test_zero_count() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_windows(&mut rng, 100.0, 0, 7.0).is_empty());
    }

    #[test]
    fn test_same_seed_same_draw() {
        let a = sample_windows(&mut StdRng::seed_from_u64(99), 300.0, 8, 7.0);
        let b = sample_windows(&mut StdRng::seed_from_u64(99), 300.0, 8, 7.0);
        assert_eq!(a, b);
    }
}
