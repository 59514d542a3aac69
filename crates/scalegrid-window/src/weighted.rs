//! Exponentially weighted variant of [`BucketWindow`].

use std::time::{Duration, SystemTime};

use crate::align::{bucket_time, time_to_index};
use crate::bucket::BucketWindow;
use crate::error::WindowError;

/// Smallest smoothing coefficient; keeps wide windows responsive.
const MIN_EXPONENT: f64 = 0.2;

/// Target weight left for data older than the window; also the cutoff
/// below which the averaging loop stops contributing meaningfully.
const WEIGHT_PRECISION: f64 = 1e-4;

/// Smoothing coefficient for a ring of `bucket_count` buckets, chosen so
/// the weights of all buckets sum to within [`WEIGHT_PRECISION`] of one.
fn compute_smoothing_coeff(bucket_count: f64) -> f64 {
    (1.0 - WEIGHT_PRECISION.powf(1.0 / bucket_count)).max(MIN_EXPONENT)
}

/// Same bucket geometry as [`BucketWindow`], but `window_average` returns
/// an exponentially weighted average: recent buckets carry far more weight
/// than old ones.
///
/// With buckets `[10, 10, 5, 5]` (newest last) and coefficient 0.6 the
/// average is `5*0.6 + 5*0.6*0.4 + 10*0.6*0.4^2 + 10*0.6*0.4^3 = 5.544`,
/// where the simple average would be 7.5.
#[derive(Debug, Clone)]
pub struct WeightedBucketWindow {
    inner: BucketWindow,
    /// Decay speed of past buckets; recomputed on resize.
    smoothing_coeff: f64,
}

impl WeightedBucketWindow {
    pub fn new(window: Duration, granularity: Duration) -> Result<Self, WindowError> {
        let inner = BucketWindow::new(window, granularity)?;
        let smoothing_coeff = compute_smoothing_coeff(inner.bucket_count() as f64);
        Ok(Self {
            inner,
            smoothing_coeff,
        })
    }

    /// Add `value` into the bucket containing `t`.
    pub fn record(&mut self, t: SystemTime, value: f64) {
        self.inner.record(t, value);
    }

    /// True when nothing has been recorded within a window span of `now`.
    pub fn is_empty(&self, now: SystemTime) -> bool {
        self.inner.is_empty(now)
    }

    pub fn bucket_count(&self) -> usize {
        self.inner.bucket_count()
    }

    pub fn window(&self) -> Duration {
        self.inner.window()
    }

    /// Backward exponential average starting at the newest written bucket.
    ///
    /// A silent gap between the newest write and `now` decays the whole
    /// result: the initial weight is pre-multiplied by `(1-c)^gap` and the
    /// scan shortened accordingly.
    pub fn window_average(&self, now: SystemTime) -> f64 {
        let granularity = self.inner.granularity();
        let now = bucket_time(now, granularity);
        let Some(last) = self.inner.last_write() else {
            return 0.0;
        };
        if self.inner.is_empty(now) {
            return 0.0;
        }

        let total_b = self.inner.bucket_count();
        let mut num_b = total_b;
        let mut multiplier = self.smoothing_coeff;
        if now > last {
            let gap = time_to_index(now, granularity) - time_to_index(last, granularity);
            multiplier *= (1.0 - self.smoothing_coeff).powf(gap as f64);
            num_b = num_b.saturating_sub(gap as usize);
        }

        // Offset keeps the subtraction below non-negative across the ring
        // seam.
        let start = time_to_index(last, granularity) + total_b as u64;
        let buckets = self.inner.buckets();
        let mut ret = 0.0;
        for i in 0..num_b as u64 {
            if multiplier < WEIGHT_PRECISION {
                break;
            }
            ret += buckets[((start - i) % total_b as u64) as usize] * multiplier;
            multiplier *= 1.0 - self.smoothing_coeff;
        }
        ret
    }

    /// Change the window span and recompute the smoothing coefficient for
    /// the new bucket count.
    pub fn resize(&mut self, new_window: Duration) {
        self.inner.resize(new_window);
        self.smoothing_coeff = compute_smoothing_coeff(self.inner.bucket_count() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    const GRANULARITY: Duration = Duration::from_secs(1);
    const TOLERANCE: f64 = 1e-9;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_800_000_000 + secs)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn assert_close(got: f64, want: f64) {
        assert!((got - want).abs() < TOLERANCE, "got {got}, want {want}");
    }

    #[test]
    fn smoothing_coeff_table() {
        // Wide windows bottom out at the minimum exponent.
        assert_close(compute_smoothing_coeff(100.0), MIN_EXPONENT);
        assert_close(compute_smoothing_coeff(60.0), MIN_EXPONENT);
        assert!((compute_smoothing_coeff(40.0) - 0.20567).abs() < 1e-4);
        assert!((compute_smoothing_coeff(6.0) - 0.78456).abs() < 1e-4);
    }

    #[test]
    fn weighted_average_progression() {
        let mut w = WeightedBucketWindow::new(secs(5), GRANULARITY).unwrap();
        let c = w.smoothing_coeff;

        w.record(at(0), 2.0);
        let mut expected = 2.0 * c;
        assert_close(w.window_average(at(0)), expected);

        // One silent second decays the whole average.
        expected *= 1.0 - c;
        assert_close(w.window_average(at(1)), expected);

        w.record(at(1), 2.0);
        expected += 2.0 * c;
        assert_close(w.window_average(at(1)), expected);

        // Fill the window with [2, 3, 4, 5, 6], newest last.
        for i in 0..5u64 {
            w.record(at(2 + i), (i + 2) as f64);
        }
        let expected = 6.0 * c
            + 5.0 * c * (1.0 - c)
            + 4.0 * c * (1.0 - c).powi(2)
            + 3.0 * c * (1.0 - c).powi(3)
            + 2.0 * c * (1.0 - c).powi(4);
        assert_close(w.window_average(at(6)), expected);

        // Past the window: empty.
        assert_eq!(w.window_average(at(16)), 0.0);
    }

    #[test]
    fn newest_bucket_dominates() {
        // Same values, opposite order, very different averages.
        let mut rising = WeightedBucketWindow::new(secs(4), GRANULARITY).unwrap();
        let mut falling = WeightedBucketWindow::new(secs(4), GRANULARITY).unwrap();
        for (i, v) in [10.0, 10.0, 5.0, 5.0].into_iter().enumerate() {
            rising.record(at(i as u64), v);
            falling.record(at(i as u64), 15.0 - v);
        }
        assert!(rising.window_average(at(3)) < falling.window_average(at(3)));
    }

    #[test]
    fn zeros_average_to_zero() {
        let mut w = WeightedBucketWindow::new(secs(10), GRANULARITY).unwrap();
        for i in 0..10u64 {
            w.record(at(i), 0.0);
        }
        assert_eq!(w.window_average(at(9)), 0.0);
        assert_eq!(w.window_average(at(4)), 0.0);
        assert_eq!(w.window_average(at(12)), 0.0);
    }

    #[test]
    fn zeros_after_load_average_to_zero() {
        let mut w = WeightedBucketWindow::new(secs(10), GRANULARITY).unwrap();
        for i in 0..10u64 {
            w.record(at(i), ((i * 37) % 100) as f64);
        }
        for i in 10..20u64 {
            w.record(at(i), 0.0);
        }
        assert_eq!(w.window_average(at(19)), 0.0);
        assert_eq!(w.window_average(at(22)), 0.0);
    }

    #[test]
    fn resize_recomputes_coefficient() {
        let mut w = WeightedBucketWindow::new(secs(5), GRANULARITY).unwrap();
        assert_close(w.smoothing_coeff, compute_smoothing_coeff(5.0));

        for i in 0..6u64 {
            w.record(at(i), (i + 1) as f64);
        }

        w.resize(secs(10));
        assert_eq!(w.bucket_count(), 10);
        assert_eq!(w.window(), secs(10));
        assert_close(w.smoothing_coeff, compute_smoothing_coeff(10.0));

        // Bucket contents survive the resize.
        let mut sum = 0.0;
        w.inner.for_each_bucket(at(5), |_, b| sum += b);
        assert_eq!(sum, 2.0 + 3.0 + 4.0 + 5.0 + 6.0);
    }

    #[test]
    fn empty_checks_delegate() {
        let mut w = WeightedBucketWindow::new(secs(5), GRANULARITY).unwrap();
        assert!(w.is_empty(at(0)));
        w.record(at(0), 1.0);
        assert!(!w.is_empty(at(3)));
        assert!(w.is_empty(at(6)));
    }
}
