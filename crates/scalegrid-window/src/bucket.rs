//! Ring buffer of per-bucket value sums over a sliding time window.

use std::time::{Duration, SystemTime};

use crate::align::{bucket_time, num_buckets, time_to_index};
use crate::error::WindowError;

/// Sums of recorded values, bucketed by time at a fixed granularity, over a
/// sliding span ending at the newest recorded bucket.
///
/// Out-of-order writes inside the window are additive; writes older than
/// the window are silently dropped. A forward jump of a full window span or
/// more resets all history.
#[derive(Debug, Clone)]
pub struct BucketWindow {
    granularity: Duration,
    window: Duration,
    buckets: Vec<f64>,
    /// Running sum of every bucket currently inside the window.
    window_total: f64,
    /// Earliest bucket written since the last reset, bucket-aligned.
    first_write: Option<SystemTime>,
    /// Newest bucket written, bucket-aligned.
    last_write: Option<SystemTime>,
}

impl BucketWindow {
    /// Create a window covering `window` with `ceil(window/granularity)`
    /// buckets.
    pub fn new(window: Duration, granularity: Duration) -> Result<Self, WindowError> {
        if granularity.is_zero() || granularity.subsec_nanos() != 0 {
            return Err(WindowError::InvalidGranularity(granularity));
        }
        if window.is_zero() {
            return Err(WindowError::InvalidSpan(window));
        }
        Ok(Self {
            granularity,
            buckets: vec![0.0; num_buckets(window, granularity)],
            window,
            window_total: 0.0,
            first_write: None,
            last_write: None,
        })
    }

    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn last_write(&self) -> Option<SystemTime> {
        self.last_write
    }

    pub(crate) fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Add `value` into the bucket containing `t`.
    pub fn record(&mut self, t: SystemTime, value: f64) {
        let bucket = bucket_time(t, self.granularity);
        let len = self.buckets.len() as u64;
        let idx = (time_to_index(bucket, self.granularity) % len) as usize;

        let Some(last) = self.last_write else {
            self.first_write = Some(bucket);
            self.last_write = Some(bucket);
            self.buckets[idx] += value;
            self.window_total += value;
            return;
        };

        if bucket == last {
            self.buckets[idx] += value;
            self.window_total += value;
            return;
        }

        if bucket < last {
            // Older than the ring still covers: drop.
            if last.duration_since(bucket).unwrap_or_default() >= self.window {
                return;
            }
            if self.first_write.is_none_or(|fw| bucket < fw) {
                self.first_write = Some(bucket);
            }
            self.buckets[idx] += value;
            self.window_total += value;
            return;
        }

        // Advancing past the previous head.
        let jump = bucket.duration_since(last).unwrap_or_default();
        if jump >= self.window {
            self.buckets.fill(0.0);
            self.window_total = 0.0;
            self.first_write = Some(bucket);
        } else {
            // Expire every bucket between the old head (exclusive) and the
            // new one (inclusive).
            let from = time_to_index(last, self.granularity) + 1;
            let to = time_to_index(bucket, self.granularity);
            for i in from..=to {
                let j = (i % len) as usize;
                self.window_total -= self.buckets[j];
                self.buckets[j] = 0.0;
            }
        }
        self.last_write = Some(bucket);
        self.buckets[idx] += value;
        self.window_total += value;
    }

    /// Average value per filled bucket over the window ending at `now`.
    /// Returns 0.0 when no data is inside the window.
    pub fn window_average(&self, now: SystemTime) -> f64 {
        let now = bucket_time(now, self.granularity);
        let (Some(first), Some(last)) = (self.first_write, self.last_write) else {
            return 0.0;
        };
        if self.empty_at(now) {
            return 0.0;
        }

        let len = self.buckets.len() as u64;
        let filled =
            (time_to_index(last, self.granularity) - time_to_index(first, self.granularity) + 1)
                .min(len);

        if now <= last {
            return self.window_total / filled as f64;
        }
        if now.duration_since(last).unwrap_or_default() >= self.window {
            // Gap of exactly a window span: every bucket has aged out.
            return 0.0;
        }

        // `now` is past the newest write but still within a window span:
        // the buckets in the silent gap no longer count.
        let start = time_to_index(last, self.granularity);
        let end = time_to_index(now, self.granularity);
        let mut total = self.window_total;
        for i in (start + 1)..=end {
            total -= self.buckets[(i % len) as usize];
        }
        let usable = filled.min(len - (end - start));
        total / usable as f64
    }

    /// True when nothing has been recorded within a window span of `now`.
    pub fn is_empty(&self, now: SystemTime) -> bool {
        self.empty_at(bucket_time(now, self.granularity))
    }

    fn empty_at(&self, now: SystemTime) -> bool {
        match self.last_write {
            None => true,
            Some(last) => match now.duration_since(last) {
                Ok(gap) => gap > self.window,
                // `now` at or before the newest write.
                Err(_) => false,
            },
        }
    }

    /// Change the window span, re-homing surviving buckets by their own
    /// timestamps and recomputing the running total.
    pub fn resize(&mut self, new_window: Duration) {
        if new_window == self.window {
            return;
        }
        let new_len = num_buckets(new_window, self.granularity);
        let mut new_buckets = vec![0.0_f64; new_len];
        let mut new_total = 0.0;

        if let Some(last) = self.last_write {
            let old_len = self.buckets.len();
            let mut idx = time_to_index(last, self.granularity);
            for _ in 0..old_len.min(new_len) {
                let v = self.buckets[(idx % old_len as u64) as usize];
                new_buckets[(idx % new_len as u64) as usize] = v;
                new_total += v;
                if idx == 0 {
                    break;
                }
                idx -= 1;
            }
            let span = self.granularity * (old_len as u32 - 1);
            self.first_write = Some(last.checked_sub(span).unwrap_or(SystemTime::UNIX_EPOCH));
        }

        self.window = new_window;
        self.buckets = new_buckets;
        self.window_total = new_total;
    }

    /// Visit each bucket still inside the window at `now`, newest first.
    #[cfg(test)]
    pub(crate) fn for_each_bucket(&self, now: SystemTime, mut acc: impl FnMut(SystemTime, f64)) {
        let now = bucket_time(now, self.granularity);
        let Some(last) = self.last_write else { return };
        let len = self.buckets.len();
        let gap = if now > last {
            (time_to_index(now, self.granularity) - time_to_index(last, self.granularity)) as usize
        } else {
            0
        };
        if gap >= len {
            return;
        }

        let mut si = time_to_index(last, self.granularity);
        let mut bucket = last;
        for _ in 0..(len - gap) {
            acc(bucket, self.buckets[(si % len as u64) as usize]);
            if si == 0 {
                break;
            }
            si -= 1;
            bucket = match bucket.checked_sub(self.granularity) {
                Some(t) => t,
                None => break,
            };
        }
    }
}
