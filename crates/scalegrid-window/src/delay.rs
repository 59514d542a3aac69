//! Max-over-window ring used to delay scale-downs.

use std::time::{Duration, SystemTime};

use crate::align::{bucket_time, time_to_index};
use crate::error::WindowError;

/// A sliding window of one integer per time slot.
///
/// Unlike [`BucketWindow`](crate::BucketWindow), a later write to the same
/// slot overwrites rather than accumulates, and the query is the maximum
/// over the window rather than an average. Each slot carries its own
/// timestamp so stale ring entries are never counted.
#[derive(Debug, Clone)]
pub struct DelayMaxWindow {
    window: Duration,
    granularity: Duration,
    slots: Vec<u32>,
    /// Bucket-aligned write time per slot; `None` means never written.
    stamps: Vec<Option<SystemTime>>,
    /// Newest bucket written, bucket-aligned.
    last_record: Option<SystemTime>,
}

impl DelayMaxWindow {
    /// Create a window of `window / granularity` slots. The span must be a
    /// whole multiple of the granularity.
    pub fn new(window: Duration, granularity: Duration) -> Result<Self, WindowError> {
        if granularity.is_zero() || granularity.subsec_nanos() != 0 {
            return Err(WindowError::InvalidGranularity(granularity));
        }
        Self::check_span(window, granularity)?;

        let slots = (window.as_secs() / granularity.as_secs()) as usize;
        Ok(Self {
            window,
            granularity,
            slots: vec![0; slots],
            stamps: vec![None; slots],
            last_record: None,
        })
    }

    fn check_span(span: Duration, granularity: Duration) -> Result<(), WindowError> {
        if span.is_zero() {
            return Err(WindowError::InvalidSpan(span));
        }
        if span.as_nanos() % granularity.as_nanos() != 0 {
            return Err(WindowError::NotMultiple { span, granularity });
        }
        Ok(())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Store `value` in the slot containing `now`, overwriting any earlier
    /// value for that slot.
    pub fn record(&mut self, now: SystemTime, value: u32) {
        let bucket = bucket_time(now, self.granularity);
        let idx = (time_to_index(bucket, self.granularity) % self.slots.len() as u64) as usize;
        self.slots[idx] = value;
        self.stamps[idx] = Some(bucket);
        if self.last_record.is_none_or(|lr| bucket > lr) {
            self.last_record = Some(bucket);
        }
    }

    /// Largest value among slots whose stamp falls in `(now - window, now]`;
    /// 0 when none qualify.
    pub fn max(&self, now: SystemTime) -> u32 {
        let now = bucket_time(now, self.granularity);
        let mut max_value = 0;
        for (slot, stamp) in self.slots.iter().zip(&self.stamps) {
            let Some(stamp) = *stamp else { continue };
            if stamp > now {
                continue;
            }
            let age = now.duration_since(stamp).unwrap_or_default();
            if age < self.window && *slot > max_value {
                max_value = *slot;
            }
        }
        max_value
    }

    /// Change the window span, keeping the granularity. Entries still
    /// inside the new window (relative to the newest recorded slot) are
    /// re-homed by their stamps; the rest are dropped.
    pub fn resize(&mut self, new_window: Duration) -> Result<(), WindowError> {
        Self::check_span(new_window, self.granularity)?;

        let new_len = (new_window.as_secs() / self.granularity.as_secs()) as usize;
        if new_len == self.slots.len() {
            self.window = new_window;
            return Ok(());
        }

        let mut slots = vec![0u32; new_len];
        let mut stamps = vec![None; new_len];
        if let Some(now) = self.last_record {
            for (slot, stamp) in self.slots.iter().zip(&self.stamps) {
                let Some(stamp) = *stamp else { continue };
                if stamp > now {
                    continue;
                }
                if now.duration_since(stamp).unwrap_or_default() >= new_window {
                    continue;
                }
                let idx = (time_to_index(stamp, self.granularity) % new_len as u64) as usize;
                slots[idx] = *slot;
                stamps[idx] = Some(stamp);
            }
        }

        self.window = new_window;
        self.slots = slots;
        self.stamps = stamps;
        Ok(())
    }
}
