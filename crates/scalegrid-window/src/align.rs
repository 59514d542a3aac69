//! Quantization of timestamps onto the bucket grid.
//!
//! All arithmetic is on whole seconds since the Unix epoch; granularities
//! are validated to be positive whole seconds before these run.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Truncate `t` down to the bucket boundary containing it.
pub(crate) fn bucket_time(t: SystemTime, granularity: Duration) -> SystemTime {
    let secs = epoch_secs(t);
    let g = granularity.as_secs();
    UNIX_EPOCH + Duration::from_secs(secs - secs % g)
}

/// Absolute bucket number of `t`; ring position is this modulo the bucket
/// count.
pub(crate) fn time_to_index(t: SystemTime, granularity: Duration) -> u64 {
    epoch_secs(t) / granularity.as_secs()
}

/// Number of buckets needed to cover `window` at `granularity`, rounded up.
pub(crate) fn num_buckets(window: Duration, granularity: Duration) -> usize {
    window.as_nanos().div_ceil(granularity.as_nanos()) as usize
}

fn epoch_secs(t: SystemTime) -> u64 {
    // Pre-epoch timestamps degrade to zero rather than panicking.
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
