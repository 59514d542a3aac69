//! Time-windowed ring-buffer aggregation.
//!
//! Three window types share the same bucket geometry: values are quantized
//! to a fixed granularity and stored in a ring whose span slides with the
//! newest write.
//!
//! - [`BucketWindow`]: per-bucket sums with a simple average.
//! - [`WeightedBucketWindow`]: same geometry, exponentially weighted
//!   average.
//! - [`DelayMaxWindow`]: one integer per bucket (last write wins) with a
//!   max-over-window query, used to delay scale-downs.
//!
//! None of these read the clock; every time-dependent operation takes
//! `now` as a parameter. Record and resize take `&mut self`, queries take
//! `&self`; callers that share a window across threads wrap it in a single
//! `std::sync::RwLock`.

mod align;
pub mod bucket;
pub mod delay;
pub mod error;
pub mod weighted;

pub use bucket::BucketWindow;
pub use delay::DelayMaxWindow;
pub use error::WindowError;
pub use weighted::WeightedBucketWindow;
