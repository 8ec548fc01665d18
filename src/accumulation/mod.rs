//! Field combination, rate accumulation and forecast differencing
//!
//! This module holds the arithmetic of both pipelines. Every function here is
//! a pure transformation over fields that have already been selected and
//! validated; none of them touch the filesystem.
//!
//! # Organization
//!
//! - [`combine`]: element-wise sum of two component fields
//! - [`rate`]: half-hourly rate series to depth totals
//! - [`difference`]: lead N minus lead 0 forecast differencing
//! - [`parallel`]: time-axis reduction kernel shared by the above

pub mod combine;
pub mod difference;
pub mod parallel;
pub mod rate;

pub use combine::combine;
pub use difference::{difference, valid_time_label, VALID_TIME_FORMAT};
pub use parallel::parallel_sum_axis;
pub use rate::{
    accumulate_rate, mask_negative, ACCUMULATION_NAME, ACCUMULATION_UNITS, SAMPLE_INTERVAL_HOURS,
};
