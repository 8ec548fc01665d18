//! Accumulation window generation and time stepping
//!
//! Windows are produced as single `(start, end)` pairs by one iterator, so
//! start and end sequences can never drift apart.

use crate::errors::{PrecipError, Result};
use crate::field::TimeBounds;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::iter::FusedIterator;

/// Timestamp format used in GPM output filenames and CLI dates
pub const HOURLY_FORMAT: &str = "%Y%m%d%H";

/// A half-open accumulation interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(PrecipError::InvalidConfiguration(format!(
                "window start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    /// True when a sample's bounds lie inside the window.
    ///
    /// The upper comparison is strict: a sample ending exactly on the window
    /// end belongs to the next window.
    pub fn contains(&self, bounds: &TimeBounds) -> bool {
        bounds.lower >= self.start && bounds.upper < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format(HOURLY_FORMAT),
            self.end.format(HOURLY_FORMAT)
        )
    }
}

/// Iterator over contiguous windows; exhausted once the cursor reaches the end bound
#[derive(Debug, Clone)]
pub struct Windows {
    cursor: NaiveDateTime,
    end: NaiveDateTime,
    length: Duration,
}

impl Iterator for Windows {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        if self.cursor >= self.end {
            return None;
        }
        let start = self.cursor;
        let end = start
            .checked_add_signed(self.length)
            .map_or(self.end, |end| end.min(self.end));
        self.cursor = end;
        Some(TimeWindow { start, end })
    }
}

impl FusedIterator for Windows {}

/// Windows of `window_length` covering `[reference, reference + total_span)`.
///
/// Only the last window may be shorter, clipped to the overall end.
pub fn generate_windows(
    reference: NaiveDateTime,
    total_span: Duration,
    window_length: Duration,
) -> Result<Windows> {
    if window_length <= Duration::zero() {
        return Err(PrecipError::InvalidConfiguration(format!(
            "accumulation window length must be positive, got {} hours",
            window_length.num_hours()
        )));
    }
    if total_span <= Duration::zero() {
        return Err(PrecipError::InvalidConfiguration(format!(
            "total span must be positive, got {} hours",
            total_span.num_hours()
        )));
    }
    let end = reference.checked_add_signed(total_span).ok_or_else(|| {
        PrecipError::InvalidConfiguration(format!(
            "{} hours from {} is outside the supported date range",
            total_span.num_hours(),
            reference
        ))
    })?;
    Ok(Windows {
        cursor: reference,
        end,
        length: window_length,
    })
}

/// Convert a user-supplied hour count into a `Duration`
pub fn hours_duration(hours: i64, what: &str) -> Result<Duration> {
    Duration::try_hours(hours).ok_or_else(|| {
        PrecipError::InvalidConfiguration(format!("{} of {} hours is out of range", what, hours))
    })
}

/// Step from `start` to `end` inclusive by `interval_hours`, never passing `end`
pub fn hourly_steps(
    start: NaiveDateTime,
    end: NaiveDateTime,
    interval_hours: i64,
) -> Result<Vec<NaiveDateTime>> {
    if interval_hours <= 0 {
        return Err(PrecipError::InvalidConfiguration(format!(
            "step interval must be positive, got {} hours",
            interval_hours
        )));
    }
    let step = hours_duration(interval_hours, "step interval")?;
    let mut steps = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        steps.push(cursor);
        match cursor.checked_add_signed(step) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    Ok(steps)
}

/// Calendar days touched by `[start, end]`, one per daily source file
pub fn days_spanned(start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDate> {
    let first_day = start.date().and_time(NaiveTime::MIN);
    match hourly_steps(first_day, end, 24) {
        Ok(steps) => steps.into_iter().map(|s| s.date()).collect(),
        Err(_) => Vec::new(),
    }
}
