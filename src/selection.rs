//! Selection of time slices for accumulation and differencing

use crate::errors::{PrecipError, Result};
use crate::field::{RawSeries, TimeSlice};
use crate::time_window::TimeWindow;
use chrono::Duration;

/// Span of the reference (lead 0) forecast slice, in hours
pub const REFERENCE_SPAN_HOURS: i64 = 3;

/// Slices whose bounds lie inside `window`, in time order
///
/// # Errors
///
/// Returns [`PrecipError::EmptySelection`] when no slice matches, which means
/// the source data has a gap covering the whole window.
pub fn select_window<'a>(series: &'a RawSeries, window: &TimeWindow) -> Result<Vec<&'a TimeSlice>> {
    let selected: Vec<&TimeSlice> = series
        .iter()
        .filter(|slice| window.contains(&slice.bounds))
        .collect();

    if selected.is_empty() {
        return Err(PrecipError::EmptySelection(format!(
            "no time slices inside window {}",
            window
        )));
    }
    Ok(selected)
}

/// First-in-time and last-in-time slices of a series
pub fn first_and_last(series: &RawSeries) -> Result<(&TimeSlice, &TimeSlice)> {
    match (series.slices().first(), series.slices().last()) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(PrecipError::EmptySelection(
            "forecast file contains no time slices".to_string(),
        )),
    }
}

/// The only slice of a reference file, which must hold exactly one
pub fn single_slice(series: &RawSeries) -> Result<&TimeSlice> {
    match series.slices() {
        [only] => Ok(only),
        slices => Err(PrecipError::BoundsValidationError(format!(
            "expected exactly one reference time slice, found {}",
            slices.len()
        ))),
    }
}

/// Check that a slice's bounds span exactly `expected_hours`
pub fn validate_span(slice: &TimeSlice, expected_hours: i64) -> Result<()> {
    let span = slice.bounds.span();
    if span != Duration::hours(expected_hours) {
        return Err(PrecipError::BoundsValidationError(format!(
            "'{}' at {} spans {} minutes, expected {} hours",
            slice.field.name,
            slice.time,
            span.num_minutes(),
            expected_hours
        )));
    }
    Ok(())
}
