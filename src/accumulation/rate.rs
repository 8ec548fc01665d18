//! Conversion of half-hourly precipitation rates into depth totals

use super::parallel::parallel_sum_axis;
use crate::errors::{PrecipError, Result};
use crate::field::{AccumulatedField, GridField, TimeBounds, TimeSlice};
use crate::parallel::ParallelConfig;
use crate::time_window::TimeWindow;
use ndarray::{stack, ArrayD, ArrayViewD, Axis};
use tracing::debug;

/// Interval between GPM rate samples, in hours
pub const SAMPLE_INTERVAL_HOURS: f64 = 0.5;

/// Name given to every rate accumulation
pub const ACCUMULATION_NAME: &str = "Precipitation Amount";

pub const ACCUMULATION_UNITS: &str = "mm";

/// Replace every negative value with the missing-data marker
pub fn mask_negative(data: &mut ArrayD<f32>) {
    data.mapv_inplace(|v| if v < 0.0 { f32::NAN } else { v });
}

/// Reduces one window's rate slices (mm/hr) to a total depth (mm)
///
/// Negative samples are masked first. Any missing sample leaves its cell
/// missing in the result rather than contributing zero.
///
/// # Errors
///
/// Returns [`PrecipError::EmptySelection`] for an empty slice list and
/// [`PrecipError::GridMismatchError`] if the slices are not on one grid.
pub fn accumulate_rate(
    slices: &[&TimeSlice],
    window: &TimeWindow,
    parallel: &ParallelConfig,
) -> Result<AccumulatedField> {
    let first = slices.first().ok_or_else(|| {
        PrecipError::EmptySelection(format!("no rate samples to accumulate for {}", window))
    })?;

    for slice in &slices[1..] {
        first.field.check_compatible(&slice.field)?;
    }

    let views: Vec<ArrayViewD<f32>> = slices.iter().map(|s| s.field.data.view()).collect();
    let mut stacked = stack(Axis(0), &views)?;
    mask_negative(&mut stacked);

    debug!(
        window = %window,
        samples = slices.len(),
        "Summing rate samples over time"
    );
    let total = parallel_sum_axis(&stacked, 0, SAMPLE_INTERVAL_HOURS, parallel.enabled)?;

    let mut field = GridField::new(
        ACCUMULATION_NAME,
        ACCUMULATION_UNITS,
        first.field.grid.clone(),
        total,
    )?;
    field.attributes = first.field.attributes.clone();

    let lower = slices.iter().map(|s| s.bounds.lower).min().unwrap_or(window.start);
    let upper = slices.iter().map(|s| s.bounds.upper).max().unwrap_or(window.end);

    Ok(AccumulatedField {
        field,
        bounds: TimeBounds::new(lower, upper),
        window: *window,
    })
}
