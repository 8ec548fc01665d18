//! Forecast differencing between lead 0 and lead N

use crate::errors::Result;
use crate::field::{AccumulatedField, GridField, TimeBounds, TimeSlice};
use crate::time_window::TimeWindow;
use chrono::{Duration, NaiveDateTime};

/// Fixed-width timestamp used for forecast reference and valid times
pub const VALID_TIME_FORMAT: &str = "%Y%m%dT%H%MZ";

/// Net accumulation `target - reference` for one precipitation category
///
/// The result covers the interval between the two slices' upper bounds,
/// i.e. the precipitation that fell between lead 0 and lead N.
///
/// # Errors
///
/// Returns [`crate::PrecipError::GridMismatchError`] if the two slices are
/// not on the same grid with the same units.
pub fn difference(
    target: &TimeSlice,
    reference: &TimeSlice,
    lead_hours: i64,
    category_label: &str,
) -> Result<AccumulatedField> {
    target.field.check_compatible(&reference.field)?;

    let data = &target.field.data - &reference.field.data;
    let mut field = GridField::new(
        format!("(t+{lead_hours})-(t+0) {category_label} analysis"),
        target.field.units.clone(),
        target.field.grid.clone(),
        data,
    )?;
    field.attributes = target.field.attributes.clone();

    let bounds = TimeBounds::new(reference.bounds.upper, target.bounds.upper);
    // identical slices give a zero-length interval; keep the window non-empty
    let end = bounds.upper.max(bounds.lower + Duration::seconds(1));
    let window = TimeWindow::new(bounds.lower, end)?;

    Ok(AccumulatedField {
        field,
        bounds,
        window,
    })
}

/// `reference + lead_hours` formatted as `YYYYMMDDTHHMMZ`
pub fn valid_time_label(reference: NaiveDateTime, lead_hours: i64) -> String {
    (reference + Duration::hours(lead_hours))
        .format(VALID_TIME_FORMAT)
        .to_string()
}
