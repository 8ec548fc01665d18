//! Gridded field data model
//!
//! A [`GridField`] is an N-dimensional spatial array with the coordinate axes,
//! unit and name needed to combine it with other fields. A [`TimeSlice`] pins a
//! field to the period it represents, and a [`RawSeries`] is the time-ordered
//! collection of slices concatenated from one or more source files.

use crate::errors::{PrecipError, Result};
use crate::time_window::TimeWindow;
use chrono::{Duration, NaiveDateTime};
use ndarray::ArrayD;
use std::collections::BTreeMap;
use std::fmt;

/// A one-dimensional spatial axis
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub name: String,
    pub units: String,
    pub values: Vec<f64>,
}

impl Coordinate {
    pub fn new(name: impl Into<String>, units: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True for axes named `lon`/`longitude` or carrying CF `degrees_east` units
    pub fn is_longitude(&self) -> bool {
        let name = self.name.to_lowercase();
        name == "lon" || name == "longitude" || self.units == "degrees_east"
    }

    /// True for axes named `lat`/`latitude` or carrying CF `degrees_north` units
    pub fn is_latitude(&self) -> bool {
        let name = self.name.to_lowercase();
        name == "lat" || name == "latitude" || self.units == "degrees_north"
    }
}

/// Spatial grid shared by every field in a series
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    pub coordinates: Vec<Coordinate>,
}

impl Grid {
    pub fn new(coordinates: Vec<Coordinate>) -> Self {
        Self { coordinates }
    }

    pub fn shape(&self) -> Vec<usize> {
        self.coordinates.iter().map(Coordinate::len).collect()
    }

    pub fn dim_names(&self) -> Vec<String> {
        self.coordinates.iter().map(|c| c.name.clone()).collect()
    }

    pub fn longitude_axis(&self) -> Option<usize> {
        self.coordinates.iter().position(Coordinate::is_longitude)
    }

    pub fn latitude_axis(&self) -> Option<usize> {
        self.coordinates.iter().position(Coordinate::is_latitude)
    }
}

/// The `(lower, upper)` validity interval attached to a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    pub lower: NaiveDateTime,
    pub upper: NaiveDateTime,
}

impl TimeBounds {
    pub fn new(lower: NaiveDateTime, upper: NaiveDateTime) -> Self {
        Self { lower, upper }
    }

    pub fn span(&self) -> Duration {
        self.upper - self.lower
    }
}

impl fmt::Display for TimeBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// A named physical field on a spatial grid
///
/// Missing data is stored as `NaN`; arithmetic between fields therefore
/// propagates missing cells without any extra bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    pub name: String,
    pub units: String,
    pub grid: Grid,
    pub data: ArrayD<f32>,
    /// Extra string attributes written alongside the data (e.g. `valid_time`)
    pub attributes: BTreeMap<String, String>,
}

impl GridField {
    /// Create a field, checking the data shape against the grid
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        grid: Grid,
        data: ArrayD<f32>,
    ) -> Result<Self> {
        let name = name.into();
        if data.shape() != grid.shape().as_slice() {
            return Err(PrecipError::GridMismatchError(format!(
                "field '{}' has shape {:?} but its grid has shape {:?}",
                name,
                data.shape(),
                grid.shape()
            )));
        }
        Ok(Self {
            name,
            units: units.into(),
            grid,
            data,
            attributes: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Fails unless `other` lives on the same grid with the same units
    pub fn check_compatible(&self, other: &GridField) -> Result<()> {
        if self.data.shape() != other.data.shape() {
            return Err(PrecipError::GridMismatchError(format!(
                "'{}' has shape {:?}, '{}' has shape {:?}",
                self.name,
                self.data.shape(),
                other.name,
                other.data.shape()
            )));
        }
        if self.grid != other.grid {
            return Err(PrecipError::GridMismatchError(format!(
                "'{}' and '{}' are on different coordinate systems",
                self.name, other.name
            )));
        }
        if self.units != other.units {
            return Err(PrecipError::GridMismatchError(format!(
                "'{}' is in '{}' but '{}' is in '{}'",
                self.name, self.units, other.name, other.units
            )));
        }
        Ok(())
    }

    pub fn missing_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }
}

/// A single time-indexed sample and the period it represents
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlice {
    pub time: NaiveDateTime,
    pub bounds: TimeBounds,
    pub field: GridField,
}

impl TimeSlice {
    pub fn new(time: NaiveDateTime, bounds: TimeBounds, field: GridField) -> Self {
        Self {
            time,
            bounds,
            field,
        }
    }
}

/// Time-ordered slices sharing one grid and unit
#[derive(Debug, Clone, Default)]
pub struct RawSeries {
    slices: Vec<TimeSlice>,
}

impl RawSeries {
    /// Build a series, sorting by time and enforcing the series invariants
    pub fn new(mut slices: Vec<TimeSlice>) -> Result<Self> {
        slices.sort_by_key(|s| s.time);

        for slice in &slices {
            if slice.bounds.lower > slice.bounds.upper {
                return Err(PrecipError::ConcatenationError(format!(
                    "slice at {} has inverted bounds {}",
                    slice.time, slice.bounds
                )));
            }
        }

        for pair in slices.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.time == next.time {
                return Err(PrecipError::ConcatenationError(format!(
                    "duplicate timestamp {}",
                    next.time
                )));
            }
            // forecast accumulations share a start, so lower bounds may repeat
            if next.bounds.lower < prev.bounds.lower || next.bounds.upper <= prev.bounds.upper {
                return Err(PrecipError::ConcatenationError(format!(
                    "bounds are not monotonically increasing: {} followed by {}",
                    prev.bounds, next.bounds
                )));
            }
            prev.field
                .check_compatible(&next.field)
                .map_err(|e| PrecipError::ConcatenationError(e.to_string()))?;
        }

        Ok(Self { slices })
    }

    /// Join several series along the time axis
    pub fn concatenate(parts: Vec<RawSeries>) -> Result<Self> {
        if parts.is_empty() {
            return Err(PrecipError::ConcatenationError(
                "no series to concatenate".to_string(),
            ));
        }
        let slices = parts.into_iter().flat_map(|p| p.slices).collect();
        Self::new(slices)
    }

    pub fn slices(&self) -> &[TimeSlice] {
        &self.slices
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeSlice> {
        self.slices.iter()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Overall `(first lower, last upper)` bounds of the series
    pub fn extent(&self) -> Option<TimeBounds> {
        let first = self.slices.first()?;
        let last = self.slices.last()?;
        Some(TimeBounds::new(first.bounds.lower, last.bounds.upper))
    }
}

/// One reduced field per accumulation window
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedField {
    pub field: GridField,
    /// Earliest lower and latest upper bound of the contributing slices
    pub bounds: TimeBounds,
    pub window: TimeWindow,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::NaiveDate;

    pub fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .expect("valid test datetime")
    }

    pub fn lat_lon_grid(nlat: usize, nlon: usize) -> Grid {
        Grid::new(vec![
            Coordinate::new(
                "latitude",
                "degrees_north",
                (0..nlat).map(|i| -10.0 + i as f64 * 5.0).collect(),
            ),
            Coordinate::new(
                "longitude",
                "degrees_east",
                (0..nlon).map(|i| i as f64 * 10.0).collect(),
            ),
        ])
    }

    pub fn constant_field(name: &str, units: &str, grid: &Grid, value: f32) -> GridField {
        let data = ArrayD::from_elem(grid.shape(), value);
        GridField::new(name, units, grid.clone(), data).expect("shape matches grid")
    }

    /// Half-hourly rate slices starting at `start`, bounds `[t, t + 29m59s]`
    pub fn half_hourly_series(start: NaiveDateTime, count: usize, value: f32) -> Vec<TimeSlice> {
        let grid = lat_lon_grid(2, 3);
        (0..count)
            .map(|i| {
                let lower = start + Duration::minutes(30 * i as i64);
                let upper = lower + Duration::minutes(30) - Duration::seconds(1);
                TimeSlice::new(
                    lower + Duration::minutes(15),
                    TimeBounds::new(lower, upper),
                    constant_field("precipitation", "mm/hr", &grid, value),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_field_shape_must_match_grid() {
        let grid = lat_lon_grid(2, 3);
        let data = ArrayD::zeros(vec![3, 2]);
        let result = GridField::new("bad", "mm", grid, data);
        assert!(matches!(result, Err(PrecipError::GridMismatchError(_))));
    }

    #[test]
    fn test_series_is_sorted_and_contiguous() {
        let start = dt(2024, 1, 1, 0, 0, 0);
        let mut slices = half_hourly_series(start, 4, 1.0);
        slices.reverse();
        let series = RawSeries::new(slices).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.slices()[0].bounds.lower, start);
        let extent = series.extent().unwrap();
        assert_eq!(extent.upper, dt(2024, 1, 1, 1, 59, 59));
    }

    #[test]
    fn test_concatenate_rejects_duplicate_times() {
        let start = dt(2024, 1, 1, 0, 0, 0);
        let a = RawSeries::new(half_hourly_series(start, 2, 1.0)).unwrap();
        let b = RawSeries::new(half_hourly_series(start, 1, 1.0)).unwrap();
        let result = RawSeries::concatenate(vec![a, b]);
        assert!(matches!(result, Err(PrecipError::ConcatenationError(_))));
    }

    #[test]
    fn test_concatenate_rejects_unit_mismatch() {
        let start = dt(2024, 1, 1, 0, 0, 0);
        let a = RawSeries::new(half_hourly_series(start, 2, 1.0)).unwrap();
        let mut later = half_hourly_series(dt(2024, 1, 1, 1, 0, 0), 1, 1.0);
        later[0].field.units = "kg m-2 s-1".to_string();
        let b = RawSeries::new(later).unwrap();
        match RawSeries::concatenate(vec![a, b]) {
            Err(PrecipError::ConcatenationError(msg)) => assert!(msg.contains("kg m-2 s-1")),
            other => panic!("Expected ConcatenationError, got {:?}", other),
        }
    }

    #[test]
    fn test_concatenate_days() {
        let day1 = RawSeries::new(half_hourly_series(dt(2024, 1, 1, 0, 0, 0), 48, 1.0)).unwrap();
        let day2 = RawSeries::new(half_hourly_series(dt(2024, 1, 2, 0, 0, 0), 48, 1.0)).unwrap();
        let series = RawSeries::concatenate(vec![day2, day1]).unwrap();
        assert_eq!(series.len(), 96);
        assert_eq!(series.slices()[0].bounds.lower, dt(2024, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_running_accumulations_share_lower_bound() {
        let grid = lat_lon_grid(1, 1);
        let start = dt(2024, 5, 31, 21, 0, 0);
        let slices: Vec<TimeSlice> = [3, 6, 9]
            .iter()
            .map(|&h| {
                let upper = start + Duration::hours(h);
                TimeSlice::new(
                    upper,
                    TimeBounds::new(start, upper),
                    constant_field("total_convective_precipitation", "kg m-2", &grid, 1.0),
                )
            })
            .collect();
        assert_eq!(RawSeries::new(slices.clone()).unwrap().len(), 3);

        let mut shrinking = slices;
        shrinking[2].bounds.upper = shrinking[1].bounds.upper;
        shrinking[2].time = shrinking[2].time + Duration::minutes(1);
        assert!(matches!(
            RawSeries::new(shrinking),
            Err(PrecipError::ConcatenationError(_))
        ));
    }

    #[test]
    fn test_concatenate_nothing_fails() {
        assert!(RawSeries::concatenate(Vec::new()).is_err());
    }

    #[test]
    fn test_coordinate_detection() {
        let grid = Grid::new(vec![
            Coordinate::new("y", "degrees_north", vec![0.0]),
            Coordinate::new("lon", "degrees", vec![0.0]),
        ]);
        assert_eq!(grid.latitude_axis(), Some(0));
        assert_eq!(grid.longitude_axis(), Some(1));
    }
}
