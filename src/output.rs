//! Output naming, regional cutouts and hand-off to the field store

use crate::accumulation::VALID_TIME_FORMAT;
use crate::errors::{PrecipError, Result};
use crate::field::{AccumulatedField, Coordinate, Grid, GridField};
use crate::netcdf_io::FieldStore;
use crate::time_window::HOURLY_FORMAT;
use chrono::{Duration, NaiveDateTime};
use ndarray::Axis;
use std::path::{Path, PathBuf};
use tracing::info;

/// Fill value written for missing cells
pub const OUTPUT_FILL_VALUE: f32 = f32::NAN;

/// Reported validity interval of an accumulation
///
/// Source upper bounds sit one second before the period boundary
/// (`23:59:59`), so the end is pushed forward to land on it.
pub fn validity_interval(acc: &AccumulatedField) -> (NaiveDateTime, NaiveDateTime) {
    (acc.bounds.lower, acc.bounds.upper + Duration::seconds(1))
}

/// Longitude/latitude box to cut from a global field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cutout {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Cutout {
    /// Build from `[min_lon, max_lon, min_lat, max_lat]`
    pub fn from_values(values: &[f64]) -> Result<Self> {
        let [min_lon, max_lon, min_lat, max_lat] = values else {
            return Err(PrecipError::InvalidConfiguration(format!(
                "cutout needs 4 values (min_lon max_lon min_lat max_lat), got {}",
                values.len()
            )));
        };
        let cutout = Self {
            min_lon: *min_lon,
            max_lon: *max_lon,
            min_lat: *min_lat,
            max_lat: *max_lat,
        };
        if cutout.min_lon > cutout.max_lon || cutout.min_lat > cutout.max_lat {
            return Err(PrecipError::InvalidConfiguration(format!(
                "cutout minimum exceeds maximum: {:?}",
                values
            )));
        }
        Ok(cutout)
    }
}

/// Longitude shifted into `[min_lon, min_lon + 360)`
fn wrap_longitude(lon: f64, min_lon: f64) -> f64 {
    min_lon + (lon - min_lon).rem_euclid(360.0)
}

/// Restrict a field to the cells inside `cutout`
///
/// # Errors
///
/// Returns [`PrecipError::CropOutOfBounds`] if the grid has no recognisable
/// longitude/latitude axes or if no cell falls inside the box.
pub fn crop(field: &GridField, cutout: &Cutout) -> Result<GridField> {
    let (lon_axis, lat_axis) = match (field.grid.longitude_axis(), field.grid.latitude_axis()) {
        (Some(lon), Some(lat)) => (lon, lat),
        _ => {
            return Err(PrecipError::CropOutOfBounds(format!(
                "'{}' has no longitude/latitude axes to cut out (axes: {:?})",
                field.name,
                field.grid.dim_names()
            )))
        }
    };

    let lon = &field.grid.coordinates[lon_axis];
    let mut kept_lons: Vec<(usize, f64)> = lon
        .values
        .iter()
        .enumerate()
        .map(|(i, &v)| (i, wrap_longitude(v, cutout.min_lon)))
        .filter(|&(_, v)| v <= cutout.max_lon)
        .collect();
    kept_lons.sort_by(|a, b| a.1.total_cmp(&b.1));

    let lat = &field.grid.coordinates[lat_axis];
    let kept_lats: Vec<usize> = lat
        .values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v >= cutout.min_lat && v <= cutout.max_lat)
        .map(|(i, _)| i)
        .collect();

    if kept_lons.is_empty() || kept_lats.is_empty() {
        return Err(PrecipError::CropOutOfBounds(format!(
            "cutout {:?} does not intersect the grid of '{}'",
            cutout, field.name
        )));
    }

    let lon_indices: Vec<usize> = kept_lons.iter().map(|&(i, _)| i).collect();
    let data = field
        .data
        .select(Axis(lon_axis), &lon_indices)
        .select(Axis(lat_axis), &kept_lats);

    let mut coordinates = field.grid.coordinates.clone();
    coordinates[lon_axis] = Coordinate::new(
        lon.name.clone(),
        lon.units.clone(),
        kept_lons.iter().map(|&(_, v)| v).collect(),
    );
    coordinates[lat_axis] = Coordinate::new(
        lat.name.clone(),
        lat.units.clone(),
        kept_lats.iter().map(|&i| lat.values[i]).collect(),
    );

    let mut cropped = GridField::new(
        field.name.clone(),
        field.units.clone(),
        Grid::new(coordinates),
        data,
    )?;
    cropped.attributes = field.attributes.clone();
    Ok(cropped)
}

/// `<outdir>/gpm_<YYYYMMDDHH>_<YYYYMMDDHH>.nc`
pub fn gpm_output_path(outdir: &Path, start: NaiveDateTime, end: NaiveDateTime) -> PathBuf {
    outdir.join(format!(
        "gpm_{}_{}.nc",
        start.format(HOURLY_FORMAT),
        end.format(HOURLY_FORMAT)
    ))
}

/// `<outdir>/<reference>_VT<valid>_<suffix>.nc`, times as `YYYYMMDDTHHMMZ`
pub fn analysis_output_path(
    outdir: &Path,
    reference: NaiveDateTime,
    valid: NaiveDateTime,
    suffix: &str,
) -> PathBuf {
    outdir.join(format!(
        "{}_VT{}_{}.nc",
        reference.format(VALID_TIME_FORMAT),
        valid.format(VALID_TIME_FORMAT),
        suffix
    ))
}

/// Write one accumulated field through `store`
pub fn emit<S: FieldStore + ?Sized>(store: &S, acc: &AccumulatedField, path: &Path) -> Result<()> {
    info!(
        path = %path.display(),
        field = %acc.field.name,
        missing = acc.field.missing_count(),
        "Writing output"
    );
    store.save(acc, path, OUTPUT_FILL_VALUE)
}
