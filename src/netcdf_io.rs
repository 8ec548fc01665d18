//! Gridded-field storage backed by NetCDF files
//!
//! The pipelines only see the [`FieldStore`] trait: load a time series of one
//! component from a file, and save one accumulated field to a file. The
//! NetCDF implementation reads CF time coordinates with bounds and writes
//! each result as a single-time-step file with its bounds preserved.

use crate::errors::{PrecipError, Result};
use crate::field::{AccumulatedField, Coordinate, Grid, GridField, RawSeries, TimeBounds, TimeSlice};
use crate::metadata::{fill_value, packing, stash_code, string_attr, TimeUnits};
use chrono::{NaiveDate, Utc};
use ndarray::{arr1, arr2, ArrayD, Axis};
use netcdf::{File, Variable};
use std::fmt;
use std::{fs, path::Path};
use tracing::debug;

/// Dimension names used for time-bounds pairs
const BOUNDS_DIMS: [&str; 4] = ["bnds", "nv", "nv2", "bounds"];

/// Attributes consumed while loading and not carried on the field
const RESERVED_ATTRIBUTES: [&str; 11] = [
    "units",
    "long_name",
    "standard_name",
    "_FillValue",
    "missing_value",
    "scale_factor",
    "add_offset",
    "coordinates",
    "grid_mapping",
    "cell_methods",
    "bounds",
];

/// Which variable of a file to load
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentSelector {
    /// First data variable that is neither a coordinate nor a bounds array
    Primary,
    /// Variable with this NetCDF name
    Name(String),
    /// Variable whose STASH attribute matches this code
    Stash(String),
}

impl fmt::Display for ComponentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary variable"),
            Self::Name(name) => write!(f, "variable '{}'", name),
            Self::Stash(code) => write!(f, "STASH {}", code),
        }
    }
}

/// Load/save collaborator used by both pipelines
pub trait FieldStore {
    /// Load every time slice of the selected component in `path`
    fn load(&self, path: &Path, selector: &ComponentSelector) -> Result<RawSeries>;

    /// Persist one accumulated field, writing missing cells as `fill_value`
    fn save(&self, field: &AccumulatedField, path: &Path, fill_value: f32) -> Result<()>;
}

/// [`FieldStore`] reading and writing NetCDF files
#[derive(Debug, Clone, Copy, Default)]
pub struct NetCdfStore;

impl NetCdfStore {
    pub fn new() -> Self {
        Self
    }
}

impl FieldStore for NetCdfStore {
    fn load(&self, path: &Path, selector: &ComponentSelector) -> Result<RawSeries> {
        let file = netcdf::open(path)?;
        let var = select_variable(&file, selector, path)?;
        read_series(&file, &var, path)
    }

    fn save(&self, field: &AccumulatedField, path: &Path, fill_value: f32) -> Result<()> {
        write_field(field, path, fill_value)
    }
}

fn is_bounds_dim(name: &str) -> bool {
    BOUNDS_DIMS.contains(&name)
}

fn is_data_variable(var: &Variable) -> bool {
    let dims = var.dimensions();
    if dims.is_empty() {
        return false;
    }
    if dims.len() == 1 && dims[0].name() == var.name() {
        return false;
    }
    !dims.iter().any(|d| is_bounds_dim(&d.name()))
}

fn select_variable<'f>(
    file: &'f File,
    selector: &ComponentSelector,
    path: &Path,
) -> Result<Variable<'f>> {
    let not_found = || PrecipError::VariableNotFound {
        var: selector.to_string(),
        file: path.display().to_string(),
    };

    match selector {
        ComponentSelector::Primary => file.variables().find(is_data_variable).ok_or_else(not_found),
        ComponentSelector::Name(name) => file.variable(name).ok_or_else(not_found),
        ComponentSelector::Stash(code) => file
            .variables()
            .find(|v| is_data_variable(v) && stash_code(v).as_deref() == Some(code.as_str()))
            .ok_or_else(not_found),
    }
}

fn is_time_coordinate(var: &Variable) -> bool {
    string_attr(var, "units").is_some_and(|u| u.contains(" since "))
}

/// Time coordinate of `var`: a dimension coordinate, or a scalar one named in
/// the variable's `coordinates` attribute
fn find_time(file: &File, var: &Variable) -> Option<(Option<usize>, String)> {
    for (axis, dim) in var.dimensions().iter().enumerate() {
        if let Some(coord) = file.variable(&dim.name()) {
            if is_time_coordinate(&coord) {
                return Some((Some(axis), dim.name()));
            }
        }
    }

    let listed = string_attr(var, "coordinates").unwrap_or_default();
    listed
        .split_whitespace()
        .chain(std::iter::once("time"))
        .filter_map(|name| file.variable(name))
        .find(|coord| coord.dimensions().is_empty() && is_time_coordinate(coord))
        .map(|coord| (None, coord.name()))
}

fn read_series(file: &File, var: &Variable, path: &Path) -> Result<RawSeries> {
    let (time_axis, time_name) = find_time(file, var).ok_or_else(|| {
        PrecipError::InvalidMetadata(format!(
            "'{}' in {} has no time coordinate",
            var.name(),
            path.display()
        ))
    })?;
    let time_var = file
        .variable(&time_name)
        .ok_or_else(|| PrecipError::InvalidMetadata(format!("missing '{}' variable", time_name)))?;

    let units_text = string_attr(&time_var, "units").unwrap_or_default();
    let time_units = TimeUnits::parse(&units_text)?;
    let times: Vec<f64> = time_var.get_values::<f64, _>(..)?;

    let bounds_name = string_attr(&time_var, "bounds").ok_or_else(|| {
        PrecipError::InvalidMetadata(format!(
            "time coordinate '{}' in {} has no bounds",
            time_name,
            path.display()
        ))
    })?;
    let bounds_var = file.variable(&bounds_name).ok_or_else(|| {
        PrecipError::InvalidMetadata(format!("missing bounds variable '{}'", bounds_name))
    })?;
    let raw_bounds: Vec<f64> = bounds_var.get_values::<f64, _>(..)?;
    if raw_bounds.len() != times.len() * 2 {
        return Err(PrecipError::InvalidMetadata(format!(
            "'{}' holds {} values for {} time points",
            bounds_name,
            raw_bounds.len(),
            times.len()
        )));
    }

    let dims = var.dimensions();
    let mut coordinates = Vec::new();
    for (axis, dim) in dims.iter().enumerate() {
        if Some(axis) == time_axis {
            continue;
        }
        let name = dim.name();
        let coordinate = match file.variable(&name) {
            Some(coord_var) => Coordinate::new(
                name.clone(),
                string_attr(&coord_var, "units").unwrap_or_default(),
                coord_var.get_values::<f64, _>(..)?,
            ),
            None => Coordinate::new(name.clone(), "1", (0..dim.len()).map(|i| i as f64).collect()),
        };
        coordinates.push(coordinate);
    }
    let grid = Grid::new(coordinates);

    let shape: Vec<usize> = dims.iter().map(netcdf::Dimension::len).collect();
    let fill = fill_value(var);
    let (scale, offset) = packing(var);
    let values: Vec<f32> = var
        .get_values::<f64, _>(..)?
        .into_iter()
        .map(|raw| {
            if raw.is_nan() || fill.is_some_and(|f| raw == f) {
                f32::NAN
            } else {
                #[allow(clippy::cast_possible_truncation)]
                {
                    (raw * scale + offset) as f32
                }
            }
        })
        .collect();
    let data = ArrayD::from_shape_vec(shape, values)?;

    let name = string_attr(var, "standard_name")
        .or_else(|| string_attr(var, "long_name"))
        .unwrap_or_else(|| var.name());
    let units = string_attr(var, "units").unwrap_or_else(|| "1".to_string());
    let mut template =
        GridField::new(name, units, grid, ArrayD::zeros(grid_shape(&data, time_axis)))?;
    for attr in var.attributes() {
        let attr_name = attr.name().to_string();
        if RESERVED_ATTRIBUTES.contains(&attr_name.as_str()) {
            continue;
        }
        if let Some(value) = string_attr(var, &attr_name) {
            template.attributes.insert(attr_name, value);
        }
    }

    let mut slices = Vec::with_capacity(times.len());
    for (i, &t) in times.iter().enumerate() {
        let slice_data = match time_axis {
            Some(axis) => data.index_axis(Axis(axis), i).to_owned(),
            None => data.clone(),
        };
        let mut field = template.clone();
        field.data = slice_data;
        let bounds = TimeBounds::new(
            time_units.decode(raw_bounds[2 * i]),
            time_units.decode(raw_bounds[2 * i + 1]),
        );
        slices.push(TimeSlice::new(time_units.decode(t), bounds, field));
    }

    debug!(
        path = %path.display(),
        variable = %var.name(),
        slices = slices.len(),
        "Loaded time series"
    );
    RawSeries::new(slices)
}

fn grid_shape(data: &ArrayD<f32>, time_axis: Option<usize>) -> Vec<usize> {
    let mut shape = data.shape().to_vec();
    if let Some(axis) = time_axis {
        shape.remove(axis);
    }
    shape
}

/// NetCDF-safe variable name derived from a field name
pub fn variable_name(name: &str) -> String {
    let mut var_name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    while var_name.contains("__") {
        var_name = var_name.replace("__", "_");
    }
    let trimmed = var_name.trim_matches('_');
    if trimmed.is_empty() {
        "field".to_string()
    } else if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("v_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

fn write_field(acc: &AccumulatedField, path: &Path, fill_value: f32) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }

    let field = &acc.field;
    let mut file = netcdf::create(path)?;

    file.add_dimension("time", 1)?;
    file.add_dimension("bnds", 2)?;
    for coord in &field.grid.coordinates {
        file.add_dimension(&coord.name, coord.len())?;
    }

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| PrecipError::InvalidMetadata("invalid time epoch".to_string()))?;
    let time_units = TimeUnits::hours_since(epoch);

    {
        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", time_units.to_cf_string())?;
        time_var.put_attribute("standard_name", "time")?;
        time_var.put_attribute("calendar", "gregorian")?;
        time_var.put_attribute("bounds", "time_bnds")?;
        time_var.put(arr1(&[time_units.encode(acc.bounds.upper)]).view(), ..)?;
    }
    {
        let mut bounds_var = file.add_variable::<f64>("time_bnds", &["time", "bnds"])?;
        let bounds = arr2(&[[
            time_units.encode(acc.bounds.lower),
            time_units.encode(acc.bounds.upper),
        ]]);
        bounds_var.put(bounds.view(), ..)?;
    }

    for coord in &field.grid.coordinates {
        let mut coord_var = file.add_variable::<f64>(&coord.name, &[coord.name.as_str()])?;
        if !coord.units.is_empty() {
            coord_var.put_attribute("units", coord.units.as_str())?;
        }
        if coord.is_latitude() {
            coord_var.put_attribute("standard_name", "latitude")?;
        } else if coord.is_longitude() {
            coord_var.put_attribute("standard_name", "longitude")?;
        }
        coord_var.put(arr1(&coord.values).view(), ..)?;
    }

    let mut dim_names: Vec<&str> = vec!["time"];
    dim_names.extend(field.grid.coordinates.iter().map(|c| c.name.as_str()));

    let var_name = variable_name(&field.name);
    let mut data_var = file.add_variable::<f32>(&var_name, &dim_names)?;
    data_var.put_attribute("_FillValue", fill_value)?;
    data_var.put_attribute("long_name", field.name.as_str())?;
    data_var.put_attribute("units", field.units.as_str())?;
    for (key, value) in &field.attributes {
        data_var.put_attribute(key, value.as_str())?;
    }

    let filled = field
        .data
        .mapv(|v| if v.is_nan() { fill_value } else { v })
        .insert_axis(Axis(0));
    data_var.put(filled.view(), ..)?;

    file.add_attribute("Conventions", "CF-1.7")?;
    file.add_attribute(
        "history",
        format!("Created by precip-accum on {}", Utc::now().to_rfc3339()),
    )?;

    debug!(path = %path.display(), variable = %var_name, "Wrote field");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_name() {
        assert_eq!(variable_name("Precipitation Amount"), "precipitation_amount");
        assert_eq!(
            variable_name("(t+6)-(t+0) conv analysis"),
            "t_6_t_0_conv_analysis"
        );
        assert_eq!(
            variable_name("Total Precipitation Accumulation"),
            "total_precipitation_accumulation"
        );
        assert_eq!(variable_name("---"), "field");
        assert_eq!(variable_name("6h total"), "v_6h_total");
    }

    #[test]
    fn test_selector_display() {
        assert_eq!(
            ComponentSelector::Stash("m01s05i201".to_string()).to_string(),
            "STASH m01s05i201"
        );
        assert_eq!(ComponentSelector::Primary.to_string(), "primary variable");
    }
}
