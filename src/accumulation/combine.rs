//! Element-wise combination of component fields

use crate::errors::Result;
use crate::field::GridField;

/// Sums two components of one physical category into a new field
///
/// Attributes shared by both inputs with equal values are carried over;
/// the inputs are left untouched.
///
/// # Errors
///
/// Returns [`crate::PrecipError::GridMismatchError`] if the fields differ in
/// shape, coordinates or units.
pub fn combine(a: &GridField, b: &GridField, name: &str) -> Result<GridField> {
    a.check_compatible(b)?;

    let data = &a.data + &b.data;
    let mut combined = GridField::new(name, a.units.clone(), a.grid.clone(), data)?;
    combined.attributes = a
        .attributes
        .iter()
        .filter(|(key, value)| b.attributes.get(*key) == Some(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(combined)
}
