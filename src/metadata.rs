//! NetCDF attribute helpers and CF time-unit decoding
//!
//! Time coordinates are stored as offsets from an epoch (`hours since
//! 1970-01-01 00:00:00`); [`TimeUnits`] converts between those offsets and
//! `NaiveDateTime`.

use crate::errors::{PrecipError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use netcdf::{AttributeValue, Variable};

/// Attribute holding the UM STASH code when PP files are converted to NetCDF
pub const STASH_ATTRIBUTES: [&str; 2] = ["um_stash_source", "STASH"];

/// A CF `<unit> since <epoch>` time encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    /// Length of one unit, in seconds
    pub unit_seconds: i64,
    pub epoch: NaiveDateTime,
}

impl TimeUnits {
    pub fn hours_since(epoch: NaiveDateTime) -> Self {
        Self {
            unit_seconds: 3600,
            epoch,
        }
    }

    /// Parse a CF time units string such as `seconds since 1970-01-01 00:00:00`
    pub fn parse(units: &str) -> Result<Self> {
        let (unit, epoch) = units.split_once(" since ").ok_or_else(|| {
            PrecipError::InvalidMetadata(format!("'{}' is not a CF time unit", units))
        })?;

        let unit_seconds = match unit.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1,
            "minutes" | "minute" | "mins" | "min" => 60,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3600,
            "days" | "day" | "d" => 86_400,
            other => {
                return Err(PrecipError::InvalidMetadata(format!(
                    "unsupported time unit '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            unit_seconds,
            epoch: parse_epoch(epoch)?,
        })
    }

    /// Offset value to timestamp, rounded to the millisecond
    pub fn decode(&self, value: f64) -> NaiveDateTime {
        #[allow(clippy::cast_possible_truncation)]
        let millis = (value * self.unit_seconds as f64 * 1000.0).round() as i64;
        self.epoch + Duration::milliseconds(millis)
    }

    pub fn encode(&self, time: NaiveDateTime) -> f64 {
        let millis = (time - self.epoch).num_milliseconds();
        millis as f64 / (self.unit_seconds as f64 * 1000.0)
    }

    pub fn to_cf_string(&self) -> String {
        let unit = match self.unit_seconds {
            1 => "seconds",
            60 => "minutes",
            86_400 => "days",
            _ => "hours",
        };
        format!("{} since {}", unit, self.epoch.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn parse_epoch(epoch: &str) -> Result<NaiveDateTime> {
    let mut text = epoch.trim();
    for suffix in ["UTC", "Z", "+00:00"] {
        if let Some(stripped) = text.strip_suffix(suffix) {
            text = stripped.trim_end();
        }
    }
    let text = text.replace('T', " ");

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&text, format) {
            return Ok(parsed);
        }
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| PrecipError::InvalidMetadata(format!("unparseable time epoch '{}'", epoch)))
}

/// Checks for an attribute without triggering HDF5 error output
pub fn has_attr(var: &Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

pub fn string_attr(var: &Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        AttributeValue::Strs(ss) => Some(ss.join(" ")),
        _ => None,
    }
}

pub fn f64_attr(var: &Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f64::try_from(attr_value).ok()
}

/// `_FillValue`, falling back to `missing_value`
pub fn fill_value(var: &Variable) -> Option<f64> {
    f64_attr(var, "_FillValue").or_else(|| f64_attr(var, "missing_value"))
}

/// `(scale_factor, add_offset)` for packed variables, identity otherwise
pub fn packing(var: &Variable) -> (f64, f64) {
    (
        f64_attr(var, "scale_factor").unwrap_or(1.0),
        f64_attr(var, "add_offset").unwrap_or(0.0),
    )
}

/// STASH code of a UM-derived variable, if recorded
pub fn stash_code(var: &Variable) -> Option<String> {
    STASH_ATTRIBUTES
        .iter()
        .find_map(|name| string_attr(var, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::testing::dt;

    #[test]
    fn test_parse_hours_since() {
        let units = TimeUnits::parse("hours since 1970-01-01 00:00:00").unwrap();
        assert_eq!(units.unit_seconds, 3600);
        assert_eq!(units.epoch, dt(1970, 1, 1, 0, 0, 0));
        assert_eq!(units.decode(24.5), dt(1970, 1, 2, 0, 30, 0));
    }

    #[test]
    fn test_parse_variants() {
        let units = TimeUnits::parse("seconds since 2000-01-01T12:00:00Z").unwrap();
        assert_eq!(units.epoch, dt(2000, 1, 1, 12, 0, 0));
        assert_eq!(units.decode(1799.0), dt(2000, 1, 1, 12, 29, 59));

        let units = TimeUnits::parse("days since 2024-01-01").unwrap();
        assert_eq!(units.decode(1.25), dt(2024, 1, 2, 6, 0, 0));

        assert!(TimeUnits::parse("fortnights since 2024-01-01").is_err());
        assert!(TimeUnits::parse("hours").is_err());
        assert!(TimeUnits::parse("hours since yesterday").is_err());
    }

    #[test]
    fn test_encode_round_trip() {
        let units = TimeUnits::hours_since(dt(1970, 1, 1, 0, 0, 0));
        let t = dt(2024, 6, 1, 6, 0, 0);
        assert_eq!(units.decode(units.encode(t)), t);
        assert_eq!(units.to_cf_string(), "hours since 1970-01-01 00:00:00");
    }
}
