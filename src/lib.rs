//! precip-accum: precipitation accumulation from gridded rates and forecasts
//!
//! Two pipelines share one data model and one set of reduction kernels:
//!
//! - **GPM accumulation** ([`gpm`]): half-hourly GPM IMERG precipitation rates
//!   from daily NetCDF files are summed into fixed-period depth totals, one
//!   output file per window, optionally cut to a sub-region.
//! - **Forecast analysis** ([`analysis`]): running precipitation totals from
//!   lead-0 and lead-N forecast files are differenced per category
//!   (convective, large-scale) and summed into a total analysis.
//!
//! ## Module Organization
//!
//! - [`field`]: gridded fields, time slices and concatenated series
//! - [`time_window`]: accumulation windows and time stepping
//! - [`selection`]: picking slices for a window and validating bounds
//! - [`accumulation`]: combining, rate summing and differencing kernels
//! - [`output`]: output names, cutouts and hand-off to storage
//! - [`discovery`]: locating daily GPM files on disk
//! - [`netcdf_io`] and [`metadata`]: NetCDF-backed [`FieldStore`]
//! - [`parallel`]: Rayon thread pool configuration
//! - [`cli`] and [`logging`]: command-line options and tracing setup
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use precip_accum::prelude::*;
//! use std::path::PathBuf;
//!
//! let config = GpmConfig {
//!     datadir: PathBuf::from("/data/gpm"),
//!     outdir: PathBuf::from("/data/out"),
//!     obs: ObsType::Gpm,
//!     start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
//!     end: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap().and_hms_opt(0, 0, 0).unwrap(),
//!     accum_period_hours: 24,
//!     cutout: None,
//!     cycle_point: None,
//!     max_lead_hours: None,
//!     parallel: ParallelConfig::sequential(),
//! };
//! let written = precip_accum::gpm::run(&config, &NetCdfStore::new()).unwrap();
//! println!("wrote {} files", written.len());
//! ```

pub mod accumulation;
pub mod analysis;
pub mod cli;
pub mod discovery;
pub mod errors;
pub mod field;
pub mod gpm;
pub mod logging;
pub mod metadata;
pub mod netcdf_io;
pub mod output;
pub mod parallel;
pub mod selection;
pub mod time_window;

pub use errors::{PrecipError, Result};
pub use field::{AccumulatedField, Coordinate, Grid, GridField, RawSeries, TimeBounds, TimeSlice};
pub use netcdf_io::{ComponentSelector, FieldStore, NetCdfStore};
pub use time_window::TimeWindow;

/// Commonly used types and functions
pub mod prelude {
    pub use crate::accumulation::{accumulate_rate, combine, difference};
    pub use crate::analysis::{AnalysisConfig, PrecipCategory};
    pub use crate::discovery::ObsType;
    pub use crate::errors::{PrecipError, Result};
    pub use crate::field::{AccumulatedField, GridField, RawSeries, TimeBounds, TimeSlice};
    pub use crate::gpm::GpmConfig;
    pub use crate::netcdf_io::{ComponentSelector, FieldStore, NetCdfStore};
    pub use crate::output::Cutout;
    pub use crate::parallel::ParallelConfig;
    pub use crate::time_window::{generate_windows, TimeWindow};
    pub use chrono::{NaiveDate, NaiveDateTime};
}
