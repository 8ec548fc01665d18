//! Forecast precipitation analysis pipeline
//!
//! For each lead time `N`, the running totals in the lead-0 and lead-N
//! forecast files are differenced per precipitation category, giving the
//! precipitation that fell between the two. Convective and large-scale
//! results are then summed into a total analysis valid at `datetime + N`.

use crate::accumulation::{combine, difference, valid_time_label, VALID_TIME_FORMAT};
use crate::errors::{PrecipError, Result};
use crate::field::{AccumulatedField, RawSeries, TimeSlice};
use crate::netcdf_io::{ComponentSelector, FieldStore};
use crate::output::{analysis_output_path, emit};
use crate::selection::{first_and_last, single_slice, validate_span, REFERENCE_SPAN_HOURS};
use chrono::{Duration, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span};

pub const DEFAULT_LEAD_TIMES: [i64; 2] = [6, 24];

/// Name of the summed category analysis
pub const TOTAL_ANALYSIS_NAME: &str = "Total Precipitation Accumulation";

/// Suffix of the total analysis output file
const TOTAL_SUFFIX: &str = "analysis";

/// Precipitation category produced by a separate UM scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrecipCategory {
    Convective,
    LargeScale,
}

/// Per-category STASH codes and labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryInfo {
    pub rain_stash: &'static str,
    pub snow_stash: &'static str,
    /// Used in `total_<name>_precipitation`
    pub name: &'static str,
    /// Used in `(t+N)-(t+0) <label> analysis`
    pub label: &'static str,
    pub file_suffix: &'static str,
}

const CONVECTIVE: CategoryInfo = CategoryInfo {
    rain_stash: "m01s05i201",
    snow_stash: "m01s05i202",
    name: "convective",
    label: "conv",
    file_suffix: "conv_analysis",
};

const LARGE_SCALE: CategoryInfo = CategoryInfo {
    rain_stash: "m01s04i201",
    snow_stash: "m01s04i202",
    name: "large_scale",
    label: "large scale",
    file_suffix: "lsr_analysis",
};

impl PrecipCategory {
    pub const ALL: [PrecipCategory; 2] = [PrecipCategory::Convective, PrecipCategory::LargeScale];

    pub fn info(self) -> &'static CategoryInfo {
        match self {
            PrecipCategory::Convective => &CONVECTIVE,
            PrecipCategory::LargeScale => &LARGE_SCALE,
        }
    }

    pub fn components(self) -> [ComponentSelector; 2] {
        let info = self.info();
        [
            ComponentSelector::Stash(info.rain_stash.to_string()),
            ComponentSelector::Stash(info.snow_stash.to_string()),
        ]
    }

    pub fn total_name(self) -> String {
        format!("total_{}_precipitation", self.info().name)
    }
}

/// Validated settings for one analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Forecast reference (cycle) time
    pub datetime: NaiveDateTime,
    pub datadir: PathBuf,
    pub outdir: PathBuf,
    pub lead_times: Vec<i64>,
    pub save_categories: bool,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lead_times.is_empty() {
            return Err(PrecipError::InvalidConfiguration(
                "at least one lead time is required".to_string(),
            ));
        }
        if let Some(bad) = self.lead_times.iter().find(|&&lead| lead <= 0) {
            return Err(PrecipError::InvalidConfiguration(format!(
                "lead times must be positive, got {}",
                bad
            )));
        }
        Ok(())
    }
}

/// `(T000, T<NNN>)` forecast files for one lead time
pub fn forecast_paths(
    datadir: &Path,
    datetime: NaiveDateTime,
    lead_hours: i64,
) -> (PathBuf, PathBuf) {
    let dir = datadir.join(format!("{}_hour", lead_hours));
    let stamp = datetime.format(VALID_TIME_FORMAT);
    (
        dir.join(format!("{}_gl-mn_T000.nc", stamp)),
        dir.join(format!("{}_gl-mn_T{:03}.nc", stamp, lead_hours)),
    )
}

/// Rain plus snow for one category, slice by slice
///
/// # Errors
///
/// Returns [`PrecipError::GridMismatchError`] if the two components do not
/// share time bounds, grid and units.
pub fn create_total_field<S: FieldStore + ?Sized>(
    store: &S,
    path: &Path,
    category: PrecipCategory,
) -> Result<RawSeries> {
    let [rain_selector, snow_selector] = category.components();
    let rain = store.load(path, &rain_selector)?;
    let snow = store.load(path, &snow_selector)?;

    if rain.len() != snow.len() {
        return Err(PrecipError::GridMismatchError(format!(
            "{} has {} rain and {} snow time slices in {}",
            category.total_name(),
            rain.len(),
            snow.len(),
            path.display()
        )));
    }

    let name = category.total_name();
    let mut totals = Vec::with_capacity(rain.len());
    for (r, s) in rain.iter().zip(snow.iter()) {
        if r.bounds != s.bounds {
            return Err(PrecipError::GridMismatchError(format!(
                "rain bounds {} differ from snow bounds {} in {}",
                r.bounds,
                s.bounds,
                path.display()
            )));
        }
        totals.push(TimeSlice::new(r.time, r.bounds, combine(&r.field, &s.field, &name)?));
    }
    RawSeries::new(totals)
}

/// Products of one lead time, ready to write
#[derive(Debug, Clone)]
pub struct LeadAnalysis {
    pub lead_hours: i64,
    pub valid_time: NaiveDateTime,
    pub total: AccumulatedField,
    pub categories: Vec<(PrecipCategory, AccumulatedField)>,
}

fn analyse_category<S: FieldStore + ?Sized>(
    store: &S,
    t0_path: &Path,
    tn_path: &Path,
    lead_hours: i64,
    category: PrecipCategory,
) -> Result<AccumulatedField> {
    let t0 = create_total_field(store, t0_path, category)?;
    let tn = create_total_field(store, tn_path, category)?;

    let reference = single_slice(&t0)?;
    let (_, target) = first_and_last(&tn)?;

    validate_span(reference, REFERENCE_SPAN_HOURS)?;
    validate_span(target, lead_hours + REFERENCE_SPAN_HOURS)?;
    debug!(category = category.info().name, lead_hours, "Bounds are correct");

    difference(target, reference, lead_hours, category.info().label)
}

/// Difference every category for one lead time and sum them
pub fn analyse_lead<S: FieldStore + ?Sized>(
    store: &S,
    config: &AnalysisConfig,
    lead_hours: i64,
) -> Result<LeadAnalysis> {
    let (t0_path, tn_path) = forecast_paths(&config.datadir, config.datetime, lead_hours);

    let mut categories = Vec::with_capacity(PrecipCategory::ALL.len());
    for category in PrecipCategory::ALL {
        let analysis = analyse_category(store, &t0_path, &tn_path, lead_hours, category)?;
        categories.push((category, analysis));
    }

    let (conv, lsr) = match categories.as_slice() {
        [(_, conv), (_, lsr)] => (conv, lsr),
        _ => {
            return Err(PrecipError::InvalidConfiguration(
                "expected convective and large-scale analyses".to_string(),
            ))
        }
    };
    let valid_label = valid_time_label(config.datetime, lead_hours);
    let total_field = combine(&conv.field, &lsr.field, TOTAL_ANALYSIS_NAME)?
        .with_attribute("valid_time", valid_label);
    let total = AccumulatedField {
        field: total_field,
        bounds: lsr.bounds,
        window: lsr.window,
    };

    Ok(LeadAnalysis {
        lead_hours,
        valid_time: config.datetime + Duration::hours(lead_hours),
        total,
        categories,
    })
}

/// Run every configured lead time, returning the paths written
///
/// Each lead's files are only written once all its checks have passed.
pub fn run<S: FieldStore + ?Sized>(config: &AnalysisConfig, store: &S) -> Result<Vec<PathBuf>> {
    config.validate()?;

    let span = info_span!("analysis", datetime = %config.datetime.format(VALID_TIME_FORMAT));
    let _guard = span.enter();
    info!(
        datadir = %config.datadir.display(),
        outdir = %config.outdir.display(),
        leads = ?config.lead_times,
        "Processing forecast analysis"
    );

    let mut written = Vec::new();
    for &lead_hours in &config.lead_times {
        let analysis = analyse_lead(store, config, lead_hours)?;
        info!(lead_hours, valid_time = %analysis.valid_time, "Computed analysis");

        if !config.outdir.exists() {
            fs::create_dir_all(&config.outdir)?;
        }

        if config.save_categories {
            for (category, field) in &analysis.categories {
                let path = analysis_output_path(
                    &config.outdir,
                    config.datetime,
                    analysis.valid_time,
                    category.info().file_suffix,
                );
                emit(store, field, &path)?;
                written.push(path);
            }
        }

        let path = analysis_output_path(
            &config.outdir,
            config.datetime,
            analysis.valid_time,
            TOTAL_SUFFIX,
        );
        emit(store, &analysis.total, &path)?;
        written.push(path);
    }

    Ok(written)
}
