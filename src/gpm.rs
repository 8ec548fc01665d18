//! GPM rate accumulation pipeline
//!
//! Loads every daily GPM IMERG file touching the requested period, joins them
//! into one half-hourly series and writes one depth total per accumulation
//! window.

use crate::accumulation::accumulate_rate;
use crate::discovery::{resolve_daily_file, ObsType};
use crate::errors::{PrecipError, Result};
use crate::field::RawSeries;
use crate::netcdf_io::{ComponentSelector, FieldStore};
use crate::output::{crop, emit, gpm_output_path, validity_interval, Cutout};
use crate::parallel::ParallelConfig;
use crate::selection::select_window;
use crate::time_window::{days_spanned, generate_windows, hours_duration, Windows};
use chrono::{Duration, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

/// Validated settings for one accumulation run
#[derive(Debug, Clone)]
pub struct GpmConfig {
    pub datadir: PathBuf,
    pub outdir: PathBuf,
    pub obs: ObsType,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub accum_period_hours: i64,
    pub cutout: Option<Cutout>,
    /// Forecast cycle the windows are aligned to, paired with `max_lead_hours`
    pub cycle_point: Option<NaiveDateTime>,
    pub max_lead_hours: Option<i64>,
    pub parallel: ParallelConfig,
}

impl GpmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.accum_period_hours <= 0 {
            return Err(PrecipError::InvalidConfiguration(format!(
                "accumulation period must be positive, got {} hours",
                self.accum_period_hours
            )));
        }
        if self.start >= self.end {
            return Err(PrecipError::InvalidConfiguration(format!(
                "start date {} must be before end date {}",
                self.start, self.end
            )));
        }
        match (self.cycle_point, self.max_lead_hours) {
            (Some(_), Some(lead)) if lead <= 0 => Err(PrecipError::InvalidConfiguration(format!(
                "max lead must be positive, got {} hours",
                lead
            ))),
            (Some(_), None) | (None, Some(_)) => Err(PrecipError::InvalidConfiguration(
                "cycle point and max lead must be given together".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Reference time and total span the windows cover
    pub fn window_range(&self) -> Result<(NaiveDateTime, Duration)> {
        match (self.cycle_point, self.max_lead_hours) {
            (Some(cycle_point), Some(lead)) => Ok((cycle_point, hours_duration(lead, "max lead")?)),
            _ => Ok((self.start, self.end - self.start)),
        }
    }

    pub fn windows(&self) -> Result<Windows> {
        let (reference, span) = self.window_range()?;
        let period = hours_duration(self.accum_period_hours, "accumulation period")?;
        generate_windows(reference, span, period)
    }
}

/// Load and concatenate the daily files covering `[first, last]`
///
/// Days without a file are skipped; an entirely empty result is an error.
pub fn load_series<S: FieldStore + ?Sized>(
    store: &S,
    datadir: &Path,
    obs: ObsType,
    first: NaiveDateTime,
    last: NaiveDateTime,
) -> Result<RawSeries> {
    let mut parts = Vec::new();
    for day in days_spanned(first, last) {
        match resolve_daily_file(datadir, obs, day) {
            Some(path) => {
                debug!(day = %day, path = %path.display(), "Loading daily file");
                parts.push(store.load(&path, &ComponentSelector::Primary)?);
            }
            None => warn!(day = %day, obs = %obs, "No file found, skipping day"),
        }
    }

    if parts.is_empty() {
        return Err(PrecipError::ConcatenationError(format!(
            "no {} files found under {} between {} and {}",
            obs,
            datadir.display(),
            first,
            last
        )));
    }
    RawSeries::concatenate(parts)
}

/// Run the accumulation, returning the paths written in window order
///
/// The first failing window aborts the run; files already written are kept.
pub fn run<S: FieldStore + ?Sized>(config: &GpmConfig, store: &S) -> Result<Vec<PathBuf>> {
    config.validate()?;

    let span = info_span!("gpm", obs = %config.obs, period_hours = config.accum_period_hours);
    let _guard = span.enter();

    let windows: Vec<_> = config.windows()?.collect();
    let (first, last) = match (windows.first(), windows.last()) {
        (Some(first), Some(last)) => (first.start, last.end),
        _ => {
            return Err(PrecipError::InvalidConfiguration(
                "no accumulation windows in the requested range".to_string(),
            ))
        }
    };
    info!(
        windows = windows.len(),
        start = %first,
        end = %last,
        "Accumulating precipitation"
    );

    let series = load_series(store, &config.datadir, config.obs, first, last)?;
    info!(slices = series.len(), "Concatenated source files");

    if !config.outdir.exists() {
        fs::create_dir_all(&config.outdir)?;
    }

    let mut written = Vec::with_capacity(windows.len());
    for window in &windows {
        let selected = select_window(&series, window)?;
        let mut acc = accumulate_rate(&selected, window, &config.parallel)?;

        match &config.cutout {
            Some(cutout) => {
                debug!(window = %window, ?cutout, "Trimming to sub-region");
                acc.field = crop(&acc.field, cutout)?;
            }
            None => debug!(window = %window, "No cutout requested, keeping global field"),
        }
        acc.field
            .attributes
            .insert("obs_label".to_string(), config.obs.label().to_string());

        let (start, end) = validity_interval(&acc);
        let path = gpm_output_path(&config.outdir, start, end);
        emit(store, &acc, &path)?;
        written.push(path);
    }

    info!(files = written.len(), "Finished accumulation");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::testing::{dt, half_hourly_series};
    use crate::netcdf_io::testing::MemoryStore;
    use tempfile::{tempdir, TempDir};

    /// Placeholder daily files on disk plus their in-memory contents
    fn fixture(days: &[(u32, f32)]) -> (TempDir, MemoryStore) {
        let dir = tempdir().expect("Failed to create temp dir");
        let year_dir = dir.path().join("data").join("production").join("2024");
        fs::create_dir_all(&year_dir).unwrap();

        let mut store = MemoryStore::default();
        for &(day, value) in days {
            let path = year_dir.join(format!("gpm_imerg_production_V07A_202401{:02}.nc", day));
            fs::write(&path, b"").unwrap();
            let slices = half_hourly_series(dt(2024, 1, day, 0, 0, 0), 48, value);
            let series = RawSeries::new(slices).unwrap();
            store.insert(&path, ComponentSelector::Primary, series);
        }
        (dir, store)
    }

    fn config(dir: &Path) -> GpmConfig {
        GpmConfig {
            datadir: dir.join("data"),
            outdir: dir.join("out"),
            obs: ObsType::Gpm,
            start: dt(2024, 1, 1, 0, 0, 0),
            end: dt(2024, 1, 3, 0, 0, 0),
            accum_period_hours: 24,
            cutout: None,
            cycle_point: None,
            max_lead_hours: None,
            parallel: ParallelConfig::sequential(),
        }
    }

    #[test]
    fn test_daily_accumulations() {
        let (dir, store) = fixture(&[(1, 1.0), (2, 2.0), (3, 0.0)]);
        let written = run(&config(dir.path()), &store).unwrap();

        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["gpm_2024010100_2024010200.nc", "gpm_2024010200_2024010300.nc"]);
        assert!(dir.path().join("out").is_dir());

        let saved = store.saved.borrow();
        assert_eq!(saved.len(), 2);
        assert!(saved[0].1.field.data.iter().all(|&v| v == 24.0));
        assert!(saved[1].1.field.data.iter().all(|&v| v == 48.0));
        assert_eq!(saved[0].1.field.name, "Precipitation Amount");
        assert_eq!(
            saved[0].1.field.attributes.get("obs_label").map(String::as_str),
            Some("final")
        );
    }

    #[test]
    fn test_missing_day_is_skipped_then_window_fails() {
        let (dir, store) = fixture(&[(1, 1.0)]);
        let result = run(&config(dir.path()), &store);

        // day one still gets written before the gap aborts the run
        assert!(matches!(result, Err(PrecipError::EmptySelection(_))));
        assert_eq!(store.saved_paths().len(), 1);
    }

    #[test]
    fn test_no_files_at_all() {
        let (dir, store) = fixture(&[]);
        assert!(matches!(
            run(&config(dir.path()), &store),
            Err(PrecipError::ConcatenationError(_))
        ));
    }

    #[test]
    fn test_oversized_hours_are_configuration_errors() {
        let (dir, store) = fixture(&[(1, 1.0)]);
        let mut cfg = config(dir.path());
        cfg.cycle_point = Some(dt(2024, 1, 1, 0, 0, 0));
        cfg.max_lead_hours = Some(10_000_000_000);
        assert!(matches!(run(&cfg, &store), Err(PrecipError::InvalidConfiguration(_))));

        let mut cfg = config(dir.path());
        cfg.accum_period_hours = i64::MAX;
        assert!(matches!(run(&cfg, &store), Err(PrecipError::InvalidConfiguration(_))));
        assert!(store.saved_paths().is_empty());
    }

    #[test]
    fn test_cycle_point_overrides_range() {
        let (dir, store) = fixture(&[(1, 1.0), (2, 1.0)]);
        let mut cfg = config(dir.path());
        cfg.accum_period_hours = 6;
        cfg.cycle_point = Some(dt(2024, 1, 1, 12, 0, 0));
        cfg.max_lead_hours = Some(12);

        let written = run(&cfg, &store).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("gpm_2024010112_2024010118.nc"));
        assert!(store.saved.borrow()[1].1.field.data.iter().all(|&v| v == 6.0));
    }

    #[test]
    fn test_cutout_applied() {
        let (dir, store) = fixture(&[(1, 1.0), (2, 1.0)]);
        let mut cfg = config(dir.path());
        cfg.end = dt(2024, 1, 2, 0, 0, 0);
        cfg.cutout = Some(Cutout::from_values(&[0.0, 10.0, -10.0, -10.0]).unwrap());

        run(&cfg, &store).unwrap();
        assert_eq!(store.saved.borrow()[0].1.field.data.shape(), &[1, 2]);
    }

    #[test]
    fn test_invalid_configuration_before_io() {
        let (dir, store) = fixture(&[(1, 1.0)]);
        let mut cfg = config(dir.path());
        cfg.cycle_point = Some(dt(2024, 1, 1, 0, 0, 0));
        assert!(matches!(run(&cfg, &store), Err(PrecipError::InvalidConfiguration(_))));

        let mut cfg = config(dir.path());
        cfg.accum_period_hours = 0;
        assert!(matches!(run(&cfg, &store), Err(PrecipError::InvalidConfiguration(_))));
        assert!(!dir.path().join("out").exists());
    }
}
