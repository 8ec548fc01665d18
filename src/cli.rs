//! Command-line options for the two binaries, defined with `clap`
//!
//! Arguments are parsed into `*Args` structs and turned into validated
//! pipeline configurations with `into_config`, before any file is touched.

use crate::accumulation::VALID_TIME_FORMAT;
use crate::analysis::{AnalysisConfig, DEFAULT_LEAD_TIMES};
use crate::discovery::ObsType;
use crate::errors::Result;
use crate::gpm::GpmConfig;
use crate::logging::MAX_VERBOSITY;
use crate::output::Cutout;
use crate::parallel::ParallelConfig;
use chrono::NaiveDateTime;
use clap::Parser;
use std::path::PathBuf;

/// Accumulate half-hourly GPM IMERG rates into fixed-period totals
#[derive(Parser, Debug)]
#[command(
    name = "calc_gpm_accumulation",
    version,
    about = "Accumulate GPM IMERG precipitation over fixed periods"
)]
pub struct GpmArgs {
    /// Top-level directory holding the GPM archive
    #[arg(long)]
    pub datadir: PathBuf,

    /// Directory for the accumulation files
    #[arg(short = 'o', long, default_value = ".")]
    pub outdir: PathBuf,

    /// GPM product: GPM (final) or GPM_NRTlate (near-real-time late)
    #[arg(long, value_parser = parse_obs)]
    pub obs: ObsType,

    /// First accumulation start, formatted YYYYMMDDHH
    #[arg(long = "start_date", value_parser = parse_hourly)]
    pub start_date: NaiveDateTime,

    /// End of the last accumulation, formatted YYYYMMDDHH
    #[arg(long = "end_date", value_parser = parse_hourly)]
    pub end_date: NaiveDateTime,

    /// Accumulation period in hours
    #[arg(long = "accum_period", default_value_t = 24)]
    pub accum_period: i64,

    /// Sub-region to keep: min_lon max_lon min_lat max_lat
    #[arg(long, num_args = 1.., allow_negative_numbers = true)]
    pub cutout: Option<Vec<f64>>,

    /// Forecast cycle to align windows to, YYYYMMDDTHHMMZ or YYYYMMDDHH
    #[arg(long = "cycle_point", value_parser = parse_cycle_point)]
    pub cycle_point: Option<NaiveDateTime>,

    /// Hours after the cycle point to accumulate up to
    #[arg(long = "max_lead")]
    pub max_lead: Option<i64>,

    /// Verbosity: 0 is info, 1-10 debug, higher trace
    #[arg(short, long, default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=MAX_VERBOSITY as i64))]
    pub verbose: u8,

    /// Spread the per-cell time reduction across all CPU cores
    #[arg(short, long)]
    pub parallel: bool,
}

impl GpmArgs {
    pub fn into_config(self) -> Result<GpmConfig> {
        let cutout = self
            .cutout
            .as_deref()
            .map(Cutout::from_values)
            .transpose()?;
        let parallel = if self.parallel {
            ParallelConfig::all_cores()
        } else {
            ParallelConfig::sequential()
        };

        let config = GpmConfig {
            datadir: self.datadir,
            outdir: self.outdir,
            obs: self.obs,
            start: self.start_date,
            end: self.end_date,
            accum_period_hours: self.accum_period,
            cutout,
            cycle_point: self.cycle_point,
            max_lead_hours: self.max_lead,
            parallel,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Difference lead-0 and lead-N forecast totals into precipitation analyses
#[derive(Parser, Debug)]
#[command(
    name = "process_analysis",
    version,
    about = "Build precipitation analyses from forecast accumulations"
)]
pub struct AnalysisArgs {
    /// Forecast reference time, formatted YYYYMMDDTHHMMZ
    #[arg(long, value_parser = parse_valid_time)]
    pub datetime: NaiveDateTime,

    /// Directory holding the <N>_hour forecast subdirectories
    #[arg(long)]
    pub datadir: PathBuf,

    /// Directory for the analysis files
    #[arg(long)]
    pub outdir: PathBuf,

    /// Lead times in hours, comma separated
    #[arg(long = "lead_times", value_delimiter = ',', default_values_t = DEFAULT_LEAD_TIMES)]
    pub lead_times: Vec<i64>,

    /// Also write the convective and large-scale analyses
    #[arg(long = "save_categories")]
    pub save_categories: bool,

    /// Verbosity: 0 is info, 1-10 debug, higher trace
    #[arg(short, long, default_value_t = 0,
          value_parser = clap::value_parser!(u8).range(0..=MAX_VERBOSITY as i64))]
    pub verbose: u8,
}

impl AnalysisArgs {
    pub fn into_config(self) -> Result<AnalysisConfig> {
        let config = AnalysisConfig {
            datetime: self.datetime,
            datadir: self.datadir,
            outdir: self.outdir,
            lead_times: self.lead_times,
            save_categories: self.save_categories,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_obs(s: &str) -> std::result::Result<ObsType, String> {
    s.parse::<ObsType>().map_err(|e| e.to_string())
}

/// Parse `YYYYMMDDHH`
pub fn parse_hourly(s: &str) -> std::result::Result<NaiveDateTime, String> {
    if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("Invalid date '{}': expected YYYYMMDDHH", s));
    }
    NaiveDateTime::parse_from_str(&format!("{}00", s), "%Y%m%d%H%M")
        .map_err(|e| format!("Invalid date '{}': {}", s, e))
}

/// Parse `YYYYMMDDTHHMMZ`
pub fn parse_valid_time(s: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, VALID_TIME_FORMAT)
        .map_err(|_| format!("Invalid time '{}': expected YYYYMMDDTHHMMZ", s))
}

/// Parse `YYYYMMDDTHHMMZ`, falling back to `YYYYMMDDHH`
pub fn parse_cycle_point(s: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_valid_time(s).or_else(|_| {
        parse_hourly(s).map_err(|_| {
            format!(
                "Invalid cycle point '{}': expected YYYYMMDDTHHMMZ or YYYYMMDDHH",
                s
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PrecipError;
    use crate::field::testing::dt;

    const GPM_REQUIRED: [&str; 9] = [
        "calc_gpm_accumulation",
        "--datadir",
        "/data/gpm",
        "--obs",
        "GPM_NRTlate",
        "--start_date",
        "2024010100",
        "--end_date",
        "2024010300",
    ];

    #[test]
    fn test_parse_dates() {
        assert_eq!(parse_hourly("2024013118").unwrap(), dt(2024, 1, 31, 18, 0, 0));
        assert!(parse_hourly("20240131").is_err());
        assert!(parse_hourly("2024013125").is_err());
        assert_eq!(parse_valid_time("20240601T0630Z").unwrap(), dt(2024, 6, 1, 6, 30, 0));
        assert_eq!(parse_cycle_point("2024060112").unwrap(), dt(2024, 6, 1, 12, 0, 0));
        assert!(parse_cycle_point("June").is_err());
    }

    #[test]
    fn test_gpm_defaults() {
        let args = GpmArgs::try_parse_from(GPM_REQUIRED).unwrap();
        assert_eq!(args.outdir, PathBuf::from("."));
        assert_eq!(args.accum_period, 24);
        assert_eq!(args.verbose, 0);
        assert!(!args.parallel);

        let config = args.into_config().unwrap();
        assert_eq!(config.obs, ObsType::GpmNrtLate);
        assert_eq!(config.start, dt(2024, 1, 1, 0, 0, 0));
        assert!(config.cutout.is_none());
        assert!(!config.parallel.enabled);
    }

    #[test]
    fn test_gpm_full_options() {
        let mut argv = GPM_REQUIRED.to_vec();
        argv.extend([
            "--cutout", "-30", "60", "-40", "40",
            "--accum_period", "6",
            "--cycle_point", "20240101T0600Z",
            "--max_lead", "36",
            "-v", "5",
            "-p",
            "-o", "/scratch/accum",
        ]);
        let config = GpmArgs::try_parse_from(argv).unwrap().into_config().unwrap();
        assert_eq!(config.outdir, PathBuf::from("/scratch/accum"));
        assert_eq!(
            config.cutout,
            Some(Cutout { min_lon: -30.0, max_lon: 60.0, min_lat: -40.0, max_lat: 40.0 })
        );
        assert_eq!(config.cycle_point, Some(dt(2024, 1, 1, 6, 0, 0)));
        assert_eq!(config.max_lead_hours, Some(36));
        assert!(config.parallel.enabled);
    }

    #[test]
    fn test_gpm_missing_required_argument() {
        assert!(GpmArgs::try_parse_from(GPM_REQUIRED[..7].to_vec()).is_err());
        let mut argv = GPM_REQUIRED.to_vec();
        argv[4] = "TRMM";
        assert!(GpmArgs::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_gpm_invalid_configuration() {
        let mut argv = GPM_REQUIRED.to_vec();
        argv.extend(["--cutout", "0", "10", "5"]);
        let result = GpmArgs::try_parse_from(argv).unwrap().into_config();
        assert!(matches!(result, Err(PrecipError::InvalidConfiguration(_))));

        let mut argv = GPM_REQUIRED.to_vec();
        argv.extend(["--max_lead", "24"]);
        let result = GpmArgs::try_parse_from(argv).unwrap().into_config();
        assert!(matches!(result, Err(PrecipError::InvalidConfiguration(_))));

        let mut argv = GPM_REQUIRED.to_vec();
        argv[6] = "2024010400";
        let result = GpmArgs::try_parse_from(argv).unwrap().into_config();
        assert!(matches!(result, Err(PrecipError::InvalidConfiguration(_))));

        let mut argv = GPM_REQUIRED.to_vec();
        argv.extend(["-v", "51"]);
        assert!(GpmArgs::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_analysis_args() {
        let args = AnalysisArgs::try_parse_from([
            "process_analysis",
            "--datetime",
            "20240601T0000Z",
            "--datadir",
            "/data/um",
            "--outdir",
            "/out",
        ])
        .unwrap();
        assert_eq!(args.lead_times, vec![6, 24]);
        assert!(!args.save_categories);

        let config = AnalysisArgs::try_parse_from([
            "process_analysis",
            "--datetime",
            "20240601T1200Z",
            "--datadir",
            "/data/um",
            "--outdir",
            "/out",
            "--lead_times",
            "12,48",
            "--save_categories",
        ])
        .unwrap()
        .into_config()
        .unwrap();
        assert_eq!(config.datetime, dt(2024, 6, 1, 12, 0, 0));
        assert_eq!(config.lead_times, vec![12, 48]);
        assert!(config.save_categories);

        assert!(AnalysisArgs::try_parse_from([
            "process_analysis",
            "--datetime",
            "2024060100",
            "--datadir",
            "/data/um",
            "--outdir",
            "/out",
        ])
        .is_err());
    }
}
