//! Location of daily GPM source files
//!
//! Each observation type maps to a fixed path template under the data
//! directory. Templates contain date placeholders (`%Y`, `%m`, `%d`, `%H`,
//! `%M`) and `?` wildcards standing in for the product version, e.g.
//! `production/%Y/gpm_imerg_production_V???_%Y%m%d.nc`.

use crate::errors::{PrecipError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use walkdir::WalkDir;

/// GPM IMERG product to accumulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObsType {
    /// Final (research) run
    Gpm,
    /// Near-real-time late run
    GpmNrtLate,
}

/// Where and how one observation type is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObsSource {
    /// Name accepted on the command line
    pub name: &'static str,
    /// Short label written to output metadata
    pub label: &'static str,
    /// Path components relative to the data directory
    pub path_template: &'static [&'static str],
}

const GPM_FINAL: ObsSource = ObsSource {
    name: "GPM",
    label: "final",
    path_template: &["production", "%Y", "gpm_imerg_production_V???_%Y%m%d.nc"],
};

const GPM_NRT_LATE: ObsSource = ObsSource {
    name: "GPM_NRTlate",
    label: "late",
    path_template: &["NRTlate", "V???", "%Y", "gpm_imerg_NRTlate_V???_%Y%m%d.nc"],
};

impl ObsType {
    pub const ALL: [ObsType; 2] = [ObsType::Gpm, ObsType::GpmNrtLate];

    pub fn source(self) -> &'static ObsSource {
        match self {
            ObsType::Gpm => &GPM_FINAL,
            ObsType::GpmNrtLate => &GPM_NRT_LATE,
        }
    }

    pub fn label(self) -> &'static str {
        self.source().label
    }

    /// Path components for the file covering `day`, wildcards left in place
    pub fn path_pattern(self, day: NaiveDate) -> Vec<String> {
        let midnight = day.and_time(NaiveTime::MIN);
        self.source()
            .path_template
            .iter()
            .map(|component| insert_datetime(component, midnight))
            .collect()
    }
}

impl FromStr for ObsType {
    type Err = PrecipError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|obs| obs.source().name == s)
            .ok_or_else(|| {
                PrecipError::InvalidConfiguration(format!(
                    "Can't currently process that category of GPM data: {} (expected one of {})",
                    s,
                    Self::ALL
                        .iter()
                        .map(|obs| obs.source().name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

impl fmt::Display for ObsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source().name)
    }
}

/// Replace `%Y`, `%m`, `%d`, `%H` and `%M` with the components of `date_time`
pub fn insert_datetime(template: &str, date_time: NaiveDateTime) -> String {
    template
        .replace("%Y", &format!("{:04}", date_time.year()))
        .replace("%m", &format!("{:02}", date_time.month()))
        .replace("%d", &format!("{:02}", date_time.day()))
        .replace("%H", &format!("{:02}", date_time.hour()))
        .replace("%M", &format!("{:02}", date_time.minute()))
}

fn has_wildcard(component: &str) -> bool {
    component.contains(['?', '*'])
}

/// Shell-style match: `?` is any one character, `*` any run of characters
pub fn matches_wildcard(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

/// Existing file matching a pattern of path components under `base`
///
/// When several versions match, the lexicographically greatest path wins.
pub fn resolve_pattern(base: &Path, pattern: &[String]) -> Option<PathBuf> {
    let split = pattern
        .iter()
        .position(|c| has_wildcard(c))
        .unwrap_or(pattern.len());
    let root: PathBuf = pattern[..split].iter().fold(base.to_path_buf(), |p, c| p.join(c));
    let rest = &pattern[split..];

    if rest.is_empty() {
        return root.is_file().then_some(root);
    }

    WalkDir::new(&root)
        .min_depth(rest.len())
        .max_depth(rest.len())
        .into_iter()
        .filter_entry(|entry| {
            let depth = entry.depth();
            depth == 0
                || entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| matches_wildcard(&rest[depth - 1], name))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .max()
}

/// Daily file for `obs` covering `day`, if one exists
pub fn resolve_daily_file(datadir: &Path, obs: ObsType, day: NaiveDate) -> Option<PathBuf> {
    resolve_pattern(datadir, &obs.path_pattern(day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::testing::dt;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_obs_type_table() {
        assert_eq!("GPM".parse::<ObsType>().unwrap(), ObsType::Gpm);
        assert_eq!("GPM_NRTlate".parse::<ObsType>().unwrap(), ObsType::GpmNrtLate);
        assert_eq!(ObsType::Gpm.label(), "final");
        assert_eq!(ObsType::GpmNrtLate.label(), "late");
        assert_eq!(ObsType::GpmNrtLate.to_string(), "GPM_NRTlate");

        // every variant owns a distinct row and parses back from its name
        for obs in ObsType::ALL {
            assert_eq!(obs.source().name.parse::<ObsType>().unwrap(), obs);
        }
        assert_ne!(ObsType::Gpm.source(), ObsType::GpmNrtLate.source());

        match "TRMM".parse::<ObsType>() {
            Err(PrecipError::InvalidConfiguration(msg)) => assert!(msg.contains("TRMM")),
            other => panic!("Expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_datetime() {
        let filled = insert_datetime("gpm_%Y%m%d_%H%M.nc", dt(2024, 2, 9, 6, 30, 0));
        assert_eq!(filled, "gpm_20240209_0630.nc");
    }

    #[test]
    fn test_path_pattern() {
        let day = NaiveDate::from_ymd_opt(2023, 7, 4).unwrap();
        assert_eq!(
            ObsType::GpmNrtLate.path_pattern(day),
            vec!["NRTlate", "V???", "2023", "gpm_imerg_NRTlate_V???_20230704.nc"]
        );
    }

    #[test]
    fn test_matches_wildcard() {
        assert!(matches_wildcard("V???", "V07B"));
        assert!(!matches_wildcard("V???", "V07"));
        assert!(matches_wildcard("gpm_V???_2024.nc", "gpm_V06B_2024.nc"));
        assert!(matches_wildcard("*.nc", "anything.nc"));
        assert!(!matches_wildcard("*.nc", "anything.pp"));
    }

    #[test]
    fn test_resolve_daily_file_picks_latest_version() {
        let dir = tempdir().expect("Failed to create temp dir");
        let year_dir = dir.path().join("production").join("2024");
        fs::create_dir_all(&year_dir).unwrap();
        fs::write(year_dir.join("gpm_imerg_production_V06B_20240101.nc"), b"").unwrap();
        fs::write(year_dir.join("gpm_imerg_production_V07A_20240101.nc"), b"").unwrap();
        fs::write(year_dir.join("gpm_imerg_production_V07A_20240102.nc"), b"").unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let found = resolve_daily_file(dir.path(), ObsType::Gpm, day).unwrap();
        assert_eq!(
            found.file_name().unwrap(),
            "gpm_imerg_production_V07A_20240101.nc"
        );

        let missing = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert!(resolve_daily_file(dir.path(), ObsType::Gpm, missing).is_none());
    }

    #[test]
    fn test_resolve_nrt_late_with_versioned_directory() {
        let dir = tempdir().expect("Failed to create temp dir");
        let year_dir = dir.path().join("NRTlate").join("V07B").join("2024");
        fs::create_dir_all(&year_dir).unwrap();
        fs::write(year_dir.join("gpm_imerg_NRTlate_V07B_20240315.nc"), b"").unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let found = resolve_daily_file(dir.path(), ObsType::GpmNrtLate, day).unwrap();
        assert!(found.ends_with("NRTlate/V07B/2024/gpm_imerg_NRTlate_V07B_20240315.nc"));
        assert!(resolve_daily_file(dir.path(), ObsType::Gpm, day).is_none());
    }
}
