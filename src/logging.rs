//! Tracing subscriber setup shared by both binaries

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Highest accepted `--verbose` value
pub const MAX_VERBOSITY: u8 = 50;

/// Map the numeric `--verbose` flag onto a log level
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1..=10 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber; `RUST_LOG` takes precedence over `verbose`
///
/// Calling this twice is harmless: the second subscriber is simply not installed.
pub fn init_logging(verbose: u8) {
    let level = level_for_verbosity(verbose);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for_verbosity(0), Level::INFO);
        assert_eq!(level_for_verbosity(1), Level::DEBUG);
        assert_eq!(level_for_verbosity(10), Level::DEBUG);
        assert_eq!(level_for_verbosity(11), Level::TRACE);
        assert_eq!(level_for_verbosity(MAX_VERBOSITY), Level::TRACE);
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logging(0);
        init_logging(20);
    }
}
