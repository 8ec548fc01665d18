//! Builds precipitation analyses from lead-0 and lead-N forecast totals.

use clap::Parser;
use precip_accum::cli::AnalysisArgs;
use precip_accum::logging::init_logging;
use precip_accum::{analysis, NetCdfStore, Result};
use std::process::ExitCode;
use tracing::{error, info};

fn run(args: AnalysisArgs) -> Result<()> {
    let config = args.into_config()?;
    info!(
        datetime = %config.datetime,
        datadir = %config.datadir.display(),
        outdir = %config.outdir.display(),
        "Starting forecast analysis"
    );
    let written = analysis::run(&config, &NetCdfStore::new())?;
    for path in &written {
        info!(path = %path.display(), "Saved");
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = AnalysisArgs::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
