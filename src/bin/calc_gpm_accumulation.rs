//! Accumulates GPM IMERG precipitation rates over fixed periods.

use clap::Parser;
use precip_accum::cli::GpmArgs;
use precip_accum::logging::init_logging;
use precip_accum::{gpm, NetCdfStore, Result};
use std::process::ExitCode;
use tracing::{error, info};

fn run(args: GpmArgs) -> Result<()> {
    let config = args.into_config()?;
    config.parallel.setup_global_pool()?;

    info!(
        datadir = %config.datadir.display(),
        outdir = %config.outdir.display(),
        start = %config.start,
        end = %config.end,
        "Starting GPM accumulation"
    );
    let written = gpm::run(&config, &NetCdfStore::new())?;
    info!(files = written.len(), "Done");
    Ok(())
}

fn main() -> ExitCode {
    let args = GpmArgs::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
