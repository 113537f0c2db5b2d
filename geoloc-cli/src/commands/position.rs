//! `geoloc position`: fetch one location.

use std::path::PathBuf;

use geoloc::config::ConfigFile;
use tracing::info;

use super::common::{print_sample, runtime, LocationArgs, Session};
use crate::error::CliError;

pub fn run(
    args: &LocationArgs,
    scenario: Option<&PathBuf>,
    config: &ConfigFile,
) -> Result<(), CliError> {
    let options = args.resolve(config);
    let session = Session::open(scenario)?;

    info!(
        timeout_ms = options.timeout.as_millis() as u64,
        fallback = options.enable_fallback_to_native,
        "Requesting current position"
    );

    let sample = runtime()?.block_on(session.controller.get_current_position(&options))?;
    print_sample(&sample);
    Ok(())
}
