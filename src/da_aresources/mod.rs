use crate::prelude::*;
use clap::ArgMatches;

pub fn run(args: &ArgMatches) -> DaResult<()> {
    init_logger(args);

    let bytes = read_input(args)?;
    let package = PackageOptions::resources_only().open(&bytes)?;
    for err in package.errors() {
        log::error!("{err}");
    }
    let table = package
        .resources()
        .ok_or_else(|| PackageError::EntryNotFound("resources.arsc".to_string()))?;
    for warning in table.warnings() {
        log::warn!("{warning}");
    }
    print!("{table}");

    Ok(())
}
