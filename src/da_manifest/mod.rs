use crate::prelude::*;
use clap::ArgMatches;

pub fn run(args: &ArgMatches) -> DaResult<()> {
    init_logger(args);

    let bytes = read_input(args)?;
    let config = match args.get_one::<String>("locale") {
        Some(locale) => Config::from_locale(locale)?,
        None => Config::default(),
    };
    let package = PackageOptions::manifest_only().open(&bytes)?;
    let (facts, warnings) = package
        .manifest_facts(&config)
        .ok_or_else(|| PackageError::EntryNotFound("AndroidManifest.xml".to_string()))??;
    for warning in &warnings {
        log::warn!("{warning}");
    }

    let json = if args.get_flag("pretty") {
        serde_json::to_string_pretty(&facts)?
    } else {
        serde_json::to_string(&facts)?
    };
    println!("{json}");

    Ok(())
}
