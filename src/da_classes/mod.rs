use crate::prelude::*;
use clap::ArgMatches;

pub fn run(args: &ArgMatches) -> DaResult<()> {
    init_logger(args);

    let bytes = read_input(args)?;
    let mut package = PackageOptions::dex_only().open(&bytes)?;
    let mut repo = Repo::new();
    for (name, dex) in package.take_dexs() {
        for warning in dex.warnings() {
            log::warn!("{name}: {warning}");
        }
        for err in repo.register_dex(&name, dex) {
            log::warn!("{err}");
        }
    }

    let names: Vec<&str> = if args.get_flag("external") {
        repo.iter_missing_classes().collect()
    } else {
        repo.iter_classes().map(|c| c.name.as_str()).collect()
    };

    if args.get_flag("count") {
        println!("{}", names.len());
    } else {
        for name in names {
            println!("{name}");
        }
    }

    Ok(())
}
