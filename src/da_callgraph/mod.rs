use crate::prelude::*;
use clap::ArgMatches;
use da_analysis::xref;
use regex::Regex;

pub fn run(args: &ArgMatches) -> DaResult<()> {
    init_logger(args);

    let bytes = read_input(args)?;
    let mut package = Package::open(&bytes)?;
    let facts = match package.manifest_facts(&Config::default()) {
        Some(result) => result?.0,
        None => return Err(PackageError::EntryNotFound("AndroidManifest.xml".to_string()).into()),
    };

    let mut repo = Repo::new();
    for (name, dex) in package.take_dexs() {
        for err in repo.register_dex(&name, dex) {
            log::warn!("{err}");
        }
    }

    let (entry_points, errors) = xref::entry_points(&facts, &repo);
    for err in errors {
        log::warn!("{err}");
    }
    let reachable = ReachabilitySet::compute(&repo, &entry_points);
    let cg = CallGraph::build(&repo, &entry_points, &reachable);

    let class_pattern = args
        .get_one::<String>("filter-class")
        .map(|r| Regex::new(r))
        .transpose()?;
    let method_pattern = args
        .get_one::<String>("filter-method")
        .map(|r| Regex::new(r))
        .transpose()?;
    let cg = if class_pattern.is_none() && method_pattern.is_none() {
        cg
    } else {
        log::debug!(
            "filtering callgraph on class pattern {:?}, method pattern {:?}",
            class_pattern,
            method_pattern
        );
        cg.filter(|meth| {
            class_pattern
                .as_ref()
                .map_or(true, |p| p.is_match(&meth.reference().owner))
                && method_pattern
                    .as_ref()
                    .map_or(true, |p| p.is_match(&meth.reference().name))
        })
    };

    log::info!(
        "callgraph contains {} methods and {} calls from {} entry points",
        cg.nb_methods(),
        cg.nb_calls(),
        entry_points.len()
    );
    write_output(args, &cg.to_dot())
}
