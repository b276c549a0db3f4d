use clap::ArgMatches;
use clap_complete::{generate, Shell};
use droidaudit::prelude::*;
use droidaudit::{cli, da_analyze, da_aresources, da_callgraph, da_classes, da_manifest};
use std::io;

fn main() -> DaResult<()> {
    let args = cli::droidaudit().get_matches();

    match &args.subcommand() {
        Some(("analyze", cmd_args)) => da_analyze::run(cmd_args),
        Some(("aresources", cmd_args)) => da_aresources::run(cmd_args),
        Some(("callgraph", cmd_args)) => da_callgraph::run(cmd_args),
        Some(("classes", cmd_args)) => da_classes::run(cmd_args),
        Some(("manifest", cmd_args)) => da_manifest::run(cmd_args),
        Some(("gen-completions", sub_args)) => subcommand_gen_completions(sub_args),
        Some((subcommand, _)) => Err(DaError::BadArguments(format!(
            "unknown subcommand '{subcommand}'"
        ))),
        None => Err(DaError::BadArguments("missing subcommand".to_string())),
    }
}

fn subcommand_gen_completions(sub_args: &ArgMatches) -> DaResult<()> {
    let generator = *sub_args
        .get_one::<Shell>("shell")
        .ok_or_else(|| DaError::BadArguments("--shell needed".to_string()))?;
    let mut cmd = cli::droidaudit();
    let cmd_name = cmd.get_name().to_string();
    generate(generator, &mut cmd, cmd_name, &mut io::stdout());
    Ok(())
}
