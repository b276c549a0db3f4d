//! Main `DroidAudit` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Set)
        .required(true)
        .help("Input apk file")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_locale() -> Arg {
    Arg::new("locale")
        .short('l')
        .long("locale")
        .action(ArgAction::Set)
        .help("Locale used to resolve resources (e.g. fr or fr-rFR)")
}

fn arg_pretty() -> Arg {
    Arg::new("pretty")
        .short('p')
        .long("pretty")
        .action(ArgAction::SetTrue)
        .help("Pretty print JSON output")
}

fn common(cmd: Command) -> Command {
    cmd.version(VERSION)
        .author(AUTHORS)
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
}

#[must_use]
pub fn droidaudit() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(analyze())
        .subcommand(aresources())
        .subcommand(callgraph())
        .subcommand(classes())
        .subcommand(manifest())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn analyze() -> Command {
    common(
        Command::new("analyze")
            .bin_name("da-analyze")
            .about("Runs the security analysis and prints the report as JSON"),
    )
    .arg(arg_output("Output JSON file"))
    .arg(arg_pretty())
    .arg(arg_locale())
    .arg(
        Arg::new("timeout")
            .short('t')
            .long("timeout")
            .action(ArgAction::Set)
            .value_parser(value_parser!(u64))
            .help("Stops the analysis after the given number of seconds"),
    )
}

#[must_use]
pub fn aresources() -> Command {
    common(
        Command::new("aresources")
            .bin_name("da-aresources")
            .about("Prints apk resources in aapt form"),
    )
}

#[must_use]
pub fn callgraph() -> Command {
    common(
        Command::new("callgraph")
            .bin_name("da-callgraph")
            .about("Generates the callgraph reachable from exported components"),
    )
    .arg(arg_output("Output dot file"))
    .arg(
        Arg::new("filter-class")
            .long("filter-class")
            .action(ArgAction::Set)
            .help("Class(es) regex filter"),
    )
    .arg(
        Arg::new("filter-method")
            .long("filter-method")
            .action(ArgAction::Set)
            .help("Method(s) regex filter"),
    )
}

#[must_use]
pub fn classes() -> Command {
    common(
        Command::new("classes")
            .bin_name("da-classes")
            .about("Prints the classes defined by the apk bytecode"),
    )
    .arg(
        Arg::new("count")
            .short('c')
            .long("count")
            .action(ArgAction::SetTrue)
            .help("Print only classes count"),
    )
    .arg(
        Arg::new("external")
            .short('x')
            .long("external")
            .action(ArgAction::SetTrue)
            .help("Print referenced classes that the apk does not define"),
    )
}

#[must_use]
pub fn manifest() -> Command {
    common(
        Command::new("manifest")
            .bin_name("da-manifest")
            .about("Prints apk manifest facts as JSON"),
    )
    .arg(arg_pretty())
    .arg(arg_locale())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_valid() {
        droidaudit().debug_assert();
    }

    #[test]
    fn analyze_arguments() {
        let args = analyze()
            .try_get_matches_from(["da-analyze", "-i", "app.apk", "--timeout", "30", "--pretty"])
            .unwrap();
        assert_eq!(args.get_one::<String>("input").unwrap(), "app.apk");
        assert_eq!(args.get_one::<u64>("timeout"), Some(&30));
        assert!(args.get_flag("pretty"));
        assert!(analyze().try_get_matches_from(["da-analyze"]).is_err());
    }
}
