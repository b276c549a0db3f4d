//! # `DroidAudit`
//!
//! `droidaudit` is the main crate of the `DroidAudit` Android application
//! security analysis project. The project is subdivided into multiple
//! crates, `droidaudit` acts as entry point by reexporting important structs
//! and functions from those sub-crates. Most of the reexport are done within
//! the `droidaudit::prelude` namespace.
//!
//! ## Library basics
//!
//! The whole analysis runs over the bytes of an application package and
//! produces a report:
//!
//! ```no_run
//! use droidaudit::prelude::*;
//!
//! let bytes = std::fs::read("app.apk")?;
//! let report = analyze(&bytes, &AnalysisOptions::new())?;
//! for finding in report.findings() {
//!     println!("{finding}");
//! }
//! # Ok::<(), DaError>(())
//! ```
//!
//! Only an unreadable archive or bytecode image aborts an analysis. Other
//! problems end up as [warnings](analysis::report::Warning) of the report.
//!
//! ## Sub-crates
//!
//!  - [`da_package`] reads the archive and decodes its assets in parallel,
//!  - [`da_resources`] decodes binary XML documents, resource tables and
//!    builds the manifest facts,
//!  - [`da_dex`] loads the classes of bytecode images,
//!  - [`da_analysis`] links components to classes, computes reachability,
//!    runs the rules and assembles the report,
//!  - [`da_utils`] contains the small helpers all the other crates share.

mod errors;

pub mod cli;
pub mod da_analyze;
pub mod da_aresources;
pub mod da_callgraph;
pub mod da_classes;
pub mod da_manifest;

pub use da_analysis as analysis;
pub use da_dex as dex;
pub use da_package as package;
pub use da_resources as resources;
pub use da_utils as utils;

/// Reexport module of commonly used structures and functions from
/// `DroidAudit` project sub-crates:
///
/// ```rust
/// use droidaudit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{DaError, DaResult};

    pub use da_analysis::{
        analyze, callgraph::CallGraph, engine::Options as AnalysisOptions, repo::Repo,
        xref::ReachabilitySet, AnalysisReport, EngineError, Status,
    };

    pub use da_dex::{DexImage, MethodRef};

    pub use da_package::{errors::PackageError, Limits, Options as PackageOptions, Package};

    pub use da_resources::{errors::ResourcesError, Config, ManifestFacts, ResourceTable};

    pub use da_utils::CancelToken;

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("DA_LOG", "info")
            .write_style("DA_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }

    /// Reads the file given with `--input`.
    pub fn read_input(args: &ArgMatches) -> DaResult<Vec<u8>> {
        let filename = args
            .get_one::<String>("input")
            .ok_or_else(|| DaError::BadArguments("--input needed".to_string()))?;
        log::debug!("reading {:?}", filename);
        Ok(std::fs::read(filename)?)
    }

    /// Writes `content` to the file given with `--output`, or to the
    /// standard output.
    pub fn write_output(args: &ArgMatches, content: &str) -> DaResult<()> {
        match args.get_one::<String>("output") {
            Some(filename) => {
                std::fs::write(filename, content)?;
                log::info!("output written in {:?}", filename);
            }
            None => println!("{content}"),
        }
        Ok(())
    }
}
