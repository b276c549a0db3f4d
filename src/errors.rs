//! Global error handling.
//!
//! Each sub-crate of the project defines its own type error.
//! Their types can be unified, for example in a main function,
//! when winding results at the top-level.
//!
//! ```no_run
//! use droidaudit::prelude::*;
//!
//! fn main() -> DaResult<()> { // can return a DaError
//!    let bytes = std::fs::read("app.apk")?; // can return an io::Error
//!    let _package = Package::open(&bytes)?; // can return a PackageError
//!    Ok(())
//! }
//! ```

use da_analysis::errors::{AnalysisError, EngineError};
use da_dex::errors::DexError;
use da_package::errors::PackageError;
use da_resources::errors::ResourcesError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`DaError`].
pub type DaResult<T> = Result<T, DaError>;

/// The main error type for error winding at the top-level.
/// It mainly consists of transparent wrapper over error types that
/// are defined in dependencies.
#[derive(Debug, Error)]
pub enum DaError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned when writing JSON output.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Fatal error of a whole analysis.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Error that can be returned from [`da_analysis`] functions.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Error that can be returned from [`da_package`] functions.
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Error that can be returned from [`da_dex`] functions.
    #[error(transparent)]
    Dex(#[from] DexError),

    /// Error that can be returned from [`da_resources`] functions.
    #[error(transparent)]
    Resources(#[from] ResourcesError),
}
