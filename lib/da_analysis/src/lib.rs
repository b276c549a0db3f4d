//! This crate relates the decoded assets of an Android application: it
//! links manifest components to their classes, computes what exported
//! components can reach, runs the vulnerability rules and assembles the
//! analysis report.
//!
//! [`engine::analyze`] runs the whole pipeline over archive bytes.

pub mod callgraph;
pub mod engine;
pub mod errors;
pub mod report;
pub mod repo;
pub mod rules;
pub mod xref;

pub use crate::engine::{analyze, Options};
pub use crate::errors::{AnalysisError, AnalysisResult, EngineError};
pub use crate::report::{AnalysisReport, Status, Warning, WarningKind};
