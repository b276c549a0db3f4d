//! Analysis errors definition.

use da_package::errors::PackageError;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Problems met while relating the decoded facts. None of them stops an
/// analysis: they end up as report warnings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("class {class} of {image} is already defined by {first}")]
    DuplicateClass {
        class: String,
        image: String,
        first: String,
    },

    #[error("{kind} {name} has no class definition")]
    UnresolvedComponent { kind: String, name: String },

    #[error("rule {rule} failed: {reason}")]
    RuleFailure { rule: String, reason: String },
}

/// Failures that leave no report to produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("corrupted container: {0}")]
    ContainerCorrupt(String),

    #[error("container too large: {0}")]
    ContainerTooLarge(String),

    #[error("malformed bytecode image: {0}")]
    MalformedBytecodeImage(String),
}

impl From<PackageError> for EngineError {
    fn from(err: PackageError) -> Self {
        match err {
            PackageError::ContainerCorrupt(msg) => Self::ContainerCorrupt(msg),
            PackageError::ContainerTooLarge(msg) => Self::ContainerTooLarge(msg),
            PackageError::Dex(err) => Self::MalformedBytecodeImage(err.to_string()),
            other => Self::ContainerCorrupt(other.to_string()),
        }
    }
}
