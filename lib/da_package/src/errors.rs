//! Package errors definitions.

use da_dex::errors::DexError;
use da_resources::errors::ResourcesError;
use thiserror::Error;

/// An alias for result that can be a [`PackageError`].
pub type PackageResult<T> = Result<T, PackageError>;

/// The package error type.
#[derive(Debug, Error)]
pub enum PackageError {
    /// The archive cannot be read, or one of its entries does not inflate
    /// to its declared size.
    #[error("corrupted container: {0}")]
    ContainerCorrupt(String),

    /// Reading the archive would exceed one of the configured
    /// [limits](crate::Limits).
    #[error("container too large: {0}")]
    ContainerTooLarge(String),

    #[error("no entry named {0:?} in container")]
    EntryNotFound(String),

    #[error(transparent)]
    Dex(#[from] DexError),

    #[error(transparent)]
    Resources(#[from] ResourcesError),
}
