//! Dex errors definitions.

use thiserror::Error;

/// An alias for result that can be a [`DexError`].
pub type DexResult<T> = Result<T, DexError>;

/// The Dex error type.
///
/// [`DexError::MalformedImage`] is the only variant returned by the loader
/// itself; the others describe problems recorded as image warnings.
#[derive(Debug, Error)]
pub enum DexError {
    #[error("parsing error ({1:?}) with {0} bytes left")]
    Parsing(usize, nom::error::ErrorKind),

    /// The header or one of the id tables cannot be read: nothing can be
    /// loaded from the image.
    #[error("malformed bytecode image: {0}")]
    MalformedImage(String),

    #[error("invalid MUTF-8: {0}")]
    InvalidMutf8(String),

    #[error("{table} index {index} is out of bounds")]
    IndexOutOfBounds { table: &'static str, index: u32 },

    #[error("dex {0} has invalid offset")]
    InvalidOffset(String),

    #[error("invalid type descriptor '{0}'")]
    InvalidDescriptor(String),

    #[error("truncated instruction at {addr:#x}")]
    TruncatedInstruction { addr: usize },

    #[error("skipping class {class}: {reason}")]
    MalformedClass { class: String, reason: String },

    #[error("skipping method {method}: {reason}")]
    MalformedMethod { method: String, reason: String },

    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch { expected: String, computed: String },
}

impl nom::error::ParseError<&[u8]> for DexError {
    fn from_error_kind(input: &[u8], kind: nom::error::ErrorKind) -> Self {
        Self::Parsing(input.len(), kind)
    }

    fn append(_: &[u8], _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}
