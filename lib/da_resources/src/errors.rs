//! Resources errors definitions.

use crate::chunk::ChunkType;
use thiserror::Error;

/// An alias for result that can be a [`ResourcesError`].
pub type ResourcesResult<T> = Result<T, ResourcesError>;

/// The resources error type.
///
/// Most variants are recoverable: the binary XML decoder and the manifest
/// builder hand them back next to what they managed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourcesError {
    /// Low level parser failure, with the number of bytes that were left.
    #[error("parsing error ({1:?}) with {0} bytes left")]
    Parsing(usize, nom::error::ErrorKind),

    #[error("{chunk} chunk declares {declared} bytes but only {available} remain")]
    ChunkOverflow {
        chunk: ChunkType,
        declared: usize,
        available: usize,
    },

    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("string #{0} is out of the string pool")]
    StringIndex(u32),

    #[error("unknown value type {0:#04x}")]
    UnknownValueType(u8),

    /// Any decoding failure inside a binary XML document, with the offset
    /// of the faulty chunk.
    #[error("malformed binary xml at offset {offset:#x}: {reason}")]
    MalformedBinaryXml { offset: usize, reason: String },

    #[error("malformed resource table: {0}")]
    MalformedResourceTable(String),

    /// No entry exists for the resource id under any configuration.
    #[error("resource {0:#010x} not found")]
    ResourceNotFound(u32),

    #[error("reference chain starting at {0:#010x} is too deep")]
    ReferenceLoop(u32),

    /// An attribute references a resource that could not be resolved.
    #[error("unresolved reference @{id:#010x} in <{element}> attribute {attribute}")]
    UnresolvedReference {
        element: String,
        attribute: String,
        id: u32,
    },

    #[error("<{element}> has no {attribute} attribute")]
    MissingAttribute { element: String, attribute: String },

    #[error("manifest root element is <{0}>")]
    UnexpectedRoot(String),

    #[error("invalid locale qualifier '{0}'")]
    InvalidLocale(String),
}

impl nom::error::ParseError<&[u8]> for ResourcesError {
    fn from_error_kind(input: &[u8], kind: nom::error::ErrorKind) -> Self {
        Self::Parsing(input.len(), kind)
    }

    fn append(_: &[u8], _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}
