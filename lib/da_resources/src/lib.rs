//! Decoders for the compiled resources of Android applications: binary
//! XML documents, resource tables and the application manifest.

mod chunk;
mod parsers;
mod strings;

pub mod config;
pub mod errors;
pub mod manifest;
pub mod table;
pub mod values;
#[cfg(any(test, feature = "writer"))]
pub mod writer;
pub mod xml;

pub use crate::chunk::ChunkType;
pub use crate::config::Config;
pub use crate::errors::{ResourcesError, ResourcesResult};
pub use crate::manifest::{Component, ComponentKind, ManifestFacts};
pub use crate::strings::StringPool;
pub use crate::table::{ResourceId, ResourceTable, ResourcesSummary};
pub use crate::values::Value;
pub use crate::xml::{PartialXml, XmlAttribute, XmlNode};
