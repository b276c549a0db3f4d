//! Android Dex bytecode images.
//!
//! [`DexImage::parse`] loads the classes of an image, along with the
//! strings, types and methods each method body references.

mod code;
mod loader;
mod mutf8;

pub mod errors;
pub mod flags;
pub mod model;
pub mod types;

#[cfg(any(test, feature = "builder"))]
pub mod builder;

pub use crate::errors::{DexError, DexResult};
pub use crate::flags::AccessFlags;
pub use crate::loader::DexImage;
pub use crate::model::{ClassDef, FieldDef, MethodDef, MethodRef};
pub use crate::types::Type;
