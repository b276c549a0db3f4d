//! Small helpers shared by every `DroidAudit` sub-crate.

pub mod cancel;
pub mod entropy;
pub mod leb;

pub use cancel::CancelToken;
