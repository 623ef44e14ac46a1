//! Shared type definitions.

pub mod ids;

pub use ids::{AttributeId, ContentsId, FileId, PackageId, PackageSetId};
