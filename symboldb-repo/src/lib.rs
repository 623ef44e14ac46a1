//! Repository synchronization and the package load pipeline.
//!
//! Ties the format parsers to the storage layer: downloading repository
//! metadata, caching RPMs by digest, and indexing package contents.

pub mod cache;
pub mod download;
pub mod load;
pub mod source_packages;
pub mod sync;
