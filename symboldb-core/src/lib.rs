//! Core building blocks shared by every symboldb crate: typed row
//! identifiers, checksums, error enums, configuration, and tracing setup.

pub mod checksum;
pub mod config;
pub mod errors;
pub mod tracing;
pub mod types;
