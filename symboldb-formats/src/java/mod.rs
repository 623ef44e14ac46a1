//! Java artifact parsing: class files and Maven POM metadata.

pub mod class_file;
pub mod maven;

pub use class_file::ClassFile;
pub use maven::{MavenUrl, MavenUrlKind};
