//! RPM package parsing: lead, signature and main headers, and the
//! compressed cpio payload.

pub mod evr;
pub mod header;
pub mod package;
pub mod parser;
pub mod payload;
pub mod tags;

pub use evr::{rpmvercmp, Evr};
pub use header::Header;
pub use package::{
    Dependency, DependencyKind, FileInfo, PackageInfo, PackageKind, Script, ScriptKind, Trigger,
    TriggerCondition,
};
pub use parser::{FileEntry, RpmParser};
