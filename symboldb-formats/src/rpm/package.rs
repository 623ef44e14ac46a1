//! Package-level records assembled from the RPM main header.

use serde::{Deserialize, Serialize};
use symboldb_core::checksum::{Checksum, HashKind};
use symboldb_core::errors::RpmError;

use super::header::Header;
use super::tags::*;

/// Whether the package carries binaries or sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageKind {
    Binary,
    Source,
}

impl PackageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PackageKind::Binary => "binary",
            PackageKind::Source => "source",
        }
    }
}

/// Information about an entire RPM package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub source_rpm: Option<String>,
    /// SHA-1 of the immutable header region, 40 hexadecimal characters.
    /// This is the stable package identity used for deduplication.
    pub hash: String,
    pub build_host: String,
    pub summary: String,
    pub description: String,
    pub license: String,
    pub group: String,
    pub build_time: i64,
    pub epoch: Option<u32>,
    pub kind: PackageKind,
    /// True if any header string had to be re-encoded from Latin-1.
    pub normalized: bool,
}

impl PackageInfo {
    /// `name-[epoch:]version-release.arch`, the conventional display form.
    pub fn nevra(&self) -> String {
        match self.epoch {
            Some(epoch) => format!(
                "{}-{}:{}-{}.{}",
                self.name, epoch, self.version, self.release, self.arch
            ),
            None => format!("{}-{}-{}.{}", self.name, self.version, self.release, self.arch),
        }
    }
}

/// Information about one file, from the RPM header (not the cpio payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub user: String,
    pub group: String,
    pub mode: u32,
    pub mtime: u32,
    pub ino: u32,
    pub device: u32,
    pub flags: u32,
    pub link_to: String,
    pub digest: Option<Checksum>,
    /// True if the name had to be re-encoded from Latin-1.
    pub normalized: bool,
}

impl FileInfo {
    pub fn is_directory(&self) -> bool {
        self.mode & 0o170000 == 0o040000
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & 0o170000 == 0o120000
    }

    /// Ghost files are declared in the header but absent from the payload.
    pub fn is_ghost(&self) -> bool {
        self.flags & RPMFILE_GHOST != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    Require,
    Provide,
    Obsolete,
    Conflict,
}

impl DependencyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::Require => "R",
            DependencyKind::Provide => "P",
            DependencyKind::Obsolete => "O",
            DependencyKind::Conflict => "C",
        }
    }
}

/// A package dependency relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub kind: DependencyKind,
    pub name: String,
    pub flags: u32,
    pub version: String,
}

impl Dependency {
    /// The comparison operator encoded in the RPMSENSE flags, if any.
    pub fn operator(&self) -> Option<&'static str> {
        let cmp = self.flags & (RPMSENSE_LESS | RPMSENSE_GREATER | RPMSENSE_EQUAL);
        match (
            cmp & RPMSENSE_LESS != 0,
            cmp & RPMSENSE_GREATER != 0,
            cmp & RPMSENSE_EQUAL != 0,
        ) {
            (false, false, false) => None,
            (true, false, false) => Some("<"),
            (true, false, true) => Some("<="),
            (false, true, false) => Some(">"),
            (false, true, true) => Some(">="),
            (false, false, true) => Some("="),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptKind {
    Pretrans,
    Prein,
    Postin,
    Preun,
    Postun,
    Posttrans,
}

impl ScriptKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptKind::Pretrans => "pretrans",
            ScriptKind::Prein => "prein",
            ScriptKind::Postin => "postin",
            ScriptKind::Preun => "preun",
            ScriptKind::Postun => "postun",
            ScriptKind::Posttrans => "posttrans",
        }
    }
}

/// A non-trigger maintainer script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub kind: ScriptKind,
    pub script: Option<String>,
    pub program: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCondition {
    pub name: String,
    pub version: String,
    pub flags: u32,
}

/// A trigger script with its activation conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub script: String,
    pub program: String,
    pub conditions: Vec<TriggerCondition>,
}

/// Assemble the package record from the main header. The header hash comes
/// from the signature section and is passed in by the parser.
pub fn package_info(header: &Header, hash: String) -> Result<PackageInfo, RpmError> {
    let mut normalized = false;
    let mut get = |tag, name| -> Result<String, RpmError> {
        match header.string(tag)? {
            Some((value, renc)) => {
                normalized |= renc;
                Ok(value)
            }
            None => Err(RpmError::MissingTag { name }),
        }
    };
    let name = get(RPMTAG_NAME, "NAME")?;
    let version = get(RPMTAG_VERSION, "VERSION")?;
    let release = get(RPMTAG_RELEASE, "RELEASE")?;
    let arch = get(RPMTAG_ARCH, "ARCH")?;
    let build_host = get(RPMTAG_BUILDHOST, "BUILDHOST")?;
    let summary = get(RPMTAG_SUMMARY, "SUMMARY")?;
    let description = get(RPMTAG_DESCRIPTION, "DESCRIPTION")?;
    let license = get(RPMTAG_LICENSE, "LICENSE")?;
    let group = get(RPMTAG_GROUP, "GROUP")?;
    let source_rpm = header.string(RPMTAG_SOURCERPM)?.map(|(v, _)| v);
    let kind = if source_rpm.is_some() {
        PackageKind::Binary
    } else {
        PackageKind::Source
    };
    Ok(PackageInfo {
        name,
        version,
        release,
        arch,
        source_rpm,
        hash,
        build_host,
        summary,
        description,
        license,
        group,
        build_time: header.u32(RPMTAG_BUILDTIME)?.unwrap_or(0) as i64,
        epoch: header.u32(RPMTAG_EPOCH)?,
        kind,
        normalized,
    })
}

/// Assemble the per-file records from the dirnames/dirindexes/basenames
/// triple and the parallel attribute arrays.
pub fn file_infos(header: &Header) -> Result<Vec<FileInfo>, RpmError> {
    let basenames = header.string_array_flagged(RPMTAG_BASENAMES)?;
    if basenames.is_empty() {
        return Ok(Vec::new());
    }
    let dirnames = header.string_array_flagged(RPMTAG_DIRNAMES)?;
    let dirindexes = header.u32_array(RPMTAG_DIRINDEXES)?.unwrap_or_default();
    let modes = header.u16_array(RPMTAG_FILEMODES)?.unwrap_or_default();
    let mtimes = header.u32_array(RPMTAG_FILEMTIMES)?.unwrap_or_default();
    let inodes = header.u32_array(RPMTAG_FILEINODES)?.unwrap_or_default();
    let devices = header.u32_array(RPMTAG_FILEDEVICES)?.unwrap_or_default();
    let flags = header.u32_array(RPMTAG_FILEFLAGS)?.unwrap_or_default();
    let users = header.string_array(RPMTAG_FILEUSERNAME)?;
    let groups = header.string_array(RPMTAG_FILEGROUPNAME)?;
    let digests = header.string_array(RPMTAG_FILEDIGESTS)?;
    let links = header.string_array(RPMTAG_FILELINKTOS)?;

    let n = basenames.len();
    if dirindexes.len() != n
        || modes.len() != n
        || mtimes.len() != n
        || users.len() != n
        || groups.len() != n
    {
        return Err(RpmError::InconsistentFileTable);
    }

    let digest_kind = match header.u32(RPMTAG_FILEDIGESTALGO)? {
        Some(PGPHASHALGO_SHA256) => Some(HashKind::Sha256),
        Some(PGPHASHALGO_SHA1) => Some(HashKind::Sha1),
        // MD5 (the historical default) and anything exotic: keep the files,
        // drop the unverifiable digests.
        _ => None,
    };

    let mut result = Vec::with_capacity(n);
    for i in 0..n {
        let (dir, dir_renc) = dirindexes
            .get(i)
            .and_then(|&idx| dirnames.get(idx as usize))
            .ok_or(RpmError::InconsistentFileTable)?;
        let (base, base_renc) = &basenames[i];
        let name = format!("{dir}{base}");
        let normalized = *dir_renc || *base_renc;
        let digest = match (digest_kind, digests.get(i)) {
            (Some(kind), Some(hex_digest)) if !hex_digest.is_empty() => {
                Some(Checksum::from_hex(kind.name(), None, hex_digest).map_err(|e| {
                    RpmError::MalformedEntry {
                        tag: RPMTAG_FILEDIGESTS,
                        message: e.to_string(),
                    }
                })?)
            }
            _ => None,
        };
        result.push(FileInfo {
            name,
            user: users[i].clone(),
            group: groups[i].clone(),
            mode: modes[i] as u32,
            mtime: mtimes[i],
            ino: inodes.get(i).copied().unwrap_or(0),
            device: devices.get(i).copied().unwrap_or(0),
            flags: flags.get(i).copied().unwrap_or(0),
            link_to: links.get(i).cloned().unwrap_or_default(),
            digest,
            normalized,
        });
    }
    Ok(result)
}

/// All dependency relations carried by the header.
pub fn dependencies(header: &Header) -> Result<Vec<Dependency>, RpmError> {
    let mut result = Vec::new();
    for (kind, name_tag, flags_tag, version_tag) in [
        (
            DependencyKind::Require,
            RPMTAG_REQUIRENAME,
            RPMTAG_REQUIREFLAGS,
            RPMTAG_REQUIREVERSION,
        ),
        (
            DependencyKind::Provide,
            RPMTAG_PROVIDENAME,
            RPMTAG_PROVIDEFLAGS,
            RPMTAG_PROVIDEVERSION,
        ),
        (
            DependencyKind::Obsolete,
            RPMTAG_OBSOLETENAME,
            RPMTAG_OBSOLETEFLAGS,
            RPMTAG_OBSOLETEVERSION,
        ),
        (
            DependencyKind::Conflict,
            RPMTAG_CONFLICTNAME,
            RPMTAG_CONFLICTFLAGS,
            RPMTAG_CONFLICTVERSION,
        ),
    ] {
        let names = header.string_array(name_tag)?;
        if names.is_empty() {
            continue;
        }
        let flags = header.u32_array(flags_tag)?.unwrap_or_default();
        let versions = header.string_array(version_tag)?;
        for (i, name) in names.into_iter().enumerate() {
            result.push(Dependency {
                kind,
                name,
                flags: flags.get(i).copied().unwrap_or(0),
                version: versions.get(i).cloned().unwrap_or_default(),
            });
        }
    }
    Ok(result)
}

/// The non-trigger maintainer scripts present in the header.
pub fn scripts(header: &Header) -> Result<Vec<Script>, RpmError> {
    let mut result = Vec::new();
    for (kind, script_tag, prog_tag) in [
        (ScriptKind::Pretrans, RPMTAG_PRETRANS, RPMTAG_PRETRANSPROG),
        (ScriptKind::Prein, RPMTAG_PREIN, RPMTAG_PREINPROG),
        (ScriptKind::Postin, RPMTAG_POSTIN, RPMTAG_POSTINPROG),
        (ScriptKind::Preun, RPMTAG_PREUN, RPMTAG_PREUNPROG),
        (ScriptKind::Postun, RPMTAG_POSTUN, RPMTAG_POSTUNPROG),
        (ScriptKind::Posttrans, RPMTAG_POSTTRANS, RPMTAG_POSTTRANSPROG),
    ] {
        let script = header.string(script_tag)?.map(|(v, _)| v);
        let program = header.string(prog_tag)?.map(|(v, _)| v);
        if script.is_some() || program.is_some() {
            result.push(Script {
                kind,
                script,
                program,
            });
        }
    }
    Ok(result)
}

/// Trigger scripts. Conditions are distributed to their trigger via the
/// TRIGGERINDEX table.
pub fn triggers(header: &Header) -> Result<Vec<Trigger>, RpmError> {
    let scripts = header.string_array(RPMTAG_TRIGGERSCRIPTS)?;
    if scripts.is_empty() {
        return Ok(Vec::new());
    }
    let programs = header.string_array(RPMTAG_TRIGGERSCRIPTPROG)?;
    let names = header.string_array(RPMTAG_TRIGGERNAME)?;
    let versions = header.string_array(RPMTAG_TRIGGERVERSION)?;
    let flags = header.u32_array(RPMTAG_TRIGGERFLAGS)?.unwrap_or_default();
    let indexes = header.u32_array(RPMTAG_TRIGGERINDEX)?.unwrap_or_default();

    let mut result: Vec<Trigger> = scripts
        .into_iter()
        .enumerate()
        .map(|(i, script)| Trigger {
            script,
            program: programs.get(i).cloned().unwrap_or_default(),
            conditions: Vec::new(),
        })
        .collect();
    for (i, name) in names.into_iter().enumerate() {
        let Some(&target) = indexes.get(i) else {
            continue;
        };
        if let Some(trigger) = result.get_mut(target as usize) {
            trigger.conditions.push(TriggerCondition {
                name,
                version: versions.get(i).cloned().unwrap_or_default(),
                flags: flags.get(i).copied().unwrap_or(0),
            });
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_operator() {
        let dep = |flags| Dependency {
            kind: DependencyKind::Require,
            name: "x".into(),
            flags,
            version: "1".into(),
        };
        assert_eq!(dep(0).operator(), None);
        assert_eq!(dep(RPMSENSE_EQUAL).operator(), Some("="));
        assert_eq!(dep(RPMSENSE_LESS | RPMSENSE_EQUAL).operator(), Some("<="));
        assert_eq!(dep(RPMSENSE_GREATER).operator(), Some(">"));
    }

    #[test]
    fn file_kind_from_mode() {
        let file = |mode| FileInfo {
            name: "/x".into(),
            user: "root".into(),
            group: "root".into(),
            mode,
            mtime: 0,
            ino: 1,
            device: 1,
            flags: 0,
            link_to: String::new(),
            digest: None,
            normalized: false,
        };
        assert!(file(0o040755).is_directory());
        assert!(file(0o120777).is_symlink());
        assert!(!file(0o100644).is_directory());
        assert!(!file(0o100644).is_symlink());
    }

    #[test]
    fn nevra_with_and_without_epoch() {
        let mut info = PackageInfo {
            name: "bash".into(),
            version: "5.2".into(),
            release: "1.fc40".into(),
            arch: "x86_64".into(),
            source_rpm: Some("bash-5.2-1.fc40.src.rpm".into()),
            hash: String::new(),
            build_host: String::new(),
            summary: String::new(),
            description: String::new(),
            license: String::new(),
            group: String::new(),
            build_time: 0,
            epoch: None,
            kind: PackageKind::Binary,
            normalized: false,
        };
        assert_eq!(info.nevra(), "bash-5.2-1.fc40.x86_64");
        info.epoch = Some(1);
        assert_eq!(info.nevra(), "bash-1:5.2-1.fc40.x86_64");
    }
}
