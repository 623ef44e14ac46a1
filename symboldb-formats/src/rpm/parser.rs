//! Streaming RPM reader: headers up front, payload entries on demand.

use std::path::Path;

use rustc_hash::FxHashMap;
use symboldb_core::checksum::{Checksum, HashKind};
use symboldb_core::errors::RpmError;

use crate::bytes::Cursor;
use crate::cpio::CpioReader;

use super::header::Header;
use super::package::{self, Dependency, FileInfo, PackageInfo, Script, Trigger};
use super::payload;
use super::tags::{RPMSIGTAG_SHA1, RPMTAG_PAYLOADCOMPRESSOR, RPMTAG_PAYLOADFORMAT};

const LEAD_MAGIC: [u8; 4] = [0xED, 0xAB, 0xEE, 0xDB];
const LEAD_LEN: usize = 96;

/// One payload entry: the decoded contents plus the header-level info of
/// every name referring to it. Hardlinked files share one entry with
/// several infos.
#[derive(Debug)]
pub struct FileEntry {
    pub infos: Vec<FileInfo>,
    pub contents: Vec<u8>,
}

/// Parser for a complete in-memory RPM package.
#[derive(Debug)]
pub struct RpmParser {
    origin: String,
    info: PackageInfo,
    dependencies: Vec<Dependency>,
    scripts: Vec<Script>,
    triggers: Vec<Trigger>,
    files: FxHashMap<String, FileInfo>,
    // (device, inode) -> names, for regular-file groups with more than one
    // member.
    hardlinks: FxHashMap<(u32, u32), Vec<String>>,
    // Number of payload entries already consumed per hardlink group.
    hardlinks_seen: FxHashMap<(u32, u32), usize>,
    payload: Vec<u8>,
    payload_pos: usize,
}

impl RpmParser {
    pub fn open(path: &Path) -> Result<Self, RpmError> {
        let data = std::fs::read(path).map_err(|source| RpmError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&data, &path.display().to_string())
    }

    pub fn from_bytes(data: &[u8], origin: &str) -> Result<Self, RpmError> {
        let mut cur = Cursor::new(data);
        let lead = cur.take(LEAD_LEN)?;
        if lead[..4] != LEAD_MAGIC {
            return Err(RpmError::BadLeadMagic);
        }

        let signature = Header::parse(&mut cur, "signature")?;
        // The signature store is padded to an 8-byte boundary.
        cur.align(8)?;

        let header_start = cur.position();
        let header = Header::parse(&mut cur, "main")?;
        let header_region = &data[header_start..cur.position()];

        // The header SHA-1 is the package identity. Prefer the recorded
        // signature tag; recompute when the signature lacks one.
        let hash = match signature.string(RPMSIGTAG_SHA1) {
            Ok(Some((hash, _))) => hash,
            _ => Checksum::of(HashKind::Sha1, header_region).to_hex(),
        };

        let info = package::package_info(&header, hash)?;
        let dependencies = package::dependencies(&header)?;
        let scripts = package::scripts(&header)?;
        let triggers = package::triggers(&header)?;

        let mut files = FxHashMap::default();
        let mut groups: FxHashMap<(u32, u32), Vec<String>> = FxHashMap::default();
        for file in package::file_infos(&header)? {
            if !file.is_directory() && !file.is_symlink() && !file.is_ghost() {
                groups
                    .entry((file.device, file.ino))
                    .or_default()
                    .push(file.name.clone());
            }
            files.insert(file.name.clone(), file);
        }
        groups.retain(|_, names| names.len() > 1);

        let format = header.string(RPMTAG_PAYLOADFORMAT)?.map(|(v, _)| v);
        let compressor = header.string(RPMTAG_PAYLOADCOMPRESSOR)?.map(|(v, _)| v);
        let payload = payload::decompress(
            &data[cur.position()..],
            format.as_deref(),
            compressor.as_deref(),
        )?;

        Ok(RpmParser {
            origin: origin.to_string(),
            info,
            dependencies,
            scripts,
            triggers,
            files,
            hardlinks: groups,
            hardlinks_seen: FxHashMap::default(),
            payload,
            payload_pos: 0,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn package(&self) -> &PackageInfo {
        &self.info
    }

    pub fn nevra(&self) -> String {
        self.info.nevra()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Read the next payload entry. Returns `None` at the end of the
    /// archive. Hardlink groups are folded into one entry, emitted when the
    /// last group member is reached (rpmbuild stores the contents there).
    pub fn read_file(&mut self) -> Result<Option<FileEntry>, RpmError> {
        let mut reader = CpioReader::at(&self.payload, self.payload_pos);
        let result = loop {
            let Some(entry) = reader.next_entry()? else {
                break None;
            };
            let name = normalize_payload_name(&entry.name);
            let Some(info) = self.files.get(name) else {
                return Err(RpmError::UnknownPayloadEntry {
                    name: name.to_string(),
                });
            };
            let key = (info.device, info.ino);
            if let Some(names) = self.hardlinks.get(&key) {
                let seen = self.hardlinks_seen.entry(key).or_insert(0);
                *seen += 1;
                if *seen < names.len() && entry.data.is_empty() {
                    continue;
                }
                let infos = names
                    .iter()
                    .filter_map(|n| self.files.get(n).cloned())
                    .collect();
                break Some(FileEntry {
                    infos,
                    contents: entry.data.to_vec(),
                });
            }
            break Some(FileEntry {
                infos: vec![info.clone()],
                contents: entry.data.to_vec(),
            });
        };
        self.payload_pos = reader.position();
        Ok(result)
    }
}

/// Payload names are `./usr/bin/foo`; the header uses `/usr/bin/foo`.
fn normalize_payload_name(name: &str) -> &str {
    name.strip_prefix('.')
        .filter(|s| s.starts_with('/'))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpm::package::PackageKind;
    use crate::testing::{build_rpm, FileSpec};

    #[test]
    fn parses_synthetic_package() {
        let rpm = build_rpm(
            "hello",
            "x86_64",
            Some("hello-1.0-1.src.rpm"),
            &[
                FileSpec::directory("/usr/", "bin"),
                FileSpec::regular("/usr/bin/", "hello", &b"#!/bin/sh\necho hello\n"[..]),
                FileSpec::symlink("/usr/bin/", "hi", "hello"),
            ],
        );
        let mut parser = RpmParser::from_bytes(&rpm, "hello-1.0-1.x86_64.rpm").unwrap();
        assert_eq!(parser.package().name, "hello");
        assert_eq!(parser.package().kind, PackageKind::Binary);
        assert_eq!(parser.nevra(), "hello-1.0-1.x86_64");
        assert_eq!(parser.package().hash.len(), 40);
        assert_eq!(parser.dependencies().len(), 2);

        let dir = parser.read_file().unwrap().unwrap();
        assert!(dir.infos[0].is_directory());
        let file = parser.read_file().unwrap().unwrap();
        assert_eq!(file.infos[0].name, "/usr/bin/hello");
        assert_eq!(file.contents, b"#!/bin/sh\necho hello\n");
        let link = parser.read_file().unwrap().unwrap();
        assert!(link.infos[0].is_symlink());
        assert_eq!(link.infos[0].link_to, "hello");
        assert!(parser.read_file().unwrap().is_none());
    }

    #[test]
    fn hardlinks_are_grouped() {
        let rpm = build_rpm(
            "links",
            "x86_64",
            Some("links-1.0-1.src.rpm"),
            &[
                FileSpec {
                    ino: 42,
                    ..FileSpec::regular("/usr/share/", "first", &b"shared contents"[..])
                },
                FileSpec {
                    ino: 42,
                    ..FileSpec::regular("/usr/share/", "second", &b"shared contents"[..])
                },
            ],
        );
        let mut parser = RpmParser::from_bytes(&rpm, "links.rpm").unwrap();
        let entry = parser.read_file().unwrap().unwrap();
        assert_eq!(entry.infos.len(), 2);
        assert_eq!(entry.contents, b"shared contents");
        let names: Vec<_> = entry.infos.iter().map(|i| i.name.as_str()).collect();
        assert!(names.contains(&"/usr/share/first"));
        assert!(names.contains(&"/usr/share/second"));
        assert!(parser.read_file().unwrap().is_none());
    }

    #[test]
    fn empty_hardlinked_file_still_emitted_once() {
        let rpm = build_rpm(
            "links",
            "noarch",
            Some("links-1.0-1.src.rpm"),
            &[
                FileSpec {
                    ino: 9,
                    ..FileSpec::regular("/etc/", "a.conf", Vec::new())
                },
                FileSpec {
                    ino: 9,
                    ..FileSpec::regular("/etc/", "b.conf", Vec::new())
                },
            ],
        );
        let mut parser = RpmParser::from_bytes(&rpm, "links.rpm").unwrap();
        let entry = parser.read_file().unwrap().unwrap();
        assert_eq!(entry.infos.len(), 2);
        assert!(entry.contents.is_empty());
        assert!(parser.read_file().unwrap().is_none());
    }

    #[test]
    fn source_package_without_sourcerpm_tag() {
        let rpm = build_rpm("hello", "src", None, &[]);
        let parser = RpmParser::from_bytes(&rpm, "hello.src.rpm").unwrap();
        assert_eq!(parser.package().kind, PackageKind::Source);
    }

    #[test]
    fn rejects_non_rpm_data() {
        let err = RpmParser::from_bytes(&[0u8; 200], "junk").unwrap_err();
        assert!(matches!(err, RpmError::BadLeadMagic));
    }
}
