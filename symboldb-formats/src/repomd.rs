//! Yum repository metadata: repomd.xml and the primary package list.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use symboldb_core::checksum::Checksum;
use symboldb_core::errors::RepomdError;

/// One `<data>` entry of repomd.xml.
#[derive(Debug, Clone)]
pub struct RepomdEntry {
    /// "primary", "primary_db", "filelists", ...
    pub entry_type: String,
    /// True when the payload is compressed (an open-checksum is present).
    pub compressed: bool,
    pub checksum: Checksum,
    pub open_checksum: Option<Checksum>,
    /// Location of the file, relative to the repository base URL.
    pub href: String,
}

/// Parsed repomd.xml.
#[derive(Debug, Clone, Default)]
pub struct Repomd {
    pub revision: String,
    pub entries: Vec<RepomdEntry>,
}

/// The URL of repomd.xml relative to a repository base URL.
pub fn repomd_url(base: &str) -> String {
    let mut url = base.to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url.push_str("repodata/repomd.xml");
    url
}

/// Combine a repository base URL with a location href, following the yum
/// rules: absolute hrefs win, everything else is relative to the base.
pub fn url_combine_yum(base: &str, href: &str) -> String {
    if href.contains("://") {
        return href.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        href.trim_start_matches('/')
    )
}

fn xml_err(reader: &Reader<&[u8]>, e: quick_xml::Error) -> RepomdError {
    RepomdError::Xml {
        position: reader.buffer_position(),
        message: e.to_string(),
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &'static str) -> Result<Option<String>, RepomdError> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| RepomdError::Xml {
            position: 0,
            message: err.to_string(),
        })?;
    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|err| RepomdError::Xml {
                    position: 0,
                    message: err.to_string(),
                })?
                .into_owned();
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn required_attribute(
    e: &BytesStart<'_>,
    element: &'static str,
    name: &'static str,
) -> Result<String, RepomdError> {
    attribute(e, name)?.ok_or(RepomdError::MissingAttribute { element, name })
}

#[derive(Default)]
struct DataAccum {
    entry_type: String,
    checksum_type: Option<String>,
    checksum_hex: String,
    open_checksum_type: Option<String>,
    open_checksum_hex: String,
    size: Option<u64>,
    open_size: Option<u64>,
    href: Option<String>,
}

impl DataAccum {
    fn finish(self) -> Result<RepomdEntry, RepomdError> {
        let checksum_type = self
            .checksum_type
            .ok_or(RepomdError::MissingElement { name: "checksum" })?;
        let size = self.size.ok_or(RepomdError::MissingElement { name: "size" })?;
        let checksum = Checksum::from_hex(&checksum_type, Some(size), &self.checksum_hex)?;
        let open_checksum = match self.open_checksum_type {
            Some(open_type) => {
                let open_size = self
                    .open_size
                    .ok_or(RepomdError::MissingElement { name: "open-size" })?;
                Some(Checksum::from_hex(
                    &open_type,
                    Some(open_size),
                    &self.open_checksum_hex,
                )?)
            }
            None => None,
        };
        let href = self
            .href
            .ok_or(RepomdError::MissingElement { name: "location" })?;
        Ok(RepomdEntry {
            entry_type: self.entry_type,
            compressed: open_checksum.is_some(),
            checksum,
            open_checksum,
            href,
        })
    }
}

impl Repomd {
    /// Parse an XML document containing the repomd element.
    pub fn parse(data: &[u8]) -> Result<Self, RepomdError> {
        let mut reader = Reader::from_reader(data);
        let mut result = Repomd::default();
        let mut root_seen = false;
        let mut current: Option<DataAccum> = None;
        let mut text_target: Option<&'static str> = None;
        let mut revision_seen = false;

        let mut buf = Vec::new();
        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| xml_err(&reader, e))?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let name = local_name(e);
                    if !root_seen {
                        if name != "repomd" {
                            return Err(RepomdError::InvalidRoot {
                                expected: "repomd",
                                found: name,
                            });
                        }
                        root_seen = true;
                    } else if current.is_none() {
                        match name.as_str() {
                            "revision" => {
                                revision_seen = true;
                                text_target = Some("revision");
                            }
                            "data" => {
                                current = Some(DataAccum {
                                    entry_type: required_attribute(e, "data", "type")?,
                                    ..DataAccum::default()
                                });
                            }
                            _ => {}
                        }
                    } else if let Some(accum) = current.as_mut() {
                        match name.as_str() {
                            "checksum" => {
                                accum.checksum_type =
                                    Some(required_attribute(e, "checksum", "type")?);
                                text_target = Some("checksum");
                            }
                            "open-checksum" => {
                                accum.open_checksum_type =
                                    Some(required_attribute(e, "open-checksum", "type")?);
                                text_target = Some("open-checksum");
                            }
                            "size" => text_target = Some("size"),
                            "open-size" => text_target = Some("open-size"),
                            "location" => {
                                accum.href = Some(required_attribute(e, "location", "href")?);
                            }
                            _ => {}
                        }
                    }
                }
                Event::Text(ref t) => {
                    let Some(target) = text_target else {
                        continue;
                    };
                    let text = t
                        .unescape()
                        .map_err(|e| xml_err(&reader, e.into()))?
                        .trim()
                        .to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match (target, current.as_mut()) {
                        ("revision", _) => result.revision.push_str(&text),
                        ("checksum", Some(accum)) => accum.checksum_hex.push_str(&text),
                        ("open-checksum", Some(accum)) => {
                            accum.open_checksum_hex.push_str(&text);
                        }
                        ("size", Some(accum)) => {
                            accum.size =
                                Some(text.parse().map_err(|_| RepomdError::MalformedElement {
                                    name: "size",
                                    value: text.clone(),
                                })?);
                        }
                        ("open-size", Some(accum)) => {
                            accum.open_size =
                                Some(text.parse().map_err(|_| RepomdError::MalformedElement {
                                    name: "open-size",
                                    value: text.clone(),
                                })?);
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    text_target = None;
                    if name == "data" {
                        if let Some(accum) = current.take() {
                            result.entries.push(accum.finish()?);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !root_seen {
            return Err(RepomdError::MissingElement { name: "repomd" });
        }
        if !revision_seen {
            return Err(RepomdError::MissingElement { name: "revision" });
        }
        Ok(result)
    }
}

/// One `<package>` record from primary.xml.
#[derive(Debug, Clone)]
pub struct PrimaryPackage {
    pub name: String,
    pub arch: String,
    pub epoch: Option<u32>,
    pub version: String,
    pub release: String,
    pub source_rpm: String,
    pub checksum: Checksum,
    /// Download URL, already combined with the repository base URL.
    pub href: String,
}

/// Pull-parser over the package list of an (uncompressed) primary.xml.
pub struct PrimaryReader<'a> {
    reader: Reader<&'a [u8]>,
    base_url: String,
    started: bool,
}

impl<'a> PrimaryReader<'a> {
    /// `base_url` is the URL non-absolute location hrefs are combined with.
    pub fn new(data: &'a [u8], base_url: &str) -> Self {
        PrimaryReader {
            reader: Reader::from_reader(data),
            base_url: base_url.to_string(),
            started: false,
        }
    }

    /// Advance to the next `<package>` element. Returns `None` at the end
    /// of the document.
    pub fn next_package(&mut self) -> Result<Option<PrimaryPackage>, RepomdError> {
        let mut buf = Vec::new();
        // Find the next package start, validating the root on the way.
        let package_start = loop {
            let event = self
                .reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_err(&self.reader, e))?;
            match event {
                Event::Start(e) => {
                    let name = local_name(&e);
                    if !self.started {
                        if name != "metadata" {
                            return Err(RepomdError::InvalidRoot {
                                expected: "metadata",
                                found: name,
                            });
                        }
                        self.started = true;
                    } else if name == "package" {
                        break e.into_owned();
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
            buf.clear();
        };

        let package_type = required_attribute(&package_start, "package", "type")?;
        if package_type != "rpm" {
            return Err(RepomdError::InvalidPackageType {
                found: package_type,
            });
        }

        let mut name = None;
        let mut arch = None;
        let mut epoch = None;
        let mut version = None;
        let mut release = None;
        let mut source_rpm = None;
        let mut checksum_type = None;
        let mut checksum_hex = String::new();
        let mut package_size = None;
        let mut href = None;
        let mut text_target: Option<&'static str> = None;
        let mut depth = 0usize;

        loop {
            buf.clear();
            let event = self
                .reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_err(&self.reader, e))?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let elem = local_name(e);
                    match elem.as_str() {
                        "name" if depth == 0 => text_target = Some("name"),
                        "arch" if depth == 0 => text_target = Some("arch"),
                        "version" if depth == 0 => {
                            if let Some(value) = attribute(e, "epoch")? {
                                epoch = Some(value.parse().map_err(|_| {
                                    RepomdError::MalformedElement {
                                        name: "version",
                                        value,
                                    }
                                })?);
                            }
                            version = attribute(e, "ver")?;
                            release = attribute(e, "rel")?;
                        }
                        "checksum" if depth == 0 => {
                            checksum_type = Some(required_attribute(e, "checksum", "type")?);
                            text_target = Some("checksum");
                        }
                        "size" if depth == 0 => {
                            if let Some(value) = attribute(e, "package")? {
                                package_size =
                                    Some(value.parse().map_err(|_| {
                                        RepomdError::MalformedElement { name: "size", value }
                                    })?);
                            }
                        }
                        "location" if depth == 0 => {
                            href = Some(required_attribute(e, "location", "href")?);
                        }
                        "sourcerpm" => text_target = Some("sourcerpm"),
                        _ => {}
                    }
                    if !is_empty {
                        depth += 1;
                    }
                }
                Event::Text(ref t) => {
                    let Some(target) = text_target else {
                        continue;
                    };
                    let text = t
                        .unescape()
                        .map_err(|e| xml_err(&self.reader, e.into()))?
                        .trim()
                        .to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match target {
                        "name" => name = Some(text),
                        "arch" => arch = Some(text),
                        "checksum" => checksum_hex.push_str(&text),
                        "sourcerpm" => source_rpm = Some(text),
                        _ => {}
                    }
                }
                Event::End(_) => {
                    text_target = None;
                    if depth == 0 {
                        break; // left </package>
                    }
                    depth -= 1;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let name = name.ok_or(RepomdError::MissingElement { name: "name" })?;
        let source_rpm = source_rpm.ok_or(RepomdError::MissingElement { name: "sourcerpm" })?;
        let checksum_type =
            checksum_type.ok_or(RepomdError::MissingElement { name: "checksum" })?;
        let checksum = Checksum::from_hex(&checksum_type, package_size, &checksum_hex)?;
        let href = href.ok_or(RepomdError::MissingElement { name: "location" })?;

        Ok(Some(PrimaryPackage {
            name,
            arch: arch.unwrap_or_default(),
            epoch,
            version: version.unwrap_or_default(),
            release: release.unwrap_or_default(),
            source_rpm,
            checksum,
            href: url_combine_yum(&self.base_url, &href),
        }))
    }
}

/// Strip release and version from a source RPM file name, leaving the
/// source package name. Returns `None` when the name is malformed.
pub fn source_package_name(source_rpm: &str) -> Option<&str> {
    let without_release = &source_rpm[..source_rpm.rfind('-')?];
    let dash = without_release.rfind('-')?;
    Some(&without_release[..dash])
}

#[cfg(test)]
mod tests {
    use super::*;
    use symboldb_core::checksum::HashKind;

    const REPOMD_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo">
  <revision>1378405484</revision>
  <data type="primary">
    <checksum type="sha256">5a4b9f6d038a0ba3e0ef7e1e2a2026ae2fef69442265a8947ca0592b003b765a</checksum>
    <open-checksum type="sha256">b18a1e5f1b364eae0e3bba1f9f10ec42229a4d2e8e1a6ce75c6fac55b46971ca</open-checksum>
    <location href="repodata/5a4b-primary.xml.gz"/>
    <timestamp>1378405480</timestamp>
    <size>2932</size>
    <open-size>9183</open-size>
  </data>
  <data type="filelists">
    <checksum type="sha256">11016b1aa2a5bb458244bbfabbb4a71e1b4b22b0c1c3a0a0cf0e64fe5d47c3c8</checksum>
    <location href="repodata/1101-filelists.xml.gz"/>
    <size>1234</size>
  </data>
</repomd>"#;

    #[test]
    fn parses_repomd() {
        let repomd = Repomd::parse(REPOMD_XML.as_bytes()).unwrap();
        assert_eq!(repomd.revision, "1378405484");
        assert_eq!(repomd.entries.len(), 2);
        let primary = &repomd.entries[0];
        assert_eq!(primary.entry_type, "primary");
        assert!(primary.compressed);
        assert_eq!(primary.checksum.kind, HashKind::Sha256);
        assert_eq!(primary.checksum.length, Some(2932));
        assert_eq!(
            primary.open_checksum.as_ref().unwrap().length,
            Some(9183)
        );
        assert_eq!(primary.href, "repodata/5a4b-primary.xml.gz");
        assert!(!repomd.entries[1].compressed);
    }

    #[test]
    fn rejects_wrong_root() {
        let err = Repomd::parse(b"<metadata></metadata>").unwrap_err();
        assert!(matches!(err, RepomdError::InvalidRoot { .. }));
    }

    #[test]
    fn missing_checksum_is_an_error() {
        let doc = r#"<repomd><revision>1</revision>
            <data type="primary"><location href="x"/><size>1</size></data></repomd>"#;
        assert!(matches!(
            Repomd::parse(doc.as_bytes()),
            Err(RepomdError::MissingElement { name: "checksum" })
        ));
    }

    const PRIMARY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="2">
  <package type="rpm">
    <name>opensm-libs</name>
    <arch>x86_64</arch>
    <version epoch="0" ver="3.3.15" rel="3.fc18"/>
    <checksum type="sha256" pkgid="YES">64775bf9ae4d9e969e24dc7b4d6a89ffe59e0d2b7da4c6010703d8480dbe2e13</checksum>
    <size package="62796" installed="167241" archive="168076"/>
    <location href="Packages/o/opensm-libs-3.3.15-3.fc18.x86_64.rpm"/>
    <format>
      <rpm:license>GPLv2 or BSD</rpm:license>
      <rpm:sourcerpm>opensm-3.3.15-3.fc18.src.rpm</rpm:sourcerpm>
    </format>
  </package>
  <package type="rpm">
    <name>oniguruma</name>
    <arch>x86_64</arch>
    <version epoch="0" ver="5.9.2" rel="4.fc18"/>
    <checksum type="sha256" pkgid="YES">9a58a6ff8bd4dbc55302d835c2d5b6aa39aa7aeb4bb8f32b6261e67e3ec03e95</checksum>
    <size package="148429" installed="417838" archive="419756"/>
    <location href="Packages/o/oniguruma-5.9.2-4.fc18.x86_64.rpm"/>
    <format>
      <rpm:sourcerpm>oniguruma-5.9.2-4.fc18.src.rpm</rpm:sourcerpm>
    </format>
  </package>
</metadata>"#;

    #[test]
    fn iterates_primary_packages() {
        let mut reader =
            PrimaryReader::new(PRIMARY_XML.as_bytes(), "http://mirror.example.com/fedora/18");
        let first = reader.next_package().unwrap().unwrap();
        assert_eq!(first.name, "opensm-libs");
        assert_eq!(first.arch, "x86_64");
        assert_eq!(first.version, "3.3.15");
        assert_eq!(first.release, "3.fc18");
        assert_eq!(first.epoch, Some(0));
        assert_eq!(first.source_rpm, "opensm-3.3.15-3.fc18.src.rpm");
        assert_eq!(first.checksum.length, Some(62796));
        assert_eq!(
            first.href,
            "http://mirror.example.com/fedora/18/Packages/o/opensm-libs-3.3.15-3.fc18.x86_64.rpm"
        );
        let second = reader.next_package().unwrap().unwrap();
        assert_eq!(second.name, "oniguruma");
        assert_eq!(second.source_rpm, "oniguruma-5.9.2-4.fc18.src.rpm");
        assert!(reader.next_package().unwrap().is_none());
    }

    #[test]
    fn absolute_hrefs_are_preserved() {
        assert_eq!(
            url_combine_yum("http://base/repo", "http://other/pkg.rpm"),
            "http://other/pkg.rpm"
        );
        assert_eq!(
            url_combine_yum("http://base/repo/", "Packages/p.rpm"),
            "http://base/repo/Packages/p.rpm"
        );
        assert_eq!(repomd_url("http://base/repo"), "http://base/repo/repodata/repomd.xml");
    }

    #[test]
    fn source_package_name_stripping() {
        assert_eq!(
            source_package_name("opensm-3.3.15-3.fc18.src.rpm"),
            Some("opensm")
        );
        assert_eq!(source_package_name("oniguruma"), None);
    }
}
