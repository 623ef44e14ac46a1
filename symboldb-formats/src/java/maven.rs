//! Maven URL extraction from POM files.
//!
//! Packaged POM files point at repositories, distribution sites, and SCM
//! locations; the database records every such URL with its context so that
//! infrastructure dependencies of a package set can be queried.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// Context in which a URL appeared inside the POM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MavenUrlKind {
    Other,
    Repository,
    PluginRepository,
    SnapshotRepository,
    DistributionManagement,
    DownloadUrl,
    Site,
    Scm,
    Connection,
    DeveloperConnection,
}

impl MavenUrlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MavenUrlKind::Other => "other",
            MavenUrlKind::Repository => "repository",
            MavenUrlKind::PluginRepository => "pluginRepository",
            MavenUrlKind::SnapshotRepository => "snapshotRepository",
            MavenUrlKind::DistributionManagement => "distributionManagement",
            MavenUrlKind::DownloadUrl => "downloadUrl",
            MavenUrlKind::Site => "site",
            MavenUrlKind::Scm => "scm",
            MavenUrlKind::Connection => "connection",
            MavenUrlKind::DeveloperConnection => "developerConnection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MavenUrl {
    pub url: String,
    pub kind: MavenUrlKind,
}

/// A recoverable XML problem encountered during extraction.
#[derive(Debug, Clone)]
pub struct XmlProblem {
    pub message: String,
    pub position: u64,
}

/// Extract Maven URLs from an XML document.
///
/// Extraction is best-effort: URLs found before a well-formedness error are
/// returned alongside the error so the caller can record both.
pub fn extract(data: &[u8]) -> (Vec<MavenUrl>, Option<XmlProblem>) {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<String> = Vec::new();
    let mut result = Vec::new();
    let mut buf = Vec::new();
    let error = loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                if let Some(kind) = classify(&stack) {
                    let text = match t.unescape() {
                        Ok(text) => text,
                        Err(_) => continue,
                    };
                    let url = text.trim();
                    if !url.is_empty() {
                        result.push(MavenUrl {
                            url: url.to_string(),
                            kind,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break None,
            Ok(_) => {}
            Err(e) => {
                break Some(XmlProblem {
                    message: e.to_string(),
                    position: reader.buffer_position(),
                });
            }
        }
        buf.clear();
    };
    (result, error)
}

fn classify(stack: &[String]) -> Option<MavenUrlKind> {
    let (last, parents) = stack.split_last()?;
    let parent = parents.last().map(String::as_str);
    let grandparent = parents
        .len()
        .checked_sub(2)
        .map(|i| parents[i].as_str());
    match (last.as_str(), parent) {
        ("url", Some("repository")) => Some(MavenUrlKind::Repository),
        ("url", Some("pluginRepository")) => Some(MavenUrlKind::PluginRepository),
        ("url", Some("snapshotRepository")) => Some(MavenUrlKind::SnapshotRepository),
        ("url", Some("site")) if grandparent == Some("distributionManagement") => {
            Some(MavenUrlKind::Site)
        }
        ("url", Some("distributionManagement")) => Some(MavenUrlKind::DistributionManagement),
        ("url", Some("scm")) => Some(MavenUrlKind::Scm),
        ("url", Some("project")) => Some(MavenUrlKind::Other),
        ("downloadUrl", Some("distributionManagement")) => Some(MavenUrlKind::DownloadUrl),
        ("connection", Some("scm")) => Some(MavenUrlKind::Connection),
        ("developerConnection", Some("scm")) => Some(MavenUrlKind::DeveloperConnection),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_contextual_urls() {
        let pom = br#"<project>
            <url>http://example.com/project</url>
            <scm>
              <url>http://example.com/scm</url>
              <connection>scm:git:git://example.com/repo.git</connection>
              <developerConnection>scm:git:ssh://example.com/repo.git</developerConnection>
            </scm>
            <repositories>
              <repository><id>r</id><url>http://repo.example.com</url></repository>
            </repositories>
            <distributionManagement>
              <downloadUrl>http://dl.example.com</downloadUrl>
              <site><url>http://site.example.com</url></site>
            </distributionManagement>
          </project>"#;
        let (urls, error) = extract(pom);
        assert!(error.is_none());
        let kinds: Vec<_> = urls.iter().map(|u| u.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MavenUrlKind::Other,
                MavenUrlKind::Scm,
                MavenUrlKind::Connection,
                MavenUrlKind::DeveloperConnection,
                MavenUrlKind::Repository,
                MavenUrlKind::DownloadUrl,
                MavenUrlKind::Site,
            ]
        );
        assert_eq!(urls[4].url, "http://repo.example.com");
    }

    #[test]
    fn ignores_unrelated_text() {
        let (urls, error) = extract(b"<project><name>foo</name></project>");
        assert!(urls.is_empty());
        assert!(error.is_none());
    }

    #[test]
    fn reports_malformed_xml_with_partial_results() {
        let (urls, error) = extract(b"<scm><url>http://x</url><oops &</scm>");
        assert_eq!(urls.len(), 1);
        assert!(error.is_some());
    }
}
