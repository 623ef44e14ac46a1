//! Minimal ZIP archive reader, sufficient for scanning JAR files.
//!
//! Entries are located through the central directory (the local headers
//! alone do not reliably carry sizes when data descriptors are used).
//! Stored and deflated entries are supported; ZIP64 archives are not.

use std::io::Read;

use flate2::read::DeflateDecoder;
use symboldb_core::errors::ZipError;

use crate::bytes::Cursor;

const EOCD_SIGNATURE: u32 = 0x0605_4b50;
const CENTRAL_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_SIGNATURE: u32 = 0x0403_4b50;
const EOCD_MIN_LEN: usize = 22;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// Returns true if the vector starts with the `PK\x03\x04` signature
/// (although a leading local header is technically optional).
pub fn has_signature(data: &[u8]) -> bool {
    data.len() > 4 && data[0] == b'P' && data[1] == b'K' && data[2] == 3 && data[3] == 4
}

/// One central directory entry.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub name: String,
    method: u16,
    compressed_size: u32,
    uncompressed_size: u32,
    local_offset: u32,
}

/// A ZIP archive parsed from an in-memory buffer.
pub struct ZipArchive<'a> {
    data: &'a [u8],
    entries: Vec<ZipEntry>,
}

impl<'a> ZipArchive<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, ZipError> {
        let eocd = find_eocd(data).ok_or(ZipError::MissingEndOfCentralDirectory)?;
        let mut cur = Cursor::at(data, eocd + 4);
        cur.skip(2)?; // disk number
        cur.skip(2)?; // central directory start disk
        cur.skip(2)?; // entries on this disk
        let entry_count = cur.u16_le()?;
        cur.skip(4)?; // central directory size
        let cd_offset = cur.u32_le()? as usize;

        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut cur = Cursor::at(data, cd_offset);
        for _ in 0..entry_count {
            let offset = cur.position();
            if cur.u32_le()? != CENTRAL_SIGNATURE {
                return Err(ZipError::BadCentralDirectory { offset });
            }
            cur.skip(2)?; // version made by
            cur.skip(2)?; // version needed
            cur.skip(2)?; // general purpose flags
            let method = cur.u16_le()?;
            cur.skip(4)?; // dos time/date
            cur.skip(4)?; // crc32
            let compressed_size = cur.u32_le()?;
            let uncompressed_size = cur.u32_le()?;
            let name_len = cur.u16_le()?;
            let extra_len = cur.u16_le()?;
            let comment_len = cur.u16_le()?;
            cur.skip(2)?; // disk number start
            cur.skip(2)?; // internal attributes
            cur.skip(4)?; // external attributes
            let local_offset = cur.u32_le()?;
            let name = String::from_utf8_lossy(cur.take(name_len as usize)?).into_owned();
            cur.skip(extra_len as usize)?;
            cur.skip(comment_len as usize)?;
            entries.push(ZipEntry {
                name,
                method,
                compressed_size,
                uncompressed_size,
                local_offset,
            });
        }
        Ok(ZipArchive { data, entries })
    }

    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Decode the data of one entry.
    pub fn read(&self, entry: &ZipEntry) -> Result<Vec<u8>, ZipError> {
        let mut cur = Cursor::at(self.data, entry.local_offset as usize);
        if cur.u32_le()? != LOCAL_SIGNATURE {
            return Err(ZipError::BadLocalHeader {
                name: entry.name.clone(),
            });
        }
        cur.skip(2)?; // version needed
        cur.skip(2)?; // general purpose flags
        cur.skip(2)?; // method (central directory value is authoritative)
        cur.skip(4)?; // dos time/date
        cur.skip(4)?; // crc32
        cur.skip(4)?; // compressed size
        cur.skip(4)?; // uncompressed size
        let name_len = cur.u16_le()?;
        let extra_len = cur.u16_le()?;
        cur.skip(name_len as usize)?;
        cur.skip(extra_len as usize)?;
        let compressed = cur.take(entry.compressed_size as usize)?;

        match entry.method {
            METHOD_STORED => Ok(compressed.to_vec()),
            METHOD_DEFLATED => {
                let mut decoder = DeflateDecoder::new(compressed);
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                decoder.read_to_end(&mut out).map_err(|e| ZipError::Inflate {
                    name: entry.name.clone(),
                    message: e.to_string(),
                })?;
                Ok(out)
            }
            method => Err(ZipError::UnsupportedMethod {
                name: entry.name.clone(),
                method,
            }),
        }
    }
}

/// Locate the end-of-central-directory record by scanning backwards through
/// the trailing comment space.
fn find_eocd(data: &[u8]) -> Option<usize> {
    if data.len() < EOCD_MIN_LEN {
        return None;
    }
    let lower = data.len().saturating_sub(EOCD_MIN_LEN + u16::MAX as usize);
    let mut pos = data.len() - EOCD_MIN_LEN;
    loop {
        if u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            == EOCD_SIGNATURE
        {
            return Some(pos);
        }
        if pos == lower {
            return None;
        }
        pos -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::build_zip;

    #[test]
    fn signature_check() {
        assert!(has_signature(b"PK\x03\x04rest"));
        assert!(!has_signature(b"PK\x05\x06"));
        assert!(!has_signature(b"PK"));
    }

    #[test]
    fn reads_stored_entries() {
        let archive = build_zip(&[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ("com/example/Foo.class", b"\xCA\xFE\xBA\xBEdata"),
        ]);
        let zip = ZipArchive::parse(&archive).unwrap();
        assert_eq!(zip.entries().len(), 2);
        assert_eq!(zip.entries()[1].name, "com/example/Foo.class");
        let data = zip.read(&zip.entries()[1].clone()).unwrap();
        assert_eq!(data, b"\xCA\xFE\xBA\xBEdata");
    }

    #[test]
    fn missing_eocd() {
        assert!(matches!(
            ZipArchive::parse(b"PK\x03\x04 not really a zip"),
            Err(ZipError::MissingEndOfCentralDirectory)
        ));
    }
}
