//! RPM header section parsing.
//!
//! A header is an index of (tag, type, offset, count) entries followed by a
//! data store. Values are big-endian; the index offsets already account for
//! the store-internal alignment of numeric types.

use symboldb_core::errors::RpmError;

use crate::bytes::Cursor;

pub const HEADER_MAGIC: [u8; 4] = [0x8e, 0xad, 0xe8, 0x01];

pub const TYPE_CHAR: u32 = 1;
pub const TYPE_INT8: u32 = 2;
pub const TYPE_INT16: u32 = 3;
pub const TYPE_INT32: u32 = 4;
pub const TYPE_INT64: u32 = 5;
pub const TYPE_STRING: u32 = 6;
pub const TYPE_BIN: u32 = 7;
pub const TYPE_STRING_ARRAY: u32 = 8;
pub const TYPE_I18NSTRING: u32 = 9;

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    tag: u32,
    ty: u32,
    offset: u32,
    count: u32,
}

/// A parsed header section with an owned data store.
#[derive(Debug)]
pub struct Header {
    entries: Vec<IndexEntry>,
    store: Vec<u8>,
}

impl Header {
    /// Parse a header at the cursor position, leaving the cursor just past
    /// the data store.
    pub fn parse(cur: &mut Cursor<'_>, section: &'static str) -> Result<Self, RpmError> {
        if cur.take(4)? != HEADER_MAGIC.as_slice() {
            return Err(RpmError::BadHeaderMagic { section });
        }
        cur.skip(4)?; // reserved
        let nindex = cur.u32_be()? as usize;
        let hsize = cur.u32_be()? as usize;
        let mut entries = Vec::with_capacity(nindex);
        for _ in 0..nindex {
            entries.push(IndexEntry {
                tag: cur.u32_be()?,
                ty: cur.u32_be()?,
                offset: cur.u32_be()?,
                count: cur.u32_be()?,
            });
        }
        let store = cur.take(hsize)?.to_vec();
        Ok(Header { entries, store })
    }

    fn find(&self, tag: u32) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    pub fn has_tag(&self, tag: u32) -> bool {
        self.find(tag).is_some()
    }

    fn store_from(&self, entry: &IndexEntry) -> Result<&[u8], RpmError> {
        self.store
            .get(entry.offset as usize..)
            .ok_or(RpmError::MalformedEntry {
                tag: entry.tag,
                message: format!("store offset {} out of range", entry.offset),
            })
    }

    fn c_string(data: &[u8], tag: u32) -> Result<(&[u8], &[u8]), RpmError> {
        match data.iter().position(|&b| b == 0) {
            Some(nul) => Ok((&data[..nul], &data[nul + 1..])),
            None => Err(RpmError::MalformedEntry {
                tag,
                message: "unterminated string".to_string(),
            }),
        }
    }

    /// A STRING or I18NSTRING value. I18N tables yield the first (C locale)
    /// variant. Returns the decoded string and whether the bytes had to be
    /// re-encoded from Latin-1.
    pub fn string(&self, tag: u32) -> Result<Option<(String, bool)>, RpmError> {
        let Some(entry) = self.find(tag) else {
            return Ok(None);
        };
        if entry.ty != TYPE_STRING && entry.ty != TYPE_I18NSTRING {
            return Err(RpmError::TypeMismatch {
                tag,
                found: entry.ty,
            });
        }
        let (raw, _) = Self::c_string(self.store_from(entry)?, tag)?;
        Ok(Some(decode_string(raw)))
    }

    pub fn string_required(&self, tag: u32, name: &'static str) -> Result<String, RpmError> {
        match self.string(tag)? {
            Some((value, _)) => Ok(value),
            None => Err(RpmError::MissingTag { name }),
        }
    }

    /// A STRING_ARRAY value; empty when the tag is absent.
    pub fn string_array(&self, tag: u32) -> Result<Vec<String>, RpmError> {
        Ok(self
            .string_array_flagged(tag)?
            .into_iter()
            .map(|(value, _)| value)
            .collect())
    }

    /// Like `string_array`, but reporting per-entry Latin-1 re-encoding.
    pub fn string_array_flagged(&self, tag: u32) -> Result<Vec<(String, bool)>, RpmError> {
        let Some(entry) = self.find(tag) else {
            return Ok(Vec::new());
        };
        if entry.ty != TYPE_STRING_ARRAY && entry.ty != TYPE_STRING {
            return Err(RpmError::TypeMismatch {
                tag,
                found: entry.ty,
            });
        }
        let mut rest = self.store_from(entry)?;
        let mut result = Vec::with_capacity(entry.count as usize);
        for _ in 0..entry.count {
            let (raw, tail) = Self::c_string(rest, tag)?;
            result.push(decode_string(raw));
            rest = tail;
        }
        Ok(result)
    }

    pub fn u32(&self, tag: u32) -> Result<Option<u32>, RpmError> {
        Ok(self.u32_array(tag)?.and_then(|v| v.first().copied()))
    }

    pub fn u16_array(&self, tag: u32) -> Result<Option<Vec<u16>>, RpmError> {
        let Some(entry) = self.find(tag) else {
            return Ok(None);
        };
        if entry.ty != TYPE_INT16 {
            return Err(RpmError::TypeMismatch {
                tag,
                found: entry.ty,
            });
        }
        let mut cur = Cursor::new(self.store_from(entry)?);
        let mut result = Vec::with_capacity(entry.count as usize);
        for _ in 0..entry.count {
            result.push(cur.u16_be().map_err(|_| RpmError::MalformedEntry {
                tag,
                message: "truncated int16 array".to_string(),
            })?);
        }
        Ok(Some(result))
    }

    pub fn u32_array(&self, tag: u32) -> Result<Option<Vec<u32>>, RpmError> {
        let Some(entry) = self.find(tag) else {
            return Ok(None);
        };
        if entry.ty != TYPE_INT32 {
            return Err(RpmError::TypeMismatch {
                tag,
                found: entry.ty,
            });
        }
        let mut cur = Cursor::new(self.store_from(entry)?);
        let mut result = Vec::with_capacity(entry.count as usize);
        for _ in 0..entry.count {
            result.push(cur.u32_be().map_err(|_| RpmError::MalformedEntry {
                tag,
                message: "truncated int32 array".to_string(),
            })?);
        }
        Ok(Some(result))
    }
}

/// Decode header bytes that are usually UTF-8 but occasionally Latin-1 in
/// old packages. The boolean reports whether re-encoding was necessary.
pub fn decode_string(raw: &[u8]) -> (String, bool) {
    match std::str::from_utf8(raw) {
        Ok(s) => (s.to_string(), false),
        Err(_) => (raw.iter().map(|&b| b as char).collect(), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpm::tags;
    use crate::testing::HeaderBuilder;

    #[test]
    fn parses_strings_and_ints() {
        let bytes = HeaderBuilder::new()
            .string(tags::RPMTAG_NAME, "hello")
            .u32_array(tags::RPMTAG_EPOCH, &[2])
            .string_array(tags::RPMTAG_BASENAMES, &["a", "b"])
            .u16_array(tags::RPMTAG_FILEMODES, &[0o100644, 0o100755])
            .build();
        let mut cur = Cursor::new(&bytes);
        let header = Header::parse(&mut cur, "main").unwrap();
        assert_eq!(cur.remaining(), 0);
        assert_eq!(header.string(tags::RPMTAG_NAME).unwrap().unwrap().0, "hello");
        assert_eq!(header.u32(tags::RPMTAG_EPOCH).unwrap(), Some(2));
        assert_eq!(
            header.string_array(tags::RPMTAG_BASENAMES).unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(
            header.u16_array(tags::RPMTAG_FILEMODES).unwrap().unwrap(),
            vec![0o100644, 0o100755]
        );
        assert!(header.string(tags::RPMTAG_SUMMARY).unwrap().is_none());
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let bytes = HeaderBuilder::new()
            .string(tags::RPMTAG_NAME, "hello")
            .build();
        let mut cur = Cursor::new(&bytes);
        let header = Header::parse(&mut cur, "main").unwrap();
        assert!(matches!(
            header.u32(tags::RPMTAG_NAME),
            Err(RpmError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn bad_magic() {
        let mut cur = Cursor::new(&[0u8; 32]);
        assert!(matches!(
            Header::parse(&mut cur, "signature"),
            Err(RpmError::BadHeaderMagic { .. })
        ));
    }

    #[test]
    fn latin1_fallback() {
        let (s, normalized) = decode_string(&[b'c', 0xE9]);
        assert_eq!(s, "cé");
        assert!(normalized);
    }
}
