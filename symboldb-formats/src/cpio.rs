//! SVR4 "newc" cpio archive reader.
//!
//! RPM payloads are newc archives: a 6-byte magic, thirteen 8-character
//! hexadecimal fields, the NUL-terminated name, then the file data, with
//! name and data independently padded to 4-byte boundaries. The archive
//! ends with an entry named `TRAILER!!!`.

use symboldb_core::errors::CpioError;

pub const MAGIC_NEWC: &[u8; 6] = b"070701";
pub const MAGIC_CRC: &[u8; 6] = b"070702";
const TRAILER: &str = "TRAILER!!!";

/// Numeric header fields of a cpio entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpioHeader {
    pub ino: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub filesize: u32,
    pub devmajor: u32,
    pub devminor: u32,
    pub rdevmajor: u32,
    pub rdevminor: u32,
    pub namesize: u32,
    pub check: u32,
}

/// One archive member: header, name, and borrowed file data.
#[derive(Debug)]
pub struct CpioEntry<'a> {
    pub header: CpioHeader,
    pub name: String,
    pub data: &'a [u8],
}

fn hex_field(buf: &[u8], field: &'static str) -> Result<u32, CpioError> {
    let mut value: u32 = 0;
    for &ch in buf {
        let digit = match ch {
            b'0'..=b'9' => ch - b'0',
            b'a'..=b'f' => ch - b'a' + 10,
            b'A'..=b'F' => ch - b'A' + 10,
            _ => return Err(CpioError::BadField { field }),
        };
        value = (value << 4) | u32::from(digit);
    }
    Ok(value)
}

/// Parse the 104 bytes that follow the magic.
pub fn parse_header(buf: &[u8]) -> Result<CpioHeader, CpioError> {
    if buf.len() < 104 {
        return Err(CpioError::Truncated { what: "header" });
    }
    let field = |index: usize, name: &'static str| hex_field(&buf[index * 8..index * 8 + 8], name);
    Ok(CpioHeader {
        ino: field(0, "ino")?,
        mode: field(1, "mode")?,
        uid: field(2, "uid")?,
        gid: field(3, "gid")?,
        nlink: field(4, "nlink")?,
        mtime: field(5, "mtime")?,
        filesize: field(6, "filesize")?,
        devmajor: field(7, "devmajor")?,
        devminor: field(8, "devminor")?,
        rdevmajor: field(9, "rdevmajor")?,
        rdevminor: field(10, "rdevminor")?,
        namesize: field(11, "namesize")?,
        check: field(12, "check")?,
    })
}

/// Iterator over the members of an in-memory newc archive.
pub struct CpioReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CpioReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        CpioReader { data, pos: 0 }
    }

    /// Resume reading at a previously saved position.
    pub fn at(data: &'a [u8], pos: usize) -> Self {
        CpioReader { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn slice(&self, len: usize, what: &'static str) -> Result<&'a [u8], CpioError> {
        self.data
            .get(self.pos..self.pos + len)
            .ok_or(CpioError::Truncated { what })
    }

    /// Read the next member. Returns `None` once the trailer is reached.
    pub fn next_entry(&mut self) -> Result<Option<CpioEntry<'a>>, CpioError> {
        let magic = self.slice(6, "magic")?;
        if magic != MAGIC_NEWC && magic != MAGIC_CRC {
            return Err(CpioError::BadMagic {
                found: String::from_utf8_lossy(magic).into_owned(),
            });
        }
        self.pos += 6;
        let header = parse_header(self.slice(104, "header")?)?;
        self.pos += 104;

        let namesize = header.namesize as usize;
        if namesize == 0 {
            return Err(CpioError::BadField { field: "namesize" });
        }
        let raw_name = self.slice(namesize, "name")?;
        // namesize includes the trailing NUL.
        let name = String::from_utf8_lossy(&raw_name[..namesize - 1]).into_owned();
        self.pos += namesize;
        self.pos += pad4(6 + 104 + namesize);

        if name == TRAILER {
            return Ok(None);
        }

        let filesize = header.filesize as usize;
        let data = self.slice(filesize, "file data")?;
        self.pos += filesize;
        self.pos += pad4(filesize);

        Ok(Some(CpioEntry { header, name, data }))
    }
}

fn pad4(len: usize) -> usize {
    (4 - len % 4) % 4
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cpio_entry, cpio_trailer};

    #[test]
    fn roundtrip_two_files() {
        let mut archive = Vec::new();
        let header = CpioHeader {
            ino: 7,
            mode: 0o100644,
            nlink: 1,
            mtime: 1_234_567,
            ..Default::default()
        };
        cpio_entry(&mut archive, "./usr/bin/hello", &header, b"hello world");
        cpio_entry(&mut archive, "./etc/empty.conf", &header, b"");
        cpio_trailer(&mut archive);

        let mut reader = CpioReader::new(&archive);
        let first = reader.next_entry().unwrap().unwrap();
        assert_eq!(first.name, "./usr/bin/hello");
        assert_eq!(first.data, b"hello world");
        assert_eq!(first.header.mtime, 1_234_567);
        let second = reader.next_entry().unwrap().unwrap();
        assert_eq!(second.name, "./etc/empty.conf");
        assert_eq!(second.data, b"");
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn rejects_bad_magic() {
        let err = CpioReader::new(b"070700aaaaaaaa").next_entry().unwrap_err();
        assert!(matches!(err, CpioError::BadMagic { .. }));
    }

    #[test]
    fn rejects_non_hex_field() {
        let mut archive = Vec::new();
        archive.extend_from_slice(MAGIC_NEWC);
        archive.extend_from_slice(&[b'z'; 104]);
        archive.extend_from_slice(b"x\0");
        let err = CpioReader::new(&archive).next_entry().unwrap_err();
        assert!(matches!(err, CpioError::BadField { field: "ino" }));
    }

    #[test]
    fn truncated_data_is_an_error() {
        let mut archive = Vec::new();
        let header = CpioHeader {
            nlink: 1,
            ..Default::default()
        };
        cpio_entry(&mut archive, "./file", &header, b"0123456789");
        archive.truncate(archive.len() - 8);
        let mut reader = CpioReader::new(&archive);
        assert!(matches!(
            reader.next_entry().unwrap_err(),
            CpioError::Truncated { .. }
        ));
    }
}
