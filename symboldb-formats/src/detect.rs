//! Cheap content classification used to route payload files to parsers.

/// Returns true if the file starts with the ELF magic bytes.
pub fn is_elf(data: &[u8]) -> bool {
    data.len() > 4 && data[0] == 0x7f && data[1] == b'E' && data[2] == b'L' && data[3] == b'F'
}

/// Returns true if the content could be the start of an XML document:
/// optional UTF-8 byte order mark, XML whitespace, then `<`.
pub fn looks_like_xml(data: &[u8]) -> bool {
    let mut rest = data;
    if let Some(stripped) = rest.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        rest = stripped;
    } else if rest.first() == Some(&0xEF) {
        return false;
    }
    for &ch in rest {
        match ch {
            b'<' => return true,
            0x20 | 0x09 | 0x0D | 0x0A => continue,
            _ => return false,
        }
    }
    false
}

/// Returns true if the file looks like a Python program. There is no clear
/// signature, so this checks for a shebang line mentioning python.
pub fn is_python(data: &[u8]) -> bool {
    if data.len() <= 10 || data[0] != b'#' {
        return false;
    }
    let head = &data[..data.len().min(100)];
    head.windows(6).any(|w| w == b"python")
}

/// Returns true if the path names a Python source file.
pub fn is_python_path(name: &str) -> bool {
    name.ends_with(".py")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elf_magic() {
        assert!(is_elf(b"\x7fELF\x02\x01\x01"));
        assert!(!is_elf(b"\x7fELF"));
        assert!(!is_elf(b"#!/bin/sh\n"));
    }

    #[test]
    fn xml_detection() {
        assert!(looks_like_xml(b"<?xml version=\"1.0\"?>"));
        assert!(looks_like_xml(b"  \n\t<project/>"));
        assert!(looks_like_xml(b"\xEF\xBB\xBF<a/>"));
        assert!(!looks_like_xml(b"plain text"));
        assert!(!looks_like_xml(b"\xEF\xBBbroken"));
        assert!(!looks_like_xml(b""));
    }

    #[test]
    fn python_detection() {
        assert!(is_python(b"#!/usr/bin/python\nprint(1)\n"));
        assert!(is_python(b"#!/usr/bin/env python3\n"));
        assert!(!is_python(b"#!/bin/sh\necho hello\n"));
        assert!(is_python_path("foo/bar.py"));
        assert!(!is_python_path("foo/bar.pyc"));
    }
}
