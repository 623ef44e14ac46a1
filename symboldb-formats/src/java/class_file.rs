//! Java class file parser.
//!
//! Only the parts of the format the symbol database needs are decoded: the
//! constant pool (as an offset table), access flags, this/super class, and
//! the interface table. Fields, methods, and attributes are skipped; the
//! constant pool already names every class the bytecode references.

use symboldb_core::errors::JavaClassError;

use crate::bytes::Cursor;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

pub const CONSTANT_UTF8: u8 = 1;
pub const CONSTANT_INTEGER: u8 = 3;
pub const CONSTANT_FLOAT: u8 = 4;
pub const CONSTANT_LONG: u8 = 5;
pub const CONSTANT_DOUBLE: u8 = 6;
pub const CONSTANT_CLASS: u8 = 7;
pub const CONSTANT_STRING: u8 = 8;
pub const CONSTANT_FIELDREF: u8 = 9;
pub const CONSTANT_METHODREF: u8 = 10;
pub const CONSTANT_INTERFACE_METHODREF: u8 = 11;
pub const CONSTANT_NAME_AND_TYPE: u8 = 12;
pub const CONSTANT_METHOD_HANDLE: u8 = 15;
pub const CONSTANT_METHOD_TYPE: u8 = 16;
pub const CONSTANT_DYNAMIC: u8 = 17;
pub const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
pub const CONSTANT_MODULE: u8 = 19;
pub const CONSTANT_PACKAGE: u8 = 20;

const MAGIC: u32 = 0xCAFE_BABE;

/// A parsed Java class file, borrowing the underlying byte buffer.
#[derive(Debug)]
pub struct ClassFile<'a> {
    data: &'a [u8],
    minor_version: u16,
    major_version: u16,
    // Byte offset of each constant pool entry's tag. Index 0 corresponds to
    // pool entry 1. The second slot of a Long or Double holds 0.
    pool_offsets: Vec<usize>,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interface_indexes: Vec<u16>,
}

impl<'a> ClassFile<'a> {
    /// Returns true if the buffer plausibly contains a Java class file.
    pub fn has_signature(data: &[u8]) -> bool {
        if data.len() < 32 {
            return false;
        }
        let mut cur = Cursor::new(data);
        let magic = cur.u32_be().unwrap_or(0);
        let _minor = cur.u16_be().unwrap_or(0);
        let major = cur.u16_be().unwrap_or(u16::MAX);
        magic == MAGIC && major < 100
    }

    pub fn parse(data: &'a [u8]) -> Result<Self, JavaClassError> {
        let mut cur = Cursor::new(data);
        if cur.u32_be()? != MAGIC {
            return Err(JavaClassError::BadMagic);
        }
        let minor_version = cur.u16_be()?;
        let major_version = cur.u16_be()?;

        let pool_count = cur.u16_be()?;
        let mut pool_offsets = Vec::with_capacity(pool_count.saturating_sub(1) as usize);
        let mut i = 1u16;
        while i < pool_count {
            pool_offsets.push(cur.position());
            let tag = cur.u8()?;
            match tag {
                CONSTANT_CLASS | CONSTANT_STRING | CONSTANT_METHOD_TYPE | CONSTANT_MODULE
                | CONSTANT_PACKAGE => cur.skip(2)?,
                CONSTANT_METHOD_HANDLE => cur.skip(3)?,
                CONSTANT_FIELDREF
                | CONSTANT_METHODREF
                | CONSTANT_INTERFACE_METHODREF
                | CONSTANT_INTEGER
                | CONSTANT_FLOAT
                | CONSTANT_NAME_AND_TYPE
                | CONSTANT_DYNAMIC
                | CONSTANT_INVOKE_DYNAMIC => cur.skip(4)?,
                CONSTANT_LONG | CONSTANT_DOUBLE => {
                    cur.skip(8)?;
                    // Longs and doubles take two pool slots.
                    pool_offsets.push(0);
                    i += 1;
                }
                CONSTANT_UTF8 => {
                    let len = cur.u16_be()?;
                    cur.skip(len as usize)?;
                }
                _ => {
                    return Err(JavaClassError::InvalidConstantPoolTag { tag, index: i });
                }
            }
            i += 1;
        }

        let access_flags = cur.u16_be()?;
        let this_class = cur.u16_be()?;
        let super_class = cur.u16_be()?;

        let iface_count = cur.u16_be()?;
        let mut interface_indexes = Vec::with_capacity(iface_count as usize);
        for _ in 0..iface_count {
            interface_indexes.push(cur.u16_be()?);
        }

        Ok(ClassFile {
            data,
            minor_version,
            major_version,
            pool_offsets,
            access_flags,
            this_class,
            super_class,
            interface_indexes,
        })
    }

    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    pub fn access_flags(&self) -> u16 {
        self.access_flags
    }

    /// Internal name of this class, e.g. `com/example/Foo`.
    pub fn this_class(&self) -> Result<String, JavaClassError> {
        self.class_name(self.this_class)
    }

    /// Internal name of the superclass. `None` for `java/lang/Object`.
    pub fn super_class(&self) -> Result<Option<String>, JavaClassError> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.class_name(self.super_class).map(Some)
    }

    pub fn interface_count(&self) -> usize {
        self.interface_indexes.len()
    }

    pub fn interface(&self, index: usize) -> Result<String, JavaClassError> {
        let pool_index =
            *self
                .interface_indexes
                .get(index)
                .ok_or(JavaClassError::ConstantPoolIndexOutOfRange {
                    index: index as u16,
                })?;
        self.class_name(pool_index)
    }

    /// Names of all implemented interfaces, in declaration order.
    pub fn interfaces(&self) -> Result<Vec<String>, JavaClassError> {
        self.interface_indexes
            .iter()
            .map(|&idx| self.class_name(idx))
            .collect()
    }

    /// Names of all classes referenced from the constant pool, in pool
    /// order. Includes this class itself.
    pub fn class_references(&self) -> Result<Vec<String>, JavaClassError> {
        let mut result = Vec::new();
        for &offset in &self.pool_offsets {
            if offset != 0 && self.data.get(offset) == Some(&CONSTANT_CLASS) {
                let mut cur = Cursor::at(self.data, offset + 1);
                let name_idx = cur.u16_be()?;
                result.push(self.utf8(name_idx)?);
            }
        }
        Ok(result)
    }

    fn entry(&self, index: u16, expected: u8) -> Result<Cursor<'a>, JavaClassError> {
        if index == 0 {
            return Err(JavaClassError::ZeroConstantPoolIndex);
        }
        let offset = *self
            .pool_offsets
            .get(index as usize - 1)
            .ok_or(JavaClassError::ConstantPoolIndexOutOfRange { index })?;
        if offset == 0 {
            // Second slot of a Long/Double.
            return Err(JavaClassError::ConstantPoolIndexOutOfRange { index });
        }
        let mut cur = Cursor::at(self.data, offset);
        let tag = cur.u8()?;
        if tag != expected {
            return Err(JavaClassError::WrongConstantTag {
                index,
                expected,
                found: tag,
            });
        }
        Ok(cur)
    }

    fn class_name(&self, index: u16) -> Result<String, JavaClassError> {
        let mut cur = self.entry(index, CONSTANT_CLASS)?;
        let name_idx = cur.u16_be()?;
        self.utf8(name_idx)
    }

    fn utf8(&self, index: u16) -> Result<String, JavaClassError> {
        let mut cur = self.entry(index, CONSTANT_UTF8)?;
        let len = cur.u16_be()?;
        let raw = cur.take(len as usize)?;
        // Class file strings are modified UTF-8; plain UTF-8 covers every
        // name that can occur in class and interface references.
        String::from_utf8(raw.to_vec()).map_err(|_| JavaClassError::InvalidUtf8 { index })
    }
}
