//! Data extracted from ELF images.

use serde::{Deserialize, Serialize};

/// A defined dynamic symbol (st_shndx != SHN_UNDEF).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElfSymbolDefinition {
    pub symbol_name: String,
    /// Version name from the verdef table, when the symbol is versioned.
    pub vda_name: Option<String>,
    pub value: u64,
    pub section: u16,
    /// True if this is the default version of the symbol.
    pub default_version: bool,
    pub binding: u8,
    pub sym_type: u8,
    pub visibility: u8,
}

/// An undefined dynamic symbol, i.e. a reference to another object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElfSymbolReference {
    pub symbol_name: String,
    /// Version name from the verneed table, when the reference is versioned.
    pub vna_name: Option<String>,
    pub binding: u8,
    pub sym_type: u8,
    pub visibility: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ElfSymbol {
    Definition(ElfSymbolDefinition),
    Reference(ElfSymbolReference),
}

/// st_other visibility name, lower case.
pub fn visibility_name(visibility: u8) -> &'static str {
    match visibility & 0x3 {
        0 => "default",
        1 => "internal",
        2 => "hidden",
        _ => "protected",
    }
}

/// A string-bearing or raw entry from the dynamic section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicEntry {
    Needed(String),
    Soname(String),
    Rpath(String),
    Runpath(String),
    Other { tag: u64, value: u64 },
}

/// One program header table entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub flags: u32,
    pub file_offset: u64,
    pub virt_addr: u64,
    pub phys_addr: u64,
    pub file_size: u64,
    pub memory_size: u64,
    pub align: u64,
}

impl ProgramHeader {
    pub fn readable(&self) -> bool {
        self.flags & 0x4 != 0
    }

    pub fn writable(&self) -> bool {
        self.flags & 0x2 != 0
    }

    pub fn executable(&self) -> bool {
        self.flags & 0x1 != 0
    }
}
