//! ELF image parser.
//!
//! Handles 32- and 64-bit images in either byte order. Symbol and dynamic
//! data is located through the section header table, which is present in
//! every object a packaged distribution ships.

use symboldb_core::errors::ElfError;

use super::symbols::{
    DynamicEntry, ElfSymbol, ElfSymbolDefinition, ElfSymbolReference, ProgramHeader,
};

pub const ELFCLASS32: u8 = 1;
pub const ELFCLASS64: u8 = 2;
pub const ELFDATA2LSB: u8 = 1;
pub const ELFDATA2MSB: u8 = 2;

pub const ET_EXEC: u16 = 2;
pub const ET_DYN: u16 = 3;

const SHT_NOTE: u32 = 7;
const SHT_DYNAMIC: u32 = 6;
const SHT_DYNSYM: u32 = 11;
const SHT_GNU_VERDEF: u32 = 0x6fff_fffd;
const SHT_GNU_VERNEED: u32 = 0x6fff_fffe;
const SHT_GNU_VERSYM: u32 = 0x6fff_ffff;

const SHN_UNDEF: u16 = 0;

const DT_NEEDED: u64 = 1;
const DT_SONAME: u64 = 14;
const DT_RPATH: u64 = 15;
const DT_RUNPATH: u64 = 29;

const NT_GNU_BUILD_ID: u32 = 3;

const VERSYM_HIDDEN: u16 = 0x8000;
const VERSYM_VERSION: u16 = 0x7fff;

/// Bounds-checked multi-endian reads at absolute offsets.
#[derive(Clone, Copy)]
struct Raw<'a> {
    data: &'a [u8],
    le: bool,
}

impl<'a> Raw<'a> {
    fn bytes(&self, offset: usize, len: usize, what: &'static str) -> Result<&'a [u8], ElfError> {
        self.data
            .get(offset..offset.checked_add(len).ok_or(ElfError::Truncated { what })?)
            .ok_or(ElfError::Truncated { what })
    }

    fn u16(&self, offset: usize, what: &'static str) -> Result<u16, ElfError> {
        let b = self.bytes(offset, 2, what)?;
        Ok(if self.le {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        })
    }

    fn u32(&self, offset: usize, what: &'static str) -> Result<u32, ElfError> {
        let b = self.bytes(offset, 4, what)?;
        Ok(if self.le {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        })
    }

    fn u64(&self, offset: usize, what: &'static str) -> Result<u64, ElfError> {
        let b = self.bytes(offset, 8, what)?;
        let arr = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        Ok(if self.le {
            u64::from_le_bytes(arr)
        } else {
            u64::from_be_bytes(arr)
        })
    }

    /// A word-sized value: 4 bytes on ELFCLASS32, 8 on ELFCLASS64.
    fn word(&self, offset: usize, wide: bool, what: &'static str) -> Result<u64, ElfError> {
        if wide {
            self.u64(offset, what)
        } else {
            self.u32(offset, what).map(u64::from)
        }
    }
}

#[derive(Debug, Clone)]
struct Section {
    sh_type: u32,
    offset: usize,
    size: usize,
    link: u32,
    entsize: usize,
}

/// A parsed ELF image borrowing the underlying buffer.
pub struct ElfImage<'a> {
    raw: Raw<'a>,
    ei_class: u8,
    ei_data: u8,
    e_type: u16,
    e_machine: u16,
    phoff: usize,
    phentsize: usize,
    phnum: usize,
    sections: Vec<Section>,
}

impl<'a> ElfImage<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, ElfError> {
        if data.len() < 16 || data[..4] != [0x7f, b'E', b'L', b'F'] {
            return Err(ElfError::BadMagic);
        }
        let ei_class = data[4];
        if ei_class != ELFCLASS32 && ei_class != ELFCLASS64 {
            return Err(ElfError::UnsupportedClass { class: ei_class });
        }
        let ei_data = data[5];
        if ei_data != ELFDATA2LSB && ei_data != ELFDATA2MSB {
            return Err(ElfError::UnsupportedEncoding { encoding: ei_data });
        }
        let raw = Raw {
            data,
            le: ei_data == ELFDATA2LSB,
        };
        let wide = ei_class == ELFCLASS64;

        let e_type = raw.u16(16, "ELF header")?;
        let e_machine = raw.u16(18, "ELF header")?;
        // e_version (4), e_entry (word), then the table locations.
        let after_entry = 24 + if wide { 8 } else { 4 };
        let phoff = raw.word(after_entry, wide, "ELF header")? as usize;
        let shoff = raw.word(after_entry + if wide { 8 } else { 4 }, wide, "ELF header")? as usize;
        let tail = after_entry + if wide { 16 } else { 8 } + 4; // past e_flags
        let phentsize = raw.u16(tail + 2, "ELF header")? as usize;
        let phnum = raw.u16(tail + 4, "ELF header")? as usize;
        let shentsize = raw.u16(tail + 6, "ELF header")? as usize;
        let shnum = raw.u16(tail + 8, "ELF header")? as usize;

        let mut sections = Vec::with_capacity(shnum);
        for i in 0..shnum {
            let base = shoff + i * shentsize;
            let sh_type = raw.u32(base + 4, "section header")?;
            let (offset, size, link, entsize) = if wide {
                (
                    raw.u64(base + 24, "section header")? as usize,
                    raw.u64(base + 32, "section header")? as usize,
                    raw.u32(base + 40, "section header")?,
                    raw.u64(base + 56, "section header")? as usize,
                )
            } else {
                (
                    raw.u32(base + 16, "section header")? as usize,
                    raw.u32(base + 20, "section header")? as usize,
                    raw.u32(base + 24, "section header")?,
                    raw.u32(base + 36, "section header")? as usize,
                )
            };
            sections.push(Section {
                sh_type,
                offset,
                size,
                link,
                entsize,
            });
        }

        Ok(ElfImage {
            raw,
            ei_class,
            ei_data,
            e_type,
            e_machine,
            phoff,
            phentsize,
            phnum,
            sections,
        })
    }

    pub fn ei_class(&self) -> u8 {
        self.ei_class
    }

    pub fn ei_data(&self) -> u8 {
        self.ei_data
    }

    pub fn e_type(&self) -> u16 {
        self.e_type
    }

    pub fn e_machine(&self) -> u16 {
        self.e_machine
    }

    /// Architecture name derived from e_machine, following RPM naming.
    /// `None` when the machine is not one the distribution ships.
    pub fn arch(&self) -> Option<&'static str> {
        // (machine, 32-bit name, 64-bit name)
        const ARCHLIST: &[(u16, Option<&str>, Option<&str>)] = &[
            (3, Some("i386"), None),             // EM_386
            (2, Some("sparc"), None),            // EM_SPARC
            (43, None, Some("sparc64")),         // EM_SPARCV9
            (20, Some("ppc"), None),             // EM_PPC
            (21, None, Some("ppc64")),           // EM_PPC64
            (22, Some("s390"), Some("s390x")),   // EM_S390
            (62, None, Some("x86_64")),          // EM_X86_64
            (40, Some("arm"), None),             // EM_ARM
            (183, None, Some("aarch64")),        // EM_AARCH64
        ];
        let entry = ARCHLIST.iter().find(|&&(m, _, _)| m == self.e_machine)?;
        if self.ei_class == ELFCLASS64 {
            entry.2
        } else {
            entry.1
        }
    }

    pub fn program_headers(&self) -> Result<Vec<ProgramHeader>, ElfError> {
        let wide = self.ei_class == ELFCLASS64;
        let mut result = Vec::with_capacity(self.phnum);
        for i in 0..self.phnum {
            let base = self.phoff + i * self.phentsize;
            let p_type = self.raw.u32(base, "program header")?;
            let header = if wide {
                ProgramHeader {
                    p_type,
                    flags: self.raw.u32(base + 4, "program header")?,
                    file_offset: self.raw.u64(base + 8, "program header")?,
                    virt_addr: self.raw.u64(base + 16, "program header")?,
                    phys_addr: self.raw.u64(base + 24, "program header")?,
                    file_size: self.raw.u64(base + 32, "program header")?,
                    memory_size: self.raw.u64(base + 40, "program header")?,
                    align: self.raw.u64(base + 48, "program header")?,
                }
            } else {
                ProgramHeader {
                    p_type,
                    file_offset: self.raw.u32(base + 4, "program header")?.into(),
                    virt_addr: self.raw.u32(base + 8, "program header")?.into(),
                    phys_addr: self.raw.u32(base + 12, "program header")?.into(),
                    file_size: self.raw.u32(base + 16, "program header")?.into(),
                    memory_size: self.raw.u32(base + 20, "program header")?.into(),
                    flags: self.raw.u32(base + 24, "program header")?,
                    align: self.raw.u32(base + 28, "program header")?.into(),
                }
            };
            result.push(header);
        }
        Ok(result)
    }

    /// The GNU build ID, if the image carries one.
    pub fn build_id(&self) -> Result<Option<Vec<u8>>, ElfError> {
        for section in &self.sections {
            if section.sh_type != SHT_NOTE {
                continue;
            }
            let notes = self.raw.bytes(section.offset, section.size, "note section")?;
            let mut pos = 0usize;
            while pos + 12 <= notes.len() {
                let local = Raw {
                    data: notes,
                    le: self.raw.le,
                };
                let namesz = local.u32(pos, "note")? as usize;
                let descsz = local.u32(pos + 4, "note")? as usize;
                let n_type = local.u32(pos + 8, "note")?;
                pos += 12;
                let name = notes
                    .get(pos..pos + namesz)
                    .ok_or(ElfError::Truncated { what: "note name" })?;
                pos += namesz.next_multiple_of(4);
                let desc = notes
                    .get(pos..pos + descsz)
                    .ok_or(ElfError::Truncated { what: "note descriptor" })?;
                pos += descsz.next_multiple_of(4);
                if n_type == NT_GNU_BUILD_ID && name == b"GNU\0" {
                    return Ok(Some(desc.to_vec()));
                }
            }
        }
        Ok(None)
    }

    fn section_of_type(&self, sh_type: u32) -> Option<&Section> {
        self.sections.iter().find(|s| s.sh_type == sh_type)
    }

    fn string_at(&self, table: &Section, offset: usize) -> Result<String, ElfError> {
        if offset >= table.size {
            return Err(ElfError::BadStringOffset { offset });
        }
        let bytes = self
            .raw
            .bytes(table.offset + offset, table.size - offset, "string table")?;
        let nul = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or(ElfError::UnterminatedString { offset })?;
        Ok(String::from_utf8_lossy(&bytes[..nul]).into_owned())
    }

    fn linked_strtab(&self, section: &Section) -> Result<&Section, ElfError> {
        self.sections
            .get(section.link as usize)
            .ok_or(ElfError::Truncated { what: "string table section" })
    }

    /// Entries of the dynamic section, in file order. String-valued tags
    /// are resolved against the dynamic string table.
    pub fn dynamic_entries(&self) -> Result<Vec<DynamicEntry>, ElfError> {
        let Some(dynamic) = self.section_of_type(SHT_DYNAMIC) else {
            return Ok(Vec::new());
        };
        let strtab = self.linked_strtab(dynamic)?;
        let wide = self.ei_class == ELFCLASS64;
        let entsize = if dynamic.entsize != 0 {
            dynamic.entsize
        } else if wide {
            16
        } else {
            8
        };
        let mut result = Vec::new();
        let count = dynamic.size / entsize;
        for i in 0..count {
            let base = dynamic.offset + i * entsize;
            let tag = self.raw.word(base, wide, "dynamic entry")?;
            let value = self
                .raw
                .word(base + if wide { 8 } else { 4 }, wide, "dynamic entry")?;
            if tag == 0 {
                break; // DT_NULL
            }
            let entry = match tag {
                DT_NEEDED => DynamicEntry::Needed(self.string_at(strtab, value as usize)?),
                DT_SONAME => DynamicEntry::Soname(self.string_at(strtab, value as usize)?),
                DT_RPATH => DynamicEntry::Rpath(self.string_at(strtab, value as usize)?),
                DT_RUNPATH => DynamicEntry::Runpath(self.string_at(strtab, value as usize)?),
                _ => DynamicEntry::Other { tag, value },
            };
            result.push(entry);
        }
        Ok(result)
    }

    /// The dynamic symbol table, split into definitions and references,
    /// with symbol versions resolved.
    pub fn dynamic_symbols(&self) -> Result<Vec<ElfSymbol>, ElfError> {
        let Some(dynsym) = self.section_of_type(SHT_DYNSYM) else {
            return Ok(Vec::new());
        };
        let strtab = self.linked_strtab(dynsym)?;
        let wide = self.ei_class == ELFCLASS64;
        let entsize = if dynsym.entsize != 0 {
            dynsym.entsize
        } else if wide {
            24
        } else {
            16
        };
        let count = dynsym.size / entsize;

        let versym = self.versym_table(count)?;
        let verdef = self.version_definitions()?;
        let verneed = self.version_needs()?;

        let mut result = Vec::with_capacity(count.saturating_sub(1));
        // Index 0 is the reserved null symbol.
        for i in 1..count {
            let base = dynsym.offset + i * entsize;
            let (name_off, info, other, shndx, value) = if wide {
                (
                    self.raw.u32(base, "symbol")? as usize,
                    self.raw.bytes(base + 4, 1, "symbol")?[0],
                    self.raw.bytes(base + 5, 1, "symbol")?[0],
                    self.raw.u16(base + 6, "symbol")?,
                    self.raw.u64(base + 8, "symbol")?,
                )
            } else {
                (
                    self.raw.u32(base, "symbol")? as usize,
                    self.raw.bytes(base + 12, 1, "symbol")?[0],
                    self.raw.bytes(base + 13, 1, "symbol")?[0],
                    self.raw.u16(base + 14, "symbol")?,
                    self.raw.u32(base + 4, "symbol")?.into(),
                )
            };
            let symbol_name = self.string_at(strtab, name_off)?;
            let binding = info >> 4;
            let sym_type = info & 0xf;
            let visibility = other & 0x3;
            let version = versym.as_ref().map(|v| v[i]);
            let version_index = version.map(|v| v & VERSYM_VERSION).unwrap_or(0);
            let hidden = version.map(|v| v & VERSYM_HIDDEN != 0).unwrap_or(false);

            if shndx == SHN_UNDEF {
                let vna_name = if version_index >= 2 {
                    verneed.get(&version_index).cloned()
                } else {
                    None
                };
                result.push(ElfSymbol::Reference(ElfSymbolReference {
                    symbol_name,
                    vna_name,
                    binding,
                    sym_type,
                    visibility,
                }));
            } else {
                let vda_name = if version_index >= 2 {
                    verdef.get(&version_index).cloned()
                } else {
                    None
                };
                result.push(ElfSymbol::Definition(ElfSymbolDefinition {
                    symbol_name,
                    default_version: vda_name.is_some() && !hidden,
                    vda_name,
                    value,
                    section: shndx,
                    binding,
                    sym_type,
                    visibility,
                }));
            }
        }
        Ok(result)
    }

    fn versym_table(&self, count: usize) -> Result<Option<Vec<u16>>, ElfError> {
        let Some(section) = self.section_of_type(SHT_GNU_VERSYM) else {
            return Ok(None);
        };
        let mut table = Vec::with_capacity(count);
        for i in 0..count {
            table.push(self.raw.u16(section.offset + i * 2, "versym")?);
        }
        Ok(Some(table))
    }

    /// version index -> version name, from the verdef chain.
    fn version_definitions(
        &self,
    ) -> Result<std::collections::HashMap<u16, String>, ElfError> {
        let mut map = std::collections::HashMap::new();
        let Some(section) = self.section_of_type(SHT_GNU_VERDEF) else {
            return Ok(map);
        };
        let strtab = self.linked_strtab(section)?;
        let mut pos = section.offset;
        loop {
            let ndx = self.raw.u16(pos + 4, "verdef")?;
            let aux_off = self.raw.u32(pos + 12, "verdef")? as usize;
            let next = self.raw.u32(pos + 16, "verdef")? as usize;
            let name_off = self.raw.u32(pos + aux_off, "verdef aux")? as usize;
            map.insert(ndx & VERSYM_VERSION, self.string_at(strtab, name_off)?);
            if next == 0 {
                break;
            }
            pos += next;
        }
        Ok(map)
    }

    /// version index -> version name, from the verneed chain.
    fn version_needs(&self) -> Result<std::collections::HashMap<u16, String>, ElfError> {
        let mut map = std::collections::HashMap::new();
        let Some(section) = self.section_of_type(SHT_GNU_VERNEED) else {
            return Ok(map);
        };
        let strtab = self.linked_strtab(section)?;
        let mut pos = section.offset;
        loop {
            let aux_count = self.raw.u16(pos + 2, "verneed")?;
            let aux_off = self.raw.u32(pos + 8, "verneed")? as usize;
            let next = self.raw.u32(pos + 12, "verneed")? as usize;
            let mut aux_pos = pos + aux_off;
            for _ in 0..aux_count {
                let other = self.raw.u16(aux_pos + 6, "vernaux")?;
                let name_off = self.raw.u32(aux_pos + 8, "vernaux")? as usize;
                let aux_next = self.raw.u32(aux_pos + 12, "vernaux")? as usize;
                map.insert(other & VERSYM_VERSION, self.string_at(strtab, name_off)?);
                if aux_next == 0 {
                    break;
                }
                aux_pos += aux_next;
            }
            if next == 0 {
                break;
            }
            pos += next;
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_elf64, ElfSpec};

    fn sample() -> Vec<u8> {
        build_elf64(&ElfSpec {
            soname: Some("libdemo.so.1"),
            needed: vec!["libc.so.6", "libm.so.6"],
            runpath: Some("/opt/demo/lib"),
            definitions: vec![("demo_init", 0x1040), ("demo_run", 0x10a0)],
            references: vec!["malloc", "free"],
            build_id: Some(b"\x01\x02\x03\x04\x05\x06\x07\x08"),
        })
    }

    #[test]
    fn header_facts() {
        let data = sample();
        let image = ElfImage::parse(&data).unwrap();
        assert_eq!(image.ei_class(), ELFCLASS64);
        assert_eq!(image.ei_data(), ELFDATA2LSB);
        assert_eq!(image.e_type(), ET_DYN);
        assert_eq!(image.arch(), Some("x86_64"));
        assert!(image.program_headers().unwrap().is_empty());
    }

    #[test]
    fn dynamic_entries_resolve_strings() {
        let data = sample();
        let image = ElfImage::parse(&data).unwrap();
        let entries = image.dynamic_entries().unwrap();
        assert!(entries.contains(&DynamicEntry::Soname("libdemo.so.1".into())));
        assert!(entries.contains(&DynamicEntry::Needed("libc.so.6".into())));
        assert!(entries.contains(&DynamicEntry::Needed("libm.so.6".into())));
        assert!(entries.contains(&DynamicEntry::Runpath("/opt/demo/lib".into())));
        // DT_SYMTAB is preserved as an opaque entry; DT_NULL terminates.
        assert!(entries
            .iter()
            .any(|e| matches!(e, DynamicEntry::Other { tag: 6, .. })));
    }

    #[test]
    fn symbols_split_into_definitions_and_references() {
        let data = sample();
        let image = ElfImage::parse(&data).unwrap();
        let symbols = image.dynamic_symbols().unwrap();
        assert_eq!(symbols.len(), 4);
        let defs: Vec<_> = symbols
            .iter()
            .filter_map(|s| match s {
                ElfSymbol::Definition(d) => Some(d),
                _ => None,
            })
            .collect();
        let refs: Vec<_> = symbols
            .iter()
            .filter_map(|s| match s {
                ElfSymbol::Reference(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(defs.len(), 2);
        assert_eq!(refs.len(), 2);
        assert_eq!(defs[0].symbol_name, "demo_init");
        assert_eq!(defs[0].value, 0x1040);
        assert!(!defs[0].default_version);
        assert_eq!(refs[0].symbol_name, "malloc");
        assert!(refs[0].vna_name.is_none());
    }

    #[test]
    fn build_id_extraction() {
        let data = sample();
        let image = ElfImage::parse(&data).unwrap();
        assert_eq!(
            image.build_id().unwrap(),
            Some(vec![1, 2, 3, 4, 5, 6, 7, 8])
        );
        let without = build_elf64(&ElfSpec::default());
        let image = ElfImage::parse(&without).unwrap();
        assert_eq!(image.build_id().unwrap(), None);
    }

    #[test]
    fn rejects_truncated_and_foreign_data() {
        assert!(matches!(
            ElfImage::parse(b"\x7fELF"),
            Err(ElfError::BadMagic)
        ));
        assert!(matches!(
            ElfImage::parse(b"not an elf image at all......."),
            Err(ElfError::BadMagic)
        ));
        let mut bad = sample();
        bad[4] = 9;
        assert!(matches!(
            ElfImage::parse(&bad),
            Err(ElfError::UnsupportedClass { class: 9 })
        ));
        // Cut the section header table short.
        let full = sample();
        assert!(ElfImage::parse(&full[..200]).is_err());
    }
}
