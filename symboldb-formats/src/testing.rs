//! Builders for synthetic archives and packages.
//!
//! Real RPM, ZIP, and class-file fixtures are too unwieldy to check in, so
//! the test suites assemble inputs byte by byte. Shared here because the
//! storage and repo crates exercise the same formats end to end.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write as _;

use symboldb_core::checksum::{hash_bytes, Checksum, HashKind};

use crate::cpio::{CpioHeader, MAGIC_NEWC};
use crate::rpm::header::{
    HEADER_MAGIC, TYPE_INT16, TYPE_INT32, TYPE_STRING, TYPE_STRING_ARRAY,
};
use crate::rpm::tags::*;

// ---- cpio ----

fn pad4(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Append one newc entry.
pub fn cpio_entry(out: &mut Vec<u8>, name: &str, header: &CpioHeader, data: &[u8]) {
    out.extend_from_slice(MAGIC_NEWC);
    let namesize = name.len() as u32 + 1;
    for value in [
        header.ino,
        header.mode,
        header.uid,
        header.gid,
        header.nlink,
        header.mtime,
        data.len() as u32,
        header.devmajor,
        header.devminor,
        header.rdevmajor,
        header.rdevminor,
        namesize,
        header.check,
    ] {
        out.extend_from_slice(format!("{value:08x}").as_bytes());
    }
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    let header_len = 6 + 104 + namesize as usize;
    out.resize(out.len() + pad4(header_len), 0);
    out.extend_from_slice(data);
    out.resize(out.len() + pad4(data.len()), 0);
}

/// Append the archive trailer.
pub fn cpio_trailer(out: &mut Vec<u8>) {
    cpio_entry(out, "TRAILER!!!", &CpioHeader::default(), b"");
}

// ---- ZIP ----

/// Build a ZIP archive of stored (uncompressed) entries.
pub fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();
    for (name, data) in files {
        let offset = out.len() as u32;
        let crc = crc32(data);
        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // stored
        out.extend_from_slice(&0u32.to_le_bytes()); // time/date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes()); // made by
        central.extend_from_slice(&20u16.to_le_bytes()); // needed
        central.extend_from_slice(&0u16.to_le_bytes()); // flags
        central.extend_from_slice(&0u16.to_le_bytes()); // stored
        central.extend_from_slice(&0u32.to_le_bytes()); // time/date
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes()); // extra
        central.extend_from_slice(&0u16.to_le_bytes()); // comment
        central.extend_from_slice(&0u16.to_le_bytes()); // disk
        central.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        central.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }
    let cd_offset = out.len() as u32;
    let cd_size = central.len() as u32;
    out.extend_from_slice(&central);
    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(files.len() as u16).to_le_bytes());
    out.extend_from_slice(&(files.len() as u16).to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // comment length
    out
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

// ---- Java class files ----

/// Build a class file with the given this/super/interface names and extra
/// class references, mirroring what javac emits for a simple class.
pub fn build_class_file(
    this_class: &str,
    super_class: &str,
    interfaces: &[&str],
    extra_references: &[&str],
) -> Vec<u8> {
    // Pool layout: for every class name, a CONSTANT_Utf8 followed by a
    // CONSTANT_Class referencing it. A Long and a Double pad the pool to
    // exercise the two-slot rule.
    let mut names: Vec<&str> = vec![this_class, super_class];
    names.extend_from_slice(interfaces);
    names.extend_from_slice(extra_references);

    let mut pool: Vec<u8> = Vec::new();
    let mut class_indexes = Vec::new();
    let mut next_index: u16 = 1;
    for name in &names {
        pool.push(1); // CONSTANT_Utf8
        pool.extend_from_slice(&(name.len() as u16).to_be_bytes());
        pool.extend_from_slice(name.as_bytes());
        let utf8_index = next_index;
        next_index += 1;
        pool.push(7); // CONSTANT_Class
        pool.extend_from_slice(&utf8_index.to_be_bytes());
        class_indexes.push(next_index);
        next_index += 1;
    }
    pool.push(5); // CONSTANT_Long, takes two slots
    pool.extend_from_slice(&125_000_000_000i64.to_be_bytes());
    next_index += 2;
    pool.push(6); // CONSTANT_Double, takes two slots
    pool.extend_from_slice(&9.094947017729282e-13f64.to_be_bytes());
    next_index += 2;

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // minor
    out.extend_from_slice(&52u16.to_be_bytes()); // major (Java 8)
    out.extend_from_slice(&next_index.to_be_bytes()); // pool count
    out.extend_from_slice(&pool);
    out.extend_from_slice(&0x0031u16.to_be_bytes()); // public final super
    out.extend_from_slice(&class_indexes[0].to_be_bytes());
    out.extend_from_slice(&class_indexes[1].to_be_bytes());
    out.extend_from_slice(&(interfaces.len() as u16).to_be_bytes());
    for i in 0..interfaces.len() {
        out.extend_from_slice(&class_indexes[2 + i].to_be_bytes());
    }
    // Empty field, method, and attribute tables.
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out
}

// ---- RPM ----

/// Header builder operating directly on index entries and a store.
#[derive(Default)]
pub struct HeaderBuilder {
    entries: Vec<(u32, u32, u32, u32)>,
    store: Vec<u8>,
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn align(&mut self, align: usize) {
        while self.store.len() % align != 0 {
            self.store.push(0);
        }
    }

    pub fn string(&mut self, tag: u32, value: &str) -> &mut Self {
        let offset = self.store.len() as u32;
        self.store.extend_from_slice(value.as_bytes());
        self.store.push(0);
        self.entries.push((tag, TYPE_STRING, offset, 1));
        self
    }

    pub fn string_array(&mut self, tag: u32, values: &[&str]) -> &mut Self {
        let offset = self.store.len() as u32;
        for value in values {
            self.store.extend_from_slice(value.as_bytes());
            self.store.push(0);
        }
        self.entries
            .push((tag, TYPE_STRING_ARRAY, offset, values.len() as u32));
        self
    }

    pub fn u16_array(&mut self, tag: u32, values: &[u16]) -> &mut Self {
        self.align(2);
        let offset = self.store.len() as u32;
        for value in values {
            self.store.extend_from_slice(&value.to_be_bytes());
        }
        self.entries
            .push((tag, TYPE_INT16, offset, values.len() as u32));
        self
    }

    pub fn u32_array(&mut self, tag: u32, values: &[u32]) -> &mut Self {
        self.align(4);
        let offset = self.store.len() as u32;
        for value in values {
            self.store.extend_from_slice(&value.to_be_bytes());
        }
        self.entries
            .push((tag, TYPE_INT32, offset, values.len() as u32));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&HEADER_MAGIC);
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        out.extend_from_slice(&(self.store.len() as u32).to_be_bytes());
        for &(tag, ty, offset, count) in &self.entries {
            out.extend_from_slice(&tag.to_be_bytes());
            out.extend_from_slice(&ty.to_be_bytes());
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
        }
        out.extend_from_slice(&self.store);
        out
    }
}

/// One file inside a synthetic RPM.
pub struct FileSpec {
    pub dir: &'static str,
    pub base: &'static str,
    pub mode: u16,
    pub ino: u32,
    pub data: Vec<u8>,
    pub link_to: &'static str,
}

impl FileSpec {
    pub fn regular(dir: &'static str, base: &'static str, data: impl Into<Vec<u8>>) -> Self {
        FileSpec {
            dir,
            base,
            mode: 0o100644,
            ino: 0,
            data: data.into(),
            link_to: "",
        }
    }

    pub fn directory(dir: &'static str, base: &'static str) -> Self {
        FileSpec {
            dir,
            base,
            mode: 0o040755,
            ino: 0,
            data: Vec::new(),
            link_to: "",
        }
    }

    pub fn symlink(dir: &'static str, base: &'static str, target: &'static str) -> Self {
        FileSpec {
            dir,
            base,
            mode: 0o120777,
            ino: 0,
            data: target.as_bytes().to_vec(),
            link_to: target,
        }
    }
}

/// Build a loadable RPM image. File digests are SHA-256 so the load
/// pipeline can verify them.
pub fn build_rpm(
    name: &str,
    arch: &str,
    source_rpm: Option<&str>,
    files: &[FileSpec],
) -> Vec<u8> {
    let mut dirs: Vec<&str> = Vec::new();
    for f in files {
        if !dirs.contains(&f.dir) {
            dirs.push(f.dir);
        }
    }
    let basenames: Vec<&str> = files.iter().map(|f| f.base).collect();
    let dirindexes: Vec<u32> = files
        .iter()
        .map(|f| dirs.iter().position(|d| *d == f.dir).unwrap() as u32)
        .collect();
    let modes: Vec<u16> = files.iter().map(|f| f.mode).collect();
    let mtimes: Vec<u32> = files.iter().map(|_| 1_400_000_000).collect();
    let inodes: Vec<u32> = files
        .iter()
        .enumerate()
        .map(|(i, f)| if f.ino != 0 { f.ino } else { 1000 + i as u32 })
        .collect();
    let devices: Vec<u32> = files.iter().map(|_| 1).collect();
    let flags: Vec<u32> = files.iter().map(|_| 0).collect();
    let users: Vec<&str> = files.iter().map(|_| "root").collect();
    let groups: Vec<&str> = files.iter().map(|_| "root").collect();
    let digests: Vec<String> = files
        .iter()
        .map(|f| {
            if f.mode & 0o170000 == 0o100000 {
                Checksum::of(HashKind::Sha256, &f.data).to_hex()
            } else {
                String::new()
            }
        })
        .collect();
    let digest_refs: Vec<&str> = digests.iter().map(String::as_str).collect();
    let links: Vec<&str> = files.iter().map(|f| f.link_to).collect();

    let mut builder = HeaderBuilder::new();
    builder
        .string(RPMTAG_NAME, name)
        .string(RPMTAG_VERSION, "1.0")
        .string(RPMTAG_RELEASE, "1")
        .string(RPMTAG_ARCH, arch)
        .string(RPMTAG_BUILDHOST, "builder.example.com")
        .string(RPMTAG_SUMMARY, "test package")
        .string(RPMTAG_DESCRIPTION, "a package built by the test suite")
        .string(RPMTAG_LICENSE, "MIT")
        .string(RPMTAG_GROUP, "Development/Tools")
        .u32_array(RPMTAG_BUILDTIME, &[1_400_000_000])
        .string(RPMTAG_PAYLOADFORMAT, "cpio")
        .string(RPMTAG_PAYLOADCOMPRESSOR, "gzip")
        .u32_array(RPMTAG_FILEDIGESTALGO, &[PGPHASHALGO_SHA256])
        .string_array(RPMTAG_BASENAMES, &basenames)
        .string_array(RPMTAG_DIRNAMES, &dirs)
        .u32_array(RPMTAG_DIRINDEXES, &dirindexes)
        .u16_array(RPMTAG_FILEMODES, &modes)
        .u32_array(RPMTAG_FILEMTIMES, &mtimes)
        .u32_array(RPMTAG_FILEINODES, &inodes)
        .u32_array(RPMTAG_FILEDEVICES, &devices)
        .u32_array(RPMTAG_FILEFLAGS, &flags)
        .string_array(RPMTAG_FILEUSERNAME, &users)
        .string_array(RPMTAG_FILEGROUPNAME, &groups)
        .string_array(RPMTAG_FILEDIGESTS, &digest_refs)
        .string_array(RPMTAG_FILELINKTOS, &links)
        .string_array(RPMTAG_PROVIDENAME, &[name])
        .u32_array(RPMTAG_PROVIDEFLAGS, &[RPMSENSE_EQUAL])
        .string_array(RPMTAG_PROVIDEVERSION, &["1.0-1"])
        .string_array(RPMTAG_REQUIRENAME, &["libc.so.6"])
        .u32_array(RPMTAG_REQUIREFLAGS, &[0])
        .string_array(RPMTAG_REQUIREVERSION, &[""]);
    if let Some(source_rpm) = source_rpm {
        builder.string(RPMTAG_SOURCERPM, source_rpm);
    }
    let header = builder.build();

    // Payload: one cpio entry per file, data on the last hardlink member
    // only (mirrors rpmbuild).
    let mut archive = Vec::new();
    for (i, f) in files.iter().enumerate() {
        let cpio_header = CpioHeader {
            ino: inodes[i],
            mode: modes[i] as u32,
            nlink: 1,
            mtime: mtimes[i],
            devminor: 1,
            ..Default::default()
        };
        let payload_name = format!(".{}{}", f.dir, f.base);
        let is_last_link = files
            .iter()
            .enumerate()
            .filter(|(_, g)| g.ino != 0 && g.ino == f.ino)
            .next_back()
            .map(|(j, _)| j == i)
            .unwrap_or(true);
        let data: &[u8] = if is_last_link { &f.data } else { b"" };
        cpio_entry(&mut archive, &payload_name, &cpio_header, data);
    }
    cpio_trailer(&mut archive);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&archive).unwrap();
    let payload = encoder.finish().unwrap();

    // Assemble: lead, signature header, pad, main header, payload.
    let mut out = Vec::new();
    out.extend_from_slice(&[0xED, 0xAB, 0xEE, 0xDB, 3, 0]);
    out.resize(96, 0);
    let sha1 = hex::encode(hash_bytes(HashKind::Sha1, &header));
    let signature = HeaderBuilder::new().string(RPMSIGTAG_SHA1, &sha1).build();
    out.extend_from_slice(&signature);
    while out.len() % 8 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&header);
    out.extend_from_slice(&payload);
    out
}

// ---- ELF ----

/// Specification of a little-endian x86_64 shared object for tests.
#[derive(Default)]
pub struct ElfSpec {
    pub soname: Option<&'static str>,
    pub needed: Vec<&'static str>,
    pub runpath: Option<&'static str>,
    /// (name, value) pairs of defined global function symbols.
    pub definitions: Vec<(&'static str, u64)>,
    /// Names of undefined (referenced) symbols.
    pub references: Vec<&'static str>,
    pub build_id: Option<&'static [u8]>,
}

/// Build a minimal ELF64 DSO containing a dynamic string table, dynamic
/// symbol table, dynamic section, and optionally a build-id note.
pub fn build_elf64(spec: &ElfSpec) -> Vec<u8> {
    // Dynamic string table. Offset 0 is the empty string.
    let mut strtab: Vec<u8> = vec![0];
    let strtab_offset = |s: &str, strtab: &mut Vec<u8>| -> u32 {
        let offset = strtab.len() as u32;
        strtab.extend_from_slice(s.as_bytes());
        strtab.push(0);
        offset
    };
    let soname_off = spec.soname.map(|s| strtab_offset(s, &mut strtab));
    let needed_offs: Vec<u32> = spec
        .needed
        .iter()
        .map(|s| strtab_offset(s, &mut strtab))
        .collect();
    let runpath_off = spec.runpath.map(|s| strtab_offset(s, &mut strtab));
    let def_offs: Vec<u32> = spec
        .definitions
        .iter()
        .map(|(s, _)| strtab_offset(s, &mut strtab))
        .collect();
    let ref_offs: Vec<u32> = spec
        .references
        .iter()
        .map(|s| strtab_offset(s, &mut strtab))
        .collect();

    // Dynamic symbol table: null entry, definitions, references.
    let mut dynsym: Vec<u8> = vec![0; 24];
    for (i, (_, value)) in spec.definitions.iter().enumerate() {
        dynsym.extend_from_slice(&def_offs[i].to_le_bytes());
        dynsym.push(0x12); // GLOBAL, FUNC
        dynsym.push(0); // default visibility
        dynsym.extend_from_slice(&5u16.to_le_bytes()); // some defined section
        dynsym.extend_from_slice(&value.to_le_bytes());
        dynsym.extend_from_slice(&0u64.to_le_bytes());
    }
    for off in &ref_offs {
        dynsym.extend_from_slice(&off.to_le_bytes());
        dynsym.push(0x12); // GLOBAL, FUNC
        dynsym.push(0);
        dynsym.extend_from_slice(&0u16.to_le_bytes()); // SHN_UNDEF
        dynsym.extend_from_slice(&0u64.to_le_bytes());
        dynsym.extend_from_slice(&0u64.to_le_bytes());
    }

    // Dynamic section.
    let mut dynamic: Vec<u8> = Vec::new();
    let dyn_entry = |tag: u64, value: u64, dynamic: &mut Vec<u8>| {
        dynamic.extend_from_slice(&tag.to_le_bytes());
        dynamic.extend_from_slice(&value.to_le_bytes());
    };
    for off in &needed_offs {
        dyn_entry(1, u64::from(*off), &mut dynamic); // DT_NEEDED
    }
    if let Some(off) = soname_off {
        dyn_entry(14, u64::from(off), &mut dynamic); // DT_SONAME
    }
    if let Some(off) = runpath_off {
        dyn_entry(29, u64::from(off), &mut dynamic); // DT_RUNPATH
    }
    dyn_entry(6, 0x1000, &mut dynamic); // DT_SYMTAB, opaque value
    dyn_entry(0, 0, &mut dynamic); // DT_NULL

    // Build-id note.
    let note = spec.build_id.map(|id| {
        let mut note: Vec<u8> = Vec::new();
        note.extend_from_slice(&4u32.to_le_bytes());
        note.extend_from_slice(&(id.len() as u32).to_le_bytes());
        note.extend_from_slice(&3u32.to_le_bytes()); // NT_GNU_BUILD_ID
        note.extend_from_slice(b"GNU\0");
        note.extend_from_slice(id);
        while note.len() % 4 != 0 {
            note.push(0);
        }
        note
    });

    // Layout: ehdr, strtab, dynsym, dynamic, note, section headers.
    let ehdr_len = 64usize;
    let strtab_off = ehdr_len;
    let dynsym_off = strtab_off + strtab.len();
    let dynamic_off = dynsym_off + dynsym.len();
    let note_off = dynamic_off + dynamic.len();
    let note_len = note.as_ref().map_or(0, Vec::len);
    let shoff = note_off + note_len;

    let shnum: u16 = if note.is_some() { 5 } else { 4 };

    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]);
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&3u16.to_le_bytes()); // ET_DYN
    out.extend_from_slice(&62u16.to_le_bytes()); // EM_X86_64
    out.extend_from_slice(&1u32.to_le_bytes()); // e_version
    out.extend_from_slice(&0u64.to_le_bytes()); // e_entry
    out.extend_from_slice(&0u64.to_le_bytes()); // e_phoff
    out.extend_from_slice(&(shoff as u64).to_le_bytes()); // e_shoff
    out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
    out.extend_from_slice(&64u16.to_le_bytes()); // e_ehsize
    out.extend_from_slice(&56u16.to_le_bytes()); // e_phentsize
    out.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
    out.extend_from_slice(&64u16.to_le_bytes()); // e_shentsize
    out.extend_from_slice(&shnum.to_le_bytes()); // e_shnum
    out.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx

    out.extend_from_slice(&strtab);
    out.extend_from_slice(&dynsym);
    out.extend_from_slice(&dynamic);
    if let Some(note) = &note {
        out.extend_from_slice(note);
    }

    let shdr = |sh_type: u32, offset: usize, size: usize, link: u32, entsize: u64,
                    out: &mut Vec<u8>| {
        out.extend_from_slice(&0u32.to_le_bytes()); // sh_name
        out.extend_from_slice(&sh_type.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes()); // sh_flags
        out.extend_from_slice(&0u64.to_le_bytes()); // sh_addr
        out.extend_from_slice(&(offset as u64).to_le_bytes());
        out.extend_from_slice(&(size as u64).to_le_bytes());
        out.extend_from_slice(&link.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // sh_info
        out.extend_from_slice(&0u64.to_le_bytes()); // sh_addralign
        out.extend_from_slice(&entsize.to_le_bytes());
    };
    shdr(0, 0, 0, 0, 0, &mut out); // null section
    shdr(3, strtab_off, strtab.len(), 0, 0, &mut out); // .dynstr (SHT_STRTAB)
    shdr(11, dynsym_off, dynsym.len(), 1, 24, &mut out); // .dynsym
    shdr(6, dynamic_off, dynamic.len(), 1, 16, &mut out); // .dynamic
    if let Some(note) = &note {
        shdr(7, note_off, note.len(), 0, 0, &mut out); // .note
    }
    out
}
