//! V002: ELF facts per file contents.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS elf_file (
    contents_id INTEGER PRIMARY KEY
        REFERENCES file_contents(contents_id) ON DELETE CASCADE,
    ei_class INTEGER NOT NULL,
    ei_data INTEGER NOT NULL,
    e_type INTEGER NOT NULL,
    e_machine INTEGER NOT NULL,
    arch TEXT,
    soname TEXT,
    build_id BLOB
) STRICT;

CREATE INDEX IF NOT EXISTS idx_elf_file_soname ON elf_file(soname);

CREATE TABLE IF NOT EXISTS elf_program_header (
    contents_id INTEGER NOT NULL
        REFERENCES elf_file(contents_id) ON DELETE CASCADE,
    type INTEGER NOT NULL,
    file_offset INTEGER NOT NULL,
    virt_addr INTEGER NOT NULL,
    phys_addr INTEGER NOT NULL,
    file_size INTEGER NOT NULL,
    memory_size INTEGER NOT NULL,
    align INTEGER NOT NULL,
    readable INTEGER NOT NULL,
    writable INTEGER NOT NULL,
    executable INTEGER NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_elf_program_header_contents
    ON elf_program_header(contents_id);

-- Defined dynamic symbols.
CREATE TABLE IF NOT EXISTS elf_definition (
    contents_id INTEGER NOT NULL
        REFERENCES elf_file(contents_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    version TEXT,
    primary_version INTEGER NOT NULL,
    symbol_value INTEGER NOT NULL,
    section INTEGER NOT NULL,
    binding INTEGER NOT NULL,
    sym_type INTEGER NOT NULL,
    visibility TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_elf_definition_contents ON elf_definition(contents_id);
CREATE INDEX IF NOT EXISTS idx_elf_definition_name ON elf_definition(name);

-- Referenced (undefined) dynamic symbols.
CREATE TABLE IF NOT EXISTS elf_reference (
    contents_id INTEGER NOT NULL
        REFERENCES elf_file(contents_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    version TEXT,
    binding INTEGER NOT NULL,
    sym_type INTEGER NOT NULL,
    visibility TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_elf_reference_contents ON elf_reference(contents_id);
CREATE INDEX IF NOT EXISTS idx_elf_reference_name ON elf_reference(name);

CREATE TABLE IF NOT EXISTS elf_needed (
    contents_id INTEGER NOT NULL
        REFERENCES elf_file(contents_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    PRIMARY KEY (contents_id, name)
) STRICT;

CREATE TABLE IF NOT EXISTS elf_rpath (
    contents_id INTEGER NOT NULL
        REFERENCES elf_file(contents_id) ON DELETE CASCADE,
    path TEXT NOT NULL
) STRICT;

CREATE TABLE IF NOT EXISTS elf_runpath (
    contents_id INTEGER NOT NULL
        REFERENCES elf_file(contents_id) ON DELETE CASCADE,
    path TEXT NOT NULL
) STRICT;

CREATE TABLE IF NOT EXISTS elf_dynamic (
    contents_id INTEGER NOT NULL
        REFERENCES elf_file(contents_id) ON DELETE CASCADE,
    tag INTEGER NOT NULL,
    value INTEGER NOT NULL
) STRICT;

-- Parse problems, recorded instead of aborting the package load.
CREATE TABLE IF NOT EXISTS elf_error (
    contents_id INTEGER NOT NULL
        REFERENCES file_contents(contents_id) ON DELETE CASCADE,
    message TEXT NOT NULL
) STRICT;
"#;
