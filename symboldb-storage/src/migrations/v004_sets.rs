//! V004: package sets, the ELF closure, and the URL cache.

pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS package_set (
    set_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
) STRICT;

CREATE TABLE IF NOT EXISTS package_set_member (
    set_id INTEGER NOT NULL REFERENCES package_set(set_id) ON DELETE CASCADE,
    package_id INTEGER NOT NULL REFERENCES package(package_id),
    PRIMARY KEY (set_id, package_id)
) STRICT;

CREATE INDEX IF NOT EXISTS idx_package_set_member_package
    ON package_set_member(package_id);

-- Transitive DT_NEEDED resolution per package set.
CREATE TABLE IF NOT EXISTS elf_closure (
    set_id INTEGER NOT NULL REFERENCES package_set(set_id) ON DELETE CASCADE,
    file_id INTEGER NOT NULL,
    needed INTEGER NOT NULL,
    PRIMARY KEY (set_id, file_id, needed)
) STRICT;

-- Downloaded metadata, revalidated by length and modification time.
CREATE TABLE IF NOT EXISTS url_cache (
    url TEXT NOT NULL PRIMARY KEY,
    http_time INTEGER NOT NULL,
    data BLOB NOT NULL,
    last_change INTEGER NOT NULL
) STRICT;
"#;
