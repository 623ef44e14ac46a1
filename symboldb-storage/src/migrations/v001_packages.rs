//! V001: packages, digests, dependencies, scripts, files, and contents.

pub const MIGRATION_SQL: &str = r#"
-- One row per distinct package, keyed by the header SHA-1.
CREATE TABLE IF NOT EXISTS package (
    package_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    epoch INTEGER,
    version TEXT NOT NULL,
    release TEXT NOT NULL,
    arch TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('binary', 'source')),
    source_rpm TEXT,
    hash TEXT NOT NULL UNIQUE,
    build_host TEXT NOT NULL,
    build_time INTEGER NOT NULL,
    summary TEXT NOT NULL,
    description TEXT NOT NULL,
    license TEXT NOT NULL,
    rpm_group TEXT NOT NULL,
    normalized INTEGER NOT NULL DEFAULT 0
) STRICT;

CREATE INDEX IF NOT EXISTS idx_package_name ON package(name);

-- Outer digests of the RPM representations of a package. One package can
-- have several representations (signatures, compression), hence several
-- digests per algorithm.
CREATE TABLE IF NOT EXISTS package_digest (
    digest BLOB NOT NULL PRIMARY KEY,
    package_id INTEGER NOT NULL REFERENCES package(package_id) ON DELETE CASCADE,
    length INTEGER NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_package_digest_package ON package_digest(package_id);

CREATE TABLE IF NOT EXISTS package_url (
    package_id INTEGER NOT NULL REFERENCES package(package_id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    PRIMARY KEY (package_id, url)
) STRICT;

CREATE TABLE IF NOT EXISTS package_dependency (
    package_id INTEGER NOT NULL REFERENCES package(package_id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('R', 'P', 'O', 'C')),
    name TEXT NOT NULL,
    flags INTEGER NOT NULL,
    version TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_package_dependency_package
    ON package_dependency(package_id);
CREATE INDEX IF NOT EXISTS idx_package_dependency_name ON package_dependency(name);

CREATE TABLE IF NOT EXISTS package_script (
    package_id INTEGER NOT NULL REFERENCES package(package_id) ON DELETE CASCADE,
    kind TEXT NOT NULL
        CHECK (kind IN ('pretrans', 'prein', 'postin', 'preun', 'postun', 'posttrans')),
    script TEXT,
    program TEXT
) STRICT;

CREATE INDEX IF NOT EXISTS idx_package_script_package ON package_script(package_id);

CREATE TABLE IF NOT EXISTS package_trigger (
    package_id INTEGER NOT NULL REFERENCES package(package_id) ON DELETE CASCADE,
    idx INTEGER NOT NULL,
    script TEXT NOT NULL,
    program TEXT NOT NULL,
    PRIMARY KEY (package_id, idx)
) STRICT;

CREATE TABLE IF NOT EXISTS package_trigger_condition (
    package_id INTEGER NOT NULL REFERENCES package(package_id) ON DELETE CASCADE,
    idx INTEGER NOT NULL,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    flags INTEGER NOT NULL
) STRICT;

-- Deduplicated file contents. Keyed on the payload digest plus the inode
-- metadata, but not the file name or mtime. The preview holds the leading
-- bytes (or the whole file for configuration-like paths).
CREATE TABLE IF NOT EXISTS file_contents (
    contents_id INTEGER PRIMARY KEY,
    digest BLOB NOT NULL,
    length INTEGER NOT NULL,
    mode INTEGER NOT NULL,
    user_name TEXT NOT NULL,
    group_name TEXT NOT NULL,
    preview BLOB NOT NULL,
    UNIQUE (digest, mode, user_name, group_name)
) STRICT;

CREATE INDEX IF NOT EXISTS idx_file_contents_digest ON file_contents(digest);

-- Interned per-file attributes for hardlink members.
CREATE TABLE IF NOT EXISTS file_attribute (
    attribute_id INTEGER PRIMARY KEY,
    mode INTEGER NOT NULL,
    user_name TEXT NOT NULL,
    group_name TEXT NOT NULL,
    flags INTEGER NOT NULL,
    UNIQUE (mode, user_name, group_name, flags)
) STRICT;

CREATE TABLE IF NOT EXISTS file (
    file_id INTEGER PRIMARY KEY,
    package_id INTEGER NOT NULL REFERENCES package(package_id) ON DELETE CASCADE,
    contents_id INTEGER NOT NULL REFERENCES file_contents(contents_id),
    attribute_id INTEGER NOT NULL REFERENCES file_attribute(attribute_id),
    name TEXT NOT NULL,
    mtime INTEGER NOT NULL,
    inode INTEGER NOT NULL,
    normalized INTEGER NOT NULL DEFAULT 0
) STRICT;

CREATE INDEX IF NOT EXISTS idx_file_package ON file(package_id);
CREATE INDEX IF NOT EXISTS idx_file_name ON file(name);
CREATE INDEX IF NOT EXISTS idx_file_contents ON file(contents_id);

CREATE TABLE IF NOT EXISTS directory (
    package_id INTEGER NOT NULL REFERENCES package(package_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    mtime INTEGER NOT NULL,
    mode INTEGER NOT NULL,
    user_name TEXT NOT NULL,
    group_name TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_directory_package ON directory(package_id);

CREATE TABLE IF NOT EXISTS symlink (
    package_id INTEGER NOT NULL REFERENCES package(package_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    target TEXT NOT NULL,
    mtime INTEGER NOT NULL,
    user_name TEXT NOT NULL,
    group_name TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_symlink_package ON symlink(package_id);
"#;
