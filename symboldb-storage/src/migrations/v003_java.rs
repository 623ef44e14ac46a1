//! V003: Java class, Maven URL, and XML error tables.

pub const MIGRATION_SQL: &str = r#"
-- Interned class descriptors. The same class (from identical jars in
-- different packages) is stored once and joined via java_class_contents.
CREATE TABLE IF NOT EXISTS java_class (
    class_id INTEGER PRIMARY KEY,
    access_flags INTEGER NOT NULL,
    name TEXT NOT NULL,
    super_class TEXT,
    UNIQUE (name, super_class, access_flags)
) STRICT;

CREATE TABLE IF NOT EXISTS java_interface (
    class_id INTEGER NOT NULL REFERENCES java_class(class_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    PRIMARY KEY (class_id, name)
) STRICT;

CREATE TABLE IF NOT EXISTS java_class_reference (
    class_id INTEGER NOT NULL REFERENCES java_class(class_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    PRIMARY KEY (class_id, name)
) STRICT;

CREATE INDEX IF NOT EXISTS idx_java_class_reference_name
    ON java_class_reference(name);

CREATE TABLE IF NOT EXISTS java_class_contents (
    class_id INTEGER NOT NULL REFERENCES java_class(class_id),
    contents_id INTEGER NOT NULL
        REFERENCES file_contents(contents_id) ON DELETE CASCADE,
    PRIMARY KEY (class_id, contents_id)
) STRICT;

CREATE TABLE IF NOT EXISTS java_error (
    contents_id INTEGER NOT NULL
        REFERENCES file_contents(contents_id) ON DELETE CASCADE,
    message TEXT NOT NULL,
    path TEXT NOT NULL
) STRICT;

CREATE TABLE IF NOT EXISTS maven_url (
    contents_id INTEGER NOT NULL
        REFERENCES file_contents(contents_id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    kind TEXT NOT NULL,
    PRIMARY KEY (contents_id, url, kind)
) STRICT;

CREATE TABLE IF NOT EXISTS xml_error (
    contents_id INTEGER NOT NULL
        REFERENCES file_contents(contents_id) ON DELETE CASCADE,
    message TEXT NOT NULL,
    line INTEGER NOT NULL
) STRICT;
"#;
