//! Typed wrappers for database row ids.
//!
//! Each id type wraps the underlying SQLite rowid to prevent cross-type
//! confusion. A `PackageId` cannot be accidentally used where a
//! `ContentsId` is expected.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl $name {
            /// Create a new id from a raw rowid.
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Get the raw rowid.
            pub fn value(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// A row in the `package` table.
    PackageId
);

define_id!(
    /// A row in the `file_contents` table. Contents ids are keyed on the
    /// file digest plus inode metadata, not the file name.
    ContentsId
);

define_id!(
    /// A row in the `file` table.
    FileId
);

define_id!(
    /// A row in the `file_attribute` table.
    AttributeId
);

define_id!(
    /// A row in the `package_set` table.
    PackageSetId
);
