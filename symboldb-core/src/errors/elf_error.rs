//! ELF image parse errors.

use super::extract_error::ExtractError;

/// Errors that can occur while parsing an ELF image.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ElfError {
    #[error("not an ELF image (bad magic)")]
    BadMagic,

    #[error("unsupported ELF class {class}")]
    UnsupportedClass { class: u8 },

    #[error("unsupported ELF data encoding {encoding}")]
    UnsupportedEncoding { encoding: u8 },

    #[error("truncated ELF image reading {what}")]
    Truncated { what: &'static str },

    #[error("string table offset {offset} out of range")]
    BadStringOffset { offset: usize },

    #[error("unterminated string at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error(transparent)]
    Extract(#[from] ExtractError),
}
