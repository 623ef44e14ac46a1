//! Java class file parse errors.

use super::extract_error::ExtractError;

/// Errors that can occur while parsing a Java class file.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JavaClassError {
    #[error("class file magic value not found")]
    BadMagic,

    #[error("invalid constant pool tag {tag} at entry {index}")]
    InvalidConstantPoolTag { tag: u8, index: u16 },

    #[error("zero constant pool index")]
    ZeroConstantPoolIndex,

    #[error("constant pool index {index} out of range")]
    ConstantPoolIndexOutOfRange { index: u16 },

    #[error("constant pool entry {index} has tag {found}, expected {expected}")]
    WrongConstantTag {
        index: u16,
        expected: u8,
        found: u8,
    },

    #[error("constant pool entry {index} is not valid UTF-8")]
    InvalidUtf8 { index: u16 },

    #[error(transparent)]
    Truncated(#[from] ExtractError),
}
