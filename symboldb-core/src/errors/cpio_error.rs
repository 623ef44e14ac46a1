//! cpio archive errors.

/// Errors from parsing an SVR4 "newc" cpio archive.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CpioError {
    #[error("bad cpio magic {found:?}")]
    BadMagic { found: String },

    #[error("non-hexadecimal digit in cpio {field} field")]
    BadField { field: &'static str },

    #[error("truncated cpio archive reading {what}")]
    Truncated { what: &'static str },
}
