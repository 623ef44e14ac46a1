//! Byte extraction errors.

/// Error raised when a bounds-checked read runs past the end of a buffer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractError {
    #[error("read of {want} bytes at offset {offset} exceeds buffer of {len} bytes")]
    OutOfRange {
        offset: usize,
        want: usize,
        len: usize,
    },
}
