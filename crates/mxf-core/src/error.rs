//! Error types for mxf-core.

use thiserror::Error;

/// Endian/BER/DataChunk level errors.
#[derive(Debug, Error)]
#[must_use]
pub enum Error {
    #[error("unexpected end of data: need {need} bytes, have {have}")]
    UnexpectedEof { need: usize, have: usize },

    #[error("indefinite-length BER (0x80) is not supported")]
    IndefiniteLength,

    #[error("BER length encoding uses {0} bytes, maximum is 9")]
    BerLengthTooLong(usize),

    #[error("value {0} does not fit in a {1}-byte forced BER length")]
    BerValueTooLarge(u64, usize),

    #[error("forced BER length size must be 1, 2, 4, 8, or 9, got {0}")]
    InvalidForcedSize(usize),

    #[error("offset {0} + length {1} exceeds chunk size {2}")]
    OutOfBounds(usize, usize, usize),

    #[error("cannot take ownership of an externally-borrowed DataChunk")]
    ExternalChunk,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
