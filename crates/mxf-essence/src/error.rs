//! Error kinds for essence identification and streaming (spec.md §7):
//! format errors for an unrecognised bitstream, precondition errors for
//! calling `get_essence_source` before `use_wrapping`, I/O short-circuits
//! for everything else.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("essence is not in a format this parser recognises")]
    NotRecognised,

    #[error("no stream with id {0}")]
    NoSuchStream(u32),

    #[error("no wrapping option with UL matching the one requested")]
    NoSuchWrapping,

    #[error("use_wrapping must be called before get_essence_source")]
    WrappingNotSelected,

    #[error("edit rate {numerator}/{denominator} is not achievable by this stream's wrapping")]
    RateNotAchievable { numerator: i32, denominator: i32 },

    #[error(transparent)]
    Metadata(#[from] mxf_metadata::Error),

    #[error(transparent)]
    Types(#[from] mxf_types::Error),

    #[error(transparent)]
    Core(#[from] mxf_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
