//! Error kinds for Generic Container writing and the partition/RIP façade
//! (spec.md §7): precondition errors for out-of-order GCWriter/BodyWriter
//! calls, semantic errors for header-padding-reserve violations, and every
//! lower-layer error passed through unchanged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no stream registered with id {0}")]
    NoSuchStream(u32),

    #[error("write_body called with no header partition written yet")]
    HeaderNotWritten,

    #[error("write_footer called before any body partition was written")]
    BodyNotWritten,

    #[error("reserved header padding of {reserve} bytes would be exceeded: partition is already {actual} bytes")]
    HeaderPaddingExceeded { reserve: u64, actual: u64 },

    #[error("re_write_partition's replacement pack is {new} bytes but the original occupied {original}")]
    RewriteSizeMismatch { original: u64, new: u64 },

    #[error("no partition has been written at offset {0}")]
    NoPartitionAt(u64),

    #[error("seek to {0} is past the end of the buffer")]
    SeekPastEnd(u64),

    #[error("run-in exceeds the 64 KiB limit: {0} bytes")]
    RunInTooLarge(usize),

    #[error(transparent)]
    Essence(#[from] mxf_essence::Error),

    #[error(transparent)]
    Index(#[from] mxf_index::Error),

    #[error(transparent)]
    Klv(#[from] mxf_klv::Error),

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
