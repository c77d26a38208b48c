//! Error types for `mxf-klv`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key at offset {offset:?} does not decode to a recognised partition/fill/primer/set key")]
    BadKey { offset: Option<u64> },

    #[error("partition pack is too short: need at least {need} bytes, got {have}")]
    PartitionPackTooShort { need: usize, have: usize },

    #[error("HeaderByteCount consumed {consumed} bytes but the declared count is {declared}")]
    HeaderByteCountMismatch { declared: u64, consumed: u64 },

    #[error("IndexByteCount consumed {consumed} bytes but the declared count is {declared}")]
    IndexByteCountMismatch { declared: u64, consumed: u64 },

    #[error("strong reference(s) left unresolved at end of partition: {0} unmatched")]
    UnmatchedStrongReferences(usize),

    #[error("reference value has the wrong byte size: expected 16, got {0}")]
    BadReferenceSize(usize),

    #[error("KAG alignment impossible: gap {gap} is smaller than the minimum filler size (17) and does not divide evenly")]
    KagAlignmentImpossible { gap: u64 },

    #[error("partition would be larger than its declared minimum size of {min}: actual {actual}")]
    PartitionTooLarge { min: u64, actual: u64 },

    #[error("cannot write KLV data before write_kl has been called for this object")]
    WriteDataBeforeWriteKl,

    #[error("KLVObject has no recorded source location to read from")]
    NoSourceLocation,

    #[error("RIP is empty or inconsistent and cannot be trusted")]
    RipInconsistent,

    #[error(transparent)]
    Core(#[from] mxf_core::Error),

    #[error(transparent)]
    Metadata(#[from] mxf_metadata::Error),

    #[error(transparent)]
    Types(#[from] mxf_types::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
