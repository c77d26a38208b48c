//! Error kinds specific to index tables (spec.md §7): format errors for a
//! malformed segment, semantic errors for incompatible delta arrays, and
//! precondition errors for an unconfigured table.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("index entry array declares {declared} entries but the batch holds {actual}")]
    EntryCountMismatch { declared: usize, actual: usize },

    #[error("index entry array element size {declared} does not match the table's index_entry_size {expected}")]
    ElementSizeMismatch { declared: usize, expected: usize },

    #[error("segment's delta-entry array is incompatible with the table's base delta array")]
    IndexTypeMismatch,

    #[error("requested edit unit {0} is not covered by any segment")]
    EditUnitNotCovered(i64),

    #[error("IndexTable has no base delta array configured")]
    DeltasNotConfigured,

    #[error("sub_item {sub_item} is out of range for a delta array of length {len}")]
    SubItemOutOfRange { sub_item: usize, len: usize },

    #[error("table is in CBR mode and has no segment map to add entries to")]
    NotVbr,

    #[error(transparent)]
    Metadata(#[from] mxf_metadata::Error),

    #[error(transparent)]
    Types(#[from] mxf_types::Error),

    #[error(transparent)]
    Core(#[from] mxf_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
