//! CBR/VBR index tables, wire encoding for index table segments, the
//! reorder buffer, and the [`manager::IndexManager`] that essence parsers
//! feed while they walk a file.
//!
//! - [`entry`] — `DeltaEntry`/`IndexEntry` wire encode/decode.
//! - [`segment`] — `IndexSegment`, parsed from or folded into a table.
//! - [`table`] — `IndexTable` and its `lookup` operation.
//! - [`reorder`] — `ReorderIndex`, buffering entries until complete.
//! - [`manager`] — `IndexManager`, the parser-facing offer/commit API.

mod entry;
mod error;
mod manager;
mod reorder;
mod segment;
mod table;

pub use entry::{DeltaEntry, IndexEntry};
pub use error::{Error, Result};
pub use manager::{EntryToken, IndexManager};
pub use reorder::ReorderIndex;
pub use segment::{IndexSegment, SegmentBody};
pub use table::{IndexTable, LookupResult};
