//! The essence-wrapping engine and top-level façade (spec.md §4.9, §4.10):
//! [`gc::GCWriter`] synthesizes Generic Container keys and sorts elements
//! into write order; [`body::BodyWriter`] composes GCWriters across
//! BodyStreams into header/body/footer partitions with a configurable
//! partition-break policy; [`file::MXFFile`] is the read-side façade over a
//! file or in-memory buffer.

pub mod body;
mod error;
pub mod file;
pub mod gc;

pub use body::{BodyStreamConfig, BodyWriter, BodyWriterOptions, IndexStrategy, PartitionBreakPolicy, WrapType};
pub use error::{Error, Result};
pub use file::MXFFile;
pub use gc::{essence_element_key, system_element_key, GCWriter};
