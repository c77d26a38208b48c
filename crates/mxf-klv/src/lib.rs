//! KLV/partition layer: the byte-exact file structure spec.md §3/§6
//! describes, layered over [`mxf_core`]'s BER/DataChunk primitives and
//! [`mxf_metadata`]'s object graph.
//!
//! [`klvobject`] is the single streaming KLV read/write primitive; [`keys`]
//! holds every well-known 16-byte key; [`localset`] decodes/encodes the
//! tag+length+value member framing a Primer-scoped metadata set or index
//! segment uses; [`kag`] sizes KAG-alignment filler; [`partition`] composes
//! all of these into partition-pack parsing/building plus the
//! partition-scoped header-metadata and index blocks; [`rip`] builds the
//! Random Index Pack that ties partitions together across a whole file.

mod error;
pub mod kag;
pub mod keys;
pub mod klvobject;
pub mod localset;
pub mod partition;
pub mod rip;

pub use error::{Error, Result};
pub use klvobject::{KLVObject, KlvTransform, ReadHandler};
pub use partition::{PartitionPack, PartitionWriteOptions};
pub use rip::{PartitionInfo, Rip};
