//! Types an [`crate::EssenceParser`] hands back describing what it found
//! and how it is willing to wrap it (spec.md §4.8).

use mxf_metadata::ObjectId;

/// One essence stream a parser found inside a source file.
#[derive(Debug, Clone)]
pub struct EssenceStreamDescriptor {
    pub stream_id: u32,
    pub description: String,
    /// Opaque tag identifying the bitstream in later calls to this same
    /// parser instance; not a registered UL, just a stable handle.
    pub source_format_tag: [u8; 16],
    /// The essence-descriptor MDObject this stream will be described by in
    /// the metadata graph, once the caller has a `MetadataContext` to build
    /// it into (the parser itself only reports raw technical parameters;
    /// building the descriptor object happens in the container layer, which
    /// owns the arena this id would belong to).
    pub descriptor: Option<ObjectId>,
}

/// Frame-wrapped essence carries one edit unit per GC element; clip-wrapped
/// essence carries the whole (remaining) clip in a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapKind {
    Frame,
    Clip,
}

/// One way a parser can wrap a stream into the Generic Container.
#[derive(Debug, Clone)]
pub struct WrappingOption {
    pub label: mxf_types::UL,
    pub gc_essence_type: u8,
    pub gc_element_type: u8,
    pub wrap_kind: WrapKind,
    /// Whether `set_edit_rate` may choose a rate other than the stream's
    /// native one. Only ever true for clip wrapping.
    pub accepts_other_rate: bool,
    pub can_index: bool,
}
