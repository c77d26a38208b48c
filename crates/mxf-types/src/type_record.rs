//! Type record variants: how a dictionary describes a type's shape.
//!
//! These four variants mirror the four kinds of type declaration a SMPTE
//! register/dictionary makes: a fixed-size scalar, a renaming/restriction of
//! another type, a fixed- or variable-length sequence of one element type,
//! and a fixed-order tuple of named, independently-typed members.

/// How an [`Array`](TypeRecord::Array) type's element count is encoded on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    /// Element count is fixed by the type record itself.
    Fixed(usize),
    /// "Batch" encoding: a leading 8-byte header (u32 count, u32 element
    /// size) precedes the elements, matching MXF's `StrongReferenceBatch`/
    /// `UUIDBatch` wire shape.
    Batch,
    /// The chunk's length implies the count (`len / element_size`); used for
    /// e.g. plain `ArrayOfUInt8` runs with no header.
    Implied,
}

/// One named member of a [`Compound`](TypeRecord::Compound) type, in
/// declaration order (compound members have no tags of their own — their
/// position in the struct is their identity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundMember {
    pub name: String,
    pub type_name: String,
}

impl CompoundMember {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self { name: name.into(), type_name: type_name.into() }
    }
}

/// A single entry in the type registry's dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRecord {
    /// A fixed-size scalar with no further structure (`Int32`, `UInt8`, a
    /// 16-byte `UL`, ...).
    Basic { name: String, size: usize },

    /// A type defined purely in terms of another ("`Rational` is an
    /// `Int32Pair`"), optionally narrowing the traits used to interpret it.
    /// Chains of these are followed to find the effective storage type.
    Interpretation { name: String, base: String },

    /// A sequence of `element` typed items.
    Array { name: String, element: String, kind: ArrayKind },

    /// A fixed-order tuple of independently-typed, named members.
    Compound { name: String, members: Vec<CompoundMember> },
}

impl TypeRecord {
    pub fn name(&self) -> &str {
        match self {
            TypeRecord::Basic { name, .. }
            | TypeRecord::Interpretation { name, .. }
            | TypeRecord::Array { name, .. }
            | TypeRecord::Compound { name, .. } => name,
        }
    }
}
