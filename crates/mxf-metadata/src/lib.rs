//! The header-metadata object graph: [`MDObject`](mdobject::MDObject) nodes
//! arranged in a [`MetadataArena`](mdobject::MetadataArena), a per-partition
//! [`Primer`](primer::Primer) mapping tags to ULs, reference resolution via
//! [`ReferenceResolver`](resolver::ReferenceResolver), and the
//! Preface/Package/Track facade builders in [`facade`].
//!
//! [`MetadataContext`](context::MetadataContext) bundles a [`TypeRegistry`]
//! reference with an arena and resolver; it is the handle every facade
//! builder method and every `mxf-klv` local-set decoder operates over.

pub mod context;
pub mod data_definitions;
mod error;
pub mod facade;
pub mod mdobject;
pub mod primer;
pub mod resolver;

pub use context::MetadataContext;
pub use error::{Error, Result};
pub use mdobject::{MDObject, MetadataArena, ObjectId, RefKind, SourceLocation};
pub use primer::Primer;
pub use resolver::ReferenceResolver;
