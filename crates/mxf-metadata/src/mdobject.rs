//! [`MDObject`] — a node in the header-metadata tree, and the
//! [`MetadataArena`] that owns every node reachable from one partition.
//!
//! Grounded on `exiftool-attrs::Attrs`/`AttrValue`'s "named, dynamically
//! typed container with a dirty flag" shape, generalized from a flat
//! string-keyed map to a tree with ordered children and reference links:
//! `Attrs.dirty` becomes `MDObject::modified`, and `Attrs::get`/`set`
//! becomes traits-mediated reads/writes over a leaf's `DataChunk`.

use std::collections::HashMap;

use mxf_core::DataChunk;
use mxf_types::Uuid;

use crate::{Error, Result};

/// Index into a [`MetadataArena`]. Cheap, `Copy`, and stable for the
/// lifetime of the arena (nodes are never removed, only unlinked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

/// How a reference-holding child relates to the object it names.
///
/// `Target` is not carried on ordinary children — it describes an object's
/// *own* designated instance-identifier property; modeled directly as
/// [`MDObject::instance_uid`] rather than as a walked child, since every
/// metadata set has at most one such property. `Strong`/`Weak`/`Global`
/// mark a leaf whose `DataChunk` holds the 16-byte UUID of another object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    None,
    Strong,
    Weak,
    Global,
}

enum Content {
    Leaf(DataChunk),
    /// Ordered children, keyed by name. Declaration order matters for
    /// compound types; the separate `order` vector is the source of truth
    /// for traversal, `by_name` only for lookup.
    Children { order: Vec<String>, by_name: HashMap<String, ObjectId> },
}

/// Where an object's value was read from, if it was read rather than built.
#[derive(Debug, Clone, Copy)]
pub struct SourceLocation {
    pub file_offset: u64,
    pub kl_size: usize,
}

/// A node in the header-metadata tree.
pub struct MDObject {
    pub type_name: String,
    content: Content,
    pub ref_kind: RefKind,
    /// Resolved reference target, set once the named UUID is matched to a
    /// live object by a [`crate::ReferenceResolver`].
    pub link: Option<ObjectId>,
    /// This object's own instance identifier, if it has one — see
    /// [`RefKind::None`] docs above for why this isn't a walked child.
    pub instance_uid: Option<Uuid>,
    /// Generation UID, bumped by `update_generations` when `modified` is
    /// set at the time that pass runs (spec.md §5's `update_generations`).
    pub generation_uid: Option<Uuid>,
    pub modified: bool,
    pub source: Option<SourceLocation>,
    /// Optional, possibly-stale back-reference; children do not own this
    /// and it is not consulted for correctness, only for diagnostics.
    pub parent: Option<ObjectId>,
}

impl MDObject {
    /// A fresh, modified, leaf object of the given type with an empty value.
    pub fn new_leaf(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            content: Content::Leaf(DataChunk::new()),
            ref_kind: RefKind::None,
            link: None,
            instance_uid: None,
            generation_uid: None,
            modified: true,
            source: None,
            parent: None,
        }
    }

    /// A fresh, modified, interior object of the given type with no children
    /// yet attached.
    pub fn new_children(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            content: Content::Children { order: Vec::new(), by_name: HashMap::new() },
            ref_kind: RefKind::None,
            link: None,
            instance_uid: None,
            generation_uid: None,
            modified: true,
            source: None,
            parent: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, Content::Leaf(_))
    }

    pub fn value(&self) -> Option<&DataChunk> {
        match &self.content {
            Content::Leaf(chunk) => Some(chunk),
            Content::Children { .. } => None,
        }
    }

    pub fn set_value(&mut self, chunk: DataChunk) {
        self.content = Content::Leaf(chunk);
        self.modified = true;
    }

    /// Interpret this leaf's bytes as a 16-byte UUID (used to read a
    /// reference-holding child's target identity before resolution).
    pub fn as_uuid(&self) -> Result<Uuid> {
        match self.value() {
            Some(chunk) => Uuid::from_slice(chunk.as_slice()).ok_or(Error::BadReferenceSize(chunk.len())),
            None => Err(Error::BadReferenceSize(0)),
        }
    }

    /// Append an already-constructed child under `name`, in order.
    pub fn attach_child(&mut self, name: impl Into<String>, id: ObjectId) -> Result<()> {
        match &mut self.content {
            Content::Children { order, by_name } => {
                let name = name.into();
                if !by_name.contains_key(&name) {
                    order.push(name.clone());
                }
                by_name.insert(name, id);
                self.modified = true;
                Ok(())
            }
            Content::Leaf(_) => Err(Error::NotCompound),
        }
    }

    pub fn child(&self, name: &str) -> Result<ObjectId> {
        match &self.content {
            Content::Children { by_name, .. } => by_name.get(name).copied().ok_or_else(|| Error::NoSuchChild(name.to_string())),
            Content::Leaf(_) => Err(Error::NotCompound),
        }
    }

    /// Children in declaration order, as (name, id) pairs.
    pub fn children(&self) -> Vec<(&str, ObjectId)> {
        match &self.content {
            Content::Children { order, by_name } => order.iter().map(|n| (n.as_str(), by_name[n])).collect(),
            Content::Leaf(_) => Vec::new(),
        }
    }

    pub fn child_ids(&self) -> Vec<ObjectId> {
        self.children().into_iter().map(|(_, id)| id).collect()
    }
}

/// Owns every [`MDObject`] reachable from one partition's header metadata.
/// Nodes are appended and never removed; an [`ObjectId`] is a stable index.
#[derive(Default)]
pub struct MetadataArena {
    objects: Vec<MDObject>,
}

impl MetadataArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: MDObject) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(object);
        id
    }

    pub fn get(&self, id: ObjectId) -> &MDObject {
        &self.objects[id.0]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut MDObject {
        &mut self.objects[id.0]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_lookup_child() {
        let mut arena = MetadataArena::new();
        let child = arena.insert(MDObject::new_leaf("UInt32"));
        let mut parent = MDObject::new_children("Preface");
        parent.attach_child("Version", child).unwrap();
        assert_eq!(parent.child("Version").unwrap(), child);
        assert_eq!(parent.children(), vec![("Version", child)]);
    }

    #[test]
    fn leaf_rejects_attach() {
        let mut leaf = MDObject::new_leaf("UInt32");
        assert!(matches!(leaf.attach_child("x", ObjectId(0)), Err(Error::NotCompound)));
    }

    #[test]
    fn as_uuid_round_trip() {
        let mut leaf = MDObject::new_leaf("PackageID");
        let id = Uuid::new_v4();
        leaf.set_value(DataChunk::from_bytes(id.as_bytes().to_vec()));
        assert_eq!(leaf.as_uuid().unwrap(), id);
    }
}
