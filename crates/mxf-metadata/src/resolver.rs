//! [`ReferenceResolver`] — strong/weak/global reference bookkeeping and
//! top-level classification, run as each object is added to a partition.
//!
//! New domain logic with no teacher analogue; grounded on the arena/id-map
//! re-architecture spec.md §9 prescribes for cyclic reference graphs:
//! objects live in a [`MetadataArena`] addressed by [`ObjectId`], so a
//! pending or resolved reference is an index rather than a smart pointer,
//! which sidesteps the aliasing problems a `Rc<RefCell<_>>` graph would
//! otherwise need runtime borrow checks to catch.

use std::collections::HashMap;

use mxf_types::Uuid;

use crate::mdobject::{MetadataArena, ObjectId, RefKind};
use crate::Result;

#[derive(Default)]
pub struct ReferenceResolver {
    ref_targets: HashMap<Uuid, ObjectId>,
    unmatched_refs: HashMap<Uuid, Vec<ObjectId>>,
    all_metadata: Vec<ObjectId>,
    top_level: Vec<ObjectId>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_metadata(&self) -> &[ObjectId] {
        &self.all_metadata
    }

    /// Objects to which no strong reference has been resolved, as of the
    /// last call to [`ReferenceResolver::add_metadata`].
    pub fn top_level_metadata(&self) -> &[ObjectId] {
        &self.top_level
    }

    pub fn unmatched_ref_count(&self) -> usize {
        self.unmatched_refs.values().map(Vec::len).sum()
    }

    /// Register `id` as a first-class partition object: walked for target
    /// publication and reference resolution per spec.md §4.3.
    pub fn add_metadata(&mut self, arena: &mut MetadataArena, id: ObjectId) -> Result<()> {
        self.all_metadata.push(id);
        self.top_level.push(id);

        if let Some(uuid) = arena.get(id).instance_uid {
            self.ref_targets.insert(uuid, id);
            if let Some(pending) = self.unmatched_refs.remove(&uuid) {
                for holder in pending {
                    arena.get_mut(holder).link = Some(id);
                    if arena.get(holder).ref_kind == RefKind::Strong {
                        self.top_level.retain(|&t| t != id);
                    }
                }
            }
        }

        let mut ref_leaves = Vec::new();
        collect_ref_leaves(arena, id, &mut ref_leaves);
        for child_id in ref_leaves {
            let ref_kind = arena.get(child_id).ref_kind;
            let uuid = match arena.get(child_id).as_uuid() {
                Ok(uuid) => uuid,
                Err(_) => continue,
            };
            if let Some(&target) = self.ref_targets.get(&uuid) {
                arena.get_mut(child_id).link = Some(target);
                if ref_kind == RefKind::Strong {
                    self.top_level.retain(|&t| t != target);
                }
            } else {
                self.unmatched_refs.entry(uuid).or_default().push(child_id);
            }
        }

        Ok(())
    }
}

/// Walk every descendant of `id` (not just direct children), collecting the
/// ids of reference-holding leaves. A `StrongReferenceBatch`/`WeakReference
/// Batch` member decodes to a batch-parent node with `RefKind::None` whose
/// UUID-bearing element leaves are its *children*, so a single non-recursive
/// pass over `id`'s own children would miss them; ordinary compound members
/// need the same descent to reach a reference nested more than one level
/// down.
fn collect_ref_leaves(arena: &MetadataArena, id: ObjectId, out: &mut Vec<ObjectId>) {
    for child_id in arena.get(id).child_ids() {
        let child = arena.get(child_id);
        if child.ref_kind != RefKind::None {
            out.push(child_id);
        } else if !child.is_leaf() {
            collect_ref_leaves(arena, child_id, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdobject::MDObject;
    use mxf_core::DataChunk;

    #[test]
    fn strong_reference_removes_target_from_top_level() {
        let mut arena = MetadataArena::new();
        let mut resolver = ReferenceResolver::new();

        let mut target = MDObject::new_children("SourceClip");
        let target_uid = Uuid::new_v4();
        target.instance_uid = Some(target_uid);
        let target_id = arena.insert(target);
        resolver.add_metadata(&mut arena, target_id).unwrap();
        assert_eq!(resolver.top_level_metadata(), &[target_id]);

        let mut holder = MDObject::new_children("Track");
        let mut ref_leaf = MDObject::new_leaf("StrongReference");
        ref_leaf.ref_kind = RefKind::Strong;
        ref_leaf.set_value(DataChunk::from_bytes(target_uid.as_bytes().to_vec()));
        let ref_leaf_id = arena.insert(ref_leaf);
        holder.attach_child("Sequence", ref_leaf_id).unwrap();
        let holder_id = arena.insert(holder);

        resolver.add_metadata(&mut arena, holder_id).unwrap();
        assert_eq!(arena.get(ref_leaf_id).link, Some(target_id));
        assert!(!resolver.top_level_metadata().contains(&target_id));
        assert!(resolver.top_level_metadata().contains(&holder_id));
    }

    #[test]
    fn forward_reference_resolves_once_target_appears() {
        let mut arena = MetadataArena::new();
        let mut resolver = ReferenceResolver::new();

        let target_uid = Uuid::new_v4();
        let mut holder = MDObject::new_children("Track");
        let mut ref_leaf = MDObject::new_leaf("StrongReference");
        ref_leaf.ref_kind = RefKind::Strong;
        ref_leaf.set_value(DataChunk::from_bytes(target_uid.as_bytes().to_vec()));
        let ref_leaf_id = arena.insert(ref_leaf);
        holder.attach_child("Sequence", ref_leaf_id).unwrap();
        let holder_id = arena.insert(holder);
        resolver.add_metadata(&mut arena, holder_id).unwrap();
        assert_eq!(resolver.unmatched_ref_count(), 1);

        let mut target = MDObject::new_children("SourceClip");
        target.instance_uid = Some(target_uid);
        let target_id = arena.insert(target);
        resolver.add_metadata(&mut arena, target_id).unwrap();

        assert_eq!(arena.get(ref_leaf_id).link, Some(target_id));
        assert_eq!(resolver.unmatched_ref_count(), 0);
        assert!(!resolver.top_level_metadata().contains(&target_id));
    }

    /// `decode_member`'s Array/Batch branch (`localset.rs`) produces a
    /// `RefKind::None` batch-parent node whose UUID-bearing elements are its
    /// children, the same shape a decoded `Identifications` `StrongReference
    /// Batch` would have.
    #[test]
    fn strong_reference_batch_removes_every_target_from_top_level() {
        let mut arena = MetadataArena::new();
        let mut resolver = ReferenceResolver::new();

        let mut target_a = MDObject::new_children("Identification");
        let target_a_uid = Uuid::new_v4();
        target_a.instance_uid = Some(target_a_uid);
        let target_a_id = arena.insert(target_a);
        resolver.add_metadata(&mut arena, target_a_id).unwrap();

        let mut target_b = MDObject::new_children("Identification");
        let target_b_uid = Uuid::new_v4();
        target_b.instance_uid = Some(target_b_uid);
        let target_b_id = arena.insert(target_b);
        resolver.add_metadata(&mut arena, target_b_id).unwrap();

        assert_eq!(resolver.top_level_metadata().len(), 2);

        let mut batch = MDObject::new_children("StrongReferenceBatch");
        for (i, uid) in [target_a_uid, target_b_uid].into_iter().enumerate() {
            let mut element = MDObject::new_leaf("StrongReference");
            element.ref_kind = RefKind::Strong;
            element.set_value(DataChunk::from_bytes(uid.as_bytes().to_vec()));
            let element_id = arena.insert(element);
            batch.attach_child(i.to_string(), element_id).unwrap();
        }
        let batch_id = arena.insert(batch);

        let mut holder = MDObject::new_children("Preface");
        holder.attach_child("Identifications", batch_id).unwrap();
        let holder_id = arena.insert(holder);

        resolver.add_metadata(&mut arena, holder_id).unwrap();

        assert!(resolver.top_level_metadata().contains(&holder_id));
        assert!(!resolver.top_level_metadata().contains(&target_a_id));
        assert!(!resolver.top_level_metadata().contains(&target_b_id));
        assert_eq!(resolver.unmatched_ref_count(), 0);
    }
}
