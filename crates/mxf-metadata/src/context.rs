//! [`MetadataContext`] — the registry/arena/resolver bundle every facade
//! builder method operates over.

use mxf_core::DataChunk;
use mxf_types::{TypeRegistry, Uuid, UL};

use crate::mdobject::{MDObject, MetadataArena, ObjectId, RefKind};
use crate::resolver::ReferenceResolver;
use crate::{Error, Result};

pub struct MetadataContext<'r> {
    pub registry: &'r TypeRegistry,
    pub arena: MetadataArena,
    pub resolver: ReferenceResolver,
}

impl<'r> MetadataContext<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry, arena: MetadataArena::new(), resolver: ReferenceResolver::new() }
    }

    pub fn new_leaf(&mut self, type_name: &str) -> ObjectId {
        self.arena.insert(MDObject::new_leaf(type_name))
    }

    pub fn new_children(&mut self, type_name: &str) -> ObjectId {
        self.arena.insert(MDObject::new_children(type_name))
    }

    /// Register `id` (and resolve/publish any references it carries) as a
    /// first-class partition object.
    pub fn register(&mut self, id: ObjectId) -> Result<()> {
        self.resolver.add_metadata(&mut self.arena, id)
    }

    pub fn set_instance_uid(&mut self, id: ObjectId) -> Uuid {
        let uid = Uuid::new_v4();
        self.arena.get_mut(id).instance_uid = Some(uid);
        uid
    }

    pub fn set_string(&mut self, id: ObjectId, type_name: &str, value: &str) -> Result<()> {
        let traits = self.registry.traits_for(type_name)?;
        let mut chunk = DataChunk::new();
        traits.set_string(&mut chunk, value)?;
        self.arena.get_mut(id).set_value(chunk);
        Ok(())
    }

    pub fn set_int64(&mut self, id: ObjectId, type_name: &str, value: i64) -> Result<()> {
        let traits = self.registry.traits_for(type_name)?;
        let mut chunk = DataChunk::new();
        traits.set_int64(&mut chunk, value)?;
        self.arena.get_mut(id).set_value(chunk);
        Ok(())
    }

    pub fn set_ul(&mut self, id: ObjectId, ul: &UL) -> Result<()> {
        self.arena.get_mut(id).set_value(DataChunk::from_bytes(ul.as_bytes().to_vec()));
        Ok(())
    }

    /// Attach a new strong-reference leaf named `name` under `parent`,
    /// pointing at `target` (which must already carry an instance UID).
    pub fn attach_strong(&mut self, parent: ObjectId, name: &str, target: ObjectId) -> Result<()> {
        let target_uid = self.arena.get(target).instance_uid.ok_or(Error::BadReferenceSize(0))?;
        let mut leaf = MDObject::new_leaf("StrongReference");
        leaf.ref_kind = RefKind::Strong;
        leaf.set_value(DataChunk::from_bytes(target_uid.as_bytes().to_vec()));
        let leaf_id = self.arena.insert(leaf);
        self.arena.get_mut(parent).attach_child(name, leaf_id)
    }

    /// spec.md §5 `update_generations`: bump a shared generation UID for
    /// every object still marked modified, then clear the flag.
    pub fn update_generations(&mut self) {
        let generation = Uuid::new_v4();
        for i in 0..self.arena.len() {
            let obj = self.arena.get_mut(ObjectId(i));
            if obj.modified {
                obj.generation_uid = Some(generation);
                obj.modified = false;
            }
        }
    }
}
