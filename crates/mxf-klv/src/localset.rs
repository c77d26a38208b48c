//! Local-set wire encode/decode: the 2-byte-tag + 2-byte-length framing a
//! Primer-scoped metadata set or index segment uses for its members, as
//! opposed to the full 16-byte-UL/BER-length framing partition-level KLVs
//! use. spec.md §4.3's "recursively descending compounds in declared child
//! order and arrays by length" is implemented here rather than in
//! `mxf-metadata` because it is mediated by a `Primer`, which is scoped to
//! one partition's KLV stream, not to the object graph itself.
//!
//! Because the XML dictionary/types loader that would normally supply a
//! schema is an out-of-scope external collaborator (spec.md §1), member
//! types are resolved the way a partial, dictionary-less reader must:
//! through whatever the `TypeRegistry` already has bound to the member's
//! UL (via `Primer::lookup_ul` then `TypeRegistry::type_for_ul`), falling
//! back to an untyped raw leaf when nothing is bound. This is narrower than
//! a fully schema-driven reader but round-trips any set built by this same
//! crate's writer, which only ever emits registered types.

use mxf_core::{DataChunk, Diagnostics};
use mxf_metadata::{MDObject, MetadataArena, MetadataContext, ObjectId, Primer, RefKind};
use mxf_types::{type_record::ArrayKind, TypeRecord, TypeRegistry, UL};

use crate::{Error, Result};

/// Classify a member by its *type name* into a [`RefKind`], by the naming
/// convention spec.md §4.2/§4.3 types follow: `StrongReference[Batch]` /
/// `WeakReference[Batch]` / a plain `UUID`-shaped `PackageID` used as an
/// object's own instance identifier (handled separately, not via this
/// classifier — see `MDObject::instance_uid`).
fn ref_kind_for_type(type_name: &str) -> RefKind {
    if type_name.starts_with("StrongReference") {
        RefKind::Strong
    } else if type_name.starts_with("WeakReference") {
        RefKind::Weak
    } else {
        RefKind::None
    }
}

/// Decode one local-set member's raw bytes into an `MDObject`, recursing
/// into compounds (fixed-size members only) and arrays (batch/implied) when
/// the registry has enough shape information; falls back to an opaque
/// `"Unknown"` leaf otherwise.
fn decode_member(
    ctx: &mut MetadataContext,
    registry: &TypeRegistry,
    type_name: &str,
    bytes: &[u8],
) -> Result<ObjectId> {
    let effective = match registry.effective_type(type_name) {
        Ok(t) => t.clone(),
        Err(_) => {
            let id = ctx.arena.insert(MDObject::new_leaf("Unknown"));
            ctx.arena.get_mut(id).set_value(DataChunk::from_bytes(bytes.to_vec()));
            return Ok(id);
        }
    };

    match effective {
        TypeRecord::Compound { members, .. } => {
            let parent = ctx.arena.insert(MDObject::new_children(type_name));
            let mut offset = 0usize;
            for member in &members {
                let member_size = registry
                    .effective_type(&member.type_name)
                    .ok()
                    .and_then(|t| match t {
                        TypeRecord::Basic { size, .. } => Some(*size),
                        _ => None,
                    })
                    .unwrap_or(bytes.len().saturating_sub(offset));
                let end = (offset + member_size).min(bytes.len());
                let child = decode_member(ctx, registry, &member.type_name, &bytes[offset..end])?;
                ctx.arena.get_mut(parent).attach_child(member.name.clone(), child)?;
                offset = end;
            }
            Ok(parent)
        }
        TypeRecord::Array { element, kind, .. } => {
            let elem_size = registry
                .effective_type(&element)
                .ok()
                .and_then(|t| match t {
                    TypeRecord::Basic { size, .. } => Some(*size),
                    _ => None,
                })
                .unwrap_or(bytes.len());
            let elements: &[u8] = match kind {
                ArrayKind::Batch if bytes.len() >= 8 => &bytes[8..],
                _ => bytes,
            };
            let parent = ctx.arena.insert(MDObject::new_children(type_name));
            let ref_kind = ref_kind_for_type(type_name);
            if elem_size > 0 {
                for (i, chunk) in elements.chunks(elem_size).enumerate() {
                    let leaf_id = ctx.arena.insert(MDObject::new_leaf(element.clone()));
                    let leaf = ctx.arena.get_mut(leaf_id);
                    leaf.set_value(DataChunk::from_bytes(chunk.to_vec()));
                    leaf.ref_kind = ref_kind;
                    ctx.arena.get_mut(parent).attach_child(i.to_string(), leaf_id)?;
                }
            }
            Ok(parent)
        }
        _ => {
            let id = ctx.arena.insert(MDObject::new_leaf(type_name));
            let leaf = ctx.arena.get_mut(id);
            leaf.set_value(DataChunk::from_bytes(bytes.to_vec()));
            leaf.ref_kind = ref_kind_for_type(type_name);
            Ok(id)
        }
    }
}

/// Decode a local set's body (the bytes following the set's own key+length,
/// i.e. a sequence of 2-byte tag + 2-byte length + value items) into an
/// `MDObject` of the given `set_type_name`, using `primer` to resolve each
/// tag to a UL and the registry to resolve that UL to a type name. The
/// object is not registered with the resolver here — the caller does that
/// once it also knows the set's instance UID (read as the `InstanceUID`
/// member by convention, tag `0x3C0A`).
pub fn decode_set(
    ctx: &mut MetadataContext,
    registry: &TypeRegistry,
    primer: &Primer,
    set_type_name: &str,
    body: &[u8],
    diag: &dyn Diagnostics,
) -> Result<ObjectId> {
    let set_id = ctx.arena.insert(MDObject::new_children(set_type_name));
    let mut pos = 0usize;
    while pos + 4 <= body.len() {
        let tag = u16::from_be_bytes([body[pos], body[pos + 1]]);
        let len = u16::from_be_bytes([body[pos + 2], body[pos + 3]]) as usize;
        pos += 4;
        if pos + len > body.len() {
            diag.report(&format!("local-set member tag {tag:#06x} length {len} overruns the set body"), None);
            break;
        }
        let value = &body[pos..pos + len];
        pos += len;

        let Some(ul) = primer.lookup_ul(tag) else {
            diag.report(&format!("local-set member tag {tag:#06x} has no primer entry"), None);
            continue;
        };
        let member_name = registry.type_for_ul(&ul).map(str::to_string).unwrap_or_else(|| format!("Tag_{tag:04x}"));

        if tag == INSTANCE_UID_TAG && value.len() == 16 {
            let uid = mxf_types::Uuid::from_slice(value).ok_or(Error::BadReferenceSize(value.len()))?;
            ctx.arena.get_mut(set_id).instance_uid = Some(uid);
            continue;
        }

        let type_name = registry.type_for_ul(&ul).unwrap_or("Unknown").to_string();
        let child = decode_member(ctx, registry, &type_name, value)?;
        ctx.arena.get_mut(set_id).attach_child(member_name, child)?;
    }
    Ok(set_id)
}

/// The SMPTE-register tag conventionally assigned to a set's own
/// `InstanceUID` property (present on every strongly-identified metadata
/// set).
pub const INSTANCE_UID_TAG: u16 = 0x3C0A;

/// Encode an `MDObject`'s children as local-set tag+length+value members,
/// assigning each member's UL a tag through `primer` (allocating a dynamic
/// tag when no static one exists). The object's own `InstanceUID`, if set,
/// is emitted first under the conventional tag.
pub fn encode_set(arena: &MetadataArena, registry: &TypeRegistry, primer: &mut Primer, id: ObjectId) -> Result<Vec<u8>> {
    let obj = arena.get(id);
    let mut out = Vec::new();

    if let Some(uid) = obj.instance_uid {
        out.extend_from_slice(&INSTANCE_UID_TAG.to_be_bytes());
        out.extend_from_slice(&16u16.to_be_bytes());
        out.extend_from_slice(uid.as_bytes());
    }

    for (name, child_id) in obj.children() {
        let member_type = arena.get(child_id).type_name.clone();
        let ul = member_ul(registry, &member_type);
        let tag = primer.lookup(registry, &ul, None);
        let bytes = encode_value(arena, registry, child_id)?;
        if bytes.len() > u16::MAX as usize {
            continue;
        }
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(&bytes);
    }
    Ok(out)
}

/// Resolve a member's type name to a UL: prefer an explicit binding already
/// registered via `TypeRegistry::register_ul` (the normal case for any type
/// a real dictionary load would have bound), falling back to a synthetic UL
/// derived deterministically from the type name's bytes when none exists —
/// the XML dictionary loader that would normally supply every binding is an
/// out-of-scope external collaborator (spec.md §1), so a name-only type
/// still needs *some* stable UL to roundtrip through the primer.
pub(crate) fn member_ul(registry: &TypeRegistry, type_name: &str) -> UL {
    if let Some(ul) = registry.ul_for_type(type_name) {
        return ul;
    }
    let mut bytes = [0u8; 16];
    bytes[0] = 0x7F; // outside the SMPTE register prefix, marks "synthetic"
    for (i, b) in type_name.bytes().take(15).enumerate() {
        bytes[i + 1] = b;
    }
    UL::new(bytes)
}

fn encode_value(arena: &MetadataArena, registry: &TypeRegistry, id: ObjectId) -> Result<Vec<u8>> {
    let obj = arena.get(id);
    if let Some(chunk) = obj.value() {
        return Ok(chunk.as_slice().to_vec());
    }
    let children = obj.children();
    let mut out = Vec::new();
    let is_array = !children.is_empty() && children.iter().enumerate().all(|(i, (n, _))| n.parse::<usize>() == Ok(i));
    if is_array {
        out.extend_from_slice(&(children.len() as u32).to_be_bytes());
        let first = encode_value(arena, registry, children[0].1)?;
        out.extend_from_slice(&(first.len() as u32).to_be_bytes());
        for (_, child_id) in &children {
            out.extend(encode_value(arena, registry, *child_id)?);
        }
    } else {
        for (_, child_id) in &children {
            out.extend(encode_value(arena, registry, *child_id)?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxf_core::StderrDiagnostics;

    #[test]
    fn decode_set_reads_instance_uid_and_a_scalar_member() {
        let mut primer = Primer::new();
        let ul = UL::new([1; 16]);
        primer.insert(0x1001, ul);
        let mut registry = TypeRegistry::new();
        registry.register_ul(ul, "UInt32");

        let mut ctx = MetadataContext::new(&registry);
        let mut body = Vec::new();
        let uid = mxf_types::Uuid::new_v4();
        body.extend_from_slice(&INSTANCE_UID_TAG.to_be_bytes());
        body.extend_from_slice(&16u16.to_be_bytes());
        body.extend_from_slice(uid.as_bytes());
        body.extend_from_slice(&0x1001u16.to_be_bytes());
        body.extend_from_slice(&4u16.to_be_bytes());
        body.extend_from_slice(&42u32.to_be_bytes());

        let set_id = decode_set(&mut ctx, &registry, &primer, "TestSet", &body, &StderrDiagnostics).unwrap();
        assert_eq!(ctx.arena.get(set_id).instance_uid, Some(uid));
        assert_eq!(ctx.arena.get(set_id).children().len(), 1);
    }

    #[test]
    fn encode_set_then_decode_set_round_trips_a_scalar_member() {
        let mut registry = TypeRegistry::new();
        let ul = UL::new([2; 16]);
        registry.register_ul(ul, "Int32");
        let mut primer = Primer::new();

        let mut ctx = MetadataContext::new(&registry);
        let set_id = ctx.new_children("TestSet");
        let member_id = ctx.new_leaf("Int32");
        let traits = registry.traits_for("Int32").unwrap();
        let mut chunk = DataChunk::new();
        traits.set_int64(&mut chunk, 7).unwrap();
        ctx.arena.get_mut(member_id).set_value(chunk);
        ctx.arena.get_mut(set_id).attach_child("Int32", member_id).unwrap();

        let encoded = encode_set(&ctx.arena, &registry, &mut primer, set_id).unwrap();

        let mut ctx2 = MetadataContext::new(&registry);
        let decoded_id = decode_set(&mut ctx2, &registry, &primer, "TestSet", &encoded, &StderrDiagnostics).unwrap();
        let decoded_member = ctx2.arena.get(decoded_id).child("Int32").unwrap();
        let decoded_traits = registry.traits_for("Int32").unwrap();
        let value = decoded_traits.get_int64(ctx2.arena.get(decoded_member).value().unwrap()).unwrap();
        assert_eq!(value, 7);
    }
}
