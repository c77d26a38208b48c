//! Whole-partition round trip: write a header partition carrying one
//! metadata set through [`write_partition`], then read the bytes back
//! through [`PartitionPack::read`] plus [`read_metadata`] and check the
//! recovered object graph compares structurally equal to what was written.
//!
//! Grounded on `exiftool-formats/tests/round_trip.rs`'s whole-structure
//! write-then-read-then-compare shape; exercises spec.md §8's "writing a
//! partition and immediately reading it back yields an MDObject tree that
//! compares structurally equal to the source" invariant end to end.

use std::io::Cursor;

use mxf_core::{DataChunk, StderrDiagnostics};
use mxf_klv::keys::{PartitionKind, PartitionStatus};
use mxf_klv::partition::{read_metadata, write_partition, PartitionPack, PartitionWriteOptions};
use mxf_metadata::{MetadataContext, Primer};
use mxf_types::{TypeRegistry, UL};

fn bind(registry: &mut TypeRegistry, name: &str, seed: u8) -> UL {
    let mut bytes = [0u8; 16];
    bytes[0] = 0x7D;
    bytes[1] = seed;
    for (i, b) in name.bytes().take(13).enumerate() {
        bytes[2 + i] = b;
    }
    let ul = UL::new(bytes);
    registry.register_ul(ul, name);
    ul
}

#[test]
fn header_partition_with_one_set_round_trips() {
    let mut registry = TypeRegistry::new();
    bind(&mut registry, "Preface", 1); // top-level set key, resolved directly by UL
    let mut primer = Primer::new();
    let name_ul = bind(&mut registry, "Name", 2); // a member within the Preface set, resolved via primer tag
    primer.insert(0x0001, name_ul);

    let mut ctx = MetadataContext::new(&registry);
    let preface_id = ctx.new_children("Preface");
    let instance_uid = ctx.set_instance_uid(preface_id);
    ctx.register(preface_id).unwrap();

    let name_leaf = ctx.new_leaf("Name");
    ctx.arena.get_mut(name_leaf).set_value(DataChunk::from_bytes(b"Scenario 3 Clip".to_vec()));
    ctx.arena.get_mut(preface_id).attach_child("Name", name_leaf).unwrap();

    let mut pack = PartitionPack::new(PartitionKind::Header, PartitionStatus::ClosedComplete);
    pack.body_sid = 1;

    let bytes = write_partition(pack, &mut primer, &ctx, &[preface_id], &registry, None, PartitionWriteOptions::default(), &StderrDiagnostics).unwrap();

    let mut cursor = Cursor::new(bytes);
    let (read_pack, klv) = PartitionPack::read(&mut cursor, 0).unwrap();
    assert_eq!(read_pack.body_sid, 1);
    let metadata_offset = klv.kl_size as u64 + klv.length;

    let mut ctx2 = MetadataContext::new(&registry);
    let mut read_primer = Primer::new();
    let ids = read_metadata(&mut cursor, metadata_offset, read_pack.header_byte_count, &mut ctx2, &registry, &mut read_primer, &StderrDiagnostics).unwrap();

    assert_eq!(ids.len(), 1);
    let preface2 = ids[0];
    assert_eq!(ctx2.arena.get(preface2).type_name, "Preface");
    assert_eq!(ctx2.arena.get(preface2).instance_uid, Some(instance_uid));

    let name_child2 = ctx2.arena.get(preface2).child("Name").unwrap();
    let chunk2 = ctx2.arena.get(name_child2).value().unwrap();
    let string_traits = registry.traits_for("String").unwrap();
    assert_eq!(string_traits.get_string(chunk2).unwrap(), "Scenario 3 Clip");
}

/// Same shape as `header_partition_with_one_set_round_trips`, but with a KAG
/// wide enough that a leading filler lands between the pack and the Primer
/// Pack. `header_byte_count` must count that filler, or `read_metadata`
/// overshoots its declared budget and `essence_offset` lands short.
#[test]
fn header_partition_with_kag_alignment_round_trips() {
    let mut registry = TypeRegistry::new();
    bind(&mut registry, "Preface", 1);
    let mut primer = Primer::new();
    let name_ul = bind(&mut registry, "Name", 2);
    primer.insert(0x0001, name_ul);

    let mut ctx = MetadataContext::new(&registry);
    let preface_id = ctx.new_children("Preface");
    let instance_uid = ctx.set_instance_uid(preface_id);
    ctx.register(preface_id).unwrap();

    let name_leaf = ctx.new_leaf("Name");
    ctx.arena.get_mut(name_leaf).set_value(DataChunk::from_bytes(b"Scenario 3 Clip".to_vec()));
    ctx.arena.get_mut(preface_id).attach_child("Name", name_leaf).unwrap();

    let mut pack = PartitionPack::new(PartitionKind::Header, PartitionStatus::ClosedComplete);
    pack.body_sid = 1;

    let opts = PartitionWriteOptions { kag_size: 512, force_ber4_fill: false, min_partition_size: 0 };
    let bytes = write_partition(pack, &mut primer, &ctx, &[preface_id], &registry, None, opts, &StderrDiagnostics).unwrap();

    let mut cursor = Cursor::new(bytes.clone());
    let (read_pack, klv) = PartitionPack::read(&mut cursor, 0).unwrap();
    let pack_end = klv.kl_size as u64 + klv.length;
    assert!(read_pack.header_byte_count > 0, "leading KAG filler plus metadata should be non-zero");

    let mut ctx2 = MetadataContext::new(&registry);
    let mut read_primer = Primer::new();
    let ids = read_metadata(&mut cursor, pack_end, read_pack.header_byte_count, &mut ctx2, &registry, &mut read_primer, &StderrDiagnostics).unwrap();

    assert_eq!(ids.len(), 1);
    let preface2 = ids[0];
    assert_eq!(ctx2.arena.get(preface2).instance_uid, Some(instance_uid));
    let name_child2 = ctx2.arena.get(preface2).child("Name").unwrap();
    let chunk2 = ctx2.arena.get(name_child2).value().unwrap();
    let string_traits = registry.traits_for("String").unwrap();
    assert_eq!(string_traits.get_string(chunk2).unwrap(), "Scenario 3 Clip");

    let essence_start = mxf_klv::partition::essence_offset(pack_end, &read_pack);
    assert!(essence_start <= bytes.len() as u64, "essence offset must not overrun the written partition");
}
