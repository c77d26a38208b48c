//! Partition pack parsing/building, and the partition-scoped read/write of
//! header metadata and index segments (spec.md §4.5).
//!
//! Grounded on `exiftool-formats::mxf::MxfParser`'s top-level "scan key,
//! dispatch on which well-known key it is" read loop, generalized from a
//! read-only tag scanner into a full read+write partition layer with a
//! proper Primer and metadata-set decode via [`crate::localset`].

use std::io::{Read, Seek};

use mxf_core::{ber, Diagnostics};
use mxf_metadata::{MetadataContext, ObjectId, Primer};
use mxf_types::{TypeRegistry, UL};

use crate::kag;
use crate::keys::{fill_key, index_segment_key, partition_key, primer_key, PartitionKind, PartitionStatus};
use crate::klvobject::KLVObject;
use crate::localset::{decode_set, encode_set};
use crate::{Error, Result};

/// The fixed-layout value that follows every partition pack's key+length
/// (spec.md §4.5/§6): version, KAG size, the four partition-chain pointers,
/// the two metadata byte counts, body/index stream identifiers, and the
/// operational pattern plus declared essence container ULs.
#[derive(Debug, Clone)]
pub struct PartitionPack {
    pub kind: PartitionKind,
    pub status: PartitionStatus,
    pub major_version: u16,
    pub minor_version: u16,
    pub kag_size: u32,
    pub this_partition: u64,
    pub previous_partition: u64,
    pub footer_partition: u64,
    pub header_byte_count: u64,
    pub index_byte_count: u64,
    pub index_sid: u32,
    pub body_offset: u64,
    pub body_sid: u32,
    pub operational_pattern: UL,
    pub essence_containers: Vec<UL>,
}

impl PartitionPack {
    pub fn new(kind: PartitionKind, status: PartitionStatus) -> Self {
        Self {
            kind,
            status,
            major_version: 1,
            minor_version: 2,
            kag_size: 1,
            this_partition: 0,
            previous_partition: 0,
            footer_partition: 0,
            header_byte_count: 0,
            index_byte_count: 0,
            index_sid: 0,
            body_offset: 0,
            body_sid: 0,
            operational_pattern: UL::new([0; 16]),
            essence_containers: Vec::new(),
        }
    }

    /// Read a partition pack's key, BER length, and fixed-layout value at
    /// the current reader position.
    pub fn read<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<(Self, KLVObject)> {
        let mut klv = KLVObject::read_kl(reader, offset)?;
        let (kind, status) = crate::keys::decode_partition_key(&klv.key).ok_or(Error::BadKey { offset: Some(offset) })?;
        klv.read_all_data(reader)?;
        let body = klv.value().expect("just read").as_slice();
        if body.len() < 88 {
            return Err(Error::PartitionPackTooShort { need: 88, have: body.len() });
        }

        let major_version = u16::from_be_bytes([body[0], body[1]]);
        let minor_version = u16::from_be_bytes([body[2], body[3]]);
        let kag_size = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
        let this_partition = u64::from_be_bytes(body[8..16].try_into().unwrap());
        let previous_partition = u64::from_be_bytes(body[16..24].try_into().unwrap());
        let footer_partition = u64::from_be_bytes(body[24..32].try_into().unwrap());
        let header_byte_count = u64::from_be_bytes(body[32..40].try_into().unwrap());
        let index_byte_count = u64::from_be_bytes(body[40..48].try_into().unwrap());
        let index_sid = u32::from_be_bytes(body[48..52].try_into().unwrap());
        let body_offset = u64::from_be_bytes(body[52..60].try_into().unwrap());
        let body_sid = u32::from_be_bytes(body[60..64].try_into().unwrap());
        let operational_pattern = UL::from_slice(&body[64..80]).expect("16 bytes");

        let mut essence_containers = Vec::new();
        let count = u32::from_be_bytes(body[80..84].try_into().unwrap()) as usize;
        let mut pos = 88; // count(4) + element_size(4)
        for _ in 0..count {
            if pos + 16 > body.len() {
                break;
            }
            essence_containers.push(UL::from_slice(&body[pos..pos + 16]).expect("16 bytes"));
            pos += 16;
        }

        Ok((
            Self {
                kind,
                status,
                major_version,
                minor_version,
                kag_size,
                this_partition,
                previous_partition,
                footer_partition,
                header_byte_count,
                index_byte_count,
                index_sid,
                body_offset,
                body_sid,
                operational_pattern,
                essence_containers,
            },
            klv,
        ))
    }

    /// Encode this pack's key, BER length, and fixed-layout value, returning
    /// its total on-disk size.
    pub fn write(&self, out: &mut Vec<u8>, diag: &dyn Diagnostics) -> Result<usize> {
        let start = out.len();
        let key = partition_key(self.kind, self.status);

        let mut body = Vec::with_capacity(88 + 16 * self.essence_containers.len());
        body.extend_from_slice(&self.major_version.to_be_bytes());
        body.extend_from_slice(&self.minor_version.to_be_bytes());
        body.extend_from_slice(&self.kag_size.to_be_bytes());
        body.extend_from_slice(&self.this_partition.to_be_bytes());
        body.extend_from_slice(&self.previous_partition.to_be_bytes());
        body.extend_from_slice(&self.footer_partition.to_be_bytes());
        body.extend_from_slice(&self.header_byte_count.to_be_bytes());
        body.extend_from_slice(&self.index_byte_count.to_be_bytes());
        body.extend_from_slice(&self.index_sid.to_be_bytes());
        body.extend_from_slice(&self.body_offset.to_be_bytes());
        body.extend_from_slice(&self.body_sid.to_be_bytes());
        body.extend_from_slice(self.operational_pattern.as_bytes());
        body.extend_from_slice(&(self.essence_containers.len() as u32).to_be_bytes());
        body.extend_from_slice(&16u32.to_be_bytes());
        for ul in &self.essence_containers {
            body.extend_from_slice(ul.as_bytes());
        }

        out.extend_from_slice(key.as_bytes());
        ber::encode(out, body.len() as u64, None, diag)?;
        out.extend_from_slice(&body);
        Ok(out.len() - start)
    }
}

/// One decoded metadata local set (or Primer Pack) read from a partition's
/// header-metadata block.
enum HeaderItem {
    Primer,
    Filler,
    Set(ObjectId),
}

fn read_header_item<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    ctx: &mut MetadataContext,
    registry: &TypeRegistry,
    primer: &mut Primer,
    diag: &dyn Diagnostics,
) -> Result<(HeaderItem, usize)> {
    let mut klv = KLVObject::read_kl(reader, offset)?;
    let consumed_kl = klv.kl_size;
    if klv.key.versionless_eq(&fill_key()) {
        return Ok((HeaderItem::Filler, consumed_kl + klv.length as usize));
    }
    if klv.key.versionless_eq(&primer_key()) {
        klv.read_all_data(reader)?;
        parse_primer_pack(klv.value().expect("just read").as_slice(), primer);
        return Ok((HeaderItem::Primer, consumed_kl + klv.length as usize));
    }
    klv.read_all_data(reader)?;
    let set_type = registry.type_for_ul(&klv.key).unwrap_or("Unknown").to_string();
    let id = decode_set(ctx, registry, primer, &set_type, klv.value().expect("just read").as_slice(), diag)?;
    Ok((HeaderItem::Set(id), consumed_kl + klv.length as usize))
}

fn parse_primer_pack(body: &[u8], primer: &mut Primer) {
    if body.len() < 8 {
        return;
    }
    let count = u32::from_be_bytes(body[0..4].try_into().unwrap()) as usize;
    let elem_size = u32::from_be_bytes(body[4..8].try_into().unwrap()) as usize;
    if elem_size < 18 {
        return;
    }
    let mut pos = 8;
    for _ in 0..count {
        if pos + elem_size > body.len() {
            break;
        }
        let tag = u16::from_be_bytes([body[pos], body[pos + 1]]);
        if let Some(ul) = UL::from_slice(&body[pos + 2..pos + 18]) {
            primer.insert(tag, ul);
        }
        pos += elem_size;
    }
}

fn encode_primer_pack(primer: &Primer) -> Vec<u8> {
    let entries: Vec<(u16, UL)> = primer.entries().collect();
    let mut out = Vec::with_capacity(8 + entries.len() * 18);
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    out.extend_from_slice(&18u32.to_be_bytes());
    for (tag, ul) in entries {
        out.extend_from_slice(&tag.to_be_bytes());
        out.extend_from_slice(ul.as_bytes());
    }
    out
}

/// Read exactly `header_byte_count` bytes of header metadata starting at
/// `offset` (immediately after the partition pack), classifying each item
/// as the Primer Pack, a KLVFill, or a metadata local set, and decoding
/// sets into `ctx`. Returns the object ids of every decoded set, in file
/// order, and registers each with `ctx`'s resolver.
pub fn read_metadata<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    header_byte_count: u64,
    ctx: &mut MetadataContext,
    registry: &TypeRegistry,
    primer: &mut Primer,
    diag: &dyn Diagnostics,
) -> Result<Vec<ObjectId>> {
    let mut pos = offset;
    let end = offset + header_byte_count;
    let mut ids = Vec::new();
    while pos < end {
        let (item, consumed) = read_header_item(reader, pos, ctx, registry, primer, diag)?;
        pos += consumed as u64;
        if let HeaderItem::Set(id) = item {
            ctx.register(id)?;
            ids.push(id);
        }
    }
    if pos != end {
        return Err(Error::HeaderByteCountMismatch { declared: header_byte_count, consumed: pos - offset });
    }
    let unresolved = ctx.resolver.unmatched_ref_count();
    if unresolved > 0 {
        diag.report(&format!("{unresolved} strong/weak reference(s) left unresolved at end of partition"), Some(offset));
    }
    Ok(ids)
}

/// Read exactly `index_byte_count` bytes of index-table data starting at
/// `offset`, decoding each IndexTableSegment local set into `ctx` (filler
/// tolerated anywhere in the block, per spec.md §4.5). Segments are *not*
/// registered with the resolver — they carry no reference fields — so
/// building a typed `IndexTable` from the returned ids is `mxf-index`'s job.
pub fn read_index<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    index_byte_count: u64,
    ctx: &mut MetadataContext,
    registry: &TypeRegistry,
    primer: &Primer,
    diag: &dyn Diagnostics,
) -> Result<Vec<ObjectId>> {
    let mut pos = offset;
    let end = offset + index_byte_count;
    let mut ids = Vec::new();
    while pos < end {
        let mut klv = KLVObject::read_kl(reader, pos)?;
        let consumed_kl = klv.kl_size;
        if klv.key.versionless_eq(&fill_key()) {
            pos += (consumed_kl as u64) + klv.length;
            continue;
        }
        klv.read_all_data(reader)?;
        if klv.key.versionless_eq(&index_segment_key()) {
            let id = decode_set(ctx, registry, primer, "IndexTableSegment", klv.value().expect("just read").as_slice(), diag)?;
            ids.push(id);
        } else {
            diag.report("unrecognised key in index block, skipping", Some(pos));
        }
        pos += (consumed_kl as u64) + klv.length;
    }
    if pos != end {
        return Err(Error::IndexByteCountMismatch { declared: index_byte_count, consumed: pos - offset });
    }
    Ok(ids)
}

/// Options governing how a partition is serialized (spec.md §4.5/§6).
#[derive(Debug, Clone, Copy)]
pub struct PartitionWriteOptions {
    pub kag_size: u64,
    pub force_ber4_fill: bool,
    /// Minimum total partition size (pack + primer + metadata + index +
    /// trailing filler); the trailing filler is widened to reach it.
    pub min_partition_size: u64,
}

impl Default for PartitionWriteOptions {
    fn default() -> Self {
        Self { kag_size: 1, force_ber4_fill: false, min_partition_size: 0 }
    }
}

/// Serialize a full partition: the pack, KAG filler, a Primer Pack (when
/// there is any metadata to carry tags for) followed by the given metadata
/// sets in order, an optional preformatted index block, and trailing filler
/// to the KAG or `min_partition_size`. `pack`'s `header_byte_count`/
/// `index_byte_count` fields are overwritten with the actual encoded sizes;
/// `header_byte_count` includes the leading KAG filler between the pack and
/// the Primer Pack, since that is the span `read_metadata` walks. `primer`
/// accumulates any tags `encode_set` allocates, so the Primer Pack itself is
/// only built once every set has been encoded.
pub fn write_partition(
    mut pack: PartitionPack,
    primer: &mut Primer,
    ctx: &MetadataContext,
    metadata_ids: &[ObjectId],
    registry: &TypeRegistry,
    index_block: Option<&[u8]>,
    opts: PartitionWriteOptions,
    diag: &dyn Diagnostics,
) -> Result<Vec<u8>> {
    let mut sets_block = Vec::new();
    for &id in metadata_ids {
        let type_name = ctx.arena.get(id).type_name.clone();
        let key = crate::localset::member_ul(registry, &type_name);
        let body = encode_set(&ctx.arena, registry, primer, id)?;
        sets_block.extend_from_slice(key.as_bytes());
        ber::encode(&mut sets_block, body.len() as u64, None, diag)?;
        sets_block.extend_from_slice(&body);
    }

    let mut metadata_block = Vec::new();
    if !metadata_ids.is_empty() {
        metadata_block.extend_from_slice(primer_key().as_bytes());
        let body = encode_primer_pack(primer);
        ber::encode(&mut metadata_block, body.len() as u64, None, diag)?;
        metadata_block.extend_from_slice(&body);
    }
    metadata_block.extend_from_slice(&sets_block);

    pack.index_byte_count = index_block.map(|b| b.len() as u64).unwrap_or(0);

    // The leading KAG filler between the pack and the Primer Pack falls
    // inside `header_byte_count` on the read side (`read_metadata` starts
    // counting immediately after the pack, and tolerates filler anywhere in
    // that span), so it has to be folded in here too. The filler's length
    // depends only on the pack's own encoded size, not on the value stored
    // in its `header_byte_count` field, so a throwaway probe write gives us
    // that length before the real `header_byte_count` is known.
    let mut probe = Vec::new();
    pack.write(&mut probe, diag)?;
    let probe_len = probe.len() as u64;
    kag::align_to_kag(&mut probe, 0, opts.kag_size, opts.force_ber4_fill, diag)?;
    let leading_filler_len = probe.len() as u64 - probe_len;

    pack.header_byte_count = leading_filler_len + metadata_block.len() as u64;

    let mut out = Vec::new();
    let partition_start = out.len() as u64;
    pack.write(&mut out, diag)?;
    kag::align_to_kag(&mut out, partition_start, opts.kag_size, opts.force_ber4_fill, diag)?;

    out.extend_from_slice(&metadata_block);
    if let Some(index) = index_block {
        out.extend_from_slice(index);
    }

    if opts.min_partition_size > out.len() as u64 {
        let gap = opts.min_partition_size - out.len() as u64;
        if gap < 17 {
            return Err(Error::PartitionTooLarge { min: opts.min_partition_size, actual: out.len() as u64 });
        }
        kag::write_filler(&mut out, gap, opts.kag_size, opts.force_ber4_fill, diag)?;
    } else {
        kag::align_to_kag(&mut out, partition_start, opts.kag_size, opts.force_ber4_fill, diag)?;
    }

    Ok(out)
}

/// Where this partition's essence begins: end-of-pack + header-byte-count +
/// index-byte-count (spec.md §4.5 "Seek-essence").
pub fn essence_offset(pack_end: u64, pack: &PartitionPack) -> u64 {
    pack_end + pack.header_byte_count + pack.index_byte_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxf_core::StderrDiagnostics;
    use std::io::Cursor;

    #[test]
    fn partition_pack_round_trips() {
        let mut pack = PartitionPack::new(PartitionKind::Header, PartitionStatus::ClosedComplete);
        pack.kag_size = 512;
        pack.body_sid = 1;
        pack.essence_containers.push(UL::new([9; 16]));

        let mut out = Vec::new();
        pack.write(&mut out, &StderrDiagnostics).unwrap();

        let mut cursor = Cursor::new(out);
        let (reread, _klv) = PartitionPack::read(&mut cursor, 0).unwrap();
        assert_eq!(reread.kind, PartitionKind::Header);
        assert_eq!(reread.status, PartitionStatus::ClosedComplete);
        assert_eq!(reread.kag_size, 512);
        assert_eq!(reread.body_sid, 1);
        assert_eq!(reread.essence_containers, vec![UL::new([9; 16])]);
    }

    #[test]
    fn essence_offset_is_pack_end_plus_header_and_index_counts() {
        let mut pack = PartitionPack::new(PartitionKind::Header, PartitionStatus::ClosedComplete);
        pack.header_byte_count = 100;
        pack.index_byte_count = 40;
        assert_eq!(essence_offset(200, &pack), 340);
    }
}
