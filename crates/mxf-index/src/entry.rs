//! [`DeltaEntry`] and [`IndexEntry`] — the fixed-size records an
//! `IndexTableSegment`'s `DeltaEntryArray`/`IndexEntryArray` batches hold,
//! plus their length-prefixed batch wire format (spec.md §6 "Index table
//! wire format").
//!
//! Grounded on `mxf_klv::localset`'s batch framing (a 4-byte count + 4-byte
//! element-size header ahead of fixed-size elements), the same shape this
//! crate's arrays use, specialised to these two record types instead of
//! local-set members.

use mxf_types::Rational;

use crate::{Error, Result};

/// One stream's per-edit-unit sub-structure: which PosTable row (if any)
/// applies, which slice, and the intra-edit-unit byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaEntry {
    pub pos_table_index: i8,
    pub slice: u8,
    pub element_delta: u32,
}

impl DeltaEntry {
    pub const WIRE_SIZE: usize = 6;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.pos_table_index as u8);
        out.push(self.slice);
        out.extend_from_slice(&self.element_delta.to_be_bytes());
    }

    fn decode(b: &[u8]) -> Self {
        DeltaEntry { pos_table_index: b[0] as i8, slice: b[1], element_delta: u32::from_be_bytes([b[2], b[3], b[4], b[5]]) }
    }
}

/// One edit unit's index record: spec.md §6's `1+1+1+8 + NSL*4 + NPE*8`
/// layout, where `NSL`/`NPE` are table-wide constants carried separately
/// (an entry doesn't know its own shape; [`crate::table::IndexTable`] does).
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub temporal_offset: i8,
    pub anchor_offset: i8,
    pub flags: u8,
    pub stream_offset: u64,
    pub slice_offsets: Vec<u32>,
    pub pos_table: Vec<Rational>,
}

impl IndexEntry {
    pub fn wire_size(nsl: usize, npe: usize) -> usize {
        11 + 4 * nsl + 8 * npe
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.temporal_offset as u8);
        out.push(self.anchor_offset as u8);
        out.push(self.flags);
        out.extend_from_slice(&self.stream_offset.to_be_bytes());
        for slice in &self.slice_offsets {
            out.extend_from_slice(&slice.to_be_bytes());
        }
        for pos in &self.pos_table {
            out.extend_from_slice(&pos.numerator.to_be_bytes());
            out.extend_from_slice(&pos.denominator.to_be_bytes());
        }
    }

    fn decode(b: &[u8], nsl: usize, npe: usize) -> Self {
        let temporal_offset = b[0] as i8;
        let anchor_offset = b[1] as i8;
        let flags = b[2];
        let stream_offset = u64::from_be_bytes(b[3..11].try_into().unwrap());
        let mut slice_offsets = Vec::with_capacity(nsl);
        let mut cursor = 11;
        for _ in 0..nsl {
            slice_offsets.push(u32::from_be_bytes(b[cursor..cursor + 4].try_into().unwrap()));
            cursor += 4;
        }
        let mut pos_table = Vec::with_capacity(npe);
        for _ in 0..npe {
            let num = i32::from_be_bytes(b[cursor..cursor + 4].try_into().unwrap());
            let den = i32::from_be_bytes(b[cursor + 4..cursor + 8].try_into().unwrap());
            pos_table.push(Rational::new(num, den));
            cursor += 8;
        }
        IndexEntry { temporal_offset, anchor_offset, flags, stream_offset, slice_offsets, pos_table }
    }
}

/// Encode a length-prefixed batch: 4-byte count, 4-byte element size, then
/// the elements back to back.
pub fn encode_delta_array(deltas: &[DeltaEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + deltas.len() * DeltaEntry::WIRE_SIZE);
    out.extend_from_slice(&(deltas.len() as u32).to_be_bytes());
    out.extend_from_slice(&(DeltaEntry::WIRE_SIZE as u32).to_be_bytes());
    for d in deltas {
        d.encode(&mut out);
    }
    out
}

pub fn decode_delta_array(bytes: &[u8]) -> Result<Vec<DeltaEntry>> {
    if bytes.len() < 8 {
        return Err(Error::EntryCountMismatch { declared: 0, actual: 0 });
    }
    let count = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let elem_size = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
    if elem_size != DeltaEntry::WIRE_SIZE {
        return Err(Error::ElementSizeMismatch { declared: elem_size, expected: DeltaEntry::WIRE_SIZE });
    }
    let body = &bytes[8..];
    if body.len() != count * elem_size {
        return Err(Error::EntryCountMismatch { declared: count, actual: body.len() / elem_size.max(1) });
    }
    Ok(body.chunks_exact(elem_size).map(DeltaEntry::decode).collect())
}

pub fn encode_entry_array(entries: &[IndexEntry], nsl: usize, npe: usize) -> Vec<u8> {
    let elem_size = IndexEntry::wire_size(nsl, npe);
    let mut out = Vec::with_capacity(8 + entries.len() * elem_size);
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    out.extend_from_slice(&(elem_size as u32).to_be_bytes());
    for e in entries {
        e.encode(&mut out);
    }
    out
}

pub fn decode_entry_array(bytes: &[u8], nsl: usize, npe: usize) -> Result<Vec<IndexEntry>> {
    if bytes.len() < 8 {
        return Err(Error::EntryCountMismatch { declared: 0, actual: 0 });
    }
    let count = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let elem_size = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let expected = IndexEntry::wire_size(nsl, npe);
    if elem_size != expected {
        return Err(Error::ElementSizeMismatch { declared: elem_size, expected });
    }
    let body = &bytes[8..];
    if body.len() != count * elem_size {
        return Err(Error::EntryCountMismatch { declared: count, actual: body.len() / elem_size.max(1) });
    }
    Ok(body.chunks_exact(elem_size).map(|c| IndexEntry::decode(c, nsl, npe)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_array_round_trips() {
        let deltas = vec![
            DeltaEntry { pos_table_index: 0, slice: 0, element_delta: 0 },
            DeltaEntry { pos_table_index: -1, slice: 1, element_delta: 48 },
        ];
        let wire = encode_delta_array(&deltas);
        assert_eq!(decode_delta_array(&wire).unwrap(), deltas);
    }

    #[test]
    fn entry_array_round_trips_with_slices_and_postable() {
        let entries = vec![IndexEntry {
            temporal_offset: 1,
            anchor_offset: -1,
            flags: 0x80,
            stream_offset: 12345,
            slice_offsets: vec![10, 20],
            pos_table: vec![Rational::new(1, 2)],
        }];
        let wire = encode_entry_array(&entries, 2, 1);
        assert_eq!(decode_entry_array(&wire, 2, 1).unwrap(), entries);
    }

    #[test]
    fn entry_array_rejects_mismatched_element_size() {
        let wire = encode_entry_array(&[], 0, 0);
        assert!(matches!(decode_entry_array(&wire, 1, 0), Err(Error::ElementSizeMismatch { .. })));
    }
}
