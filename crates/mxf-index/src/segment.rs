//! [`IndexSegment`] — one `IndexTableSegment`'s worth of index data: a span
//! of edit units covered by either a constant `edit_unit_byte_count` (CBR)
//! or a flat array of [`IndexEntry`] records (VBR), spec.md §4.7/§6.
//!
//! `from_mdobject` is grounded on `exiftool_formats::riff::parse_info`'s
//! "walk named children, decode the ones you recognise" shape, adapted from
//! RIFF chunk IDs to MXF property names.

use mxf_metadata::{MetadataArena, ObjectId};
use mxf_types::traits::{Int64Traits, MDTraits, UInt32Traits, UInt64Traits};
use mxf_types::Rational;

use crate::entry::{decode_delta_array, decode_entry_array, encode_delta_array, encode_entry_array, DeltaEntry, IndexEntry};
use crate::{Error, Result};

/// Either a segment's declared body is constant-bitrate (one byte count
/// covers every edit unit in the segment's range) or it carries an explicit
/// per-edit-unit entry array.
#[derive(Debug, Clone)]
pub enum SegmentBody {
    Cbr { edit_unit_byte_count: u64 },
    Vbr { entries: Vec<IndexEntry> },
}

#[derive(Debug, Clone)]
pub struct IndexSegment {
    pub index_sid: u32,
    pub body_sid: u32,
    pub index_edit_rate: Rational,
    pub start_position: i64,
    /// Segment's declared duration; for VBR this is `entries.len()` once
    /// the segment is complete, `-1` while still being accumulated.
    pub duration: i64,
    pub delta_entries: Vec<DeltaEntry>,
    pub body: SegmentBody,
}

impl IndexSegment {
    pub fn new_vbr(index_sid: u32, body_sid: u32, index_edit_rate: Rational, start_position: i64, delta_entries: Vec<DeltaEntry>) -> Self {
        IndexSegment { index_sid, body_sid, index_edit_rate, start_position, duration: 0, delta_entries, body: SegmentBody::Vbr { entries: Vec::new() } }
    }

    pub fn new_cbr(index_sid: u32, body_sid: u32, index_edit_rate: Rational, start_position: i64, duration: i64, delta_entries: Vec<DeltaEntry>, edit_unit_byte_count: u64) -> Self {
        IndexSegment { index_sid, body_sid, index_edit_rate, start_position, duration, delta_entries, body: SegmentBody::Cbr { edit_unit_byte_count } }
    }

    pub fn is_cbr(&self) -> bool {
        matches!(self.body, SegmentBody::Cbr { .. })
    }

    /// Range of edit units `[start_position, end)` this segment covers.
    /// `None` for an open-ended CBR segment (`duration < 0`, meaning
    /// "extends to the next segment or end of essence").
    pub fn end_position(&self) -> Option<i64> {
        match &self.body {
            SegmentBody::Vbr { entries } => Some(self.start_position + entries.len() as i64),
            SegmentBody::Cbr { .. } if self.duration >= 0 => Some(self.start_position + self.duration),
            SegmentBody::Cbr { .. } => None,
        }
    }

    pub fn covers(&self, edit_unit: i64) -> bool {
        if edit_unit < self.start_position {
            return false;
        }
        match self.end_position() {
            Some(end) => edit_unit < end,
            None => true,
        }
    }

    fn child_int64(arena: &MetadataArena, id: ObjectId, name: &str) -> Result<i64> {
        let obj = arena.get(arena.get(id).child(name)?);
        Ok(Int64Traits.get_int64(obj.value().ok_or(mxf_metadata::Error::NotCompound)?)?)
    }

    fn child_uint(arena: &MetadataArena, id: ObjectId, name: &str) -> Result<u64> {
        let child_id = arena.get(id).child(name)?;
        let obj = arena.get(child_id);
        let chunk = obj.value().ok_or(mxf_metadata::Error::NotCompound)?;
        match chunk.len() {
            4 => Ok(UInt32Traits.get_uint64(chunk)? ),
            _ => Ok(UInt64Traits.get_uint64(chunk)?),
        }
    }

    fn child_rational(arena: &MetadataArena, id: ObjectId, name: &str) -> Result<Rational> {
        let child_id = arena.get(id).child(name)?;
        let chunk = arena.get(child_id).value().ok_or(mxf_metadata::Error::NotCompound)?;
        Ok(mxf_types::traits::RationalTraits::decode(chunk)?)
    }

    /// Parse an already-decoded `IndexTableSegment` node (spec.md §6 local
    /// set) into an [`IndexSegment`]. `DeltaEntryArray`/`IndexEntryArray`
    /// are carried as opaque leaf bytes (the raw batch), decoded here rather
    /// than by `mxf-klv`'s generic local-set decoder.
    pub fn from_mdobject(arena: &MetadataArena, id: ObjectId) -> Result<Self> {
        let index_sid = Self::child_uint(arena, id, "IndexSID")? as u32;
        let body_sid = Self::child_uint(arena, id, "BodySID")? as u32;
        let index_edit_rate = Self::child_rational(arena, id, "IndexEditRate")?;
        let start_position = Self::child_int64(arena, id, "IndexStartPosition")?;
        let duration = Self::child_int64(arena, id, "IndexDuration")?;

        let obj = arena.get(id);
        let delta_entries = match obj.child("DeltaEntryArray") {
            Ok(child_id) => decode_delta_array(arena.get(child_id).value().ok_or(mxf_metadata::Error::NotCompound)?.as_slice())?,
            Err(_) => Vec::new(),
        };

        let edit_unit_byte_count = match obj.child("EditUnitByteCount") {
            Ok(_) => Self::child_uint(arena, id, "EditUnitByteCount")?,
            Err(_) => 0,
        };

        if edit_unit_byte_count > 0 {
            return Ok(IndexSegment::new_cbr(index_sid, body_sid, index_edit_rate, start_position, duration, delta_entries, edit_unit_byte_count));
        }

        let nsl = delta_entries.len().saturating_sub(1);
        let npe = delta_entries.iter().filter(|d| d.pos_table_index > 0).map(|d| d.pos_table_index as usize).max().unwrap_or(0);
        let entries = match obj.child("IndexEntryArray") {
            Ok(child_id) => decode_entry_array(arena.get(child_id).value().ok_or(mxf_metadata::Error::NotCompound)?.as_slice(), nsl, npe)?,
            Err(_) => Vec::new(),
        };

        Ok(IndexSegment { index_sid, body_sid, index_edit_rate, start_position, duration, delta_entries, body: SegmentBody::Vbr { entries } })
    }

    /// Re-encode this segment's arrays for writing (callers assemble the
    /// surrounding local set; this crate does not depend on `mxf-klv`).
    pub fn encode_arrays(&self, nsl: usize, npe: usize) -> (Vec<u8>, Vec<u8>) {
        let deltas = encode_delta_array(&self.delta_entries);
        let entries = match &self.body {
            SegmentBody::Vbr { entries } => encode_entry_array(entries, nsl, npe),
            SegmentBody::Cbr { .. } => encode_entry_array(&[], nsl, npe),
        };
        (deltas, entries)
    }

    pub fn push_entry(&mut self, entry: IndexEntry) -> Result<()> {
        match &mut self.body {
            SegmentBody::Vbr { entries } => {
                entries.push(entry);
                self.duration = entries.len() as i64;
                Ok(())
            }
            SegmentBody::Cbr { .. } => Err(Error::NotVbr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbr_segment_has_no_entry_array() {
        let seg = IndexSegment::new_cbr(1, 1, Rational::new(25, 1), 0, 10, vec![DeltaEntry { pos_table_index: 0, slice: 0, element_delta: 0 }], 1920);
        assert!(seg.is_cbr());
        assert_eq!(seg.end_position(), Some(10));
        assert!(seg.covers(5));
        assert!(!seg.covers(10));
    }

    #[test]
    fn vbr_segment_grows_its_range_as_entries_are_pushed() {
        let mut seg = IndexSegment::new_vbr(1, 1, Rational::new(25, 1), 100, vec![]);
        assert_eq!(seg.end_position(), Some(100));
        seg.push_entry(IndexEntry { temporal_offset: 0, anchor_offset: 0, flags: 0, stream_offset: 0, slice_offsets: vec![], pos_table: vec![] }).unwrap();
        assert_eq!(seg.end_position(), Some(101));
        assert!(seg.covers(100));
        assert!(!seg.covers(101));
    }
}
