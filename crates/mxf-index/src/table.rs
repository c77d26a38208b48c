//! [`IndexTable`] — the segment map plus derived quantities spec.md §4.7
//! describes, and its `lookup` operation (the CBR fast path and the VBR
//! binary-search-plus-reorder path).
//!
//! Grounded on `exiftool_core::ifd::IfdReader`'s offset-arithmetic discipline
//! (compute a byte location from a base plus a table-driven stride/delta)
//! generalized from IFD entry offsets to MXF edit-unit addressing.

use std::collections::BTreeMap;

use mxf_types::Rational;

use crate::entry::DeltaEntry;
use crate::segment::{IndexSegment, SegmentBody};
use crate::{Error, Result};

/// Everything a `lookup` call reports back, spec.md §4.7.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    /// The edit unit originally requested.
    pub this_pos: i64,
    /// Byte location of the requested (sub_item's) data.
    pub location: u64,
    /// True when every field below was resolvable (no missing entries).
    pub exact: bool,
    /// True when reordering moved `this_pos` to a different stored entry.
    pub other_pos: bool,
    pub key_frame_offset: i8,
    /// Byte location of the key frame this entry depends on.
    pub key_location: u64,
    pub flags: u8,
}

#[derive(Debug, Clone)]
enum Mode {
    Cbr { edit_unit_byte_count: u64 },
    Vbr { segments: BTreeMap<i64, IndexSegment> },
}

/// A single essence stream's index: one edit rate, one base delta array
/// (shared shape for every edit unit), and either a constant byte stride or
/// a segment map of explicit per-edit-unit entries.
#[derive(Debug, Clone)]
pub struct IndexTable {
    pub edit_rate: Rational,
    base_deltas: Vec<DeltaEntry>,
    /// Number of PosTable entries each [`crate::entry::IndexEntry`] carries;
    /// not derivable from the delta array, so configured explicitly.
    npe: usize,
    mode: Mode,
}

impl IndexTable {
    pub fn new_cbr(edit_rate: Rational, base_deltas: Vec<DeltaEntry>, edit_unit_byte_count: u64) -> Self {
        IndexTable { edit_rate, base_deltas, npe: 0, mode: Mode::Cbr { edit_unit_byte_count } }
    }

    pub fn new_vbr(edit_rate: Rational, base_deltas: Vec<DeltaEntry>, npe: usize) -> Self {
        IndexTable { edit_rate, base_deltas, npe, mode: Mode::Vbr { segments: BTreeMap::new() } }
    }

    /// Empty VBR table with no deltas configured yet (spec.md §7's
    /// "requesting an IndexTable with unconfigured deltas" precondition
    /// error fires from here until `set_base_deltas` is called).
    pub fn empty(edit_rate: Rational) -> Self {
        IndexTable { edit_rate, base_deltas: Vec::new(), npe: 0, mode: Mode::Vbr { segments: BTreeMap::new() } }
    }

    pub fn set_base_deltas(&mut self, deltas: Vec<DeltaEntry>) {
        self.base_deltas = deltas;
    }

    pub fn base_deltas(&self) -> &[DeltaEntry] {
        &self.base_deltas
    }

    pub fn is_cbr(&self) -> bool {
        matches!(self.mode, Mode::Cbr { .. })
    }

    /// `NSL`: slice count minus one.
    pub fn nsl(&self) -> usize {
        self.base_deltas.len().saturating_sub(1)
    }

    /// `NPE`: number of PosTable entries per index entry.
    pub fn npe(&self) -> usize {
        self.npe
    }

    pub fn index_entry_size(&self) -> usize {
        11 + 4 * self.nsl() + 8 * self.npe()
    }

    /// Parse a decoded `IndexTableSegment` MDObject and fold it into this
    /// table (spec.md §4.7 `add_segment`). The first segment's delta array
    /// becomes the table's base array; subsequent segments must agree on
    /// its shape.
    pub fn add_segment_from_mdobject(&mut self, arena: &mxf_metadata::MetadataArena, id: mxf_metadata::ObjectId) -> Result<()> {
        let segment = IndexSegment::from_mdobject(arena, id)?;
        self.add_segment(segment)
    }

    pub fn add_segment(&mut self, segment: IndexSegment) -> Result<()> {
        if self.base_deltas.is_empty() {
            self.base_deltas = segment.delta_entries.clone();
        } else if segment.delta_entries.len() != self.base_deltas.len() {
            return Err(Error::IndexTypeMismatch);
        }

        match (&mut self.mode, &segment.body) {
            (Mode::Cbr { edit_unit_byte_count }, SegmentBody::Cbr { edit_unit_byte_count: seg_count }) => {
                *edit_unit_byte_count = *seg_count;
                Ok(())
            }
            (Mode::Vbr { segments }, SegmentBody::Vbr { .. }) => {
                segments.insert(segment.start_position, segment);
                Ok(())
            }
            _ => Err(Error::IndexTypeMismatch),
        }
    }

    /// spec.md §4.7 `add_index_entry`: append to the segment covering
    /// `edit_unit`, creating a fresh VBR segment at `edit_unit` if none
    /// does. Only valid for a VBR table.
    #[allow(clippy::too_many_arguments)]
    pub fn add_index_entry(
        &mut self,
        body_sid: u32,
        index_sid: u32,
        edit_unit: i64,
        temporal_offset: i8,
        anchor_offset: i8,
        flags: u8,
        stream_offset: u64,
        slice_offsets: Vec<u32>,
        pos_table: Vec<Rational>,
    ) -> Result<()> {
        let Mode::Vbr { segments } = &mut self.mode else {
            return Err(Error::NotVbr);
        };
        let entry = crate::entry::IndexEntry { temporal_offset, anchor_offset, flags, stream_offset, slice_offsets, pos_table };

        if let Some((_, seg)) = segments.range_mut(..=edit_unit).next_back().filter(|(_, s)| s.covers(edit_unit)) {
            return seg.push_entry(entry);
        }
        let mut seg = IndexSegment::new_vbr(index_sid, body_sid, self.edit_rate, edit_unit, self.base_deltas.clone());
        seg.push_entry(entry)?;
        segments.insert(edit_unit, seg);
        Ok(())
    }

    fn find_segment(&self, edit_unit: i64) -> Option<&IndexSegment> {
        match &self.mode {
            Mode::Cbr { .. } => None,
            Mode::Vbr { segments } => segments.range(..=edit_unit).next_back().map(|(_, s)| s).filter(|s| s.covers(edit_unit)),
        }
    }

    /// spec.md §4.7/§8: `lookup(edit_unit, sub_item, reorder)`.
    pub fn lookup(&self, container_start: u64, edit_unit: i64, sub_item: usize, reorder: bool) -> Result<LookupResult> {
        if self.base_deltas.is_empty() {
            return Err(Error::DeltasNotConfigured);
        }
        let delta = self
            .base_deltas
            .get(sub_item)
            .ok_or(Error::SubItemOutOfRange { sub_item, len: self.base_deltas.len() })?;

        match &self.mode {
            Mode::Cbr { edit_unit_byte_count } => {
                let location = container_start + (edit_unit as u64) * edit_unit_byte_count + delta.element_delta as u64;
                Ok(LookupResult {
                    this_pos: edit_unit,
                    location,
                    exact: true,
                    other_pos: false,
                    key_frame_offset: 0,
                    key_location: location,
                    flags: 0,
                })
            }
            Mode::Vbr { .. } => self.lookup_vbr(container_start, edit_unit, delta, reorder),
        }
    }

    fn lookup_vbr(&self, container_start: u64, edit_unit: i64, delta: &DeltaEntry, reorder: bool) -> Result<LookupResult> {
        let segment = self.find_segment(edit_unit).ok_or(Error::EditUnitNotCovered(edit_unit))?;
        let SegmentBody::Vbr { entries } = &segment.body else {
            unreachable!("find_segment only returns VBR segments");
        };
        let naive_index = (edit_unit - segment.start_position) as usize;
        let naive_entry = entries.get(naive_index).ok_or(Error::EditUnitNotCovered(edit_unit))?;

        let (present_index, present_entry, other_pos) = if reorder && naive_entry.temporal_offset != 0 {
            let idx = naive_index as i64 + naive_entry.temporal_offset as i64;
            match usize::try_from(idx).ok().and_then(|i| entries.get(i).map(|e| (i, e))) {
                Some((i, e)) => (i, e, i != naive_index),
                None => (naive_index, naive_entry, false),
            }
        } else {
            (naive_index, naive_entry, false)
        };

        let location = container_start + present_entry.stream_offset + delta.element_delta as u64;

        let anchor_idx = present_index as i64 + present_entry.anchor_offset as i64;
        let (key_location, exact) = match usize::try_from(anchor_idx).ok().and_then(|i| entries.get(i)) {
            Some(anchor_entry) => (container_start + anchor_entry.stream_offset + delta.element_delta as u64, true),
            None => (location, false),
        };

        Ok(LookupResult {
            this_pos: edit_unit,
            location,
            exact,
            other_pos,
            key_frame_offset: present_entry.anchor_offset,
            key_location,
            flags: present_entry.flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::IndexEntry;

    fn delta(n: u32) -> DeltaEntry {
        DeltaEntry { pos_table_index: 0, slice: 0, element_delta: n }
    }

    #[test]
    fn cbr_lookup_matches_the_spec_formula() {
        // spec.md §8: lookup(n, i).location = container_start + n*B + D[i].
        let table = IndexTable::new_cbr(Rational::new(25, 1), vec![delta(0), delta(4)], 1920);
        for n in 0..5i64 {
            for i in 0..2usize {
                let got = table.lookup(1000, n, i, false).unwrap();
                let want = 1000 + n as u64 * 1920 + if i == 0 { 0 } else { 4 };
                assert_eq!(got.location, want);
                assert!(got.exact);
            }
        }
    }

    #[test]
    fn vbr_reorder_scenario_4() {
        // spec.md §8 scenario 4: 3-entry VBR segment, temporal_offset =
        // {0, 1, -1}, anchor_offset = {0, -1, -2}.
        let mut table = IndexTable::new_vbr(Rational::new(25, 1), vec![delta(0)], 0);
        let mut seg = IndexSegment::new_vbr(1, 1, Rational::new(25, 1), 0, vec![delta(0)]);
        let offsets = [(0i8, 0i8, 0u64), (1, -1, 100), (-1, -2, 200)];
        for (temporal_offset, anchor_offset, stream_offset) in offsets {
            seg.push_entry(IndexEntry { temporal_offset, anchor_offset, flags: 0, stream_offset, slice_offsets: vec![], pos_table: vec![] }).unwrap();
        }
        table.add_segment(seg).unwrap();

        let result = table.lookup(0, 1, 0, true).unwrap();
        assert_eq!(result.this_pos, 1);
        assert!(result.other_pos);
        assert_eq!(result.location, 200); // entry originally stored at index 2
        assert_eq!(result.key_location, 0); // entry 0's stream_offset
    }

    #[test]
    fn lookup_without_deltas_is_a_precondition_error() {
        let table = IndexTable::empty(Rational::new(25, 1));
        assert!(matches!(table.lookup(0, 0, 0, false), Err(Error::DeltasNotConfigured)));
    }

    #[test]
    fn add_index_entry_creates_a_new_segment_when_none_covers_the_edit_unit() {
        let mut table = IndexTable::new_vbr(Rational::new(25, 1), vec![delta(0)], 0);
        table.add_index_entry(1, 1, 0, 0, 0, 0, 0, vec![], vec![]).unwrap();
        table.add_index_entry(1, 1, 50, 0, 0, 0, 5000, vec![], vec![]).unwrap();
        let r0 = table.lookup(0, 0, 0, false).unwrap();
        let r50 = table.lookup(0, 50, 0, false).unwrap();
        assert_eq!(r0.location, 0);
        assert_eq!(r50.location, 5000);
    }
}
