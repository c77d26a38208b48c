//! [`ReorderIndex`] — buffers index entries by edit unit until both halves
//! of an entry (stream offset, temporal placement) are known, then commits
//! contiguous complete runs into a target [`IndexTable`] (spec.md §4.7).
//!
//! Grounded on `exiftool_formats::riff::parse_info`'s "accumulate chunks,
//! commit once a complete unit is seen" shape, generalized from whole-chunk
//! completeness to the two independent completeness axes an index entry has.

use std::collections::BTreeMap;

use mxf_types::Rational;

use crate::table::IndexTable;
use crate::Result;

#[derive(Debug, Clone, Default)]
pub(crate) struct PendingEntry {
    pub(crate) stream_offset: Option<u64>,
    pub(crate) temporal_offset: Option<i8>,
    pub(crate) anchor_offset: i8,
    pub(crate) flags: u8,
    pub(crate) slice_offsets: Vec<u32>,
    pub(crate) pos_table: Vec<Rational>,
}

impl PendingEntry {
    fn is_complete(&self) -> bool {
        self.stream_offset.is_some() && self.temporal_offset.is_some()
    }
}

/// Per-stream entry buffer keyed by edit unit. `commit_ready` drains the
/// longest complete prefix starting at the lowest not-yet-committed edit
/// unit into an [`IndexTable`].
pub struct ReorderIndex {
    body_sid: u32,
    index_sid: u32,
    pending: BTreeMap<i64, PendingEntry>,
    next_commit: i64,
}

impl ReorderIndex {
    pub fn new(body_sid: u32, index_sid: u32, start_edit_unit: i64) -> Self {
        ReorderIndex { body_sid, index_sid, pending: BTreeMap::new(), next_commit: start_edit_unit }
    }

    fn entry_mut(&mut self, edit_unit: i64) -> &mut PendingEntry {
        self.pending.entry(edit_unit).or_default()
    }

    pub fn set_stream_offset(&mut self, edit_unit: i64, byte_offset: u64) {
        self.entry_mut(edit_unit).stream_offset = Some(byte_offset);
    }

    pub fn set_temporal(&mut self, edit_unit: i64, temporal_offset: i8, anchor_offset: i8) {
        let entry = self.entry_mut(edit_unit);
        entry.temporal_offset = Some(temporal_offset);
        entry.anchor_offset = anchor_offset;
    }

    pub fn set_flags(&mut self, edit_unit: i64, flags: u8) {
        self.entry_mut(edit_unit).flags = flags;
    }

    pub fn set_slices(&mut self, edit_unit: i64, slice_offsets: Vec<u32>, pos_table: Vec<Rational>) {
        let entry = self.entry_mut(edit_unit);
        entry.slice_offsets = slice_offsets;
        entry.pos_table = pos_table;
    }

    /// Count of buffered entries whose stream offset is known.
    pub fn stream_known_count(&self) -> usize {
        self.pending.values().filter(|e| e.stream_offset.is_some()).count()
    }

    /// Count of buffered entries whose temporal offset is known.
    pub fn temporal_known_count(&self) -> usize {
        self.pending.values().filter(|e| e.temporal_offset.is_some()).count()
    }

    /// Commit the longest contiguous run of complete entries starting at
    /// `next_commit` into `table`, returning how many were committed.
    pub fn commit_ready(&mut self, table: &mut IndexTable) -> Result<usize> {
        let mut committed = 0;
        loop {
            let Some(entry) = self.pending.get(&self.next_commit) else { break };
            if !entry.is_complete() {
                break;
            }
            let entry = self.pending.remove(&self.next_commit).unwrap();
            table.add_index_entry(
                self.body_sid,
                self.index_sid,
                self.next_commit,
                entry.temporal_offset.unwrap(),
                entry.anchor_offset,
                entry.flags,
                entry.stream_offset.unwrap(),
                entry.slice_offsets,
                entry.pos_table,
            )?;
            self.next_commit += 1;
            committed += 1;
        }
        Ok(committed)
    }

    /// Iterate `[first, last)` buffered entries that are complete, removing
    /// them; used by [`crate::manager::IndexManager::add_entries_to_index`].
    pub(crate) fn drain_complete_range(&mut self, first: i64, last: i64) -> Vec<(i64, PendingEntry)> {
        let keys: Vec<i64> = self.pending.range(first..last).filter(|(_, e)| e.is_complete()).map(|(k, _)| *k).collect();
        keys.into_iter().map(|k| (k, self.pending.remove(&k).unwrap())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::DeltaEntry;

    #[test]
    fn commits_only_a_contiguous_complete_prefix() {
        let mut table = IndexTable::new_vbr(Rational::new(25, 1), vec![DeltaEntry { pos_table_index: 0, slice: 0, element_delta: 0 }], 0);
        let mut reorder = ReorderIndex::new(1, 1, 0);

        reorder.set_stream_offset(0, 0);
        reorder.set_temporal(0, 0, 0);
        reorder.set_stream_offset(1, 100);
        // edit unit 1's temporal offset is still unknown; edit unit 2 is
        // fully known but must wait behind the gap at 1.
        reorder.set_stream_offset(2, 200);
        reorder.set_temporal(2, 0, 0);

        let committed = reorder.commit_ready(&mut table).unwrap();
        assert_eq!(committed, 1);
        assert_eq!(reorder.stream_known_count(), 2);
        assert_eq!(reorder.temporal_known_count(), 1);

        reorder.set_temporal(1, 0, 0);
        let committed = reorder.commit_ready(&mut table).unwrap();
        assert_eq!(committed, 2);
        assert_eq!(reorder.stream_known_count(), 0);
    }
}
