//! [`IndexManager`] — the offer/commit API an essence parser drives while it
//! walks a file, sitting on top of [`ReorderIndex`] so the parser never has
//! to reason about entry completeness or buffering itself (spec.md §4.7).
//!
//! Grounded on `exiftool_formats::riff::parse_info`'s accumulate-then-commit
//! shape, the same source `ReorderIndex` itself is grounded on, one layer up:
//! where `ReorderIndex` tracks completeness of a single edit unit's two
//! halves, `IndexManager` tracks which *offer call* contributed which half
//! and exposes that as a small, parser-friendly vocabulary of verbs.

use std::collections::HashMap;

use mxf_types::Rational;

use crate::entry::DeltaEntry;
use crate::reorder::ReorderIndex;
use crate::table::IndexTable;
use crate::{Error, Result};

/// A token handed out by [`IndexManager::log_next_entry`], redeemed later via
/// [`IndexManager::resolve_entry`] once the parser knows whether the offer it
/// was about to make actually landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryToken(i64);

#[derive(Debug, Clone, Copy, Default)]
struct AnchorMeta {
    anchor_offset: i8,
    flags: u8,
    temporal_offset: Option<i8>,
}

enum Mode {
    Cbr { edit_unit_byte_count: u64 },
    Vbr { reorder: ReorderIndex, anchors: HashMap<i64, AnchorMeta>, slices: HashMap<i64, (Vec<u32>, Vec<Rational>)> },
}

/// Buffers offers from an essence parser and folds complete entries into a
/// growing [`IndexTable`]. One manager per essence track (one `BodySID`/
/// `IndexSID` pair).
pub struct IndexManager {
    edit_rate: Rational,
    body_sid: u32,
    index_sid: u32,
    base_deltas: Vec<DeltaEntry>,
    npe: usize,
    mode: Mode,
    auto_cursor: i64,
}

impl IndexManager {
    pub fn new_cbr(edit_rate: Rational, body_sid: u32, index_sid: u32, base_deltas: Vec<DeltaEntry>, edit_unit_byte_count: u64) -> Self {
        IndexManager {
            edit_rate,
            body_sid,
            index_sid,
            base_deltas,
            npe: 0,
            mode: Mode::Cbr { edit_unit_byte_count },
            auto_cursor: 0,
        }
    }

    pub fn new_vbr(edit_rate: Rational, body_sid: u32, index_sid: u32, base_deltas: Vec<DeltaEntry>, npe: usize, start_edit_unit: i64) -> Self {
        IndexManager {
            edit_rate,
            body_sid,
            index_sid,
            base_deltas,
            npe,
            mode: Mode::Vbr { reorder: ReorderIndex::new(body_sid, index_sid, start_edit_unit), anchors: HashMap::new(), slices: HashMap::new() },
            auto_cursor: start_edit_unit,
        }
    }

    pub fn is_cbr(&self) -> bool {
        matches!(self.mode, Mode::Cbr { .. })
    }

    fn anchor_entry(anchors: &mut HashMap<i64, AnchorMeta>, edit_unit: i64) -> &mut AnchorMeta {
        anchors.entry(edit_unit).or_default()
    }

    /// Record that `edit_unit` is a whole edit unit starting at `key_offset`
    /// edit units before the nearest preceding key frame, with the given
    /// frame flags. `sub_stream` 0 is the primary (frame-wrapped) stream;
    /// offers from other sub-streams only ever contribute slice data and are
    /// ignored here.
    pub fn offer_edit_unit(&mut self, sub_stream: usize, edit_unit: i64, key_offset: i8, flags: u8) {
        if sub_stream != 0 {
            return;
        }
        let Mode::Vbr { reorder, anchors, .. } = &mut self.mode else { return };
        let meta = Self::anchor_entry(anchors, edit_unit);
        meta.anchor_offset = key_offset;
        meta.flags = flags;
        reorder.set_flags(edit_unit, flags);
        if let Some(temporal) = meta.temporal_offset {
            reorder.set_temporal(edit_unit, temporal, key_offset);
        }
        self.auto_cursor = self.auto_cursor.max(edit_unit + 1);
    }

    /// Record the byte offset of `edit_unit`'s data (sub_stream 0) or of one
    /// of its slices (sub_stream > 0, 1-indexed into the delta array after
    /// the primary).
    #[allow(clippy::too_many_arguments)]
    pub fn offer_offset(&mut self, sub_stream: usize, edit_unit: i64, byte_offset: u64, key_offset: Option<i8>, flags: Option<u8>) {
        let Mode::Vbr { reorder, anchors, slices } = &mut self.mode else { return };
        if sub_stream == 0 {
            reorder.set_stream_offset(edit_unit, byte_offset);
            self.auto_cursor = self.auto_cursor.max(edit_unit + 1);
        } else {
            let entry = slices.entry(edit_unit).or_default();
            let idx = sub_stream - 1;
            if entry.0.len() <= idx {
                entry.0.resize(idx + 1, 0);
            }
            entry.0[idx] = byte_offset as u32;
            reorder.set_slices(edit_unit, entry.0.clone(), entry.1.clone());
        }
        if key_offset.is_some() || flags.is_some() {
            let meta = Self::anchor_entry(anchors, edit_unit);
            if let Some(k) = key_offset {
                meta.anchor_offset = k;
            }
            if let Some(f) = flags {
                meta.flags = f;
                reorder.set_flags(edit_unit, f);
            }
        }
    }

    /// Record `edit_unit`'s temporal (display-vs-coding-order) displacement.
    pub fn offer_temporal_offset(&mut self, edit_unit: i64, offset: i8) {
        let Mode::Vbr { reorder, anchors, .. } = &mut self.mode else { return };
        let meta = Self::anchor_entry(anchors, edit_unit);
        meta.temporal_offset = Some(offset);
        reorder.set_temporal(edit_unit, offset, meta.anchor_offset);
    }

    /// Record (or correct) `edit_unit`'s key-frame anchor offset after a
    /// temporal offset has already been offered for it.
    pub fn offer_key_offset(&mut self, edit_unit: i64, offset: i8) {
        let Mode::Vbr { reorder, anchors, .. } = &mut self.mode else { return };
        let meta = Self::anchor_entry(anchors, edit_unit);
        meta.anchor_offset = offset;
        if let Some(temporal) = meta.temporal_offset {
            reorder.set_temporal(edit_unit, temporal, offset);
        }
    }

    /// A token naming the edit unit the manager currently expects the next
    /// primary-stream offer to land on. Redeem with [`Self::resolve_entry`].
    pub fn log_next_entry(&self) -> EntryToken {
        EntryToken(self.auto_cursor)
    }

    /// The edit unit number a previously issued token refers to. Always
    /// resolvable: the cursor only ever advances forward.
    pub fn resolve_entry(&self, token: EntryToken) -> i64 {
        token.0
    }

    /// Fresh [`IndexTable`] initialised from this manager's edit rate and
    /// base delta array: CBR if this manager is driving a constant-bitrate
    /// stream, otherwise an empty VBR table ready for
    /// [`Self::add_entries_to_index`].
    pub fn make_index(&self) -> IndexTable {
        match &self.mode {
            Mode::Cbr { edit_unit_byte_count } => IndexTable::new_cbr(self.edit_rate, self.base_deltas.clone(), *edit_unit_byte_count),
            Mode::Vbr { .. } => IndexTable::new_vbr(self.edit_rate, self.base_deltas.clone(), self.npe),
        }
    }

    /// Commit every complete, buffered entry in `[first, last)` into `table`.
    /// When `undo_reorder` is set, entries are committed in display order
    /// with their temporal offset collapsed to zero rather than carried
    /// over — for callers that have already reordered the underlying
    /// essence into display order before indexing it.
    pub fn add_entries_to_index(&mut self, table: &mut IndexTable, first: i64, last: i64, undo_reorder: bool) -> Result<usize> {
        let Mode::Vbr { reorder, .. } = &mut self.mode else {
            return Err(Error::NotVbr);
        };
        let mut drained = reorder.drain_complete_range(first, last);
        drained.sort_by_key(|(edit_unit, _)| *edit_unit);
        let mut committed = 0;
        for (edit_unit, entry) in drained {
            let temporal_offset = if undo_reorder { 0 } else { entry.temporal_offset.unwrap_or(0) };
            table.add_index_entry(
                self.body_sid,
                self.index_sid,
                edit_unit,
                temporal_offset,
                entry.anchor_offset,
                entry.flags,
                entry.stream_offset.unwrap_or(0),
                entry.slice_offsets,
                entry.pos_table,
            )?;
            committed += 1;
        }
        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas() -> Vec<DeltaEntry> {
        vec![DeltaEntry { pos_table_index: 0, slice: 0, element_delta: 0 }]
    }

    #[test]
    fn offers_accumulate_and_commit_in_order() {
        let mut mgr = IndexManager::new_vbr(Rational::new(25, 1), 1, 2, deltas(), 0, 0);
        let token = mgr.log_next_entry();
        mgr.offer_offset(0, 0, 0, Some(0), Some(0x40));
        mgr.offer_temporal_offset(0, 0);
        mgr.offer_offset(0, 1, 500, None, None);
        mgr.offer_temporal_offset(1, -1);

        assert_eq!(mgr.resolve_entry(token), 0);

        let mut table = mgr.make_index();
        let committed = mgr.add_entries_to_index(&mut table, 0, 2, false).unwrap();
        assert_eq!(committed, 2);

        let r1 = table.lookup(0, 1, 0, true).unwrap();
        assert!(r1.other_pos);
    }

    #[test]
    fn undo_reorder_collapses_temporal_offsets() {
        let mut mgr = IndexManager::new_vbr(Rational::new(25, 1), 1, 2, deltas(), 0, 0);
        mgr.offer_offset(0, 0, 0, Some(0), Some(0));
        mgr.offer_temporal_offset(0, 1);

        let mut table = mgr.make_index();
        mgr.add_entries_to_index(&mut table, 0, 1, true).unwrap();
        let r = table.lookup(0, 0, 0, true).unwrap();
        assert!(!r.other_pos);
    }

    #[test]
    fn cbr_manager_has_no_buffer_to_drain() {
        let mut mgr = IndexManager::new_cbr(Rational::new(25, 1), 1, 2, deltas(), 1920);
        assert!(mgr.is_cbr());
        let mut table = mgr.make_index();
        assert!(matches!(mgr.add_entries_to_index(&mut table, 0, 1, false), Err(Error::NotVbr)));
    }

    #[test]
    fn edit_unit_offer_before_temporal_offer_is_applied_once_temporal_arrives() {
        let mut mgr = IndexManager::new_vbr(Rational::new(25, 1), 1, 2, deltas(), 0, 0);
        mgr.offer_edit_unit(0, 0, -2, 0x80);
        mgr.offer_offset(0, 0, 1000, None, None);
        mgr.offer_temporal_offset(0, 0);

        let mut table = mgr.make_index();
        let committed = mgr.add_entries_to_index(&mut table, 0, 1, false).unwrap();
        assert_eq!(committed, 1);
        let r = table.lookup(0, 0, 0, true).unwrap();
        assert_eq!(r.key_frame_offset, -2);
        assert_eq!(r.flags, 0x80);
    }
}
