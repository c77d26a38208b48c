//! [`GCWriter`] — Generic Container key synthesis, write-order sorting, and
//! essence-data enqueue/flush (spec.md §4.9, §6's "Generic container key
//! synthesis").
//!
//! Grounded on `mxf_klv::kag`'s KAG-filler insertion (reused directly for
//! the between-groups alignment `flush` performs) and on
//! `mxf_klv::partition::PartitionPack::write`'s key+BER-length+value
//! encoding shape, generalized from a single fixed-layout value to an
//! arbitrary sequence of essence/system element KLVs.

use mxf_core::{ber, DataChunk, Diagnostics};
use mxf_essence::EssenceSource;
use mxf_index::IndexManager;
use mxf_klv::kag;
use mxf_types::UL;

use crate::{Error, Result};

const GC_KEY_PREFIX: [u8; 12] = [0x06, 0x0E, 0x2B, 0x34, 0x01, 0x02, 0x01, 0x00, 0x0D, 0x01, 0x03, 0x01];

/// Synthesize an essence element key `06 0E 2B 34 01 02 01 VV 0D 01 03 01 TT
/// SS EE NN`, patching the registry-version octet (8th byte, spec.md §6).
pub fn essence_element_key(essence_type: u8, count: u8, element: u8, sub_number: u8, version: u8) -> UL {
    let mut bytes = [0u8; 16];
    bytes[..12].copy_from_slice(&GC_KEY_PREFIX);
    bytes[7] = version;
    bytes[12] = essence_type;
    bytes[13] = count;
    bytes[14] = element;
    bytes[15] = sub_number;
    UL::new(bytes)
}

/// Synthesize a system item key: the registry-designator byte sits at
/// position 5 (index 4) instead of the essence scheme byte, and the version
/// octet at position 7 (index 6) instead of index 7 (spec.md §6).
pub fn system_element_key(designator: u8, version: u8, element: u8, sub_number: u8) -> UL {
    let mut bytes = [0u8; 16];
    bytes[..12].copy_from_slice(&GC_KEY_PREFIX);
    bytes[4] = designator;
    bytes[6] = version;
    bytes[12] = 0x04; // system-item essence type
    bytes[13] = 0x01;
    bytes[14] = element;
    bytes[15] = sub_number;
    UL::new(bytes)
}

#[derive(Debug, Clone, Copy)]
enum ElementKind {
    System,
    Essence,
}

#[derive(Debug, Clone, Copy)]
struct StreamEntry {
    kind: ElementKind,
    key: UL,
    /// High byte is the grouping key `flush` inserts filler between;
    /// low 24 bits are the within-group sort position.
    write_order: u32,
}

enum Payload {
    Bytes(DataChunk),
    Source(Box<dyn EssenceSource>),
}

struct PendingItem {
    stream: u32,
    payload: Payload,
}

/// One essence track's Generic Container writer: a table of registered
/// streams plus a queue of pending element writes, flushed one edit unit at
/// a time.
pub struct GCWriter {
    body_sid: u32,
    streams: Vec<StreamEntry>,
    pending: Vec<PendingItem>,
    stream_offset: u64,
    edit_unit: i64,
    index: Option<IndexManager>,
}

impl GCWriter {
    pub fn new(body_sid: u32, index: Option<IndexManager>) -> Self {
        GCWriter { body_sid, streams: Vec::new(), pending: Vec::new(), stream_offset: 0, edit_unit: 0, index }
    }

    pub fn body_sid(&self) -> u32 {
        self.body_sid
    }

    pub fn stream_offset(&self) -> u64 {
        self.stream_offset
    }

    pub fn current_edit_unit(&self) -> i64 {
        self.edit_unit
    }

    pub fn index_manager(&self) -> Option<&IndexManager> {
        self.index.as_ref()
    }

    pub fn index_manager_mut(&mut self) -> Option<&mut IndexManager> {
        self.index.as_mut()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Register a system item stream, returning its id. The default
    /// write-order groups all system items under top byte `0x00`, ahead of
    /// every essence group.
    pub fn add_system_element(&mut self, designator: u8, version: u8, element: u8, sub_number: u8) -> u32 {
        let key = system_element_key(designator, version, element, sub_number);
        let write_order = (element as u32) << 8 | sub_number as u32;
        self.streams.push(StreamEntry { kind: ElementKind::System, key, write_order });
        (self.streams.len() - 1) as u32
    }

    /// Register an essence element stream, returning its id. The default
    /// write-order's top byte is the essence type, so `flush` groups and
    /// KAG-aligns between distinct essence types automatically.
    pub fn add_essence_element(&mut self, essence_type: u8, count: u8, element: u8, sub_number: u8, version: u8) -> u32 {
        let key = essence_element_key(essence_type, count, element, sub_number, version);
        let write_order = (essence_type as u32) << 24 | (count as u32) << 16 | (element as u32) << 8 | sub_number as u32;
        self.streams.push(StreamEntry { kind: ElementKind::Essence, key, write_order });
        (self.streams.len() - 1) as u32
    }

    /// Override a stream's write-order: `position` occupies the low 24
    /// bits, `group` (when given) replaces the top grouping byte.
    pub fn set_write_order(&mut self, id: u32, position: u32, group: Option<u8>) -> Result<()> {
        let entry = self.streams.get_mut(id as usize).ok_or(Error::NoSuchStream(id))?;
        let top = group.map(|g| (g as u32) << 24).unwrap_or(entry.write_order & 0xFF00_0000);
        entry.write_order = top | (position & 0x00FF_FFFF);
        Ok(())
    }

    pub fn add_system_data(&mut self, id: u32, bytes: Vec<u8>) -> Result<()> {
        self.enqueue(id, Payload::Bytes(DataChunk::from_bytes(bytes)))
    }

    pub fn add_essence_data(&mut self, id: u32, bytes: Vec<u8>) -> Result<()> {
        self.enqueue(id, Payload::Bytes(DataChunk::from_bytes(bytes)))
    }

    pub fn add_essence_source(&mut self, id: u32, source: Box<dyn EssenceSource>) -> Result<()> {
        self.enqueue(id, Payload::Source(source))
    }

    fn enqueue(&mut self, id: u32, payload: Payload) -> Result<()> {
        if id as usize >= self.streams.len() {
            return Err(Error::NoSuchStream(id));
        }
        self.pending.push(PendingItem { stream: id, payload });
        Ok(())
    }

    /// Drain every queued essence data chunk for one source into a single
    /// value buffer; each source is expected to yield exactly one edit
    /// unit's worth of data.
    fn drain_source(source: &mut dyn EssenceSource) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            let chunk = source.get_essence_data(None, None)?;
            if chunk.is_empty() {
                break;
            }
            bytes.extend_from_slice(chunk.as_slice());
            if source.end_of_item() {
                break;
            }
        }
        Ok(bytes)
    }

    /// Sort the pending queue by write-order key, insert a KAG-alignment
    /// filler between groups (top-byte changes), write each element's
    /// key+length+value, and offer the first non-system item's byte offset
    /// to the index manager (spec.md §4.9). Clears the queue and advances to
    /// the next edit unit.
    pub fn flush(&mut self, out: &mut Vec<u8>, partition_start: u64, kag_size: u64, force_ber4: bool, diag: &dyn Diagnostics) -> Result<()> {
        let mut items = std::mem::take(&mut self.pending);
        items.sort_by_key(|item| self.streams[item.stream as usize].write_order);

        let mut offered_this_unit = false;
        let mut last_group: Option<u8> = None;

        for item in items {
            let entry = self.streams[item.stream as usize];
            let group = (entry.write_order >> 24) as u8;
            if let Some(prev) = last_group {
                if prev != group {
                    kag::align_to_kag(out, partition_start, kag_size, force_ber4, diag)?;
                }
            }
            last_group = Some(group);

            let value = match item.payload {
                Payload::Bytes(chunk) => chunk.as_slice().to_vec(),
                Payload::Source(mut source) => Self::drain_source(source.as_mut())?,
            };

            if matches!(entry.kind, ElementKind::Essence) && !offered_this_unit {
                if let Some(manager) = &mut self.index {
                    manager.offer_offset(0, self.edit_unit, self.stream_offset, Some(0), Some(0x80));
                }
                offered_this_unit = true;
            }

            let before = out.len();
            out.extend_from_slice(entry.key.as_bytes());
            ber::encode(out, value.len() as u64, None, diag)?;
            out.extend_from_slice(&value);
            self.stream_offset += (out.len() - before) as u64;
        }
        Ok(())
    }

    pub fn advance_edit_unit(&mut self) {
        self.edit_unit += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxf_core::StderrDiagnostics;

    #[test]
    fn essence_and_system_keys_share_the_gc_prefix_and_differ_in_designator_position() {
        let essence = essence_element_key(0x15, 0x01, 0x02, 0x01, 1);
        let system = system_element_key(0x01, 1, 0x02, 0x01);
        assert_eq!(&essence.as_bytes()[..4], &GC_KEY_PREFIX[..4]);
        assert_eq!(system.as_bytes()[4], 0x01);
        assert_eq!(system.as_bytes()[6], 1);
    }

    #[test]
    fn flush_sorts_by_write_order_and_groups_by_top_byte() {
        let mut gc = GCWriter::new(1, None);
        let a = gc.add_essence_element(0x15, 0x01, 0x02, 0x00, 1);
        let b = gc.add_essence_element(0x16, 0x01, 0x01, 0x00, 1);
        gc.add_essence_data(b, vec![2; 4]).unwrap();
        gc.add_essence_data(a, vec![1; 4]).unwrap();

        let mut out = Vec::new();
        gc.flush(&mut out, 0, 1, false, &StderrDiagnostics).unwrap();

        let a_key = essence_element_key(0x15, 0x01, 0x02, 0x00, 1);
        let pos_a = out.windows(16).position(|w| w == a_key.as_bytes()).unwrap();
        let b_key = essence_element_key(0x16, 0x01, 0x01, 0x00, 1);
        let pos_b = out.windows(16).position(|w| w == b_key.as_bytes()).unwrap();
        assert!(pos_a < pos_b, "lower write-order group must land at an earlier offset");
    }

    #[test]
    fn set_write_order_overrides_the_default_group() {
        let mut gc = GCWriter::new(1, None);
        let a = gc.add_essence_element(0x15, 0x01, 0x02, 0x00, 1);
        gc.set_write_order(a, 0, Some(0x00)).unwrap();
        assert!(matches!(gc.set_write_order(99, 0, None), Err(Error::NoSuchStream(99))));
    }
}
