//! [`BodyWriter`] — composes [`GCWriter`]s across BodyStreams into header,
//! body, and footer partitions with a configurable partition-break policy
//! (spec.md §4.9).
//!
//! Grounded on `mxf_klv::partition::write_partition`'s pack/primer/metadata/
//! index/filler assembly (reused directly for every partition this type
//! emits) and on `mxf_klv::rip::Rip`'s offset bookkeeping, generalized from
//! a read-side partition chain into a write-side one that also decides
//! where the chain's links fall.

use mxf_core::Diagnostics;
use mxf_klv::keys::{PartitionKind, PartitionStatus};
use mxf_klv::partition::{essence_offset, write_partition, PartitionPack, PartitionWriteOptions};
use mxf_metadata::{MetadataContext, ObjectId, Primer};
use mxf_types::{TypeRegistry, UL};

use crate::gc::GCWriter;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapType {
    Frame,
    Clip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStrategy {
    None,
    PerPartition,
    Sparse,
}

/// Per-partition time/size break policy (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionBreakPolicy {
    None,
    Duration(u64),
    Size(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct BodyStreamConfig {
    pub wrap: WrapType,
    /// When set, a partition break may only precede an edit unit the caller
    /// marks as an edit point via [`BodyWriter::flush_edit_unit`]'s
    /// `is_edit_point` argument.
    pub edit_align: bool,
    pub index_strategy: IndexStrategy,
}

struct BodyStream {
    gc: GCWriter,
    config: BodyStreamConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct BodyWriterOptions {
    pub kag_size: u64,
    pub force_ber4_fill: bool,
    /// Whether the header partition carries header metadata that the
    /// footer then shares rather than repeats (spec.md §4.9's
    /// "metadata-partition sharing policy").
    pub share_metadata_with_header: bool,
    pub partition_break: PartitionBreakPolicy,
    /// Bytes of slack the header partition reserves for a later
    /// `re_write_partition` with a grown duration/footer pointer.
    pub header_padding_reserve: u64,
}

impl Default for BodyWriterOptions {
    fn default() -> Self {
        Self {
            kag_size: 1,
            force_ber4_fill: false,
            share_metadata_with_header: true,
            partition_break: PartitionBreakPolicy::None,
            header_padding_reserve: 0,
        }
    }
}

/// Assembles a complete MXF byte stream in memory: header partition, a
/// sequence of body partitions carrying GC-wrapped essence, footer
/// partition, and (optionally) a trailing RIP.
pub struct BodyWriter {
    opts: BodyWriterOptions,
    operational_pattern: UL,
    essence_containers: Vec<UL>,
    streams: Vec<BodyStream>,
    out: Vec<u8>,
    partition_offsets: Vec<(u64, u32, u32)>, // (byte_offset, body_sid, index_sid)
    current_partition_start: u64,
    current_partition_edit_units: u64,
    header_written: bool,
    body_written: bool,
}

impl BodyWriter {
    pub fn new(opts: BodyWriterOptions, operational_pattern: UL, essence_containers: Vec<UL>) -> Self {
        BodyWriter {
            opts,
            operational_pattern,
            essence_containers,
            streams: Vec::new(),
            out: Vec::new(),
            partition_offsets: Vec::new(),
            current_partition_start: 0,
            current_partition_edit_units: 0,
            header_written: false,
            body_written: false,
        }
    }

    /// Register a BodyStream, returning its index. `gc` should already have
    /// its element streams registered via `add_system_element`/
    /// `add_essence_element`.
    pub fn add_stream(&mut self, config: BodyStreamConfig, gc: GCWriter) -> usize {
        self.streams.push(BodyStream { gc, config });
        self.streams.len() - 1
    }

    pub fn stream_mut(&mut self, idx: usize) -> Option<&mut GCWriter> {
        self.streams.get_mut(idx).map(|s| &mut s.gc)
    }

    fn write_partition_pack(
        &mut self,
        kind: PartitionKind,
        status: PartitionStatus,
        body_sid: u32,
        index_sid: u32,
        ctx: &MetadataContext,
        registry: &TypeRegistry,
        primer: &mut Primer,
        metadata_ids: &[ObjectId],
        index_block: Option<&[u8]>,
        min_size: u64,
        diag: &dyn Diagnostics,
    ) -> Result<u64> {
        let this_partition = self.out.len() as u64;
        let mut pack = PartitionPack::new(kind, status);
        pack.kag_size = self.opts.kag_size as u32;
        pack.this_partition = this_partition;
        pack.previous_partition = self.partition_offsets.last().map(|(o, ..)| *o).unwrap_or(0);
        pack.body_sid = body_sid;
        pack.index_sid = index_sid;
        pack.operational_pattern = self.operational_pattern;
        pack.essence_containers = self.essence_containers.clone();

        let opts = PartitionWriteOptions {
            kag_size: self.opts.kag_size,
            force_ber4_fill: self.opts.force_ber4_fill,
            min_partition_size: min_size,
        };
        let bytes = write_partition(pack, primer, ctx, metadata_ids, registry, index_block, opts, diag)?;
        self.out.extend_from_slice(&bytes);
        self.partition_offsets.push((this_partition, body_sid, index_sid));
        Ok(this_partition)
    }

    /// Emit the header partition (spec.md §4.10). `include_metadata` controls
    /// whether `metadata_ids` are encoded here at all (a caller deferring
    /// everything to the footer, per the sharing policy, passes an empty
    /// slice and `false`); `include_index` is reserved for a future
    /// pre-essence index block and is currently always empty.
    pub fn write_header(
        &mut self,
        ctx: &MetadataContext,
        registry: &TypeRegistry,
        primer: &mut Primer,
        metadata_ids: &[ObjectId],
        include_metadata: bool,
        include_index: bool,
        diag: &dyn Diagnostics,
    ) -> Result<()> {
        let ids: &[ObjectId] = if include_metadata { metadata_ids } else { &[] };
        let index_block: Option<&[u8]> = if include_index { Some(&[]) } else { None };
        let offset = self.write_partition_pack(
            PartitionKind::Header,
            PartitionStatus::OpenIncomplete,
            0,
            0,
            ctx,
            registry,
            primer,
            ids,
            index_block,
            self.opts.header_padding_reserve,
            diag,
        )?;
        self.current_partition_start = offset;
        self.header_written = true;
        Ok(())
    }

    fn partition_break_due(&self) -> bool {
        let bytes_in_partition = self.out.len() as u64 - self.current_partition_start;
        match self.opts.partition_break {
            PartitionBreakPolicy::None => false,
            PartitionBreakPolicy::Duration(n) => self.current_partition_edit_units >= n,
            PartitionBreakPolicy::Size(n) => bytes_in_partition >= n,
        }
    }

    /// Flush one edit unit's queued writes for `stream_idx`, first starting
    /// a fresh body partition if the break policy is due and (when the
    /// stream's `edit_align` is set) `is_edit_point` allows it. Returns
    /// `false` if the stream had nothing queued.
    pub fn flush_edit_unit(&mut self, stream_idx: usize, is_edit_point: bool, diag: &dyn Diagnostics) -> Result<bool> {
        if !self.header_written {
            return Err(Error::HeaderNotWritten);
        }
        let body_sid = self.streams[stream_idx].gc.body_sid();
        if !self.streams[stream_idx].gc.has_pending() {
            return Ok(false);
        }

        let edit_align = self.streams[stream_idx].config.edit_align;
        if self.partition_break_due() && (!edit_align || is_edit_point) {
            let this_partition = self.out.len() as u64;
            let mut pack = PartitionPack::new(PartitionKind::Body, PartitionStatus::OpenIncomplete);
            pack.kag_size = self.opts.kag_size as u32;
            pack.this_partition = this_partition;
            pack.previous_partition = self.current_partition_start;
            pack.body_sid = body_sid;
            pack.operational_pattern = self.operational_pattern;
            pack.essence_containers = self.essence_containers.clone();
            pack.body_offset = self.streams[stream_idx].gc.stream_offset();
            pack.write(&mut self.out, diag)?;
            self.partition_offsets.push((this_partition, body_sid, 0));
            self.current_partition_start = this_partition;
            self.current_partition_edit_units = 0;
        }

        // header_padding_reserve of 0 means "no cap configured"; a positive
        // value bounds how far essence folded into the header partition
        // (no separate body partition opened yet) may grow it.
        if self.partition_offsets.len() == 1 && self.opts.header_padding_reserve > 0 {
            let bytes_in_partition = self.out.len() as u64 - self.current_partition_start;
            if bytes_in_partition > self.opts.header_padding_reserve {
                return Err(Error::HeaderPaddingExceeded { reserve: self.opts.header_padding_reserve, actual: bytes_in_partition });
            }
        }

        self.streams[stream_idx].gc.flush(&mut self.out, self.current_partition_start, self.opts.kag_size, self.opts.force_ber4_fill, diag)?;
        self.streams[stream_idx].gc.advance_edit_unit();
        self.current_partition_edit_units += 1;
        self.body_written = true;
        Ok(true)
    }

    /// Emit the footer partition, and (when `include_rip` is set) a trailing
    /// Random Index Pack covering every partition written so far (spec.md
    /// §4.9/§6).
    pub fn write_footer(
        &mut self,
        ctx: &MetadataContext,
        registry: &TypeRegistry,
        primer: &mut Primer,
        metadata_ids: &[ObjectId],
        include_metadata: bool,
        include_rip: bool,
        diag: &dyn Diagnostics,
    ) -> Result<()> {
        if !self.body_written && !self.opts.share_metadata_with_header {
            return Err(Error::BodyNotWritten);
        }
        let ids: &[ObjectId] = if include_metadata { metadata_ids } else { &[] };
        let footer_offset = self.write_partition_pack(
            PartitionKind::Footer,
            PartitionStatus::ClosedComplete,
            0,
            0,
            ctx,
            registry,
            primer,
            ids,
            None,
            0,
            diag,
        )?;

        self.patch_footer_pointer(footer_offset, diag)?;

        if include_rip {
            self.write_rip(diag)?;
        }
        Ok(())
    }

    /// Patch every previously written partition pack's `FooterPartition`
    /// field in place now that the footer's offset is known, without
    /// changing any pack's on-disk size (spec.md §4.9 `re_write_partition`).
    fn patch_footer_pointer(&mut self, footer_offset: u64, diag: &dyn Diagnostics) -> Result<()> {
        let offsets: Vec<u64> = self.partition_offsets.iter().map(|(o, ..)| *o).collect();
        for offset in offsets {
            let mut cursor = std::io::Cursor::new(&self.out[..]);
            cursor.set_position(offset);
            let (mut pack, _klv) = PartitionPack::read(&mut cursor, offset)?;
            pack.footer_partition = footer_offset;
            self.re_write_partition(offset, pack, diag)?;
        }
        Ok(())
    }

    /// Overwrite the partition pack at `at_offset` with `pack`, re-encoded
    /// with the same byte length as what is already there (spec.md §4.9:
    /// "length-preserving rewrite using original KL sizes"). Only the fixed
    /// pack fields may change; metadata/index/filler bytes after it are left
    /// untouched.
    pub fn re_write_partition(&mut self, at_offset: u64, pack: PartitionPack, diag: &dyn Diagnostics) -> Result<()> {
        let mut original_len_buf = std::io::Cursor::new(&self.out[at_offset as usize..]);
        let original = mxf_klv::klvobject::KLVObject::read_kl(&mut original_len_buf, 0)?;
        let original_size = original.kl_size as u64 + original.length;

        let mut encoded = Vec::new();
        pack.write(&mut encoded, diag)?;
        if encoded.len() as u64 != original_size {
            return Err(Error::RewriteSizeMismatch { original: original_size, new: encoded.len() as u64 });
        }
        self.out[at_offset as usize..at_offset as usize + encoded.len()].copy_from_slice(&encoded);
        Ok(())
    }

    fn write_rip(&mut self, diag: &dyn Diagnostics) -> Result<()> {
        let mut body = Vec::with_capacity(12 * (self.partition_offsets.len() + 1));
        for (offset, body_sid, _index_sid) in &self.partition_offsets {
            body.extend_from_slice(&body_sid.to_be_bytes());
            body.extend_from_slice(&offset.to_be_bytes());
        }
        let key = mxf_klv::keys::rip_key();
        let mut rip_klv = Vec::new();
        rip_klv.extend_from_slice(key.as_bytes());
        mxf_core::ber::encode(&mut rip_klv, body.len() as u64, None, diag)?;
        rip_klv.extend_from_slice(&body);

        // Trailing 4-byte big-endian length of the RIP KLV itself (key +
        // BER length + value, not counting these 4 bytes), for the
        // backwards-scan fallback (spec.md §6).
        let total_len = rip_klv.len() as u32;
        self.out.extend_from_slice(&rip_klv);
        self.out.extend_from_slice(&total_len.to_be_bytes());
        Ok(())
    }

    pub fn essence_offset_of(&self, partition_end: u64, pack: &PartitionPack) -> u64 {
        essence_offset(partition_end, pack)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    pub fn bytes(&self) -> &[u8] {
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::GCWriter;
    use mxf_core::StderrDiagnostics;
    use mxf_klv::rip::read_terminating;
    use mxf_metadata::MetadataContext;
    use mxf_types::TypeRegistry;

    /// One file package, one clip-wrapped picture track carrying 10 copies of
    /// a 32-byte payload as a single Generic Container element: one header
    /// partition, one footer, a 320-byte essence KLV, and a two-entry RIP.
    #[test]
    fn writes_a_minimal_clip_wrapped_file_with_a_two_entry_rip() {
        let registry = TypeRegistry::new();
        let ctx = MetadataContext::new(&registry);
        let mut primer = Primer::new();

        let op1a = UL::new([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00]);
        let essence_container = UL::new([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x02, 0x01, 0x01, 0x01]);

        let mut writer = BodyWriter::new(BodyWriterOptions::default(), op1a, vec![essence_container]);

        let mut gc = GCWriter::new(1, None);
        let element = gc.add_essence_element(0x15, 0x01, 0x01, 0x00, 1);
        gc.add_essence_data(element, vec![7u8; 320]).unwrap();
        let stream_idx = writer.add_stream(BodyStreamConfig { wrap: WrapType::Clip, edit_align: false, index_strategy: IndexStrategy::None }, gc);

        writer.write_header(&ctx, &registry, &mut primer, &[], false, false, &StderrDiagnostics).unwrap();
        assert!(writer.flush_edit_unit(stream_idx, true, &StderrDiagnostics).unwrap());
        writer.write_footer(&ctx, &registry, &mut primer, &[], false, true, &StderrDiagnostics).unwrap();

        let bytes = writer.into_bytes();

        let essence_key = crate::gc::essence_element_key(0x15, 0x01, 0x01, 0x00, 1);
        let pos = bytes.windows(16).position(|w| w == essence_key.as_bytes()).expect("essence key present");
        // Key (16) + BER length (1, since 320 < 128 needs 2 bytes actually -
        // verify via the encoded byte rather than assume a width).
        let length_byte = bytes[pos + 16];
        assert_ne!(length_byte & 0x80, 0, "320 needs the long BER length form");

        let rip = read_terminating(&mut std::io::Cursor::new(bytes.clone())).unwrap().expect("terminating RIP present");
        assert_eq!(rip.len(), 2, "one header and one footer partition");
    }
}
