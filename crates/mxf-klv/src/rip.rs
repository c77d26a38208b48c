//! Random Index Pack: an ordered map from partition byte offset to
//! [`PartitionInfo`], built by reading a terminating RIP KLV, by scanning
//! backwards from EOF, or by a full linear walk (spec.md §3/§4.6).
//!
//! Grounded on `exiftool-formats::mxf::MxfParser`'s linear top-level KLV
//! scan (already present in the pack as read-only reference), generalized
//! from "find the first recognisable key" into "walk every top-level KLV,
//! remembering every partition-key KLV found along the way".

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

use mxf_core::Diagnostics;

use crate::keys::{decode_partition_key, rip_key};
use crate::klvobject::KLVObject;
use crate::partition::PartitionPack;
use crate::Result;

/// What the RIP (or a scan standing in for it) knows about one partition.
#[derive(Debug, Clone)]
pub struct PartitionInfo {
    pub pack: Option<PartitionPack>,
    pub byte_offset: u64,
    pub body_sid: u32,
    pub index_sid: u32,
    /// True once both SIDs are known from a source more authoritative than
    /// a bare RIP entry (i.e. the partition pack itself was read).
    pub sids_known: bool,
    /// Essence stream offset at the start of this partition's body, when
    /// known (from `pack.body_offset`) or estimated by `find_partition`.
    pub stream_offset: Option<u64>,
    /// Absolute file offset where this partition's essence begins, once
    /// the pack (and hence its header/index byte counts) is known.
    pub essence_offset: Option<u64>,
}

impl PartitionInfo {
    fn from_pack(byte_offset: u64, pack: PartitionPack) -> Self {
        let essence_offset = Some(crate::partition::essence_offset(
            byte_offset + pack_kl_size(&pack),
            &pack,
        ));
        Self {
            body_sid: pack.body_sid,
            index_sid: pack.index_sid,
            stream_offset: Some(pack.body_offset),
            sids_known: true,
            essence_offset,
            pack: Some(pack),
            byte_offset,
        }
    }
}

/// `PartitionPack::write` reports its own encoded size; re-derive it here
/// without re-encoding by writing to a scratch buffer. Only used when
/// deriving `essence_offset` from a freshly parsed pack.
fn pack_kl_size(pack: &PartitionPack) -> u64 {
    let mut scratch = Vec::new();
    let _ = pack.write(&mut scratch, &mxf_core::NullDiagnostics);
    scratch.len() as u64
}

/// Ordered map of partition byte offset to what's known about that
/// partition, plus the lookups spec.md §4.6 describes.
#[derive(Default)]
pub struct Rip {
    entries: BTreeMap<u64, PartitionInfo>,
}

impl Rip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry at `info.byte_offset`.
    pub fn add_partition(&mut self, info: PartitionInfo) {
        self.entries.insert(info.byte_offset, info);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&u64, &PartitionInfo)> {
        self.entries.iter()
    }

    /// The nearest entry strictly before `offset`.
    pub fn find_previous_partition(&self, offset: u64) -> Option<&PartitionInfo> {
        self.entries.range(..offset).next_back().map(|(_, v)| v)
    }

    /// The nearest entry strictly after `offset`.
    pub fn find_next_partition(&self, offset: u64) -> Option<&PartitionInfo> {
        self.entries.range(offset + 1..).next().map(|(_, v)| v)
    }

    /// Best-effort search for the partition most likely to contain
    /// `stream_offset` of `body_sid`'s essence: walk partitions carrying
    /// that SID in file order, preferring a pack's own recorded
    /// `body_offset` and otherwise extrapolating from the span between
    /// consecutive partitions for the same SID. Advisory only — callers
    /// confirm by reading.
    pub fn find_partition(&self, body_sid: u32, stream_offset: u64) -> Option<&PartitionInfo> {
        let mut candidates: Vec<&PartitionInfo> =
            self.entries.values().filter(|info| info.body_sid == body_sid).collect();
        candidates.sort_by_key(|info| info.byte_offset);

        let mut best = None;
        for (i, info) in candidates.iter().enumerate() {
            let starts_at = info.stream_offset.unwrap_or_else(|| {
                candidates[..i]
                    .iter()
                    .rev()
                    .find_map(|p| p.stream_offset)
                    .unwrap_or(0)
            });
            if starts_at <= stream_offset {
                best = Some(*info);
            } else {
                break;
            }
        }
        best
    }
}

/// Read the file's length by seeking to the end and back.
fn stream_len<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let len = reader.seek(SeekFrom::End(0))?;
    Ok(len)
}

/// Stage 1: read a terminating RIP KLV, if the last 4 bytes of the file
/// name a self-consistent total length pointing back at a RIP key.
pub fn read_terminating<R: Read + Seek>(reader: &mut R) -> Result<Option<Rip>> {
    let file_len = stream_len(reader)?;
    if file_len < 4 {
        return Ok(None);
    }
    reader.seek(SeekFrom::Start(file_len - 4))?;
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let total_len = u32::from_be_bytes(len_buf) as u64;
    if total_len == 0 || total_len > file_len {
        return Ok(None);
    }
    let rip_offset = file_len - total_len;
    let klv = match KLVObject::read_kl(reader, rip_offset) {
        Ok(klv) => klv,
        Err(_) => return Ok(None),
    };
    if !klv.key.versionless_eq(&rip_key()) {
        return Ok(None);
    }
    if klv.kl_size as u64 + klv.length != total_len {
        return Ok(None);
    }
    Ok(Some(parse_rip_body(reader, rip_offset)?))
}

/// Decode a RIP KLV's value at `rip_offset` into a [`Rip`]: a flat sequence
/// of (BodySID u32, ByteOffset u64) pairs, 12 bytes each.
fn parse_rip_body<R: Read + Seek>(reader: &mut R, rip_offset: u64) -> Result<Rip> {
    let mut klv = KLVObject::read_kl(reader, rip_offset)?;
    klv.read_all_data(reader)?;
    let body = klv.value().expect("just read").as_slice();
    let mut rip = Rip::new();
    for chunk in body.chunks_exact(12) {
        let body_sid = u32::from_be_bytes(chunk[0..4].try_into().unwrap());
        let byte_offset = u64::from_be_bytes(chunk[4..12].try_into().unwrap());
        rip.add_partition(PartitionInfo {
            pack: None,
            byte_offset,
            body_sid,
            index_sid: 0,
            sids_known: false,
            stream_offset: None,
            essence_offset: None,
        });
    }
    Ok(rip)
}

/// Stage 2: scan backwards from EOF in fixed windows looking for a RIP key,
/// verifying the candidate decodes to a self-consistent KLV ending at EOF.
pub fn scan_backwards<R: Read + Seek>(reader: &mut R, search_limit: u64) -> Result<Option<Rip>> {
    let file_len = stream_len(reader)?;
    let floor = file_len.saturating_sub(search_limit);
    let mut pos = file_len.saturating_sub(16);
    while pos >= floor {
        let mut key_bytes = [0u8; 16];
        reader.seek(SeekFrom::Start(pos))?;
        if reader.read_exact(&mut key_bytes).is_ok() {
            let ul = mxf_types::UL::new(key_bytes);
            if ul.versionless_eq(&rip_key()) {
                if let Ok(klv) = KLVObject::read_kl(reader, pos) {
                    if pos + klv.kl_size as u64 + klv.length == file_len {
                        return Ok(Some(parse_rip_body(reader, pos)?));
                    }
                }
            }
        }
        if pos == 0 {
            break;
        }
        pos -= 1;
    }
    Ok(None)
}

/// Stage 3: walk every top-level KLV from `start_offset` (immediately after
/// any run-in) to EOF, recording a [`PartitionInfo`] for each partition-key
/// KLV encountered and stopping at a RIP KLV (the file's terminal KLV) or
/// EOF. O(file size); the fallback of last resort.
pub fn build_linear<R: Read + Seek>(reader: &mut R, start_offset: u64, diag: &dyn Diagnostics) -> Result<Rip> {
    let file_len = stream_len(reader)?;
    let mut rip = Rip::new();
    let mut pos = start_offset;
    while pos < file_len {
        let this_offset = pos;
        let peek = KLVObject::read_kl(reader, pos)?;
        if peek.key.versionless_eq(&rip_key()) {
            break;
        }
        if decode_partition_key(&peek.key).is_some() {
            let (pack, _klv) = PartitionPack::read(reader, this_offset)?;
            rip.add_partition(PartitionInfo::from_pack(this_offset, pack));
        }
        pos += (peek.kl_size as u64) + peek.length;
    }
    if rip.is_empty() {
        diag.report("linear RIP scan found no partition-key KLVs", Some(start_offset));
    }
    Ok(rip)
}

/// Obtain a RIP by the three fallback stages spec.md §4.6 describes,
/// trying each in order and falling through to the next on failure.
pub fn build_rip<R: Read + Seek>(reader: &mut R, start_offset: u64, diag: &dyn Diagnostics) -> Result<Rip> {
    if let Some(rip) = read_terminating(reader)? {
        return Ok(rip);
    }
    if let Some(rip) = scan_backwards(reader, 1 << 20)? {
        return Ok(rip);
    }
    build_linear(reader, start_offset, diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{PartitionKind, PartitionStatus};
    use mxf_core::StderrDiagnostics;
    use std::io::Cursor;

    fn sample_file() -> Vec<u8> {
        let mut out = Vec::new();
        let header = PartitionPack::new(PartitionKind::Header, PartitionStatus::ClosedComplete);
        header.write(&mut out, &StderrDiagnostics).unwrap();
        let mut footer = PartitionPack::new(PartitionKind::Footer, PartitionStatus::ClosedComplete);
        footer.this_partition = out.len() as u64;
        footer.write(&mut out, &StderrDiagnostics).unwrap();
        out
    }

    #[test]
    fn build_linear_finds_both_partitions() {
        let bytes = sample_file();
        let mut cursor = Cursor::new(bytes);
        let rip = build_linear(&mut cursor, 0, &StderrDiagnostics).unwrap();
        assert_eq!(rip.len(), 2);
        assert!(rip.entries().any(|(_, info)| info.pack.as_ref().unwrap().kind == PartitionKind::Header));
        assert!(rip.entries().any(|(_, info)| info.pack.as_ref().unwrap().kind == PartitionKind::Footer));
    }

    #[test]
    fn find_previous_and_next_partition() {
        let mut rip = Rip::new();
        rip.add_partition(PartitionInfo {
            pack: None,
            byte_offset: 0,
            body_sid: 1,
            index_sid: 0,
            sids_known: true,
            stream_offset: Some(0),
            essence_offset: None,
        });
        rip.add_partition(PartitionInfo {
            pack: None,
            byte_offset: 1000,
            body_sid: 1,
            index_sid: 0,
            sids_known: true,
            stream_offset: Some(500),
            essence_offset: None,
        });
        assert_eq!(rip.find_previous_partition(1000).unwrap().byte_offset, 0);
        assert_eq!(rip.find_next_partition(0).unwrap().byte_offset, 1000);
        assert!(rip.find_next_partition(1000).is_none());
    }

    #[test]
    fn find_partition_picks_the_covering_entry() {
        let mut rip = Rip::new();
        rip.add_partition(PartitionInfo {
            pack: None,
            byte_offset: 0,
            body_sid: 7,
            index_sid: 0,
            sids_known: true,
            stream_offset: Some(0),
            essence_offset: None,
        });
        rip.add_partition(PartitionInfo {
            pack: None,
            byte_offset: 2000,
            body_sid: 7,
            index_sid: 0,
            sids_known: true,
            stream_offset: Some(1500),
            essence_offset: None,
        });
        let found = rip.find_partition(7, 1600).unwrap();
        assert_eq!(found.byte_offset, 2000);
        let found_early = rip.find_partition(7, 200).unwrap();
        assert_eq!(found_early.byte_offset, 0);
    }
}
