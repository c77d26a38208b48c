//! Key Alignment Grid filler sizing (spec.md §4.5/§6/scenario 6).
//!
//! Grounded on `mxf_core::ber`'s forced-size encoding, generalized here to
//! pick the smallest BER length-field width that makes a filler KLV land
//! exactly on a KAG boundary, with the "minimum filler is 17 bytes, widen by
//! a whole KAG when the gap is smaller" fallback spec.md §6 describes.

use mxf_core::{ber, Diagnostics};

use crate::keys::fill_key;
use crate::{Error, Result};

/// Byte distance from `offset` (relative to the partition pack's start) to
/// the next `kag_size` boundary; 0 if already aligned. Does *not* apply the
/// "widen when too small to hold a filler" rule — callers needing an
/// emittable filler should go through [`write_filler`].
pub fn gap_to_kag(offset: u64, kag_size: u64) -> u64 {
    if kag_size <= 1 {
        return 0;
    }
    (kag_size - (offset % kag_size)) % kag_size
}

const MIN_FILLER: u64 = 17; // 16-byte key + 1-byte short-form BER length.

/// Choose a (ber_size, value_len) pair such that `16 + ber_size + value_len
/// == total`, preferring the smallest BER length-field width that fits,
/// unless `force_ber4` pins it to 4.
fn filler_shape(total: u64, force_ber4: bool) -> Option<(usize, u64)> {
    let candidates: &[usize] = if force_ber4 { &[4] } else { &[1, 2, 4, 8, 9] };
    for &size in candidates {
        let overhead = 16 + size as u64;
        if total < overhead {
            continue;
        }
        let value_len = total - overhead;
        let capacity: u128 = match size {
            1 => 127,
            n => (1u128 << (8 * (n - 1))) - 1,
        };
        if (value_len as u128) <= capacity {
            return Some((size, value_len));
        }
    }
    None
}

/// Write a filler KLV whose total on-disk size is exactly `gap` bytes,
/// widening by one whole KAG first if `gap` is smaller than the 17-byte
/// minimum filler (spec.md §6).
pub fn write_filler(out: &mut Vec<u8>, gap: u64, kag_size: u64, force_ber4: bool, diag: &dyn Diagnostics) -> Result<()> {
    if gap == 0 {
        return Ok(());
    }
    let total = if gap < MIN_FILLER { gap + kag_size } else { gap };
    let (size, value_len) = filler_shape(total, force_ber4).ok_or(Error::KagAlignmentImpossible { gap: total })?;
    out.extend_from_slice(fill_key().as_bytes());
    ber::encode(out, value_len, Some(size), diag)?;
    out.resize(out.len() + value_len as usize, 0);
    Ok(())
}

/// Align `out` (whose length is the current absolute write position) to the
/// next `kag_size` boundary measured from `partition_start`, inserting a
/// filler KLV if a gap remains.
pub fn align_to_kag(out: &mut Vec<u8>, partition_start: u64, kag_size: u64, force_ber4: bool, diag: &dyn Diagnostics) -> Result<()> {
    let offset = out.len() as u64 - partition_start;
    let gap = gap_to_kag(offset, kag_size);
    write_filler(out, gap, kag_size, force_ber4, diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxf_core::StderrDiagnostics;

    #[test]
    fn scenario_6_kag_alignment() {
        // Partition pack ends at byte 117, KAG=512: next filler totals 395
        // bytes and the byte following it lands on 512.
        let gap = gap_to_kag(117, 512);
        assert_eq!(gap, 395);
        let mut out = Vec::new();
        write_filler(&mut out, gap, 512, false, &StderrDiagnostics).unwrap();
        assert_eq!(out.len(), 395);
        assert_eq!(117 + out.len() as u64, 512);
    }

    #[test]
    fn gap_smaller_than_minimum_widens_by_a_whole_kag() {
        let mut out = Vec::new();
        // A gap of 5 cannot hold even the minimal 17-byte filler.
        write_filler(&mut out, 5, 512, false, &StderrDiagnostics).unwrap();
        assert_eq!(out.len(), 5 + 512);
    }

    #[test]
    fn already_aligned_emits_nothing() {
        assert_eq!(gap_to_kag(512, 512), 0);
        let mut out = Vec::new();
        write_filler(&mut out, 0, 512, false, &StderrDiagnostics).unwrap();
        assert!(out.is_empty());
    }
}
