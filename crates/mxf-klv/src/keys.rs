//! Well-known 16-byte keys and the partition-kind/status byte layout.
//!
//! Grounded on `exiftool-formats::mxf::MxfParser`'s `PARTITION_PACK_KEY`
//! prefix constant (already present in the pack as read-only reference),
//! generalized from a 13-byte prefix used only to detect a file as MXF into
//! the full key set a read/write partition layer needs: partition packs
//! (parameterized by kind/status), the Primer Pack, KLVFill, and the RIP.

use mxf_types::UL;

const REGISTER_PREFIX: [u8; 12] = [0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x00, 0x0D, 0x01, 0x02, 0x01];

/// Which section of the file a partition pack opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Header,
    Body,
    Footer,
}

impl PartitionKind {
    fn byte(self) -> u8 {
        match self {
            PartitionKind::Header => 0x02,
            PartitionKind::Body => 0x03,
            PartitionKind::Footer => 0x04,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x02 => Some(PartitionKind::Header),
            0x03 => Some(PartitionKind::Body),
            0x04 => Some(PartitionKind::Footer),
            _ => None,
        }
    }
}

/// Open/closed crossed with complete/incomplete, per spec.md §6: "byte 13
/// distinguishes open/closed × header/body/footer and complete/incomplete".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    OpenIncomplete,
    ClosedIncomplete,
    OpenComplete,
    ClosedComplete,
}

impl PartitionStatus {
    fn byte(self) -> u8 {
        match self {
            PartitionStatus::OpenIncomplete => 0x01,
            PartitionStatus::ClosedIncomplete => 0x02,
            PartitionStatus::OpenComplete => 0x03,
            PartitionStatus::ClosedComplete => 0x04,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(PartitionStatus::OpenIncomplete),
            0x02 => Some(PartitionStatus::ClosedIncomplete),
            0x03 => Some(PartitionStatus::OpenComplete),
            0x04 => Some(PartitionStatus::ClosedComplete),
            _ => None,
        }
    }
}

/// Build a partition pack key for the given kind/status.
pub fn partition_key(kind: PartitionKind, status: PartitionStatus) -> UL {
    let mut bytes = [0u8; 16];
    bytes[..12].copy_from_slice(&REGISTER_PREFIX);
    bytes[12] = kind.byte();
    bytes[13] = status.byte();
    UL::new(bytes)
}

/// Recognise a UL as a partition pack key (by the shared 12-byte prefix,
/// per the versionless-equality convention ULs use for identity) and decode
/// its kind/status from bytes 12-13.
pub fn decode_partition_key(ul: &UL) -> Option<(PartitionKind, PartitionStatus)> {
    let b = ul.as_bytes();
    if b[..12] != REGISTER_PREFIX {
        return None;
    }
    Some((PartitionKind::from_byte(b[12])?, PartitionStatus::from_byte(b[13])?))
}

/// Primer Pack key.
pub fn primer_key() -> UL {
    let mut bytes = [0u8; 16];
    bytes[..12].copy_from_slice(&REGISTER_PREFIX);
    bytes[12] = 0x05;
    bytes[13] = 0x01;
    UL::new(bytes)
}

/// KLVFill key (filler, used for KAG padding).
pub fn fill_key() -> UL {
    UL::new([0x06, 0x0E, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00, 0x00])
}

/// Index Table Segment key.
pub fn index_segment_key() -> UL {
    UL::new([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x53, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x10, 0x01, 0x00])
}

/// Random Index Pack key (must be the last KLV in a file, per spec.md §6).
pub fn rip_key() -> UL {
    UL::new([0x06, 0x0E, 0x2B, 0x34, 0x02, 0x05, 0x01, 0x01, 0x0D, 0x01, 0x02, 0x01, 0x01, 0x11, 0x01, 0x00])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_key_round_trips_through_decode() {
        let ul = partition_key(PartitionKind::Body, PartitionStatus::ClosedComplete);
        assert_eq!(decode_partition_key(&ul), Some((PartitionKind::Body, PartitionStatus::ClosedComplete)));
    }

    #[test]
    fn non_partition_key_does_not_decode() {
        assert_eq!(decode_partition_key(&fill_key()), None);
    }
}
