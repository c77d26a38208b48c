//! Baked-in SMPTE RP-224 data-definition ULs for the four essence-track
//! kinds the facade can create without a dictionary lookup (spec.md §6
//! "Essence tracks").

use mxf_types::UL;

const fn rp224(suffix: [u8; 3]) -> UL {
    UL::new([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x04, 0x01, 0x03, 0x02, suffix[0], suffix[1], suffix[2], 0x00])
}

pub const PICTURE: UL = rp224([0x02, 0x01, 0x00]);
pub const SOUND: UL = rp224([0x02, 0x02, 0x00]);
pub const DATA: UL = rp224([0x02, 0x03, 0x00]);
pub const TIMECODE: UL = rp224([0x02, 0x01, 0x01]);
