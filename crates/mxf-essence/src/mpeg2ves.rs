//! MPEG-2 video elementary stream essence parser — a working but
//! intentionally simplified body (spec.md §1, §4.8): finds start codes and
//! reports edit points, but does not decode picture content.
//!
//! Grounded on `exiftool_formats::mpeg_ts::MpegTsParser`'s byte-aligned
//! start-code / sync-byte scanner shape, generalized from transport-stream
//! packet sync to MPEG-2 ES start-code scanning.

use std::io::{Read, Seek, SeekFrom};

use mxf_core::DataChunk;
use mxf_types::{Rational, UL};

use crate::descriptor::{EssenceStreamDescriptor, WrapKind, WrappingOption};
use crate::parser::{EssenceParser, ReadSeek};
use crate::source::EssenceSource;
use crate::{Error, Result};

const SEQUENCE_HEADER_CODE: u8 = 0xB3;
const GOP_START_CODE: u8 = 0xB8;
const PICTURE_START_CODE: u8 = 0x00;

pub const MPEG2_WRAPPING_LABEL: UL = UL::new([0x06, 0x0E, 0x2B, 0x34, 0x04, 0x01, 0x01, 0x01, 0x0D, 0x01, 0x03, 0x01, 0x15, 0x01, 0x05, 0x00]);

const GC_ESSENCE_TYPE_PICTURE: u8 = 0x15;
const GC_ELEMENT_PICTURE: u8 = 0x01;

fn find_start_codes(bytes: &[u8]) -> Vec<(usize, u8)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 3 < bytes.len() {
        if bytes[i] == 0 && bytes[i + 1] == 0 && bytes[i + 2] == 1 {
            out.push((i, bytes[i + 3]));
            i += 4;
        } else {
            i += 1;
        }
    }
    out
}

/// One parsed picture's position and coding-order metadata, enough to
/// drive index construction without decoding the picture itself.
#[derive(Debug, Clone, Copy)]
struct PictureRecord {
    offset: usize,
    is_closed_gop_edit_point: bool,
}

pub struct Mpeg2VesParser {
    edit_rate: Option<Rational>,
    wrap_kind: Option<WrapKind>,
}

impl Default for Mpeg2VesParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Mpeg2VesParser {
    pub fn new() -> Self {
        Mpeg2VesParser { edit_rate: None, wrap_kind: None }
    }

    fn scan(reader: &mut dyn ReadSeek) -> Result<Vec<PictureRecord>> {
        reader.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let codes = find_start_codes(&bytes);
        if !codes.iter().any(|(_, c)| *c == SEQUENCE_HEADER_CODE) {
            return Err(Error::NotRecognised);
        }

        let mut pictures = Vec::new();
        let mut pending_closed_gop = false;
        let mut seen_sequence_header_since_gop = false;
        for (offset, code) in codes {
            match code {
                SEQUENCE_HEADER_CODE => seen_sequence_header_since_gop = true,
                GOP_START_CODE => pending_closed_gop = seen_sequence_header_since_gop,
                PICTURE_START_CODE => {
                    pictures.push(PictureRecord { offset, is_closed_gop_edit_point: pending_closed_gop });
                    pending_closed_gop = false;
                    seen_sequence_header_since_gop = false;
                }
                _ => {}
            }
        }
        Ok(pictures)
    }
}

impl EssenceParser for Mpeg2VesParser {
    fn format_name(&self) -> &'static str {
        "MPEG2VES"
    }

    fn identify_essence(&self, reader: &mut dyn ReadSeek) -> Result<Vec<EssenceStreamDescriptor>> {
        let pictures = Self::scan(reader)?;
        Ok(vec![EssenceStreamDescriptor {
            stream_id: 0,
            description: format!("MPEG-2 ES, {} pictures", pictures.len()),
            source_format_tag: [0u8; 16],
            descriptor: None,
        }])
    }

    fn identify_wrapping_options(&self, _reader: &mut dyn ReadSeek, descriptor: &EssenceStreamDescriptor) -> Result<Vec<WrappingOption>> {
        if descriptor.stream_id != 0 {
            return Err(Error::NoSuchStream(descriptor.stream_id));
        }
        Ok(vec![WrappingOption {
            label: MPEG2_WRAPPING_LABEL,
            gc_essence_type: GC_ESSENCE_TYPE_PICTURE,
            gc_element_type: GC_ELEMENT_PICTURE,
            wrap_kind: WrapKind::Frame,
            accepts_other_rate: false,
            can_index: true,
        }])
    }

    fn use_wrapping(&mut self, stream_id: u32, option: &WrappingOption) -> Result<()> {
        if stream_id != 0 {
            return Err(Error::NoSuchStream(stream_id));
        }
        self.wrap_kind = Some(option.wrap_kind);
        Ok(())
    }

    fn set_edit_rate(&mut self, stream_id: u32, rate: Rational) -> bool {
        if stream_id != 0 || self.wrap_kind.is_none() {
            return false;
        }
        self.edit_rate = Some(rate);
        true
    }

    fn get_essence_source(&self, reader: &mut dyn ReadSeek, stream_id: u32, count: Option<u64>) -> Result<Box<dyn EssenceSource>> {
        if stream_id != 0 {
            return Err(Error::NoSuchStream(stream_id));
        }
        let edit_rate = self.edit_rate.ok_or(Error::WrappingNotSelected)?;
        let pictures = Self::scan(reader)?;

        reader.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;

        Ok(Box::new(Mpeg2EssenceSource { bytes, pictures, index: 0, cursor: 0, max_edit_units: count, edit_rate, at_end_of_item: false }))
    }
}

struct Mpeg2EssenceSource {
    bytes: Vec<u8>,
    pictures: Vec<PictureRecord>,
    index: usize,
    cursor: usize,
    max_edit_units: Option<u64>,
    edit_rate: Rational,
    at_end_of_item: bool,
}

impl Mpeg2EssenceSource {
    fn current_span(&self) -> Option<(usize, usize)> {
        let start = self.pictures.get(self.index)?.offset;
        let end = self.pictures.get(self.index + 1).map(|p| p.offset).unwrap_or(self.bytes.len());
        Some((start, end))
    }
}

impl EssenceSource for Mpeg2EssenceSource {
    fn get_essence_data_size(&mut self) -> Result<Option<u64>> {
        Ok(self.current_span().map(|(s, e)| (e - s - (self.cursor.saturating_sub(s))) as u64))
    }

    fn get_essence_data(&mut self, _size: Option<u64>, max_size: Option<u64>) -> Result<DataChunk> {
        let Some((start, end)) = self.current_span() else {
            self.at_end_of_item = true;
            return Ok(DataChunk::new());
        };
        let from = self.cursor.max(start);
        let mut to = end;
        if let Some(max) = max_size {
            to = to.min(from + max as usize);
        }
        let chunk = DataChunk::from_bytes(self.bytes[from..to].to_vec());
        self.cursor = to;
        self.at_end_of_item = self.cursor >= end;
        if self.at_end_of_item {
            self.index += 1;
        }
        Ok(chunk)
    }

    fn end_of_item(&self) -> bool {
        self.at_end_of_item
    }

    fn end_of_data(&self) -> bool {
        self.index >= self.pictures.len() || matches!(self.max_edit_units, Some(max) if self.index as u64 >= max)
    }

    fn get_edit_rate(&self) -> Rational {
        self.edit_rate
    }

    fn get_current_position(&self) -> i64 {
        self.index as i64
    }

    fn get_bytes_per_edit_unit(&self, _kag: u32) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn synth_stream() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&[0, 0, 1, SEQUENCE_HEADER_CODE]);
        out.extend_from_slice(&[0xAA; 8]);
        out.extend_from_slice(&[0, 0, 1, GOP_START_CODE]);
        out.extend_from_slice(&[0xBB; 4]);
        out.extend_from_slice(&[0, 0, 1, PICTURE_START_CODE]);
        out.extend_from_slice(&[0xCC; 16]);
        out.extend_from_slice(&[0, 0, 1, PICTURE_START_CODE]);
        out.extend_from_slice(&[0xDD; 16]);
        out
    }

    #[test]
    fn identifies_closed_gop_edit_point_and_two_pictures() {
        let mut cursor = Cursor::new(synth_stream());
        let pictures = Mpeg2VesParser::scan(&mut cursor).unwrap();
        assert_eq!(pictures.len(), 2);
        assert!(pictures[0].is_closed_gop_edit_point);
        assert!(!pictures[1].is_closed_gop_edit_point);
    }
}
