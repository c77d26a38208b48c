//! [`KLVObject`] — a key (UL), a length (value bytes), and source/destination
//! metadata, with a lazily-read value and a lazily-written KL.
//!
//! Grounded on `exiftool-core::ifd::IfdReader`'s offset-based, bounds-checked
//! `read_bytes`/`read_u16`/`read_u32` helpers, generalized from fixed-size
//! IFD entry reads to arbitrary-length KLV value reads with deferred value
//! materialization.

use std::io::{Read, Seek, SeekFrom};

use mxf_core::{ber, DataChunk, Diagnostics};
use mxf_types::UL;

use crate::{Error, Result};

/// Hook for streaming a KLV's value instead of buffering it in memory —
/// used for large essence payloads the caller wants to drain incrementally.
pub trait ReadHandler {
    /// Fill `out` with `size` bytes starting at absolute file `offset`,
    /// returning the number of bytes actually placed.
    fn read_data(&mut self, offset: u64, size: u64, out: &mut DataChunk) -> Result<u64>;
}

/// Extension point for a transforming KLV subclass (spec.md §4.4's
/// encrypted-KLV hook). The concrete AS-DCP KLVE implementation is an
/// out-of-scope external collaborator (spec.md §1); only the hook is
/// provided so the core stays open to it.
pub trait KlvTransform: Send + Sync {
    /// The UL exposed to callers, given the UL actually present on disk.
    fn reveal_ul(&self, on_disk: &UL) -> UL;
    /// The value length exposed to callers after removing wrapper overhead
    /// (prefix, check value, padding).
    fn reveal_length(&self, on_disk_length: u64) -> u64;
}

enum ValueState {
    Deferred,
    Present(DataChunk),
}

/// A streaming KLV: key, length, and a value that may not have been read
/// (or, on the write side, written) yet.
pub struct KLVObject {
    pub key: UL,
    pub length: u64,
    /// Bytes occupied by the key+length encoding, recorded by `read_kl`/
    /// `write_kl` so `read_data_from`/`write_data_to` know where the value
    /// begins.
    pub kl_size: usize,
    pub file_offset: Option<u64>,
    value: ValueState,
    transform: Option<Box<dyn KlvTransform>>,
}

impl KLVObject {
    pub fn new(key: UL, length: u64) -> Self {
        Self { key, length, kl_size: 0, file_offset: None, value: ValueState::Deferred, transform: None }
    }

    pub fn from_value(key: UL, value: DataChunk) -> Self {
        let length = value.len() as u64;
        Self { key, length, kl_size: 0, file_offset: None, value: ValueState::Present(value), transform: None }
    }

    pub fn with_transform(mut self, transform: Box<dyn KlvTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// The UL a caller should see: the plaintext UL if a transform is
    /// installed (it has already consumed the wrapper header), else `key`.
    pub fn exposed_key(&self) -> UL {
        match &self.transform {
            Some(t) => t.reveal_ul(&self.key),
            None => self.key,
        }
    }

    pub fn exposed_length(&self) -> u64 {
        match &self.transform {
            Some(t) => t.reveal_length(self.length),
            None => self.length,
        }
    }

    /// Seek to `offset`, read the 16-byte key and BER length, and return a
    /// `KLVObject` with its value left deferred.
    pub fn read_kl<R: Read + Seek>(reader: &mut R, offset: u64) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset))?;
        let mut key_bytes = [0u8; 16];
        reader.read_exact(&mut key_bytes)?;
        let key = UL::new(key_bytes);

        let mut len_buf = [0u8; 9];
        reader.read_exact(&mut len_buf[..1])?;
        let first = len_buf[0];
        let extra = if first & 0x80 != 0 { (first & 0x7F) as usize } else { 0 };
        if extra > 8 {
            return Err(Error::Core(mxf_core::Error::BerLengthTooLong(extra + 1)));
        }
        if extra > 0 {
            reader.read_exact(&mut len_buf[1..1 + extra])?;
        }
        let decoded = ber::decode(&len_buf[..1 + extra])?;

        Ok(Self {
            key,
            length: decoded.value,
            kl_size: 16 + decoded.size,
            file_offset: Some(offset),
            value: ValueState::Deferred,
            transform: None,
        })
    }

    pub fn has_value(&self) -> bool {
        matches!(self.value, ValueState::Present(_))
    }

    pub fn value(&self) -> Option<&DataChunk> {
        match &self.value {
            ValueState::Present(c) => Some(c),
            ValueState::Deferred => None,
        }
    }

    /// Read `size` bytes of the *value* (relative to the end of the KL)
    /// starting at `rel_offset`, either directly from `reader` or via
    /// `handler` when one is supplied for streaming large payloads.
    pub fn read_data_from<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        rel_offset: u64,
        size: u64,
        handler: Option<&mut dyn ReadHandler>,
    ) -> Result<()> {
        let base = self.file_offset.ok_or(Error::NoSourceLocation)? + self.kl_size as u64 + rel_offset;
        let chunk = match handler {
            Some(h) => {
                let mut out = DataChunk::new();
                h.read_data(base, size, &mut out)?;
                out
            }
            None => {
                reader.seek(SeekFrom::Start(base))?;
                let mut buf = vec![0u8; size as usize];
                reader.read_exact(&mut buf)?;
                DataChunk::from_bytes(buf)
            }
        };
        self.value = ValueState::Present(chunk);
        Ok(())
    }

    /// Read the entire value in one call.
    pub fn read_all_data<R: Read + Seek>(&mut self, reader: &mut R) -> Result<()> {
        let len = self.length;
        self.read_data_from(reader, 0, len, None)
    }

    /// Emit the key and a BER length, recording `kl_size` so a later
    /// `write_data_to` knows nothing more precedes the value.
    ///
    /// `new_length` lets a caller patch the declared length (e.g. once the
    /// value size is finally known) before the bytes are emitted.
    pub fn write_kl(&mut self, out: &mut Vec<u8>, len_size: Option<usize>, new_length: Option<u64>, diag: &dyn Diagnostics) -> Result<()> {
        if let Some(len) = new_length {
            self.length = len;
        }
        out.extend_from_slice(self.key.as_bytes());
        let before = out.len();
        ber::encode(out, self.length, len_size, diag)?;
        self.kl_size = 16 + (out.len() - before);
        Ok(())
    }

    /// Append value bytes. Must follow a `write_kl` call for this object.
    pub fn write_data_to(&self, out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
        if self.kl_size == 0 {
            return Err(Error::WriteDataBeforeWriteKl);
        }
        out.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxf_core::StderrDiagnostics;
    use std::io::Cursor;

    fn test_ul(b: u8) -> UL {
        let mut bytes = [0u8; 16];
        bytes[0] = b;
        UL::new(bytes)
    }

    #[test]
    fn read_kl_then_value_round_trip() {
        let mut bytes = test_ul(0x42).as_bytes().to_vec();
        bytes.push(5); // short-form BER length
        bytes.extend_from_slice(b"hello");
        let mut cursor = Cursor::new(bytes);

        let mut klv = KLVObject::read_kl(&mut cursor, 0).unwrap();
        assert_eq!(klv.kl_size, 17);
        assert_eq!(klv.length, 5);
        assert!(!klv.has_value());

        klv.read_all_data(&mut cursor).unwrap();
        assert_eq!(klv.value().unwrap().as_slice(), b"hello");
    }

    #[test]
    fn write_kl_then_write_data() {
        let mut klv = KLVObject::new(test_ul(1), 3);
        let mut out = Vec::new();
        klv.write_kl(&mut out, None, None, &StderrDiagnostics).unwrap();
        klv.write_data_to(&mut out, b"abc").unwrap();
        assert_eq!(out.len(), 16 + 1 + 3);

        let mut cursor = Cursor::new(out);
        let mut reread = KLVObject::read_kl(&mut cursor, 0).unwrap();
        reread.read_all_data(&mut cursor).unwrap();
        assert_eq!(reread.value().unwrap().as_slice(), b"abc");
    }

    #[test]
    fn write_data_before_write_kl_is_rejected() {
        let klv = KLVObject::new(test_ul(1), 3);
        let mut out = Vec::new();
        assert!(matches!(klv.write_data_to(&mut out, b"abc"), Err(Error::WriteDataBeforeWriteKl)));
    }

    struct CountingHandler {
        calls: usize,
    }
    impl ReadHandler for CountingHandler {
        fn read_data(&mut self, offset: u64, size: u64, out: &mut DataChunk) -> Result<u64> {
            self.calls += 1;
            out.resize(size as usize, false);
            let _ = offset;
            Ok(size)
        }
    }

    #[test]
    fn read_data_from_delegates_to_handler() {
        let bytes = {
            let mut b = test_ul(9).as_bytes().to_vec();
            b.push(4);
            b.extend_from_slice(b"data");
            b
        };
        let mut cursor = Cursor::new(bytes);
        let mut klv = KLVObject::read_kl(&mut cursor, 0).unwrap();
        let mut handler = CountingHandler { calls: 0 };
        klv.read_data_from(&mut cursor, 0, 4, Some(&mut handler)).unwrap();
        assert_eq!(handler.calls, 1);
        assert_eq!(klv.value().unwrap().len(), 4);
    }
}
