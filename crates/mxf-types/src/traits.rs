//! [`MDTraits`] — the polymorphic operations a type's wire bytes support.
//!
//! Each type record (see [`crate::TypeRecord`]) names a traits implementation
//! by string; the registry looks the traits object up by that name rather
//! than by Rust type, so a schema-described type (were an XML dictionary
//! loader plugged in — out of scope here, see `SPEC_FULL.md`) can bind to a
//! built-in traits implementation without generating code.

use mxf_core::DataChunk;

use crate::{Error, Rational, Result, Uuid, UL};

/// Conversions between a `DataChunk`'s raw bytes and typed scalars/strings.
///
/// Every method has a default that reports a type mismatch; a concrete
/// traits implementation overrides only the handful it actually supports
/// (e.g. `StringTraits` only overrides `get_string`/`set_string`).
pub trait MDTraits: Send + Sync {
    fn set_int(&self, _chunk: &mut DataChunk, _value: i32) -> Result<()> {
        Err(Error::TraitMismatch("set_int"))
    }
    fn get_int(&self, _chunk: &DataChunk) -> Result<i32> {
        Err(Error::TraitMismatch("get_int"))
    }
    fn set_uint(&self, _chunk: &mut DataChunk, _value: u32) -> Result<()> {
        Err(Error::TraitMismatch("set_uint"))
    }
    fn get_uint(&self, _chunk: &DataChunk) -> Result<u32> {
        Err(Error::TraitMismatch("get_uint"))
    }
    fn set_int64(&self, _chunk: &mut DataChunk, _value: i64) -> Result<()> {
        Err(Error::TraitMismatch("set_int64"))
    }
    fn get_int64(&self, _chunk: &DataChunk) -> Result<i64> {
        Err(Error::TraitMismatch("get_int64"))
    }
    fn set_uint64(&self, _chunk: &mut DataChunk, _value: u64) -> Result<()> {
        Err(Error::TraitMismatch("set_uint64"))
    }
    fn get_uint64(&self, _chunk: &DataChunk) -> Result<u64> {
        Err(Error::TraitMismatch("get_uint64"))
    }
    fn set_string(&self, _chunk: &mut DataChunk, _value: &str) -> Result<()> {
        Err(Error::TraitMismatch("set_string"))
    }
    fn get_string(&self, _chunk: &DataChunk) -> Result<String> {
        Err(Error::TraitMismatch("get_string"))
    }

    /// Whether this traits implementation owns its object's entire byte
    /// buffer and should be treated as a flat leaf regardless of what the
    /// type record's structure would otherwise suggest (e.g. a compound
    /// type whose traits serialize it as one opaque blob).
    fn handles_subdata(&self) -> bool {
        false
    }
}

macro_rules! fixed_int_traits {
    ($name:ident, $bytes:expr, signed) => {
        pub struct $name;
        impl MDTraits for $name {
            fn set_int64(&self, chunk: &mut DataChunk, value: i64) -> Result<()> {
                let full = (value as i64).to_be_bytes();
                *chunk = DataChunk::from_bytes(full[8 - $bytes..].to_vec());
                Ok(())
            }
            fn get_int64(&self, chunk: &DataChunk) -> Result<i64> {
                let bytes = chunk.as_slice();
                if bytes.len() != $bytes {
                    return Err(Error::TraitMismatch(stringify!($name)));
                }
                let mut full = [0u8; 8];
                let sign_extend = bytes[0] & 0x80 != 0;
                if sign_extend {
                    full = [0xFF; 8];
                }
                full[8 - $bytes..].copy_from_slice(bytes);
                Ok(i64::from_be_bytes(full))
            }
        }
    };
    ($name:ident, $bytes:expr, unsigned) => {
        pub struct $name;
        impl MDTraits for $name {
            fn set_uint64(&self, chunk: &mut DataChunk, value: u64) -> Result<()> {
                let full = value.to_be_bytes();
                *chunk = DataChunk::from_bytes(full[8 - $bytes..].to_vec());
                Ok(())
            }
            fn get_uint64(&self, chunk: &DataChunk) -> Result<u64> {
                let bytes = chunk.as_slice();
                if bytes.len() != $bytes {
                    return Err(Error::TraitMismatch(stringify!($name)));
                }
                let mut full = [0u8; 8];
                full[8 - $bytes..].copy_from_slice(bytes);
                Ok(u64::from_be_bytes(full))
            }
        }
    };
}

fixed_int_traits!(Int8Traits, 1, signed);
fixed_int_traits!(Int16Traits, 2, signed);
fixed_int_traits!(Int32Traits, 4, signed);
fixed_int_traits!(Int64Traits, 8, signed);
fixed_int_traits!(UInt8Traits, 1, unsigned);
fixed_int_traits!(UInt16Traits, 2, unsigned);
fixed_int_traits!(UInt32Traits, 4, unsigned);
fixed_int_traits!(UInt64Traits, 8, unsigned);

// The wide integer traits additionally expose the narrower `get_int`/
// `set_uint` entry points by truncating/widening through the 64-bit path —
// this is the same "narrow accessor over a wide store" shape the teacher's
// `ExifFormat` integer variants use (UInt16/UInt32/UInt64 all ultimately
// widen to a common numeric form before `PrintConv`/interpretation).
impl UInt32Traits {
    pub fn get_u32(&self, chunk: &DataChunk) -> Result<u32> {
        self.get_uint64(chunk).map(|v| v as u32)
    }
}
impl Int32Traits {
    pub fn get_i32(&self, chunk: &DataChunk) -> Result<i32> {
        self.get_int64(chunk).map(|v| v as i32)
    }
}

/// ASCII/Latin-1 string traits: no length prefix, the whole chunk is the
/// string (callers trim trailing NULs themselves, matching how `IfdReader`
/// trims EXIF ASCII strings).
pub struct StringTraits;
impl MDTraits for StringTraits {
    fn set_string(&self, chunk: &mut DataChunk, value: &str) -> Result<()> {
        *chunk = DataChunk::from_bytes(value.as_bytes().to_vec());
        Ok(())
    }
    fn get_string(&self, chunk: &DataChunk) -> Result<String> {
        Ok(chunk.as_slice().iter().take_while(|&&b| b != 0).map(|&b| b as char).collect())
    }
}

/// UTF-16BE string traits, used by MXF's `UTF16String` type
/// (e.g. `Identification.ProductName`). Decoding goes through `encoding_rs`
/// rather than a hand-rolled `u16` loop.
pub struct Utf16Traits;
impl MDTraits for Utf16Traits {
    fn set_string(&self, chunk: &mut DataChunk, value: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(value.len() * 2);
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        *chunk = DataChunk::from_bytes(bytes);
        Ok(())
    }
    fn get_string(&self, chunk: &DataChunk) -> Result<String> {
        let (decoded, _, had_errors) = encoding_rs::UTF_16BE.decode(chunk.as_slice());
        if had_errors {
            return Err(Error::TraitMismatch("Utf16Traits"));
        }
        Ok(decoded.trim_end_matches('\0').to_string())
    }
}

/// ISO-7-ish MXF timestamp: 8 bytes — year (u16 BE), month, day, hour,
/// minute, second, and quarter-milliseconds-of-second (all u8).
pub struct TimestampTraits;
impl TimestampTraits {
    pub fn decode(chunk: &DataChunk) -> Result<chrono::NaiveDateTime> {
        let b = chunk.as_slice();
        if b.len() != 8 {
            return Err(Error::TraitMismatch("TimestampTraits"));
        }
        let year = u16::from_be_bytes([b[0], b[1]]) as i32;
        let (month, day, hour, min, sec, qms) = (b[2] as u32, b[3] as u32, b[4] as u32, b[5] as u32, b[6] as u32, b[7] as u32);
        let ms = qms * 4;
        let date = chrono::NaiveDate::from_ymd_opt(year, month.max(1), day.max(1))
            .ok_or(Error::TraitMismatch("TimestampTraits"))?;
        let time = chrono::NaiveTime::from_hms_milli_opt(hour, min, sec, ms).ok_or(Error::TraitMismatch("TimestampTraits"))?;
        Ok(chrono::NaiveDateTime::new(date, time))
    }

    pub fn encode(dt: &chrono::NaiveDateTime) -> Vec<u8> {
        use chrono::{Datelike, Timelike};
        let mut out = Vec::with_capacity(8);
        out.extend_from_slice(&(dt.year() as u16).to_be_bytes());
        out.push(dt.month() as u8);
        out.push(dt.day() as u8);
        out.push(dt.hour() as u8);
        out.push(dt.minute() as u8);
        out.push(dt.second() as u8);
        out.push((dt.nanosecond() / 1_000_000 / 4) as u8);
        out
    }
}
impl MDTraits for TimestampTraits {
    fn get_string(&self, chunk: &DataChunk) -> Result<String> {
        Ok(Self::decode(chunk)?.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
    }
}

/// UL traits: 16 raw bytes, versionless-compare-aware equality is provided
/// by [`crate::UL`] itself; these traits just move bytes in and out.
pub struct UlTraits;
impl UlTraits {
    pub fn decode(chunk: &DataChunk) -> Result<UL> {
        UL::from_slice(chunk.as_slice()).ok_or(Error::TraitMismatch("UlTraits"))
    }
    pub fn encode(ul: &UL) -> Vec<u8> {
        ul.as_bytes().to_vec()
    }
}
impl MDTraits for UlTraits {}

/// UUID traits: 16 raw bytes.
pub struct UuidTraits;
impl UuidTraits {
    pub fn decode(chunk: &DataChunk) -> Result<Uuid> {
        Uuid::from_slice(chunk.as_slice()).ok_or(Error::TraitMismatch("UuidTraits"))
    }
    pub fn encode(id: &Uuid) -> Vec<u8> {
        id.as_bytes().to_vec()
    }
}
impl MDTraits for UuidTraits {}

/// Rational traits: two big-endian `Int32`s.
pub struct RationalTraits;
impl RationalTraits {
    pub fn decode(chunk: &DataChunk) -> Result<Rational> {
        let b = chunk.as_slice();
        if b.len() != 8 {
            return Err(Error::TraitMismatch("RationalTraits"));
        }
        let num = i32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let den = i32::from_be_bytes([b[4], b[5], b[6], b[7]]);
        Ok(Rational::new(num, den))
    }
    pub fn encode(r: &Rational) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        out.extend_from_slice(&r.numerator.to_be_bytes());
        out.extend_from_slice(&r.denominator.to_be_bytes());
        out
    }
}
impl MDTraits for RationalTraits {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint32_round_trip() {
        let t = UInt32Traits;
        let mut chunk = DataChunk::new();
        t.set_uint64(&mut chunk, 0xDEAD_BEEF).unwrap();
        assert_eq!(t.get_u32(&chunk).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn int16_sign_extends() {
        let t = Int16Traits;
        let mut chunk = DataChunk::new();
        t.set_int64(&mut chunk, -5).unwrap();
        assert_eq!(t.get_int64(&chunk).unwrap(), -5);
    }

    #[test]
    fn utf16_round_trip() {
        let t = Utf16Traits;
        let mut chunk = DataChunk::new();
        t.set_string(&mut chunk, "mxflib").unwrap();
        assert_eq!(t.get_string(&chunk).unwrap(), "mxflib");
    }

    #[test]
    fn timestamp_round_trip() {
        let dt = chrono::NaiveDate::from_ymd_opt(2026, 7, 28)
            .unwrap()
            .and_hms_milli_opt(10, 30, 0, 500)
            .unwrap();
        let bytes = TimestampTraits::encode(&dt);
        let chunk = DataChunk::from_bytes(bytes);
        let decoded = TimestampTraits::decode(&chunk).unwrap();
        assert_eq!(decoded.and_utc().timestamp(), dt.and_utc().timestamp());
    }
}
