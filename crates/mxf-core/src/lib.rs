//! Low-level primitives shared by the whole MXF toolkit.
//!
//! - [`endian`] / free functions — big-endian integer I/O, with [`Endian`]
//!   for the handful of little-endian sub-formats MXF carries.
//! - [`ber`] — BER length encode/decode.
//! - [`DataChunk`] — owned-or-borrowed byte buffer with granularity growth.
//! - [`Diagnostics`] — the application-replaceable warning sink used
//!   throughout the higher-level crates.

pub mod ber;
mod datachunk;
mod diagnostics;
mod endian;
mod error;

pub use ber::BerLength;
pub use datachunk::DataChunk;
pub use diagnostics::{CollectingDiagnostics, Diagnostics, NullDiagnostics, StderrDiagnostics};
pub use endian::{get_i32, get_i8, get_u16, get_u32, get_u64, get_u8, put_u16, put_u32, put_u64, put_u8, Endian};
pub use error::{Error, Result};
