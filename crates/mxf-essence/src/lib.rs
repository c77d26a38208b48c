//! Essence parser contract plus the PCM, MPEG-2 VES, DV DIF and JP2K
//! parsers (spec.md §4.8): identify a bitstream, choose how to wrap it into
//! the Generic Container, then stream it one edit unit at a time.
//!
//! PCM is fully implemented, including the sample-per-edit-unit wrapping
//! sequence calculation; the other three provide working but intentionally
//! simplified bodies, enough to exercise `identify_wrapping_options` /
//! `use_wrapping` / indexing decisions correctly without a full bitstream
//! decoder.

mod descriptor;
mod dv;
mod error;
mod jp2k;
mod mpeg2ves;
mod parser;
mod pcm;
mod source;

pub use descriptor::{EssenceStreamDescriptor, WrapKind, WrappingOption};
pub use dv::{DvDifParser, LineStandard, DV_WRAPPING_LABEL};
pub use error::{Error, Result};
pub use jp2k::{Jp2kParser, JP2K_WRAPPING_LABEL};
pub use mpeg2ves::{Mpeg2VesParser, MPEG2_WRAPPING_LABEL};
pub use parser::{EssenceParser, EssenceParserFactory, ReadSeek};
pub use pcm::{calc_wrapping_sequence, PcmParser, WrappingSequence, PCM_WRAPPING_LABEL};
pub use source::EssenceSource;
