//! [`EssenceParser`] and the [`EssenceParserFactory`] that tries a file
//! against each registered parser in turn (spec.md §4.8).
//!
//! Grounded on `exiftool_formats::traits::{FormatParser, ReadSeek}` — the
//! same dyn-object-safe "take `&mut dyn ReadSeek` instead of a generic
//! reader parameter" shape — generalized from a single `parse` call to the
//! richer identify/wrap/stream lifecycle essence parsing needs, and on
//! `exiftool_formats::registry::FormatRegistry::{register, detect}` for the
//! factory's linear-scan-first-match shape.

use std::io::{Read, Seek};

use mxf_types::Rational;

use crate::descriptor::{EssenceStreamDescriptor, WrappingOption};
use crate::source::EssenceSource;
use crate::Result;

/// Combined `Read + Seek`, needed to keep essence sources dyn-compatible.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A format-specific essence parser.
pub trait EssenceParser: Send + Sync {
    fn format_name(&self) -> &'static str;

    /// Scan `reader` and report every essence stream it contains.
    fn identify_essence(&self, reader: &mut dyn ReadSeek) -> Result<Vec<EssenceStreamDescriptor>>;

    /// Enumerate the ways `descriptor`'s stream could be wrapped.
    fn identify_wrapping_options(&self, reader: &mut dyn ReadSeek, descriptor: &EssenceStreamDescriptor) -> Result<Vec<WrappingOption>>;

    /// Commit to wrapping `stream_id` using `option`.
    fn use_wrapping(&mut self, stream_id: u32, option: &WrappingOption) -> Result<()>;

    /// Request an edit rate for `stream_id`; returns whether it is
    /// achievable (an exact rational multiple of the native rate for
    /// frame wrapping, any rate for clip wrapping).
    fn set_edit_rate(&mut self, stream_id: u32, rate: Rational) -> bool;

    /// Build a lazy producer for `stream_id`, reading at most `count` edit
    /// units (`None` for "until end of data").
    fn get_essence_source(&self, reader: &mut dyn ReadSeek, stream_id: u32, count: Option<u64>) -> Result<Box<dyn EssenceSource>>;
}

/// Tries each registered parser's `identify_essence` in registration order
/// and returns the first that reports at least one stream.
#[derive(Default)]
pub struct EssenceParserFactory {
    parsers: Vec<Box<dyn EssenceParser>>,
}

impl EssenceParserFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, parser: Box<dyn EssenceParser>) {
        self.parsers.push(parser);
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Find the first parser that recognises `reader`'s content, returning
    /// its index alongside the streams it identified. Rewinds `reader`
    /// between attempts so every parser sees the same starting position.
    pub fn identify(&self, reader: &mut dyn ReadSeek) -> Result<Option<(usize, Vec<EssenceStreamDescriptor>)>> {
        for (i, parser) in self.parsers.iter().enumerate() {
            reader.seek(std::io::SeekFrom::Start(0))?;
            if let Ok(streams) = parser.identify_essence(reader) {
                if !streams.is_empty() {
                    return Ok(Some((i, streams)));
                }
            }
        }
        Ok(None)
    }

    pub fn get(&self, index: usize) -> Option<&dyn EssenceParser> {
        self.parsers.get(index).map(|b| b.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn EssenceParser + 'static)> {
        self.parsers.get_mut(index).map(|b| b.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::PcmParser;

    #[test]
    fn factory_starts_empty_and_accepts_registrations() {
        let mut factory = EssenceParserFactory::new();
        assert!(factory.is_empty());
        factory.register(Box::new(PcmParser::new()));
        assert_eq!(factory.len(), 1);
        assert_eq!(factory.get(0).unwrap().format_name(), "PCM");
    }
}
