//! [`EssenceSource`] — a pull-based producer of essence chunks, one per
//! wrapping unit, that a `GCWriter` drains on demand (spec.md §4.8, §5:
//! "EssenceSources are pull-based — the caller drives the schedule").

use mxf_core::DataChunk;
use mxf_types::Rational;

use crate::Result;

/// A lazily-produced stream of essence chunks.
///
/// Implementations are not required to know every size in advance —
/// `get_essence_data_size` may return `None` when the next chunk's size
/// can only be discovered by scanning, in which case the caller should
/// call `get_essence_data` with an explicit `max_size` instead.
pub trait EssenceSource {
    /// Size of the next wrapping unit (one frame, or the remaining clip),
    /// if known without reading it.
    fn get_essence_data_size(&mut self) -> Result<Option<u64>>;

    /// Produce the next chunk. `size` requests an exact amount; `max_size`
    /// bounds an unsized (frame-boundary) request. Never returns more than
    /// `max_size` bytes when one is given.
    fn get_essence_data(&mut self, size: Option<u64>, max_size: Option<u64>) -> Result<DataChunk>;

    /// True once the current wrapping unit has been fully produced.
    fn end_of_item(&self) -> bool;

    /// True once there is nothing left to produce at all.
    fn end_of_data(&self) -> bool;

    fn get_edit_rate(&self) -> Rational;

    /// Current position in edit units (frame wrapping) or bytes (clip
    /// wrapping already emitted).
    fn get_current_position(&self) -> i64;

    /// `Some(n)` when every edit unit is exactly `n` bytes (suitable for a
    /// CBR index), `None` for variable-size essence.
    fn get_bytes_per_edit_unit(&self, kag: u32) -> Option<u64>;

    /// Signed rank positioning this source before/after a reference GC
    /// essence type within the same edit unit (e.g. VBI ahead of picture).
    /// `None` means "use the default write-order key".
    fn relative_write_order(&self) -> Option<i32> {
        None
    }

    fn relative_write_order_type(&self) -> Option<u8> {
        None
    }
}
