//! [`DataChunk`] — an owned-or-borrowed byte buffer with granularity-based
//! growth, used throughout the workspace as the storage for a leaf
//! [MDObject](../mxf_metadata/struct.MDObject.html) value or a KLV's raw
//! bytes. Two modes:
//!
//! - **Owned**: a `Vec<u8>` grown in multiples of its granularity.
//! - **External**: a view over a caller-owned region; never freed by the
//!   chunk, and the caller must keep the backing memory alive for at least
//!   as long as the chunk exists.

use crate::{Error, Result};

enum Storage {
    Owned(Vec<u8>),
    External { ptr: *const u8, len: usize },
}

/// An owned-or-borrowed byte buffer.
///
/// # Safety of the external mode
///
/// [`DataChunk::set_external`] stores a raw pointer into memory the caller
/// continues to own. The chunk never writes through that pointer and never
/// frees it; it is the caller's responsibility to keep the referenced memory
/// alive and unmoved for the chunk's lifetime. This mirrors the "view a
/// caller-owned region, borrowed variant never frees" data model.
pub struct DataChunk {
    storage: Storage,
    len: usize,
    granularity: usize,
}

impl Default for DataChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl DataChunk {
    /// Default growth granularity in bytes when none is specified.
    pub const DEFAULT_GRANULARITY: usize = 64;

    /// Create an empty, owned chunk with the default granularity.
    pub fn new() -> Self {
        Self::with_granularity(Self::DEFAULT_GRANULARITY)
    }

    /// Create an empty, owned chunk with an explicit growth granularity.
    pub fn with_granularity(granularity: usize) -> Self {
        Self {
            storage: Storage::Owned(Vec::new()),
            len: 0,
            granularity: granularity.max(1),
        }
    }

    /// Create an owned chunk pre-filled with `bytes`.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let v = bytes.into();
        let len = v.len();
        Self { storage: Storage::Owned(v), len, granularity: Self::DEFAULT_GRANULARITY }
    }

    /// View a caller-owned region without copying or taking ownership.
    ///
    /// # Safety
    /// `data` must outlive this `DataChunk` and must not be mutated through
    /// any other handle while this chunk exists.
    pub unsafe fn set_external(&mut self, data: &[u8]) {
        self.storage = Storage::External { ptr: data.as_ptr(), len: data.len() };
        self.len = data.len();
    }

    /// Number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this chunk is a view over external (non-owned) memory.
    pub fn is_external(&self) -> bool {
        matches!(self.storage, Storage::External { .. })
    }

    /// Capacity of the owned backing store; 0 for an external view.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Owned(v) => v.capacity(),
            Storage::External { .. } => 0,
        }
    }

    /// Borrow the valid bytes.
    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(v) => &v[..self.len],
            // SAFETY: the external pointer/len were captured together in
            // `set_external` under the caller's lifetime contract.
            Storage::External { ptr, len } => unsafe { std::slice::from_raw_parts(*ptr, *len) },
        }
    }

    /// Append bytes, growing the owned buffer in multiples of the
    /// granularity. Promotes an external view to an owned copy first.
    pub fn append(&mut self, bytes: &[u8]) {
        self.ensure_owned();
        if let Storage::Owned(v) = &mut self.storage {
            let needed = self.len + bytes.len();
            if v.capacity() < needed {
                let grown = needed.div_ceil(self.granularity) * self.granularity;
                v.reserve(grown - v.len());
            }
            v.truncate(self.len);
            v.extend_from_slice(bytes);
            self.len = v.len();
        }
    }

    /// Resize to `new_len`. When `preserve` is true, existing bytes up to
    /// `min(old_len, new_len)` are kept; otherwise the content is undefined
    /// (zero-filled) after growing.
    pub fn resize(&mut self, new_len: usize, preserve: bool) {
        self.ensure_owned();
        if let Storage::Owned(v) = &mut self.storage {
            if !preserve {
                v.clear();
            }
            v.resize(new_len, 0);
            self.len = new_len;
        }
    }

    fn ensure_owned(&mut self) {
        if let Storage::External { ptr, len } = self.storage {
            // SAFETY: same contract as `as_slice`.
            let copied = unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec();
            self.storage = Storage::Owned(copied);
        }
    }

    /// Take ownership of the backing `Vec<u8>`, leaving this chunk empty.
    /// Fails for an external (borrowed) chunk, which owns nothing to give up.
    pub fn take_buffer(&mut self) -> Result<Vec<u8>> {
        match &mut self.storage {
            Storage::Owned(v) => {
                let mut taken = std::mem::take(v);
                taken.truncate(self.len);
                self.len = 0;
                Ok(taken)
            }
            Storage::External { .. } => Err(Error::ExternalChunk),
        }
    }
}

impl Clone for DataChunk {
    fn clone(&self) -> Self {
        Self::from_bytes(self.as_slice().to_vec())
    }
}

impl std::fmt::Debug for DataChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChunk")
            .field("len", &self.len)
            .field("external", &self.is_external())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_grows_by_granularity() {
        let mut chunk = DataChunk::with_granularity(16);
        chunk.append(&[1, 2, 3]);
        assert_eq!(chunk.len(), 3);
        assert!(chunk.capacity() >= 16);
        chunk.append(&[4, 5]);
        assert_eq!(chunk.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn resize_preserve() {
        let mut chunk = DataChunk::from_bytes(vec![1, 2, 3]);
        chunk.resize(5, true);
        assert_eq!(&chunk.as_slice()[..3], &[1, 2, 3]);
        assert_eq!(chunk.len(), 5);
    }

    #[test]
    fn external_view_is_readable_but_not_takeable() {
        let backing = vec![9u8, 8, 7];
        let mut chunk = DataChunk::new();
        unsafe { chunk.set_external(&backing) };
        assert_eq!(chunk.as_slice(), &[9, 8, 7]);
        assert!(chunk.is_external());
        assert!(chunk.take_buffer().is_err());
    }

    #[test]
    fn append_promotes_external_to_owned() {
        let backing = vec![1u8, 2];
        let mut chunk = DataChunk::new();
        unsafe { chunk.set_external(&backing) };
        chunk.append(&[3, 4]);
        assert!(!chunk.is_external());
        assert_eq!(chunk.as_slice(), &[1, 2, 3, 4]);
    }
}
