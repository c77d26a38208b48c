//! Application-replaceable error/warning sink.
//!
//! Format and semantic problems that do not invalidate the surrounding
//! structure (a malformed metadata set that can be skipped, a BER length
//! forced too small for its value) are reported through this trait rather
//! than aborting the calling operation, per the propagation policy described
//! for the metadata and partition layers. I/O errors never go through here —
//! they always short-circuit via `Result`.

/// Receives non-fatal diagnostics from a read or write in progress.
pub trait Diagnostics {
    /// Report a problem, optionally anchored to a byte offset in the file
    /// being read or written.
    fn report(&self, message: &str, offset: Option<u64>);
}

/// Default sink: prints one line per diagnostic to standard error.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrDiagnostics;

impl Diagnostics for StderrDiagnostics {
    fn report(&self, message: &str, offset: Option<u64>) {
        match offset {
            Some(off) => eprintln!("warning: {message} (at offset {off})"),
            None => eprintln!("warning: {message}"),
        }
    }
}

/// Sink that discards everything. Useful for tests that assert on warning
/// counts via [`CollectingDiagnostics`] instead, or for callers that have
/// already decided warnings are noise.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn report(&self, _message: &str, _offset: Option<u64>) {}
}

/// Sink that accumulates diagnostics in memory, for tests and tools that want
/// to inspect what was reported rather than print it.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    entries: std::sync::Mutex<Vec<(String, Option<u64>)>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(String, Option<u64>)> {
        self.entries.lock().unwrap().clone()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, message: &str, offset: Option<u64>) {
        self.entries.lock().unwrap().push((message.to_string(), offset));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_entries() {
        let sink = CollectingDiagnostics::new();
        sink.report("bad thing", Some(42));
        sink.report("other thing", None);
        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("bad thing".to_string(), Some(42)));
    }
}
