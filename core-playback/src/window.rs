//! # Raw Window
//!
//! Fixed-capacity byte window of compressed input, owned by the decode
//! scheduler. Unconsumed bytes are compacted to the front before each refill
//! so the codec always sees one contiguous run.

use crate::error::{PlaybackError, Result};
use bridge_traits::StorageFile;
use tracing::{trace, warn};

pub struct RawWindow {
    buf: Box<[u8]>,
    cursor: usize,
    remaining: usize,
    exhausted: bool,
}

impl RawWindow {
    /// Allocate a window of `capacity` bytes, reporting allocation failure
    /// instead of aborting.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity).map_err(|_| {
            PlaybackError::OutOfMemory(format!("raw window of {} bytes", capacity))
        })?;
        buf.resize(capacity, 0);

        Ok(Self {
            buf: buf.into_boxed_slice(),
            cursor: 0,
            remaining: 0,
            exhausted: false,
        })
    }

    /// Unconsumed bytes, starting at the cursor.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[self.cursor..self.cursor + self.remaining]
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn is_full(&self) -> bool {
        self.remaining == self.buf.len()
    }

    /// Whether storage has reported end of data (or failed).
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Drop `n` bytes from the front of the window.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.remaining);
        self.cursor += n;
        self.remaining -= n;
    }

    /// Byte offset in the source of the first unconsumed byte, given the
    /// source's current read position.
    pub fn stream_offset(&self, source_position: u64) -> u64 {
        source_position.saturating_sub(self.remaining as u64)
    }

    /// Compact unconsumed bytes to the front and top the window up with one
    /// bounded read.
    ///
    /// `limit` is an absolute source offset the window never reads past.
    /// Returns the new number of unconsumed bytes; 0 means the stream is
    /// exhausted. Read failures count as exhaustion.
    pub fn refill(&mut self, source: &mut dyn StorageFile, limit: Option<u64>) -> usize {
        if self.cursor > 0 {
            self.buf
                .copy_within(self.cursor..self.cursor + self.remaining, 0);
            self.cursor = 0;
        }

        let mut free = self.buf.len() - self.remaining;
        if let Some(limit) = limit {
            let allowed = limit.saturating_sub(source.position());
            if allowed == 0 {
                self.exhausted = true;
            }
            free = free.min(usize::try_from(allowed).unwrap_or(usize::MAX));
        }

        if free > 0 && !self.exhausted {
            let start = self.remaining;
            match source.read(&mut self.buf[start..start + free]) {
                Ok(0) => self.exhausted = true,
                Ok(n) => {
                    trace!(read = n, remaining = self.remaining + n, "Refilled raw window");
                    self.remaining += n;
                }
                Err(e) => {
                    warn!(error = %e, position = source.position(), "Storage read failed");
                    self.exhausted = true;
                }
            }
        }

        self.remaining
    }
}

impl std::fmt::Debug for RawWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawWindow")
            .field("capacity", &self.buf.len())
            .field("cursor", &self.cursor)
            .field("remaining", &self.remaining)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::MemoryStorage;
    use bridge_traits::StorageDevice;

    fn source(len: usize) -> Box<dyn StorageFile> {
        let storage = MemoryStorage::new();
        storage.insert("s", (0..len).map(|i| i as u8).collect::<Vec<u8>>());
        storage.open("s").unwrap()
    }

    #[test]
    fn test_refill_compacts_unconsumed_bytes() {
        let mut src = source(20);
        let mut window = RawWindow::with_capacity(8).unwrap();

        assert_eq!(window.refill(src.as_mut(), None), 8);
        assert!(window.is_full());
        window.consume(5);
        assert_eq!(window.bytes(), &[5, 6, 7]);

        assert_eq!(window.refill(src.as_mut(), None), 8);
        assert_eq!(window.bytes(), &[5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(window.stream_offset(src.position()), 5);
    }

    #[test]
    fn test_refill_reports_exhaustion() {
        let mut src = source(10);
        let mut window = RawWindow::with_capacity(8).unwrap();

        window.refill(src.as_mut(), None);
        window.consume(8);
        assert_eq!(window.refill(src.as_mut(), None), 2);
        assert!(!window.is_exhausted());

        window.consume(2);
        assert_eq!(window.refill(src.as_mut(), None), 0);
        assert!(window.is_exhausted());
    }

    #[test]
    fn test_refill_respects_limit() {
        let mut src = source(64);
        let mut window = RawWindow::with_capacity(16).unwrap();

        assert_eq!(window.refill(src.as_mut(), Some(10)), 10);
        assert_eq!(src.position(), 10);
        window.consume(4);
        assert_eq!(window.refill(src.as_mut(), Some(10)), 6);
        assert!(window.is_exhausted());
    }

    #[test]
    fn test_consume_is_clamped() {
        let mut src = source(4);
        let mut window = RawWindow::with_capacity(8).unwrap();
        window.refill(src.as_mut(), None);
        window.consume(100);
        assert_eq!(window.remaining(), 0);
        assert!(window.bytes().is_empty());
    }

    #[test]
    fn test_huge_allocation_is_out_of_memory() {
        let result = RawWindow::with_capacity(usize::MAX);
        assert!(matches!(result, Err(PlaybackError::OutOfMemory(_))));
    }
}
