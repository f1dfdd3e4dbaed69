//! Block Storage Abstractions
//!
//! Provides the read/seek/size primitives the decode engine needs from the
//! medium holding compressed audio (an SD card on embedded targets, a
//! directory or memory image on the desktop).

use crate::error::Result;

/// Storage device trait
///
/// Opens compressed streams by name. Implementations decide how names map to
/// the underlying medium (a FAT path, a file under a root directory, a key in
/// an in-memory table).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StorageDevice;
///
/// fn file_len(device: &dyn StorageDevice, name: &str) -> Result<u64> {
///     let file = device.open(name)?;
///     Ok(file.size())
/// }
/// ```
pub trait StorageDevice: Send + Sync {
    /// Open a stream for reading, positioned at offset 0.
    ///
    /// Returns [`BridgeError::NotFound`](crate::BridgeError::NotFound) when the
    /// name does not exist.
    fn open(&self, name: &str) -> Result<Box<dyn StorageFile>>;
}

/// An open stream on a [`StorageDevice`].
///
/// The handle is closed when dropped.
pub trait StorageFile: Send {
    /// Read at most `dst.len()` bytes at the current position.
    ///
    /// Performs a single bounded read; returns 0 at end of file.
    fn read(&mut self, dst: &mut [u8]) -> Result<usize>;

    /// Seek to an absolute byte offset.
    ///
    /// Seeking to exactly `size()` is allowed; seeking past it fails with
    /// [`BridgeError::SeekOutOfRange`](crate::BridgeError::SeekOutOfRange).
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Current read position in bytes.
    fn position(&self) -> u64;

    /// Total size of the stream in bytes.
    fn size(&self) -> u64;

    /// Read exactly `dst.len()` bytes, looping over short reads.
    fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < dst.len() {
            let n = self.read(&mut dst[filled..])?;
            if n == 0 {
                return Err(crate::BridgeError::OperationFailed(format!(
                    "unexpected end of stream at {} (wanted {} more bytes)",
                    self.position(),
                    dst.len() - filled
                )));
            }
            filled += n;
        }
        Ok(())
    }
}
