//! Storage devices backed by the host filesystem or by memory

use bridge_traits::{
    error::{BridgeError, Result},
    storage::{StorageDevice, StorageFile},
};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use tracing::debug;

/// Storage device rooted at a host directory
///
/// Names are resolved relative to the root; a leading `/` is ignored so that
/// card-style absolute names (`/music/track.mp3`) work unchanged.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

impl StorageDevice for FsStorage {
    fn open(&self, name: &str) -> Result<Box<dyn StorageFile>> {
        let path = self.resolve(name);
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::NotFound(name.to_string())
            } else {
                BridgeError::Io(e)
            }
        })?;
        let size = file.metadata()?.len();
        debug!(path = ?path, size, "Opened file");

        Ok(Box::new(FsFile {
            file,
            position: 0,
            size,
        }))
    }
}

struct FsFile {
    file: File,
    position: u64,
    size: u64,
}

impl StorageFile for FsFile {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        let n = self.file.read(dst)?;
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        if offset > self.size {
            return Err(BridgeError::SeekOutOfRange {
                offset,
                size: self.size,
            });
        }
        self.position = self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// In-memory storage device
///
/// Holds whole streams as [`Bytes`]; opening a stream shares the buffer
/// instead of copying it.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a stream.
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Bytes>) {
        self.files.write().insert(name.into(), data.into());
    }

    pub fn remove(&self, name: &str) -> Option<Bytes> {
        self.files.write().remove(name)
    }
}

impl StorageDevice for MemoryStorage {
    fn open(&self, name: &str) -> Result<Box<dyn StorageFile>> {
        let data = self
            .files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(name.to_string()))?;

        Ok(Box::new(MemoryFile { data, position: 0 }))
    }
}

struct MemoryFile {
    data: Bytes,
    position: usize,
}

impl StorageFile for MemoryFile {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        let available = &self.data[self.position.min(self.data.len())..];
        let n = available.len().min(dst.len());
        dst[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        let size = self.data.len() as u64;
        if offset > size {
            return Err(BridgeError::SeekOutOfRange { offset, size });
        }
        self.position = offset as usize;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
