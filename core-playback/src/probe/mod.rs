//! # Container Probe
//!
//! One-shot inspection of a freshly opened stream, run by `play()` before
//! any decoding:
//!
//! 1. If the stream starts with an `ftyp` box it is container-framed: the
//!    atom walk ([`mp4`]) yields codec parameters, duration and payload
//!    bounds, and decoding starts at the first chunk.
//! 2. Otherwise it is self-describing. A leading ID3v2 tag ([`id3`]) is
//!    skipped and its length recorded for duration estimates.

pub mod id3;
pub mod mp4;

use crate::error::{PlaybackError, Result};
use crate::traits::StreamKind;
use bridge_traits::StorageFile;
use tracing::debug;

pub use mp4::{ContainerInfo, PayloadBounds};

/// Where and how decoding starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub kind: StreamKind,
    /// First byte of audio payload.
    pub payload_offset: u64,
    /// Device-friendly offset at or below `payload_offset` to seek storage to.
    pub seek_offset: u64,
    /// Length of the skipped metadata tag (0 if none).
    pub tag_bytes: u64,
    /// Present for container-framed streams.
    pub container: Option<ContainerInfo>,
}

impl ProbeOutcome {
    /// Bytes between the seek offset and the payload, to be discarded from
    /// the first window.
    pub fn lead_in(&self) -> usize {
        (self.payload_offset - self.seek_offset) as usize
    }

    /// Absolute offset the raw window must not read past.
    pub fn read_limit(&self) -> Option<u64> {
        self.container.as_ref().map(|c| c.bounds.end_offset)
    }
}

/// Probe `file`, leaving its position unspecified.
///
/// `alignment` must be a power of two.
pub fn probe(file: &mut dyn StorageFile, alignment: u64) -> Result<ProbeOutcome> {
    if mp4::is_container(file) {
        let info = mp4::walk(file)?;
        let start = info.bounds.first_chunk_offset;
        return Ok(ProbeOutcome {
            kind: StreamKind::ContainerFramed,
            payload_offset: start,
            seek_offset: start,
            tag_bytes: 0,
            container: Some(info),
        });
    }

    let mut header = [0u8; id3::HEADER_LEN];
    let tag_bytes = match file.seek(0).and_then(|_| file.read_exact(&mut header)) {
        Ok(()) => id3::tag_len(&header).unwrap_or(0),
        // Shorter than a tag header: let the first refill decide.
        Err(_) => 0,
    };

    if tag_bytes > file.size() {
        return Err(PlaybackError::FormatUnsupported(format!(
            "ID3 tag of {} bytes in a {} byte file",
            tag_bytes,
            file.size()
        )));
    }

    let seek_offset = tag_bytes & !(alignment - 1);
    if tag_bytes > 0 {
        debug!(tag_bytes, seek_offset, "Skipping ID3v2 tag");
    }

    Ok(ProbeOutcome {
        kind: StreamKind::SelfDescribing,
        payload_offset: tag_bytes,
        seek_offset,
        tag_bytes,
        container: None,
    })
}
