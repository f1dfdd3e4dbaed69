//! # Codec Capability Interface
//!
//! The decode engine is written once for both supported formats. Everything
//! format-specific sits behind [`FrameCodec`]: whether the stream carries its
//! own frame headers (and so needs sync search), whether it can be fed raw
//! access units located by a container, and how a frame is decoded.
//!
//! ## Contract
//!
//! - [`FrameCodec::decode`] is handed the unconsumed bytes of the raw window
//!   and a slice of the filling sample buffer. It decodes at most one frame
//!   and reports how many input bytes it consumed.
//! - A codec owns no buffers across calls beyond its own bitstream state
//!   (bit reservoir, filter history).
//! - Negative codes in [`DecodeStatus::Failed`] are codec-defined and are
//!   surfaced unchanged through `ErrorCode::DecodeHard`.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Stream Description
// ============================================================================

/// Compressed formats the engine can stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// MPEG-1/2/2.5 Audio Layer III
    #[default]
    Mp3,
    /// Advanced Audio Coding, ADTS-framed or in an MP4 container
    Aac,
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioCodec::Mp3 => write!(f, "mp3"),
            AudioCodec::Aac => write!(f, "aac"),
        }
    }
}

/// How frame boundaries are found in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Every frame starts with a sync word and header; the engine runs sync
    /// search before each decode.
    SelfDescribing,
    /// Raw access units packed by a container; parameters come from the
    /// container and the codec's consumption count advances the window.
    ContainerFramed,
}

/// Which stream kinds a codec instance can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecCapabilities {
    pub self_describing: bool,
    pub container_framed: bool,
}

impl CodecCapabilities {
    pub fn supports(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::SelfDescribing => self.self_describing,
            StreamKind::ContainerFramed => self.container_framed,
        }
    }
}

/// MPEG-4 audio object type for AAC Low Complexity.
pub const AAC_PROFILE_LC: u8 = 2;

/// Parameters describing a stream.
///
/// Filled from the container for container-framed streams, or from the first
/// decoded frame for self-describing streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamParameters {
    pub channels: u16,
    pub sample_rate: u32,
    /// Bits per second; 0 when unknown.
    pub bitrate: u32,
    /// Format-specific profile (MPEG-4 audio object type for AAC).
    pub profile: u8,
    /// The fixed rate the output transport runs at.
    pub output_sample_rate: u32,
}

/// Byte sizes of a container's access units, in decode order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessUnitSizes {
    /// The container carries no sample-size table.
    #[default]
    Unknown,
    /// Every access unit has the same size.
    Uniform { size: u32, count: u32 },
    Table(Arc<[u32]>),
}

impl AccessUnitSizes {
    pub fn len(&self) -> usize {
        match self {
            AccessUnitSizes::Unknown => 0,
            AccessUnitSizes::Uniform { count, .. } => *count as usize,
            AccessUnitSizes::Table(sizes) => sizes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of access unit `index`, if the table reaches that far.
    pub fn get(&self, index: usize) -> Option<u32> {
        match self {
            AccessUnitSizes::Unknown => None,
            AccessUnitSizes::Uniform { size, count } => {
                (index < *count as usize).then_some(*size)
            }
            AccessUnitSizes::Table(sizes) => sizes.get(index).copied(),
        }
    }

    /// Sum of all sizes; `None` when unknown.
    pub fn total_bytes(&self) -> Option<u64> {
        match self {
            AccessUnitSizes::Unknown => None,
            AccessUnitSizes::Uniform { size, count } => Some(u64::from(*size) * u64::from(*count)),
            AccessUnitSizes::Table(sizes) => Some(sizes.iter().map(|&s| u64::from(s)).sum()),
        }
    }
}

/// Metadata reported for the most recently decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bits per second.
    pub bitrate: u32,
    pub bits_per_sample: u16,
    /// Interleaved samples produced by the frame (frames x channels).
    pub output_samples: usize,
}

impl FrameInfo {
    pub fn as_parameters(&self, profile: u8, output_sample_rate: u32) -> StreamParameters {
        StreamParameters {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bitrate: self.bitrate,
            profile,
            output_sample_rate,
        }
    }
}

// ============================================================================
// Codec Interface
// ============================================================================

/// Outcome of one [`FrameCodec::decode`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// One frame decoded: `samples` interleaved samples written to the output.
    Frame { consumed: usize, samples: usize },
    /// Soft error: the frame could not be completed from the bytes available.
    /// `consumed` bytes (possibly 0) may still be dropped from the window.
    NeedMoreData { consumed: usize },
    /// Hard error: unrecoverable bitstream fault.
    Failed(i32),
}

/// A frame-at-a-time audio decoder.
pub trait FrameCodec: Send {
    fn codec(&self) -> AudioCodec;

    fn capabilities(&self) -> CodecCapabilities;

    /// Worst-case interleaved samples one frame can produce.
    ///
    /// Sample buffers are sized from this value.
    fn max_samples_per_frame(&self) -> usize;

    /// Offset of the next valid frame header in `window`, if any.
    ///
    /// A header is only reported when enough of it lies inside the window to
    /// be validated.
    fn find_sync(&self, window: &[u8]) -> Option<usize>;

    /// Decode at most one frame from the start of `input` into `output`.
    fn decode(&mut self, input: &[u8], output: &mut [i16]) -> DecodeStatus;

    /// Metadata of the last successfully decoded frame.
    fn last_frame_info(&self) -> Option<FrameInfo>;

    /// Force parameters that are not present in-stream (container-framed
    /// streams).
    fn set_params(&mut self, params: &StreamParameters) -> Result<()>;

    /// Access unit sizes read from the container, handed over after
    /// `set_params`. Codecs that find unit boundaries themselves ignore them.
    fn set_access_units(&mut self, _sizes: &AccessUnitSizes) -> Result<()> {
        Ok(())
    }
}

/// Creates codec instances for a stream.
///
/// A failed `create` is reported to `play()` callers as an allocation
/// failure.
pub trait CodecProvider: Send + Sync {
    fn create(&self, codec: AudioCodec) -> Result<Box<dyn FrameCodec>>;
}
