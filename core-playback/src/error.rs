//! # Playback Error Types
//!
//! Error types for the streaming decode engine, plus the compact codes the
//! transport records for callers to query after playback halts.

use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while setting up or running a stream.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Setup Errors (returned from `play()`)
    // ========================================================================
    /// A buffer or codec instance could not be allocated.
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// The source could not be opened or yielded no initial data.
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// The stream is structurally invalid or its parameters do not match the
    /// output (sample rate, channel count, sample width).
    #[error("Unsupported format: {0}")]
    FormatUnsupported(String),

    /// Engine configuration values are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Streaming Conditions
    // ========================================================================
    /// The codec needs more input to complete a frame.
    #[error("Decoder needs more data")]
    DecodeSoft,

    /// The codec reported an unrecoverable bitstream error.
    #[error("Decode error (code {0})")]
    DecodeHard(i32),

    /// No more frames: sync lost, payload bound crossed, or source exhausted.
    #[error("End of stream")]
    StreamEnded,

    /// The output deadline arrived with no decoded samples available.
    #[error("Output starved: decoder did not keep up with the output rate")]
    Starvation,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// A platform bridge failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Runtime wiring failed.
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this condition ends the stream.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PlaybackError::DecodeSoft)
    }

    /// Returns `true` if this error is related to the stream's format.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::FormatUnsupported(_) | PlaybackError::DecodeHard(_)
        )
    }

    /// The code recorded for callers when this error stops playback.
    pub fn code(&self) -> ErrorCode {
        match self {
            PlaybackError::OutOfMemory(_) => ErrorCode::OutOfMemory,
            PlaybackError::SourceNotFound(_) => ErrorCode::SourceNotFound,
            PlaybackError::FormatUnsupported(_) | PlaybackError::InvalidConfig(_) => {
                ErrorCode::FormatUnsupported
            }
            PlaybackError::DecodeHard(code) => ErrorCode::DecodeHard(*code),
            PlaybackError::Starvation => ErrorCode::Starvation,
            PlaybackError::Bridge(e) if e.is_not_found() => ErrorCode::SourceNotFound,
            PlaybackError::DecodeSoft | PlaybackError::StreamEnded => ErrorCode::None,
            PlaybackError::Bridge(_) | PlaybackError::Runtime(_) | PlaybackError::Internal(_) => {
                ErrorCode::Internal
            }
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Last error recorded by the transport.
///
/// Stays queryable until the next `play()` overwrites it. A stream that ends
/// normally records [`ErrorCode::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorCode {
    #[default]
    None,
    OutOfMemory,
    SourceNotFound,
    FormatUnsupported,
    DecodeHard(i32),
    Starvation,
    Internal,
}

impl ErrorCode {
    pub fn is_error(&self) -> bool {
        *self != ErrorCode::None
    }
}

/// Why the last session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// `stop()` or a new `play()` call.
    Requested,
    /// The stream ran out of frames and the decoded tail was played.
    StreamEnded,
    /// The codec reported a hard error.
    DecodeError(i32),
    /// The feeder found no data at its deadline.
    Starvation,
}
