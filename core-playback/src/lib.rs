//! # Streaming Decode Engine
//!
//! Plays MP3 and AAC files from a block storage device into a fixed-rate
//! output transport, decoding one frame at a time into a double buffer.
//!
//! ## Overview
//!
//! This crate handles:
//! - Container probing (ID3v2 tag skip, MP4 atom walk)
//! - Frame synchronisation and decoding behind a codec-capability interface
//! - A two-phase decode scheduler driven by a software interrupt
//! - A periodic feeder that drains decoded samples into the output
//! - Transport lifecycle, position/length/bitrate reporting and load telemetry
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐  refill   ┌────────────┐  decode   ┌───────────────┐
//! │ StorageFile  │──────────▶│ RawWindow  │──────────▶│ DoubleBuffer  │
//! └──────────────┘           └────────────┘           │  slot 0 | 1   │
//!        DecodeScheduler (low-priority IRQ, one phase) └───────┬───────┘
//!                                                              │ 128 frames
//!                                            Feeder (periodic) ▼
//!                                                    ┌─────────────────┐
//!                                                    │ OutputTransport │
//!                                                    └─────────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - `decoder-mp3` / `decoder-aac` (default via `decoder-all`): Symphonia
//!   codec adapters
//! - `desktop-shims` (default): host bridge implementations as `CoreConfig`
//!   defaults

pub mod buffers;
pub mod config;
pub mod decoder;
pub mod error;
pub mod feeder;
pub mod player;
pub mod probe;
pub mod scheduler;
pub mod stats;
pub mod traits;
pub mod window;

pub use buffers::{BufferSnapshot, DoubleBuffer};
pub use config::{EngineConfig, TransportState};
pub use error::{ErrorCode, PlaybackError, Result, StopReason};
pub use feeder::FeedOutcome;
pub use player::Player;
pub use probe::{ContainerInfo, PayloadBounds, ProbeOutcome};
pub use scheduler::{DecodePhase, PhaseOutcome};
pub use stats::{LoadMonitor, LoadStats};
pub use traits::{
    AccessUnitSizes, AudioCodec, CodecCapabilities, CodecProvider, DecodeStatus, FrameCodec,
    FrameInfo, StreamKind, StreamParameters,
};

#[cfg(feature = "core-decoder")]
pub use decoder::{SymphoniaCodec, SymphoniaCodecProvider};
