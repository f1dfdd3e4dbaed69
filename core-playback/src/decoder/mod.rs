//! # Codec Adapters
//!
//! Frame-at-a-time decoders behind the [`FrameCodec`](crate::traits::FrameCodec)
//! interface.
//!
//! ## Supported Formats
//!
//! | Format | Framing | Feature Flag | Container-framed input |
//! |--------|---------|--------------|------------------------|
//! | MP3 | MPEG-1/2/2.5 Layer III | `decoder-mp3` | no |
//! | AAC-LC | ADTS | `decoder-aac` | yes, sized by the `stsz` table |
//!
//! Header parsing and sync search live in [`frame_header`] and are always
//! available, so hosts that bring their own decoder can reuse them.
//!
//! ```text
//! raw window ──find_sync──▶ frame bytes ──Packet──▶ symphonia Decoder ──▶ i16 interleaved
//! ```

pub mod frame_header;

#[cfg(feature = "core-decoder")]
mod symphonia;

#[cfg(feature = "core-decoder")]
pub use self::symphonia::{SymphoniaCodec, SymphoniaCodecProvider};

/// Codec error: the decoder does not support this stream.
pub const CODEC_ERR_UNSUPPORTED: i32 = -2;

/// Codec error: a decoder resource limit was exceeded.
pub const CODEC_ERR_LIMIT: i32 = -3;

/// Codec error: anything else the decoder reports as unrecoverable.
pub const CODEC_ERR_INTERNAL: i32 = -1;
