//! # Engine Configuration
//!
//! Sizing and timing parameters for the streaming decode engine, and the
//! transport lifecycle state.

use crate::traits::AudioCodec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Decode engine configuration.
///
/// The defaults describe an MP3 stream feeding a 44.1 kHz stereo output.
/// Use [`EngineConfig::for_codec`] to get the preset for another format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Format of the streams this player decodes.
    ///
    /// Default: MP3.
    #[serde(default)]
    pub codec: AudioCodec,

    /// Size of the compressed input window in bytes.
    ///
    /// Must hold at least one complete frame. Default: 2048 (MP3), 3072 (AAC).
    #[serde(default = "default_raw_buffer_bytes")]
    pub raw_buffer_bytes: usize,

    /// Fixed sample rate of the output transport. Streams at any other rate
    /// are rejected after priming.
    ///
    /// Default: 44100 Hz.
    #[serde(default = "default_output_sample_rate")]
    pub output_sample_rate: u32,

    /// Highest accepted channel count.
    ///
    /// Default: 2.
    #[serde(default = "default_max_channels")]
    pub max_channels: u16,

    /// Device-friendly boundary the metadata tag skip seeks to.
    ///
    /// Must be a power of two. Default: 512 (one SD sector).
    #[serde(default = "default_tag_seek_alignment")]
    pub tag_seek_alignment: u64,

    /// Full scheduler cycles run synchronously in `play()` before output
    /// starts.
    ///
    /// Default: 2.
    #[serde(default = "default_priming_cycles")]
    pub priming_cycles: u32,

    /// Priority of the decode scheduler's software interrupt (lower value is
    /// more urgent).
    ///
    /// Default: 208.
    #[serde(default = "default_decode_interrupt_priority")]
    pub decode_interrupt_priority: u8,

    /// Interval that load percentages are measured against: the time one
    /// scheduler phase may take before the output falls behind.
    ///
    /// Default: 26 ms (one MP3 frame at 44.1 kHz).
    #[serde(default = "default_load_reference_interval")]
    pub load_reference_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            codec: AudioCodec::default(),
            raw_buffer_bytes: default_raw_buffer_bytes(),
            output_sample_rate: default_output_sample_rate(),
            max_channels: default_max_channels(),
            tag_seek_alignment: default_tag_seek_alignment(),
            priming_cycles: default_priming_cycles(),
            decode_interrupt_priority: default_decode_interrupt_priority(),
            load_reference_interval: default_load_reference_interval(),
        }
    }
}

impl EngineConfig {
    /// Preset for a codec.
    ///
    /// AAC frames in an MP4 container can straddle a 2 KiB window, so AAC
    /// gets a larger raw buffer.
    pub fn for_codec(codec: AudioCodec) -> Self {
        match codec {
            AudioCodec::Mp3 => Self::default(),
            AudioCodec::Aac => Self {
                codec,
                raw_buffer_bytes: 3072,
                ..Default::default()
            },
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.raw_buffer_bytes < 512 {
            return Err("raw_buffer_bytes must be >= 512".to_string());
        }

        if self.output_sample_rate == 0 {
            return Err("output_sample_rate must be > 0".to_string());
        }

        if !(1..=2).contains(&self.max_channels) {
            return Err("max_channels must be 1 or 2".to_string());
        }

        if !self.tag_seek_alignment.is_power_of_two() {
            return Err("tag_seek_alignment must be a power of two".to_string());
        }

        if self.tag_seek_alignment > self.raw_buffer_bytes as u64 {
            return Err("tag_seek_alignment cannot exceed raw_buffer_bytes".to_string());
        }

        if self.priming_cycles == 0 {
            return Err("priming_cycles must be > 0".to_string());
        }

        if self.load_reference_interval.is_zero() {
            return Err("load_reference_interval must be > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_raw_buffer_bytes() -> usize {
    2048
}

fn default_output_sample_rate() -> u32 {
    44100
}

fn default_max_channels() -> u16 {
    2
}

fn default_tag_seek_alignment() -> u64 {
    512
}

fn default_priming_cycles() -> u32 {
    2
}

fn default_decode_interrupt_priority() -> u8 {
    208
}

fn default_load_reference_interval() -> Duration {
    Duration::from_millis(26)
}

// ============================================================================
// Transport State
// ============================================================================

/// Lifecycle state of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransportState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl TransportState {
    /// Returns `true` while a session exists (playing or paused).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Playing,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}
