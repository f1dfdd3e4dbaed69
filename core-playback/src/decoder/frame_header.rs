//! # Frame Header Parsing
//!
//! Bit-level parsing of MPEG-1/2/2.5 Layer III and ADTS (AAC) frame headers,
//! plus the sync search used to find the next decodable frame in a window.
//!
//! A candidate header is only accepted when it decodes to a legal frame. If
//! the following frame header also lies inside the window it must agree on
//! sample rate, which rejects most false syncs in audio payload.

// ============================================================================
// MPEG Audio (Layer III)
// ============================================================================

pub const MPEG_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

const MPEG1_L3_KBPS: [u32; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const MPEG2_L3_KBPS: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpegHeader {
    pub version: MpegVersion,
    /// Bits per second.
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub padding: bool,
    /// Whole frame in bytes, header included.
    pub frame_len: usize,
    /// PCM frames (samples per channel) the frame decodes to.
    pub samples_per_frame: usize,
}

impl MpegHeader {
    /// Parse a Layer III header from the first four bytes of `bytes`.
    ///
    /// Free-format bitrates are rejected: their frame length cannot be known
    /// from the header.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MPEG_HEADER_LEN {
            return None;
        }
        let h = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if h >> 21 != 0x7FF {
            return None;
        }

        let version = match (h >> 19) & 0x3 {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return None,
        };
        // Layer III only.
        if (h >> 17) & 0x3 != 1 {
            return None;
        }

        let bitrate_index = ((h >> 12) & 0xF) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let rate_index = ((h >> 10) & 0x3) as usize;
        if rate_index == 3 {
            return None;
        }

        let (kbps, base_rate, samples_per_frame, slot_factor) = match version {
            MpegVersion::Mpeg1 => (MPEG1_L3_KBPS[bitrate_index], [44_100, 48_000, 32_000], 1152, 144),
            MpegVersion::Mpeg2 => (MPEG2_L3_KBPS[bitrate_index], [22_050, 24_000, 16_000], 576, 72),
            MpegVersion::Mpeg25 => (MPEG2_L3_KBPS[bitrate_index], [11_025, 12_000, 8_000], 576, 72),
        };
        let bitrate = kbps * 1000;
        let sample_rate = base_rate[rate_index];
        let padding = (h >> 9) & 0x1 == 1;
        let channels = if (h >> 6) & 0x3 == 3 { 1 } else { 2 };
        let frame_len = (slot_factor * bitrate / sample_rate) as usize + padding as usize;

        Some(Self {
            version,
            bitrate,
            sample_rate,
            channels,
            padding,
            frame_len,
            samples_per_frame,
        })
    }
}

/// Offset of the first Layer III frame header in `window`.
pub fn find_mpeg_sync(window: &[u8]) -> Option<usize> {
    let last = window.len().checked_sub(MPEG_HEADER_LEN)?;
    (0..=last).find(|&i| {
        MpegHeader::parse(&window[i..]).is_some_and(|header| {
            confirmed(window, i + header.frame_len, MPEG_HEADER_LEN, |next| {
                MpegHeader::parse(next).is_some_and(|n| n.sample_rate == header.sample_rate)
            })
        })
    })
}

// ============================================================================
// ADTS (AAC)
// ============================================================================

pub const ADTS_HEADER_LEN: usize = 7;

const ADTS_SAMPLE_RATES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025,
    8_000, 7_350,
];

/// PCM frames per raw AAC block.
pub const AAC_FRAME_SAMPLES: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// MPEG-4 audio object type (2 = LC).
    pub object_type: u8,
    pub sample_rate_index: u8,
    pub sample_rate: u32,
    pub channel_config: u8,
    /// Whole frame in bytes, header included.
    pub frame_len: usize,
    /// 7, or 9 when a CRC follows the fixed header.
    pub header_len: usize,
    pub raw_blocks: u8,
}

impl AdtsHeader {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ADTS_HEADER_LEN {
            return None;
        }
        if bytes[0] != 0xFF || bytes[1] & 0xF6 != 0xF0 {
            return None;
        }

        let protection_absent = bytes[1] & 0x01 == 1;
        let object_type = (bytes[2] >> 6) + 1;
        let sample_rate_index = (bytes[2] >> 2) & 0x0F;
        let sample_rate = *ADTS_SAMPLE_RATES.get(sample_rate_index as usize)?;
        let channel_config = ((bytes[2] & 0x01) << 2) | (bytes[3] >> 6);
        if channel_config == 0 {
            return None;
        }
        let frame_len = (((bytes[3] & 0x03) as usize) << 11)
            | ((bytes[4] as usize) << 3)
            | ((bytes[5] >> 5) as usize);
        let header_len = if protection_absent { 7 } else { 9 };
        if frame_len <= header_len {
            return None;
        }

        Some(Self {
            object_type,
            sample_rate_index,
            sample_rate,
            channel_config,
            frame_len,
            header_len,
            raw_blocks: (bytes[6] & 0x03) + 1,
        })
    }

    pub fn channels(&self) -> u16 {
        match self.channel_config {
            7 => 8,
            n => n as u16,
        }
    }

    /// Bits per second implied by this frame's size.
    pub fn bitrate(&self) -> u32 {
        let samples = AAC_FRAME_SAMPLES as u64 * self.raw_blocks as u64;
        (self.frame_len as u64 * 8 * self.sample_rate as u64 / samples) as u32
    }

    /// Two-byte AudioSpecificConfig equivalent to this header.
    pub fn audio_specific_config(&self) -> [u8; 2] {
        audio_specific_config(self.object_type, self.sample_rate_index, self.channel_config)
    }
}

/// Index of `rate` in the MPEG-4 sampling frequency table.
pub fn sample_rate_index(rate: u32) -> Option<u8> {
    ADTS_SAMPLE_RATES
        .iter()
        .position(|r| *r == rate)
        .map(|i| i as u8)
}

pub fn audio_specific_config(object_type: u8, rate_index: u8, channel_config: u8) -> [u8; 2] {
    let bits = ((object_type as u16 & 0x1F) << 11)
        | ((rate_index as u16 & 0x0F) << 7)
        | ((channel_config as u16 & 0x0F) << 3);
    bits.to_be_bytes()
}

/// Offset of the first ADTS frame header in `window`.
pub fn find_adts_sync(window: &[u8]) -> Option<usize> {
    let last = window.len().checked_sub(ADTS_HEADER_LEN)?;
    (0..=last).find(|&i| {
        AdtsHeader::parse(&window[i..]).is_some_and(|header| {
            confirmed(window, i + header.frame_len, ADTS_HEADER_LEN, |next| {
                AdtsHeader::parse(next).is_some_and(|n| n.sample_rate == header.sample_rate)
            })
        })
    })
}

/// Check the header expected at `next`, if the window holds all of it.
fn confirmed(window: &[u8], next: usize, header_len: usize, check: impl Fn(&[u8]) -> bool) -> bool {
    if next + header_len > window.len() {
        return true;
    }
    check(&window[next..])
}
