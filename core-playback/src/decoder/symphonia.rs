//! # Symphonia Codec Adapter
//!
//! Drives Symphonia's packet decoders directly with frames cut from the raw
//! window. No Symphonia demuxer is involved: framing comes from
//! [`frame_header`](super::frame_header), or for MP4 streams from the
//! container's access unit sizes.
//!
//! ## Error policy
//!
//! Symphonia's `DecodeError` and `IoError` drop the frame and decoding
//! carries on with the next one; glitches in a long stream should not stop
//! playback. `Unsupported`, `LimitError` and everything else are hard
//! errors with the codes in [`super`].

use super::frame_header::{
    audio_specific_config, find_adts_sync, find_mpeg_sync, sample_rate_index, AdtsHeader,
    MpegHeader, AAC_FRAME_SAMPLES,
};
use super::{CODEC_ERR_INTERNAL, CODEC_ERR_LIMIT, CODEC_ERR_UNSUPPORTED};
use crate::error::{PlaybackError, Result};
use crate::traits::{
    AccessUnitSizes, AudioCodec, CodecCapabilities, CodecProvider, DecodeStatus, FrameCodec,
    FrameInfo, StreamParameters,
};
use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_AAC, CODEC_TYPE_MP3};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::{debug, info, warn};

const MP3_MAX_FRAME_SAMPLES: usize = 1152;

/// Symphonia-backed [`FrameCodec`].
///
/// MP3 frames are handed over whole, header included. ADTS headers are
/// stripped and the decoder is (re)configured from the header's
/// AudioSpecificConfig whenever it changes. Raw MP4 access units are cut
/// from the window one table entry at a time.
pub struct SymphoniaCodec {
    codec: AudioCodec,
    decoder: Option<Box<dyn Decoder>>,
    /// AudioSpecificConfig the current AAC decoder was built with.
    config: Option<[u8; 2]>,
    samples: Option<SampleBuffer<i16>>,
    last: Option<FrameInfo>,
    units: AccessUnitSizes,
    next_unit: usize,
    container_rate: u32,
}

impl SymphoniaCodec {
    pub fn new(codec: AudioCodec) -> Result<Self> {
        let decoder = match codec {
            AudioCodec::Mp3 => {
                let mut params = CodecParameters::new();
                params.for_codec(CODEC_TYPE_MP3);
                Some(make_decoder(&params)?)
            }
            AudioCodec::Aac if cfg!(feature = "decoder-aac") => None,
            AudioCodec::Aac => {
                return Err(PlaybackError::FormatUnsupported(
                    "AAC decoding requires the 'decoder-aac' feature".to_string(),
                ))
            }
        };
        debug!(%codec, "Created Symphonia codec");

        Ok(Self {
            codec,
            decoder,
            config: None,
            samples: None,
            last: None,
            units: AccessUnitSizes::Unknown,
            next_unit: 0,
            container_rate: 0,
        })
    }

    fn configure_aac(&mut self, config: [u8; 2], sample_rate: u32, channels: u16) -> Result<()> {
        if self.config == Some(config) && self.decoder.is_some() {
            return Ok(());
        }

        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_AAC)
            .with_sample_rate(sample_rate)
            .with_channels(channel_layout(channels))
            .with_extra_data(config.to_vec().into_boxed_slice());

        self.decoder = Some(make_decoder(&params)?);
        self.config = Some(config);
        info!(sample_rate, channels, "Configured AAC decoder");
        Ok(())
    }

    fn decode_mp3(&mut self, input: &[u8], output: &mut [i16]) -> DecodeStatus {
        let Some(header) = MpegHeader::parse(input) else {
            return DecodeStatus::NeedMoreData { consumed: 1 };
        };
        if input.len() < header.frame_len {
            return DecodeStatus::NeedMoreData { consumed: 0 };
        }
        self.decode_packet(&input[..header.frame_len], header.frame_len, header.bitrate, output)
    }

    fn decode_adts(&mut self, input: &[u8], output: &mut [i16]) -> DecodeStatus {
        let Some(header) = AdtsHeader::parse(input) else {
            return DecodeStatus::NeedMoreData { consumed: 1 };
        };
        if input.len() < header.frame_len {
            return DecodeStatus::NeedMoreData { consumed: 0 };
        }
        if let Err(e) = self.configure_aac(
            header.audio_specific_config(),
            header.sample_rate,
            header.channels(),
        ) {
            warn!(error = %e, "AAC decoder setup failed");
            return DecodeStatus::Failed(CODEC_ERR_UNSUPPORTED);
        }
        self.decode_packet(
            &input[header.header_len..header.frame_len],
            header.frame_len,
            header.bitrate(),
            output,
        )
    }

    fn decode_access_unit(&mut self, input: &[u8], output: &mut [i16]) -> DecodeStatus {
        let Some(size) = self.units.get(self.next_unit) else {
            // Past the last listed unit: nothing left is audio.
            return DecodeStatus::NeedMoreData {
                consumed: input.len(),
            };
        };
        let size = size as usize;
        if input.len() < size {
            return DecodeStatus::NeedMoreData { consumed: 0 };
        }

        let bitrate =
            (size as u64 * 8 * u64::from(self.container_rate) / AAC_FRAME_SAMPLES as u64) as u32;
        let status = self.decode_packet(&input[..size], size, bitrate, output);
        if !matches!(status, DecodeStatus::Failed(_)) {
            self.next_unit += 1;
        }
        status
    }

    fn decode_packet(
        &mut self,
        data: &[u8],
        consumed: usize,
        bitrate: u32,
        output: &mut [i16],
    ) -> DecodeStatus {
        let Some(decoder) = self.decoder.as_mut() else {
            return DecodeStatus::Failed(CODEC_ERR_UNSUPPORTED);
        };

        let packet = Packet::new_from_slice(0, 0, 0, data);
        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let needed = decoded.capacity() * spec.channels.count();
                if self.samples.as_ref().map_or(true, |b| b.capacity() < needed) {
                    self.samples = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                let Some(buffer) = self.samples.as_mut() else {
                    return DecodeStatus::Failed(CODEC_ERR_INTERNAL);
                };
                buffer.copy_interleaved_ref(decoded);

                let samples = buffer.samples();
                let n = samples.len().min(output.len());
                output[..n].copy_from_slice(&samples[..n]);

                self.last = Some(FrameInfo {
                    sample_rate: spec.rate,
                    channels: spec.channels.count() as u16,
                    bitrate,
                    bits_per_sample: 16,
                    output_samples: n,
                });
                DecodeStatus::Frame {
                    consumed,
                    samples: n,
                }
            }
            Err(e) => map_decode_error(e, consumed),
        }
    }
}

/// Soft errors drop `consumed` bytes; the rest stop the stream.
fn map_decode_error(error: SymphoniaError, consumed: usize) -> DecodeStatus {
    match error {
        // Corrupt or reservoir-starved frames; the next one may decode.
        SymphoniaError::DecodeError(reason) => {
            debug!(reason, consumed, "Dropped undecodable frame");
            DecodeStatus::NeedMoreData { consumed }
        }
        SymphoniaError::IoError(e) => {
            debug!(error = %e, consumed, "Dropped truncated frame");
            DecodeStatus::NeedMoreData { consumed }
        }
        SymphoniaError::Unsupported(what) => {
            warn!(what, "Unsupported bitstream feature");
            DecodeStatus::Failed(CODEC_ERR_UNSUPPORTED)
        }
        SymphoniaError::LimitError(what) => {
            warn!(what, "Decoder limit exceeded");
            DecodeStatus::Failed(CODEC_ERR_LIMIT)
        }
        e => {
            warn!(error = %e, "Fatal decode error");
            DecodeStatus::Failed(CODEC_ERR_INTERNAL)
        }
    }
}

impl FrameCodec for SymphoniaCodec {
    fn codec(&self) -> AudioCodec {
        self.codec
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            self_describing: true,
            container_framed: self.codec == AudioCodec::Aac,
        }
    }

    fn max_samples_per_frame(&self) -> usize {
        match self.codec {
            AudioCodec::Mp3 => MP3_MAX_FRAME_SAMPLES * 2,
            // Room for SBR's doubled output.
            AudioCodec::Aac => AAC_FRAME_SAMPLES * 2 * 2,
        }
    }

    fn find_sync(&self, window: &[u8]) -> Option<usize> {
        match self.codec {
            AudioCodec::Mp3 => find_mpeg_sync(window),
            AudioCodec::Aac => find_adts_sync(window),
        }
    }

    fn decode(&mut self, input: &[u8], output: &mut [i16]) -> DecodeStatus {
        match self.codec {
            AudioCodec::Mp3 => self.decode_mp3(input, output),
            AudioCodec::Aac if !self.units.is_empty() => self.decode_access_unit(input, output),
            AudioCodec::Aac => self.decode_adts(input, output),
        }
    }

    fn last_frame_info(&self) -> Option<FrameInfo> {
        self.last
    }

    fn set_params(&mut self, params: &StreamParameters) -> Result<()> {
        match self.codec {
            AudioCodec::Mp3 => Ok(()),
            AudioCodec::Aac => {
                let index = sample_rate_index(params.sample_rate).ok_or_else(|| {
                    PlaybackError::FormatUnsupported(format!(
                        "no AAC sampling index for {} Hz",
                        params.sample_rate
                    ))
                })?;
                let channels = params.channels.min(7) as u8;
                let config = audio_specific_config(params.profile, index, channels);
                self.container_rate = params.sample_rate;
                self.configure_aac(config, params.sample_rate, params.channels)
            }
        }
    }

    fn set_access_units(&mut self, sizes: &AccessUnitSizes) -> Result<()> {
        if self.codec != AudioCodec::Aac {
            return Err(PlaybackError::FormatUnsupported(format!(
                "{} streams are not read from containers",
                self.codec
            )));
        }
        if sizes.is_empty() {
            return Err(PlaybackError::FormatUnsupported(
                "MP4 without access unit sizes".to_string(),
            ));
        }
        self.units = sizes.clone();
        self.next_unit = 0;
        debug!(units = sizes.len(), "Loaded access unit sizes");
        Ok(())
    }
}

impl std::fmt::Debug for SymphoniaCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymphoniaCodec")
            .field("codec", &self.codec)
            .field("configured", &self.decoder.is_some())
            .field("access_units", &self.units.len())
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

/// Hands out [`SymphoniaCodec`]s for every codec compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaCodecProvider;

impl SymphoniaCodecProvider {
    pub fn new() -> Self {
        Self
    }
}

impl CodecProvider for SymphoniaCodecProvider {
    fn create(&self, codec: AudioCodec) -> Result<Box<dyn FrameCodec>> {
        Ok(Box::new(SymphoniaCodec::new(codec)?))
    }
}

fn make_decoder(params: &CodecParameters) -> Result<Box<dyn Decoder>> {
    symphonia::default::get_codecs()
        .make(params, &DecoderOptions::default())
        .map_err(|e| PlaybackError::FormatUnsupported(format!("Failed to create decoder: {}", e)))
}

fn channel_layout(channels: u16) -> Channels {
    match channels {
        1 => Channels::FRONT_CENTRE,
        _ => Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
    }
}
