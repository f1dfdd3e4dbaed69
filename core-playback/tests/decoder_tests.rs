//! Real Symphonia decoding driven through the player.
#![cfg(feature = "core-decoder")]

mod common;

use common::*;
use core_playback::{
    AudioCodec, EngineConfig, ErrorCode, FeedOutcome, PlaybackError, Player, StopReason,
};

/// MPEG-1 Layer III, 128 kbps, 44.1 kHz mono, all-zero side info.
#[cfg(feature = "decoder-mp3")]
fn silent_mp3_frame() -> Vec<u8> {
    let mut frame = vec![0xFF, 0xFB, 0x90, 0xC4];
    frame.resize(417, 0);
    frame
}

/// Raw AAC-LC block: one empty mono channel element, then END.
const SILENT_AAC_MONO: [u8; 4] = [0x00, 0xC8, 0x00, 0x07];

/// ADTS header for an AAC-LC, 44.1 kHz, mono frame of `frame_len` bytes.
#[cfg(feature = "decoder-aac")]
fn adts_header(frame_len: usize) -> [u8; 7] {
    let len = frame_len as u16;
    [
        0xFF,
        0xF1,
        (1 << 6) | (4 << 2),
        (1 << 6) | ((len >> 11) as u8 & 0x3),
        (len >> 3) as u8,
        (((len & 0x7) as u8) << 5) | 0x1F,
        0xFC,
    ]
}

fn player(host: &Host, codec: AudioCodec) -> Player {
    Player::with_default_codecs(host.core.clone(), EngineConfig::for_codec(codec)).unwrap()
}

/// Frames emitted until the player stops itself.
fn play_out(host: &Host, player: &Player) -> usize {
    let mut frames = 0;
    for _ in 0..10_000 {
        match player.update() {
            Some(FeedOutcome::Emitted { frames: n }) => frames += n,
            Some(_) => {}
            None => break,
        }
        host.line.run_pending();
    }
    frames
}

#[cfg(feature = "decoder-mp3")]
#[test]
fn test_mp3_stream_decodes_every_frame() {
    let host = Host::new();
    let mut data = id3_tag(128, b"TIT2");
    for _ in 0..20 {
        data.extend(silent_mp3_frame());
    }
    host.storage.insert("tone.mp3", data);
    let player = player(&host, AudioCodec::Mp3);

    player.play("tone.mp3").unwrap();
    let params = player.stream_parameters().unwrap();
    assert_eq!(params.channels, 1);
    assert_eq!(params.sample_rate, 44_100);
    assert_eq!(player.bitrate(), 128_000);

    assert_eq!(play_out(&host, &player), 20 * 1152);
    assert_eq!(player.stop_reason(), Some(StopReason::StreamEnded));
    assert_eq!(player.last_error_code(), ErrorCode::None);
    assert!(host.output.channel(0).iter().all(|&s| s == 0));
}

#[cfg(feature = "decoder-mp3")]
#[test]
fn test_mp3_engine_refuses_mp4() {
    let host = Host::new();
    let mp4 = Mp4Builder {
        channels: 1,
        sample_sizes: Some(vec![4; 4]),
        ..Default::default()
    };
    host.storage.insert("a.m4a", mp4.build(&SILENT_AAC_MONO.repeat(4)));
    let player = player(&host, AudioCodec::Mp3);

    assert!(matches!(
        player.play("a.m4a"),
        Err(PlaybackError::FormatUnsupported(_))
    ));
    assert_eq!(player.last_error_code(), ErrorCode::FormatUnsupported);
}

#[cfg(feature = "decoder-aac")]
#[test]
fn test_adts_stream_decodes_every_frame() {
    let host = Host::new();
    let mut data = Vec::new();
    for _ in 0..30 {
        data.extend_from_slice(&adts_header(7 + SILENT_AAC_MONO.len()));
        data.extend_from_slice(&SILENT_AAC_MONO);
    }
    host.storage.insert("tone.aac", data);
    let player = player(&host, AudioCodec::Aac);

    player.play("tone.aac").unwrap();
    assert_eq!(player.stream_parameters().unwrap().channels, 1);

    assert_eq!(play_out(&host, &player), 30 * 1024);
    assert_eq!(player.stop_reason(), Some(StopReason::StreamEnded));
}

#[cfg(feature = "decoder-aac")]
#[test]
fn test_mp4_aac_decodes_access_units_to_payload_end() {
    let host = Host::new();
    let units = 25;
    let mp4 = Mp4Builder {
        channels: 1,
        sample_sizes: Some(vec![SILENT_AAC_MONO.len() as u32; units]),
        trailer: vec![0xEE; 64],
        ..Default::default()
    };
    host.storage
        .insert("tone.m4a", mp4.build(&SILENT_AAC_MONO.repeat(units)));
    let player = player(&host, AudioCodec::Aac);

    player.play("tone.m4a").unwrap();
    assert_eq!(player.length_millis(), 3000);
    assert_eq!(player.stream_parameters().unwrap().channels, 1);

    assert_eq!(play_out(&host, &player), units * 1024);
    assert_eq!(player.stop_reason(), Some(StopReason::StreamEnded));
    assert_eq!(player.last_error_code(), ErrorCode::None);
}

#[cfg(feature = "decoder-aac")]
#[test]
fn test_mp4_without_size_table_is_unsupported() {
    let host = Host::new();
    let mp4 = Mp4Builder {
        channels: 1,
        ..Default::default()
    };
    host.storage
        .insert("bare.m4a", mp4.build(&SILENT_AAC_MONO.repeat(8)));
    let player = player(&host, AudioCodec::Aac);

    match player.play("bare.m4a") {
        Err(PlaybackError::FormatUnsupported(msg)) => assert!(msg.contains("access unit")),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!player.is_playing());
}
