//! # Desktop Playback Demo
//!
//! Streams an MP3 or ADTS AAC file through the decode engine using the
//! desktop shims, pacing [`Player::update`] at the output period the way an
//! audio interrupt would. Samples go to a meter instead of a sound card.
//!
//! Run with:
//! ```bash
//! cargo run --example playback_demo --package core-playback -- path/to/song.mp3
//!
//! # JSON logs, AAC engine preset
//! cargo run --example playback_demo --package core-playback -- song.aac aac json
//! ```

use bridge_traits::time::LogLevel;
use bridge_traits::{AudioChunk, OutputTransport, CHUNK_SAMPLES};
use core_playback::{AudioCodec, EngineConfig, Player, TransportState};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::CoreConfig;
use parking_lot::Mutex;
use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

// ============================================================================
// Level Meter Output
// ============================================================================

/// Output transport that tracks the peak level per channel.
#[derive(Default)]
struct MeterOutput {
    peaks: Mutex<[i16; 2]>,
    chunks: AtomicU64,
}

impl MeterOutput {
    fn take_peaks(&self) -> [i16; 2] {
        std::mem::take(&mut *self.peaks.lock())
    }
}

impl OutputTransport for MeterOutput {
    fn acquire_chunk(&self) -> Option<AudioChunk> {
        Some(AudioChunk::new())
    }

    fn transmit(&self, chunk: &AudioChunk, channel: u8) {
        let peak = chunk
            .samples()
            .iter()
            .map(|s| s.saturating_abs())
            .max()
            .unwrap_or(0);
        let mut peaks = self.peaks.lock();
        let slot = &mut peaks[(channel & 1) as usize];
        *slot = (*slot).max(peak);
        self.chunks.fetch_add(1, Ordering::Relaxed);
    }

    fn release_chunk(&self, _chunk: AudioChunk) {}
}

fn meter(peak: i16) -> String {
    let width = (peak as usize * 30) / i16::MAX as usize;
    format!("{:<30}", "#".repeat(width))
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1).map(Path::new) else {
        eprintln!("usage: playback_demo <file> [mp3|aac] [pretty|json|compact]");
        std::process::exit(2);
    };

    let codec = match args.get(2).map(String::as_str) {
        Some("aac") => AudioCodec::Aac,
        _ => AudioCodec::Mp3,
    };
    let format = match args.get(3).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    let logging = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug)
        .with_filter("core_playback=debug,bridge_desktop=info");
    if let Err(e) = init_logging(logging) {
        eprintln!("failed to initialise logging: {}", e);
    }

    if let Err(e) = run(path, codec) {
        error!(error = %e, "Demo failed");
        std::process::exit(1);
    }
}

fn run(path: &Path, codec: AudioCodec) -> Result<(), Box<dyn std::error::Error>> {
    let root = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or("file name is not valid UTF-8")?;

    let output = Arc::new(MeterOutput::default());
    let core = CoreConfig::builder()
        .storage_root(root)
        .output(output.clone())
        .build()?;
    let engine = EngineConfig::for_codec(codec);
    let period = Duration::from_secs_f64(CHUNK_SAMPLES as f64 / engine.output_sample_rate as f64);
    let player = Player::with_default_codecs(core, engine)?;

    player.play(name)?;
    info!(
        length_ms = player.length_millis(),
        bitrate = player.bitrate(),
        params = ?player.stream_parameters(),
        "Streaming"
    );

    let start = Instant::now();
    let mut next = start;
    let mut last_report = start;
    while player.state() != TransportState::Stopped {
        player.update();

        if last_report.elapsed() >= Duration::from_secs(1) {
            let [left, right] = output.take_peaks();
            println!(
                "{:>6} ms  L {}  R {}  {:>3} kbps",
                player.position_millis(),
                meter(left),
                meter(right),
                player.bitrate() / 1000
            );
            last_report = Instant::now();
        }

        next += period;
        if let Some(wait) = next.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
    }

    let stats = player.load_stats();
    info!(
        reason = ?player.stop_reason(),
        error = ?player.last_error_code(),
        chunks = output.chunks.load(Ordering::Relaxed),
        elapsed_ms = start.elapsed().as_millis() as u64,
        max_decode_load = format!("{:.1}%", stats.decode_percent()),
        max_read_load = format!("{:.1}%", stats.read_percent()),
        "Playback finished"
    );
    Ok(())
}
