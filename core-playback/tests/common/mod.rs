//! Shared fakes for the playback integration tests.
#![allow(dead_code)]

use bridge_desktop::MemoryStorage;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    AudioChunk, CycleCounter, InterruptHandler, OutputTransport, SoftwareInterrupt,
};
use core_playback::{
    AudioCodec, CodecCapabilities, CodecProvider, DecodeStatus, EngineConfig, FeedOutcome,
    FrameCodec, FrameInfo, Player, StreamParameters,
};
use core_runtime::CoreConfig;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Interrupt line
// ============================================================================

#[derive(Default)]
struct LineState {
    handler: Option<InterruptHandler>,
    priority: u8,
    enabled: bool,
    pending: bool,
    global_masks: usize,
}

/// Software interrupt that only fires when the test says so.
#[derive(Default)]
pub struct ManualInterrupt {
    state: Mutex<LineState>,
}

impl ManualInterrupt {
    /// Run the handler until nothing is pending. Returns the number of firings.
    pub fn run_pending(&self) -> usize {
        let mut runs = 0;
        loop {
            let handler = {
                let mut state = self.state.lock();
                if !state.pending || !state.enabled {
                    break;
                }
                let Some(handler) = state.handler.clone() else {
                    break;
                };
                state.pending = false;
                handler
            };
            handler();
            runs += 1;
            assert!(runs < 10_000, "decode interrupt never settled");
        }
        runs
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    pub fn has_handler(&self) -> bool {
        self.state.lock().handler.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn priority(&self) -> u8 {
        self.state.lock().priority
    }

    pub fn global_masks(&self) -> usize {
        self.state.lock().global_masks
    }
}

impl SoftwareInterrupt for ManualInterrupt {
    fn register_handler(&self, handler: InterruptHandler) -> BridgeResult<()> {
        self.state.lock().handler = Some(handler);
        Ok(())
    }

    fn unregister_handler(&self) {
        let mut state = self.state.lock();
        state.handler = None;
        state.pending = false;
    }

    fn set_priority(&self, priority: u8) {
        self.state.lock().priority = priority;
    }

    fn enable(&self) {
        self.state.lock().enabled = true;
    }

    fn disable(&self) {
        self.state.lock().enabled = false;
    }

    fn trigger(&self) {
        self.state.lock().pending = true;
    }

    fn is_active(&self) -> bool {
        self.state.lock().pending
    }

    fn disable_all(&self) {
        self.state.lock().global_masks += 1;
    }
}

// ============================================================================
// Output transport
// ============================================================================

/// Output transport that records every transmitted chunk.
pub struct RecordingTransport {
    pool: Mutex<usize>,
    sent: Mutex<Vec<(u8, Vec<i16>)>>,
    outstanding: AtomicUsize,
    bus_acquired: AtomicUsize,
    bus_released: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            pool: Mutex::new(8),
            sent: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
            bus_acquired: AtomicUsize::new(0),
            bus_released: AtomicUsize::new(0),
        }
    }

    pub fn set_pool(&self, chunks: usize) {
        *self.pool.lock() = chunks;
    }

    /// Samples transmitted on `channel`, concatenated.
    pub fn channel(&self, channel: u8) -> Vec<i16> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| *c == channel)
            .flat_map(|(_, s)| s.iter().copied())
            .collect()
    }

    pub fn chunks_on(&self, channel: u8) -> usize {
        self.sent.lock().iter().filter(|(c, _)| *c == channel).count()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn bus(&self) -> (usize, usize) {
        (
            self.bus_acquired.load(Ordering::SeqCst),
            self.bus_released.load(Ordering::SeqCst),
        )
    }
}

impl OutputTransport for RecordingTransport {
    fn acquire_chunk(&self) -> Option<AudioChunk> {
        let mut pool = self.pool.lock();
        if *pool == 0 {
            return None;
        }
        *pool -= 1;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Some(AudioChunk::new())
    }

    fn transmit(&self, chunk: &AudioChunk, channel: u8) {
        self.sent.lock().push((channel, chunk.samples().to_vec()));
    }

    fn release_chunk(&self, _chunk: AudioChunk) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        *self.pool.lock() += 1;
    }

    fn acquire_bus(&self) {
        self.bus_acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn release_bus(&self) {
        self.bus_released.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Cycle counter
// ============================================================================

pub const STEP_CYCLES: u32 = 100;
pub const STEP_FREQUENCY_HZ: u32 = 1_000_000;

/// Advances by a fixed step on every read.
#[derive(Default)]
pub struct StepClock(AtomicU32);

impl CycleCounter for StepClock {
    fn cycles(&self) -> u32 {
        self.0.fetch_add(STEP_CYCLES, Ordering::Relaxed)
    }

    fn frequency_hz(&self) -> u32 {
        STEP_FREQUENCY_HZ
    }
}

// ============================================================================
// Toy codec
// ============================================================================
//
// Self-describing frame: A5 5A <rate> <channels> <frames: u16 BE> <payload>
// with one payload byte per interleaved sample. Container-framed access units
// are bare payloads of CONTAINER_AU_FRAMES frames.

pub const SYNC: [u8; 2] = [0xA5, 0x5A];
pub const HEADER_LEN: usize = 6;
pub const RATE_44K: u8 = 0;
pub const RATE_48K: u8 = 1;
/// A header with this rate byte makes the codec report a hard error.
pub const BROKEN: u8 = 0xFF;
pub const HARD_ERROR: i32 = -42;
pub const TOY_BITRATE: u32 = 128_000;
pub const CONTAINER_AU_FRAMES: usize = 128;

pub struct ScriptedCodec {
    container_capable: bool,
    params: Option<StreamParameters>,
    last: Option<FrameInfo>,
    live: Arc<AtomicUsize>,
}

impl ScriptedCodec {
    fn produce(&mut self, payload: &[u8], rate: u32, channels: u16, output: &mut [i16]) -> usize {
        let n = payload.len().min(output.len());
        for (out, byte) in output.iter_mut().zip(payload) {
            *out = *byte as i16;
        }
        self.last = Some(FrameInfo {
            sample_rate: rate,
            channels,
            bitrate: TOY_BITRATE,
            bits_per_sample: 16,
            output_samples: n,
        });
        n
    }
}

impl FrameCodec for ScriptedCodec {
    fn codec(&self) -> AudioCodec {
        AudioCodec::Mp3
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            self_describing: true,
            container_framed: self.container_capable,
        }
    }

    fn max_samples_per_frame(&self) -> usize {
        2048
    }

    fn find_sync(&self, window: &[u8]) -> Option<usize> {
        let last = window.len().checked_sub(HEADER_LEN)?;
        (0..=last).find(|&i| window[i..i + 2] == SYNC)
    }

    fn decode(&mut self, input: &[u8], output: &mut [i16]) -> DecodeStatus {
        if let Some(params) = self.params {
            let len = CONTAINER_AU_FRAMES * params.channels as usize;
            if input.len() < len {
                return DecodeStatus::NeedMoreData { consumed: 0 };
            }
            let samples = self.produce(&input[..len], params.sample_rate, params.channels, output);
            return DecodeStatus::Frame {
                consumed: len,
                samples,
            };
        }

        if input.len() < HEADER_LEN {
            return DecodeStatus::NeedMoreData { consumed: 0 };
        }
        if input[..2] != SYNC {
            return DecodeStatus::NeedMoreData { consumed: 1 };
        }
        let rate = match input[2] {
            BROKEN => return DecodeStatus::Failed(HARD_ERROR),
            RATE_48K => 48_000,
            _ => 44_100,
        };
        let channels = input[3] as u16;
        let frames = u16::from_be_bytes([input[4], input[5]]) as usize;
        let len = HEADER_LEN + frames * channels as usize;
        if input.len() < len {
            return DecodeStatus::NeedMoreData { consumed: 0 };
        }

        let samples = self.produce(&input[HEADER_LEN..len], rate, channels, output);
        DecodeStatus::Frame {
            consumed: len,
            samples,
        }
    }

    fn last_frame_info(&self) -> Option<FrameInfo> {
        self.last
    }

    fn set_params(&mut self, params: &StreamParameters) -> core_playback::Result<()> {
        self.params = Some(*params);
        Ok(())
    }
}

impl Drop for ScriptedCodec {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct ScriptedProvider {
    pub container_capable: bool,
    pub(crate) live: Arc<AtomicUsize>,
    pub(crate) created: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            container_capable: true,
            ..Default::default()
        }
    }

    /// Codec instances currently alive.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl CodecProvider for ScriptedProvider {
    fn create(&self, _codec: AudioCodec) -> core_playback::Result<Box<dyn FrameCodec>> {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedCodec {
            container_capable: self.container_capable,
            params: None,
            last: None,
            live: Arc::clone(&self.live),
        }))
    }
}

/// One toy frame whose payload counts up from `first`.
pub fn toy_frame(rate: u8, channels: u8, frames: u16, first: u8) -> Vec<u8> {
    let mut out = SYNC.to_vec();
    out.push(rate);
    out.push(channels);
    out.extend_from_slice(&frames.to_be_bytes());
    let samples = frames as usize * channels as usize;
    out.extend((0..samples).map(|i| first.wrapping_add(i as u8)));
    out
}

/// `count` 44.1 kHz frames whose payload bytes form one continuous counter.
pub fn toy_stream(count: usize, channels: u8, frames: u16) -> Vec<u8> {
    let per_frame = frames as usize * channels as usize;
    (0..count)
        .flat_map(|i| toy_frame(RATE_44K, channels, frames, (i * per_frame) as u8))
        .collect()
}

// ============================================================================
// Stream builders
// ============================================================================

/// ID3v2.4 tag whose total length (header included) is `total`.
pub fn id3_tag(total: usize, body_fill: &[u8]) -> Vec<u8> {
    let size = (total - 10) as u32;
    let mut out = b"ID3".to_vec();
    out.extend_from_slice(&[4, 0, 0]);
    out.extend_from_slice(&[
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ]);
    let mut body = body_fill.to_vec();
    body.resize(total - 10, 0);
    out.extend(body);
    out
}

fn bx(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(tag);
    out.extend_from_slice(payload);
    out
}

/// A minimal single-track MP4 box tree around `payload`.
pub struct Mp4Builder {
    pub channels: u16,
    pub sample_rate: u16,
    pub timescale: u32,
    pub duration: u32,
    pub with_stsd: bool,
    /// Written as an `stsz` table when present.
    pub sample_sizes: Option<Vec<u32>>,
    /// Bytes appended after `mdat` in a `free` box.
    pub trailer: Vec<u8>,
}

impl Default for Mp4Builder {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 44_100,
            timescale: 44_100,
            duration: 44_100 * 3,
            with_stsd: true,
            sample_sizes: None,
            trailer: Vec::new(),
        }
    }
}

impl Mp4Builder {
    fn moov(&self, first: u32, last: u32) -> Vec<u8> {
        let mut mdhd = vec![0u8; 12];
        mdhd.extend_from_slice(&self.timescale.to_be_bytes());
        mdhd.extend_from_slice(&self.duration.to_be_bytes());
        mdhd.extend_from_slice(&[0u8; 4]);

        let mut stbl = Vec::new();
        if self.with_stsd {
            let mut p = vec![0u8, 0, 0, 0, 0, 0, 0, 1];
            p.extend_from_slice(&36u32.to_be_bytes());
            p.extend_from_slice(b"mp4a");
            p.extend_from_slice(&[0u8; 6]);
            p.extend_from_slice(&1u16.to_be_bytes());
            p.extend_from_slice(&[0u8; 8]);
            p.extend_from_slice(&self.channels.to_be_bytes());
            p.extend_from_slice(&16u16.to_be_bytes());
            p.extend_from_slice(&[0u8; 4]);
            p.extend_from_slice(&self.sample_rate.to_be_bytes());
            p.extend_from_slice(&[0u8; 2]);
            stbl.extend(bx(b"stsd", &p));
        }
        if let Some(sizes) = &self.sample_sizes {
            let mut p = vec![0u8; 8];
            p.extend_from_slice(&(sizes.len() as u32).to_be_bytes());
            for size in sizes {
                p.extend_from_slice(&size.to_be_bytes());
            }
            stbl.extend(bx(b"stsz", &p));
        }
        let mut stco = vec![0u8; 4];
        stco.extend_from_slice(&2u32.to_be_bytes());
        stco.extend_from_slice(&first.to_be_bytes());
        stco.extend_from_slice(&last.to_be_bytes());
        stbl.extend(bx(b"stco", &stco));

        let mut mdia = bx(b"mdhd", &mdhd);
        mdia.extend(bx(b"minf", &bx(b"stbl", &stbl)));
        bx(b"moov", &bx(b"trak", &bx(b"mdia", &mdia)))
    }

    pub fn build(&self, payload: &[u8]) -> Vec<u8> {
        let ftyp = bx(b"ftyp", b"M4A \0\0\0\0");
        let first = (ftyp.len() + self.moov(0, 0).len() + 8) as u32;
        let last = first + (payload.len() as u32).saturating_sub(1);

        let mut out = ftyp;
        out.extend(self.moov(first, last));
        out.extend(bx(b"mdat", payload));
        if !self.trailer.is_empty() {
            out.extend(bx(b"free", &self.trailer));
        }
        out
    }
}

// ============================================================================
// Harness
// ============================================================================

/// In-memory storage, recording transport and manual interrupt line wired
/// into a [`CoreConfig`].
pub struct Host {
    pub storage: Arc<MemoryStorage>,
    pub output: Arc<RecordingTransport>,
    pub line: Arc<ManualInterrupt>,
    pub core: CoreConfig,
}

impl Host {
    pub fn new() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let output = Arc::new(RecordingTransport::new());
        let line = Arc::new(ManualInterrupt::default());
        let core = CoreConfig::builder()
            .storage(storage.clone())
            .output(output.clone())
            .decode_interrupt(line.clone())
            .cycle_counter(Arc::new(StepClock::default()))
            .build()
            .unwrap();
        Self {
            storage,
            output,
            line,
            core,
        }
    }
}

pub struct Harness {
    pub storage: Arc<MemoryStorage>,
    pub output: Arc<RecordingTransport>,
    pub line: Arc<ManualInterrupt>,
    pub codecs: Arc<ScriptedProvider>,
    pub player: Player,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(EngineConfig::default(), ScriptedProvider::new())
    }

    pub fn with(engine: EngineConfig, codecs: ScriptedProvider) -> Self {
        let codecs = Arc::new(codecs);
        let host = Host::new();
        let player = Player::new(host.core, engine, codecs.clone()).unwrap();
        Self {
            storage: host.storage,
            output: host.output,
            line: host.line,
            codecs,
            player,
        }
    }

    pub fn insert(&self, name: &str, data: Vec<u8>) {
        self.storage.insert(name, data);
    }

    /// One output period followed by whatever decode work it requested.
    pub fn period(&self) -> Option<FeedOutcome> {
        let outcome = self.player.update();
        self.line.run_pending();
        outcome
    }

    /// Run periods until the player stops itself.
    pub fn run_to_stop(&self) -> Vec<FeedOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..10_000 {
            match self.period() {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        outcomes
    }
}

pub fn emitted(outcomes: &[FeedOutcome]) -> usize {
    outcomes
        .iter()
        .filter(|o| matches!(o, FeedOutcome::Emitted { .. }))
        .count()
}
