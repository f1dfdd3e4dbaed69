//! # Transport Lifecycle
//!
//! [`Player`] owns one streaming session at a time and exposes the two
//! interrupt entry points that drive it:
//!
//! - [`Player::update`]: the periodic, high-priority feeder. The host calls
//!   it once per output period.
//! - [`Player::service_decode`]: one decode scheduler phase. Registered on the
//!   software interrupt line by `play()`; the feeder triggers it.
//!
//! ```text
//!              play()                      pause(true)
//!   Stopped ───────────▶ Playing ◀─────────────────▶ Paused
//!      ▲                    │         pause(false)      │
//!      └────────────────────┴───────────────────────────┘
//!        stop() / end of stream / decode error / starvation
//! ```
//!
//! All per-stream state (raw window, codec, sample buffers, source handle)
//! lives in a `Session` built construct-or-fail style: any error during
//! `play()` drops whatever was acquired so far.

use crate::buffers::{BufferSnapshot, DoubleBuffer};
use crate::config::{EngineConfig, TransportState};
use crate::error::{ErrorCode, PlaybackError, Result, StopReason};
use crate::feeder::{FeedOutcome, Feeder};
use crate::probe;
use crate::scheduler::{DecodeScheduler, PhaseOutcome};
use crate::stats::{LoadMonitor, LoadStats};
use crate::traits::{CodecProvider, StreamKind, StreamParameters, AAC_PROFILE_LC};
use crate::window::RawWindow;
use bridge_traits::{InterruptHandler, CHUNK_SAMPLES};
use core_runtime::logging::strip_path;
use core_runtime::CoreConfig;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Session
// ============================================================================

struct Session {
    buffers: DoubleBuffer,
    scheduler: Mutex<DecodeScheduler>,
    params: StreamParameters,
    bitrate: AtomicU32,
    end_of_stream: AtomicBool,
    file_size: u64,
    tag_bytes: u64,
    duration_ms: Option<u32>,
}

impl Session {
    fn open(
        name: &str,
        core: &CoreConfig,
        engine: &EngineConfig,
        codecs: &dyn CodecProvider,
        load: &Arc<LoadMonitor>,
    ) -> Result<Self> {
        let mut window = RawWindow::with_capacity(engine.raw_buffer_bytes)?;
        let mut codec = codecs.create(engine.codec).map_err(|e| match e {
            PlaybackError::FormatUnsupported(_) => e,
            other => PlaybackError::OutOfMemory(format!("{} codec instance: {}", engine.codec, other)),
        })?;
        let buffers = DoubleBuffer::new(codec.max_samples_per_frame())?;

        let mut source = core
            .storage
            .open(name)
            .map_err(|e| PlaybackError::SourceNotFound(format!("{}: {}", name, e)))?;
        let file_size = source.size();

        let outcome = probe::probe(source.as_mut(), engine.tag_seek_alignment)?;
        let container_params = match &outcome.container {
            Some(info) => {
                if !codec.capabilities().supports(StreamKind::ContainerFramed) {
                    return Err(PlaybackError::FormatUnsupported(format!(
                        "{} codec cannot decode container-framed streams",
                        codec.codec()
                    )));
                }
                let params = StreamParameters {
                    channels: info.channels,
                    sample_rate: info.sample_rate,
                    bitrate: 0,
                    profile: AAC_PROFILE_LC,
                    output_sample_rate: engine.output_sample_rate,
                };
                codec.set_params(&params)?;
                codec.set_access_units(&info.sample_sizes)?;
                Some(params)
            }
            None => None,
        };

        source
            .seek(outcome.seek_offset)
            .map_err(|e| PlaybackError::SourceNotFound(format!("{}: {}", name, e)))?;
        if window.refill(source.as_mut(), outcome.read_limit()) == 0 {
            return Err(PlaybackError::SourceNotFound(format!("{}: no data", name)));
        }
        window.consume(outcome.lead_in());

        let mut scheduler = DecodeScheduler::new(
            window,
            source,
            codec,
            outcome.kind,
            outcome.read_limit(),
            Arc::clone(&core.cycle_counter),
            Arc::clone(load),
        );

        // Prime slot 0 synchronously so parameters are known before any output.
        let mut failure = None;
        for _ in 0..engine.priming_cycles * 2 {
            match scheduler.run_phase(&buffers) {
                PhaseOutcome::Continue => {}
                PhaseOutcome::Failed(code) => {
                    failure = Some(code);
                    break;
                }
                PhaseOutcome::Backpressure | PhaseOutcome::EndOfStream => break,
            }
            if buffers.filled(0) > 0 {
                break;
            }
        }

        let info = match scheduler.last_frame_info() {
            Some(info) if buffers.filled(0) > 0 => info,
            _ => {
                return Err(match failure {
                    Some(code) => PlaybackError::DecodeHard(code),
                    None => PlaybackError::FormatUnsupported(
                        "no decodable frame at stream start".to_string(),
                    ),
                })
            }
        };

        if info.sample_rate != engine.output_sample_rate
            || info.bits_per_sample != 16
            || info.channels == 0
            || info.channels > engine.max_channels
        {
            return Err(PlaybackError::FormatUnsupported(format!(
                "{} Hz, {} channel(s), {}-bit does not match the {} Hz output",
                info.sample_rate, info.channels, info.bits_per_sample, engine.output_sample_rate
            )));
        }

        let params = StreamParameters {
            profile: container_params.map_or(0, |p| p.profile),
            ..info.as_parameters(0, engine.output_sample_rate)
        };
        buffers.set_decoding_index(1);
        debug!(?params, produced = buffers.filled(0), "Primed first buffer");

        Ok(Self {
            buffers,
            scheduler: Mutex::new(scheduler),
            params,
            bitrate: AtomicU32::new(info.bitrate),
            end_of_stream: AtomicBool::new(false),
            file_size,
            tag_bytes: outcome.tag_bytes,
            duration_ms: outcome.container.as_ref().map(|c| c.duration_ms),
        })
    }
}

// ============================================================================
// Player
// ============================================================================

struct PlayerInner {
    core: CoreConfig,
    engine: EngineConfig,
    codecs: Arc<dyn CodecProvider>,
    state: AtomicU8,
    session: Mutex<Option<Arc<Session>>>,
    samples_played: AtomicU64,
    last_error: Mutex<ErrorCode>,
    stop_reason: Mutex<Option<StopReason>>,
    load: Arc<LoadMonitor>,
}

/// Streaming MP3/AAC player.
///
/// Cheap to clone; clones share the same session. Construct once with the
/// platform bridges, then call [`play`](Self::play) per file and
/// [`update`](Self::update) from the output interrupt.
///
/// # Example
///
/// ```ignore
/// use core_playback::{EngineConfig, Player};
/// use core_runtime::CoreConfig;
///
/// let core = CoreConfig::builder()
///     .storage_root("/sdcard")
///     .output(output)
///     .build()?;
/// let player = Player::with_default_codecs(core, EngineConfig::default())?;
///
/// player.play("albums/track01.mp3")?;
/// // From the audio interrupt, once per 128-frame period:
/// player.update();
/// ```
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

impl Player {
    pub fn new(
        core: CoreConfig,
        engine: EngineConfig,
        codecs: Arc<dyn CodecProvider>,
    ) -> Result<Self> {
        core.validate()?;
        engine.validate().map_err(PlaybackError::InvalidConfig)?;

        info!(codec = %engine.codec, window = engine.raw_buffer_bytes, "Created player");
        Ok(Self {
            inner: Arc::new(PlayerInner {
                core,
                engine,
                codecs,
                state: AtomicU8::new(TransportState::Stopped as u8),
                session: Mutex::new(None),
                samples_played: AtomicU64::new(0),
                last_error: Mutex::new(ErrorCode::None),
                stop_reason: Mutex::new(None),
                load: Arc::new(LoadMonitor::new()),
            }),
        })
    }

    /// Create a player decoding with Symphonia.
    #[cfg(feature = "core-decoder")]
    pub fn with_default_codecs(core: CoreConfig, engine: EngineConfig) -> Result<Self> {
        Self::new(core, engine, Arc::new(crate::decoder::SymphoniaCodecProvider::new()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.engine
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start streaming `name` from the storage device.
    ///
    /// Stops any current session first. On failure the player is left
    /// `Stopped` with the error's code available from
    /// [`last_error_code`](Self::last_error_code).
    #[instrument(skip(self, name), fields(file = strip_path(name)))]
    pub fn play(&self, name: &str) -> Result<()> {
        let inner = &self.inner;
        self.stop();
        *inner.last_error.lock() = ErrorCode::None;
        *inner.stop_reason.lock() = None;
        inner.samples_played.store(0, Ordering::Relaxed);

        let session = match Session::open(
            name,
            &inner.core,
            &inner.engine,
            inner.codecs.as_ref(),
            &inner.load,
        ) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                error!(error = %e, "Failed to start playback");
                *inner.last_error.lock() = e.code();
                return Err(e);
            }
        };
        let params = session.params;

        let line = &inner.core.decode_interrupt;
        let weak: Weak<PlayerInner> = Arc::downgrade(inner);
        let handler: InterruptHandler = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.service_decode();
            }
        });
        if let Err(e) = line.register_handler(handler) {
            let e = PlaybackError::from(e);
            error!(error = %e, "Failed to install decode interrupt");
            *inner.last_error.lock() = e.code();
            return Err(e);
        }
        line.set_priority(inner.engine.decode_interrupt_priority);

        inner.core.output.acquire_bus();
        *inner.session.lock() = Some(session);
        inner
            .state
            .store(TransportState::Playing as u8, Ordering::Release);
        line.enable();

        info!(
            channels = params.channels,
            sample_rate = params.sample_rate,
            bitrate = params.bitrate,
            "Playback started"
        );
        Ok(())
    }

    /// Stop playback and release the session. Safe to call in any state.
    pub fn stop(&self) {
        self.inner.teardown(StopReason::Requested, ErrorCode::None);
    }

    /// Pause or resume. Returns `true` if the player is now paused.
    ///
    /// Has no effect while stopped.
    pub fn pause(&self, paused: bool) -> bool {
        let target = if paused {
            TransportState::Paused
        } else {
            TransportState::Playing
        };
        let changed = self
            .inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                TransportState::from_u8(current)
                    .is_active()
                    .then_some(target as u8)
            })
            .is_ok();
        if changed {
            debug!(paused, "Pause toggled");
        }
        self.state() == TransportState::Paused
    }

    pub fn state(&self) -> TransportState {
        self.inner.state()
    }

    /// `true` while playing or paused.
    pub fn is_playing(&self) -> bool {
        self.state().is_active()
    }

    // ========================================================================
    // Interrupt Entry Points
    // ========================================================================

    /// Feed one output period. Call from the periodic audio interrupt.
    ///
    /// Returns `None` when not playing (stopped or paused); nothing is
    /// touched in that case.
    pub fn update(&self) -> Option<FeedOutcome> {
        self.inner.update()
    }

    /// Run one decode scheduler phase.
    pub fn service_decode(&self) {
        self.inner.service_decode();
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    pub fn position_millis(&self) -> u32 {
        let samples = self.inner.samples_played.load(Ordering::Relaxed);
        let rate = self.inner.engine.output_sample_rate as u64;
        (samples * 1000 / rate).min(u32::MAX as u64) as u32
    }

    /// Stream length: the container's declared duration when there is one,
    /// otherwise estimated from the payload size and current bitrate.
    pub fn length_millis(&self) -> u32 {
        let Some(session) = self.inner.session() else {
            return 0;
        };
        if let Some(ms) = session.duration_ms {
            return ms;
        }
        let bitrate = session.bitrate.load(Ordering::Relaxed) as u64;
        if bitrate == 0 {
            return 0;
        }
        let payload = session.file_size.saturating_sub(session.tag_bytes);
        (payload * 8000 / bitrate).min(u32::MAX as u64) as u32
    }

    /// Bits per second of the most recent frame; 0 when stopped.
    pub fn bitrate(&self) -> u32 {
        self.inner
            .session()
            .map_or(0, |s| s.bitrate.load(Ordering::Relaxed))
    }

    pub fn reset_load_stats(&self) {
        self.inner.load.reset();
    }

    pub fn load_stats(&self) -> LoadStats {
        self.inner.load.stats(
            self.inner.core.cycle_counter.frequency_hz(),
            self.inner.engine.load_reference_interval,
        )
    }

    pub fn max_decode_load_percent(&self) -> f32 {
        self.load_stats().decode_percent()
    }

    pub fn max_read_load_percent(&self) -> f32 {
        self.load_stats().read_percent()
    }

    pub fn last_error_code(&self) -> ErrorCode {
        *self.inner.last_error.lock()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        *self.inner.stop_reason.lock()
    }

    pub fn stream_parameters(&self) -> Option<StreamParameters> {
        self.inner.session().map(|s| s.params)
    }

    pub fn buffer_snapshot(&self) -> Option<BufferSnapshot> {
        self.inner.session().map(|s| s.buffers.snapshot())
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("state", &self.state())
            .field("engine", &self.inner.engine)
            .field("last_error", &self.last_error_code())
            .finish_non_exhaustive()
    }
}

impl PlayerInner {
    fn state(&self) -> TransportState {
        TransportState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.session.lock().clone()
    }

    fn update(&self) -> Option<FeedOutcome> {
        if self.state() != TransportState::Playing {
            return None;
        }
        let session = self.session()?;

        let outcome = Feeder {
            buffers: &session.buffers,
            output: self.core.output.as_ref(),
            decode_line: self.core.decode_interrupt.as_ref(),
            channels: session.params.channels,
            end_of_stream: session.end_of_stream.load(Ordering::Acquire),
        }
        .feed();

        match outcome {
            FeedOutcome::Emitted { .. } => {
                self.samples_played
                    .fetch_add(CHUNK_SAMPLES as u64, Ordering::Relaxed);
            }
            FeedOutcome::Skipped => {}
            FeedOutcome::Drained => {
                info!("Stream finished");
                self.detach(Some(&session), StopReason::StreamEnded, ErrorCode::None);
            }
            FeedOutcome::Starved => {
                let snapshot = session.buffers.snapshot();
                warn!(
                    decoding = snapshot.decoding,
                    produced = snapshot.produced,
                    consumed = snapshot.consumed,
                    "Decoder did not keep up with the output rate"
                );
                self.detach(Some(&session), StopReason::Starvation, ErrorCode::Starvation);
            }
        }
        Some(outcome)
    }

    fn service_decode(&self) {
        let Some(session) = self.session() else {
            return;
        };

        let outcome = {
            let Some(mut scheduler) = session.scheduler.try_lock() else {
                return;
            };
            let outcome = scheduler.run_phase(&session.buffers);
            if outcome == PhaseOutcome::Continue {
                if let Some(info) = scheduler.last_frame_info() {
                    session.bitrate.store(info.bitrate, Ordering::Relaxed);
                }
            }
            outcome
        };

        match outcome {
            PhaseOutcome::Continue => {
                if session.buffers.is_decoding_slot_empty()
                    && !session.end_of_stream.load(Ordering::Acquire)
                    && self.is_current(&session)
                {
                    self.core.decode_interrupt.trigger();
                }
            }
            PhaseOutcome::Backpressure => {}
            PhaseOutcome::EndOfStream => {
                debug!("Decoder reached end of stream; draining");
                session.end_of_stream.store(true, Ordering::Release);
            }
            PhaseOutcome::Failed(code) => {
                error!(code, "Hard decode error");
                self.detach(
                    Some(&session),
                    StopReason::DecodeError(code),
                    ErrorCode::DecodeHard(code),
                );
            }
        }
    }

    fn is_current(&self, session: &Arc<Session>) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, session))
    }

    /// Stop whatever session is current. A no-op when already stopped.
    fn teardown(&self, reason: StopReason, code: ErrorCode) {
        self.detach(None, reason, code);
    }

    /// Detach the session with both interrupt contexts masked, then release
    /// everything it owns.
    ///
    /// With `expected` set, only that session is stopped: a fault raised by
    /// a session that `play()` has already replaced is dropped.
    fn detach(&self, expected: Option<&Arc<Session>>, reason: StopReason, code: ErrorCode) {
        let line = &self.core.decode_interrupt;
        let mut taken = None;
        line.critical_section(&mut || {
            let mut current = self.session.lock();
            let matches = match (expected, current.as_ref()) {
                (Some(expected), Some(current)) => Arc::ptr_eq(expected, current),
                (None, _) => true,
                (Some(_), None) => false,
            };
            if matches {
                taken = current.take();
                self.state
                    .store(TransportState::Stopped as u8, Ordering::Release);
            }
        });
        let Some(session) = taken else {
            if expected.is_some() {
                debug!(?reason, "Ignored stop from a replaced session");
            }
            return;
        };

        line.disable();
        line.unregister_handler();
        self.core.output.release_bus();
        self.samples_played.store(0, Ordering::Relaxed);
        *self.stop_reason.lock() = Some(reason);
        if code.is_error() {
            *self.last_error.lock() = code;
        }

        let snapshot = session.buffers.snapshot();
        info!(
            ?reason,
            produced = snapshot.produced,
            consumed = snapshot.consumed,
            "Playback stopped"
        );
    }
}

impl Drop for PlayerInner {
    fn drop(&mut self) {
        if self.session.get_mut().is_some() {
            self.teardown(StopReason::Requested, ErrorCode::None);
        }
    }
}
