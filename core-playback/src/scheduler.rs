//! # Decode Scheduler
//!
//! Two-phase state machine run one phase per firing of the low-priority
//! decode interrupt:
//!
//! ```text
//! Refill ──▶ DecodeFrame ──▶ Refill ──▶ ...
//! ```
//!
//! Each phase returns a [`PhaseOutcome`]; the caller decides whether to
//! re-arm the interrupt, drain, or tear down. Nothing here loops or blocks.

use crate::buffers::DoubleBuffer;
use crate::stats::LoadMonitor;
use crate::traits::{DecodeStatus, FrameCodec, FrameInfo, StreamKind};
use crate::window::RawWindow;
use bridge_traits::{CycleCounter, StorageFile};
use std::sync::Arc;
use tracing::{debug, trace};

/// Hard error reported when a full window cannot be consumed by the codec:
/// no refill can ever make progress.
pub const STALLED_WINDOW: i32 = -1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePhase {
    Refill,
    DecodeFrame,
}

impl DecodePhase {
    pub fn next(self) -> Self {
        match self {
            DecodePhase::Refill => DecodePhase::DecodeFrame,
            DecodePhase::DecodeFrame => DecodePhase::Refill,
        }
    }
}

/// Result of one scheduler invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Phase completed; the pipeline can advance.
    Continue,
    /// The filling slot still holds unconsumed samples; nothing was done.
    Backpressure,
    /// No more frames.
    EndOfStream,
    /// Hard decode error.
    Failed(i32),
}

pub struct DecodeScheduler {
    window: RawWindow,
    source: Box<dyn StorageFile>,
    codec: Box<dyn FrameCodec>,
    kind: StreamKind,
    read_limit: Option<u64>,
    phase: DecodePhase,
    clock: Arc<dyn CycleCounter>,
    load: Arc<LoadMonitor>,
}

impl DecodeScheduler {
    pub fn new(
        window: RawWindow,
        source: Box<dyn StorageFile>,
        codec: Box<dyn FrameCodec>,
        kind: StreamKind,
        read_limit: Option<u64>,
        clock: Arc<dyn CycleCounter>,
        load: Arc<LoadMonitor>,
    ) -> Self {
        Self {
            window,
            source,
            codec,
            kind,
            read_limit,
            phase: DecodePhase::Refill,
            clock,
            load,
        }
    }

    pub fn phase(&self) -> DecodePhase {
        self.phase
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn window(&self) -> &RawWindow {
        &self.window
    }

    pub fn last_frame_info(&self) -> Option<FrameInfo> {
        self.codec.last_frame_info()
    }

    /// Byte offset in the source of the next undecoded byte.
    pub fn stream_offset(&self) -> u64 {
        self.window.stream_offset(self.source.position())
    }

    /// Run exactly one phase against `buffers`.
    pub fn run_phase(&mut self, buffers: &DoubleBuffer) -> PhaseOutcome {
        if !buffers.is_decoding_slot_empty() {
            return PhaseOutcome::Backpressure;
        }

        let phase = self.phase;
        let start = self.clock.cycles();
        let outcome = match phase {
            DecodePhase::Refill => self.refill(),
            DecodePhase::DecodeFrame => self.decode_frame(buffers),
        };
        let elapsed = self.clock.cycles().wrapping_sub(start);

        match phase {
            DecodePhase::Refill => self.load.record_read(elapsed),
            DecodePhase::DecodeFrame => self.load.record_decode(elapsed),
        }
        trace!(?phase, ?outcome, cycles = elapsed, "Scheduler phase");

        if outcome == PhaseOutcome::Continue {
            self.phase = phase.next();
        }
        outcome
    }

    fn refill(&mut self) -> PhaseOutcome {
        if self.window.refill(self.source.as_mut(), self.read_limit) == 0 {
            debug!(offset = self.stream_offset(), "Source exhausted");
            return PhaseOutcome::EndOfStream;
        }
        PhaseOutcome::Continue
    }

    fn decode_frame(&mut self, buffers: &DoubleBuffer) -> PhaseOutcome {
        match self.kind {
            StreamKind::ContainerFramed => {
                if let Some(limit) = self.read_limit {
                    if self.stream_offset() >= limit {
                        debug!(limit, "Payload end reached");
                        return PhaseOutcome::EndOfStream;
                    }
                }
            }
            StreamKind::SelfDescribing => match self.codec.find_sync(self.window.bytes()) {
                Some(skip) => {
                    if skip > 0 {
                        trace!(skip, "Skipped to frame sync");
                    }
                    self.window.consume(skip);
                }
                None => {
                    debug!(offset = self.stream_offset(), "No frame sync in window");
                    return PhaseOutcome::EndOfStream;
                }
            },
        }

        if self.window.remaining() == 0 {
            return if self.window.is_exhausted() {
                PhaseOutcome::EndOfStream
            } else {
                PhaseOutcome::Continue
            };
        }

        let input = self.window.bytes();
        let codec = &mut self.codec;
        let mut status = None;
        let published = buffers.fill_decoding_slot(|out| {
            let result = codec.decode(input, out);
            status = Some(result);
            match result {
                DecodeStatus::Frame { samples, .. } => samples,
                _ => 0,
            }
        });
        if published.is_none() {
            return PhaseOutcome::Backpressure;
        }

        match status {
            Some(DecodeStatus::Frame { consumed, samples }) => {
                self.window.consume(consumed);
                trace!(consumed, samples, "Frame decoded");
                PhaseOutcome::Continue
            }
            Some(DecodeStatus::NeedMoreData { consumed }) => {
                self.window.consume(consumed);
                if consumed == 0 {
                    if self.window.is_exhausted() {
                        debug!(
                            remaining = self.window.remaining(),
                            "Truncated final frame"
                        );
                        return PhaseOutcome::EndOfStream;
                    }
                    if self.window.is_full() {
                        return PhaseOutcome::Failed(STALLED_WINDOW);
                    }
                }
                PhaseOutcome::Continue
            }
            Some(DecodeStatus::Failed(code)) => PhaseOutcome::Failed(code),
            None => PhaseOutcome::Backpressure,
        }
    }
}

impl std::fmt::Debug for DecodeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeScheduler")
            .field("phase", &self.phase)
            .field("kind", &self.kind)
            .field("codec", &self.codec.codec())
            .field("window", &self.window)
            .field("read_limit", &self.read_limit)
            .finish()
    }
}
