//! # Double Buffer
//!
//! Two decoded-sample buffers shared between the decode scheduler (writer)
//! and the playback feeder (reader).
//!
//! `decoding` names the slot the scheduler may fill; the feeder always reads
//! the other one. Each slot's `filled` counter has one writer at a time: the
//! scheduler stores a frame's length into an empty slot, the feeder
//! decrements it and, when it reaches exactly zero, hands the slot back by
//! pointing `decoding` at it. The scheduler never touches a slot whose
//! counter is nonzero.
//!
//! Sample storage sits behind a `parking_lot::Mutex` per slot. By the
//! ownership rule above the two sides never want the same slot, so the locks
//! are uncontended; the feeder only ever `try_lock`s.

use crate::error::{PlaybackError, Result};
use bridge_traits::CHUNK_SAMPLES;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

struct SampleSlot {
    samples: Mutex<Box<[i16]>>,
    filled: AtomicUsize,
    read_offset: AtomicUsize,
}

impl SampleSlot {
    fn allocate(len: usize) -> Result<Self> {
        let mut samples = Vec::new();
        samples.try_reserve_exact(len).map_err(|_| {
            PlaybackError::OutOfMemory(format!("sample buffer of {} samples", len))
        })?;
        samples.resize(len, 0);

        Ok(Self {
            samples: Mutex::new(samples.into_boxed_slice()),
            filled: AtomicUsize::new(0),
            read_offset: AtomicUsize::new(0),
        })
    }
}

/// Point-in-time view of the buffer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BufferSnapshot {
    pub decoding: usize,
    pub filled: [usize; 2],
    pub read_offset: [usize; 2],
    /// Interleaved samples published by the scheduler since the session began.
    pub produced: u64,
    /// Interleaved samples drained by the feeder since the session began.
    pub consumed: u64,
}

impl BufferSnapshot {
    pub fn playing(&self) -> usize {
        1 - self.decoding
    }

    /// Samples decoded but not yet played.
    pub fn pending(&self) -> u64 {
        (self.filled[0] + self.filled[1]) as u64
    }
}

/// Result of draining one output period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    /// Frames (samples per channel) copied; the rest of the chunk is silence.
    pub frames: usize,
    /// The slot reached zero and was handed back to the scheduler.
    pub handed_back: bool,
}

pub struct DoubleBuffer {
    slots: [SampleSlot; 2],
    decoding: AtomicUsize,
    produced: AtomicU64,
    consumed: AtomicU64,
}

impl DoubleBuffer {
    /// Allocate both slots with room for `samples_per_slot` interleaved
    /// samples each.
    pub fn new(samples_per_slot: usize) -> Result<Self> {
        Ok(Self {
            slots: [
                SampleSlot::allocate(samples_per_slot)?,
                SampleSlot::allocate(samples_per_slot)?,
            ],
            decoding: AtomicUsize::new(0),
            produced: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
        })
    }

    pub fn decoding_index(&self) -> usize {
        self.decoding.load(Ordering::Acquire)
    }

    pub fn playing_index(&self) -> usize {
        1 - self.decoding_index()
    }

    pub fn filled(&self, index: usize) -> usize {
        self.slots[index].filled.load(Ordering::Acquire)
    }

    pub fn is_decoding_slot_empty(&self) -> bool {
        self.filled(self.decoding_index()) == 0
    }

    /// Set which slot the scheduler fills. Used once, after priming.
    pub fn set_decoding_index(&self, index: usize) {
        self.decoding.store(index & 1, Ordering::Release);
    }

    /// Run `fill` on the decoding slot if it is empty, then publish the
    /// number of samples it reports.
    ///
    /// Returns `None` without calling `fill` when the slot still holds
    /// unconsumed samples.
    pub fn fill_decoding_slot<F>(&self, fill: F) -> Option<usize>
    where
        F: FnOnce(&mut [i16]) -> usize,
    {
        let index = self.decoding_index();
        let slot = &self.slots[index];
        if slot.filled.load(Ordering::Acquire) != 0 {
            return None;
        }

        let mut samples = slot.samples.lock();
        let written = fill(&mut samples).min(samples.len());
        drop(samples);

        if written > 0 {
            slot.read_offset.store(0, Ordering::Relaxed);
            self.produced.fetch_add(written as u64, Ordering::Relaxed);
            slot.filled.store(written, Ordering::Release);
        }
        Some(written)
    }

    /// Copy the next output period from the playing slot, deinterleaving
    /// into `left` and `right`.
    ///
    /// With one channel only `left` is written. A final partial period is
    /// padded with silence, and a trailing sample that does not make up a
    /// whole frame is dropped with the slot. Returns `None` when the playing
    /// slot is empty.
    pub fn drain_chunk(
        &self,
        channels: usize,
        left: &mut [i16; CHUNK_SAMPLES],
        right: Option<&mut [i16; CHUNK_SAMPLES]>,
    ) -> Option<Drained> {
        let channels = channels.clamp(1, 2);
        let index = self.playing_index();
        let slot = &self.slots[index];

        let filled = slot.filled.load(Ordering::Acquire);
        if filled == 0 {
            return None;
        }
        let samples = slot.samples.try_lock()?;
        let offset = slot.read_offset.load(Ordering::Relaxed);

        let frames = filled.min(CHUNK_SAMPLES * channels) / channels;
        let copied = frames * channels;
        let take = if filled - copied < channels {
            filled
        } else {
            copied
        };
        let source = &samples[offset..offset + copied];

        match (channels, right) {
            (2, Some(right)) => {
                for (i, pair) in source.chunks_exact(2).enumerate() {
                    left[i] = pair[0];
                    right[i] = pair[1];
                }
                right[frames..].fill(0);
            }
            (2, None) => {
                for (i, pair) in source.chunks_exact(2).enumerate() {
                    left[i] = pair[0];
                }
            }
            _ => left[..frames].copy_from_slice(source),
        }
        left[frames..].fill(0);
        drop(samples);

        let remaining = filled - take;
        self.consumed.fetch_add(take as u64, Ordering::Relaxed);

        let handed_back = remaining == 0;
        if handed_back {
            slot.read_offset.store(0, Ordering::Relaxed);
            slot.filled.store(0, Ordering::Release);
            self.decoding.store(index, Ordering::Release);
        } else {
            slot.read_offset.store(offset + take, Ordering::Relaxed);
            slot.filled.store(remaining, Ordering::Release);
        }

        Some(Drained {
            frames,
            handed_back,
        })
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            decoding: self.decoding_index(),
            filled: [self.filled(0), self.filled(1)],
            read_offset: [
                self.slots[0].read_offset.load(Ordering::Relaxed),
                self.slots[1].read_offset.load(Ordering::Relaxed),
            ],
            produced: self.produced.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
        }
    }
}
