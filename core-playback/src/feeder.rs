//! # Playback Feeder
//!
//! Runs once per output period from the high-priority audio interrupt. Moves
//! one 128-frame period from the playing slot to the output
//! transport and kicks the decode interrupt when the other slot needs work.

use crate::buffers::DoubleBuffer;
use bridge_traits::{OutputTransport, SoftwareInterrupt};
use tracing::trace;

/// Result of one output period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// A period was transmitted; `frames` of it came from the stream, the
    /// rest is silence.
    Emitted { frames: usize },
    /// No output chunk (or slot access) was available this period. Nothing
    /// was consumed.
    Skipped,
    /// The stream has ended and every decoded sample has been played.
    Drained,
    /// The playing slot was empty at its deadline.
    Starved,
}

/// Everything one feeder invocation needs.
pub struct Feeder<'a> {
    pub buffers: &'a DoubleBuffer,
    pub output: &'a dyn OutputTransport,
    pub decode_line: &'a dyn SoftwareInterrupt,
    pub channels: u16,
    pub end_of_stream: bool,
}

impl<'a> Feeder<'a> {
    pub fn feed(&self) -> FeedOutcome {
        // Chain the decoder only when it is idle and has somewhere to write.
        if !self.end_of_stream
            && !self.decode_line.is_active()
            && self.buffers.is_decoding_slot_empty()
        {
            self.decode_line.trigger();
        }

        if self.buffers.filled(self.buffers.playing_index()) == 0 {
            return if self.end_of_stream {
                FeedOutcome::Drained
            } else {
                FeedOutcome::Starved
            };
        }

        let Some(mut left) = self.output.acquire_chunk() else {
            return FeedOutcome::Skipped;
        };

        if self.channels >= 2 {
            let Some(mut right) = self.output.acquire_chunk() else {
                self.output.release_chunk(left);
                return FeedOutcome::Skipped;
            };

            let outcome = self
                .buffers
                .drain_chunk(2, left.samples_mut(), Some(right.samples_mut()));
            let outcome = match outcome {
                Some(drained) => {
                    self.output.transmit(&left, 0);
                    self.output.transmit(&right, 1);
                    FeedOutcome::Emitted {
                        frames: drained.frames,
                    }
                }
                None => FeedOutcome::Skipped,
            };
            self.output.release_chunk(right);
            self.output.release_chunk(left);
            trace!(?outcome, "Fed stereo period");
            outcome
        } else {
            let outcome = match self.buffers.drain_chunk(1, left.samples_mut(), None) {
                Some(drained) => {
                    self.output.transmit(&left, 0);
                    self.output.transmit(&left, 1);
                    FeedOutcome::Emitted {
                        frames: drained.frames,
                    }
                }
                None => FeedOutcome::Skipped,
            };
            self.output.release_chunk(left);
            trace!(?outcome, "Fed mono period");
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::AudioChunk;
    use bridge_traits::InterruptHandler;
    use mockall::mock;
    use parking_lot::Mutex;

    mock! {
        Line {}
        impl SoftwareInterrupt for Line {
            fn register_handler(&self, handler: InterruptHandler) -> bridge_traits::error::Result<()>;
            fn unregister_handler(&self);
            fn set_priority(&self, priority: u8);
            fn enable(&self);
            fn disable(&self);
            fn trigger(&self);
            fn is_active(&self) -> bool;
        }
    }

    #[derive(Default)]
    struct Sink {
        pool: Mutex<usize>,
        sent: Mutex<Vec<(u8, Vec<i16>)>>,
        released: Mutex<usize>,
    }

    impl Sink {
        fn with_pool(n: usize) -> Self {
            Self {
                pool: Mutex::new(n),
                ..Default::default()
            }
        }
    }

    impl OutputTransport for Sink {
        fn acquire_chunk(&self) -> Option<AudioChunk> {
            let mut pool = self.pool.lock();
            if *pool == 0 {
                return None;
            }
            *pool -= 1;
            Some(AudioChunk::new())
        }

        fn transmit(&self, chunk: &AudioChunk, channel: u8) {
            self.sent.lock().push((channel, chunk.samples().to_vec()));
        }

        fn release_chunk(&self, _chunk: AudioChunk) {
            *self.released.lock() += 1;
            *self.pool.lock() += 1;
        }
    }

    fn idle_line(expect_trigger: usize) -> MockLine {
        let mut line = MockLine::new();
        line.expect_is_active().return_const(false);
        line.expect_trigger().times(expect_trigger).return_const(());
        line
    }

    /// Buffers with `n` samples in the playing slot (slot 0), decoding slot 1.
    fn primed(n: usize) -> DoubleBuffer {
        let buffers = DoubleBuffer::new(1024).unwrap();
        buffers.fill_decoding_slot(|out| {
            for (i, s) in out.iter_mut().take(n).enumerate() {
                *s = i as i16;
            }
            n
        });
        buffers.set_decoding_index(1);
        buffers
    }

    #[test]
    fn test_mono_goes_to_both_channels() {
        let buffers = primed(256);
        let sink = Sink::with_pool(4);
        let line = idle_line(1);
        let feeder = Feeder {
            buffers: &buffers,
            output: &sink,
            decode_line: &line,
            channels: 1,
            end_of_stream: false,
        };

        assert_eq!(feeder.feed(), FeedOutcome::Emitted { frames: 128 });
        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, 0);
        assert_eq!(sent[1].0, 1);
        assert_eq!(sent[0].1, sent[1].1);
        assert_eq!(*sink.released.lock(), 1);
        assert_eq!(buffers.filled(0), 128);
    }

    #[test]
    fn test_stereo_needs_two_chunks() {
        let buffers = primed(512);
        let sink = Sink::with_pool(1);
        let line = idle_line(1);
        let feeder = Feeder {
            buffers: &buffers,
            output: &sink,
            decode_line: &line,
            channels: 2,
            end_of_stream: false,
        };

        assert_eq!(feeder.feed(), FeedOutcome::Skipped);
        assert!(sink.sent.lock().is_empty());
        assert_eq!(*sink.pool.lock(), 1);
        assert_eq!(buffers.filled(0), 512);
    }

    #[test]
    fn test_busy_decoder_is_not_retriggered() {
        let buffers = primed(256);
        let sink = Sink::with_pool(2);
        let mut line = MockLine::new();
        line.expect_is_active().return_const(true);
        line.expect_trigger().never();
        let feeder = Feeder {
            buffers: &buffers,
            output: &sink,
            decode_line: &line,
            channels: 1,
            end_of_stream: false,
        };

        assert!(matches!(feeder.feed(), FeedOutcome::Emitted { .. }));
    }

    #[test]
    fn test_empty_playing_slot() {
        let buffers = DoubleBuffer::new(1024).unwrap();
        buffers.set_decoding_index(1);
        let sink = Sink::with_pool(2);

        let line = idle_line(1);
        let starving = Feeder {
            buffers: &buffers,
            output: &sink,
            decode_line: &line,
            channels: 2,
            end_of_stream: false,
        };
        assert_eq!(starving.feed(), FeedOutcome::Starved);

        let line = idle_line(0);
        let ended = Feeder {
            buffers: &buffers,
            output: &sink,
            decode_line: &line,
            channels: 2,
            end_of_stream: true,
        };
        assert_eq!(ended.feed(), FeedOutcome::Drained);
        assert!(sink.sent.lock().is_empty());
    }
}
