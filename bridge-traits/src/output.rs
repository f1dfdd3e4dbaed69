//! Real-Time Output Abstractions
//!
//! The output side of the pipeline is a fixed-rate transport that accepts
//! mono chunks of [`CHUNK_SAMPLES`] samples, one per channel per period.

/// Samples per channel in one output chunk.
pub const CHUNK_SAMPLES: usize = 128;

/// A fixed-size block of 16-bit samples owned by the output transport's pool.
#[derive(Clone)]
pub struct AudioChunk {
    samples: Box<[i16; CHUNK_SAMPLES]>,
}

impl AudioChunk {
    /// A silent chunk.
    pub fn new() -> Self {
        Self {
            samples: Box::new([0; CHUNK_SAMPLES]),
        }
    }

    pub fn samples(&self) -> &[i16; CHUNK_SAMPLES] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [i16; CHUNK_SAMPLES] {
        &mut self.samples
    }
}

impl Default for AudioChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AudioChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioChunk")
            .field("len", &CHUNK_SAMPLES)
            .field("head", &&self.samples[..4])
            .finish()
    }
}

/// Output transport trait
///
/// Implementations wrap the platform's audio block pool and its DMA/I2S
/// output queue. All methods are called from the periodic feeder interrupt
/// and must not block.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::output::OutputTransport;
///
/// fn emit_silence(out: &dyn OutputTransport) {
///     if let Some(chunk) = out.acquire_chunk() {
///         out.transmit(&chunk, 0);
///         out.transmit(&chunk, 1);
///         out.release_chunk(chunk);
///     }
/// }
/// ```
pub trait OutputTransport: Send + Sync {
    /// Allocate a chunk from the transport's pool; `None` when the pool is empty.
    fn acquire_chunk(&self) -> Option<AudioChunk>;

    /// Queue a chunk for output on channel `channel` (0 = left, 1 = right).
    fn transmit(&self, chunk: &AudioChunk, channel: u8);

    /// Return a chunk to the pool.
    fn release_chunk(&self, chunk: AudioChunk);

    /// Take ownership of the shared bus (e.g. SPI shared with the SD card)
    /// for the duration of a playing session.
    fn acquire_bus(&self) {}

    /// Give back the shared bus.
    fn release_bus(&self) {}
}
