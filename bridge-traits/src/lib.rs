//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each playback target.
//!
//! ## Overview
//!
//! This crate defines the contract between the streaming decode engine and the
//! platform that hosts it. Each trait represents a capability that the engine
//! requires but that must be implemented differently per target (a
//! microcontroller with an SD card and an I2S codec, or a desktop host used for
//! development and testing).
//!
//! ## Traits
//!
//! ### Block Storage
//! - [`StorageDevice`](storage::StorageDevice) - Opens named compressed streams
//! - [`StorageFile`](storage::StorageFile) - Bounded read / absolute seek / size
//!
//! ### Real-Time Output
//! - [`OutputTransport`](output::OutputTransport) - Fixed-size chunk allocation,
//!   transmission and shared-bus ownership
//!
//! ### Interrupt Substrate
//! - [`SoftwareInterrupt`](interrupt::SoftwareInterrupt) - A software-triggerable
//!   interrupt line with a registered handler and priority
//!
//! ### Utilities
//! - [`CycleCounter`](time::CycleCounter) - Monotonic CPU cycle source for load reporting
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to a host console
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Embedded | board support crate | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The runtime fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let output = builder.output
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "OutputTransport".to_string(),
//!         message: "No output transport provided. \
//!                  Inject the board's audio output adapter.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! include context (file names, offsets) in the message.
//!
//! ## Thread Safety
//!
//! The engine touches bridges from two interrupt contexts, so shared bridges
//! require `Send + Sync`. Every method is synchronous and must return in
//! bounded time.

pub mod error;
pub mod interrupt;
pub mod output;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use interrupt::{InterruptHandler, SoftwareInterrupt};
pub use output::{AudioChunk, OutputTransport, CHUNK_SAMPLES};
pub use storage::{StorageDevice, StorageFile};
pub use time::{ConsoleLogger, CycleCounter, LogEntry, LogLevel, LoggerSink};
