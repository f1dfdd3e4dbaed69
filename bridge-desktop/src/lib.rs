//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for hosted platforms
//! (macOS, Windows, Linux), used for development, tooling and tests.
//!
//! ## Overview
//!
//! - `StorageDevice` over a directory ([`FsStorage`]) or an in-memory table
//!   ([`MemoryStorage`])
//! - `SoftwareInterrupt` emulated by a dedicated worker thread
//!   ([`WorkerInterrupt`])
//! - `CycleCounter` derived from the monotonic clock ([`MonotonicCycleCounter`])
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FsStorage, MonotonicCycleCounter, WorkerInterrupt};
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .storage(Arc::new(FsStorage::new("/media/music")))
//!     .decode_interrupt(Arc::new(WorkerInterrupt::new()))
//!     .output(Arc::new(my_sound_card))
//!     .build()?;
//! ```

mod clock;
mod interrupt;
mod storage;

pub use clock::MonotonicCycleCounter;
pub use interrupt::WorkerInterrupt;
pub use storage::{FsStorage, MemoryStorage};
