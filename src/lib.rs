//! Workspace facade crate.
//!
//! Re-exports the decode engine and its runtime wiring so host firmware or
//! desktop tools can depend on one crate and pick features here:
//!
//! - `desktop-shims`: filesystem storage, worker-thread interrupt and a
//!   monotonic cycle counter as bridge defaults.
//! - `decoder-mp3` / `decoder-aac` / `decoder-all`: Symphonia codec adapters.

pub use core_playback as playback;
pub use core_runtime as runtime;

pub use core_playback::{
    EngineConfig, ErrorCode, FeedOutcome, PlaybackError, Player, StopReason, TransportState,
};
pub use core_runtime::{CoreConfig, CoreConfigBuilder};
