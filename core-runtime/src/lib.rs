//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the streaming decode engine:
//! - Logging and tracing infrastructure
//! - Bridge wiring with fail-fast capability checks
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the playback crate depends on.
//! It establishes the logging conventions and the way platform bridges are
//! collected and validated before a player is constructed.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
