//! # Core Configuration Module
//!
//! Collects the platform bridges the decode engine runs on.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every bridge the engine needs. It enforces fail-fast
//! validation so that a player is never constructed with a missing capability.
//!
//! ## Required Dependencies
//!
//! - `OutputTransport` - The real-time audio output (no default)
//! - `StorageDevice` - Block storage holding compressed streams
//! - `SoftwareInterrupt` - The line the decode scheduler runs on
//! - `CycleCounter` - CPU cycle source for load reporting
//!
//! A host console for log events is not part of this configuration; it is
//! installed with [`LoggingConfig::with_logger_sink`](crate::logging::LoggingConfig::with_logger_sink).
//!
//! When the `desktop-shims` feature is enabled, hosted defaults are injected
//! when not provided: `FsStorage` rooted at [`storage_root`](CoreConfigBuilder::storage_root),
//! a `WorkerInterrupt`, and a `MonotonicCycleCounter`.
//!
//! ## Usage
//!
//! ### Desktop Defaults
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .storage_root("/media/card")
//!     .output(Arc::new(MySoundCard::open()?))
//!     .build()?;
//! ```
//!
//! ### Board Bridges
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .storage(Arc::new(SdCard::new(spi)))
//!     .output(Arc::new(I2sOutput::new()))
//!     .decode_interrupt(Arc::new(NvicLine::new(Interrupt::SOFTWARE)))
//!     .cycle_counter(Arc::new(Dwt::new(600_000_000)))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{CycleCounter, OutputTransport, SoftwareInterrupt, StorageDevice};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration for the decode engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Block storage holding compressed streams (required)
    pub storage: Arc<dyn StorageDevice>,

    /// Real-time audio output (required)
    pub output: Arc<dyn OutputTransport>,

    /// Software interrupt line driving the decode scheduler (required)
    pub decode_interrupt: Arc<dyn SoftwareInterrupt>,

    /// CPU cycle source (required)
    pub cycle_counter: Arc<dyn CycleCounter>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("storage", &"StorageDevice { ... }")
            .field("output", &"OutputTransport { ... }")
            .field("decode_interrupt", &"SoftwareInterrupt { ... }")
            .field(
                "cycle_counter",
                &format_args!(
                    "CycleCounter {{ frequency_hz: {} }}",
                    self.cycle_counter.frequency_hz()
                ),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates bridge-reported values.
    ///
    /// A cycle counter reporting 0 Hz would make every load figure divide by
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.cycle_counter.frequency_hz() == 0 {
            return Err(Error::Config(
                "CycleCounter reports a frequency of 0 Hz".to_string(),
            ));
        }
        Ok(())
    }
}

fn output_missing_error() -> Error {
    Error::capability_missing(
        "OutputTransport",
        "OutputTransport implementation is required for real-time audio output. \
         Embedded: inject the board's I2S/DAC block pool adapter. \
         Desktop: inject a sound-card or recording transport.",
    )
}

#[cfg(not(feature = "desktop-shims"))]
fn storage_missing_error() -> Error {
    Error::capability_missing(
        "StorageDevice",
        "StorageDevice implementation is required to open compressed streams. \
         Embedded: inject the SD card adapter. \
         Desktop: enable the 'desktop-shims' feature and set storage_root().",
    )
}

#[cfg(feature = "desktop-shims")]
fn provide_default_storage(root: Option<PathBuf>) -> Result<Arc<dyn StorageDevice>> {
    use bridge_desktop::FsStorage;

    let root = root.ok_or_else(|| {
        Error::capability_missing(
            "StorageDevice",
            "No StorageDevice provided and no storage_root() set for the default FsStorage.",
        )
    })?;
    let storage: Arc<dyn StorageDevice> = Arc::new(FsStorage::new(root));
    Ok(storage)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_storage(_root: Option<PathBuf>) -> Result<Arc<dyn StorageDevice>> {
    Err(storage_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_interrupt() -> Result<Arc<dyn SoftwareInterrupt>> {
    use bridge_desktop::WorkerInterrupt;

    let line: Arc<dyn SoftwareInterrupt> = Arc::new(WorkerInterrupt::new());
    Ok(line)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_interrupt() -> Result<Arc<dyn SoftwareInterrupt>> {
    Err(Error::capability_missing(
        "SoftwareInterrupt",
        "SoftwareInterrupt implementation is required to run the decode scheduler. \
         Embedded: inject an NVIC software interrupt line. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use WorkerInterrupt.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_cycle_counter() -> Result<Arc<dyn CycleCounter>> {
    use bridge_desktop::MonotonicCycleCounter;

    let counter: Arc<dyn CycleCounter> = Arc::new(MonotonicCycleCounter::new());
    Ok(counter)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_cycle_counter() -> Result<Arc<dyn CycleCounter>> {
    Err(Error::capability_missing(
        "CycleCounter",
        "CycleCounter implementation is required for load reporting. \
         Embedded: inject a DWT cycle counter adapter. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use MonotonicCycleCounter.",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Set bridges incrementally and call [`build()`](CoreConfigBuilder::build).
#[derive(Default)]
pub struct CoreConfigBuilder {
    storage: Option<Arc<dyn StorageDevice>>,
    storage_root: Option<PathBuf>,
    output: Option<Arc<dyn OutputTransport>>,
    decode_interrupt: Option<Arc<dyn SoftwareInterrupt>>,
    cycle_counter: Option<Arc<dyn CycleCounter>>,
}

impl CoreConfigBuilder {
    /// Sets the storage device.
    pub fn storage(mut self, storage: Arc<dyn StorageDevice>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the directory the default desktop storage is rooted at.
    ///
    /// Ignored when [`storage`](Self::storage) is set.
    pub fn storage_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    /// Sets the output transport.
    pub fn output(mut self, output: Arc<dyn OutputTransport>) -> Self {
        self.output = Some(output);
        self
    }

    /// Sets the software interrupt line for the decode scheduler.
    pub fn decode_interrupt(mut self, line: Arc<dyn SoftwareInterrupt>) -> Self {
        self.decode_interrupt = Some(line);
        self
    }

    /// Sets the CPU cycle counter.
    pub fn cycle_counter(mut self, counter: Arc<dyn CycleCounter>) -> Self {
        self.cycle_counter = Some(counter);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - A required bridge is missing and has no platform default
    /// - A bridge reports invalid values
    pub fn build(self) -> Result<CoreConfig> {
        let output = self.output.ok_or_else(output_missing_error)?;

        let storage = match self.storage {
            Some(storage) => storage,
            None => provide_default_storage(self.storage_root)?,
        };

        let decode_interrupt = match self.decode_interrupt {
            Some(line) => line,
            None => provide_default_interrupt()?,
        };

        let cycle_counter = match self.cycle_counter {
            Some(counter) => counter,
            None => provide_default_cycle_counter()?,
        };

        let config = CoreConfig {
            storage,
            output,
            decode_interrupt,
            cycle_counter,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{AudioChunk, InterruptHandler, StorageFile};
    use bridge_traits::BridgeError;

    struct NullStorage;

    impl StorageDevice for NullStorage {
        fn open(&self, name: &str) -> BridgeResult<Box<dyn StorageFile>> {
            Err(BridgeError::NotFound(name.to_string()))
        }
    }

    struct NullOutput;

    impl OutputTransport for NullOutput {
        fn acquire_chunk(&self) -> Option<AudioChunk> {
            None
        }
        fn transmit(&self, _chunk: &AudioChunk, _channel: u8) {}
        fn release_chunk(&self, _chunk: AudioChunk) {}
    }

    struct NullLine;

    impl SoftwareInterrupt for NullLine {
        fn register_handler(&self, _handler: InterruptHandler) -> BridgeResult<()> {
            Ok(())
        }
        fn unregister_handler(&self) {}
        fn set_priority(&self, _priority: u8) {}
        fn enable(&self) {}
        fn disable(&self) {}
        fn trigger(&self) {}
        fn is_active(&self) -> bool {
            false
        }
    }

    struct FixedCounter(u32);

    impl CycleCounter for FixedCounter {
        fn cycles(&self) -> u32 {
            0
        }
        fn frequency_hz(&self) -> u32 {
            self.0
        }
    }

    fn full_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .storage(Arc::new(NullStorage))
            .output(Arc::new(NullOutput))
            .decode_interrupt(Arc::new(NullLine))
            .cycle_counter(Arc::new(FixedCounter(600_000_000)))
    }

    #[test]
    fn test_builder_with_all_bridges() {
        let config = full_builder().build().expect("all bridges provided");
        assert_eq!(config.cycle_counter.frequency_hz(), 600_000_000);
    }

    #[test]
    fn test_builder_requires_output() {
        let result = CoreConfig::builder()
            .storage(Arc::new(NullStorage))
            .decode_interrupt(Arc::new(NullLine))
            .cycle_counter(Arc::new(FixedCounter(1)))
            .build();

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("OutputTransport"));
        assert!(err_msg.contains("real-time audio output"));
    }

    #[test]
    fn test_zero_frequency_rejected() {
        let result = full_builder()
            .cycle_counter(Arc::new(FixedCounter(0)))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = full_builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("StorageDevice { ... }"));
        assert!(debug.contains("frequency_hz: 600000000"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_storage_without_shims() {
        let result = CoreConfig::builder()
            .output(Arc::new(NullOutput))
            .decode_interrupt(Arc::new(NullLine))
            .cycle_counter(Arc::new(FixedCounter(1)))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "StorageDevice"
        ));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_interrupt_without_shims() {
        let result = CoreConfig::builder()
            .storage(Arc::new(NullStorage))
            .output(Arc::new(NullOutput))
            .cycle_counter(Arc::new(FixedCounter(1)))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "SoftwareInterrupt"
        ));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder()
            .storage_root(std::env::temp_dir())
            .output(Arc::new(NullOutput))
            .build()
            .expect("desktop defaults should succeed");

        assert!(config.cycle_counter.frequency_hz() > 0);
        assert!(!config.decode_interrupt.is_active());
        assert!(config.storage.open("definitely-missing.mp3").is_err());
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_storage_needs_root() {
        let result = CoreConfig::builder().output(Arc::new(NullOutput)).build();
        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "StorageDevice"
        ));
    }
}
