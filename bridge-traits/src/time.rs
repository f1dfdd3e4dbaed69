//! Timing and Logging Abstractions
//!
//! Provides the CPU cycle source used for load reporting and a logging sink
//! for mirroring engine events to a host console.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Cycle counter trait
///
/// Wraps a free-running CPU cycle counter (DWT_CYCCNT on Cortex-M). The value
/// wraps at `u32::MAX`; callers measure intervals with `wrapping_sub`.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::CycleCounter;
///
/// fn timed(counter: &dyn CycleCounter, work: impl FnOnce()) -> u32 {
///     let start = counter.cycles();
///     work();
///     counter.cycles().wrapping_sub(start)
/// }
/// ```
pub trait CycleCounter: Send + Sync {
    /// Current counter value.
    fn cycles(&self) -> u32;

    /// Counter frequency in Hz (the CPU clock on embedded targets).
    fn frequency_hz(&self) -> u32;
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Target module/component
    pub target: String,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: HashMap<String, String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Logger sink trait
///
/// Forwards structured logs from the engine to a host console:
/// - **Embedded**: USB serial or a UART
/// - **Desktop**: stderr or a log file
///
/// Calls may come from interrupt context, so implementations must not block
/// for long. Buffering and dropping under pressure is acceptable.
pub trait LoggerSink: Send + Sync {
    /// Forward a log entry to the host console
    fn log(&self, entry: LogEntry) -> Result<()>;

    /// Flush any buffered logs
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Get the minimum log level that will be processed
    ///
    /// Logs below this level can be filtered out at the source.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

/// Console logger implementation for testing/development
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    pub min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
        }
    }
}

impl LoggerSink for ConsoleLogger {
    fn log(&self, entry: LogEntry) -> Result<()> {
        if entry.level >= self.min_level {
            let level_str = match entry.level {
                LogLevel::Trace => "TRACE",
                LogLevel::Debug => "DEBUG",
                LogLevel::Info => "INFO",
                LogLevel::Warn => "WARN",
                LogLevel::Error => "ERROR",
            };

            println!(
                "[{}] {} {}: {}",
                entry.timestamp.format("%H:%M:%S%.3f"),
                level_str,
                entry.target,
                entry.message
            );

            if !entry.fields.is_empty() {
                println!("  Fields: {:?}", entry.fields);
            }
        }
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }
}
