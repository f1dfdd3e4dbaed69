//! Interrupt Substrate Abstractions
//!
//! The decode scheduler runs as a low-priority software-triggered interrupt.
//! This module describes the minimal surface the engine needs from the
//! platform's interrupt controller.

use std::sync::Arc;

use crate::error::Result;

/// Handler installed on a software interrupt line.
pub type InterruptHandler = Arc<dyn Fn() + Send + Sync>;

/// A software-triggerable interrupt line
///
/// On a microcontroller this wraps one NVIC vector; on a host it is emulated
/// by a worker thread. Handlers run to completion and are never re-entered
/// while active.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use bridge_traits::interrupt::SoftwareInterrupt;
///
/// fn install(line: &dyn SoftwareInterrupt) -> Result<()> {
///     line.register_handler(Arc::new(|| { /* one unit of work */ }))?;
///     line.set_priority(208);
///     line.enable();
///     line.trigger();
///     Ok(())
/// }
/// ```
pub trait SoftwareInterrupt: Send + Sync {
    /// Install the handler for this line, replacing any previous one.
    fn register_handler(&self, handler: InterruptHandler) -> Result<()>;

    /// Remove the installed handler. Pending triggers are discarded.
    fn unregister_handler(&self);

    /// Set the line's priority (lower value = more urgent, as on ARM NVIC).
    fn set_priority(&self, priority: u8);

    /// Allow the line to fire.
    fn enable(&self);

    /// Mask the line. Triggers raised while masked stay pending.
    fn disable(&self);

    /// Request one firing of the handler. Never waits for it to run.
    fn trigger(&self);

    /// Whether a firing is pending or currently executing.
    fn is_active(&self) -> bool;

    /// Globally mask interrupts.
    fn disable_all(&self) {}

    /// Globally unmask interrupts.
    fn enable_all(&self) {}

    /// Run `f` with interrupts globally masked.
    fn critical_section(&self, f: &mut dyn FnMut()) {
        self.disable_all();
        f();
        self.enable_all();
    }
}
