//! Software interrupt line emulated by a worker thread

use bridge_traits::{
    error::{BridgeError, Result},
    interrupt::{InterruptHandler, SoftwareInterrupt},
};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

#[derive(Default)]
struct LineState {
    handler: Option<InterruptHandler>,
    priority: u8,
    enabled: bool,
    masked: bool,
    pending: bool,
    running: bool,
    shutdown: bool,
}

impl LineState {
    fn ready(&self) -> bool {
        self.pending && self.enabled && !self.masked && self.handler.is_some()
    }
}

struct Shared {
    state: Mutex<LineState>,
    wake: Condvar,
}

/// Worker-thread software interrupt.
///
/// Each [`trigger`](SoftwareInterrupt::trigger) marks the line pending; the
/// worker runs the handler once per pending flag, never concurrently with
/// itself. Triggers raised while the handler runs coalesce into one further
/// firing, as on an NVIC pending bit.
pub struct WorkerInterrupt {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerInterrupt {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(LineState::default()),
            wake: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("sw-irq".to_string())
            .spawn(move || Self::run(worker_shared))
            .ok();
        if worker.is_none() {
            debug!("Failed to spawn interrupt worker; triggers will stay pending");
        }

        Self {
            shared,
            worker: Mutex::new(worker),
        }
    }

    fn run(shared: Arc<Shared>) {
        loop {
            let handler = {
                let mut state = shared.state.lock();
                while !state.shutdown && !state.ready() {
                    shared.wake.wait(&mut state);
                }
                if state.shutdown {
                    break;
                }
                state.pending = false;
                state.running = true;
                state.handler.clone()
            };

            if let Some(handler) = handler {
                trace!("Software interrupt firing");
                handler();
            }

            let mut state = shared.state.lock();
            state.running = false;
            shared.wake.notify_all();
        }
    }

    /// Current priority value.
    pub fn priority(&self) -> u8 {
        self.shared.state.lock().priority
    }

    /// Block until the line is neither pending nor running, or the timeout
    /// expires. Returns whether the line went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while state.running || state.ready() {
            if self
                .shared
                .wake
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return !(state.running || state.ready());
            }
        }
        true
    }
}

impl Default for WorkerInterrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareInterrupt for WorkerInterrupt {
    fn register_handler(&self, handler: InterruptHandler) -> Result<()> {
        if self.worker.lock().is_none() {
            return Err(BridgeError::NotAvailable(
                "interrupt worker thread is not running".to_string(),
            ));
        }
        self.shared.state.lock().handler = Some(handler);
        Ok(())
    }

    fn unregister_handler(&self) {
        let mut state = self.shared.state.lock();
        state.handler = None;
        state.pending = false;
    }

    fn set_priority(&self, priority: u8) {
        self.shared.state.lock().priority = priority;
    }

    fn enable(&self) {
        self.shared.state.lock().enabled = true;
        self.shared.wake.notify_all();
    }

    fn disable(&self) {
        self.shared.state.lock().enabled = false;
    }

    fn trigger(&self) {
        self.shared.state.lock().pending = true;
        self.shared.wake.notify_all();
    }

    fn is_active(&self) -> bool {
        let state = self.shared.state.lock();
        state.pending || state.running
    }

    fn disable_all(&self) {
        self.shared.state.lock().masked = true;
    }

    fn enable_all(&self) {
        self.shared.state.lock().masked = false;
        self.shared.wake.notify_all();
    }
}

impl Drop for WorkerInterrupt {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_all();

        if let Some(handle) = self.worker.lock().take() {
            // The last owner may be the handler itself, running on the worker.
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
