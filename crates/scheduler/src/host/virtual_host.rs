use std::cell::{Cell, RefCell};

use tracing::warn;
use yieldpoint_core::{Millis, SchedulerError};

use super::{Host, WakeCallback, WindowCallback};

struct PendingWake {
    due: Millis,
    callback: WakeCallback,
}

/// Deterministic host with a manually driven clock.
///
/// Nothing happens on its own: the caller advances time, grants the pending
/// execution window and fires due wakes. Task callbacks may advance the
/// clock too, to simulate work that takes time.
pub struct VirtualHost {
    now: Cell<Millis>,
    window: RefCell<Option<WindowCallback>>,
    wake: RefCell<Option<PendingWake>>,
    input_pending: Cell<Option<bool>>,
    windows_requested: Cell<u64>,
}

impl Default for VirtualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualHost {
    pub fn new() -> Self {
        Self {
            now: Cell::new(0.0),
            window: RefCell::new(None),
            wake: RefCell::new(None),
            input_pending: Cell::new(None),
            windows_requested: Cell::new(0),
        }
    }

    pub fn advance(&self, ms: Millis) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set_now(&self, now: Millis) {
        self.now.set(now);
    }

    /// `None` removes the input-pending probe entirely.
    pub fn set_input_pending(&self, pending: Option<bool>) {
        self.input_pending.set(pending);
    }

    pub fn has_pending_window(&self) -> bool {
        self.window.borrow().is_some()
    }

    /// Total execution windows requested over the host's lifetime.
    pub fn windows_requested(&self) -> u64 {
        self.windows_requested.get()
    }

    pub fn has_pending_wake(&self) -> bool {
        self.wake.borrow().is_some()
    }

    /// Absolute time at which the outstanding wake is due.
    pub fn next_wake_at(&self) -> Option<Millis> {
        self.wake.borrow().as_ref().map(|w| w.due)
    }

    /// Grant the outstanding execution window, if there is one.
    pub fn run_window(&self) -> Option<Result<(), SchedulerError>> {
        let callback = self.window.borrow_mut().take()?;
        Some(callback())
    }

    /// Fire the outstanding wake if the clock has reached it.
    pub fn fire_due_wake(&self) -> bool {
        let due = matches!(self.next_wake_at(), Some(at) if at <= self.now.get());
        if !due {
            return false;
        }
        let wake = self.wake.borrow_mut().take();
        match wake {
            Some(wake) => {
                (wake.callback)();
                true
            }
            None => false,
        }
    }

    /// Jump the clock to the outstanding wake (never backwards) and fire it.
    pub fn advance_to_next_wake(&self) -> bool {
        match self.next_wake_at() {
            Some(at) => {
                if at > self.now.get() {
                    self.now.set(at);
                }
                self.fire_due_wake()
            }
            None => false,
        }
    }

    /// Grant windows and fire wakes until nothing is pending or `max_steps`
    /// is reached. Window errors are collected rather than stopping the run.
    pub fn run_until_idle(&self, max_steps: usize) -> Vec<SchedulerError> {
        let mut errors = Vec::new();
        for _ in 0..max_steps {
            if let Some(result) = self.run_window() {
                if let Err(e) = result {
                    errors.push(e);
                }
                continue;
            }
            if !self.advance_to_next_wake() {
                break;
            }
        }
        errors
    }
}

impl Host for VirtualHost {
    fn now(&self) -> Millis {
        self.now.get()
    }

    fn request_execution_window(&self, on_granted: WindowCallback) {
        self.windows_requested.set(self.windows_requested.get() + 1);
        let previous = self.window.borrow_mut().replace(on_granted);
        if previous.is_some() {
            warn!("Execution window requested while one was outstanding, replacing it");
        }
    }

    fn request_delayed_wake(&self, callback: WakeCallback, delay: Millis) {
        let due = self.now.get() + delay.max(0.0);
        let previous = self.wake.borrow_mut().replace(PendingWake { due, callback });
        drop(previous);
    }

    fn cancel_delayed_wake(&self) {
        let previous = self.wake.borrow_mut().take();
        drop(previous);
    }

    fn supports_input_pending(&self) -> bool {
        self.input_pending.get().is_some()
    }

    fn is_input_pending(&self) -> bool {
        self.input_pending.get().unwrap_or(false)
    }
}
