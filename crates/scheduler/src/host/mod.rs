//! Host environment contract and the yield policy built on top of it.
//!
//! The execution core never touches a clock or an event loop directly. It
//! asks a [`Host`] for the current time, for an execution window ("run me
//! soon") and for a delayed wake ("run me in N ms"). Two hosts ship with the
//! crate:
//! - [`VirtualHost`]: manual clock, windows and wakes fire only when the
//!   caller says so. Used by tests and simulations.
//! - [`ThreadHost`]: real monotonic clock, drains windows and sleeps for
//!   wakes on the current thread.

mod thread_host;
mod virtual_host;
mod yield_policy;

pub use thread_host::ThreadHost;
pub use virtual_host::VirtualHost;
pub use yield_policy::{MAX_YIELD_INTERVAL_MS, YieldPolicy};

use yieldpoint_core::{Millis, SchedulerError};

/// Invoked when the host grants an execution window. An `Err` ends the
/// window; the scheduler has already asked for the next one by then.
pub type WindowCallback = Box<dyn FnOnce() -> Result<(), SchedulerError>>;

/// Invoked when a delayed wake fires.
pub type WakeCallback = Box<dyn FnOnce()>;

/// Timing primitives the scheduler needs from its environment.
pub trait Host {
    /// Monotonic clock, in the same unit as task timeouts.
    fn now(&self) -> Millis;

    /// Invoke `on_granted` at the next opportunity. The scheduler keeps at
    /// most one request outstanding.
    fn request_execution_window(&self, on_granted: WindowCallback);

    /// Invoke `callback` once, roughly `delay` from now. Replaces any wake
    /// that is still outstanding.
    fn request_delayed_wake(&self, callback: WakeCallback, delay: Millis);

    /// Drop the outstanding wake, if any.
    fn cancel_delayed_wake(&self);

    /// Whether the host can report pending input at all.
    fn supports_input_pending(&self) -> bool {
        false
    }

    /// Whether high-priority input is waiting to be handled.
    fn is_input_pending(&self) -> bool {
        false
    }
}
