use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, error};
use yieldpoint_core::{Millis, MonotonicClock, SchedulerError};

use super::{Host, WakeCallback, WindowCallback};

struct PendingWake {
    due: Millis,
    callback: WakeCallback,
}

/// Host backed by the real monotonic clock, run on the current thread.
///
/// Windows are granted in request order by [`ThreadHost::run_until_idle`],
/// which sleeps when the only thing left is a delayed wake.
pub struct ThreadHost {
    clock: MonotonicClock,
    windows: RefCell<VecDeque<WindowCallback>>,
    wake: RefCell<Option<PendingWake>>,
}

impl Default for ThreadHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadHost {
    pub fn new() -> Self {
        Self {
            clock: MonotonicClock::new(),
            windows: RefCell::new(VecDeque::new()),
            wake: RefCell::new(None),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.windows.borrow().is_empty() && self.wake.borrow().is_none()
    }

    /// Run the event loop until no window or wake is outstanding. Errors
    /// raised by windows are logged, collected and do not stop the loop.
    pub fn run_until_idle(&self) -> Vec<SchedulerError> {
        let mut errors = Vec::new();
        loop {
            let window = self.windows.borrow_mut().pop_front();
            if let Some(window) = window {
                if let Err(e) = window() {
                    error!(error = %e, "Execution window failed");
                    errors.push(e);
                }
                continue;
            }

            let due = match self.wake.borrow().as_ref() {
                Some(wake) => wake.due,
                None => break,
            };
            let remaining = due - self.clock.now();
            if remaining > 0.0 {
                debug!(sleep_ms = remaining, "Sleeping until delayed wake");
                std::thread::sleep(sleep_duration(remaining));
            }
            let wake = self.wake.borrow_mut().take();
            if let Some(wake) = wake {
                (wake.callback)();
            }
        }
        errors
    }
}

/// Saturates at `Duration::MAX` for delays too large to represent.
fn sleep_duration(ms: Millis) -> Duration {
    Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
}

impl Host for ThreadHost {
    fn now(&self) -> Millis {
        self.clock.now()
    }

    fn request_execution_window(&self, on_granted: WindowCallback) {
        self.windows.borrow_mut().push_back(on_granted);
    }

    fn request_delayed_wake(&self, callback: WakeCallback, delay: Millis) {
        let due = self.clock.now() + delay.max(0.0);
        let previous = self.wake.borrow_mut().replace(PendingWake { due, callback });
        drop(previous);
    }

    fn cancel_delayed_wake(&self) {
        let previous = self.wake.borrow_mut().take();
        drop(previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn drains_windows_in_order() {
        let host = ThreadHost::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let o = Rc::clone(&order);
            host.request_execution_window(Box::new(move || {
                o.borrow_mut().push(i);
                Ok(())
            }));
        }
        assert!(host.run_until_idle().is_empty());
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert!(host.is_idle());
    }

    #[test]
    fn sleeps_until_wake_is_due() {
        let host = ThreadHost::new();
        let fired_at = Rc::new(Cell::new(0.0));
        let f = Rc::clone(&fired_at);
        let clock = host.clock;
        let requested_at = host.now();
        host.request_delayed_wake(Box::new(move || f.set(clock.now())), 5.0);
        host.run_until_idle();
        assert!(fired_at.get() >= requested_at + 5.0);
    }

    #[test]
    fn oversized_delays_saturate() {
        assert_eq!(sleep_duration(1e25), Duration::MAX);
        assert_eq!(sleep_duration(f64::INFINITY), Duration::MAX);
        assert_eq!(sleep_duration(1500.0), Duration::from_millis(1500));
    }

    #[test]
    fn canceled_far_future_task_does_not_block() {
        use crate::{PriorityLevel, ScheduleOptions, Scheduler, Step};

        let host = Rc::new(ThreadHost::new());
        let scheduler = Scheduler::new(host.clone());
        let task = scheduler.schedule_callback_with_options(
            PriorityLevel::Normal,
            |_| Ok(Step::Done),
            ScheduleOptions::delay(1e25),
        );
        scheduler.cancel_callback(&task);

        assert!(host.run_until_idle().is_empty());
        assert!(host.is_idle());
        assert_eq!(scheduler.pending_timer_count(), 0);
    }

    #[test]
    fn window_errors_are_collected() {
        let host = ThreadHost::new();
        host.request_execution_window(Box::new(|| Err(SchedulerError::Config("bad".into()))));
        host.request_execution_window(Box::new(|| Ok(())));
        let errors = host.run_until_idle();
        assert_eq!(errors.len(), 1);
        assert!(host.is_idle());
    }
}
