use tracing::debug;
use yieldpoint_core::Millis;

use super::Scheduler;

impl Scheduler {
    /// Move every timer whose start time has arrived into the task queue,
    /// discarding canceled timers found at the head along the way.
    pub(crate) fn advance_timers(&self, current_time: Millis) {
        loop {
            let promoted = {
                let mut state = self.state_mut();
                let timer = match state.timer_queue.peek() {
                    Some(timer) => timer.clone(),
                    None => return,
                };
                if !timer.has_callback() {
                    state.timer_queue.pop();
                    continue;
                }
                if timer.start_time() > current_time {
                    return;
                }
                state.timer_queue.pop();
                timer.set_sort_index(timer.expiration_time());
                state.task_queue.push(timer.clone());
                timer
            };
            promoted.set_queued(true);
            self.inner.profiler.task_started(&promoted, current_time);
        }
    }

    /// Target of the delayed wake: promote due timers, then ask for a window
    /// or re-arm the wake for the next timer.
    pub(crate) fn handle_timeout(&self, current_time: Millis) {
        {
            let mut state = self.state_mut();
            state.is_host_timeout_scheduled = false;
            state.metrics.delayed_wakes += 1;
        }
        debug!(now = current_time, "Delayed wake fired");
        self.advance_timers(current_time);

        let (callback_scheduled, has_task, first_timer_start) = {
            let state = self.state();
            (
                state.is_host_callback_scheduled,
                state.task_queue.peek().is_some(),
                state.timer_queue.peek().map(|t| t.start_time()),
            )
        };
        if callback_scheduled {
            return;
        }
        if has_task {
            self.state_mut().is_host_callback_scheduled = true;
            self.request_host_callback();
        } else if let Some(start_time) = first_timer_start {
            self.request_host_timeout(start_time - current_time);
        }
    }
}
