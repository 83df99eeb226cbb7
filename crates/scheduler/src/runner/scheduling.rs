use tracing::{debug, trace};
use yieldpoint_core::Millis;

use crate::priority::PriorityLevel;
use crate::task::{CallbackResult, TaskHandle};

use super::Scheduler;

/// Per-call scheduling options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScheduleOptions {
    /// Hold the task back this long. Ignored unless positive.
    pub delay: Option<Millis>,
}

impl ScheduleOptions {
    pub fn delay(delay: Millis) -> Self {
        Self { delay: Some(delay) }
    }
}

impl Scheduler {
    /// Schedule `callback` to run as soon as its priority allows.
    pub fn schedule_callback<F>(&self, priority_level: PriorityLevel, callback: F) -> TaskHandle
    where
        F: FnOnce(bool) -> CallbackResult + 'static,
    {
        self.schedule_callback_with_options(priority_level, callback, ScheduleOptions::default())
    }

    pub fn schedule_callback_with_options<F>(
        &self,
        priority_level: PriorityLevel,
        callback: F,
        options: ScheduleOptions,
    ) -> TaskHandle
    where
        F: FnOnce(bool) -> CallbackResult + 'static,
    {
        let current_time = self.now();
        let start_time = match options.delay {
            Some(delay) if delay > 0.0 => current_time + delay,
            _ => current_time,
        };

        let task = {
            let mut state = self.state_mut();
            state.task_id_counter += 1;
            state.metrics.tasks_scheduled += 1;
            TaskHandle::new(state.task_id_counter, priority_level, start_time, Box::new(callback))
        };
        trace!(
            task_id = task.id(),
            priority = %priority_level,
            start_time,
            expiration_time = task.expiration_time(),
            "Task scheduled"
        );

        if start_time > current_time {
            task.set_sort_index(start_time);
            let (earliest_with_nothing_eligible, timeout_scheduled) = {
                let mut state = self.state_mut();
                state.timer_queue.push(task.clone());
                (
                    state.task_queue.is_empty() && state.timer_queue.peek() == Some(&task),
                    state.is_host_timeout_scheduled,
                )
            };
            if earliest_with_nothing_eligible {
                if timeout_scheduled {
                    self.cancel_host_timeout();
                }
                self.request_host_timeout(start_time - current_time);
            }
        } else {
            task.set_sort_index(task.expiration_time());
            self.state_mut().task_queue.push(task.clone());
            task.set_queued(true);
            self.inner.profiler.task_started(&task, current_time);

            // While a flush is running, the next window is requested when it yields.
            let request = {
                let mut state = self.state_mut();
                if !state.is_host_callback_scheduled && !state.is_performing_work {
                    state.is_host_callback_scheduled = true;
                    true
                } else {
                    false
                }
            };
            if request {
                self.request_host_callback();
            }
        }

        task
    }

    /// Cancel a task. It stays in its queue and is discarded once it reaches
    /// the head; a callback that is already running is not interrupted.
    pub fn cancel_callback(&self, task: &TaskHandle) {
        if task.is_queued() {
            self.inner.profiler.task_canceled(task, self.now());
            task.set_queued(false);
        }
        let callback = task.take_callback();
        if callback.is_some() {
            self.state_mut().metrics.tasks_canceled += 1;
            trace!(task_id = task.id(), "Task canceled");
        }
        drop(callback);
        self.drop_canceled_timers();
    }

    /// Discard canceled timers at the head of the timer queue and point the
    /// armed wake at the next live timer, or disarm it if none is left.
    fn drop_canceled_timers(&self) {
        let (next_start, timeout_scheduled) = {
            let mut state = self.state_mut();
            let mut dropped = false;
            while state.timer_queue.peek().is_some_and(|t| !t.has_callback()) {
                state.timer_queue.pop();
                dropped = true;
            }
            if !dropped {
                return;
            }
            (
                state.timer_queue.peek().map(|t| t.start_time()),
                state.is_host_timeout_scheduled,
            )
        };
        if !timeout_scheduled {
            return;
        }
        self.cancel_host_timeout();
        if let Some(start_time) = next_start {
            self.request_host_timeout(start_time - self.now());
        }
    }

    /// Head of the eligible queue, without touching it.
    pub fn first_callback_node(&self) -> Option<TaskHandle> {
        self.state().task_queue.peek().cloned()
    }

    /// Stop running tasks until [`Scheduler::continue_execution`].
    pub fn pause_execution(&self) {
        debug!("Scheduler paused");
        self.state_mut().is_paused = true;
    }

    pub fn continue_execution(&self) {
        debug!("Scheduler resumed");
        let request = {
            let mut state = self.state_mut();
            state.is_paused = false;
            if !state.is_host_callback_scheduled && !state.is_performing_work {
                state.is_host_callback_scheduled = true;
                true
            } else {
                false
            }
        };
        if request {
            self.request_host_callback();
        }
    }
}
