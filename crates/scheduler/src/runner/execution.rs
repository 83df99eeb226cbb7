use tracing::{debug, error, trace};
use yieldpoint_core::{Millis, SchedulerError};

use crate::priority::PriorityLevel;
use crate::task::Step;

use super::Scheduler;

/// Cleanup for one flush: runs on every exit path, unwinding included.
/// Unless the flush finished, the task that was running is marked errored.
struct FlushScope<'a> {
    scheduler: &'a Scheduler,
    previous_priority: PriorityLevel,
    finished: bool,
}

impl<'a> FlushScope<'a> {
    fn enter(scheduler: &'a Scheduler) -> Self {
        scheduler.state_mut().is_performing_work = true;
        Self {
            scheduler,
            previous_priority: scheduler.inner.current_priority.get(),
            finished: false,
        }
    }
}

impl Drop for FlushScope<'_> {
    fn drop(&mut self) {
        let inner = &self.scheduler.inner;
        if !self.finished {
            self.scheduler.mark_current_task_errored();
        }
        match inner.state.try_borrow_mut() {
            Ok(mut state) => {
                state.current_task = None;
                state.is_performing_work = false;
            }
            Err(_) => error!("Scheduler state still borrowed after flush, work flags not reset"),
        }
        inner.current_priority.set(self.previous_priority);
        inner.profiler.scheduler_suspended(inner.host.now());
    }
}

/// Decides what happens after a window, even if the flush unwound.
/// Starts out assuming more work, so a failed window gets re-requested.
struct WindowScope<'a> {
    scheduler: &'a Scheduler,
    has_more_work: bool,
}

impl Drop for WindowScope<'_> {
    fn drop(&mut self) {
        if self.has_more_work {
            self.scheduler.schedule_perform_work_until_deadline();
        } else {
            match self.scheduler.inner.state.try_borrow_mut() {
                Ok(mut state) => {
                    state.is_message_loop_running = false;
                    state.has_scheduled_host_callback = false;
                }
                Err(_) => error!("Scheduler state still borrowed after window, loop flags not reset"),
            }
        }
        self.scheduler.inner.policy.end_window();
    }
}

impl Scheduler {
    /// Ask the host for an execution window unless one is already on its way.
    pub(crate) fn request_host_callback(&self) {
        let request = {
            let mut state = self.state_mut();
            state.has_scheduled_host_callback = true;
            if state.is_message_loop_running {
                false
            } else {
                state.is_message_loop_running = true;
                true
            }
        };
        if request {
            self.schedule_perform_work_until_deadline();
        }
    }

    pub(crate) fn schedule_perform_work_until_deadline(&self) {
        let scheduler = self.clone();
        self.inner
            .host
            .request_execution_window(Box::new(move || scheduler.perform_work_until_deadline()));
    }

    pub(crate) fn request_host_timeout(&self, delay: Millis) {
        self.state_mut().is_host_timeout_scheduled = true;
        debug!(delay_ms = delay, "Requesting delayed wake");
        let scheduler = self.clone();
        self.inner.host.request_delayed_wake(
            Box::new(move || {
                let now = scheduler.now();
                scheduler.handle_timeout(now);
            }),
            delay,
        );
    }

    pub(crate) fn cancel_host_timeout(&self) {
        self.state_mut().is_host_timeout_scheduled = false;
        self.inner.host.cancel_delayed_wake();
    }

    /// Body of a granted execution window.
    fn perform_work_until_deadline(&self) -> Result<(), SchedulerError> {
        if !self.state().has_scheduled_host_callback {
            self.state_mut().is_message_loop_running = false;
            self.inner.policy.end_window();
            return Ok(());
        }

        let current_time = self.now();
        self.inner.policy.begin_window(current_time);
        self.state_mut().metrics.windows_granted += 1;
        debug!(now = current_time, deadline = self.inner.policy.deadline(), "Execution window granted");

        let mut window = WindowScope {
            scheduler: self,
            has_more_work: true,
        };
        let result = self.flush_work(true, current_time);
        if let Ok(&more) = result.as_ref() {
            window.has_more_work = more;
            if more {
                self.state_mut().metrics.windows_yielded += 1;
                debug!("Yielding to host with work remaining");
            } else {
                debug!("Task queue drained");
            }
        }
        drop(window);
        result.map(|_| ())
    }

    /// Run queued work for one execution window.
    ///
    /// Returns whether eligible work remains. An error from a task callback
    /// is returned after the task is marked errored; the scheduler's own
    /// bookkeeping is restored either way.
    pub fn flush_work(&self, has_time_remaining: bool, initial_time: Millis) -> Result<bool, SchedulerError> {
        self.inner.profiler.scheduler_resumed(initial_time);

        let timeout_scheduled = {
            let mut state = self.state_mut();
            state.is_host_callback_scheduled = false;
            state.is_host_timeout_scheduled
        };
        if timeout_scheduled {
            self.cancel_host_timeout();
        }

        let mut scope = FlushScope::enter(self);
        let result = self.work_loop(has_time_remaining, initial_time);
        scope.finished = result.is_ok();
        result
    }

    /// The running task failed or panicked: it leaves the queue for good.
    fn mark_current_task_errored(&self) {
        let task = match self.inner.state.try_borrow_mut() {
            Ok(mut state) => {
                state.metrics.tasks_errored += 1;
                state.current_task.clone()
            }
            Err(_) => {
                error!("Scheduler state still borrowed, failed task not marked");
                return;
            }
        };
        if let Some(task) = task {
            self.inner.profiler.task_errored(&task, self.now());
            task.set_queued(false);
        }
    }

    fn refresh_current_task(&self) {
        let mut state = self.state_mut();
        let head = state.task_queue.peek().cloned();
        state.current_task = head;
    }

    pub(crate) fn work_loop(&self, has_time_remaining: bool, initial_time: Millis) -> Result<bool, SchedulerError> {
        let mut current_time = initial_time;
        self.advance_timers(current_time);
        self.refresh_current_task();

        loop {
            let (task, paused) = {
                let state = self.state();
                match state.current_task.clone() {
                    Some(task) => (task, state.is_paused),
                    None => break,
                }
            };
            if paused {
                break;
            }
            if task.expiration_time() > current_time
                && (!has_time_remaining || self.should_yield())
            {
                // Not expired and out of time: leave it at the head.
                break;
            }

            match task.take_callback() {
                Some(callback) => {
                    let priority = task.priority_level();
                    self.inner.current_priority.set(priority);
                    let did_timeout = task.expiration_time() <= current_time;
                    self.inner.profiler.task_run(&task, current_time);
                    trace!(task_id = task.id(), %priority, did_timeout, "Running task");

                    let started_at = current_time;
                    let outcome = callback(did_timeout);
                    current_time = self.now();
                    self.state_mut()
                        .metrics
                        .record_run(priority, current_time - started_at);

                    match outcome {
                        Ok(Step::Continue(continuation)) => {
                            task.set_callback(continuation);
                            self.inner.profiler.task_yielded(&task, current_time);
                            self.state_mut().metrics.continuations += 1;
                        }
                        Ok(Step::Done) => {
                            self.inner.profiler.task_completed(&task, current_time);
                            task.set_queued(false);
                            let mut state = self.state_mut();
                            state.metrics.tasks_completed += 1;
                            if state.task_queue.peek() == Some(&task) {
                                state.task_queue.pop();
                            }
                        }
                        Err(source) => {
                            return Err(SchedulerError::TaskFailed {
                                task_id: task.id(),
                                source,
                            });
                        }
                    }
                    self.advance_timers(current_time);
                }
                None => {
                    // Canceled.
                    self.state_mut().task_queue.pop();
                }
            }
            self.refresh_current_task();
        }

        if self.state().current_task.is_some() {
            return Ok(true);
        }
        let first_timer_start = self.state().timer_queue.peek().map(|t| t.start_time());
        if let Some(start_time) = first_timer_start {
            self.request_host_timeout(start_time - current_time);
        }
        Ok(false)
    }

    /// Whether the running task should hand control back to the host.
    pub fn should_yield(&self) -> bool {
        let host = &self.inner.host;
        let input_pending = if host.supports_input_pending() {
            Some(host.is_input_pending())
        } else {
            None
        };
        self.inner.policy.should_yield(host.now(), input_pending)
    }

    /// Note that the host has something to paint, so the current window
    /// should end at its deadline even without pending input.
    pub fn request_paint(&self) {
        self.inner
            .policy
            .request_paint(self.inner.host.supports_input_pending());
    }

    /// Derive the time slice from a frame rate in `0..=125`. Out-of-range
    /// values are rejected and leave the slice unchanged.
    pub fn force_frame_rate(&self, fps: i32) -> Result<(), SchedulerError> {
        self.inner.policy.force_frame_rate(fps)
    }
}
