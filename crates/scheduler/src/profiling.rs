//! Profiling hook invoked at scheduler transitions.
//!
//! The scheduler always talks to a [`Profiler`]; the default is
//! [`NoopProfiler`]. [`EventLogProfiler`] keeps an in-memory event log that
//! can be started and stopped at runtime, and [`TracingProfiler`] forwards
//! every transition to `tracing`.

use std::cell::{Cell, RefCell};

use serde::Serialize;
use tracing::{error, trace};
use yieldpoint_core::Millis;

use crate::priority::PriorityLevel;
use crate::task::TaskHandle;

/// Receives scheduler transitions. Every method defaults to a no-op.
pub trait Profiler {
    /// Task entered the eligible queue.
    fn task_started(&self, _task: &TaskHandle, _now: Millis) {}
    fn task_run(&self, _task: &TaskHandle, _now: Millis) {}
    /// Task returned a continuation.
    fn task_yielded(&self, _task: &TaskHandle, _now: Millis) {}
    fn task_completed(&self, _task: &TaskHandle, _now: Millis) {}
    fn task_canceled(&self, _task: &TaskHandle, _now: Millis) {}
    fn task_errored(&self, _task: &TaskHandle, _now: Millis) {}
    /// An execution window ended.
    fn scheduler_suspended(&self, _now: Millis) {}
    /// An execution window began.
    fn scheduler_resumed(&self, _now: Millis) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProfiler;

impl Profiler for NoopProfiler {}

/// Emits a `trace!` event per transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProfiler;

impl Profiler for TracingProfiler {
    fn task_started(&self, task: &TaskHandle, now: Millis) {
        trace!(task_id = task.id(), priority = %task.priority_level(), now, "task queued");
    }

    fn task_run(&self, task: &TaskHandle, now: Millis) {
        trace!(task_id = task.id(), now, "task run");
    }

    fn task_yielded(&self, task: &TaskHandle, now: Millis) {
        trace!(task_id = task.id(), now, "task yielded");
    }

    fn task_completed(&self, task: &TaskHandle, now: Millis) {
        trace!(task_id = task.id(), now, "task completed");
    }

    fn task_canceled(&self, task: &TaskHandle, now: Millis) {
        trace!(task_id = task.id(), now, "task canceled");
    }

    fn task_errored(&self, task: &TaskHandle, now: Millis) {
        trace!(task_id = task.id(), now, "task errored");
    }

    fn scheduler_suspended(&self, now: Millis) {
        trace!(now, "scheduler suspended");
    }

    fn scheduler_resumed(&self, now: Millis) {
        trace!(now, "scheduler resumed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfilingEventKind {
    TaskStart,
    TaskComplete,
    TaskError,
    TaskCancel,
    TaskRun,
    TaskYield,
    SchedulerSuspend,
    SchedulerResume,
}

/// One entry of the profiling log. Timestamps are in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilingEvent {
    pub kind: ProfilingEventKind,
    pub time_us: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<PriorityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_thread_id: Option<u64>,
}

impl ProfilingEvent {
    fn new(kind: ProfilingEventKind, now: Millis) -> Self {
        Self {
            kind,
            time_us: (now * 1000.0) as i64,
            task_id: None,
            priority: None,
            run_id: None,
            main_thread_id: None,
        }
    }

    fn for_task(kind: ProfilingEventKind, task: &TaskHandle, now: Millis) -> Self {
        Self {
            task_id: Some(task.id()),
            ..Self::new(kind, now)
        }
    }
}

/// In-memory profiling log.
///
/// Run ids count task invocations and main thread ids count suspensions,
/// both across the lifetime of the profiler. Logging stops by itself once
/// `capacity` events have been recorded.
#[derive(Debug)]
pub struct EventLogProfiler {
    capacity: usize,
    log: RefCell<Option<Vec<ProfilingEvent>>>,
    run_id_counter: Cell<u64>,
    main_thread_id_counter: Cell<u64>,
}

impl EventLogProfiler {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            log: RefCell::new(None),
            run_id_counter: Cell::new(0),
            main_thread_id_counter: Cell::new(0),
        }
    }

    /// Begin recording, discarding anything recorded before.
    pub fn start_logging(&self) {
        *self.log.borrow_mut() = Some(Vec::new());
    }

    /// Stop recording and hand back the events logged so far.
    pub fn stop_logging(&self) -> Vec<ProfilingEvent> {
        self.log.borrow_mut().take().unwrap_or_default()
    }

    pub fn is_logging(&self) -> bool {
        self.log.borrow().is_some()
    }

    fn record(&self, event: ProfilingEvent) {
        let mut log = self.log.borrow_mut();
        let overflowed = match log.as_mut() {
            None => return,
            Some(events) if events.len() >= self.capacity => true,
            Some(events) => {
                events.push(event);
                false
            }
        };
        if overflowed {
            error!(
                capacity = self.capacity,
                "Scheduler profiling log exceeded its capacity, logging stopped"
            );
            *log = None;
        }
    }
}

impl Profiler for EventLogProfiler {
    fn task_started(&self, task: &TaskHandle, now: Millis) {
        self.record(ProfilingEvent {
            priority: Some(task.priority_level()),
            ..ProfilingEvent::for_task(ProfilingEventKind::TaskStart, task, now)
        });
    }

    fn task_run(&self, task: &TaskHandle, now: Millis) {
        self.run_id_counter.set(self.run_id_counter.get() + 1);
        self.record(ProfilingEvent {
            run_id: Some(self.run_id_counter.get()),
            ..ProfilingEvent::for_task(ProfilingEventKind::TaskRun, task, now)
        });
    }

    fn task_yielded(&self, task: &TaskHandle, now: Millis) {
        self.record(ProfilingEvent {
            run_id: Some(self.run_id_counter.get()),
            ..ProfilingEvent::for_task(ProfilingEventKind::TaskYield, task, now)
        });
    }

    fn task_completed(&self, task: &TaskHandle, now: Millis) {
        self.record(ProfilingEvent::for_task(ProfilingEventKind::TaskComplete, task, now));
    }

    fn task_canceled(&self, task: &TaskHandle, now: Millis) {
        self.record(ProfilingEvent::for_task(ProfilingEventKind::TaskCancel, task, now));
    }

    fn task_errored(&self, task: &TaskHandle, now: Millis) {
        self.record(ProfilingEvent::for_task(ProfilingEventKind::TaskError, task, now));
    }

    fn scheduler_suspended(&self, now: Millis) {
        self.main_thread_id_counter
            .set(self.main_thread_id_counter.get() + 1);
        self.record(ProfilingEvent {
            main_thread_id: Some(self.main_thread_id_counter.get()),
            ..ProfilingEvent::new(ProfilingEventKind::SchedulerSuspend, now)
        });
    }

    fn scheduler_resumed(&self, now: Millis) {
        self.record(ProfilingEvent {
            main_thread_id: Some(self.main_thread_id_counter.get()),
            ..ProfilingEvent::new(ProfilingEventKind::SchedulerResume, now)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Step;

    fn task(id: u64) -> TaskHandle {
        TaskHandle::new(id, PriorityLevel::Low, 0.0, Box::new(|_| Ok(Step::Done)))
    }

    #[test]
    fn records_nothing_until_started() {
        let profiler = EventLogProfiler::new(16);
        profiler.task_started(&task(1), 1.0);
        assert!(!profiler.is_logging());
        assert!(profiler.stop_logging().is_empty());
    }

    #[test]
    fn records_typed_events_with_microsecond_times() {
        let profiler = EventLogProfiler::new(16);
        profiler.start_logging();
        let t = task(4);
        profiler.task_started(&t, 1.5);
        profiler.task_run(&t, 2.0);
        profiler.task_yielded(&t, 3.0);
        profiler.scheduler_suspended(3.25);

        let events = profiler.stop_logging();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].kind, ProfilingEventKind::TaskStart);
        assert_eq!(events[0].time_us, 1500);
        assert_eq!(events[0].priority, Some(PriorityLevel::Low));
        assert_eq!(events[1].run_id, Some(1));
        assert_eq!(events[2].kind, ProfilingEventKind::TaskYield);
        assert_eq!(events[2].run_id, Some(1));
        assert_eq!(events[3].main_thread_id, Some(1));
        assert!(!profiler.is_logging());
    }

    #[test]
    fn overflow_stops_logging() {
        let profiler = EventLogProfiler::new(2);
        profiler.start_logging();
        let t = task(1);
        profiler.task_run(&t, 0.0);
        profiler.task_completed(&t, 0.0);
        assert!(profiler.is_logging());
        profiler.task_run(&t, 0.0);
        assert!(!profiler.is_logging());
        assert!(profiler.stop_logging().is_empty());
    }

    #[test]
    fn events_serialize_without_empty_fields() {
        let event = ProfilingEvent::new(ProfilingEventKind::SchedulerResume, 2.0);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "scheduler_resume");
        assert_eq!(json["time_us"], 2000);
        assert!(json.get("task_id").is_none());
    }
}
