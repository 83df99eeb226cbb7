use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use tracing::info;
use yieldpoint_core::{Millis, SchedulerConfig, SchedulerError};

use crate::heap::MinHeap;
use crate::host::{Host, YieldPolicy};
use crate::metrics::SchedulerMetrics;
use crate::priority::PriorityLevel;
use crate::profiling::{EventLogProfiler, NoopProfiler, Profiler};
use crate::task::TaskHandle;

/// Mutable bookkeeping. Never borrowed across a task callback.
#[derive(Default)]
pub(super) struct SchedulerState {
    /// Eligible tasks, ordered by expiration time.
    pub(super) task_queue: MinHeap<TaskHandle>,
    /// Delayed tasks, ordered by start time.
    pub(super) timer_queue: MinHeap<TaskHandle>,
    pub(super) task_id_counter: u64,
    /// Head of the task queue while a flush is running.
    pub(super) current_task: Option<TaskHandle>,
    pub(super) is_paused: bool,
    /// Re-entrancy guard for flush_work.
    pub(super) is_performing_work: bool,
    /// The core has asked the adapter for a window it has not started yet.
    pub(super) is_host_callback_scheduled: bool,
    pub(super) is_host_timeout_scheduled: bool,
    /// Adapter side: the core wants windows.
    pub(super) has_scheduled_host_callback: bool,
    /// Adapter side: a window request is outstanding with the host.
    pub(super) is_message_loop_running: bool,
    pub(super) metrics: SchedulerMetrics,
}

pub(super) struct Inner {
    pub(super) host: Rc<dyn Host>,
    pub(super) config: SchedulerConfig,
    pub(super) policy: YieldPolicy,
    pub(super) profiler: Rc<dyn Profiler>,
    pub(super) event_log: Option<Rc<EventLogProfiler>>,
    pub(super) current_priority: Cell<PriorityLevel>,
    pub(super) state: RefCell<SchedulerState>,
}

/// Cooperative priority scheduler bound to one [`Host`].
///
/// Cheap to clone; every clone drives the same queues. Task callbacks may
/// capture a clone and call back into any operation while they run.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) inner: Rc<Inner>,
}

/// Builder for a [`Scheduler`] with non-default config or profiler.
pub struct SchedulerBuilder {
    host: Rc<dyn Host>,
    config: SchedulerConfig,
    profiler: Option<Rc<dyn Profiler>>,
}

impl SchedulerBuilder {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the profiler. Takes precedence over `enable_profiling`.
    pub fn profiler(mut self, profiler: Rc<dyn Profiler>) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        self.config.validate()?;

        let policy = YieldPolicy::from_config(&self.config);
        if let Some(fps) = self.config.frame_rate {
            policy.force_frame_rate(fps)?;
        }

        let (profiler, event_log) = match self.profiler {
            Some(profiler) => (profiler, None),
            None if self.config.enable_profiling => {
                let log = Rc::new(EventLogProfiler::new(self.config.profiling_log_capacity));
                log.start_logging();
                (log.clone() as Rc<dyn Profiler>, Some(log))
            }
            None => (Rc::new(NoopProfiler) as Rc<dyn Profiler>, None),
        };

        info!(
            yield_interval_ms = policy.yield_interval(),
            profiling = event_log.is_some(),
            "Scheduler created"
        );

        Ok(Scheduler {
            inner: Rc::new(Inner {
                host: self.host,
                config: self.config,
                policy,
                profiler,
                event_log,
                current_priority: Cell::new(PriorityLevel::Normal),
                state: RefCell::new(SchedulerState::default()),
            }),
        })
    }
}

impl Scheduler {
    /// Create a scheduler with the default config and no profiling.
    pub fn new(host: Rc<dyn Host>) -> Self {
        let config = SchedulerConfig::default();
        Self {
            inner: Rc::new(Inner {
                host,
                policy: YieldPolicy::from_config(&config),
                config,
                profiler: Rc::new(NoopProfiler),
                event_log: None,
                current_priority: Cell::new(PriorityLevel::Normal),
                state: RefCell::new(SchedulerState::default()),
            }),
        }
    }

    pub fn builder(host: Rc<dyn Host>) -> SchedulerBuilder {
        SchedulerBuilder {
            host,
            config: SchedulerConfig::default(),
            profiler: None,
        }
    }

    pub(super) fn state(&self) -> Ref<'_, SchedulerState> {
        self.inner.state.borrow()
    }

    pub(super) fn state_mut(&self) -> RefMut<'_, SchedulerState> {
        self.inner.state.borrow_mut()
    }

    /// Current time on the host clock.
    pub fn now(&self) -> Millis {
        self.inner.host.now()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn yield_policy(&self) -> &YieldPolicy {
        &self.inner.policy
    }

    /// Snapshot of the scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.state().metrics.clone()
    }

    /// The built-in profiling log, present when `enable_profiling` was set.
    pub fn profiling_log(&self) -> Option<Rc<EventLogProfiler>> {
        self.inner.event_log.clone()
    }

    /// Tasks in the eligible queue, including not yet reaped cancellations.
    pub fn pending_task_count(&self) -> usize {
        self.state().task_queue.len()
    }

    /// Tasks still waiting for their start time.
    pub fn pending_timer_count(&self) -> usize {
        self.state().timer_queue.len()
    }

    pub fn is_paused(&self) -> bool {
        self.state().is_paused
    }

    pub fn is_performing_work(&self) -> bool {
        self.state().is_performing_work
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Scheduler")
            .field("task_queue", &state.task_queue.len())
            .field("timer_queue", &state.timer_queue.len())
            .field("is_paused", &state.is_paused)
            .field("is_performing_work", &state.is_performing_work)
            .field("current_priority", &self.inner.current_priority.get())
            .finish()
    }
}
