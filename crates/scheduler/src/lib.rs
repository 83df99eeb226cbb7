//! Cooperative, priority-driven task scheduler.
//!
//! Work is queued as [`TaskHandle`]s ordered by expiration time and run on
//! the host's thread in short execution windows. A callback that still has
//! work left returns a continuation ([`Step::Continue`]) and is resumed in a
//! later window, so the host stays responsive in between.
//!
//! ```
//! use std::rc::Rc;
//! use yieldpoint_scheduler::{PriorityLevel, Scheduler, Step, VirtualHost};
//!
//! let host = Rc::new(VirtualHost::new());
//! let scheduler = Scheduler::new(host.clone());
//! scheduler.schedule_callback(PriorityLevel::Normal, |_did_timeout| Ok(Step::Done));
//! host.run_until_idle(16);
//! assert!(scheduler.first_callback_node().is_none());
//! ```

pub mod heap;
pub mod host;
pub mod metrics;
pub mod priority;
pub mod profiling;
pub mod runner;
pub mod task;

pub use host::{Host, ThreadHost, VirtualHost, YieldPolicy};
pub use metrics::SchedulerMetrics;
pub use priority::PriorityLevel;
pub use profiling::{EventLogProfiler, NoopProfiler, Profiler, ProfilingEvent, ProfilingEventKind, TracingProfiler};
pub use runner::{PriorityScope, ScheduleOptions, Scheduler, SchedulerBuilder};
pub use task::{CallbackResult, Step, TaskCallback, TaskHandle};
pub use yieldpoint_core::{Millis, SchedulerConfig, SchedulerError, TaskError};
