use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;
use yieldpoint_scheduler::{PriorityLevel, ScheduleOptions, Scheduler, Step, TaskCallback, TaskHandle};

/// Shape of a generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadPlan {
    pub tasks: usize,
    pub max_chunks: u32,
    pub chunk_ms: f64,
    pub max_delay_ms: f64,
    /// Share of tasks canceled right after scheduling, in `0.0..=1.0`.
    pub cancel_ratio: f64,
    pub seed: u64,
}

/// Simulated cost of one chunk of work, in milliseconds.
pub type Work = Rc<dyn Fn(f64)>;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct WorkloadSummary {
    pub tasks_scheduled: usize,
    pub tasks_canceled: usize,
    pub tasks_delayed: usize,
    pub chunks_planned: u64,
    pub chunks_run: u64,
    pub by_priority: BTreeMap<String, usize>,
}

/// Tasks generated from a [`WorkloadPlan`] and queued on a scheduler.
pub struct Workload {
    handles: Vec<TaskHandle>,
    chunks_run: Rc<Cell<u64>>,
    summary: WorkloadSummary,
}

impl Workload {
    pub fn schedule(scheduler: &Scheduler, plan: &WorkloadPlan, work: Work) -> Self {
        let mut rng = StdRng::seed_from_u64(plan.seed);
        let chunks_run = Rc::new(Cell::new(0));
        let mut summary = WorkloadSummary::default();
        let mut handles = Vec::with_capacity(plan.tasks);
        let mut planned = Vec::with_capacity(plan.tasks);

        for _ in 0..plan.tasks {
            let level = PriorityLevel::ALL[rng.gen_range(0..PriorityLevel::ALL.len())];
            let chunks = rng.gen_range(1..=plan.max_chunks.max(1));
            let delay = if plan.max_delay_ms > 0.0 && rng.gen_bool(0.3) {
                summary.tasks_delayed += 1;
                rng.gen_range(0.0..plan.max_delay_ms)
            } else {
                0.0
            };

            let callback = chunked_task(
                scheduler.clone(),
                chunks,
                plan.chunk_ms,
                Rc::clone(&work),
                Rc::clone(&chunks_run),
            );
            let handle = scheduler.schedule_callback_with_options(level, callback, ScheduleOptions::delay(delay));
            *summary.by_priority.entry(level.to_string()).or_insert(0) += 1;
            handles.push(handle);
            planned.push(chunks);
        }
        summary.tasks_scheduled = handles.len();

        let cancel_ratio = plan.cancel_ratio.clamp(0.0, 1.0);
        for (handle, chunks) in handles.iter().zip(planned) {
            if rng.gen_bool(cancel_ratio) {
                scheduler.cancel_callback(handle);
                summary.tasks_canceled += 1;
            } else {
                summary.chunks_planned += u64::from(chunks);
            }
        }

        debug!(
            tasks = summary.tasks_scheduled,
            canceled = summary.tasks_canceled,
            delayed = summary.tasks_delayed,
            "Workload generated"
        );

        Self {
            handles,
            chunks_run,
            summary,
        }
    }

    /// Tasks still holding a callback: not finished and not canceled.
    pub fn unfinished(&self) -> usize {
        self.handles.iter().filter(|h| h.has_callback()).count()
    }

    pub fn finish(self) -> WorkloadSummary {
        WorkloadSummary {
            chunks_run: self.chunks_run.get(),
            ..self.summary
        }
    }
}

/// A task that runs `remaining` chunks, checking between chunks whether the
/// window is spent. Expired tasks push through without checking.
fn chunked_task(
    scheduler: Scheduler,
    remaining: u32,
    chunk_ms: f64,
    work: Work,
    chunks_run: Rc<Cell<u64>>,
) -> TaskCallback {
    Box::new(move |did_timeout| {
        let mut remaining = remaining;
        while remaining > 0 {
            work(chunk_ms);
            chunks_run.set(chunks_run.get() + 1);
            remaining -= 1;
            if remaining > 0 && !did_timeout && scheduler.should_yield() {
                let rest = chunked_task(scheduler, remaining, chunk_ms, work, chunks_run);
                return Ok(Step::continue_with(rest));
            }
        }
        Ok(Step::Done)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use yieldpoint_scheduler::VirtualHost;

    fn virtual_work(host: &Rc<VirtualHost>) -> Work {
        let host = Rc::clone(host);
        Rc::new(move |ms| host.advance(ms))
    }

    fn plan_for(seed: u64) -> WorkloadPlan {
        WorkloadPlan {
            tasks: 40,
            max_chunks: 5,
            chunk_ms: 2.0,
            max_delay_ms: 50.0,
            cancel_ratio: 0.2,
            seed,
        }
    }

    #[test]
    fn every_live_chunk_runs() {
        let host = Rc::new(VirtualHost::new());
        let scheduler = Scheduler::new(host.clone());
        let workload = Workload::schedule(&scheduler, &plan_for(7), virtual_work(&host));

        let errors = host.run_until_idle(10_000);
        assert!(errors.is_empty());
        assert_eq!(workload.unfinished(), 0);

        let summary = workload.finish();
        assert_eq!(summary.tasks_scheduled, 40);
        assert_eq!(summary.chunks_run, summary.chunks_planned);
        assert_eq!(
            scheduler.metrics().tasks_completed as usize,
            summary.tasks_scheduled - summary.tasks_canceled
        );
        assert_eq!(summary.by_priority.values().sum::<usize>(), 40);
    }

    #[test]
    fn same_seed_same_workload() {
        let plan = |seed| {
            let host = Rc::new(VirtualHost::new());
            let scheduler = Scheduler::new(host.clone());
            Workload::schedule(&scheduler, &plan_for(seed), virtual_work(&host)).finish()
        };
        assert_eq!(plan(3), plan(3));
    }

    #[test]
    fn chunked_task_yields_when_slice_is_spent() {
        let host = Rc::new(VirtualHost::new());
        let scheduler = Scheduler::new(host.clone());
        let counter = Rc::new(Cell::new(0));
        let task = chunked_task(scheduler.clone(), 4, 3.0, virtual_work(&host), Rc::clone(&counter));
        scheduler.schedule_callback(PriorityLevel::Normal, task);

        host.run_window();
        assert_eq!(counter.get(), 2);
        assert!(host.has_pending_window());

        host.run_until_idle(8);
        assert_eq!(counter.get(), 4);
        assert_eq!(scheduler.metrics().continuations, 1);
    }

    #[test]
    fn expired_task_runs_all_chunks_at_once() {
        let host = Rc::new(VirtualHost::new());
        let scheduler = Scheduler::new(host.clone());
        let counter = Rc::new(Cell::new(0));
        let task = chunked_task(scheduler.clone(), 4, 3.0, virtual_work(&host), Rc::clone(&counter));
        scheduler.schedule_callback(PriorityLevel::Immediate, task);

        host.run_window();
        assert_eq!(counter.get(), 4);
        assert_eq!(scheduler.metrics().continuations, 0);
    }
}
