use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use yieldpoint_core::Millis;

use crate::priority::PriorityLevel;

/// Scheduler operational counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    pub tasks_scheduled: u64,
    pub tasks_completed: u64,
    pub tasks_canceled: u64,
    pub tasks_errored: u64,
    /// Callbacks that returned a continuation.
    pub continuations: u64,
    /// Execution windows the host granted.
    pub windows_granted: u64,
    /// Windows that ended with work still pending.
    pub windows_yielded: u64,
    /// Delayed wakes delivered by the host.
    pub delayed_wakes: u64,
    /// Callback invocations per priority level.
    pub runs_by_priority: HashMap<PriorityLevel, u64>,
    /// Mean callback duration per priority level, in milliseconds.
    pub avg_run_ms: HashMap<PriorityLevel, Millis>,
    /// Wall-clock time of the most recent callback invocation.
    pub last_run: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    /// Record one callback invocation.
    pub fn record_run(&mut self, priority: PriorityLevel, duration: Millis) {
        let count = {
            let runs = self.runs_by_priority.entry(priority).or_default();
            *runs += 1;
            *runs
        };
        self.last_run = Some(Utc::now());

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let prev_avg = self.avg_run_ms.get(&priority).copied().unwrap_or_default();
        let new_avg = if count == 1 {
            duration
        } else {
            prev_avg + (duration - prev_avg) / count as f64
        };
        self.avg_run_ms.insert(priority, new_avg);
    }

    /// Total callback invocations across all priorities.
    pub fn total_runs(&self) -> u64 {
        self.runs_by_priority.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_single_run() {
        let mut m = SchedulerMetrics::default();
        m.record_run(PriorityLevel::Normal, 4.0);

        assert_eq!(m.runs_by_priority[&PriorityLevel::Normal], 1);
        assert!(m.last_run.is_some());
        assert_eq!(m.avg_run_ms[&PriorityLevel::Normal], 4.0);
    }

    #[test]
    fn record_multiple_runs_averages() {
        let mut m = SchedulerMetrics::default();
        m.record_run(PriorityLevel::Low, 2.0);
        m.record_run(PriorityLevel::Low, 4.0);
        m.record_run(PriorityLevel::Idle, 10.0);

        assert_eq!(m.runs_by_priority[&PriorityLevel::Low], 2);
        assert!((m.avg_run_ms[&PriorityLevel::Low] - 3.0).abs() < 1e-9);
        assert_eq!(m.total_runs(), 3);
    }

    #[test]
    fn default_metrics() {
        let m = SchedulerMetrics::default();
        assert_eq!(m.tasks_scheduled, 0);
        assert_eq!(m.windows_granted, 0);
        assert!(m.runs_by_priority.is_empty());
        assert!(m.last_run.is_none());
    }

    #[test]
    fn metrics_serialize_with_priority_keys() {
        let mut m = SchedulerMetrics::default();
        m.record_run(PriorityLevel::UserBlocking, 1.0);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["runs_by_priority"]["user_blocking"], 1);
    }
}
