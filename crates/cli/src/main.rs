mod cli;
mod workload;

use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use yieldpoint_core::config::load_dotenv;
use yieldpoint_core::SchedulerConfig;
use yieldpoint_scheduler::{ProfilingEvent, Scheduler, SchedulerMetrics, ThreadHost, TracingProfiler};

use crate::cli::CliArgs;
use crate::workload::{Work, Workload, WorkloadPlan, WorkloadSummary};

#[derive(Serialize)]
struct Report {
    elapsed_ms: f64,
    window_errors: usize,
    config: serde_json::Value,
    workload: WorkloadSummary,
    metrics: SchedulerMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    profiling: Option<Vec<ProfilingEvent>>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    load_dotenv();

    let mut config = match &args.config {
        Some(path) => SchedulerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SchedulerConfig::from_env().context("failed to read config from environment")?,
    };
    if args.frame_rate.is_some() {
        config.frame_rate = args.frame_rate;
    }
    if args.profile {
        config.enable_profiling = true;
    }
    config.log_summary();

    let host = Rc::new(ThreadHost::new());
    let mut builder = Scheduler::builder(host.clone());
    if !config.enable_profiling {
        // Per-task transitions show up under RUST_LOG=trace.
        builder = builder.profiler(Rc::new(TracingProfiler));
    }
    let scheduler = builder
        .config(config)
        .build()
        .context("failed to build scheduler")?;

    let plan = WorkloadPlan {
        tasks: args.tasks,
        max_chunks: args.chunks,
        chunk_ms: args.chunk_ms,
        max_delay_ms: args.max_delay_ms,
        cancel_ratio: 0.1,
        seed: args.seed,
    };
    let work: Work = Rc::new(busy_wait);

    let started = Instant::now();
    let workload = Workload::schedule(&scheduler, &plan, work);
    info!(tasks = plan.tasks, seed = plan.seed, "Workload scheduled");

    let errors = host.run_until_idle();
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if !errors.is_empty() {
        warn!(count = errors.len(), "Some execution windows ended with an error");
    }
    let unfinished = workload.unfinished();
    if unfinished > 0 {
        warn!(unfinished, "Host went idle with tasks still pending");
    }
    info!(elapsed_ms, "Workload drained");

    let report = Report {
        elapsed_ms,
        window_errors: errors.len(),
        config: scheduler.config().summary(),
        workload: workload.finish(),
        metrics: scheduler.metrics(),
        profiling: scheduler.profiling_log().map(|log| log.stop_logging()),
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    println!("{}", json);

    Ok(())
}

/// Spin for `ms` so chunks cost real time on the thread host.
fn busy_wait(ms: f64) {
    let until = Instant::now() + Duration::from_secs_f64(ms.max(0.0) / 1000.0);
    while Instant::now() < until {
        std::hint::spin_loop();
    }
}
