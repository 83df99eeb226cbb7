use std::path::PathBuf;

use clap::Parser;

/// Run a synthetic workload through the yieldpoint scheduler.
///
/// Tasks of mixed priority are split into chunks of busy work; each task
/// checks `should_yield` between chunks and hands back a continuation when
/// its slice is spent. Metrics are printed as JSON when the queue drains.
#[derive(Parser, Debug)]
#[command(name = "yieldpoint", about = "Cooperative priority scheduler workload runner")]
pub struct CliArgs {
    /// Path to a TOML scheduler config (env overrides still apply)
    #[arg(long, env = "YIELDPOINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of tasks to schedule
    #[arg(long, default_value = "100")]
    pub tasks: usize,

    /// Maximum chunks of work per task
    #[arg(long, default_value = "4")]
    pub chunks: u32,

    /// Busy work per chunk, in milliseconds
    #[arg(long, default_value = "1.5")]
    pub chunk_ms: f64,

    /// Upper bound for the random start delay; 0 schedules everything at once
    #[arg(long, default_value = "20")]
    pub max_delay_ms: f64,

    /// Force a frame rate (0..=125, 0 resets to the configured slice)
    #[arg(long)]
    pub frame_rate: Option<i32>,

    /// Record and print the profiling event log
    #[arg(long)]
    pub profile: bool,

    /// Seed for the workload generator
    #[arg(long, default_value = "1", env = "YIELDPOINT_SEED")]
    pub seed: u64,
}
