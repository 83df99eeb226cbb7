use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SchedulerError;
use crate::time::Millis;

/// Highest frame rate accepted by `force_frame_rate`.
pub const MAX_FRAME_RATE: i32 = 125;

/// Default for how long a window may run past its deadline when the host
/// reports no pending input.
pub const MAX_YIELD_INTERVAL_MS: Millis = 300.0;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries YIELDPOINT_{PROFILE}_{KEY} first, falls back
/// to YIELDPOINT_{KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("YIELDPOINT_{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(&format!("YIELDPOINT_{}", key))
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str) -> Option<T> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

/// Scheduler tuning knobs, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Length of one execution window before yielding is considered.
    #[serde(default = "default_yield_interval")]
    pub yield_interval_ms: Millis,
    /// Hard ceiling for a window when the host reports no pending input.
    #[serde(default = "default_max_yield_interval")]
    pub max_yield_interval_ms: Millis,
    /// Optional frame rate applied at startup (0 = default slice).
    #[serde(default)]
    pub frame_rate: Option<i32>,
    /// Consult the host's input-pending probe when it has one.
    #[serde(default = "default_enable_input_pending")]
    pub enable_input_pending: bool,
    /// Record profiling events from the moment the scheduler is created.
    #[serde(default)]
    pub enable_profiling: bool,
    /// Maximum number of profiling events kept in memory.
    #[serde(default = "default_profiling_log_capacity")]
    pub profiling_log_capacity: usize,
}

fn default_yield_interval() -> Millis { 5.0 }
fn default_max_yield_interval() -> Millis { MAX_YIELD_INTERVAL_MS }
fn default_enable_input_pending() -> bool { true }
fn default_profiling_log_capacity() -> usize { 131_072 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            yield_interval_ms: default_yield_interval(),
            max_yield_interval_ms: default_max_yield_interval(),
            frame_rate: None,
            enable_input_pending: default_enable_input_pending(),
            enable_profiling: false,
            profiling_log_capacity: default_profiling_log_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Parse a config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, SchedulerError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        debug!(config_path = %path.display(), "Loading scheduler config");
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides (call `load_dotenv()` first).
    ///
    /// The profile is read from `YIELDPOINT_PROFILE`. When set (e.g. `BENCH`),
    /// every key is first looked up as `YIELDPOINT_{PROFILE}_{KEY}`.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let config = Self::default().with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `YIELDPOINT_*` environment overrides on top of this config.
    pub fn with_env_overrides(mut self) -> Self {
        let profile = env_opt("YIELDPOINT_PROFILE")
            .unwrap_or_default()
            .to_uppercase();
        let p = profile.as_str();

        if let Some(v) = profiled_env_parse(p, "YIELD_INTERVAL_MS") {
            self.yield_interval_ms = v;
        }
        if let Some(v) = profiled_env_parse(p, "MAX_YIELD_INTERVAL_MS") {
            self.max_yield_interval_ms = v;
        }
        if let Some(v) = profiled_env_parse(p, "FRAME_RATE") {
            self.frame_rate = Some(v);
        }
        if let Some(v) = profiled_env_parse(p, "ENABLE_INPUT_PENDING") {
            self.enable_input_pending = v;
        }
        if let Some(v) = profiled_env_parse(p, "ENABLE_PROFILING") {
            self.enable_profiling = v;
        }
        if let Some(v) = profiled_env_parse(p, "PROFILING_LOG_CAPACITY") {
            self.profiling_log_capacity = v;
        }
        self
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !(self.yield_interval_ms > 0.0) {
            return Err(SchedulerError::Config(format!(
                "yield_interval_ms must be positive, got {}",
                self.yield_interval_ms
            )));
        }
        if self.max_yield_interval_ms < self.yield_interval_ms {
            return Err(SchedulerError::Config(format!(
                "max_yield_interval_ms ({}) must not be below yield_interval_ms ({})",
                self.max_yield_interval_ms, self.yield_interval_ms
            )));
        }
        if let Some(fps) = self.frame_rate {
            if !(0..=MAX_FRAME_RATE).contains(&fps) {
                return Err(SchedulerError::InvalidFrameRate(fps));
            }
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        info!("Scheduler config:");
        info!("  yield_interval:     {}ms", self.yield_interval_ms);
        info!("  max_yield_interval: {}ms", self.max_yield_interval_ms);
        info!(
            "  frame_rate:         {}",
            self.frame_rate
                .map(|f| f.to_string())
                .unwrap_or_else(|| "(default)".to_string())
        );
        info!("  input_pending:      {}", self.enable_input_pending);
        info!(
            "  profiling:          {} (capacity {})",
            self.enable_profiling, self.profiling_log_capacity
        );
    }

    /// Config as JSON, for diagnostics output.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "yield_interval_ms": self.yield_interval_ms,
            "max_yield_interval_ms": self.max_yield_interval_ms,
            "frame_rate": self.frame_rate,
            "enable_input_pending": self.enable_input_pending,
            "enable_profiling": self.enable_profiling,
            "profiling_log_capacity": self.profiling_log_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.yield_interval_ms, 5.0);
        assert_eq!(config.max_yield_interval_ms, MAX_YIELD_INTERVAL_MS);
        assert_eq!(MAX_YIELD_INTERVAL_MS, 300.0);
        assert_eq!(config.frame_rate, None);
        assert!(config.enable_input_pending);
        assert!(!config.enable_profiling);
        assert_eq!(config.profiling_log_capacity, 131_072);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = SchedulerConfig::from_toml_str("frame_rate = 60\nenable_profiling = true\n").unwrap();
        assert_eq!(config.frame_rate, Some(60));
        assert!(config.enable_profiling);
        assert_eq!(config.yield_interval_ms, 5.0);
    }

    #[test]
    fn out_of_range_frame_rate_is_rejected() {
        let err = SchedulerConfig::from_toml_str("frame_rate = 200").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidFrameRate(200)));
    }

    #[test]
    fn ceiling_below_slice_is_rejected() {
        let err = SchedulerConfig::from_toml_str(
            "yield_interval_ms = 50.0\nmax_yield_interval_ms = 10.0",
        )
        .unwrap_err();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = SchedulerConfig::from_toml_str("yield_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, SchedulerError::ConfigParse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "yield_interval_ms = 8.0").unwrap();
        writeln!(file, "enable_input_pending = false").unwrap();

        let config = SchedulerConfig::load(file.path()).unwrap();
        assert_eq!(config.yield_interval_ms, 8.0);
        assert!(!config.enable_input_pending);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchedulerConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, SchedulerError::Io(_)));
    }

    #[test]
    fn summary_reports_all_fields() {
        let summary = SchedulerConfig::default().summary();
        assert_eq!(summary["yield_interval_ms"], 5.0);
        assert_eq!(summary["max_yield_interval_ms"], 300.0);
        assert!(summary["frame_rate"].is_null());
    }
}
