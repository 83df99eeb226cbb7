use thiserror::Error;

/// Errors surfaced by the scheduler and its configuration layer.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("force_frame_rate takes a value between 0 and 125, got {0}")]
    InvalidFrameRate(i32),

    #[error("task {task_id} failed: {source}")]
    TaskFailed {
        task_id: u64,
        #[source]
        source: TaskError,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by a task callback.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task failed: {0}")]
    Failed(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
