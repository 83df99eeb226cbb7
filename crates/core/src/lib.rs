pub mod capability;
pub mod config;
pub mod error;
pub mod time;

pub use config::SchedulerConfig;
pub use error::*;
pub use time::{Millis, MonotonicClock};
