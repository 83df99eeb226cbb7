//! Scheduler runner -- the execution core and its host adapter.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, builder, shared state and accessors
//! - `queues`: timer promotion and delayed-wake handling
//! - `execution`: execution windows, flush and the work loop
//! - `scheduling`: schedule / cancel / pause public operations
//! - `context`: ambient priority scopes

mod context;
mod core;
mod execution;
mod queues;
mod scheduling;

pub use self::context::PriorityScope;
pub use self::core::{Scheduler, SchedulerBuilder};
pub use self::scheduling::ScheduleOptions;
