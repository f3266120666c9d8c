//! Scheduling of index rebuilds and photo deliveries.

mod jitter;
mod schedule;
mod service;

pub use jitter::JitterPolicy;
pub use schedule::DeliverySchedule;
pub use service::{Scheduler, SchedulerConfig, TimerState};
