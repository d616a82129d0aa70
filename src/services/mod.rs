//! Services built on the material and timeline layers.

pub mod scheduler;

pub use scheduler::{InstanceScheduler, ScheduleError, ScheduledInstance};
