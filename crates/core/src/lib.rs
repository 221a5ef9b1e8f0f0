#![forbid(unsafe_code)]

pub mod calendar;
pub mod model;
pub mod scheduler;
pub mod time;

pub use scheduler::{ReviewScheduler, SchedulePolicy, SortKey, ToggleMode};
pub use time::Clock;
