//! Cron-driven rotation scheduler for fanlog file sinks.

pub mod rotation;

pub use rotation::{DAILY, Rotatable, RotationScheduler};
