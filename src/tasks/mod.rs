//! Background tasks module
//!
//! This module contains the tasks that keep timers moving while the host
//! process is alive.

pub mod retention;
pub mod scheduler;

use std::sync::Arc;

use tokio::sync::watch;

pub use retention::retention_task;
pub use scheduler::{ActiveSet, SchedulerConfig, TickReport, TimerScheduler};

/// Background task that drives the shared scheduler tick
pub async fn scheduler_task(scheduler: Arc<TimerScheduler>, shutdown: watch::Receiver<bool>) {
    scheduler.run(shutdown).await;
}
