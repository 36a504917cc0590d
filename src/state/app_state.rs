//! Shared state of the host process

use std::{sync::Arc, time::Instant};

use crate::{controller::TimerController, notifier::Notifier, tasks::TimerScheduler};

/// State shared by every HTTP handler
pub struct AppState {
    pub controller: Arc<TimerController>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
}

impl AppState {
    pub fn new(controller: Arc<TimerController>, port: u16, host: String) -> Self {
        Self {
            controller,
            start_time: Instant::now(),
            port,
            host,
        }
    }

    pub fn scheduler(&self) -> &Arc<TimerScheduler> {
        self.controller.scheduler()
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        self.scheduler().notifier()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        format_duration_secs(self.start_time.elapsed().as_secs())
    }
}

/// Render seconds as `1h 2m 3s`, omitting leading zero units
pub fn format_duration_secs(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
