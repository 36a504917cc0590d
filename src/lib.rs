//! Kitchen Timers - durable countdown timers driven by a shared tick
//!
//! Timers are created and driven through [`TimerController`], persisted by a
//! [`TimerStore`](store::TimerStore), kept current by one periodic
//! [`TimerScheduler`] tick, and announced to subscribers by the [`Notifier`].
//! Remaining time is always derived from wall-clock timestamps, so timers
//! keep counting while the process is stopped and resume correctly after a
//! restart.

pub mod api;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod notifier;
pub mod state;
pub mod store;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use controller::{ControllerConfig, TimerController};
pub use error::{Operation, Result, StoreError, TimerError};
pub use notifier::{Notifier, TimerEvent};
pub use state::{AppState, Timer, TimerId, TimerStatus};
pub use store::{JsonFileStore, MemoryStore, TimerFilter, TimerStore};
pub use tasks::{SchedulerConfig, TimerScheduler};
pub use utils::signals::shutdown_signal;
