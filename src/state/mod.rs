//! State management module
//!
//! This module contains the timer entity with its transition rules and the
//! shared state handed to the HTTP host.

pub mod app_state;
pub mod timer;

// Re-export main types
pub use app_state::AppState;
pub use timer::{Recomputed, Timer, TimerId, TimerStatus};
