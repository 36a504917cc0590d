//! Durable timer persistence
//!
//! The store is the source of truth for timer state. It owns no behavior
//! beyond load/save/delete/list; serialization of concurrent writes to the
//! same timer is provided by the controller and scheduler lock.

pub mod json_file;
pub mod memory;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::StoreError,
    state::{Timer, TimerId, TimerStatus},
};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Selection criteria for [`TimerStore::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerFilter {
    #[default]
    All,
    Statuses(Vec<TimerStatus>),
    Recipe(String),
}

impl TimerFilter {
    /// Running or paused timers
    pub fn active() -> Self {
        TimerFilter::Statuses(vec![TimerStatus::Running, TimerStatus::Paused])
    }

    pub fn running() -> Self {
        TimerFilter::Statuses(vec![TimerStatus::Running])
    }

    pub fn terminal() -> Self {
        TimerFilter::Statuses(vec![TimerStatus::Finished, TimerStatus::Cancelled])
    }

    pub fn matches(&self, timer: &Timer) -> bool {
        match self {
            TimerFilter::All => true,
            TimerFilter::Statuses(statuses) => statuses.contains(&timer.status),
            TimerFilter::Recipe(recipe_id) => {
                timer.linked_recipe_id.as_deref() == Some(recipe_id.as_str())
            }
        }
    }
}

/// Persistence contract for timers.
///
/// A `save` that returns `Ok` must survive a process restart for durable
/// backends, and must be visible to any later `get`/`list` in this process.
pub trait TimerStore: Send + Sync + 'static {
    fn save(&self, timer: &Timer) -> Result<(), StoreError>;

    fn get(&self, id: TimerId) -> Result<Option<Timer>, StoreError>;

    /// Matching timers ordered by creation time
    fn list(&self, filter: &TimerFilter) -> Result<Vec<Timer>, StoreError>;

    /// Remove a timer, returning whether a record existed
    fn delete(&self, id: TimerId) -> Result<bool, StoreError>;
}

/// Shared handle to a store backend
pub type SharedStore = Arc<dyn TimerStore>;

pub(crate) fn sort_by_creation(timers: &mut [Timer]) {
    timers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn recipe_filter_matches_linked_timers_only() {
        let now = Utc::now();
        let linked = Timer::new("sauce", Duration::from_secs(60), Some("r-1".into()), now).unwrap();
        let loose = Timer::new("rice", Duration::from_secs(60), None, now).unwrap();

        let filter = TimerFilter::Recipe("r-1".into());
        assert!(filter.matches(&linked));
        assert!(!filter.matches(&loose));
        assert!(TimerFilter::All.matches(&loose));
    }

    #[test]
    fn active_filter_covers_running_and_paused() {
        let now = Utc::now();
        let created = Timer::new("rice", Duration::from_secs(60), None, now).unwrap();
        let running = created.clone().start(now).unwrap();

        assert!(!TimerFilter::active().matches(&created));
        assert!(TimerFilter::active().matches(&running));
        assert!(TimerFilter::running().matches(&running));
    }
}
