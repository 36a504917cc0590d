//! In-process timer store

use std::{collections::HashMap, sync::RwLock};

use super::{sort_by_creation, TimerFilter, TimerStore};
use crate::{
    error::StoreError,
    state::{Timer, TimerId},
};

/// Volatile store backed by a hash map. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    timers: RwLock<HashMap<TimerId, Timer>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.timers.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Unavailable(format!("Failed to lock timer map: {}", e))
}

impl TimerStore for MemoryStore {
    fn save(&self, timer: &Timer) -> Result<(), StoreError> {
        let mut timers = self.timers.write().map_err(poisoned)?;
        timers.insert(timer.id, timer.clone());
        Ok(())
    }

    fn get(&self, id: TimerId) -> Result<Option<Timer>, StoreError> {
        let timers = self.timers.read().map_err(poisoned)?;
        Ok(timers.get(&id).cloned())
    }

    fn list(&self, filter: &TimerFilter) -> Result<Vec<Timer>, StoreError> {
        let timers = self.timers.read().map_err(poisoned)?;
        let mut matching: Vec<Timer> = timers
            .values()
            .filter(|timer| filter.matches(timer))
            .cloned()
            .collect();
        drop(timers);

        sort_by_creation(&mut matching);
        Ok(matching)
    }

    fn delete(&self, id: TimerId) -> Result<bool, StoreError> {
        let mut timers = self.timers.write().map_err(poisoned)?;
        Ok(timers.remove(&id).is_some())
    }
}
