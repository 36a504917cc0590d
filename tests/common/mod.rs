#![allow(dead_code)]

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{TimeZone, Utc};
use kitchen_timers::{
    store::SharedStore, ControllerConfig, ManualClock, MemoryStore, Notifier, SchedulerConfig,
    StoreError, Timer, TimerController, TimerFilter, TimerId, TimerScheduler, TimerStore,
};

/// Store wrapper whose reads and writes can be made to fail per timer.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_gets: Mutex<HashSet<TimerId>>,
    failing_saves: Mutex<HashSet<TimerId>>,
}

impl FlakyStore {
    pub fn fail_gets(&self, id: TimerId, failing: bool) {
        let mut set = self.failing_gets.lock().unwrap();
        if failing {
            set.insert(id);
        } else {
            set.remove(&id);
        }
    }

    pub fn fail_saves(&self, id: TimerId, failing: bool) {
        let mut set = self.failing_saves.lock().unwrap();
        if failing {
            set.insert(id);
        } else {
            set.remove(&id);
        }
    }
}

impl TimerStore for FlakyStore {
    fn save(&self, timer: &Timer) -> Result<(), StoreError> {
        if self.failing_saves.lock().unwrap().contains(&timer.id) {
            return Err(StoreError::Unavailable("disk busy".into()));
        }
        self.inner.save(timer)
    }

    fn get(&self, id: TimerId) -> Result<Option<Timer>, StoreError> {
        if self.failing_gets.lock().unwrap().contains(&id) {
            return Err(StoreError::Unavailable("disk busy".into()));
        }
        self.inner.get(id)
    }

    fn list(&self, filter: &TimerFilter) -> Result<Vec<Timer>, StoreError> {
        self.inner.list(filter)
    }

    fn delete(&self, id: TimerId) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<TimerScheduler>,
    pub controller: TimerController,
}

pub fn epoch() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 28, 9, 0, 0).unwrap()
}

pub fn harness_with(store: SharedStore, clock: Arc<ManualClock>, config: SchedulerConfig) -> Harness {
    let scheduler = Arc::new(TimerScheduler::new(
        store,
        clock.clone(),
        Arc::new(Notifier::new()),
        config,
    ));
    let controller = TimerController::new(scheduler.clone(), ControllerConfig::default());
    Harness {
        clock,
        scheduler,
        controller,
    }
}

pub fn harness() -> Harness {
    harness_with(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::new(epoch())),
        SchedulerConfig::default(),
    )
}

pub fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Count finished events waiting in a subscriber
pub fn drain_finished(rx: &mut tokio::sync::broadcast::Receiver<kitchen_timers::TimerEvent>) -> usize {
    let mut count = 0;
    while let Ok(event) = rx.try_recv() {
        if event.is_finished() {
            count += 1;
        }
    }
    count
}

/// Store whose writes can be made to stall, like a slow disk.
#[derive(Default)]
pub struct SlowStore {
    inner: MemoryStore,
    stalled: std::sync::atomic::AtomicBool,
}

impl SlowStore {
    pub const STALL: Duration = Duration::from_millis(300);

    pub fn stall_writes(&self, stalled: bool) {
        self.stalled
            .store(stalled, std::sync::atomic::Ordering::SeqCst);
    }
}

impl TimerStore for SlowStore {
    fn save(&self, timer: &Timer) -> Result<(), StoreError> {
        if self.stalled.load(std::sync::atomic::Ordering::SeqCst) {
            std::thread::sleep(Self::STALL);
        }
        self.inner.save(timer)
    }

    fn get(&self, id: TimerId) -> Result<Option<Timer>, StoreError> {
        self.inner.get(id)
    }

    fn list(&self, filter: &TimerFilter) -> Result<Vec<Timer>, StoreError> {
        self.inner.list(filter)
    }

    fn delete(&self, id: TimerId) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }
}
