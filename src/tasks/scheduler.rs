//! Shared-tick scheduler for running timers
//!
//! One periodic task evaluates every running timer. Remaining time is always
//! recomputed from the stored start anchor and the wall clock, so missed
//! ticks and process downtime never introduce drift: the next evaluation
//! simply observes that more time has passed.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{
    sync::{watch, Notify},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    clock::SharedClock,
    error::StoreError,
    notifier::Notifier,
    state::{Recomputed, TimerId, TimerStatus},
    store::{SharedStore, TimerFilter},
};

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Period of the shared evaluation tick. Default: 1 second.
    pub tick_period: Duration,
    /// Publish a progress event for every running timer on each tick
    pub emit_progress: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            emit_progress: false,
        }
    }
}

/// Summary of a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Timers recomputed and still running
    pub evaluated: usize,
    /// Timers that reached zero on this tick
    pub finished: usize,
    /// Timers whose evaluation failed and will be retried
    pub failed: usize,
    /// Ids removed because their record was gone, unreadable or not running
    pub dropped: usize,
}

enum Evaluation {
    Running,
    Finished,
    Dropped,
    Skipped,
}

/// Exclusive access to the active set.
///
/// Holding this guard is what makes a read-modify-write of a timer atomic
/// with respect to the tick and to other controller calls.
pub struct ActiveSet<'a> {
    ids: MutexGuard<'a, BTreeSet<TimerId>>,
    wake: &'a Notify,
}

impl ActiveSet<'_> {
    /// Add a running timer and re-arm the tick if it was suspended
    pub fn insert(&mut self, id: TimerId) {
        if self.ids.insert(id) {
            self.wake.notify_one();
        }
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        self.ids.remove(&id)
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Keeps running timers' remaining time current and detects completions.
pub struct TimerScheduler {
    store: SharedStore,
    clock: SharedClock,
    notifier: Arc<Notifier>,
    active: Mutex<BTreeSet<TimerId>>,
    wake: Notify,
    config: SchedulerConfig,
}

impl TimerScheduler {
    pub fn new(
        store: SharedStore,
        clock: SharedClock,
        notifier: Arc<Notifier>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            notifier,
            active: Mutex::new(BTreeSet::new()),
            wake: Notify::new(),
            config,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Take the global timer lock.
    pub fn lock_active(&self) -> ActiveSet<'_> {
        // The set only holds ids, so a panic elsewhere cannot leave it inconsistent
        let ids = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        ActiveSet {
            ids,
            wake: &self.wake,
        }
    }

    /// Ids currently evaluated each tick
    pub fn active_ids(&self) -> Vec<TimerId> {
        self.lock_active().ids.iter().copied().collect()
    }

    pub fn is_idle(&self) -> bool {
        self.lock_active().is_empty()
    }

    /// Seed the active set from every timer the store holds as running.
    ///
    /// Must run before timer state is observed after a restart. Timers whose
    /// start lies far in the past complete on the next tick.
    pub fn reconcile(&self) -> Result<usize, StoreError> {
        let running = self.store.list(&TimerFilter::running())?;
        let mut active = self.lock_active();
        for timer in &running {
            active.insert(timer.id);
        }
        info!("Reconciled {} running timer(s) from store", running.len());
        Ok(running.len())
    }

    /// Evaluate every active timer once.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for id in self.active_ids() {
            match self.evaluate(id) {
                Ok(Evaluation::Running) => report.evaluated += 1,
                Ok(Evaluation::Finished) => report.finished += 1,
                Ok(Evaluation::Dropped) => report.dropped += 1,
                Ok(Evaluation::Skipped) => {}
                Err(e) if e.is_transient() => {
                    warn!(timer_id = %id, "Timer evaluation failed, retrying next tick: {}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    error!(timer_id = %id, "Dropping unreadable timer from schedule: {}", e);
                    self.lock_active().remove(id);
                    report.dropped += 1;
                }
            }
        }

        report
    }

    fn evaluate(&self, id: TimerId) -> Result<Evaluation, StoreError> {
        let mut active = self.lock_active();
        if !active.contains(id) {
            // Removed by the controller after this tick took its snapshot
            return Ok(Evaluation::Skipped);
        }

        let timer = match self.store.get(id)? {
            Some(timer) if timer.status == TimerStatus::Running => timer,
            Some(timer) => {
                debug!(timer_id = %id, "Timer is {}, leaving schedule", timer.status);
                active.remove(id);
                return Ok(Evaluation::Dropped);
            }
            None => {
                debug!(timer_id = %id, "Timer record gone, leaving schedule");
                active.remove(id);
                return Ok(Evaluation::Dropped);
            }
        };

        let Recomputed { timer, finished } = timer.recompute_remaining(self.clock.now());
        self.store.save(&timer)?;

        if finished {
            // Out of the set before notifying, so no later tick can fire it again
            active.remove(id);
            drop(active);
            self.notifier.notify_finished(&timer);
            return Ok(Evaluation::Finished);
        }

        drop(active);
        if self.config.emit_progress {
            self.notifier.notify_progress(&timer);
        }
        Ok(Evaluation::Running)
    }

    /// Drive ticks until `shutdown` becomes true.
    ///
    /// While no timer is running the loop parks on a wake-up signal instead
    /// of polling; [`ActiveSet::insert`] re-arms it.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Timer scheduler started (tick every {}ms)",
            self.config.tick_period.as_millis()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.is_idle() {
                debug!("No running timers, suspending tick");
                tokio::select! {
                    _ = self.wake.notified() => {
                        debug!("Timer activated, re-arming tick");
                        ticker.reset_immediately();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    // Store I/O blocks; keep it off the runtime's worker threads
                    let scheduler = Arc::clone(&self);
                    let report = match tokio::task::spawn_blocking(move || scheduler.tick()).await {
                        Ok(report) => report,
                        Err(e) => {
                            error!("Scheduler tick aborted: {}", e);
                            continue;
                        }
                    };
                    if report.finished > 0 || report.failed > 0 || report.dropped > 0 {
                        debug!(
                            "Tick: {} running, {} finished, {} failed, {} dropped",
                            report.evaluated, report.finished, report.failed, report.dropped
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Timer scheduler shutting down");
    }
}
