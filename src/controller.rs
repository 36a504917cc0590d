//! Public timer API
//!
//! Every operation takes the scheduler's timer lock for its whole
//! read-modify-write, so operations on one timer are linearizable and a
//! failed call leaves the persisted record untouched.

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    error::{Operation, Result, StoreError, TimerError},
    state::{Timer, TimerId, TimerStatus},
    store::TimerFilter,
    tasks::TimerScheduler,
};

/// Controller tuning
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Shortest remaining time an adjustment may leave. Default: 10 seconds.
    pub min_remaining: Duration,
    /// How long finished and cancelled timers are kept. Default: 24 hours.
    pub retention: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_remaining: Duration::from_secs(10),
            retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Creates and drives timers on behalf of callers
pub struct TimerController {
    scheduler: Arc<TimerScheduler>,
    config: ControllerConfig,
}

impl TimerController {
    pub fn new(scheduler: Arc<TimerScheduler>, config: ControllerConfig) -> Self {
        Self { scheduler, config }
    }

    pub fn scheduler(&self) -> &Arc<TimerScheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.scheduler.clock().now()
    }

    fn load(&self, id: TimerId) -> Result<Timer> {
        self.scheduler
            .store()
            .get(id)?
            .ok_or(TimerError::NotFound(id))
    }

    fn save(&self, timer: &Timer) -> Result<()> {
        self.scheduler.store().save(timer)?;
        Ok(())
    }

    /// Create a timer in the `Created` state
    pub fn create(
        &self,
        name: &str,
        duration: Duration,
        linked_recipe_id: Option<String>,
    ) -> Result<Timer> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TimerError::InvalidArgument(
                "timer name must not be empty".to_string(),
            ));
        }

        let timer = Timer::new(name, duration, linked_recipe_id, self.now())?;
        self.save(&timer)?;
        info!(timer_id = %timer.id, "Created timer \"{}\" for {}s", timer.name, duration.as_secs());
        Ok(timer)
    }

    pub fn get(&self, id: TimerId) -> Result<Timer> {
        self.load(id)
    }

    pub fn list(&self, filter: &TimerFilter) -> Result<Vec<Timer>> {
        Ok(self.scheduler.store().list(filter)?)
    }

    /// Start or resume a timer and add it to the schedule
    pub fn start(&self, id: TimerId) -> Result<Timer> {
        let mut active = self.scheduler.lock_active();
        let timer = self.load(id)?.start(self.now())?;
        self.save(&timer)?;
        active.insert(id);
        info!(timer_id = %id, "Started timer with {}s remaining", timer.remaining.as_secs());
        Ok(timer)
    }

    /// Pause a running timer. A timer that already ran out finishes instead,
    /// and the finished notification is sent from here.
    pub fn pause(&self, id: TimerId) -> Result<Timer> {
        let mut active = self.scheduler.lock_active();
        let timer = self.load(id)?.pause(self.now())?;
        self.save(&timer)?;
        active.remove(id);
        drop(active);

        if timer.status == TimerStatus::Finished {
            self.scheduler.notifier().notify_finished(&timer);
        } else {
            info!(timer_id = %id, "Paused timer with {}s remaining", timer.remaining.as_secs());
        }
        Ok(timer)
    }

    pub fn cancel(&self, id: TimerId) -> Result<Timer> {
        let mut active = self.scheduler.lock_active();
        let timer = self.load(id)?.cancel(self.now())?;
        self.save(&timer)?;
        active.remove(id);
        info!(timer_id = %id, "Cancelled timer");
        Ok(timer)
    }

    /// Restore a non-running timer to its full duration
    pub fn reset(&self, id: TimerId) -> Result<Timer> {
        let _active = self.scheduler.lock_active();
        let timer = self.load(id)?.reset()?;
        self.save(&timer)?;
        info!(timer_id = %id, "Reset timer to {}s", timer.remaining.as_secs());
        Ok(timer)
    }

    /// Add (or with a negative value, remove) seconds from a timer
    pub fn adjust(&self, id: TimerId, delta_secs: i64) -> Result<Timer> {
        if delta_secs == 0 {
            return Err(TimerError::InvalidArgument(
                "adjustment must be non-zero".to_string(),
            ));
        }

        let _active = self.scheduler.lock_active();
        let timer = self
            .load(id)?
            .adjust_duration(delta_secs, self.now(), self.config.min_remaining)?;
        self.save(&timer)?;
        info!(
            timer_id = %id,
            "Adjusted timer by {}s, {}s remaining",
            delta_secs,
            timer.remaining.as_secs()
        );
        Ok(timer)
    }

    /// Remove a timer that is not running.
    ///
    /// An unreadable record has no usable status and is removed as-is.
    pub fn delete(&self, id: TimerId) -> Result<()> {
        let mut active = self.scheduler.lock_active();
        match self.load(id) {
            Ok(timer) if timer.status == TimerStatus::Running => {
                return Err(TimerError::invalid_transition(
                    id,
                    Operation::Delete,
                    timer.status,
                ));
            }
            Ok(_) => {}
            Err(TimerError::Store(e @ StoreError::Corrupt { .. })) => {
                warn!(timer_id = %id, "Deleting unreadable timer record: {}", e);
            }
            Err(e) => return Err(e),
        }

        self.scheduler.store().delete(id)?;
        active.remove(id);
        info!(timer_id = %id, "Deleted timer");
        Ok(())
    }

    /// Cancel every running or paused timer.
    ///
    /// Each timer is cancelled atomically; if some cannot be persisted they
    /// stay scheduled and the first failure is returned after the rest have
    /// been attempted.
    pub fn cancel_all(&self) -> Result<Vec<Timer>> {
        let mut active = self.scheduler.lock_active();
        let now = self.now();
        let mut cancelled = Vec::new();
        let mut first_failure: Option<StoreError> = None;

        for timer in self.scheduler.store().list(&TimerFilter::active())? {
            let id = timer.id;
            let timer = timer.cancel(now)?;
            match self.scheduler.store().save(&timer) {
                Ok(()) => {
                    active.remove(id);
                    cancelled.push(timer);
                }
                Err(e) => {
                    warn!(timer_id = %id, "Failed to cancel timer: {}", e);
                    first_failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_failure {
            return Err(e.into());
        }

        active.clear();
        info!("Cancelled {} timer(s)", cancelled.len());
        Ok(cancelled)
    }

    /// Delete finished and cancelled timers that ended before the retention
    /// window. Returns the number of timers removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let retention = chrono::Duration::from_std(self.config.retention)
            .unwrap_or(chrono::Duration::MAX);
        let cutoff = self
            .now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        let _active = self.scheduler.lock_active();
        let mut purged = 0;
        for timer in self.scheduler.store().list(&TimerFilter::terminal())? {
            if timer.ended_before(cutoff) && self.scheduler.store().delete(timer.id)? {
                purged += 1;
            }
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        notifier::Notifier,
        store::MemoryStore,
        tasks::SchedulerConfig,
    };
    use chrono::Utc;

    fn controller() -> (TimerController, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let scheduler = Arc::new(TimerScheduler::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            Arc::new(Notifier::new()),
            SchedulerConfig::default(),
        ));
        (
            TimerController::new(scheduler, ControllerConfig::default()),
            clock,
        )
    }

    #[test]
    fn create_validates_input() {
        let (ctl, _) = controller();
        assert!(matches!(
            ctl.create("tea", Duration::ZERO, None),
            Err(TimerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ctl.create("   ", Duration::from_secs(60), None),
            Err(TimerError::InvalidArgument(_))
        ));

        let t = ctl.create(" tea ", Duration::from_secs(60), None).unwrap();
        assert_eq!(t.name, "tea");
        assert_eq!(ctl.get(t.id).unwrap(), t);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (ctl, _) = controller();
        let id = TimerId::new();
        assert!(matches!(ctl.start(id), Err(TimerError::NotFound(missing)) if missing == id));
        assert!(matches!(ctl.delete(id), Err(TimerError::NotFound(_))));
    }

    #[test]
    fn start_and_pause_maintain_active_set() {
        let (ctl, clock) = controller();
        let t = ctl.create("tea", Duration::from_secs(60), None).unwrap();

        ctl.start(t.id).unwrap();
        assert_eq!(ctl.scheduler().active_ids(), vec![t.id]);

        clock.advance_secs(5);
        let paused = ctl.pause(t.id).unwrap();
        assert_eq!(paused.remaining, Duration::from_secs(55));
        assert!(ctl.scheduler().is_idle());
    }

    #[test]
    fn failed_transition_leaves_record_unchanged() {
        let (ctl, _) = controller();
        let t = ctl.create("tea", Duration::from_secs(60), None).unwrap();

        assert!(matches!(
            ctl.pause(t.id),
            Err(TimerError::InvalidTransition { .. })
        ));
        assert_eq!(ctl.get(t.id).unwrap(), t);
    }

    #[test]
    fn pause_of_expired_timer_notifies_finish() {
        let (ctl, clock) = controller();
        let mut events = ctl.scheduler().notifier().subscribe();
        let t = ctl.create("tea", Duration::from_secs(30), None).unwrap();
        ctl.start(t.id).unwrap();

        clock.advance_secs(45);
        let finished = ctl.pause(t.id).unwrap();

        assert_eq!(finished.status, TimerStatus::Finished);
        assert!(events.try_recv().unwrap().is_finished());
        assert_eq!(ctl.scheduler().tick().finished, 0);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn adjust_rejects_zero_delta() {
        let (ctl, _) = controller();
        let t = ctl.create("tea", Duration::from_secs(60), None).unwrap();
        assert!(matches!(
            ctl.adjust(t.id, 0),
            Err(TimerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn reset_requires_non_running_timer() {
        let (ctl, clock) = controller();
        let t = ctl.create("tea", Duration::from_secs(60), None).unwrap();
        ctl.start(t.id).unwrap();
        assert!(ctl.reset(t.id).is_err());

        clock.advance_secs(20);
        ctl.pause(t.id).unwrap();
        let reset = ctl.reset(t.id).unwrap();
        assert_eq!(reset.remaining, Duration::from_secs(60));
        assert_eq!(reset.status, TimerStatus::Created);
    }

    #[test]
    fn cancel_all_clears_schedule() {
        let (ctl, _) = controller();
        let a = ctl.create("a", Duration::from_secs(60), None).unwrap();
        let b = ctl.create("b", Duration::from_secs(60), None).unwrap();
        let idle = ctl.create("idle", Duration::from_secs(60), None).unwrap();
        ctl.start(a.id).unwrap();
        ctl.start(b.id).unwrap();
        ctl.pause(b.id).unwrap();

        let cancelled = ctl.cancel_all().unwrap();
        assert_eq!(cancelled.len(), 2);
        assert!(ctl.scheduler().is_idle());
        assert_eq!(ctl.get(idle.id).unwrap().status, TimerStatus::Created);
        assert_eq!(ctl.get(a.id).unwrap().status, TimerStatus::Cancelled);
    }

    #[test]
    fn purge_removes_only_old_terminal_timers() {
        let (ctl, clock) = controller();
        let old = ctl.create("old", Duration::from_secs(60), None).unwrap();
        ctl.cancel(old.id).unwrap();
        clock.advance_secs(25 * 60 * 60);

        let recent = ctl.create("recent", Duration::from_secs(60), None).unwrap();
        ctl.cancel(recent.id).unwrap();
        let pending = ctl.create("pending", Duration::from_secs(60), None).unwrap();

        assert_eq!(ctl.purge_expired().unwrap(), 1);
        assert!(matches!(ctl.get(old.id), Err(TimerError::NotFound(_))));
        assert!(ctl.get(recent.id).is_ok());
        assert!(ctl.get(pending.id).is_ok());
    }
}
