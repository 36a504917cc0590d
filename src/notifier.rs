//! Delivery of timer events to attached UI surfaces
//!
//! Subscribers receive discrete [`TimerEvent`]s over a broadcast channel.
//! Sending is fire-and-forget: a missing or lagging subscriber never causes
//! a notification to be re-queued.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::state::Timer;

const DEFAULT_CAPACITY: usize = 256;

/// Event published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "timer", rename_all = "lowercase")]
pub enum TimerEvent {
    /// A timer reached zero. Sent at most once per completion.
    Finished(Timer),
    /// Live remaining-time update for a running timer
    Progress(Timer),
}

impl TimerEvent {
    pub fn timer(&self) -> &Timer {
        match self {
            TimerEvent::Finished(timer) | TimerEvent::Progress(timer) => timer,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, TimerEvent::Finished(_))
    }
}

/// Broadcasts finished/progress events
#[derive(Debug)]
pub struct Notifier {
    tx: broadcast::Sender<TimerEvent>,
    finished_sent: AtomicU64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            finished_sent: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber. Events sent before this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.tx.subscribe()
    }

    pub fn notify_finished(&self, timer: &Timer) {
        info!(timer_id = %timer.id, "Timer \"{}\" finished", timer.name);
        self.finished_sent.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.tx.send(TimerEvent::Finished(timer.clone())) {
            debug!(timer_id = %timer.id, "No subscriber for finished event: {}", e);
        }
    }

    pub fn notify_progress(&self, timer: &Timer) {
        // No receivers is the common case for progress; stay quiet
        let _ = self.tx.send(TimerEvent::Progress(timer.clone()));
    }

    /// Number of finished notifications handed to the channel so far
    pub fn finished_count(&self) -> u64 {
        self.finished_sent.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn timer() -> Timer {
        Timer::new("eggs", Duration::from_secs(420), None, Utc::now()).unwrap()
    }

    #[test]
    fn finished_reaches_every_subscriber() {
        let notifier = Notifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        let t = timer();

        notifier.notify_finished(&t);

        assert_eq!(a.try_recv().unwrap(), TimerEvent::Finished(t.clone()));
        assert_eq!(b.try_recv().unwrap(), TimerEvent::Finished(t));
        assert_eq!(notifier.finished_count(), 1);
    }

    #[test]
    fn sending_without_subscribers_does_not_fail() {
        let notifier = Notifier::new();
        notifier.notify_finished(&timer());
        notifier.notify_progress(&timer());
        assert_eq!(notifier.finished_count(), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = TimerEvent::Progress(timer());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "progress");
        assert_eq!(json["timer"]["name"], "eggs");
    }
}
